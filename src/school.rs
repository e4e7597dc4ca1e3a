// 🏫 School Registry - canonical schools, aliases and aggregate scores
//
// Every alias resolves to the same school id. Aggregate scores live in a
// separate `SchoolScores` accumulator so scoring never mutates the registry.

use crate::error::IngestError;
use num_rational::BigRational;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// SCHOOL
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct School {
    pub id: usize,
    pub name: String,
    pub province: String,
    pub city: String,
    pub aliases: Vec<String>,
}

impl School {
    /// Location key used to tell schools in the same place apart
    pub fn location(&self) -> (&str, &str) {
        (&self.province, &self.city)
    }

    /// Name reads like a secondary school
    pub fn looks_secondary(&self) -> bool {
        let name = self.name.as_str();
        (name.contains("高中") || name.contains("中学") || name.contains("高级"))
            && !name.contains("小学")
    }

    /// Name reads like a primary school
    pub fn looks_primary(&self) -> bool {
        self.name.contains("小学")
    }
}

// ============================================================================
// SCHOOL REGISTRY
// ============================================================================

pub struct SchoolRegistry {
    schools: Vec<School>,
    by_name: HashMap<String, usize>,
}

impl SchoolRegistry {
    pub fn new() -> Self {
        SchoolRegistry {
            schools: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a school under its name and all aliases
    pub fn create(
        &mut self,
        name: &str,
        province: &str,
        city: &str,
        aliases: &[&str],
    ) -> Result<usize, IngestError> {
        if let Some(taken) = std::iter::once(&name)
            .chain(aliases)
            .find(|n| self.by_name.contains_key(**n))
        {
            return Err(IngestError::DuplicateSchool(taken.to_string()));
        }

        let id = self.schools.len();
        for n in std::iter::once(&name).chain(aliases) {
            self.by_name.insert(n.to_string(), id);
        }
        self.schools.push(School {
            id,
            name: name.to_string(),
            province: province.to_string(),
            city: city.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        });
        Ok(id)
    }

    pub fn get(&self, id: usize) -> &School {
        &self.schools[id]
    }

    pub fn id_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn all(&self) -> &[School] {
        &self.schools
    }

    pub fn len(&self) -> usize {
        self.schools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schools.is_empty()
    }
}

impl Default for SchoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SCHOOL SCORES
// ============================================================================

/// Aggregate score per school id (exact arithmetic)
#[derive(Debug, Clone, Default)]
pub struct SchoolScores {
    totals: HashMap<usize, BigRational>,
}

impl SchoolScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, school: usize, amount: &BigRational) {
        *self.totals.entry(school).or_insert_with(BigRational::zero) += amount;
    }

    pub fn get(&self, school: usize) -> BigRational {
        self.totals
            .get(&school)
            .cloned()
            .unwrap_or_else(BigRational::zero)
    }

    /// Fold another accumulator into this one (order independent)
    pub fn merge(&mut self, other: SchoolScores) {
        for (school, amount) in other.totals {
            self.add(school, &amount);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
