// 🏆 Contest Registry - static contest metadata + per-contest ranking
//
// Contest metadata comes from contests.json; the contest id is its position
// in that file. Ingestion feeds contestants through `add_contestant`, which
// assigns ranks in file order (equal scores share a rank) and tallies award
// levels.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// ============================================================================
// CONTEST FAMILY
// ============================================================================

/// Normalized contest family: renamed contests compare as one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContestFamily {
    Csp,
    Noip,
    Noi,
}

impl ContestFamily {
    pub fn of(contest_type: &str) -> Option<ContestFamily> {
        match contest_type {
            "CSP提高" | "CSP入门" => Some(ContestFamily::Csp),
            "NOIP" | "NOIP提高" | "NOIP普及" => Some(ContestFamily::Noip),
            "NOI" => Some(ContestFamily::Noi),
            _ => None,
        }
    }
}

// ============================================================================
// CONTEST
// ============================================================================

/// Static contest metadata as stored in contests.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestInfo {
    pub name: String,

    #[serde(rename = "type")]
    pub contest_type: String,

    pub year: i32,

    /// Held in the autumn term (school year = calendar year)
    pub fall_semester: bool,

    /// Official award capacity, when published
    #[serde(default)]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Contest {
    pub id: usize,
    pub name: String,
    pub contest_type: String,
    pub year: i32,
    pub fall_semester: bool,
    pub capacity: Option<u32>,

    /// Award name → number of contestants holding it
    pub level_counts: HashMap<String, u32>,

    contestants: u32,
    last_score: Option<f64>,
    last_rank: u32,
}

impl Contest {
    pub fn new(id: usize, info: ContestInfo) -> Self {
        Contest {
            id,
            name: info.name,
            contest_type: info.contest_type,
            year: info.year,
            fall_semester: info.fall_semester,
            capacity: info.capacity,
            level_counts: HashMap::new(),
            contestants: 0,
            last_score: None,
            last_rank: 0,
        }
    }

    /// School year the contest belongs to (spring contests count for the
    /// previous autumn)
    pub fn school_year(&self) -> i32 {
        if self.fall_semester {
            self.year
        } else {
            self.year - 1
        }
    }

    pub fn family(&self) -> Option<ContestFamily> {
        ContestFamily::of(&self.contest_type)
    }

    pub fn n_contestants(&self) -> u32 {
        self.contestants
    }

    pub fn level_count(&self, level: &str) -> u32 {
        self.level_counts.get(level).copied().unwrap_or(0)
    }

    /// Register one contestant and return their rank
    pub fn add_contestant(&mut self, score: Option<f64>, level: &str) -> u32 {
        self.contestants += 1;
        *self.level_counts.entry(level.to_string()).or_insert(0) += 1;

        let tied = matches!((score, self.last_score), (Some(s), Some(prev)) if s == prev);
        if !tied {
            self.last_rank = self.contestants;
        }
        self.last_score = score;
        self.last_rank
    }
}

// ============================================================================
// CONTEST REGISTRY
// ============================================================================

pub struct ContestRegistry {
    contests: Vec<Contest>,
    by_name: HashMap<String, usize>,
}

impl ContestRegistry {
    pub fn new() -> Self {
        ContestRegistry {
            contests: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Load contests.json (array order defines contest ids)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read contests file: {:?}", path.as_ref()))?;

        let infos: Vec<ContestInfo> =
            serde_json::from_str(&content).context("Failed to parse contests JSON")?;

        Ok(ContestRegistry::from_infos(infos))
    }

    pub fn from_infos(infos: Vec<ContestInfo>) -> Self {
        let mut registry = ContestRegistry::new();
        for info in infos {
            registry.create(info);
        }
        registry
    }

    /// Append a contest and return its id
    pub fn create(&mut self, info: ContestInfo) -> usize {
        let id = self.contests.len();
        self.by_name.insert(info.name.clone(), id);
        self.contests.push(Contest::new(id, info));
        id
    }

    pub fn get(&self, id: usize) -> &Contest {
        &self.contests[id]
    }

    pub fn get_mut(&mut self, id: usize) -> &mut Contest {
        &mut self.contests[id]
    }

    pub fn id_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.contests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contests.is_empty()
    }
}

impl Default for ContestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw score field: empty, or a number
pub fn parse_score(raw: &str) -> Option<Option<f64>> {
    if raw.is_empty() {
        return Some(None);
    }
    raw.parse::<f64>().ok().filter(|s| s.is_finite()).map(Some)
}

// ============================================================================
// TESTS
// ============================================================================
