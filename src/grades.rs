// 🎓 Grades - grade names, grade bitmasks and school stages
//
// A grade set is a u32 bitmask. Bit 16 is the first year of junior middle
// school (初一, grade 1); bit k decodes to grade k - 15, so primary school
// occupies bits 10..=15 and senior high bits 19..=21.

use crate::error::IngestError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

pub type GradeMask = u32;

pub const PRIMARY_MASK: GradeMask = 0x0000_FC00;
pub const JUNIOR_MASK: GradeMask = 0x0007_0000;
pub const SENIOR_MASK: GradeMask = 0x0038_0000;

pub const JUNIOR_FIRST: GradeMask = 1 << 16;
pub const SENIOR_FIRST: GradeMask = 1 << 19;
pub const SENIOR_THIRD: GradeMask = 1 << 21;

/// "小学/无": any primary grade, or no school grade at all
pub const PRIMARY_OR_NONE: GradeMask = 0xFFC0_FC00;

/// Grade number encoded by a single bit position; bit 16 (初一) is grade 1
pub fn grade_of_bit(bit: u32) -> i32 {
    bit as i32 - 15
}

// ============================================================================
// STAGE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Primary,
    Junior,
    Senior,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Primary, Stage::Junior, Stage::Senior];

    pub fn mask(self) -> GradeMask {
        match self {
            Stage::Primary => PRIMARY_MASK,
            Stage::Junior => JUNIOR_MASK,
            Stage::Senior => SENIOR_MASK,
        }
    }

    /// Stage that fully contains the grade set, if any
    pub fn of(grades: GradeMask) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .find(|stage| grades != 0 && grades & !stage.mask() == 0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Primary => "primary",
            Stage::Junior => "junior",
            Stage::Senior => "senior",
        }
    }
}

// ============================================================================
// GRADE TABLE
// ============================================================================

/// Grade name decoder (grades.json)
///
/// A name is either a special name with a literal mask, or a chain of known
/// prefixes ("初" + "一") whose offsets are added to `initial` to give one bit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeTable {
    pub initial: i32,
    pub element: BTreeMap<String, i32>,
    #[serde(default)]
    pub special: HashMap<String, GradeMask>,
}

impl GradeTable {
    /// Table with the usual Chinese grade names
    pub fn with_defaults() -> Self {
        let element = [
            ("小", -6),
            ("初", 0),
            ("高", 3),
            ("一", 1),
            ("二", 2),
            ("三", 3),
            ("四", 4),
            ("五", 5),
            ("六", 6),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let special = [
            ("小学", PRIMARY_MASK),
            ("初中", JUNIOR_MASK),
            ("高中", SENIOR_MASK),
            ("小学/无", PRIMARY_OR_NONE),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        GradeTable {
            initial: 15,
            element,
            special,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read grades file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse grades JSON")
    }

    /// Decode a grade name into its bitmask
    pub fn decode(&self, grade_name: &str) -> Result<GradeMask, IngestError> {
        if let Some(&mask) = self.special.get(grade_name) {
            return Ok(mask);
        }

        let unknown = || IngestError::UnknownGrade(grade_name.to_string());
        let mut bit = self.initial;
        let mut rest = grade_name;

        while !rest.is_empty() {
            // Longest known prefix wins
            let (prefix, offset) = self
                .element
                .iter()
                .filter(|(prefix, _)| rest.starts_with(prefix.as_str()))
                .max_by_key(|(prefix, _)| prefix.len())
                .ok_or_else(unknown)?;
            bit += offset;
            rest = &rest[prefix.len()..];
        }

        if !(0..32).contains(&bit) {
            return Err(unknown());
        }
        Ok(1 << bit)
    }
}

impl Default for GradeTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// TESTS
// ============================================================================
