// 📝 Raw Records - one contest participation each
//
// Records live in an append-only `RecordStore`; ids are 1-based and
// monotonic in ingestion order. Only `keep_grade` and the owner index change
// after creation.

use crate::enrollment::{self, Ems};
use crate::grades::GradeMask;
use serde::{Deserialize, Serialize};

pub type RecordId = u32;

// ============================================================================
// GENDER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    pub fn from_name(name: &str) -> Gender {
        match name {
            "男" => Gender::Male,
            "女" => Gender::Female,
            _ => Gender::Unknown,
        }
    }

    /// 1 = male, -1 = female, 0 = unknown
    pub fn code(&self) -> i8 {
        match self {
            Gender::Male => 1,
            Gender::Female => -1,
            Gender::Unknown => 0,
        }
    }

    /// Both known and different
    pub fn conflicts_with(&self, other: Gender) -> bool {
        (self.code() - other.code()).abs() == 2
    }
}

// ============================================================================
// RECORD
// ============================================================================

#[derive(Debug, Clone)]
pub struct Record {
    pub id: RecordId,

    /// Index of the person currently owning this record
    pub owner: usize,

    pub contest: usize,
    pub score: Option<f64>,
    pub rank: u32,

    /// Award level name (金牌, 一等奖, ...)
    pub level: String,

    pub grades: GradeMask,
    pub ems: Ems,
    pub school: usize,
    pub province: String,
    pub gender: Gender,

    keep_grade: bool,
}

/// Everything ingestion knows about a record before it gets an id
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub owner: usize,
    pub contest: usize,
    pub school_year: i32,
    pub score: Option<f64>,
    pub rank: u32,
    pub level: String,
    pub grades: GradeMask,
    pub school: usize,
    pub province: String,
    pub gender: Gender,
}

impl Record {
    /// Record is part of a grade-retention group: serialize its grade
    pub fn is_keep_grade(&self) -> bool {
        self.keep_grade
    }

    pub fn keep_grade(&mut self) {
        self.keep_grade = true;
    }
}

// ============================================================================
// RECORD STORE
// ============================================================================

#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, new: NewRecord) -> RecordId {
        let id = self.records.len() as RecordId + 1;
        let ems = enrollment::estimate(new.school_year, new.grades);
        self.records.push(Record {
            id,
            owner: new.owner,
            contest: new.contest,
            score: new.score,
            rank: new.rank,
            level: new.level,
            grades: new.grades,
            ems,
            school: new.school,
            province: new.province,
            gender: new.gender,
            keep_grade: false,
        });
        id
    }

    pub fn get(&self, id: RecordId) -> &Record {
        &self.records[id as usize - 1]
    }

    pub fn get_mut(&mut self, id: RecordId) -> &mut Record {
        &mut self.records[id as usize - 1]
    }

    /// Borrow a group of records by id
    pub fn view(&self, ids: &[RecordId]) -> Vec<&Record> {
        ids.iter().map(|&id| self.get(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
