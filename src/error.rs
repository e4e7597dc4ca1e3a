// ⚠️ Ingestion errors - one bad line never stops the run
//
// Core invariant violations (empty groups handed to the distance model) are
// asserts, not variants here.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    /// Wrong number of comma-separated fields
    #[error("malformed line: expected {expected} fields, found {found}")]
    Format { expected: String, found: usize },

    #[error("contestant name must not be empty")]
    EmptyName,

    #[error("unknown contest: '{0}'")]
    UnknownContest(String),

    /// School name not in the registry (collected for manual review)
    #[error("unknown school: '{0}'")]
    UnknownSchool(String),

    #[error("unknown grade: '{0}'")]
    UnknownGrade(String),

    #[error("unrecognized score: '{0}'")]
    InvalidScore(String),

    #[error("school name already registered: '{0}'")]
    DuplicateSchool(String),
}

/// An ingestion error together with where it happened
#[derive(Debug, Clone)]
pub struct LineError {
    pub line: u64,
    pub raw: String,
    pub error: IngestError,
}

impl std::fmt::Display for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: '{}': {}", self.line, self.raw, self.error)
    }
}
