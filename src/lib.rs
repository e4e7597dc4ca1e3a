// OIerDB - Core Library
// Resolves raw contest records into canonical OIers and scores them

pub mod error;
pub mod grades;         // Grade masks and school stages
pub mod enrollment;     // Enrollment-year estimation
pub mod contest;
pub mod school;
pub mod record;
pub mod oier;
pub mod distance;       // Hard vetoes + soft merge cost
pub mod retention;      // Grade-retention detection
pub mod cluster;        // Greedy record merging
pub mod score;          // oierdb score, CCF level
pub mod ingest;
pub mod output;
pub mod config;
pub mod pipeline;

// Re-export commonly used types
pub use error::{IngestError, LineError};
pub use grades::{GradeMask, GradeTable, Stage};
pub use contest::{Contest, ContestFamily, ContestInfo, ContestRegistry};
pub use school::{School, SchoolRegistry, SchoolScores};
pub use record::{Gender, NewRecord, Record, RecordId, RecordStore};
pub use oier::{InitialsTable, Oier, OierRegistry, ProvisionalOier};
pub use distance::{Distance, DistanceModel, Veto};
pub use retention::{check_stay_down, StayDown};
pub use cluster::{ClusterEngine, MergeOutcome};
pub use score::{CcfResult, ScoreEngine, ScoringTable};
pub use ingest::{IngestReport, RawIngestor};
pub use config::PipelineConfig;
pub use pipeline::{PipelineSummary, StaticData};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
