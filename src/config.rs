// ⚙️ Pipeline configuration - paths, merge threshold, flags
//
// Defaults reproduce the usual data/ static/ dist/ layout. A JSON file may
// override any subset of fields; the CLI overrides the file.

use crate::cluster::DEFAULT_MERGE_THRESHOLD;
use crate::distance::DEFAULT_MAX_YEAR_SPAN;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// raw.txt and school.txt
    pub data_dir: PathBuf,

    /// contests.json, grades.json, scoring.json, surnames.json
    pub static_dir: PathBuf,

    /// Output directory
    pub dist_dir: PathBuf,

    /// Maximum distance at which two record groups merge
    pub merge_threshold: i64,

    /// Maximum contest-year span of one person
    pub max_year_span: i32,

    /// Warn for every bucket that did not collapse into one person
    pub show_incomplete_merge: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            data_dir: PathBuf::from("data"),
            static_dir: PathBuf::from("static"),
            dist_dir: PathBuf::from("dist"),
            merge_threshold: DEFAULT_MERGE_THRESHOLD,
            max_year_span: DEFAULT_MAX_YEAR_SPAN,
            show_incomplete_merge: false,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// All directories relative to `root`
    pub fn rooted_at<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        PipelineConfig {
            data_dir: root.join("data"),
            static_dir: root.join("static"),
            dist_dir: root.join("dist"),
            ..Self::default()
        }
    }

    pub fn raw_path(&self) -> PathBuf {
        self.data_dir.join("raw.txt")
    }

    pub fn school_path(&self) -> PathBuf {
        self.data_dir.join("school.txt")
    }

    pub fn static_path(&self, name: &str) -> PathBuf {
        self.static_dir.join(name)
    }

    pub fn dist_path(&self, name: &str) -> PathBuf {
        self.dist_dir.join(name)
    }
}

// ============================================================================
// TESTS
// ============================================================================
