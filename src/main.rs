// OIerDB - command line entry point
//
// Runs the whole pipeline once: data/ + static/ → dist/

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oierdb::PipelineConfig;

/// Command-line arguments for oierdb
#[derive(Parser, Debug)]
#[command(name = "oierdb")]
#[command(about = "Resolve contest records into OIers and score them")]
#[command(version)]
struct Args {
    /// JSON config file (fields not given keep their defaults)
    #[arg(short, long, env = "OIERDB_CONFIG")]
    config: Option<PathBuf>,

    /// Directory containing raw.txt and school.txt
    #[arg(long, env = "OIERDB_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Directory containing contests.json, grades.json, scoring.json, surnames.json
    #[arg(long, env = "OIERDB_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, env = "OIERDB_DIST_DIR")]
    dist_dir: Option<PathBuf>,

    /// Maximum distance at which two record groups merge
    #[arg(short, long, env = "OIERDB_THRESHOLD")]
    threshold: Option<i64>,

    /// Maximum contest-year span of one person
    #[arg(long, env = "OIERDB_MAX_YEAR_SPAN")]
    max_year_span: Option<i32>,

    /// Warn about provisional OIers that did not collapse into one person
    #[arg(long, env = "OIERDB_SHOW_INCOMPLETE_MERGE")]
    show_incomplete_merge: bool,
}

impl Args {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(dir) = self.static_dir {
            config.static_dir = dir;
        }
        if let Some(dir) = self.dist_dir {
            config.dist_dir = dir;
        }
        if let Some(threshold) = self.threshold {
            config.merge_threshold = threshold;
        }
        if let Some(span) = self.max_year_span {
            config.max_year_span = span;
        }
        if self.show_incomplete_merge {
            config.show_incomplete_merge = true;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oierdb=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.into_config()?;

    info!("Starting OIerDB {}", oierdb::VERSION);
    info!(
        "data: {}, static: {}, dist: {}",
        config.data_dir.display(),
        config.static_dir.display(),
        config.dist_dir.display()
    );

    let summary = oierdb::pipeline::run(&config)?;
    info!("result.txt sha512: {}", summary.checksum.sha512);

    Ok(())
}
