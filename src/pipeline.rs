// 🚀 Pipeline - static data → ingest → cluster → score → write
//
// One run reads data/school.txt and data/raw.txt, resolves every record to
// a canonical OIer, scores them and writes everything under dist/.

use crate::cluster::ClusterEngine;
use crate::config::PipelineConfig;
use crate::contest::ContestRegistry;
use crate::distance::DistanceModel;
use crate::grades::GradeTable;
use crate::ingest::{self, RawIngestor};
use crate::oier::{self, InitialsTable, Oier, OierRegistry};
use crate::output::{self, ChecksumInfo};
use crate::record::RecordStore;
use crate::school::{SchoolRegistry, SchoolScores};
use crate::score::{ScoreEngine, ScoringTable};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

// ============================================================================
// STATIC DATA
// ============================================================================

/// Everything loaded from the static directory
pub struct StaticData {
    pub contests: ContestRegistry,
    pub grades: GradeTable,
    pub scoring: ScoringTable,
    pub initials: InitialsTable,
}

impl StaticData {
    /// contests.json and scoring.json are required; grades.json and
    /// surnames.json fall back to built-in defaults when absent
    pub fn load(config: &PipelineConfig) -> Result<Self> {
        let contests = ContestRegistry::from_file(config.static_path("contests.json"))?;

        let grades_path = config.static_path("grades.json");
        let grades = if grades_path.exists() {
            GradeTable::from_file(&grades_path)?
        } else {
            GradeTable::with_defaults()
        };

        let scoring = ScoringTable::from_file(config.static_path("scoring.json"))?;

        let surnames_path = config.static_path("surnames.json");
        let initials = if surnames_path.exists() {
            InitialsTable::from_file(&surnames_path)?
        } else {
            InitialsTable::default()
        };

        info!("📚 Loaded {} contests", contests.len());
        Ok(StaticData {
            contests,
            grades,
            scoring,
            initials,
        })
    }
}

// ============================================================================
// RUN
// ============================================================================

#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub schools: usize,
    pub records: usize,
    pub provisional_oiers: usize,
    pub oiers: usize,
    pub rejected_lines: usize,
    pub unknown_schools: usize,
    pub checksum: ChecksumInfo,
    pub static_checksum: ChecksumInfo,
}

/// Resolved and scored OIers, before anything is written
pub struct Resolution {
    pub oiers: Vec<Oier>,
    pub store: RecordStore,
    pub schools: SchoolRegistry,
    pub school_scores: SchoolScores,
    pub provisional_oiers: usize,
    pub rejected_lines: usize,
    pub unknown_schools: Vec<(String, String)>,
}

/// Ingest, cluster and score; no output files
pub fn resolve(config: &PipelineConfig, data: &mut StaticData) -> Result<Resolution> {
    info!("🏫 Parsing schools");
    let mut schools = SchoolRegistry::new();
    let school_report = ingest::parse_schools(&config.school_path(), &mut schools)?;

    info!("📄 Parsing raw records");
    let mut registry = OierRegistry::new();
    let mut store = RecordStore::new();
    let raw_report = RawIngestor {
        contests: &mut data.contests,
        schools: &schools,
        grades: &data.grades,
        oiers: &mut registry,
        store: &mut store,
    }
    .parse(&config.raw_path())?;

    info!("🧩 Merging records (threshold {})", config.merge_threshold);
    let model = DistanceModel::new(&data.contests, &schools).with_max_year_span(config.max_year_span);
    let engine = ClusterEngine::new(model)
        .with_threshold(config.merge_threshold)
        .with_incomplete_merge_warnings(config.show_incomplete_merge);
    let mut oiers = engine.resolve(&registry, &mut store, &data.initials);
    let provisional_oiers = registry.len();
    registry.clear();
    info!(
        "✅ {} provisional OIers resolved into {}",
        provisional_oiers,
        oiers.len()
    );

    info!("📊 Scoring OIers");
    let scorer = ScoreEngine::new(&data.contests, &data.scoring);
    let mut school_scores = SchoolScores::new();
    for oier in oiers.iter_mut() {
        scorer.analyze(oier, &store, &mut school_scores);
    }
    oier::sort_by_score(&mut oiers, &mut store);

    Ok(Resolution {
        oiers,
        store,
        schools,
        school_scores,
        provisional_oiers,
        rejected_lines: school_report.errors.len() + raw_report.errors.len(),
        unknown_schools: raw_report.unknown_schools_sorted(),
    })
}

/// Full run: resolve, then write result.txt, result.info.json,
/// unknown_schools.txt and the static.json bundle
pub fn run(config: &PipelineConfig) -> Result<PipelineSummary> {
    let mut data = StaticData::load(config)?;
    let resolution = resolve(config, &mut data)?;
    write_outputs(&config.static_dir, &config.dist_dir, &resolution)
}

pub fn write_outputs(
    static_dir: &Path,
    dist_dir: &Path,
    resolution: &Resolution,
) -> Result<PipelineSummary> {
    info!("💾 Writing output to {:?}", dist_dir);
    fs::create_dir_all(dist_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dist_dir))?;

    let result_path = dist_dir.join("result.txt");
    output::write_result(&result_path, &resolution.oiers, &resolution.store)?;
    let checksum = output::write_checksum_info(&result_path, &dist_dir.join("result.info.json"))?;
    output::write_schools(
        &dist_dir.join("school.json"),
        &resolution.schools,
        &resolution.school_scores,
    )?;
    output::write_unknown_schools(
        &dist_dir.join("unknown_schools.txt"),
        &resolution.unknown_schools,
    )?;

    info!("📦 Bundling static data");
    let static_checksum = output::write_static_bundle(static_dir, dist_dir)?;

    let summary = PipelineSummary {
        schools: resolution.schools.len(),
        records: resolution.store.len(),
        provisional_oiers: resolution.provisional_oiers,
        oiers: resolution.oiers.len(),
        rejected_lines: resolution.rejected_lines,
        unknown_schools: resolution.unknown_schools.len(),
        checksum,
        static_checksum,
    };
    info!(
        "🏁 Done: {} records, {} OIers, {} rejected lines, {} unknown schools",
        summary.records, summary.oiers, summary.rejected_lines, summary.unknown_schools
    );
    Ok(summary)
}
