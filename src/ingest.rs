// 📥 Ingestion - school.txt and raw.txt
//
// Both files are plain comma-separated lines (no quoting, `#` comments).
// A bad line is logged and skipped; the rest of the file still loads.
//
// school.txt: province,city,name,alias...
// raw.txt:    contest,award,name,grade,school,score,province,gender,identifier

use crate::contest::{parse_score, ContestRegistry};
use crate::error::{IngestError, LineError};
use crate::grades::GradeTable;
use crate::oier::OierRegistry;
use crate::record::{Gender, NewRecord, RecordId, RecordStore};
use crate::school::SchoolRegistry;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{error, info};

pub const RAW_FIELDS: usize = 9;
pub const SCHOOL_MIN_FIELDS: usize = 3;

/// Outcome of one ingestion pass
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Lines that produced a school / record
    pub accepted: usize,
    pub errors: Vec<LineError>,
    /// (province, school name) of records whose school is not registered
    pub unknown_schools: Vec<(String, String)>,
}

impl IngestReport {
    fn reject(&mut self, file: &str, fields: &StringRecord, error: IngestError) {
        let line = fields.position().map(|p| p.line()).unwrap_or(0);
        let raw = fields.iter().collect::<Vec<_>>().join(",");
        let line_error = LineError { line, raw, error };
        error!("{}:{}", file, line_error);
        self.errors.push(line_error);
    }

    /// Unknown schools sorted and deduplicated
    pub fn unknown_schools_sorted(&self) -> Vec<(String, String)> {
        let mut unknown = self.unknown_schools.clone();
        unknown.sort();
        unknown.dedup();
        unknown
    }
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(input)
}

fn is_comment(fields: &StringRecord) -> bool {
    fields.get(0).map_or(false, |f| f.starts_with('#'))
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))
}

// ============================================================================
// SCHOOLS
// ============================================================================

pub fn parse_schools(path: &Path, schools: &mut SchoolRegistry) -> Result<IngestReport> {
    parse_schools_from(open(path)?, schools)
}

pub fn parse_schools_from<R: Read>(input: R, schools: &mut SchoolRegistry) -> Result<IngestReport> {
    let mut report = IngestReport::default();

    for result in reader(input).records() {
        let fields = result.context("Failed to read school.txt")?;
        if is_comment(&fields) {
            continue;
        }
        match parse_school_line(&fields, schools) {
            Ok(_) => report.accepted += 1,
            Err(e) => report.reject("school.txt", &fields, e),
        }
    }

    info!(
        "🏫 Loaded {} schools ({} lines rejected)",
        report.accepted,
        report.errors.len()
    );
    Ok(report)
}

fn parse_school_line(fields: &StringRecord, schools: &mut SchoolRegistry) -> Result<usize, IngestError> {
    if fields.len() < SCHOOL_MIN_FIELDS {
        return Err(IngestError::Format {
            expected: format!("at least {}", SCHOOL_MIN_FIELDS),
            found: fields.len(),
        });
    }

    let aliases: Vec<&str> = fields.iter().skip(SCHOOL_MIN_FIELDS).collect();
    schools.create(&fields[2], &fields[0], &fields[1], &aliases)
}

// ============================================================================
// RAW RECORDS
// ============================================================================

/// Everything a raw line is resolved against and written into
pub struct RawIngestor<'a> {
    pub contests: &'a mut ContestRegistry,
    pub schools: &'a SchoolRegistry,
    pub grades: &'a GradeTable,
    pub oiers: &'a mut OierRegistry,
    pub store: &'a mut RecordStore,
}

impl<'a> RawIngestor<'a> {
    pub fn parse(&mut self, path: &Path) -> Result<IngestReport> {
        self.parse_from(open(path)?)
    }

    pub fn parse_from<R: Read>(&mut self, input: R) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for result in reader(input).records() {
            let fields = result.context("Failed to read raw.txt")?;
            if is_comment(&fields) {
                continue;
            }
            match self.parse_line(&fields) {
                Ok(_) => report.accepted += 1,
                Err(e) => {
                    if let IngestError::UnknownSchool(name) = &e {
                        report
                            .unknown_schools
                            .push((fields[6].to_string(), name.clone()));
                    }
                    report.reject("raw.txt", &fields, e);
                }
            }
        }

        info!(
            "📄 Loaded {} records into {} provisional OIers ({} lines rejected)",
            report.accepted,
            self.oiers.len(),
            report.errors.len()
        );
        Ok(report)
    }

    /// Validate one line, then rank it in its contest and store it
    pub fn parse_line(&mut self, fields: &StringRecord) -> Result<RecordId, IngestError> {
        if fields.len() != RAW_FIELDS {
            return Err(IngestError::Format {
                expected: RAW_FIELDS.to_string(),
                found: fields.len(),
            });
        }
        let (contest_name, level, name, grade_name, school_name, score, province, gender, identifier) = (
            &fields[0], &fields[1], &fields[2], &fields[3], &fields[4], &fields[5], &fields[6],
            &fields[7], &fields[8],
        );

        if name.is_empty() {
            return Err(IngestError::EmptyName);
        }
        let contest_id = self
            .contests
            .id_by_name(contest_name)
            .ok_or_else(|| IngestError::UnknownContest(contest_name.to_string()))?;
        let school = self
            .schools
            .id_by_name(school_name)
            .ok_or_else(|| IngestError::UnknownSchool(school_name.to_string()))?;
        let grades = self.grades.decode(grade_name)?;
        let score = parse_score(score).ok_or_else(|| IngestError::InvalidScore(score.to_string()))?;

        let owner = self.oiers.of(name, identifier);
        let contest = self.contests.get_mut(contest_id);
        let rank = contest.add_contestant(score, level);
        let id = self.store.push(NewRecord {
            owner,
            contest: contest_id,
            school_year: contest.school_year(),
            score,
            rank,
            level: level.to_string(),
            grades,
            school,
            province: province.to_string(),
            gender: Gender::from_name(gender),
        });
        self.oiers.add_record(owner, id);
        Ok(id)
    }
}

// ============================================================================
// TESTS
// ============================================================================
