// 📈 Score Engine - oierdb score and CCF level per resolved OIer
//
// All arithmetic is exact (BigRational): CCF thresholds compare against
// exact boundary values, and school totals are summed across every OIer.

use crate::contest::ContestRegistry;
use crate::oier::Oier;
use crate::record::{Record, RecordStore};
use crate::school::SchoolScores;
use anyhow::{anyhow, Context, Result};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::Zero;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::warn;

/// NOI medal → CCF level
const NOI_LEVELS: [(&str, u8); 3] = [("金牌", 10), ("银牌", 9), ("铜牌", 8)];

/// Contest types scored on a sliding scale, with their top score
const SCALED_CONTESTS: [(&str, i64); 4] = [("APIO", 500), ("CTS", 800), ("CTSC", 800), ("WC", 600)];

/// Accumulated scaled score → CCF level, highest first
const SCORE_LEVELS: [(i64, u8); 3] = [(1000, 10), (500, 9), (250, 8)];

const SENIOR_TYPES: [&str; 3] = ["NOIP", "NOIP提高", "CSP提高"];
const JUNIOR_TYPES: [&str; 2] = ["NOIP普及", "CSP入门"];

fn int(n: i64) -> BigRational {
    BigRational::from_integer(BigInt::from(n))
}

fn ratio(n: i64, d: i64) -> BigRational {
    BigRational::new(BigInt::from(n), BigInt::from(d))
}

/// Parse a plain decimal string ("1.25", "-0.5", "3") exactly
pub fn parse_decimal(raw: &str) -> Option<BigRational> {
    let raw = raw.trim();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let numer: BigInt = format!("{}{}", whole, fraction).parse().ok()?;
    let denom = num_traits::pow(BigInt::from(10), fraction.len());
    let value = BigRational::new(numer, denom);
    Some(if negative { -value } else { value })
}

// ============================================================================
// SCORING TABLE
// ============================================================================

/// Contest type → contribution coefficient (scoring.json)
#[derive(Debug, Clone, Default)]
pub struct ScoringTable {
    coefficients: HashMap<String, BigRational>,
}

impl ScoringTable {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read scoring file: {:?}", path.as_ref()))?;

        let raw: HashMap<String, String> =
            serde_json::from_str(&content).context("Failed to parse scoring JSON")?;
        ScoringTable::from_map(raw)
    }

    pub fn from_map(raw: HashMap<String, String>) -> Result<Self> {
        let coefficients = raw
            .into_iter()
            .map(|(contest_type, value)| {
                let coefficient = parse_decimal(&value).ok_or_else(|| {
                    anyhow!("Invalid coefficient for '{}': '{}'", contest_type, value)
                })?;
                Ok((contest_type, coefficient))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(ScoringTable { coefficients })
    }

    pub fn get(&self, contest_type: &str) -> Option<&BigRational> {
        self.coefficients.get(contest_type)
    }
}

// ============================================================================
// CCF RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CcfResult {
    pub score: BigRational,
    pub level: u8,
}

// ============================================================================
// SCORE ENGINE
// ============================================================================

pub struct ScoreEngine<'a> {
    contests: &'a ContestRegistry,
    scoring: &'a ScoringTable,
    rank_table: Vec<BigRational>,
}

impl<'a> ScoreEngine<'a> {
    pub fn new(contests: &'a ContestRegistry, scoring: &'a ScoringTable) -> Self {
        ScoreEngine {
            contests,
            scoring,
            rank_table: build_rank_table(),
        }
    }

    /// Score one OIer: orders its records by contest, then fills in the CCF
    /// result and oierdb score, adding every contribution to the record's
    /// school in `school_scores`.
    pub fn analyze(&self, oier: &mut Oier, store: &RecordStore, school_scores: &mut SchoolScores) {
        oier.records.sort_by_key(|&id| store.get(id).contest);
        let records = store.view(&oier.records);

        let ccf = self.ccf(&records);
        oier.ccf_score = ccf.score;
        oier.ccf_level = ccf.level;
        oier.oierdb_score = self.oierdb_score(&oier.name, &records, school_scores);
    }

    /// Decaying, rank-weighted, contest-weighted sum over the records
    pub fn oierdb_score(
        &self,
        name: &str,
        records: &[&Record],
        school_scores: &mut SchoolScores,
    ) -> BigRational {
        let mut total = BigRational::zero();
        for record in records {
            let contest = self.contests.get(record.contest);
            let contribution = decay_coefficient(contest.year)
                * self.rank_coefficient(record.rank, contest.n_contestants(), name)
                * self.contest_type_coefficient(&contest.contest_type, name);
            school_scores.add(record.school, &contribution);
            total += contribution;
        }
        total
    }

    /// CCF level and score from records already ordered by contest
    pub fn ccf(&self, records: &[&Record]) -> CcfResult {
        let mut level = 0u8;
        let mut scaled: BTreeMap<&str, BigRational> = BTreeMap::new();
        let mut score = BigRational::zero();

        for record in records {
            let contest = self.contests.get(record.contest);
            let contest_type = contest.contest_type.as_str();
            let rank = record.rank as i64;
            let capacity = || {
                contest
                    .capacity
                    .map(i64::from)
                    .filter(|&c| c > 0)
                    .unwrap_or_else(|| i64::from(contest.level_count("一等奖")) * 5)
            };

            if contest_type == "NOI" {
                let medal = NOI_LEVELS
                    .iter()
                    .find(|(name, _)| *name == record.level)
                    .map_or(0, |&(_, l)| l);
                level = level.max(medal);
            } else if SENIOR_TYPES.contains(&contest_type) {
                let n = capacity();
                let l = if rank * 10 <= n {
                    7
                } else if rank * 5 <= n {
                    6
                } else if rank * 2 <= n {
                    4
                } else {
                    3
                };
                level = level.max(l);
            } else if JUNIOR_TYPES.contains(&contest_type) {
                let n = capacity();
                let l = if rank * 5 <= n {
                    5
                } else if rank * 2 <= n {
                    4
                } else {
                    3
                };
                level = level.max(l);
            } else if let Some(&(_, top)) =
                SCALED_CONTESTS.iter().find(|(t, _)| *t == contest_type)
            {
                let n = i64::from(contest.n_contestants());
                let value = if n > 1 {
                    int(top) - int(rank - 1) * ratio(top - 50, n - 1)
                } else {
                    int(top)
                };
                let best = scaled.entry(contest_type).or_insert_with(BigRational::zero);
                if value > *best {
                    *best = value;
                }
            }

            score = scaled.values().fold(BigRational::zero(), |acc, v| acc + v);
            if let Some(&(_, l)) = SCORE_LEVELS.iter().find(|(bound, _)| score >= int(*bound)) {
                level = level.max(l);
            }
        }

        CcfResult { score, level }
    }

    /// Coefficient from the rank table; odd ranks are clamped
    pub fn rank_coefficient(&self, rank: u32, total: u32, name: &str) -> BigRational {
        if !(1..=total).contains(&rank) {
            warn!("Odd rank {} / {} (from '{}'), clamped", rank, total, name);
        }
        let total = total.max(1) as usize;
        let rank = (rank as usize).clamp(1, total);
        self.rank_table[400 * rank / total].clone()
    }

    /// Coefficient for a contest type; unknown types contribute nothing
    pub fn contest_type_coefficient(&self, contest_type: &str, name: &str) -> BigRational {
        match self.scoring.get(contest_type) {
            Some(c) => c.clone(),
            None => {
                warn!("Unknown contest type '{}' (from '{}'), not scored", contest_type, name);
                BigRational::zero()
            }
        }
    }
}

/// (5/4)^(year - 2000)
pub fn decay_coefficient(year: i32) -> BigRational {
    let exp = (year - 2000).unsigned_abs() as usize;
    let five = num_traits::pow(BigInt::from(5), exp);
    let four = num_traits::pow(BigInt::from(4), exp);
    if year >= 2000 {
        BigRational::new(five, four)
    } else {
        BigRational::new(four, five)
    }
}

/// 401 descending coefficients indexed by 400 * rank / total
fn build_rank_table() -> Vec<BigRational> {
    let top = (40..=100).rev().map(int);
    let middle = (51..=239).rev().map(|i| ratio(15 * i, 100));
    let tail = (0..=150).rev().map(|i| ratio(5 * i, 100));
    top.chain(middle).chain(tail).collect()
}

// ============================================================================
// TESTS
// ============================================================================
