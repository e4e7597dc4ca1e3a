// 🔁 Retention Detector - repeated grade vs. merge artifact
//
// Two groups that each pin exactly one enrollment year, one year apart, at
// the same school(s), are most likely one person who repeated a grade. The
// earlier-enrolled group then keeps its grades explicitly when serialized.

use crate::distance::DistanceModel;
use crate::record::Record;
use std::collections::BTreeSet;

/// Soft penalty at or above which a one-year gap is not called retention
const RETENTION_PENALTY_LIMIT: i64 = 100;

/// Outcome of `check_stay_down`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StayDown {
    /// Not a retention case
    None,
    /// B enrolled one year later: A's records must keep their grade
    LaterB,
    /// A enrolled one year later: B's records must keep their grade
    LaterA,
}

impl StayDown {
    /// 0, +1 (B is the later group) or -1 (A is)
    pub fn signum(&self) -> i32 {
        match self {
            StayDown::None => 0,
            StayDown::LaterB => 1,
            StayDown::LaterA => -1,
        }
    }
}

fn single_year(group: &[&Record]) -> Option<i32> {
    let years: BTreeSet<i32> = group.iter().flat_map(|r| r.ems.keys().copied()).collect();
    match years.len() {
        1 => years.first().copied(),
        _ => None,
    }
}

/// Decide whether merging A and B is explained by a repeated grade
pub fn check_stay_down(model: &DistanceModel<'_>, a: &[&Record], b: &[&Record]) -> StayDown {
    assert!(
        !a.is_empty() && !b.is_empty(),
        "stay-down check requires two non-empty record groups"
    );

    let (Some(year_a), Some(year_b)) = (single_year(a), single_year(b)) else {
        return StayDown::None;
    };
    if a.len() < 2 || b.len() < 2 || (year_a - year_b).abs() != 1 {
        return StayDown::None;
    }

    let later = if year_b > year_a { b } else { a };
    if later.len() < 2 {
        return StayDown::None;
    }

    if model.soft_penalty(a.iter().chain(b).copied()) >= RETENTION_PENALTY_LIMIT {
        return StayDown::None;
    }

    if year_b > year_a {
        StayDown::LaterB
    } else {
        StayDown::LaterA
    }
}

// ============================================================================
// TESTS
// ============================================================================
