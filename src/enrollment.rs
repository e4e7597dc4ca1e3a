// 📅 Enrollment Estimator - candidate middle-school enrollment years
//
// Every record carries `ems`: candidate year → priority weight (1 or 2).
// Records of the same person line up across contests through these years.

use crate::grades::{grade_of_bit, GradeMask, PRIMARY_OR_NONE};
use std::collections::BTreeMap;

/// Candidate enrollment years with their priority weights
pub type Ems = BTreeMap<i32, u32>;

/// Candidate enrollment years for a contest in `school_year` and a grade set
///
/// Weight is 2, except that the ambiguous "primary or none" mask gives its
/// non-school grades (above 5) weight 1.
pub fn estimate(school_year: i32, grades: GradeMask) -> Ems {
    let primary_or_none = grades == PRIMARY_OR_NONE;
    let mut ems = Ems::new();

    for bit in 0..32 {
        if grades & (1 << bit) == 0 {
            continue;
        }
        let grade = grade_of_bit(bit);
        let weight = if primary_or_none && grade > 5 { 1 } else { 2 };
        ems.insert(school_year - grade + 1, weight);
    }

    ems
}

/// Most frequent years across the key sets (weights ignored), ascending
pub fn modal_years<'a, I>(sets: I) -> Vec<i32>
where
    I: IntoIterator<Item = &'a Ems>,
{
    let mut counter: BTreeMap<i32, u32> = BTreeMap::new();
    for ems in sets {
        for &year in ems.keys() {
            *counter.entry(year).or_insert(0) += 1;
        }
    }
    most_common(&counter)
}

/// Years with the highest summed weight, ascending
pub fn weighted_modal_years<'a, I>(sets: I) -> Vec<i32>
where
    I: IntoIterator<Item = &'a Ems>,
{
    let mut counter: BTreeMap<i32, u32> = BTreeMap::new();
    for ems in sets {
        for (&year, &weight) in ems {
            *counter.entry(year).or_insert(0) += weight;
        }
    }
    most_common(&counter)
}

fn most_common(counter: &BTreeMap<i32, u32>) -> Vec<i32> {
    let Some(&most) = counter.values().max() else {
        return Vec::new();
    };
    counter
        .iter()
        .filter(|(_, count)| **count == most)
        .map(|(&year, _)| year)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
