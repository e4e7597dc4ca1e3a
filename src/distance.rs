// 📏 Distance Model - how mergeable are two groups of records?
//
// Two layers:
// 1. Hard vetoes: any record pair across the groups that cannot belong to one
//    person makes the distance infinite.
// 2. Soft cost: school/location/province spread plus enrollment-year gap,
//    scaled by a risk coefficient (max over the triggered risk signals).
//
// Every rule is checked in both orientations, so distance(A, B) equals
// distance(B, A).

use crate::contest::ContestRegistry;
use crate::enrollment;
use crate::grades::{Stage, JUNIOR_FIRST, SENIOR_FIRST, SENIOR_THIRD};
use crate::record::Record;
use crate::school::SchoolRegistry;
use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum contest-year span a single person may cover
pub const DEFAULT_MAX_YEAR_SPAN: i32 = 9;

/// Base penalty by number of distinct schools
fn school_penalty(schools: usize) -> i64 {
    match schools {
        0 => 0,
        1 => -40,
        2 => 60,
        3 => 120,
        4 => 180,
        5 => 300,
        _ => 600,
    }
}

// ============================================================================
// DISTANCE
// ============================================================================

/// Merge cost between two groups; `Infinite` means never merge
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Distance {
    Finite(Rational64),
    Infinite,
}

impl Distance {
    pub fn finite(cost: i64) -> Self {
        Distance::Finite(Rational64::from_integer(cost))
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Distance::Infinite)
    }

    /// Finite and no greater than `threshold`
    pub fn within(&self, threshold: i64) -> bool {
        match self {
            Distance::Finite(cost) => *cost <= Rational64::from_integer(threshold),
            Distance::Infinite => false,
        }
    }
}

/// Which hard rule forbade a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Veto {
    /// Records span too many contest years
    YearSpan,
    /// Same contest twice
    SameContest,
    /// Male record against female record
    GenderConflict,
    /// 初一 one school year, 高一 the next
    StageSkip,
    /// Same school stage in two provinces
    CrossProvinceStage,
    /// Two schools in one school year
    SchoolSplitInYear,
    /// Two primary schools
    PrimarySchoolChange,
    /// Same school year without a shared enrollment year
    DisjointEnrollment,
    /// Same contest family in one school year at different schools
    SameFamilySchoolSplit,
    /// A primary school after a secondary school
    PrimaryAfterSecondary,
}

// ============================================================================
// DISTANCE MODEL
// ============================================================================

pub struct DistanceModel<'a> {
    contests: &'a ContestRegistry,
    schools: &'a SchoolRegistry,
    max_year_span: i32,
}

impl<'a> DistanceModel<'a> {
    pub fn new(contests: &'a ContestRegistry, schools: &'a SchoolRegistry) -> Self {
        DistanceModel {
            contests,
            schools,
            max_year_span: DEFAULT_MAX_YEAR_SPAN,
        }
    }

    pub fn with_max_year_span(mut self, max_year_span: i32) -> Self {
        self.max_year_span = max_year_span;
        self
    }

    /// Merge cost between two non-empty, disjoint groups
    pub fn distance(&self, a: &[&Record], b: &[&Record]) -> Distance {
        if self.veto(a, b).is_some() {
            return Distance::Infinite;
        }

        let base = self.soft_penalty(a.iter().chain(b).copied())
            + 100 * self.enrollment_gap(a, b);
        let cost = Rational64::from_integer(base) * self.risk_coefficient(a, b);
        Distance::Finite(cost)
    }

    /// First hard rule that forbids merging the groups, if any
    pub fn veto(&self, a: &[&Record], b: &[&Record]) -> Option<Veto> {
        assert!(
            !a.is_empty() && !b.is_empty(),
            "distance requires two non-empty record groups"
        );

        let years = a.iter().chain(b).map(|r| self.contests.get(r.contest).year);
        let (min, max) = years.fold((i32::MAX, i32::MIN), |(lo, hi), y| (lo.min(y), hi.max(y)));
        if max - min > self.max_year_span {
            return Some(Veto::YearSpan);
        }

        a.iter()
            .flat_map(|x| b.iter().map(move |y| (*x, *y)))
            .find_map(|(x, y)| self.pair_veto(x, y))
    }

    fn pair_veto(&self, x: &Record, y: &Record) -> Option<Veto> {
        let cx = self.contests.get(x.contest);
        let cy = self.contests.get(y.contest);
        let (sx, sy) = (cx.school_year(), cy.school_year());
        let same_year = sx == sy;
        let other_school = x.school != y.school;
        let (stage_x, stage_y) = (Stage::of(x.grades), Stage::of(y.grades));

        if x.contest == y.contest {
            return Some(Veto::SameContest);
        }
        if x.gender.conflicts_with(y.gender) {
            return Some(Veto::GenderConflict);
        }
        let skips = |early: &Record, late: &Record| {
            early.grades == JUNIOR_FIRST && late.grades == SENIOR_FIRST
        };
        if (sy - sx == 1 && skips(x, y)) || (sx - sy == 1 && skips(y, x)) {
            return Some(Veto::StageSkip);
        }
        if stage_x.is_some() && stage_x == stage_y && x.province != y.province {
            return Some(Veto::CrossProvinceStage);
        }
        if same_year && other_school {
            return Some(Veto::SchoolSplitInYear);
        }
        if stage_x == Some(Stage::Primary) && stage_y == Some(Stage::Primary) && other_school {
            return Some(Veto::PrimarySchoolChange);
        }
        if same_year && x.ems.keys().all(|year| !y.ems.contains_key(year)) {
            return Some(Veto::DisjointEnrollment);
        }
        if same_year && other_school && cx.family().is_some() && cx.family() == cy.family() {
            return Some(Veto::SameFamilySchoolSplit);
        }
        let primary_after_secondary = |early: &Record, late: &Record| {
            self.schools.get(early.school).looks_secondary()
                && self.schools.get(late.school).looks_primary()
        };
        if (sx < sy && primary_after_secondary(x, y)) || (sy < sx && primary_after_secondary(y, x))
        {
            return Some(Veto::PrimaryAfterSecondary);
        }

        None
    }

    /// School-count penalty plus location/province spread over a record set
    pub fn soft_penalty<'r, I>(&self, records: I) -> i64
    where
        I: IntoIterator<Item = &'r Record>,
    {
        let mut schools = HashSet::new();
        let mut locations = HashSet::new();
        let mut provinces = HashSet::new();
        for record in records {
            schools.insert(record.school);
            locations.insert(self.schools.get(record.school).location());
            provinces.insert(record.province.as_str());
        }

        school_penalty(schools.len()) + 80 * (locations.len() as i64 + provinces.len() as i64 - 3)
    }

    /// Smallest gap between the modal enrollment years of the two groups
    pub fn enrollment_gap(&self, a: &[&Record], b: &[&Record]) -> i64 {
        let modal_a = enrollment::modal_years(a.iter().map(|r| &r.ems));
        let modal_b = enrollment::modal_years(b.iter().map(|r| &r.ems));

        modal_a
            .iter()
            .flat_map(|i| modal_b.iter().map(move |j| (i - j).abs() as i64))
            .min()
            .unwrap_or(0)
    }

    /// Multiplier for risky-but-allowed merges; the largest signal wins
    pub fn risk_coefficient(&self, a: &[&Record], b: &[&Record]) -> Rational64 {
        let mut coefficient = Rational64::from_integer(1);

        let cross_province_jump = |x: &Record, y: &Record| {
            x.grades == SENIOR_THIRD && y.grades == JUNIOR_FIRST && x.province != y.province
        };
        let jump = a
            .iter()
            .flat_map(|x| b.iter().map(move |y| (*x, *y)))
            .any(|(x, y)| cross_province_jump(x, y) || cross_province_jump(y, x));
        if jump {
            coefficient = coefficient.max(Rational64::from_integer(3));
        }

        for stage in Stage::ALL {
            let mut schools: Vec<usize> = a
                .iter()
                .chain(b)
                .filter(|r| Stage::of(r.grades) == Some(stage))
                .map(|r| r.school)
                .collect();
            schools.sort_unstable();
            schools.dedup();

            if schools.len() >= 3 {
                coefficient = coefficient.max(Rational64::from_integer(5));
            } else if schools.len() == 2
                && self.schools.get(schools[0]).location() == self.schools.get(schools[1]).location()
            {
                coefficient = coefficient.max(Rational64::new(5, 2));
            }
        }

        coefficient
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::contest::ContestInfo;
    use crate::grades::{GradeMask, JUNIOR_MASK};
    use crate::record::{Gender, NewRecord, RecordId, RecordStore};
    use proptest::prelude::*;

    /// Small world of contests and schools shared by the engine tests
    pub(crate) struct Fixture {
        pub contests: ContestRegistry,
        pub schools: SchoolRegistry,
        pub store: RecordStore,
    }

    impl Fixture {
        pub fn new() -> Self {
            let mut contests = ContestRegistry::new();
            for year in 2008..=2020 {
                contests.create(ContestInfo {
                    name: format!("NOIP{}提高", year),
                    contest_type: "NOIP提高".to_string(),
                    year,
                    fall_semester: true,
                    capacity: None,
                });
                contests.create(ContestInfo {
                    name: format!("NOI{}", year),
                    contest_type: "NOI".to_string(),
                    year,
                    fall_semester: false,
                    capacity: None,
                });
            }

            let mut schools = SchoolRegistry::new();
            for (name, province, city) in [
                ("杭州第二中学", "浙江", "杭州"),
                ("杭州学军中学", "浙江", "杭州"),
                ("宁波镇海中学", "浙江", "宁波"),
                ("南京外国语学校", "江苏", "南京"),
                ("杭州天长小学", "浙江", "杭州"),
                ("杭州胜利小学", "浙江", "杭州"),
                ("温州中学", "浙江", "温州"),
            ] {
                schools.create(name, province, city, &[]).unwrap();
            }

            Fixture {
                contests,
                schools,
                store: RecordStore::new(),
            }
        }

        pub fn contest(&self, name: &str) -> usize {
            self.contests.id_by_name(name).unwrap()
        }

        pub fn school(&self, name: &str) -> usize {
            self.schools.id_by_name(name).unwrap()
        }

        pub fn add(
            &mut self,
            contest: &str,
            grades: GradeMask,
            school: &str,
            province: &str,
            gender: Gender,
        ) -> RecordId {
            let contest = self.contest(contest);
            let school = self.school(school);
            let school_year = self.contests.get(contest).school_year();
            let rank = self.contests.get_mut(contest).add_contestant(Some(100.0), "一等奖");
            self.store.push(NewRecord {
                owner: 0,
                contest,
                school_year,
                score: Some(100.0),
                rank,
                level: "一等奖".to_string(),
                grades,
                school,
                province: province.to_string(),
                gender,
            })
        }

        pub fn model(&self) -> DistanceModel<'_> {
            DistanceModel::new(&self.contests, &self.schools)
        }

        pub fn distance(&self, a: &[RecordId], b: &[RecordId]) -> Distance {
            self.model().distance(&self.store.view(a), &self.store.view(b))
        }

        pub fn veto(&self, a: &[RecordId], b: &[RecordId]) -> Option<Veto> {
            self.model().veto(&self.store.view(a), &self.store.view(b))
        }
    }

    fn grade(n: i32) -> GradeMask {
        1 << (n + 15)
    }

    #[test]
    fn test_same_person_next_year() {
        let mut f = Fixture::new();
        let a = f.add("NOIP2010提高", grade(1), "杭州第二中学", "浙江", Gender::Male);
        let b = f.add("NOIP2011提高", grade(2), "杭州第二中学", "浙江", Gender::Male);

        // -40 (one school) + 80 * (1 + 1 - 3) + 0 = -120
        assert_eq!(f.distance(&[a], &[b]), Distance::finite(-120));
        assert!(f.distance(&[a], &[b]).within(240));
    }

    #[test]
    fn test_enrollment_gap_costs_100_per_year() {
        let mut f = Fixture::new();
        let a = f.add("NOIP2010提高", grade(1), "杭州第二中学", "浙江", Gender::Unknown);
        let b = f.add("NOIP2011提高", grade(3), "杭州第二中学", "浙江", Gender::Unknown);

        assert_eq!(f.distance(&[a], &[b]), Distance::finite(-20));
    }

    #[test]
    fn test_same_contest_vetoed() {
        let mut f = Fixture::new();
        let a = f.add("NOIP2010提高", grade(1), "杭州第二中学", "浙江", Gender::Male);
        let b = f.add("NOIP2010提高", grade(1), "杭州第二中学", "浙江", Gender::Male);

        assert_eq!(f.veto(&[a], &[b]), Some(Veto::SameContest));
        assert!(f.distance(&[a], &[b]).is_infinite());
    }

    #[test]
    fn test_opposite_gender_vetoed() {
        let mut f = Fixture::new();
        let a = f.add("NOIP2010提高", grade(1), "杭州第二中学", "浙江", Gender::Male);
        let b = f.add("NOIP2011提高", grade(2), "杭州第二中学", "浙江", Gender::Female);
        let c = f.add("NOIP2012提高", grade(3), "杭州第二中学", "浙江", Gender::Unknown);

        assert_eq!(f.veto(&[a], &[b]), Some(Veto::GenderConflict));
        assert_eq!(f.veto(&[a], &[c]), None);
    }

    #[test]
    fn test_year_span_vetoed() {
        let mut f = Fixture::new();
        let a = f.add("NOIP2008提高", JUNIOR_MASK, "杭州第二中学", "浙江", Gender::Unknown);
        let b = f.add("NOIP2018提高", JUNIOR_MASK, "杭州第二中学", "浙江", Gender::Unknown);
        let c = f.add("NOIP2017提高", JUNIOR_MASK, "杭州第二中学", "浙江", Gender::Unknown);

        assert_eq!(f.veto(&[a], &[b]), Some(Veto::YearSpan));
        assert_ne!(f.veto(&[a], &[c]), Some(Veto::YearSpan));
    }

    #[test]
    fn test_stage_skip_vetoed() {
        let mut f = Fixture::new();
        let a = f.add("NOIP2010提高", JUNIOR_FIRST, "杭州第二中学", "浙江", Gender::Unknown);
        let b = f.add("NOIP2011提高", SENIOR_FIRST, "杭州第二中学", "浙江", Gender::Unknown);

        assert_eq!(f.veto(&[a], &[b]), Some(Veto::StageSkip));
        assert_eq!(f.veto(&[b], &[a]), Some(Veto::StageSkip));
    }

    #[test]
    fn test_cross_province_same_stage_vetoed() {
        let mut f = Fixture::new();
        let a = f.add("NOIP2010提高", grade(4), "杭州第二中学", "浙江", Gender::Unknown);
        let b = f.add("NOIP2011提高", grade(5), "南京外国语学校", "江苏", Gender::Unknown);

        assert_eq!(f.veto(&[a], &[b]), Some(Veto::CrossProvinceStage));
    }

    #[test]
    fn test_two_schools_in_one_school_year_vetoed() {
        let mut f = Fixture::new();
        // NOIP2010 (autumn) and NOI2011 (spring) share school year 2010
        let a = f.add("NOIP2010提高", grade(4), "杭州第二中学", "浙江", Gender::Unknown);
        let b = f.add("NOI2011", grade(4), "杭州学军中学", "浙江", Gender::Unknown);

        assert_eq!(f.veto(&[a], &[b]), Some(Veto::SchoolSplitInYear));
    }

    #[test]
    fn test_disjoint_enrollment_in_one_school_year_vetoed() {
        let mut f = Fixture::new();
        let a = f.add("NOIP2010提高", grade(4), "杭州第二中学", "浙江", Gender::Unknown);
        let b = f.add("NOI2011", grade(5), "杭州第二中学", "浙江", Gender::Unknown);
        let c = f.add("NOI2011", grade(4), "杭州第二中学", "浙江", Gender::Unknown);

        assert_eq!(f.veto(&[a], &[b]), Some(Veto::DisjointEnrollment));
        assert_eq!(f.veto(&[a], &[c]), None);
    }

    #[test]
    fn test_primary_school_change_vetoed() {
        let mut f = Fixture::new();
        let a = f.add("NOIP2010提高", grade(-1), "杭州天长小学", "浙江", Gender::Unknown);
        let b = f.add("NOIP2011提高", grade(0), "杭州胜利小学", "浙江", Gender::Unknown);

        assert_eq!(f.veto(&[a], &[b]), Some(Veto::PrimarySchoolChange));
    }

    #[test]
    fn test_primary_after_secondary_vetoed() {
        let mut f = Fixture::new();
        // Grades compatible on paper, but a 中学 record followed by a 小学 one
        let a = f.add("NOIP2010提高", JUNIOR_MASK, "杭州第二中学", "浙江", Gender::Unknown);
        let b = f.add("NOIP2012提高", JUNIOR_MASK, "杭州天长小学", "浙江", Gender::Unknown);

        assert_eq!(f.veto(&[a], &[b]), Some(Veto::PrimaryAfterSecondary));
        assert_eq!(f.veto(&[b], &[a]), Some(Veto::PrimaryAfterSecondary));
    }

    #[test]
    fn test_three_schools_in_a_stage_scaled_by_five() {
        let mut f = Fixture::new();
        let a = f.add("NOIP2010提高", grade(4), "杭州第二中学", "浙江", Gender::Unknown);
        let b = f.add("NOIP2011提高", grade(5), "宁波镇海中学", "浙江", Gender::Unknown);
        let c = f.add("NOIP2012提高", grade(6), "温州中学", "浙江", Gender::Unknown);

        // 120 + 80 * (3 + 1 - 3) + 0 = 200, times 5
        assert_eq!(f.distance(&[a, b], &[c]), Distance::finite(1000));
    }

    #[test]
    fn test_two_schools_same_location_scaled_by_two_and_a_half() {
        let mut f = Fixture::new();
        let a = f.add("NOIP2010提高", grade(4), "杭州第二中学", "浙江", Gender::Unknown);
        let b = f.add("NOIP2011提高", grade(5), "杭州学军中学", "浙江", Gender::Unknown);
        let model = f.model();

        let (va, vb) = (f.store.view(&[a]), f.store.view(&[b]));
        assert_eq!(model.risk_coefficient(&va, &vb), Rational64::new(5, 2));
        // 60 + 80 * (1 + 1 - 3) = -20, times 5/2
        assert_eq!(f.distance(&[a], &[b]), Distance::finite(-50));
    }

    #[test]
    fn test_senior_third_to_junior_first_across_provinces_scaled_by_three() {
        let mut f = Fixture::new();
        let a = f.add("NOIP2012提高", SENIOR_THIRD, "杭州第二中学", "浙江", Gender::Unknown);
        let b = f.add("NOIP2010提高", JUNIOR_FIRST, "南京外国语学校", "江苏", Gender::Unknown);
        let model = f.model();

        let (va, vb) = (f.store.view(&[a]), f.store.view(&[b]));
        assert_eq!(model.risk_coefficient(&va, &vb), Rational64::from_integer(3));
        assert_eq!(model.risk_coefficient(&vb, &va), Rational64::from_integer(3));
    }

    #[test]
    fn test_largest_risk_signal_wins() {
        // three senior schools (5) and a cross-province jump (3)
        let mut f = Fixture::new();
        let a = f.add("NOIP2012提高", SENIOR_THIRD, "杭州第二中学", "浙江", Gender::Unknown);
        let b = f.add("NOIP2011提高", grade(5), "宁波镇海中学", "浙江", Gender::Unknown);
        let c = f.add("NOIP2010提高", JUNIOR_FIRST, "南京外国语学校", "江苏", Gender::Unknown);
        let d = f.add("NOIP2010提高", grade(4), "温州中学", "浙江", Gender::Unknown);
        let model = f.model();

        let (va, vb) = (f.store.view(&[a, b]), f.store.view(&[c, d]));
        assert_eq!(model.risk_coefficient(&va, &vb), Rational64::from_integer(5));
        assert_eq!(model.risk_coefficient(&vb, &va), Rational64::from_integer(5));

        // two senior schools in one city (5/2) and a cross-province jump (3)
        let mut f = Fixture::new();
        let a = f.add("NOIP2012提高", SENIOR_THIRD, "杭州第二中学", "浙江", Gender::Unknown);
        let c = f.add("NOIP2010提高", JUNIOR_FIRST, "南京外国语学校", "江苏", Gender::Unknown);
        let d = f.add("NOIP2010提高", grade(4), "杭州学军中学", "浙江", Gender::Unknown);
        let model = f.model();

        let (va, vb) = (f.store.view(&[a]), f.store.view(&[c, d]));
        assert_eq!(model.risk_coefficient(&va, &vb), Rational64::from_integer(3));
        assert_eq!(model.risk_coefficient(&vb, &va), Rational64::from_integer(3));
    }

    #[test]
    #[should_panic(expected = "non-empty")]
    fn test_empty_group_panics() {
        let mut f = Fixture::new();
        let a = f.add("NOIP2010提高", grade(1), "杭州第二中学", "浙江", Gender::Unknown);
        f.distance(&[a], &[]);
    }

    fn arb_record() -> impl Strategy<Value = (usize, i32, usize, bool, i8)> {
        (0usize..8, -2i32..=6, 0usize..7, any::<bool>(), -1i8..=1)
    }

    proptest! {
        #[test]
        fn property_distance_is_symmetric(
            left in prop::collection::vec(arb_record(), 1..4),
            right in prop::collection::vec(arb_record(), 1..4),
        ) {
            let mut f = Fixture::new();
            let add = |f: &mut Fixture, (year, g, school, spring, gender): (usize, i32, usize, bool, i8)| {
                let contest = if spring {
                    format!("NOI{}", 2010 + year)
                } else {
                    format!("NOIP{}提高", 2010 + year)
                };
                let school_name = f.schools.get(school).name.clone();
                let province = f.schools.get(school).province.clone();
                let gender = match gender {
                    1 => Gender::Male,
                    -1 => Gender::Female,
                    _ => Gender::Unknown,
                };
                f.add(&contest, grade(g), &school_name, &province, gender)
            };
            let a: Vec<RecordId> = left.into_iter().map(|r| add(&mut f, r)).collect();
            let b: Vec<RecordId> = right.into_iter().map(|r| add(&mut f, r)).collect();

            let model = f.model();
            let (va, vb) = (f.store.view(&a), f.store.view(&b));
            prop_assert_eq!(model.distance(&va, &vb), model.distance(&vb, &va));
            prop_assert_eq!(
                model.soft_penalty(va.iter().chain(&vb).copied()),
                model.soft_penalty(vb.iter().chain(&va).copied())
            );
            prop_assert_eq!(model.enrollment_gap(&va, &vb), model.enrollment_gap(&vb, &va));
        }
    }
}
