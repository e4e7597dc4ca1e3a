// 🧩 Cluster Engine - greedy agglomerative merge of one bucket's records
//
// Start from singleton groups, repeatedly merge the closest pair while its
// distance stays within the threshold. Buckets carrying a manual identifier
// pass through untouched. Each final group becomes one canonical Oier.

use crate::distance::DistanceModel;
use crate::enrollment;
use crate::oier::{self, InitialsTable, Oier, OierRegistry, ProvisionalOier};
use crate::record::{Gender, RecordId, RecordStore};
use crate::retention::{check_stay_down, StayDown};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Default maximum distance at which two groups still merge
pub const DEFAULT_MERGE_THRESHOLD: i64 = 240;

/// Result of merging one bucket
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub groups: Vec<Vec<RecordId>>,
    pub merges: usize,
}

pub struct ClusterEngine<'a> {
    model: DistanceModel<'a>,
    threshold: i64,
    show_incomplete_merge: bool,
}

impl<'a> ClusterEngine<'a> {
    pub fn new(model: DistanceModel<'a>) -> Self {
        ClusterEngine {
            model,
            threshold: DEFAULT_MERGE_THRESHOLD,
            show_incomplete_merge: false,
        }
    }

    pub fn with_threshold(mut self, threshold: i64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Warn about buckets that did not collapse into a single person
    pub fn with_incomplete_merge_warnings(mut self, enabled: bool) -> Self {
        self.show_incomplete_merge = enabled;
        self
    }

    /// Merge groups until no pair is within the threshold
    ///
    /// Ties go to the first pair in (later index, earlier index) scan order,
    /// so the result is deterministic. Retention groups get their records
    /// flagged `keep_grade` before the union.
    pub fn merge_groups(&self, store: &mut RecordStore, mut groups: Vec<Vec<RecordId>>) -> MergeOutcome {
        let mut merges = 0;

        loop {
            let best = {
                let views: Vec<_> = groups.iter().map(|g| store.view(g)).collect();
                let mut best = None;
                for i in 0..views.len() {
                    for j in 0..i {
                        let dist = self.model.distance(&views[j], &views[i]);
                        if !dist.within(self.threshold) {
                            continue;
                        }
                        if best.as_ref().map_or(true, |(d, _, _)| dist < *d) {
                            best = Some((dist, j, i));
                        }
                    }
                }
                best.map(|(_, j, i)| (j, i, check_stay_down(&self.model, &views[j], &views[i])))
            };

            let Some((keep, absorbed, stay_down)) = best else {
                break;
            };

            let flagged = match stay_down {
                StayDown::LaterB => Some(keep),
                StayDown::LaterA => Some(absorbed),
                StayDown::None => None,
            };
            if let Some(group) = flagged {
                for &id in &groups[group] {
                    store.get_mut(id).keep_grade();
                }
            }

            let moved = groups.remove(absorbed);
            groups[keep].extend(moved);
            merges += 1;
        }

        MergeOutcome { groups, merges }
    }

    /// Split/merge one provisional bucket into final record groups
    pub fn cluster(&self, store: &mut RecordStore, bucket: &ProvisionalOier) -> Vec<Vec<RecordId>> {
        if bucket.is_manual() {
            return vec![bucket.records.clone()];
        }

        let singletons = bucket.records.iter().map(|&id| vec![id]).collect();
        let outcome = self.merge_groups(store, singletons);
        debug!(
            "'{}': {} records, {} merges, {} persons",
            bucket.name,
            bucket.records.len(),
            outcome.merges,
            outcome.groups.len()
        );
        if self.show_incomplete_merge && outcome.groups.len() != 1 {
            warn!(
                "'{}' not fully merged: {} → {}",
                bucket.name,
                bucket.records.len(),
                outcome.groups.len()
            );
        }
        outcome.groups
    }

    /// Cluster every bucket and build the canonical OIers
    pub fn resolve(
        &self,
        registry: &OierRegistry,
        store: &mut RecordStore,
        initials: &InitialsTable,
    ) -> Vec<Oier> {
        let mut oiers = Vec::new();
        for bucket in registry.buckets() {
            if bucket.records.is_empty() {
                continue;
            }
            for group in self.cluster(store, bucket) {
                oiers.push(build_oier(store, bucket, group, initials));
            }
        }
        oier::assign_owners(&oiers, store);
        oiers
    }
}

/// Canonical person for one final record group
pub fn build_oier(
    store: &RecordStore,
    bucket: &ProvisionalOier,
    group: Vec<RecordId>,
    initials: &InitialsTable,
) -> Oier {
    let records = store.view(&group);
    let uid = records.iter().map(|r| r.id).min().unwrap_or_default();

    // Enrollment year: weighted mode over records not flagged by retention,
    // earliest on ties
    let regular: Vec<_> = records.iter().filter(|r| !r.is_keep_grade()).collect();
    let em = if regular.is_empty() {
        enrollment::weighted_modal_years(records.iter().map(|r| &r.ems))
    } else {
        enrollment::weighted_modal_years(regular.iter().map(|r| &r.ems))
    }
    .first()
    .copied();

    // Gender only when every known value agrees
    let genders: BTreeSet<i8> = records
        .iter()
        .map(|r| r.gender.code())
        .filter(|&code| code != 0)
        .collect();
    let gender = match genders.into_iter().collect::<Vec<i8>>().as_slice() {
        [1] => Gender::Male,
        [-1] => Gender::Female,
        _ => Gender::Unknown,
    };

    Oier::new(
        uid,
        bucket.name.clone(),
        bucket.identifier.clone(),
        initials.initials(&bucket.name, &bucket.identifier),
        gender,
        em,
        group,
    )
}

// ============================================================================
// TESTS
// ============================================================================
