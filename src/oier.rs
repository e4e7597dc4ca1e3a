// 🧑‍🎓 OIer Entities - provisional buckets and canonical persons
//
// Ingestion groups records by raw (name, identifier) into provisional
// buckets. Clustering then splits/merges each bucket into canonical
// `Oier`s, and the buckets are thrown away.

use crate::record::{Gender, RecordId, RecordStore};
use anyhow::{Context, Result};
use num_rational::BigRational;
use num_traits::Zero;
use pinyin::ToPinyin;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// ============================================================================
// PROVISIONAL BUCKETS
// ============================================================================

/// Records sharing one raw (name, identifier) key
#[derive(Debug, Clone)]
pub struct ProvisionalOier {
    pub name: String,
    pub identifier: String,
    pub records: Vec<RecordId>,
}

impl ProvisionalOier {
    /// Identified by hand: never split or merged automatically
    pub fn is_manual(&self) -> bool {
        !self.identifier.is_empty()
    }
}

/// Scoped (name, identifier) → bucket map, owned by the pipeline
#[derive(Debug, Default)]
pub struct OierRegistry {
    buckets: Vec<ProvisionalOier>,
    index: HashMap<(String, String), usize>,
}

impl OierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the bucket for this key, creating it on first sight
    pub fn of(&mut self, name: &str, identifier: &str) -> usize {
        let key = (name.to_string(), identifier.to_string());
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }

        let idx = self.buckets.len();
        self.buckets.push(ProvisionalOier {
            name: name.to_string(),
            identifier: identifier.to_string(),
            records: Vec::new(),
        });
        self.index.insert(key, idx);
        idx
    }

    pub fn add_record(&mut self, bucket: usize, record: RecordId) {
        self.buckets[bucket].records.push(record);
    }

    pub fn buckets(&self) -> &[ProvisionalOier] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Drop every bucket (after clustering replaced them)
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.index.clear();
    }
}

// ============================================================================
// CANONICAL OIER
// ============================================================================

/// A resolved contestant
#[derive(Debug, Clone)]
pub struct Oier {
    /// Id of the earliest record in the final group
    pub uid: RecordId,
    pub name: String,
    pub identifier: String,
    pub initials: String,
    pub gender: Gender,

    /// Chosen middle-school enrollment year
    pub enroll_middle: Option<i32>,

    pub records: Vec<RecordId>,

    pub oierdb_score: BigRational,
    pub ccf_score: BigRational,
    pub ccf_level: u8,
}

impl Oier {
    pub fn new(
        uid: RecordId,
        name: String,
        identifier: String,
        initials: String,
        gender: Gender,
        enroll_middle: Option<i32>,
        records: Vec<RecordId>,
    ) -> Self {
        Oier {
            uid,
            name,
            identifier,
            initials,
            gender,
            enroll_middle,
            records,
            oierdb_score: BigRational::zero(),
            ccf_score: BigRational::zero(),
            ccf_level: 0,
        }
    }
}

/// Point every record's `owner` at the index of the OIer holding it
pub fn assign_owners(oiers: &[Oier], store: &mut RecordStore) {
    for (idx, oier) in oiers.iter().enumerate() {
        for &id in &oier.records {
            store.get_mut(id).owner = idx;
        }
    }
}

/// Ranking order: higher oierdb score first, then lower uid.
/// Record owners follow their OIer to its new index.
pub fn sort_by_score(oiers: &mut [Oier], store: &mut RecordStore) {
    oiers.sort_by(|a, b| {
        b.oierdb_score
            .cmp(&a.oierdb_score)
            .then_with(|| a.uid.cmp(&b.uid))
    });
    assign_owners(oiers, store);
}

// ============================================================================
// INITIALS
// ============================================================================

/// Pinyin initials with surname overrides (surnames.json)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitialsTable {
    /// Surname → initials of its characters (polyphonic readings)
    surnames: HashMap<String, Vec<String>>,
}

impl InitialsTable {
    pub fn new(surnames: HashMap<String, Vec<String>>) -> Self {
        InitialsTable { surnames }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read surnames file: {:?}", path.as_ref()))?;

        let surnames = serde_json::from_str(&content).context("Failed to parse surnames JSON")?;
        Ok(InitialsTable::new(surnames))
    }

    /// `<xyz>` in the identifier wins; otherwise pinyin first letters
    pub fn initials(&self, name: &str, identifier: &str) -> String {
        if let Some(explicit) = bracketed(identifier) {
            return explicit.to_string();
        }
        self.initial_list(name).concat()
    }

    fn initial_list(&self, name: &str) -> Vec<String> {
        let chars: Vec<char> = name.chars().collect();
        let mut initials: Vec<String> = name
            .to_pinyin()
            .zip(&chars)
            .map(|(pinyin, c)| match pinyin {
                Some(p) => p.first_letter().to_string(),
                None => c.to_string(),
            })
            .collect();

        // Every known surname prefix overrides its leading letters, longest first
        for len in (1..=chars.len()).rev() {
            let prefix: String = chars[..len].iter().collect();
            if let Some(letters) = self.surnames.get(&prefix) {
                initials.splice(..len, letters.iter().cloned());
            }
        }

        initials
    }
}

/// First `<word>` in the identifier
fn bracketed(identifier: &str) -> Option<&str> {
    identifier.match_indices('<').find_map(|(i, _)| {
        let rest = &identifier[i + 1..];
        let end = rest.find(|c: char| !(c.is_alphanumeric() || c == '_'))?;
        (end > 0 && rest[end..].starts_with('>')).then(|| &rest[..end])
    })
}

// ============================================================================
// TESTS
// ============================================================================
