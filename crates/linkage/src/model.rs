use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sources & fields
// ---------------------------------------------------------------------------

/// Which side of the linkage a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    A,
    B,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "a"),
            Self::B => write!(f, "b"),
        }
    }
}

/// Mediated-schema attributes shared by both sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Make,
    Model,
    Year,
    Price,
    Mileage,
    Fuel,
    Transmission,
    State,
    Region,
    Description,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Make,
        Field::Model,
        Field::Year,
        Field::Price,
        Field::Mileage,
        Field::Fuel,
        Field::Transmission,
        Field::State,
        Field::Region,
        Field::Description,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Make => "make",
            Self::Model => "model",
            Self::Year => "year",
            Self::Price => "price",
            Self::Mileage => "mileage",
            Self::Fuel => "fuel",
            Self::Transmission => "transmission",
            Self::State => "state",
            Self::Region => "region",
            Self::Description => "description",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A mediated attribute value. `Missing` is distinct from an empty string:
/// a field absent in the origin schema (or blank in the row) never competes
/// with a present-but-short value during comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Present(String),
    Missing,
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Present(s) => Some(s),
            Self::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// A single mediated listing from one source.
///
/// String attributes are normalized by the loader; price/mileage/year also
/// carry parsed numerics so the comparator never re-parses display strings.
#[derive(Debug, Clone)]
pub struct Record {
    pub source: Source,
    pub id: u64,
    pub make: FieldValue,
    pub model: FieldValue,
    pub year: FieldValue,
    pub price: FieldValue,
    pub mileage: FieldValue,
    pub fuel: FieldValue,
    pub transmission: FieldValue,
    pub state: FieldValue,
    pub region: FieldValue,
    pub description: FieldValue,
    pub year_num: Option<i32>,
    pub price_num: Option<f64>,
    pub mileage_num: Option<f64>,
}

impl Record {
    /// A record with every mediated field missing.
    pub fn new(source: Source, id: u64) -> Self {
        Self {
            source,
            id,
            make: FieldValue::Missing,
            model: FieldValue::Missing,
            year: FieldValue::Missing,
            price: FieldValue::Missing,
            mileage: FieldValue::Missing,
            fuel: FieldValue::Missing,
            transmission: FieldValue::Missing,
            state: FieldValue::Missing,
            region: FieldValue::Missing,
            description: FieldValue::Missing,
            year_num: None,
            price_num: None,
            mileage_num: None,
        }
    }

    pub fn field(&self, field: Field) -> &FieldValue {
        match field {
            Field::Make => &self.make,
            Field::Model => &self.model,
            Field::Year => &self.year,
            Field::Price => &self.price,
            Field::Mileage => &self.mileage,
            Field::Fuel => &self.fuel,
            Field::Transmission => &self.transmission,
            Field::State => &self.state,
            Field::Region => &self.region,
            Field::Description => &self.description,
        }
    }

    pub fn set_field(&mut self, field: Field, value: FieldValue) {
        let slot = match field {
            Field::Make => &mut self.make,
            Field::Model => &mut self.model,
            Field::Year => &mut self.year,
            Field::Price => &mut self.price,
            Field::Mileage => &mut self.mileage,
            Field::Fuel => &mut self.fuel,
            Field::Transmission => &mut self.transmission,
            Field::State => &mut self.state,
            Field::Region => &mut self.region,
            Field::Description => &mut self.description,
        };
        *slot = value;
    }

    /// Parsed numeric view of a field, where one exists.
    pub fn numeric(&self, field: Field) -> Option<f64> {
        match field {
            Field::Price => self.price_num,
            Field::Mileage => self.mileage_num,
            Field::Year => self.year_num.map(f64::from),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Candidate pairs & correspondence
// ---------------------------------------------------------------------------

/// A cross-source pair proposed for comparison. Ordered so candidate sets
/// are deterministic and multi-pass blocking dedups by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CandidatePair {
    pub id_a: u64,
    pub id_b: u64,
}

impl CandidatePair {
    pub fn new(id_a: u64, id_b: u64) -> Self {
        Self { id_a, id_b }
    }
}

/// The withheld ground truth: the set of true cross-source matches.
///
/// Consumed only by training-sample synthesis and evaluation. Blocking and
/// comparison never see it.
#[derive(Debug, Clone, Default)]
pub struct Correspondence {
    pairs: BTreeSet<CandidatePair>,
}

impl Correspondence {
    pub fn new(pairs: BTreeSet<CandidatePair>) -> Self {
        Self { pairs }
    }

    pub fn contains(&self, pair: &CandidatePair) -> bool {
        self.pairs.contains(pair)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidatePair> {
        self.pairs.iter()
    }

    pub fn as_set(&self) -> &BTreeSet<CandidatePair> {
        &self.pairs
    }

    /// Seeded shuffle split into (train, validation, test) subsets.
    /// Fractions apply to the whole; test takes the remainder.
    pub fn split_three(
        &self,
        train_fraction: f64,
        val_fraction: f64,
        rng: &mut StdRng,
    ) -> (Correspondence, Correspondence, Correspondence) {
        let mut all: Vec<CandidatePair> = self.pairs.iter().copied().collect();
        all.shuffle(rng);

        let n = all.len();
        let n_train = ((n as f64) * train_fraction).round() as usize;
        let n_val = ((n as f64) * val_fraction).round() as usize;
        let n_train = n_train.min(n);
        let n_val = n_val.min(n - n_train);

        let test: BTreeSet<CandidatePair> = all.split_off(n_train + n_val).into_iter().collect();
        let val: BTreeSet<CandidatePair> = all.split_off(n_train).into_iter().collect();
        let train: BTreeSet<CandidatePair> = all.into_iter().collect();

        (Self::new(train), Self::new(val), Self::new(test))
    }
}

impl FromIterator<CandidatePair> for Correspondence {
    fn from_iter<T: IntoIterator<Item = CandidatePair>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Comparison output
// ---------------------------------------------------------------------------

/// Per-field similarity. `Incomparable` means at least one side is missing
/// the field; such entries are excluded from any downstream aggregation
/// rather than penalizing the pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Similarity {
    Score(f64),
    Incomparable,
}

impl Similarity {
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Score(s) => Some(*s),
            Self::Incomparable => None,
        }
    }
}

/// Ordered per-field similarities for one candidate pair. Order follows the
/// comparator's field specs, so trained-model weights line up by index.
#[derive(Debug, Clone)]
pub struct FeatureVector {
    pub pair: CandidatePair,
    pub values: Vec<(Field, Similarity)>,
}

impl FeatureVector {
    pub fn get(&self, field: Field) -> Option<Similarity> {
        self.values.iter().find(|(f, _)| *f == field).map(|(_, s)| *s)
    }
}

/// A predicted link with its classifier score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredPair {
    pub id_a: u64,
    pub id_b: u64,
    pub score: f64,
}

// ---------------------------------------------------------------------------
// Run output
// ---------------------------------------------------------------------------

/// Precision/recall/F1 against the withheld truth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkSummary {
    pub records_a: usize,
    pub records_b: usize,
    pub candidate_pairs: usize,
    pub predicted_pairs: usize,
    /// Blocks skipped as degenerate during trained inference.
    pub skipped_blocks: usize,
    /// Max recall achievable after blocking, against the evaluation split.
    pub blocking_ceiling: f64,
    pub train_pairs: usize,
    pub eval_pairs: usize,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkMeta {
    pub config_name: String,
    pub blocking: String,
    pub classifier: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkResult {
    pub meta: LinkMeta,
    pub summary: LinkSummary,
    pub links: Vec<ScoredPair>,
}
