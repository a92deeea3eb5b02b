use strsim::{jaro_winkler, levenshtein};

use crate::model::{CandidatePair, FeatureVector, Field, Record, Similarity};

// ---------------------------------------------------------------------------
// Field specs
// ---------------------------------------------------------------------------

/// How one mediated field is compared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub field: Field,
    pub method: SimilarityFn,
}

/// Similarity functions. All are symmetric in their two arguments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimilarityFn {
    /// Jaro-Winkler on the normalized strings. Scores below `min_score`
    /// clamp to 0 — below-threshold resemblance earns no partial credit.
    JaroWinkler { min_score: f64 },
    /// Normalized Levenshtein similarity (1 - dist / max_len), same
    /// clamping policy.
    Levenshtein { min_score: f64 },
    /// Gaussian kernel on the normalized absolute difference of the parsed
    /// numerics. `offset` is a dead-zone before any penalty; `scale` sets
    /// the decay rate past it.
    Gauss { offset: f64, scale: f64, agreement_cutoff: f64 },
}

impl SimilarityFn {
    /// Whether a computed score counts as field agreement for the rule
    /// classifier. String methods clamp below `min_score`, so agreement
    /// coincides with a non-zero score there.
    pub fn agrees(&self, score: f64) -> bool {
        match self {
            Self::JaroWinkler { min_score } | Self::Levenshtein { min_score } => {
                score >= *min_score
            }
            Self::Gauss { agreement_cutoff, .. } => score >= *agreement_cutoff,
        }
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Compute the per-field feature vector for a candidate pair.
///
/// Pure and total: a field missing on either side yields `Incomparable`,
/// never an error and never a zero that would read as disagreement.
pub fn compare(a: &Record, b: &Record, specs: &[FieldSpec]) -> FeatureVector {
    let values = specs
        .iter()
        .map(|spec| (spec.field, field_similarity(a, b, spec)))
        .collect();
    FeatureVector {
        pair: CandidatePair::new(a.id, b.id),
        values,
    }
}

fn field_similarity(a: &Record, b: &Record, spec: &FieldSpec) -> Similarity {
    match spec.method {
        SimilarityFn::JaroWinkler { min_score } => {
            match (a.field(spec.field).as_str(), b.field(spec.field).as_str()) {
                (Some(x), Some(y)) => Similarity::Score(clamp_below(jaro_winkler(x, y), min_score)),
                _ => Similarity::Incomparable,
            }
        }
        SimilarityFn::Levenshtein { min_score } => {
            match (a.field(spec.field).as_str(), b.field(spec.field).as_str()) {
                (Some(x), Some(y)) => {
                    let max_len = x.chars().count().max(y.chars().count());
                    let sim = if max_len == 0 {
                        1.0
                    } else {
                        1.0 - levenshtein(x, y) as f64 / max_len as f64
                    };
                    Similarity::Score(clamp_below(sim, min_score))
                }
                _ => Similarity::Incomparable,
            }
        }
        SimilarityFn::Gauss { offset, scale, .. } => {
            match (a.numeric(spec.field), b.numeric(spec.field)) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {
                    let denom = x.abs().max(y.abs());
                    let d = if denom == 0.0 { 0.0 } else { (x - y).abs() / denom };
                    let score = if d <= offset {
                        1.0
                    } else {
                        let z = (d - offset) / scale;
                        (-0.5 * z * z).exp()
                    };
                    Similarity::Score(score)
                }
                _ => Similarity::Incomparable,
            }
        }
    }
}

fn clamp_below(score: f64, min_score: f64) -> f64 {
    if score < min_score {
        0.0
    } else {
        score
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
