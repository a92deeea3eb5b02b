use std::collections::BTreeSet;
use std::fmt;

use rand::rngs::StdRng;
use rand::Rng;

use crate::compare::{compare, FieldSpec};
use crate::config::TrainedParams;
use crate::error::LinkError;
use crate::model::{CandidatePair, Correspondence, FeatureVector, Field, Record, ScoredPair, Similarity, Source};
use crate::store::RecordStore;

/// Fewer labeled match pairs than this cannot fit a stable model.
pub const MIN_TRAINING_PAIRS: usize = 4;

// ---------------------------------------------------------------------------
// Degenerate blocks
// ---------------------------------------------------------------------------

/// A block with no usable comparison surface. Recoverable: the caller skips
/// the block and the run continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateBlock {
    /// One side of the block has no records.
    EmptySide,
    /// Every feature of every cross pair is incomparable.
    NoComparisonSurface,
}

impl fmt::Display for DegenerateBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySide => write!(f, "block has no records on one side"),
            Self::NoComparisonSurface => {
                write!(f, "block has no comparison surface (all fields incomparable)")
            }
        }
    }
}

impl std::error::Error for DegenerateBlock {}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Logistic scoring model over the comparator's feature space. Immutable
/// once fit; re-created only by calling `fit` again.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    weights: Vec<f64>,
    bias: f64,
    /// Per-feature training mean, substituted for incomparable entries so
    /// missing fields neither help nor hurt a pair.
    feature_means: Vec<f64>,
    fields: Vec<Field>,
}

impl TrainedModel {
    /// Match score in [0, 1] for one feature vector.
    pub fn score(&self, fv: &FeatureVector) -> f64 {
        debug_assert_eq!(fv.values.len(), self.weights.len());
        let mut z = self.bias;
        for (i, (_, sim)) in fv.values.iter().enumerate() {
            let x = match sim {
                Similarity::Score(s) => *s,
                Similarity::Incomparable => self.feature_means[i],
            };
            z += self.weights[i] * x;
        }
        sigmoid(z)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

// ---------------------------------------------------------------------------
// Training-set synthesis
// ---------------------------------------------------------------------------

/// Sample `count` distinct cross-source pairs, rejecting anything present in
/// the ground truth so the "distinct" class is never contaminated with true
/// matches. Deterministic for a given rng state.
pub fn sample_distinct_pairs(
    store: &RecordStore,
    count: usize,
    rng: &mut StdRng,
) -> Result<Vec<CandidatePair>, LinkError> {
    let ids_a: Vec<u64> = store.source(Source::A).keys().copied().collect();
    let ids_b: Vec<u64> = store.source(Source::B).keys().copied().collect();
    if ids_a.is_empty() || ids_b.is_empty() {
        return Err(LinkError::TrainingInsufficient { needed: count, got: 0 });
    }

    let mut sampled: BTreeSet<CandidatePair> = BTreeSet::new();
    // Generous cap; only tiny stores where nearly every cross pair is a
    // true match can exhaust it.
    let max_attempts = 1000 * count.max(1);
    let mut attempts = 0;
    while sampled.len() < count && attempts < max_attempts {
        attempts += 1;
        let pair = CandidatePair::new(
            ids_a[rng.gen_range(0..ids_a.len())],
            ids_b[rng.gen_range(0..ids_b.len())],
        );
        if store.correspondence().contains(&pair) {
            continue;
        }
        sampled.insert(pair);
    }

    if sampled.len() < count {
        return Err(LinkError::TrainingInsufficient { needed: count, got: sampled.len() });
    }
    Ok(sampled.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Fit
// ---------------------------------------------------------------------------

/// Fit the scoring model from the labeled match pairs, synthesizing an
/// equal-sized distinct class (balanced 1:1 so neither class dominates).
pub fn fit(
    store: &RecordStore,
    positives: &Correspondence,
    specs: &[FieldSpec],
    params: &TrainedParams,
    rng: &mut StdRng,
) -> Result<TrainedModel, LinkError> {
    let mut features: Vec<FeatureVector> = Vec::new();
    let mut labels: Vec<f64> = Vec::new();

    for pair in positives.iter() {
        let (Some(a), Some(b)) = (
            store.get(Source::A, pair.id_a),
            store.get(Source::B, pair.id_b),
        ) else {
            continue;
        };
        features.push(compare(a, b, specs));
        labels.push(1.0);
    }

    let n_pos = features.len();
    if n_pos < MIN_TRAINING_PAIRS {
        return Err(LinkError::TrainingInsufficient { needed: MIN_TRAINING_PAIRS, got: n_pos });
    }

    for pair in sample_distinct_pairs(store, n_pos, rng)? {
        // Sampled ids come from the store, so both lookups succeed.
        let (Some(a), Some(b)) = (
            store.get(Source::A, pair.id_a),
            store.get(Source::B, pair.id_b),
        ) else {
            continue;
        };
        features.push(compare(a, b, specs));
        labels.push(0.0);
    }

    let n_features = specs.len();
    let feature_means = column_means(&features, n_features);

    // Dense matrix with incomparable entries imputed to the column mean.
    let rows: Vec<Vec<f64>> = features
        .iter()
        .map(|fv| {
            fv.values
                .iter()
                .enumerate()
                .map(|(j, (_, sim))| match sim {
                    Similarity::Score(s) => *s,
                    Similarity::Incomparable => feature_means[j],
                })
                .collect()
        })
        .collect();

    let (weights, bias) = gradient_descent(&rows, &labels, params);

    Ok(TrainedModel {
        weights,
        bias,
        feature_means,
        fields: specs.iter().map(|s| s.field).collect(),
    })
}

fn column_means(features: &[FeatureVector], n_features: usize) -> Vec<f64> {
    let mut sums = vec![0.0; n_features];
    let mut counts = vec![0usize; n_features];
    for fv in features {
        for (j, (_, sim)) in fv.values.iter().enumerate() {
            if let Similarity::Score(s) = sim {
                sums[j] += s;
                counts[j] += 1;
            }
        }
    }
    sums.iter()
        .zip(&counts)
        // 0.5 is the neutral midpoint of the score range for features that
        // never materialize in training.
        .map(|(sum, count)| if *count == 0 { 0.5 } else { sum / *count as f64 })
        .collect()
}

/// Batch gradient descent on the logistic loss. Deterministic: no sampling,
/// fixed iteration order.
fn gradient_descent(rows: &[Vec<f64>], labels: &[f64], params: &TrainedParams) -> (Vec<f64>, f64) {
    let n = rows.len() as f64;
    let n_features = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut weights = vec![0.0; n_features];
    let mut bias = 0.0;

    for _ in 0..params.epochs {
        let mut grad_w = vec![0.0; n_features];
        let mut grad_b = 0.0;
        for (row, y) in rows.iter().zip(labels) {
            let z = bias + row.iter().zip(&weights).map(|(x, w)| x * w).sum::<f64>();
            let err = sigmoid(z) - y;
            for (g, x) in grad_w.iter_mut().zip(row) {
                *g += err * x;
            }
            grad_b += err;
        }
        for (w, g) in weights.iter_mut().zip(&grad_w) {
            *w -= params.learning_rate * g / n;
        }
        bias -= params.learning_rate * grad_b / n;
    }

    (weights, bias)
}

// ---------------------------------------------------------------------------
// Per-block inference
// ---------------------------------------------------------------------------

/// Score every cross pair inside one block, returning pairs at or above
/// `threshold`. Errors are per-block degeneracies the caller skips; the
/// model itself is read-only and safe to share across blocks.
pub fn join(
    model: &TrainedModel,
    block_a: &[&Record],
    block_b: &[&Record],
    specs: &[FieldSpec],
    threshold: f64,
) -> Result<Vec<ScoredPair>, DegenerateBlock> {
    if block_a.is_empty() || block_b.is_empty() {
        return Err(DegenerateBlock::EmptySide);
    }

    let mut out = Vec::new();
    let mut any_comparable = false;
    for a in block_a {
        for b in block_b {
            let fv = compare(a, b, specs);
            if fv.values.iter().any(|(_, s)| matches!(s, Similarity::Score(_))) {
                any_comparable = true;
            }
            let score = model.score(&fv);
            if score >= threshold {
                out.push(ScoredPair { id_a: a.id, id_b: b.id, score });
            }
        }
    }

    if !any_comparable {
        return Err(DegenerateBlock::NoComparisonSurface);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
