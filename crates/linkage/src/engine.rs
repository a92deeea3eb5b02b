use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::blocking::{self, BlockingStrategy};
use crate::classify::RuleClassifier;
use crate::compare::{compare, FieldSpec};
use crate::config::{ClassifierKind, LinkageConfig};
use crate::error::LinkError;
use crate::model::{
    CandidatePair, Correspondence, LinkMeta, LinkResult, LinkSummary, Record, ScoredPair, Source,
};
use crate::store::RecordStore;
use crate::train;

/// Run linkage per config. Returns predicted links + metrics against the
/// evaluation split of the withheld correspondence.
pub fn run(config: &LinkageConfig, store: &RecordStore) -> Result<LinkResult, LinkError> {
    let strategy = config.blocking.strategy();
    let specs = config.compare_specs();

    let records_a = store.source(Source::A);
    let records_b = store.source(Source::B);
    let candidates = blocking::block(records_a, records_b, &strategy);

    let mut split_rng = StdRng::seed_from_u64(config.split.seed);
    let (train_truth, _val_truth, eval_truth) = store.correspondence().split_three(
        config.split.train_fraction,
        config.split.val_fraction,
        &mut split_rng,
    );

    let (links, skipped_blocks) = match config.classifier.kind {
        ClassifierKind::Rule => (run_rule(config, store, &candidates, &specs), 0),
        ClassifierKind::Trained => {
            run_trained(config, store, &strategy, &specs, &train_truth)?
        }
    };

    let predicted: BTreeSet<CandidatePair> = links
        .iter()
        .map(|l| CandidatePair::new(l.id_a, l.id_b))
        .collect();
    let metrics = crate::evaluate::evaluate(&predicted, &eval_truth);
    let blocking_ceiling = crate::evaluate::blocking_ceiling(&candidates, &eval_truth);

    Ok(LinkResult {
        meta: LinkMeta {
            config_name: config.name.clone(),
            blocking: config.blocking.describe(),
            classifier: config.classifier.kind.to_string(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary: LinkSummary {
            records_a: records_a.len(),
            records_b: records_b.len(),
            candidate_pairs: candidates.len(),
            predicted_pairs: links.len(),
            skipped_blocks,
            blocking_ceiling,
            train_pairs: train_truth.len(),
            eval_pairs: eval_truth.len(),
            metrics,
        },
        links,
    })
}

/// Rule path: score every candidate pair directly. Pairs whose records
/// vanished from the store (cannot happen via the public API) are skipped.
fn run_rule(
    config: &LinkageConfig,
    store: &RecordStore,
    candidates: &BTreeSet<CandidatePair>,
    specs: &[FieldSpec],
) -> Vec<ScoredPair> {
    let classifier = RuleClassifier::new(config.classifier.min_agreements, specs.to_vec());
    let mut links = Vec::new();
    for pair in candidates {
        let (Some(a), Some(b)) = (
            store.get(Source::A, pair.id_a),
            store.get(Source::B, pair.id_b),
        ) else {
            continue;
        };
        let fv = compare(a, b, specs);
        if classifier.is_match(&fv) {
            links.push(ScoredPair {
                id_a: pair.id_a,
                id_b: pair.id_b,
                score: classifier.agreements(&fv) as f64,
            });
        }
    }
    links
}

/// Trained path: fit once on the train split (training is a barrier), then
/// run inference per block over the same partitions blocking produced.
/// Degenerate blocks are logged and skipped, never fatal.
fn run_trained(
    config: &LinkageConfig,
    store: &RecordStore,
    strategy: &BlockingStrategy,
    specs: &[FieldSpec],
    train_truth: &Correspondence,
) -> Result<(Vec<ScoredPair>, usize), LinkError> {
    let params = &config.classifier.trained;
    let mut rng = StdRng::seed_from_u64(params.seed);
    let model = train::fit(store, train_truth, specs, params, &mut rng)?;

    let blocks = blocking::build_blocks(store.source(Source::A), store.source(Source::B), strategy);

    // Overlapping blocks (sorted-neighborhood) can score a pair twice; the
    // merge is an order-independent set union keeping the best score.
    let mut best: BTreeMap<CandidatePair, f64> = BTreeMap::new();
    let mut skipped = 0usize;

    for blk in &blocks {
        let block_a: Vec<&Record> = blk
            .a_ids
            .iter()
            .filter_map(|id| store.get(Source::A, *id))
            .collect();
        let block_b: Vec<&Record> = blk
            .b_ids
            .iter()
            .filter_map(|id| store.get(Source::B, *id))
            .collect();

        match train::join(&model, &block_a, &block_b, specs, params.threshold) {
            Ok(scored) => {
                for s in scored {
                    let entry = best.entry(CandidatePair::new(s.id_a, s.id_b)).or_insert(s.score);
                    if s.score > *entry {
                        *entry = s.score;
                    }
                }
            }
            Err(reason) => {
                log::warn!("skipping block '{}': {reason}", blk.key);
                skipped += 1;
            }
        }
    }

    let links = best
        .into_iter()
        .map(|(pair, score)| ScoredPair { id_a: pair.id_a, id_b: pair.id_b, score })
        .collect();
    Ok((links, skipped))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
