use std::collections::BTreeSet;

use crate::model::{CandidatePair, Correspondence, Metrics};

/// Score a predicted pair set against the withheld truth by exact set
/// intersection. Empty denominators yield 0 rather than NaN.
pub fn evaluate(predicted: &BTreeSet<CandidatePair>, truth: &Correspondence) -> Metrics {
    let true_positives = predicted.iter().filter(|p| truth.contains(p)).count();
    let false_positives = predicted.len() - true_positives;
    let false_negatives = truth.len() - true_positives;

    let precision = ratio(true_positives, true_positives + false_positives);
    let recall = ratio(true_positives, true_positives + false_negatives);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    Metrics { precision, recall, f1 }
}

/// Max recall achievable after blocking: the fraction of truth pairs that
/// survived into the candidate set. Separates "blocking missed the pair"
/// from "the classifier rejected it".
pub fn blocking_ceiling(candidates: &BTreeSet<CandidatePair>, truth: &Correspondence) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let captured = truth.iter().filter(|p| candidates.contains(p)).count();
    captured as f64 / truth.len() as f64
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &[(u64, u64)]) -> BTreeSet<CandidatePair> {
        list.iter().map(|(a, b)| CandidatePair::new(*a, *b)).collect()
    }

    #[test]
    fn worked_example() {
        let predicted = pairs(&[(1, 1), (2, 3)]);
        let truth = Correspondence::new(pairs(&[(1, 1), (2, 2)]));
        let m = evaluate(&predicted, &truth);
        assert_eq!(m.precision, 0.5);
        assert_eq!(m.recall, 0.5);
        assert_eq!(m.f1, 0.5);
    }

    #[test]
    fn empty_prediction_scores_zero() {
        let truth = Correspondence::new(pairs(&[(1, 1)]));
        let m = evaluate(&BTreeSet::new(), &truth);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
    }

    #[test]
    fn perfect_prediction() {
        let predicted = pairs(&[(1, 1), (2, 2)]);
        let truth = Correspondence::new(pairs(&[(1, 1), (2, 2)]));
        let m = evaluate(&predicted, &truth);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1, 1.0);
    }

    #[test]
    fn ceiling_counts_surviving_truth() {
        let candidates = pairs(&[(1, 1), (2, 9), (3, 3)]);
        let truth = Correspondence::new(pairs(&[(1, 1), (2, 2), (3, 3), (4, 4)]));
        assert_eq!(blocking_ceiling(&candidates, &truth), 0.5);
    }

    #[test]
    fn ceiling_of_empty_truth_is_zero() {
        let candidates = pairs(&[(1, 1)]);
        assert_eq!(blocking_ceiling(&candidates, &Correspondence::default()), 0.0);
    }
}
