use crate::compare::FieldSpec;
use crate::model::{FeatureVector, Similarity};

// ---------------------------------------------------------------------------
// Rule-based classifier
// ---------------------------------------------------------------------------

/// Deterministic threshold rule: a pair is a match when at least
/// `min_agreements` compared fields agree. Stateless — no training.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    pub min_agreements: usize,
    specs: Vec<FieldSpec>,
}

impl RuleClassifier {
    pub fn new(min_agreements: usize, specs: Vec<FieldSpec>) -> Self {
        Self { min_agreements, specs }
    }

    /// Count of fields whose similarity meets its configured minimum.
    /// Incomparable fields are excluded from the sum — a missing field can
    /// neither agree nor disagree.
    pub fn agreements(&self, fv: &FeatureVector) -> usize {
        fv.values
            .iter()
            .zip(&self.specs)
            .filter(|((_, sim), spec)| match sim {
                Similarity::Score(s) => spec.method.agrees(*s),
                Similarity::Incomparable => false,
            })
            .count()
    }

    pub fn is_match(&self, fv: &FeatureVector) -> bool {
        self.agreements(fv) >= self.min_agreements
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::SimilarityFn;
    use crate::model::{CandidatePair, Field};

    fn specs() -> Vec<FieldSpec> {
        vec![
            FieldSpec { field: Field::Make, method: SimilarityFn::JaroWinkler { min_score: 0.9 } },
            FieldSpec { field: Field::Model, method: SimilarityFn::JaroWinkler { min_score: 0.8 } },
            FieldSpec { field: Field::Year, method: SimilarityFn::Levenshtein { min_score: 0.9 } },
            FieldSpec {
                field: Field::Price,
                method: SimilarityFn::Gauss { offset: 0.2, scale: 0.2, agreement_cutoff: 0.5 },
            },
        ]
    }

    fn fv(sims: [Similarity; 4]) -> FeatureVector {
        let fields = [Field::Make, Field::Model, Field::Year, Field::Price];
        FeatureVector {
            pair: CandidatePair::new(1, 2),
            values: fields.into_iter().zip(sims).collect(),
        }
    }

    #[test]
    fn three_of_four_matches() {
        let clf = RuleClassifier::new(3, specs());
        let v = fv([
            Similarity::Score(0.95),
            Similarity::Score(0.85),
            Similarity::Score(1.0),
            Similarity::Score(0.1),
        ]);
        assert_eq!(clf.agreements(&v), 3);
        assert!(clf.is_match(&v));
    }

    #[test]
    fn two_of_four_does_not_match() {
        let clf = RuleClassifier::new(3, specs());
        let v = fv([
            Similarity::Score(0.95),
            Similarity::Score(0.0),
            Similarity::Score(1.0),
            Similarity::Score(0.1),
        ]);
        assert!(!clf.is_match(&v));
    }

    #[test]
    fn incomparable_fields_cannot_agree() {
        let clf = RuleClassifier::new(3, specs());
        let v = fv([
            Similarity::Score(0.95),
            Similarity::Score(0.85),
            Similarity::Incomparable,
            Similarity::Incomparable,
        ]);
        assert_eq!(clf.agreements(&v), 2);
        assert!(!clf.is_match(&v));
    }

    #[test]
    fn threshold_is_tunable() {
        let v = fv([
            Similarity::Score(0.95),
            Similarity::Score(0.85),
            Similarity::Incomparable,
            Similarity::Incomparable,
        ]);
        assert!(RuleClassifier::new(2, specs()).is_match(&v));
        assert!(!RuleClassifier::new(3, specs()).is_match(&v));
    }

    #[test]
    fn same_vector_same_decision() {
        let clf = RuleClassifier::new(3, specs());
        let v = fv([
            Similarity::Score(0.92),
            Similarity::Score(0.81),
            Similarity::Score(1.0),
            Similarity::Score(0.7),
        ]);
        let first = clf.is_match(&v);
        for _ in 0..100 {
            assert_eq!(clf.is_match(&v), first);
        }
    }
}
