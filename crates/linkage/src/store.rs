use std::collections::BTreeMap;

use crate::error::LinkError;
use crate::model::{Correspondence, Record, Source};

/// The canonical record store: one ordered id-to-record map per source,
/// plus the withheld correspondence.
///
/// Immutable after construction — no mutation is exposed, so blocking and
/// comparison are reproducible for the remainder of the run.
#[derive(Debug)]
pub struct RecordStore {
    a: BTreeMap<u64, Record>,
    b: BTreeMap<u64, Record>,
    correspondence: Correspondence,
}

impl RecordStore {
    pub fn new(
        records_a: Vec<Record>,
        records_b: Vec<Record>,
        correspondence: Correspondence,
    ) -> Result<Self, LinkError> {
        Ok(Self {
            a: index(records_a, Source::A)?,
            b: index(records_b, Source::B)?,
            correspondence,
        })
    }

    pub fn source(&self, source: Source) -> &BTreeMap<u64, Record> {
        match source {
            Source::A => &self.a,
            Source::B => &self.b,
        }
    }

    pub fn get(&self, source: Source, id: u64) -> Option<&Record> {
        self.source(source).get(&id)
    }

    pub fn len(&self, source: Source) -> usize {
        self.source(source).len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty() && self.b.is_empty()
    }

    /// Ground truth. For training-sample synthesis and evaluation only —
    /// blocking and comparison must never consult this.
    pub fn correspondence(&self) -> &Correspondence {
        &self.correspondence
    }
}

fn index(records: Vec<Record>, source: Source) -> Result<BTreeMap<u64, Record>, LinkError> {
    let mut map = BTreeMap::new();
    for record in records {
        let id = record.id;
        if map.insert(id, record).is_some() {
            return Err(LinkError::DuplicateId { source, id });
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CandidatePair;

    #[test]
    fn indexes_both_sides() {
        let a = vec![Record::new(Source::A, 2), Record::new(Source::A, 1)];
        let b = vec![Record::new(Source::B, 7)];
        let corr: Correspondence = [CandidatePair::new(1, 7)].into_iter().collect();
        let store = RecordStore::new(a, b, corr).unwrap();

        assert_eq!(store.len(Source::A), 2);
        assert_eq!(store.len(Source::B), 1);
        // BTreeMap: iteration is ordered by id.
        let ids: Vec<u64> = store.source(Source::A).keys().copied().collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.correspondence().len(), 1);
    }

    #[test]
    fn duplicate_id_rejected() {
        let a = vec![Record::new(Source::A, 1), Record::new(Source::A, 1)];
        let err = RecordStore::new(a, vec![], Correspondence::default()).unwrap_err();
        assert!(matches!(err, LinkError::DuplicateId { source: Source::A, id: 1 }));
    }
}
