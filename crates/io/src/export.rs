use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use carlink_linkage::error::LinkError;
use carlink_linkage::model::{Correspondence, Field, Record, Source};
use carlink_linkage::store::RecordStore;
use carlink_linkage::train::sample_distinct_pairs;

/// Render labeled pair lines for a downstream trainable matcher:
/// `<record A tokens> TAB <record B tokens> TAB <label>`, one pair per line.
///
/// Positives come from the given correspondence subset; negatives are drawn
/// by seeded uniform cross-sampling, verified non-matching against the full
/// ground truth, and kept balanced 1:1 with the positives.
pub fn export_labeled(
    store: &RecordStore,
    subset: &Correspondence,
    rng: &mut StdRng,
) -> Result<Vec<String>, LinkError> {
    let mut lines = Vec::new();

    for pair in subset.iter() {
        let (Some(a), Some(b)) = (
            store.get(Source::A, pair.id_a),
            store.get(Source::B, pair.id_b),
        ) else {
            continue;
        };
        lines.push(format!("{}\t{}\t1", serialize_record(a), serialize_record(b)));
    }

    for pair in sample_distinct_pairs(store, lines.len(), rng)? {
        let (Some(a), Some(b)) = (
            store.get(Source::A, pair.id_a),
            store.get(Source::B, pair.id_b),
        ) else {
            continue;
        };
        lines.push(format!("{}\t{}\t0", serialize_record(a), serialize_record(b)));
    }

    lines.shuffle(rng);
    Ok(lines)
}

/// `COL <field> VAL <value>` tokens in mediated-schema order. Identifier
/// and derived numeric-duplicate columns are excluded; missing fields
/// render an empty value.
fn serialize_record(record: &Record) -> String {
    Field::ALL
        .iter()
        .map(|f| format!("COL {} VAL {}", f.name(), record.field(*f).as_str().unwrap_or("")))
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use carlink_linkage::model::{CandidatePair, FieldValue};
    use rand::SeedableRng;
    use std::collections::BTreeSet;

    fn car(source: Source, id: u64, make: &str, year: &str) -> Record {
        let mut r = Record::new(source, id);
        r.make = FieldValue::Present(make.into());
        r.year = FieldValue::Present(year.into());
        r.year_num = year.parse().ok();
        r
    }

    fn store() -> RecordStore {
        let makes = ["honda", "toyota", "ford", "subaru", "mazda", "kia", "bmw", "audi"];
        let mut a = Vec::new();
        let mut b = Vec::new();
        let mut truth = BTreeSet::new();
        for (i, make) in makes.iter().enumerate() {
            let i = i as u64;
            a.push(car(Source::A, i, make, &format!("{}", 2010 + i)));
            b.push(car(Source::B, 100 + i, make, &format!("{}", 2010 + i)));
            truth.insert(CandidatePair::new(i, 100 + i));
        }
        RecordStore::new(a, b, Correspondence::new(truth)).unwrap()
    }

    #[test]
    fn serializes_mediated_columns_only() {
        let rec = car(Source::A, 3, "honda", "2015");
        let line = serialize_record(&rec);
        assert!(line.starts_with("COL make VAL honda"));
        assert!(line.contains("COL year VAL 2015"));
        // Missing fields render empty values; ids and parsed numerics are
        // never serialized.
        assert!(line.contains("COL model VAL "));
        assert!(!line.contains("id"));
        assert!(!line.contains("year_num"));
    }

    #[test]
    fn export_is_balanced_and_tab_separated() {
        let store = store();
        let mut rng = StdRng::seed_from_u64(42);
        let lines = export_labeled(&store, store.correspondence(), &mut rng).unwrap();
        assert_eq!(lines.len(), 16, "8 positives + 8 negatives");

        let mut positives = 0;
        let mut negatives = 0;
        for line in &lines {
            let parts: Vec<&str> = line.split('\t').collect();
            assert_eq!(parts.len(), 3);
            match parts[2] {
                "1" => positives += 1,
                "0" => negatives += 1,
                other => panic!("unexpected label {other}"),
            }
        }
        assert_eq!(positives, 8);
        assert_eq!(negatives, 8);
    }

    #[test]
    fn export_is_seed_deterministic() {
        let store = store();
        let l1 = export_labeled(&store, store.correspondence(), &mut StdRng::seed_from_u64(5)).unwrap();
        let l2 = export_labeled(&store, store.correspondence(), &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(l1, l2);
    }
}
