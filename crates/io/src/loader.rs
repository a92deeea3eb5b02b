use std::collections::{BTreeMap, BTreeSet};

use carlink_linkage::config::SourceConfig;
use carlink_linkage::error::LinkError;
use carlink_linkage::model::{CandidatePair, Correspondence, Field, FieldValue, Record, Source};
use carlink_linkage::store::RecordStore;

/// One source's records plus the withheld ground-truth key per record.
/// The key never enters a `Record` — it exists only to build the
/// correspondence and is invisible to the matching surface.
#[derive(Debug)]
pub struct LoadedSource {
    pub records: Vec<Record>,
    pub truth_keys: Vec<(u64, String)>,
}

/// Load one source's CSV into mediated records, applying the configured
/// column mapping and cleaning rules.
///
/// Row policy carried over from the dataset build: rows missing make or
/// year are dropped, as are rows whose make contains "unknown". Numeric
/// coercion failures leave the parsed value `None` rather than erroring.
pub fn load_source(
    csv_data: &str,
    config: &SourceConfig,
    source: Source,
) -> Result<LoadedSource, LinkError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LinkError::Io(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let idx = |name: &str| -> Result<usize, LinkError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| LinkError::Schema { source, column: name.into() })
    };

    let truth_idx = idx(&config.truth_column)?;
    let id_idx = match &config.id_column {
        Some(column) => Some(idx(column)?),
        None => None,
    };

    let mut field_indices: Vec<(Field, usize)> = Vec::new();
    for field in Field::ALL {
        if let Some(column) = config.columns.get(field) {
            field_indices.push((field, idx(column)?));
        }
    }

    let mut records = Vec::new();
    let mut truth_keys = Vec::new();

    for (row_number, row) in reader.records().enumerate() {
        let row = row.map_err(|e| LinkError::Io(e.to_string()))?;

        let id = match id_idx {
            Some(i) => {
                let raw = row.get(i).unwrap_or("").trim();
                raw.parse().map_err(|_| LinkError::IdParse { source, value: raw.into() })?
            }
            None => row_number as u64,
        };

        let mut record = Record::new(source, id);
        for (field, i) in &field_indices {
            record.set_field(*field, mediate(*field, row.get(*i).unwrap_or("")));
        }
        record.year_num = record.year.as_str().and_then(|s| s.parse().ok());
        record.price_num = record.price.as_str().and_then(|s| s.parse().ok());
        record.mileage_num = record.mileage.as_str().and_then(|s| s.parse().ok());

        if record.make.is_missing() || record.year.is_missing() {
            continue;
        }
        if record.make.as_str().is_some_and(|m| m.contains("unknown")) {
            continue;
        }

        let truth = row.get(truth_idx).unwrap_or("").trim();
        if !truth.is_empty() {
            truth_keys.push((id, truth.to_string()));
        }
        records.push(record);
    }

    Ok(LoadedSource { records, truth_keys })
}

/// Assemble the canonical store: records from both sides, plus the
/// correspondence built by intersecting withheld keys. A key appearing on
/// multiple records yields the full cross product of pairs, matching a
/// join on the key column.
pub fn build_store(a: LoadedSource, b: LoadedSource) -> Result<RecordStore, LinkError> {
    let by_key = |keys: &[(u64, String)]| {
        let mut map: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        for (id, key) in keys {
            map.entry(key.clone()).or_default().push(*id);
        }
        map
    };
    let keys_a = by_key(&a.truth_keys);
    let keys_b = by_key(&b.truth_keys);

    let mut pairs = BTreeSet::new();
    for (key, ids_a) in &keys_a {
        if let Some(ids_b) = keys_b.get(key) {
            for id_a in ids_a {
                for id_b in ids_b {
                    pairs.insert(CandidatePair::new(*id_a, *id_b));
                }
            }
        }
    }

    RecordStore::new(a.records, b.records, Correspondence::new(pairs))
}

/// Normalize one raw cell into its mediated form. Blank cells are
/// `Missing`, never an empty `Present` value.
fn mediate(field: Field, raw: &str) -> FieldValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return FieldValue::Missing;
    }
    let value = match field {
        Field::Make | Field::Model | Field::Fuel | Field::Transmission | Field::State
        | Field::Region => clean_text(trimmed),
        Field::Year | Field::Price | Field::Mileage => strip_decimal_suffix(trimmed).to_string(),
        Field::Description => trimmed.to_lowercase(),
    };
    if value.is_empty() {
        FieldValue::Missing
    } else {
        FieldValue::Present(value)
    }
}

/// Lowercase and strip everything outside [a-z0-9].
fn clean_text(raw: &str) -> String {
    raw.to_lowercase().chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Drop the trailing ".0" float-typed exports leave on integer columns.
fn strip_decimal_suffix(raw: &str) -> &str {
    raw.strip_suffix(".0").unwrap_or(raw)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use carlink_linkage::config::ColumnMap;

    fn source_config() -> SourceConfig {
        SourceConfig {
            file: "vehicles.csv".into(),
            id_column: None,
            truth_column: "VIN".into(),
            columns: ColumnMap {
                make: Some("manufacturer".into()),
                model: Some("model".into()),
                year: Some("year".into()),
                price: Some("price".into()),
                ..ColumnMap::default()
            },
        }
    }

    const CSV: &str = "\
VIN,manufacturer,model,year,price,odometer
5J6RE4H4,Honda C-R!V,CR-V,2015.0,9000.0,81000
WVWZZZ1J,Volkswagen,Golf,2012,4500.50,
UNKNOWN1,Unknown Make,Mystery,2010,1000,
NOYEAR01,Ford,Focus,,2000,
,Toyota,Corolla,2014,6000,
";

    #[test]
    fn loads_and_cleans_rows() {
        let loaded = load_source(CSV, &source_config(), Source::A).unwrap();
        // unknown-make and missing-year rows are dropped.
        assert_eq!(loaded.records.len(), 3);

        let honda = &loaded.records[0];
        assert_eq!(honda.id, 0, "row index becomes the id when no id column is mapped");
        assert_eq!(honda.make, FieldValue::Present("hondacrv".into()));
        assert_eq!(honda.model, FieldValue::Present("crv".into()));
        assert_eq!(honda.year, FieldValue::Present("2015".into()));
        assert_eq!(honda.year_num, Some(2015));
        assert_eq!(honda.price, FieldValue::Present("9000".into()));
        assert_eq!(honda.price_num, Some(9000.0));
        // odometer is not mapped, so mileage stays missing.
        assert!(honda.mileage.is_missing());
    }

    #[test]
    fn blank_truth_key_is_skipped_but_record_kept() {
        let loaded = load_source(CSV, &source_config(), Source::A).unwrap();
        // The Toyota row (blank VIN) is a record without a truth key.
        assert_eq!(loaded.records.len(), 3);
        assert_eq!(loaded.truth_keys.len(), 2);
    }

    #[test]
    fn unmapped_column_is_a_schema_error() {
        let mut config = source_config();
        config.columns.make = Some("mfr".into());
        let err = load_source(CSV, &config, Source::A).unwrap_err();
        assert!(matches!(err, LinkError::Schema { source: Source::A, .. }));
        assert!(err.to_string().contains("mfr"));
    }

    #[test]
    fn id_column_is_parsed_when_mapped() {
        let csv = "\
vin,id,make_name,model_name,year,price
KEY1,501,Honda,Civic,2015,9000
";
        let config = SourceConfig {
            file: "b.csv".into(),
            id_column: Some("id".into()),
            truth_column: "vin".into(),
            columns: ColumnMap {
                make: Some("make_name".into()),
                model: Some("model_name".into()),
                year: Some("year".into()),
                price: Some("price".into()),
                ..ColumnMap::default()
            },
        };
        let loaded = load_source(csv, &config, Source::B).unwrap();
        assert_eq!(loaded.records[0].id, 501);

        let bad = csv.replace("501", "not-a-number");
        let err = load_source(&bad, &config, Source::B).unwrap_err();
        assert!(matches!(err, LinkError::IdParse { source: Source::B, .. }));
    }

    #[test]
    fn unparsable_numeric_coerces_to_none() {
        let csv = "\
VIN,manufacturer,model,year,price,odometer
KEY1,Honda,Civic,2015,call for price,
";
        let loaded = load_source(csv, &source_config(), Source::A).unwrap();
        let rec = &loaded.records[0];
        assert_eq!(rec.price, FieldValue::Present("call for price".into()));
        assert_eq!(rec.price_num, None);
    }

    #[test]
    fn store_correspondence_intersects_withheld_keys() {
        let a = LoadedSource {
            records: vec![
                Record::new(Source::A, 0),
                Record::new(Source::A, 1),
                Record::new(Source::A, 2),
            ],
            truth_keys: vec![(0, "K1".into()), (1, "K2".into()), (2, "K9".into())],
        };
        let b = LoadedSource {
            records: vec![
                Record::new(Source::B, 10),
                Record::new(Source::B, 11),
                Record::new(Source::B, 12),
            ],
            truth_keys: vec![(10, "K2".into()), (11, "K2".into()), (12, "K7".into())],
        };
        let store = build_store(a, b).unwrap();

        // K2 appears once in A and twice in B: full cross product, like a
        // join on the key column. K1/K9/K7 have no partner.
        assert_eq!(store.correspondence().len(), 2);
        assert!(store.correspondence().contains(&CandidatePair::new(1, 10)));
        assert!(store.correspondence().contains(&CandidatePair::new(1, 11)));
        // Records without a matched key stay in the store regardless.
        assert_eq!(store.len(Source::A), 3);
        assert_eq!(store.len(Source::B), 3);
    }
}
