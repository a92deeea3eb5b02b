use serde::Deserialize;

use crate::blocking::BlockingStrategy;
use crate::compare::{FieldSpec, SimilarityFn};
use crate::error::LinkError;
use crate::model::Field;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LinkageConfig {
    pub name: String,
    pub sources: SourcesConfig,
    pub blocking: BlockingConfig,
    pub compare: CompareConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub split: SplitConfig,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    pub a: SourceConfig,
    pub b: SourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub file: String,
    /// Column holding the source-local id. Row index is used when absent.
    #[serde(default)]
    pub id_column: Option<String>,
    /// Column holding the withheld ground-truth key. Never enters a Record.
    pub truth_column: String,
    pub columns: ColumnMap,
}

/// Raw-column name for each mediated field this source can supply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnMap {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
    pub price: Option<String>,
    pub mileage: Option<String>,
    pub fuel: Option<String>,
    pub transmission: Option<String>,
    pub state: Option<String>,
    pub region: Option<String>,
    pub description: Option<String>,
}

impl ColumnMap {
    pub fn get(&self, field: Field) -> Option<&str> {
        let col = match field {
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
        };
        col.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Blocking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BlockingConfig {
    pub strategy: StrategyKind,
    pub field: Field,
    /// Sorted-neighborhood window in key ranks. `0` degenerates to exact
    /// equality on the sort key.
    #[serde(default)]
    pub window: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ExactKey,
    SortedNeighborhood,
}

impl BlockingConfig {
    pub fn strategy(&self) -> BlockingStrategy {
        match self.strategy {
            StrategyKind::ExactKey => BlockingStrategy::ExactKey { field: self.field },
            StrategyKind::SortedNeighborhood => BlockingStrategy::SortedNeighborhood {
                field: self.field,
                window: self.window.unwrap_or(0),
            },
        }
    }

    pub fn describe(&self) -> String {
        match self.strategy {
            StrategyKind::ExactKey => format!("exact_key({})", self.field),
            StrategyKind::SortedNeighborhood => {
                format!("sorted_neighborhood({}, w={})", self.field, self.window.unwrap_or(0))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CompareConfig {
    pub fields: Vec<CompareFieldConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompareFieldConfig {
    pub field: Field,
    pub method: MethodKind,
    /// String methods: similarity below this clamps to 0 (non-agreement).
    #[serde(default)]
    pub min_score: Option<f64>,
    /// Gauss: dead-zone on the normalized difference before decay starts.
    #[serde(default)]
    pub offset: Option<f64>,
    /// Gauss: decay rate past the dead-zone.
    #[serde(default)]
    pub scale: Option<f64>,
    /// Gauss: score at or above this counts as field agreement.
    #[serde(default)]
    pub agreement_cutoff: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    JaroWinkler,
    Levenshtein,
    Gauss,
}

impl CompareFieldConfig {
    pub fn to_spec(&self) -> FieldSpec {
        let method = match self.method {
            MethodKind::JaroWinkler => SimilarityFn::JaroWinkler {
                min_score: self.min_score.unwrap_or(0.0),
            },
            MethodKind::Levenshtein => SimilarityFn::Levenshtein {
                min_score: self.min_score.unwrap_or(0.0),
            },
            MethodKind::Gauss => SimilarityFn::Gauss {
                offset: self.offset.unwrap_or(0.0),
                scale: self.scale.unwrap_or(1.0),
                agreement_cutoff: self.agreement_cutoff.unwrap_or(0.5),
            },
        };
        FieldSpec { field: self.field, method }
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub kind: ClassifierKind,
    /// Rule classifier: agreeing-field count needed to predict a match.
    #[serde(default = "default_min_agreements")]
    pub min_agreements: usize,
    #[serde(default)]
    pub trained: TrainedParams,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::Rule,
            min_agreements: default_min_agreements(),
            trained: TrainedParams::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    #[default]
    Rule,
    Trained,
}

impl std::fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rule => write!(f, "rule"),
            Self::Trained => write!(f, "trained"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainedParams {
    /// Model score needed to emit a link.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Seed for negative-pair synthesis; injected so training-set
    /// construction is reproducible.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TrainedParams {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            seed: default_seed(),
        }
    }
}

fn default_min_agreements() -> usize {
    3
}
fn default_threshold() -> f64 {
    0.5
}
fn default_epochs() -> usize {
    500
}
fn default_learning_rate() -> f64 {
    0.05
}
fn default_seed() -> u64 {
    42
}

// ---------------------------------------------------------------------------
// Correspondence split
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SplitConfig {
    #[serde(default = "default_train_fraction")]
    pub train_fraction: f64,
    #[serde(default = "default_val_fraction")]
    pub val_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: default_train_fraction(),
            val_fraction: default_val_fraction(),
            seed: default_seed(),
        }
    }
}

fn default_train_fraction() -> f64 {
    0.6
}
fn default_val_fraction() -> f64 {
    0.2
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl LinkageConfig {
    pub fn from_toml(input: &str) -> Result<Self, LinkError> {
        let config: LinkageConfig =
            toml::from_str(input).map_err(|e| LinkError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Field specs in declaration order (the feature-vector ordering).
    pub fn compare_specs(&self) -> Vec<FieldSpec> {
        self.compare.fields.iter().map(|f| f.to_spec()).collect()
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        if self.compare.fields.is_empty() {
            return Err(LinkError::ConfigValidation(
                "at least one compare field is required".into(),
            ));
        }

        for (i, fc) in self.compare.fields.iter().enumerate() {
            if self.compare.fields[..i].iter().any(|o| o.field == fc.field) {
                return Err(LinkError::ConfigValidation(format!(
                    "field '{}' is compared twice",
                    fc.field
                )));
            }
            match fc.method {
                MethodKind::JaroWinkler | MethodKind::Levenshtein => {
                    let min = fc.min_score.ok_or_else(|| {
                        LinkError::ConfigValidation(format!(
                            "field '{}': string methods require min_score",
                            fc.field
                        ))
                    })?;
                    if !(0.0..=1.0).contains(&min) {
                        return Err(LinkError::ConfigValidation(format!(
                            "field '{}': min_score must be in [0, 1], got {min}",
                            fc.field
                        )));
                    }
                }
                MethodKind::Gauss => {
                    let scale = fc.scale.ok_or_else(|| {
                        LinkError::ConfigValidation(format!(
                            "field '{}': gauss requires scale",
                            fc.field
                        ))
                    })?;
                    if scale <= 0.0 {
                        return Err(LinkError::ConfigValidation(format!(
                            "field '{}': gauss scale must be positive, got {scale}",
                            fc.field
                        )));
                    }
                    if fc.offset.is_some_and(|o| o < 0.0) {
                        return Err(LinkError::ConfigValidation(format!(
                            "field '{}': gauss offset must be non-negative",
                            fc.field
                        )));
                    }
                    if fc.numeric_source().is_none() {
                        return Err(LinkError::ConfigValidation(format!(
                            "field '{}': gauss applies to numeric fields (year, price, mileage)",
                            fc.field
                        )));
                    }
                }
            }
        }

        if self.blocking.strategy == StrategyKind::SortedNeighborhood
            && self.blocking.window.is_none()
        {
            return Err(LinkError::ConfigValidation(
                "sorted_neighborhood blocking requires a window".into(),
            ));
        }

        if self.classifier.min_agreements < 1
            || self.classifier.min_agreements > self.compare.fields.len()
        {
            return Err(LinkError::ConfigValidation(format!(
                "min_agreements must be in [1, {}], got {}",
                self.compare.fields.len(),
                self.classifier.min_agreements
            )));
        }

        let t = &self.classifier.trained;
        if !(0.0..=1.0).contains(&t.threshold) {
            return Err(LinkError::ConfigValidation(format!(
                "trained threshold must be in [0, 1], got {}",
                t.threshold
            )));
        }
        if t.epochs == 0 {
            return Err(LinkError::ConfigValidation("trained epochs must be >= 1".into()));
        }
        if t.learning_rate <= 0.0 {
            return Err(LinkError::ConfigValidation(
                "trained learning_rate must be positive".into(),
            ));
        }

        let s = &self.split;
        if s.train_fraction <= 0.0 || s.val_fraction < 0.0
            || s.train_fraction + s.val_fraction >= 1.0
        {
            return Err(LinkError::ConfigValidation(format!(
                "split fractions must satisfy 0 < train, 0 <= val, train + val < 1 \
                 (got train={}, val={})",
                s.train_fraction, s.val_fraction
            )));
        }

        // Both sources must be able to supply the blocking key and every
        // compared field.
        for (name, src) in [("a", &self.sources.a), ("b", &self.sources.b)] {
            if src.truth_column.is_empty() {
                return Err(LinkError::ConfigValidation(format!(
                    "source '{name}': truth_column must not be empty"
                )));
            }
            if src.columns.get(self.blocking.field).is_none() {
                return Err(LinkError::ConfigValidation(format!(
                    "source '{name}': no column mapped for blocking field '{}'",
                    self.blocking.field
                )));
            }
            for fc in &self.compare.fields {
                let needed = fc.numeric_source().unwrap_or(fc.field);
                if src.columns.get(needed).is_none() {
                    return Err(LinkError::ConfigValidation(format!(
                        "source '{name}': no column mapped for compared field '{needed}'"
                    )));
                }
            }
        }

        Ok(())
    }
}

impl CompareFieldConfig {
    /// For gauss fields, the mediated field whose parsed numeric is compared.
    fn numeric_source(&self) -> Option<Field> {
        if self.method != MethodKind::Gauss {
            return None;
        }
        match self.field {
            Field::Year | Field::Price | Field::Mileage => Some(self.field),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
name = "craigslist-usedcars"

[sources.a]
file = "vehicles.csv"
truth_column = "VIN"
[sources.a.columns]
make = "manufacturer"
model = "model"
year = "year"
price = "price"

[sources.b]
file = "used_cars_data.csv"
truth_column = "vin"
[sources.b.columns]
make = "make_name"
model = "model_name"
year = "year"
price = "price"

[blocking]
strategy = "exact_key"
field = "make"

[[compare.fields]]
field = "make"
method = "jaro_winkler"
min_score = 0.9

[[compare.fields]]
field = "model"
method = "jaro_winkler"
min_score = 0.8

[[compare.fields]]
field = "year"
method = "levenshtein"
min_score = 0.9

[[compare.fields]]
field = "price"
method = "gauss"
offset = 0.2
scale = 0.2
"#;

    #[test]
    fn parse_valid() {
        let config = LinkageConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "craigslist-usedcars");
        assert_eq!(config.compare.fields.len(), 4);
        assert_eq!(config.classifier.kind, ClassifierKind::Rule);
        assert_eq!(config.classifier.min_agreements, 3);
        assert_eq!(config.split.train_fraction, 0.6);
        assert_eq!(config.blocking.describe(), "exact_key(make)");
    }

    #[test]
    fn specs_keep_declaration_order() {
        let config = LinkageConfig::from_toml(VALID).unwrap();
        let fields: Vec<Field> = config.compare_specs().iter().map(|s| s.field).collect();
        assert_eq!(fields, vec![Field::Make, Field::Model, Field::Year, Field::Price]);
    }

    #[test]
    fn reject_sorted_neighborhood_without_window() {
        let input = VALID.replace("strategy = \"exact_key\"", "strategy = \"sorted_neighborhood\"");
        let err = LinkageConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("window"));
    }

    #[test]
    fn reject_string_method_without_min_score() {
        let input = VALID.replace("min_score = 0.9\n\n[[compare.fields]]\nfield = \"model\"", "\n[[compare.fields]]\nfield = \"model\"");
        let err = LinkageConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("min_score"));
    }

    #[test]
    fn reject_min_agreements_above_field_count() {
        let input = format!("{VALID}\n[classifier]\nkind = \"rule\"\nmin_agreements = 5\n");
        let err = LinkageConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("min_agreements"));
    }

    #[test]
    fn reject_unmapped_compared_field() {
        let input = VALID.replace("price = \"price\"\n\n[blocking]", "\n[blocking]");
        let err = LinkageConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("price"));
    }

    #[test]
    fn reject_gauss_on_text_field() {
        let input = VALID.replace(
            "field = \"price\"\nmethod = \"gauss\"",
            "field = \"fuel\"\nmethod = \"gauss\"",
        );
        let err = LinkageConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("numeric"));
    }

    #[test]
    fn trained_params_default_and_parse() {
        let input = format!(
            "{VALID}\n[classifier]\nkind = \"trained\"\n[classifier.trained]\nthreshold = 0.6\nseed = 7\n"
        );
        let config = LinkageConfig::from_toml(&input).unwrap();
        assert_eq!(config.classifier.kind, ClassifierKind::Trained);
        assert_eq!(config.classifier.trained.threshold, 0.6);
        assert_eq!(config.classifier.trained.seed, 7);
        assert_eq!(config.classifier.trained.epochs, 500);
    }
}
