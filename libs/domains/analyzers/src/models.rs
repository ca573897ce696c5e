use axum_helpers::FieldValidator;
use chrono::{DateTime, Utc};
use regex::Regex;
use database::pagination::{Pageable, SortValue};
use ordered_relation::MemberWeight;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

pub const ANALYZER_ENTITY: &str = "analyzer";
pub const DEFAULT_ANALYZER_TYPE: &str = "custom";

/// The two filter families an analyzer chains, each in its own ordered set
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum FilterKind {
    #[serde(rename = "token-filters")]
    #[strum(serialize = "token-filters")]
    Token,
    #[serde(rename = "char-filters")]
    #[strum(serialize = "char-filters")]
    Char,
}

impl FilterKind {
    pub const ALL: [FilterKind; 2] = [FilterKind::Token, FilterKind::Char];

    /// Entity name used on the event feed
    pub fn entity(self) -> &'static str {
        match self {
            FilterKind::Token => "token_filter",
            FilterKind::Char => "char_filter",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FilterKind::Token => "Token filter",
            FilterKind::Char => "Char filter",
        }
    }
}

/// An analyzer: a tokenizer configuration with ordered token and char filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Analyzer {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub analyzer_type: String,
    pub json_config: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_json(raw: &str) -> Result<(), ValidationError> {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(|_| ())
        .map_err(|_| ValidationError::new("json").with_message("must be a valid JSON document".into()))
}

/// Analysis component type names: lowercase, digits and underscores
static ANALYZER_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("analyzer type pattern"));

// empty values are reported by the length rule
fn validate_analyzer_type(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || ANALYZER_TYPE.is_match(value) {
        return Ok(());
    }
    Err(ValidationError::new("analyzer_type")
        .with_message("must start with a lowercase letter and contain only a-z, 0-9 and _".into()))
}

fn default_analyzer_type() -> String {
    DEFAULT_ANALYZER_TYPE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct AnalyzerInput {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type", default = "default_analyzer_type")]
    #[validate(
        length(min = 1, max = 255, message = "must be between 1 and 255 characters"),
        custom(function = "validate_analyzer_type")
    )]
    pub analyzer_type: String,
    #[validate(custom(function = "validate_json"))]
    pub json_config: Option<String>,
}

impl Default for AnalyzerInput {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            analyzer_type: default_analyzer_type(),
            json_config: None,
        }
    }
}

impl From<Analyzer> for AnalyzerInput {
    fn from(analyzer: Analyzer) -> Self {
        Self {
            name: analyzer.name,
            description: analyzer.description,
            analyzer_type: analyzer.analyzer_type,
            json_config: analyzer.json_config,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct PatchAnalyzer {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub analyzer_type: Option<String>,
    pub json_config: Option<String>,
}

impl PatchAnalyzer {
    pub fn apply_to(self, mut input: AnalyzerInput) -> AnalyzerInput {
        if let Some(name) = self.name {
            input.name = name;
        }
        if let Some(description) = self.description {
            input.description = Some(description);
        }
        if let Some(analyzer_type) = self.analyzer_type {
            input.analyzer_type = analyzer_type;
        }
        if let Some(json_config) = self.json_config {
            input.json_config = Some(json_config);
        }
        input
    }
}

/// A token or char filter definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Filter {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub json_config: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct FilterInput {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(custom(function = "validate_json"))]
    pub json_config: Option<String>,
}

impl From<Filter> for FilterInput {
    fn from(filter: Filter) -> Self {
        Self {
            name: filter.name,
            description: filter.description,
            json_config: filter.json_config,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct PatchFilter {
    pub name: Option<String>,
    pub description: Option<String>,
    pub json_config: Option<String>,
}

impl PatchFilter {
    pub fn apply_to(self, mut input: FilterInput) -> FilterInput {
        if let Some(name) = self.name {
            input.name = name;
        }
        if let Some(description) = self.description {
            input.description = Some(description);
        }
        if let Some(json_config) = self.json_config {
            input.json_config = Some(json_config);
        }
        input
    }
}

pub fn validators_of(input: &impl Validate) -> Vec<FieldValidator> {
    match input.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => FieldValidator::from_validation_errors(&errors),
    }
}

/// A filter as seen from an analyzer: its weight when bound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalyzerFilter {
    #[serde(flatten)]
    pub filter: Filter,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FilterWeight {
    pub filter_id: i64,
    pub weight: f64,
}

impl From<FilterWeight> for MemberWeight {
    fn from(input: FilterWeight) -> Self {
        MemberWeight::new(input.filter_id, input.weight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
pub struct AddAnalyzerFilter {
    pub filter_id: i64,
    /// Append (default) or prepend
    #[serde(default = "default_tail")]
    pub tail: bool,
}

fn default_tail() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
pub struct SortAnalyzerFilters {
    pub filter_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
pub struct ReplaceAnalyzerFilters {
    pub filters: Vec<FilterWeight>,
    #[serde(default)]
    pub partial: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MembershipFilter {
    /// List the filters *not* bound to the analyzer instead
    #[serde(default)]
    pub not_equal: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteOptions {
    /// Detach the filter from every analyzer before deleting it
    #[serde(default)]
    pub detach: bool,
}

impl Pageable for Analyzer {
    fn cursor_id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.analyzer_type.as_str()];
        fields.extend(self.description.as_deref());
        fields
    }

    fn sort_fields() -> &'static [&'static str] {
        &["id", "name", "type", "created_at", "updated_at"]
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "name" => SortValue::from(self.name.as_str()),
            "type" => SortValue::from(self.analyzer_type.as_str()),
            "created_at" => SortValue::from(self.created_at),
            "updated_at" => SortValue::from(self.updated_at),
            _ => SortValue::Int(self.id),
        }
    }
}

impl Pageable for Filter {
    fn cursor_id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.description.as_deref());
        fields
    }

    fn sort_fields() -> &'static [&'static str] {
        &["id", "name", "created_at", "updated_at"]
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "name" => SortValue::from(self.name.as_str()),
            "created_at" => SortValue::from(self.created_at),
            "updated_at" => SortValue::from(self.updated_at),
            _ => SortValue::Int(self.id),
        }
    }
}

impl Pageable for AnalyzerFilter {
    fn cursor_id(&self) -> i64 {
        self.filter.id
    }

    fn search_fields(&self) -> Vec<&str> {
        self.filter.search_fields()
    }

    fn sort_fields() -> &'static [&'static str] {
        &["id", "name", "weight"]
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "weight" => self.weight.map(SortValue::Float).unwrap_or(SortValue::Null),
            other => self.filter.sort_value(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_filter_kind_path_names() {
        assert_eq!(FilterKind::from_str("token-filters").unwrap(), FilterKind::Token);
        assert_eq!(FilterKind::Char.to_string(), "char-filters");
        let kind: FilterKind = serde_json::from_str(r#""char-filters""#).unwrap();
        assert_eq!(kind, FilterKind::Char);
        assert!(FilterKind::from_str("tokenizers").is_err());
    }

    #[test]
    fn test_analyzer_type_defaults_to_custom() {
        let input: AnalyzerInput = serde_json::from_str(r#"{"name": "folding"}"#).unwrap();
        assert_eq!(input.analyzer_type, "custom");
        assert!(validators_of(&input).is_empty());
    }

    #[test]
    fn test_analyzer_json_config_must_parse() {
        let input = AnalyzerInput {
            name: "folding".into(),
            analyzer_type: String::new(),
            json_config: Some("{\"tokenizer\":".into()),
            ..Default::default()
        };
        let fields: Vec<_> = validators_of(&input).into_iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["analyzer_type", "json_config"]);
    }

    #[test]
    fn test_analyzer_type_pattern() {
        for (value, valid) in [
            ("custom", true),
            ("pattern", true),
            ("ngram_v2", true),
            ("Custom", false),
            ("2gram", false),
            ("my analyzer", false),
        ] {
            let input = AnalyzerInput {
                name: "folding".into(),
                analyzer_type: value.into(),
                ..Default::default()
            };
            assert_eq!(validators_of(&input).is_empty(), valid, "{value}");
        }
    }

    #[test]
    fn test_patch_filter() {
        let patch = PatchFilter {
            json_config: Some("{}".into()),
            ..Default::default()
        };
        let input = patch.apply_to(FilterInput {
            name: "lowercase".into(),
            ..Default::default()
        });
        assert_eq!(input.name, "lowercase");
        assert_eq!(input.json_config.as_deref(), Some("{}"));
    }
}
