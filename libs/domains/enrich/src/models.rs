use axum_helpers::FieldValidator;
use chrono::{DateTime, Utc};
use database::pagination::{Pageable, SortValue};
use ordered_relation::MemberWeight;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

pub const ITEM_ENTITY: &str = "enrich_item";
pub const PIPELINE_ENTITY: &str = "enrich_pipeline";

pub const DEFAULT_REQUEST_TIMEOUT_MS: i64 = 5000;

/// How an enrich item is executed
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "enrich_item_type")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EnrichItemType {
    #[sea_orm(string_value = "http_async")]
    HttpAsync,
    #[default]
    #[sea_orm(string_value = "http_sync")]
    HttpSync,
    #[sea_orm(string_value = "groovy_script")]
    GroovyScript,
}

impl EnrichItemType {
    pub fn is_http(&self) -> bool {
        matches!(self, EnrichItemType::HttpAsync | EnrichItemType::HttpSync)
    }
}

/// How the enrichment result is combined with the document
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "behavior_merge_type")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BehaviorMergeType {
    #[default]
    #[sea_orm(string_value = "merge")]
    Merge,
    #[sea_orm(string_value = "replace")]
    Replace,
}

/// What the pipeline does when the item fails
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "behavior_on_error")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BehaviorOnError {
    #[default]
    #[sea_orm(string_value = "skip")]
    Skip,
    #[sea_orm(string_value = "fail")]
    Fail,
    #[sea_orm(string_value = "reject")]
    Reject,
}

/// A single enrichment step: an HTTP call or a Groovy script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EnrichItem {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub item_type: EnrichItemType,
    pub service_name: Option<String>,
    pub script: Option<String>,
    /// JSON document passed to the enricher
    pub json_config: Option<String>,
    pub json_path: Option<String>,
    pub behavior_merge_type: BehaviorMergeType,
    /// Milliseconds
    pub request_timeout: i64,
    pub behavior_on_error: BehaviorOnError,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_json(raw: &str) -> Result<(), ValidationError> {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(|_| ())
        .map_err(|_| ValidationError::new("json").with_message("must be a valid JSON document".into()))
}

/// Create or fully replace an enrich item
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct EnrichItemInput {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: EnrichItemType,
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub service_name: Option<String>,
    pub script: Option<String>,
    #[validate(custom(function = "validate_json"))]
    pub json_config: Option<String>,
    pub json_path: Option<String>,
    #[serde(default)]
    pub behavior_merge_type: BehaviorMergeType,
    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1, message = "must be a positive number of milliseconds"))]
    pub request_timeout: i64,
    #[serde(default)]
    pub behavior_on_error: BehaviorOnError,
}

fn default_request_timeout() -> i64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

impl EnrichItemInput {
    /// Field validators, including the type-dependent rules that `validator`
    /// cannot express: HTTP items need a service name and no script, Groovy
    /// items need a script and no service name.
    pub fn validators(&self) -> Vec<FieldValidator> {
        let mut validators = match self.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => FieldValidator::from_validation_errors(&errors),
        };

        let kind = self.item_type.to_string();
        if self.item_type.is_http() {
            if is_blank(&self.service_name) {
                validators.push(FieldValidator::new(
                    "service_name",
                    format!("is required for {kind} items"),
                ));
            }
            if !is_blank(&self.script) {
                validators.push(FieldValidator::new("script", format!("must be empty for {kind} items")));
            }
        } else {
            if is_blank(&self.script) {
                validators.push(FieldValidator::new("script", format!("is required for {kind} items")));
            }
            if !is_blank(&self.service_name) {
                validators.push(FieldValidator::new(
                    "service_name",
                    format!("must be empty for {kind} items"),
                ));
            }
        }

        validators
    }
}

impl From<EnrichItem> for EnrichItemInput {
    fn from(item: EnrichItem) -> Self {
        Self {
            name: item.name,
            description: item.description,
            item_type: item.item_type,
            service_name: item.service_name,
            script: item.script,
            json_config: item.json_config,
            json_path: item.json_path,
            behavior_merge_type: item.behavior_merge_type,
            request_timeout: item.request_timeout,
            behavior_on_error: item.behavior_on_error,
        }
    }
}

/// Partial update; only provided fields change
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct PatchEnrichItem {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<EnrichItemType>,
    pub service_name: Option<String>,
    pub script: Option<String>,
    pub json_config: Option<String>,
    pub json_path: Option<String>,
    pub behavior_merge_type: Option<BehaviorMergeType>,
    pub request_timeout: Option<i64>,
    pub behavior_on_error: Option<BehaviorOnError>,
}

impl PatchEnrichItem {
    pub fn apply_to(self, mut input: EnrichItemInput) -> EnrichItemInput {
        if let Some(name) = self.name {
            input.name = name;
        }
        if let Some(description) = self.description {
            input.description = Some(description);
        }
        if let Some(item_type) = self.item_type {
            input.item_type = item_type;
        }
        if let Some(service_name) = self.service_name {
            input.service_name = Some(service_name);
        }
        if let Some(script) = self.script {
            input.script = Some(script);
        }
        if let Some(json_config) = self.json_config {
            input.json_config = Some(json_config);
        }
        if let Some(json_path) = self.json_path {
            input.json_path = Some(json_path);
        }
        if let Some(merge) = self.behavior_merge_type {
            input.behavior_merge_type = merge;
        }
        if let Some(timeout) = self.request_timeout {
            input.request_timeout = timeout;
        }
        if let Some(on_error) = self.behavior_on_error {
            input.behavior_on_error = on_error;
        }
        input
    }
}

/// An ordered sequence of enrich items applied at ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EnrichPipeline {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One requested pipeline membership
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PipelineItemInput {
    pub enrich_item_id: i64,
    pub weight: f64,
}

impl From<PipelineItemInput> for MemberWeight {
    fn from(input: PipelineItemInput) -> Self {
        MemberWeight::new(input.enrich_item_id, input.weight)
    }
}

/// Create or fully replace a pipeline.
///
/// On replace, omitting `items` removes every item from the pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct EnrichPipelineInput {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub items: Option<Vec<PipelineItemInput>>,
}

/// Partial update; omitting `items` leaves membership unchanged
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct PatchEnrichPipeline {
    pub name: Option<String>,
    pub description: Option<String>,
    pub items: Option<Vec<PipelineItemInput>>,
}

/// Scalar fields of a pipeline as written by the repository
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineFields {
    pub name: String,
    pub description: Option<String>,
}

/// Pipeline validators for a name and optional item list
pub fn pipeline_validators(name: &str, items: Option<&[PipelineItemInput]>) -> Vec<FieldValidator> {
    let input = EnrichPipelineInput {
        name: name.to_string(),
        ..Default::default()
    };
    let mut validators = match input.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => FieldValidator::from_validation_errors(&errors),
    };

    for (index, item) in items.unwrap_or_default().iter().enumerate() {
        if !item.weight.is_finite() {
            validators.push(FieldValidator::new(
                format!("items[{index}].weight"),
                "must be a finite number",
            ));
        }
    }
    validators
}

/// An enrich item as seen from a pipeline: its weight when bound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PipelineItem {
    #[serde(flatten)]
    pub item: EnrichItem,
    /// Present for bound items
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
pub struct AddPipelineItem {
    pub enrich_item_id: i64,
    /// Append (default) or prepend
    #[serde(default = "default_tail")]
    pub tail: bool,
}

fn default_tail() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
pub struct SortPipelineItems {
    /// New order; ids that are not bound are ignored
    pub enrich_item_ids: Vec<i64>,
}

/// Membership listing mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MembershipFilter {
    /// List the items *not* bound to the pipeline instead
    #[serde(default)]
    pub not_equal: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteOptions {
    /// Detach the item from every pipeline before deleting it
    #[serde(default)]
    pub detach: bool,
}

fn text_search<'a>(name: &'a str, description: &'a Option<String>) -> Vec<&'a str> {
    let mut fields = vec![name];
    if let Some(description) = description.as_deref() {
        fields.push(description);
    }
    fields
}

impl Pageable for EnrichItem {
    fn cursor_id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        text_search(&self.name, &self.description)
    }

    fn sort_fields() -> &'static [&'static str] {
        &["id", "name", "type", "created_at", "updated_at"]
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "name" => SortValue::from(self.name.as_str()),
            "type" => SortValue::Text(self.item_type.to_string()),
            "created_at" => SortValue::from(self.created_at),
            "updated_at" => SortValue::from(self.updated_at),
            _ => SortValue::Int(self.id),
        }
    }
}

impl Pageable for EnrichPipeline {
    fn cursor_id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        text_search(&self.name, &self.description)
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

impl Pageable for PipelineItem {
    fn cursor_id(&self) -> i64 {
        self.item.id
    }

    fn search_fields(&self) -> Vec<&str> {
        self.item.search_fields()
    }

    fn sort_fields() -> &'static [&'static str] {
        &["id", "name", "type", "weight"]
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "weight" => self.weight.map(SortValue::Float).unwrap_or(SortValue::Null),
            other => self.item.sort_value(other),
        }
    }
}
