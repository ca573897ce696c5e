use axum_helpers::FieldValidator;
use chrono::{DateTime, Utc};
use database::pagination::{Pageable, SortValue};
use ordered_relation::MemberWeight;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

pub const BUCKET_ENTITY: &str = "bucket";
pub const CATEGORY_ENTITY: &str = "suggestion_category";

/// Retrieval strategy used when searching a bucket
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
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "retrieve_type")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RetrieveType {
    #[sea_orm(string_value = "match")]
    Match,
    #[default]
    #[sea_orm(string_value = "text")]
    Text,
    #[sea_orm(string_value = "knn")]
    Knn,
    #[sea_orm(string_value = "hybrid")]
    Hybrid,
}

/// A searchable group of data indices with its suggestion categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Bucket {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub retrieve_type: RetrieveType,
    pub refresh_on_suggestion_category: bool,
    pub refresh_on_tab: bool,
    pub refresh_on_date: bool,
    pub refresh_on_query: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create or fully replace a bucket
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct BucketInput {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub retrieve_type: RetrieveType,
    #[serde(default)]
    pub refresh_on_suggestion_category: bool,
    #[serde(default)]
    pub refresh_on_tab: bool,
    #[serde(default)]
    pub refresh_on_date: bool,
    #[serde(default)]
    pub refresh_on_query: bool,
}

impl From<Bucket> for BucketInput {
    fn from(bucket: Bucket) -> Self {
        Self {
            name: bucket.name,
            description: bucket.description,
            retrieve_type: bucket.retrieve_type,
            refresh_on_suggestion_category: bucket.refresh_on_suggestion_category,
            refresh_on_tab: bucket.refresh_on_tab,
            refresh_on_date: bucket.refresh_on_date,
            refresh_on_query: bucket.refresh_on_query,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct PatchBucket {
    pub name: Option<String>,
    pub description: Option<String>,
    pub retrieve_type: Option<RetrieveType>,
    pub refresh_on_suggestion_category: Option<bool>,
    pub refresh_on_tab: Option<bool>,
    pub refresh_on_date: Option<bool>,
    pub refresh_on_query: Option<bool>,
}

impl PatchBucket {
    pub fn apply_to(self, mut input: BucketInput) -> BucketInput {
        if let Some(name) = self.name {
            input.name = name;
        }
        if let Some(description) = self.description {
            input.description = Some(description);
        }
        if let Some(retrieve_type) = self.retrieve_type {
            input.retrieve_type = retrieve_type;
        }
        if let Some(flag) = self.refresh_on_suggestion_category {
            input.refresh_on_suggestion_category = flag;
        }
        if let Some(flag) = self.refresh_on_tab {
            input.refresh_on_tab = flag;
        }
        if let Some(flag) = self.refresh_on_date {
            input.refresh_on_date = flag;
        }
        if let Some(flag) = self.refresh_on_query {
            input.refresh_on_query = flag;
        }
        input
    }
}

/// A facet offered as search suggestions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SuggestionCategory {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub priority: f64,
    pub multi_select: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_priority(priority: f64) -> Result<(), validator::ValidationError> {
    if priority.is_finite() && priority >= 0.0 {
        Ok(())
    } else {
        Err(validator::ValidationError::new("range")
            .with_message("must be a finite number not below 0".into()))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct SuggestionCategoryInput {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_priority"))]
    pub priority: f64,
    #[serde(default)]
    pub multi_select: bool,
}

impl From<SuggestionCategory> for SuggestionCategoryInput {
    fn from(category: SuggestionCategory) -> Self {
        Self {
            name: category.name,
            description: category.description,
            priority: category.priority,
            multi_select: category.multi_select,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct PatchSuggestionCategory {
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<f64>,
    pub multi_select: Option<bool>,
}

impl PatchSuggestionCategory {
    pub fn apply_to(self, mut input: SuggestionCategoryInput) -> SuggestionCategoryInput {
        if let Some(name) = self.name {
            input.name = name;
        }
        if let Some(description) = self.description {
            input.description = Some(description);
        }
        if let Some(priority) = self.priority {
            input.priority = priority;
        }
        if let Some(multi_select) = self.multi_select {
            input.multi_select = multi_select;
        }
        input
    }
}

/// Field validators of any `Validate` input
pub fn validators_of(input: &impl Validate) -> Vec<FieldValidator> {
    match input.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => FieldValidator::from_validation_errors(&errors),
    }
}

/// A suggestion category as seen from a bucket: its weight when bound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BucketCategory {
    #[serde(flatten)]
    pub category: SuggestionCategory,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BucketCategoryInput {
    pub suggestion_category_id: i64,
    pub weight: f64,
}

impl From<BucketCategoryInput> for MemberWeight {
    fn from(input: BucketCategoryInput) -> Self {
        MemberWeight::new(input.suggestion_category_id, input.weight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
pub struct AddBucketCategory {
    pub suggestion_category_id: i64,
    /// Append (default) or prepend
    #[serde(default = "default_tail")]
    pub tail: bool,
}

fn default_tail() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
pub struct SortBucketCategories {
    pub suggestion_category_ids: Vec<i64>,
}

/// Replace a bucket's categories.
///
/// With `partial` the listed categories are upserted and the others kept;
/// otherwise categories not listed are removed.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
pub struct ReplaceBucketCategories {
    pub suggestion_categories: Vec<BucketCategoryInput>,
    #[serde(default)]
    pub partial: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MembershipFilter {
    /// List the categories *not* bound to the bucket instead
    #[serde(default)]
    pub not_equal: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteOptions {
    /// Detach the category from every bucket before deleting it
    #[serde(default)]
    pub detach: bool,
}

fn text_search<'a>(name: &'a str, description: &'a Option<String>) -> Vec<&'a str> {
    let mut fields = vec![name];
    fields.extend(description.as_deref());
    fields
}

impl Pageable for Bucket {
    fn cursor_id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        text_search(&self.name, &self.description)
    }

    fn sort_fields() -> &'static [&'static str] {
        &["id", "name", "retrieve_type", "created_at", "updated_at"]
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "name" => SortValue::from(self.name.as_str()),
            "retrieve_type" => SortValue::Text(self.retrieve_type.to_string()),
            "created_at" => SortValue::from(self.created_at),
            "updated_at" => SortValue::from(self.updated_at),
            _ => SortValue::Int(self.id),
        }
    }
}

impl Pageable for SuggestionCategory {
    fn cursor_id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        text_search(&self.name, &self.description)
    }

    fn sort_fields() -> &'static [&'static str] {
        &["id", "name", "priority", "multi_select", "created_at", "updated_at"]
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "name" => SortValue::from(self.name.as_str()),
            "priority" => SortValue::Float(self.priority),
            "multi_select" => SortValue::Bool(self.multi_select),
            "created_at" => SortValue::from(self.created_at),
            "updated_at" => SortValue::from(self.updated_at),
            _ => SortValue::Int(self.id),
        }
    }
}

impl Pageable for BucketCategory {
    fn cursor_id(&self) -> i64 {
        self.category.id
    }

    fn search_fields(&self) -> Vec<&str> {
        self.category.search_fields()
    }

    fn sort_fields() -> &'static [&'static str] {
        &["id", "name", "priority", "weight"]
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "weight" => self.weight.map(SortValue::Float).unwrap_or(SortValue::Null),
            other => self.category.sort_value(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_defaults() {
        let input: BucketInput = serde_json::from_str(r#"{"name": "docs"}"#).unwrap();
        assert_eq!(input.retrieve_type, RetrieveType::Text);
        assert!(!input.refresh_on_query);
        assert!(validators_of(&input).is_empty());
    }

    #[test]
    fn test_category_priority_rules() {
        let input = SuggestionCategoryInput {
            name: "topic".into(),
            priority: -1.0,
            ..Default::default()
        };
        let validators = validators_of(&input);
        assert_eq!(validators.len(), 1);
        assert_eq!(validators[0].field, "priority");

        let input = SuggestionCategoryInput {
            priority: f64::INFINITY,
            ..input
        };
        assert_eq!(validators_of(&input)[0].field, "priority");
    }

    #[test]
    fn test_patch_bucket_flags() {
        let patch = PatchBucket {
            refresh_on_tab: Some(true),
            retrieve_type: Some(RetrieveType::Hybrid),
            ..Default::default()
        };
        let input = patch.apply_to(BucketInput {
            name: "docs".into(),
            ..Default::default()
        });
        assert!(input.refresh_on_tab);
        assert_eq!(input.retrieve_type, RetrieveType::Hybrid);
        assert_eq!(input.name, "docs");
    }

    #[test]
    fn test_replace_defaults_to_full() {
        let replace: ReplaceBucketCategories =
            serde_json::from_str(r#"{"suggestion_categories": []}"#).unwrap();
        assert!(!replace.partial);
    }

    #[test]
    fn test_bucket_category_sorts_by_weight() {
        let category = SuggestionCategory {
            id: 1,
            name: "topic".into(),
            description: None,
            priority: 0.0,
            multi_select: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let bound = BucketCategory {
            category: category.clone(),
            weight: Some(2.0),
        };
        assert_eq!(bound.sort_value("weight"), SortValue::Float(2.0));
        let unbound = BucketCategory {
            category,
            weight: None,
        };
        assert_eq!(unbound.sort_value("weight"), SortValue::Null);
    }
}
