use crate::models::{BucketCategory, SuggestionCategory, SuggestionCategoryInput};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "suggestion_category")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Double")]
    pub priority: f64,
    pub multi_select: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for SuggestionCategory {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            priority: model.priority,
            multi_select: model.multi_select,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

/// A category listed against a bucket it is not bound to
impl From<Model> for BucketCategory {
    fn from(model: Model) -> Self {
        BucketCategory {
            category: model.into(),
            weight: None,
        }
    }
}

impl From<SuggestionCategoryInput> for ActiveModel {
    fn from(input: SuggestionCategoryInput) -> Self {
        Self {
            id: NotSet,
            name: Set(input.name),
            description: Set(input.description),
            priority: Set(input.priority),
            multi_select: Set(input.multi_select),
            created_at: NotSet,
            updated_at: NotSet,
        }
    }
}
