use crate::models::{Bucket, BucketInput, RetrieveType};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bucket")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub retrieve_type: RetrieveType,
    pub refresh_on_suggestion_category: bool,
    pub refresh_on_tab: bool,
    pub refresh_on_date: bool,
    pub refresh_on_query: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Bucket {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            retrieve_type: model.retrieve_type,
            refresh_on_suggestion_category: model.refresh_on_suggestion_category,
            refresh_on_tab: model.refresh_on_tab,
            refresh_on_date: model.refresh_on_date,
            refresh_on_query: model.refresh_on_query,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<BucketInput> for ActiveModel {
    fn from(input: BucketInput) -> Self {
        Self {
            id: NotSet,
            name: Set(input.name),
            description: Set(input.description),
            retrieve_type: Set(input.retrieve_type),
            refresh_on_suggestion_category: Set(input.refresh_on_suggestion_category),
            refresh_on_tab: Set(input.refresh_on_tab),
            refresh_on_date: Set(input.refresh_on_date),
            refresh_on_query: Set(input.refresh_on_query),
            created_at: NotSet,
            updated_at: NotSet,
        }
    }
}
