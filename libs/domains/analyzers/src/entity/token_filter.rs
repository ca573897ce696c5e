use crate::models::{AnalyzerFilter, Filter, FilterInput};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "token_filter")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub json_config: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Filter {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            json_config: model.json_config,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

/// Unbound filter, so no weight
impl From<Model> for AnalyzerFilter {
    fn from(model: Model) -> Self {
        Self {
            filter: model.into(),
            weight: None,
        }
    }
}

impl From<FilterInput> for ActiveModel {
    fn from(input: FilterInput) -> Self {
        Self {
            id: NotSet,
            name: Set(input.name),
            description: Set(input.description),
            json_config: Set(input.json_config),
            created_at: NotSet,
            updated_at: NotSet,
        }
    }
}
