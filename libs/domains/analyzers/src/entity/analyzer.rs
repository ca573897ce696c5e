use crate::models::{Analyzer, AnalyzerInput};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "analyzer")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_name = "type")]
    pub analyzer_type: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub json_config: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Analyzer {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            analyzer_type: model.analyzer_type,
            json_config: model.json_config,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<AnalyzerInput> for ActiveModel {
    fn from(input: AnalyzerInput) -> Self {
        Self {
            id: NotSet,
            name: Set(input.name),
            description: Set(input.description),
            analyzer_type: Set(input.analyzer_type),
            json_config: Set(input.json_config),
            created_at: NotSet,
            updated_at: NotSet,
        }
    }
}
