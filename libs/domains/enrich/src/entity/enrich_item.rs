use crate::models::{
    BehaviorMergeType, BehaviorOnError, EnrichItem, EnrichItemInput, EnrichItemType, PipelineItem,
};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "enrich_item")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_name = "type")]
    pub item_type: EnrichItemType,
    pub service_name: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub script: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub json_config: Option<String>,
    pub json_path: Option<String>,
    pub behavior_merge_type: BehaviorMergeType,
    pub request_timeout: i64,
    pub behavior_on_error: BehaviorOnError,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for EnrichItem {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            item_type: model.item_type,
            service_name: model.service_name,
            script: model.script,
            json_config: model.json_config,
            json_path: model.json_path,
            behavior_merge_type: model.behavior_merge_type,
            request_timeout: model.request_timeout,
            behavior_on_error: model.behavior_on_error,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

// Timestamps are left to column defaults and the touch trigger
/// An item listed against a pipeline it is not bound to
impl From<Model> for PipelineItem {
    fn from(model: Model) -> Self {
        PipelineItem {
            item: model.into(),
            weight: None,
        }
    }
}

impl From<EnrichItemInput> for ActiveModel {
    fn from(input: EnrichItemInput) -> Self {
        Self {
            id: NotSet,
            name: Set(input.name),
            description: Set(input.description),
            item_type: Set(input.item_type),
            service_name: Set(input.service_name),
            script: Set(input.script),
            json_config: Set(input.json_config),
            json_path: Set(input.json_path),
            behavior_merge_type: Set(input.behavior_merge_type),
            request_timeout: Set(input.request_timeout),
            behavior_on_error: Set(input.behavior_on_error),
            created_at: NotSet,
            updated_at: NotSet,
        }
    }
}
