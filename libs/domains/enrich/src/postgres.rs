use async_trait::async_trait;
use database::pagination::{Connection, PageColumns, PageRequest, paginate_select};
use ordered_relation::postgres::{
    detach_member_in, lock_owner, owners_of_in, replace_set_in,
};
use ordered_relation::{MemberWeight, RelationTable};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};

use crate::entity::{enrich_item, enrich_pipeline};
use crate::error::{EnrichError, EnrichResult};
use crate::models::{EnrichItem, EnrichItemInput, EnrichPipeline, PipelineFields, PipelineItem};
use crate::repository::EnrichRepository;

/// `enrich_pipeline_item` join table
pub const PIPELINE_ITEM_TABLE: RelationTable = RelationTable {
    table: "enrich_pipeline_item",
    owner_column: "enrich_pipeline_id",
    member_column: "enrich_item_id",
    owner_table: "enrich_pipeline",
    member_table: "enrich_item",
};

fn item_columns() -> PageColumns<enrich_item::Column> {
    use enrich_item::Column;
    PageColumns {
        id: Column::Id,
        search: vec![Column::Name, Column::Description],
        sort: vec![
            ("id", Column::Id),
            ("name", Column::Name),
            ("type", Column::ItemType),
            ("created_at", Column::CreatedAt),
            ("updated_at", Column::UpdatedAt),
        ],
    }
}

fn pipeline_columns() -> PageColumns<enrich_pipeline::Column> {
    use enrich_pipeline::Column;
    PageColumns {
        id: Column::Id,
        search: vec![Column::Name, Column::Description],
        sort: vec![
            ("id", Column::Id),
            ("name", Column::Name),
            ("created_at", Column::CreatedAt),
            ("updated_at", Column::UpdatedAt),
        ],
    }
}

pub struct PgEnrichRepository {
    db: DatabaseConnection,
}

impl PgEnrichRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EnrichRepository for PgEnrichRepository {
    async fn create_item(&self, input: EnrichItemInput) -> EnrichResult<EnrichItem> {
        let active_model: enrich_item::ActiveModel = input.into();
        let model = active_model.insert(&self.db).await?;

        tracing::info!(item_id = model.id, "Created enrich item");
        Ok(model.into())
    }

    async fn get_item(&self, id: i64) -> EnrichResult<Option<EnrichItem>> {
        let model = enrich_item::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn list_items(&self, page: &PageRequest) -> EnrichResult<Connection<EnrichItem>> {
        let select = enrich_item::Entity::find();
        Ok(paginate_select(&self.db, select, &item_columns(), page).await?)
    }

    async fn unbound_items(
        &self,
        pipeline_id: i64,
        page: &PageRequest,
    ) -> EnrichResult<Connection<PipelineItem>> {
        let select = enrich_item::Entity::find().filter(
            enrich_item::Column::Id.not_in_subquery(PIPELINE_ITEM_TABLE.members_of_query(pipeline_id)),
        );
        Ok(paginate_select(&self.db, select, &item_columns(), page).await?)
    }

    async fn get_items(&self, ids: Vec<i64>) -> EnrichResult<Vec<EnrichItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = enrich_item::Entity::find()
            .filter(enrich_item::Column::Id.is_in(ids))
            .order_by_asc(enrich_item::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn update_item(&self, id: i64, input: EnrichItemInput) -> EnrichResult<EnrichItem> {
        let txn = self.db.begin().await?;
        enrich_item::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(EnrichError::ItemNotFound(id))?;

        let mut active_model: enrich_item::ActiveModel = input.into();
        active_model.id = Set(id);
        let model = active_model.update(&txn).await?;
        txn.commit().await?;

        tracing::info!(item_id = id, "Updated enrich item");
        Ok(model.into())
    }

    async fn delete_item(&self, id: i64, detach: bool) -> EnrichResult<(EnrichItem, Vec<i64>)> {
        let txn = self.db.begin().await?;
        let model = enrich_item::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(EnrichError::ItemNotFound(id))?;

        let pipelines = owners_of_in(&txn, &PIPELINE_ITEM_TABLE, id).await?;
        if !pipelines.is_empty() {
            if !detach {
                return Err(EnrichError::ItemInUse {
                    item_id: id,
                    pipelines: pipelines.len(),
                });
            }
            detach_member_in(&txn, &PIPELINE_ITEM_TABLE, id).await?;
        }

        enrich_item::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        tracing::info!(item_id = id, detached = pipelines.len(), "Deleted enrich item");
        Ok((model.into(), pipelines))
    }

    async fn create_pipeline(
        &self,
        fields: PipelineFields,
        items: Vec<MemberWeight>,
    ) -> EnrichResult<EnrichPipeline> {
        let txn = self.db.begin().await?;
        let active_model: enrich_pipeline::ActiveModel = fields.into();
        let model = active_model.insert(&txn).await?;

        if !items.is_empty() {
            replace_set_in(&txn, &PIPELINE_ITEM_TABLE, model.id, &items, false).await?;
        }
        txn.commit().await?;

        tracing::info!(pipeline_id = model.id, items = items.len(), "Created enrich pipeline");
        Ok(model.into())
    }

    async fn get_pipeline(&self, id: i64) -> EnrichResult<Option<EnrichPipeline>> {
        let model = enrich_pipeline::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn list_pipelines(&self, page: &PageRequest) -> EnrichResult<Connection<EnrichPipeline>> {
        let select = enrich_pipeline::Entity::find();
        Ok(paginate_select(&self.db, select, &pipeline_columns(), page).await?)
    }

    async fn unbound_pipelines(
        &self,
        item_id: i64,
        page: &PageRequest,
    ) -> EnrichResult<Connection<EnrichPipeline>> {
        let select = enrich_pipeline::Entity::find().filter(
            enrich_pipeline::Column::Id.not_in_subquery(PIPELINE_ITEM_TABLE.owners_of_query(item_id)),
        );
        Ok(paginate_select(&self.db, select, &pipeline_columns(), page).await?)
    }

    async fn update_pipeline(
        &self,
        id: i64,
        fields: PipelineFields,
        items: Vec<MemberWeight>,
        partial: bool,
    ) -> EnrichResult<EnrichPipeline> {
        let txn = self.db.begin().await?;
        replace_set_in(&txn, &PIPELINE_ITEM_TABLE, id, &items, partial).await?;

        let mut active_model: enrich_pipeline::ActiveModel = fields.into();
        active_model.id = Set(id);
        let model = active_model.update(&txn).await?;
        txn.commit().await?;

        tracing::info!(pipeline_id = id, partial, "Updated enrich pipeline");
        Ok(model.into())
    }

    async fn delete_pipeline(&self, id: i64) -> EnrichResult<EnrichPipeline> {
        let txn = self.db.begin().await?;
        lock_owner(&txn, &PIPELINE_ITEM_TABLE, id).await?;
        let model = enrich_pipeline::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(EnrichError::PipelineNotFound(id))?;

        // memberships go with it (ON DELETE CASCADE)
        enrich_pipeline::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        tracing::info!(pipeline_id = id, "Deleted enrich pipeline");
        Ok(model.into())
    }
}
