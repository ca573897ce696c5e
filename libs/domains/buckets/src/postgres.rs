use async_trait::async_trait;
use database::pagination::{Connection, PageColumns, PageRequest, paginate_select};
use ordered_relation::RelationTable;
use ordered_relation::postgres::{detach_member_in, lock_owner, owners_of_in};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};

use crate::entity::{bucket, suggestion_category};
use crate::error::{BucketError, BucketResult};
use crate::models::{
    Bucket, BucketCategory, BucketInput, SuggestionCategory, SuggestionCategoryInput,
};
use crate::repository::BucketRepository;

/// `bucket_suggestion_category` join table
pub const BUCKET_CATEGORY_TABLE: RelationTable = RelationTable {
    table: "bucket_suggestion_category",
    owner_column: "bucket_id",
    member_column: "suggestion_category_id",
    owner_table: "bucket",
    member_table: "suggestion_category",
};

fn bucket_columns() -> PageColumns<bucket::Column> {
    use bucket::Column;
    PageColumns {
        id: Column::Id,
        search: vec![Column::Name, Column::Description],
        sort: vec![
            ("id", Column::Id),
            ("name", Column::Name),
            ("retrieve_type", Column::RetrieveType),
            ("created_at", Column::CreatedAt),
            ("updated_at", Column::UpdatedAt),
        ],
    }
}

fn category_columns() -> PageColumns<suggestion_category::Column> {
    use suggestion_category::Column;
    PageColumns {
        id: Column::Id,
        search: vec![Column::Name, Column::Description],
        sort: vec![
            ("id", Column::Id),
            ("name", Column::Name),
            ("priority", Column::Priority),
            ("multi_select", Column::MultiSelect),
            ("created_at", Column::CreatedAt),
            ("updated_at", Column::UpdatedAt),
        ],
    }
}

pub struct PgBucketRepository {
    db: DatabaseConnection,
}

impl PgBucketRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BucketRepository for PgBucketRepository {
    async fn create_bucket(&self, input: BucketInput) -> BucketResult<Bucket> {
        let active_model: bucket::ActiveModel = input.into();
        let model = active_model.insert(&self.db).await?;

        tracing::info!(bucket_id = model.id, "Created bucket");
        Ok(model.into())
    }

    async fn get_bucket(&self, id: i64) -> BucketResult<Option<Bucket>> {
        let model = bucket::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn list_buckets(&self, page: &PageRequest) -> BucketResult<Connection<Bucket>> {
        let select = bucket::Entity::find();
        Ok(paginate_select(&self.db, select, &bucket_columns(), page).await?)
    }

    async fn unbound_buckets(
        &self,
        category_id: i64,
        page: &PageRequest,
    ) -> BucketResult<Connection<Bucket>> {
        let select = bucket::Entity::find().filter(
            bucket::Column::Id.not_in_subquery(BUCKET_CATEGORY_TABLE.owners_of_query(category_id)),
        );
        Ok(paginate_select(&self.db, select, &bucket_columns(), page).await?)
    }

    async fn update_bucket(&self, id: i64, input: BucketInput) -> BucketResult<Bucket> {
        let txn = self.db.begin().await?;
        lock_owner(&txn, &BUCKET_CATEGORY_TABLE, id).await?;

        let mut active_model: bucket::ActiveModel = input.into();
        active_model.id = Set(id);
        let model = active_model.update(&txn).await?;
        txn.commit().await?;

        tracing::info!(bucket_id = id, "Updated bucket");
        Ok(model.into())
    }

    async fn delete_bucket(&self, id: i64) -> BucketResult<Bucket> {
        let txn = self.db.begin().await?;
        let model = bucket::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(BucketError::BucketNotFound(id))?;

        bucket::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        tracing::info!(bucket_id = id, "Deleted bucket");
        Ok(model.into())
    }

    async fn create_category(
        &self,
        input: SuggestionCategoryInput,
    ) -> BucketResult<SuggestionCategory> {
        let active_model: suggestion_category::ActiveModel = input.into();
        let model = active_model.insert(&self.db).await?;

        tracing::info!(category_id = model.id, "Created suggestion category");
        Ok(model.into())
    }

    async fn get_category(&self, id: i64) -> BucketResult<Option<SuggestionCategory>> {
        let model = suggestion_category::Entity::find_by_id(id)
            .one(&self.db)
            .await?;
        Ok(model.map(Into::into))
    }

    async fn list_categories(
        &self,
        page: &PageRequest,
    ) -> BucketResult<Connection<SuggestionCategory>> {
        let select = suggestion_category::Entity::find();
        Ok(paginate_select(&self.db, select, &category_columns(), page).await?)
    }

    async fn unbound_categories(
        &self,
        bucket_id: i64,
        page: &PageRequest,
    ) -> BucketResult<Connection<BucketCategory>> {
        let select = suggestion_category::Entity::find().filter(
            suggestion_category::Column::Id
                .not_in_subquery(BUCKET_CATEGORY_TABLE.members_of_query(bucket_id)),
        );
        Ok(paginate_select(&self.db, select, &category_columns(), page).await?)
    }

    async fn get_categories(&self, ids: Vec<i64>) -> BucketResult<Vec<SuggestionCategory>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = suggestion_category::Entity::find()
            .filter(suggestion_category::Column::Id.is_in(ids))
            .order_by_asc(suggestion_category::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn update_category(
        &self,
        id: i64,
        input: SuggestionCategoryInput,
    ) -> BucketResult<SuggestionCategory> {
        let txn = self.db.begin().await?;
        suggestion_category::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(BucketError::CategoryNotFound(id))?;

        let mut active_model: suggestion_category::ActiveModel = input.into();
        active_model.id = Set(id);
        let model = active_model.update(&txn).await?;
        txn.commit().await?;

        tracing::info!(category_id = id, "Updated suggestion category");
        Ok(model.into())
    }

    async fn delete_category(
        &self,
        id: i64,
        detach: bool,
    ) -> BucketResult<(SuggestionCategory, Vec<i64>)> {
        let txn = self.db.begin().await?;
        let model = suggestion_category::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(BucketError::CategoryNotFound(id))?;

        let buckets = owners_of_in(&txn, &BUCKET_CATEGORY_TABLE, id).await?;
        if !buckets.is_empty() {
            if !detach {
                return Err(BucketError::CategoryInUse {
                    category_id: id,
                    buckets: buckets.len(),
                });
            }
            detach_member_in(&txn, &BUCKET_CATEGORY_TABLE, id).await?;
        }

        suggestion_category::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        tracing::info!(category_id = id, detached = buckets.len(), "Deleted suggestion category");
        Ok((model.into(), buckets))
    }
}
