use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::pagination::{Connection, PageRequest, paginate};
use ordered_relation::{InMemoryOrderedRelation, OrderedRelation};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{BucketError, BucketResult};
use crate::models::{
    Bucket, BucketCategory, BucketInput, SuggestionCategory, SuggestionCategoryInput,
};

/// Repository trait for buckets and suggestion categories.
///
/// Bucket ↔ category membership is handled by an [`OrderedRelation`];
/// deletes here keep it consistent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BucketRepository: Send + Sync {
    async fn create_bucket(&self, input: BucketInput) -> BucketResult<Bucket>;

    async fn get_bucket(&self, id: i64) -> BucketResult<Option<Bucket>>;

    /// One page of buckets, by id unless `page` sorts otherwise
    async fn list_buckets(&self, page: &PageRequest) -> BucketResult<Connection<Bucket>>;

    /// One page of the buckets that do not contain `category_id`
    async fn unbound_buckets(
        &self,
        category_id: i64,
        page: &PageRequest,
    ) -> BucketResult<Connection<Bucket>>;

    async fn update_bucket(&self, id: i64, input: BucketInput) -> BucketResult<Bucket>;

    /// Delete a bucket together with its memberships
    async fn delete_bucket(&self, id: i64) -> BucketResult<Bucket>;

    async fn create_category(&self, input: SuggestionCategoryInput)
    -> BucketResult<SuggestionCategory>;

    async fn get_category(&self, id: i64) -> BucketResult<Option<SuggestionCategory>>;

    /// One page of suggestion categories, by id unless `page` sorts otherwise
    async fn list_categories(
        &self,
        page: &PageRequest,
    ) -> BucketResult<Connection<SuggestionCategory>>;

    /// One page of the categories not bound to `bucket_id`
    async fn unbound_categories(
        &self,
        bucket_id: i64,
        page: &PageRequest,
    ) -> BucketResult<Connection<BucketCategory>>;

    /// Categories with the given ids, by id ascending; unknown ids are skipped
    async fn get_categories(&self, ids: Vec<i64>) -> BucketResult<Vec<SuggestionCategory>>;

    async fn update_category(
        &self,
        id: i64,
        input: SuggestionCategoryInput,
    ) -> BucketResult<SuggestionCategory>;

    /// Delete a category, detaching it from its buckets when `detach` is set.
    /// Returns the deleted category and the buckets it was removed from.
    async fn delete_category(
        &self,
        id: i64,
        detach: bool,
    ) -> BucketResult<(SuggestionCategory, Vec<i64>)>;
}

#[derive(Debug, Default)]
struct BucketState {
    buckets: BTreeMap<i64, Bucket>,
    categories: BTreeMap<i64, SuggestionCategory>,
    last_bucket_id: i64,
    last_category_id: i64,
}

/// In-memory implementation of BucketRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryBucketRepository {
    state: Arc<RwLock<BucketState>>,
    relation: InMemoryOrderedRelation,
}

impl InMemoryBucketRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// The membership store backing this repository
    pub fn relation(&self) -> InMemoryOrderedRelation {
        self.relation.clone()
    }
}

fn build_bucket(id: i64, input: BucketInput, created_at: DateTime<Utc>) -> Bucket {
    Bucket {
        id,
        name: input.name,
        description: input.description,
        retrieve_type: input.retrieve_type,
        refresh_on_suggestion_category: input.refresh_on_suggestion_category,
        refresh_on_tab: input.refresh_on_tab,
        refresh_on_date: input.refresh_on_date,
        refresh_on_query: input.refresh_on_query,
        created_at,
        updated_at: Utc::now(),
    }
}

fn build_category(
    id: i64,
    input: SuggestionCategoryInput,
    created_at: DateTime<Utc>,
) -> SuggestionCategory {
    SuggestionCategory {
        id,
        name: input.name,
        description: input.description,
        priority: input.priority,
        multi_select: input.multi_select,
        created_at,
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl BucketRepository for InMemoryBucketRepository {
    async fn create_bucket(&self, input: BucketInput) -> BucketResult<Bucket> {
        let mut state = self.state.write().await;
        state.last_bucket_id += 1;
        let bucket = build_bucket(state.last_bucket_id, input, Utc::now());
        state.buckets.insert(bucket.id, bucket.clone());
        self.relation.register_owner(bucket.id).await;

        tracing::info!(bucket_id = bucket.id, "Created bucket");
        Ok(bucket)
    }

    async fn get_bucket(&self, id: i64) -> BucketResult<Option<Bucket>> {
        Ok(self.state.read().await.buckets.get(&id).cloned())
    }

    async fn list_buckets(&self, page: &PageRequest) -> BucketResult<Connection<Bucket>> {
        let buckets = self.state.read().await.buckets.values().cloned().collect();
        Ok(paginate(buckets, page)?)
    }

    async fn unbound_buckets(
        &self,
        category_id: i64,
        page: &PageRequest,
    ) -> BucketResult<Connection<Bucket>> {
        let bound: HashSet<i64> = self
            .relation
            .owners_of(category_id)
            .await?
            .into_iter()
            .collect();
        let buckets = self
            .state
            .read()
            .await
            .buckets
            .values()
            .filter(|bucket| !bound.contains(&bucket.id))
            .cloned()
            .collect();
        Ok(paginate(buckets, page)?)
    }

    async fn update_bucket(&self, id: i64, input: BucketInput) -> BucketResult<Bucket> {
        let mut state = self.state.write().await;
        let existing = state.buckets.get(&id).ok_or(BucketError::BucketNotFound(id))?;
        let bucket = build_bucket(id, input, existing.created_at);
        state.buckets.insert(id, bucket.clone());

        tracing::info!(bucket_id = id, "Updated bucket");
        Ok(bucket)
    }

    async fn delete_bucket(&self, id: i64) -> BucketResult<Bucket> {
        let mut state = self.state.write().await;
        let bucket = state
            .buckets
            .remove(&id)
            .ok_or(BucketError::BucketNotFound(id))?;
        self.relation.unregister_owner(id).await;

        tracing::info!(bucket_id = id, "Deleted bucket");
        Ok(bucket)
    }

    async fn create_category(
        &self,
        input: SuggestionCategoryInput,
    ) -> BucketResult<SuggestionCategory> {
        let mut state = self.state.write().await;
        state.last_category_id += 1;
        let category = build_category(state.last_category_id, input, Utc::now());
        state.categories.insert(category.id, category.clone());
        self.relation.register_member(category.id).await;

        tracing::info!(category_id = category.id, "Created suggestion category");
        Ok(category)
    }

    async fn get_category(&self, id: i64) -> BucketResult<Option<SuggestionCategory>> {
        Ok(self.state.read().await.categories.get(&id).cloned())
    }

    async fn list_categories(
        &self,
        page: &PageRequest,
    ) -> BucketResult<Connection<SuggestionCategory>> {
        let categories = self.state.read().await.categories.values().cloned().collect();
        Ok(paginate(categories, page)?)
    }

    async fn unbound_categories(
        &self,
        bucket_id: i64,
        page: &PageRequest,
    ) -> BucketResult<Connection<BucketCategory>> {
        let bound: HashSet<i64> = self
            .relation
            .members(bucket_id)
            .await?
            .into_iter()
            .map(|m| m.member_id)
            .collect();
        let categories = self
            .state
            .read()
            .await
            .categories
            .values()
            .filter(|category| !bound.contains(&category.id))
            .map(|category| BucketCategory {
                category: category.clone(),
                weight: None,
            })
            .collect();
        Ok(paginate(categories, page)?)
    }

    async fn get_categories(&self, ids: Vec<i64>) -> BucketResult<Vec<SuggestionCategory>> {
        let state = self.state.read().await;
        let mut categories: Vec<SuggestionCategory> = ids
            .iter()
            .filter_map(|id| state.categories.get(id).cloned())
            .collect();
        categories.sort_by_key(|c| c.id);
        categories.dedup_by_key(|c| c.id);
        Ok(categories)
    }

    async fn update_category(
        &self,
        id: i64,
        input: SuggestionCategoryInput,
    ) -> BucketResult<SuggestionCategory> {
        let mut state = self.state.write().await;
        let existing = state
            .categories
            .get(&id)
            .ok_or(BucketError::CategoryNotFound(id))?;
        let category = build_category(id, input, existing.created_at);
        state.categories.insert(id, category.clone());

        tracing::info!(category_id = id, "Updated suggestion category");
        Ok(category)
    }

    async fn delete_category(
        &self,
        id: i64,
        detach: bool,
    ) -> BucketResult<(SuggestionCategory, Vec<i64>)> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&id) {
            return Err(BucketError::CategoryNotFound(id));
        }

        let buckets = self
            .relation
            .unregister_member(id, detach)
            .await
            .map_err(|buckets| BucketError::CategoryInUse {
                category_id: id,
                buckets: buckets.len(),
            })?;
        let category = state
            .categories
            .remove(&id)
            .ok_or(BucketError::CategoryNotFound(id))?;

        tracing::info!(category_id = id, detached = buckets.len(), "Deleted suggestion category");
        Ok((category, buckets))
    }
}
