use async_trait::async_trait;
use chrono::Utc;
use database::pagination::{Connection, PageRequest, paginate};
use ordered_relation::{InMemoryOrderedRelation, MemberWeight, OrderedRelation};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{EnrichError, EnrichResult};
use crate::models::{EnrichItem, EnrichItemInput, EnrichPipeline, PipelineFields, PipelineItem};

/// Repository trait for enrich items and pipelines.
///
/// Pipeline membership itself is read and changed through an
/// [`OrderedRelation`]; the repository only touches it where a write must be
/// atomic with the owning row (create/update/delete).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrichRepository: Send + Sync {
    async fn create_item(&self, input: EnrichItemInput) -> EnrichResult<EnrichItem>;

    async fn get_item(&self, id: i64) -> EnrichResult<Option<EnrichItem>>;

    /// One page of items, by id unless `page` sorts otherwise
    async fn list_items(&self, page: &PageRequest) -> EnrichResult<Connection<EnrichItem>>;

    /// One page of the items not bound to `pipeline_id`
    async fn unbound_items(
        &self,
        pipeline_id: i64,
        page: &PageRequest,
    ) -> EnrichResult<Connection<PipelineItem>>;

    /// Items with the given ids, by id ascending; unknown ids are skipped
    async fn get_items(&self, ids: Vec<i64>) -> EnrichResult<Vec<EnrichItem>>;

    /// Replace every field of an item
    async fn update_item(&self, id: i64, input: EnrichItemInput) -> EnrichResult<EnrichItem>;

    /// Delete an item.
    ///
    /// An item bound to a pipeline is rejected with `ItemInUse` unless
    /// `detach` is set, in which case it is removed from every pipeline first.
    /// Returns the deleted item and the pipelines it was detached from.
    async fn delete_item(&self, id: i64, detach: bool) -> EnrichResult<(EnrichItem, Vec<i64>)>;

    /// Create a pipeline and bind `items` in the same transaction
    async fn create_pipeline(
        &self,
        fields: PipelineFields,
        items: Vec<MemberWeight>,
    ) -> EnrichResult<EnrichPipeline>;

    async fn get_pipeline(&self, id: i64) -> EnrichResult<Option<EnrichPipeline>>;

    /// One page of pipelines, by id unless `page` sorts otherwise
    async fn list_pipelines(&self, page: &PageRequest) -> EnrichResult<Connection<EnrichPipeline>>;

    /// One page of the pipelines that do not contain `item_id`
    async fn unbound_pipelines(
        &self,
        item_id: i64,
        page: &PageRequest,
    ) -> EnrichResult<Connection<EnrichPipeline>>;

    /// Update the pipeline fields and replace its item set atomically
    async fn update_pipeline(
        &self,
        id: i64,
        fields: PipelineFields,
        items: Vec<MemberWeight>,
        partial: bool,
    ) -> EnrichResult<EnrichPipeline>;

    /// Delete a pipeline together with its memberships
    async fn delete_pipeline(&self, id: i64) -> EnrichResult<EnrichPipeline>;
}

#[derive(Debug, Default)]
struct EnrichState {
    items: BTreeMap<i64, EnrichItem>,
    pipelines: BTreeMap<i64, EnrichPipeline>,
    last_item_id: i64,
    last_pipeline_id: i64,
}

/// In-memory implementation of EnrichRepository (for development/testing).
///
/// Shares its [`InMemoryOrderedRelation`] with the service so that owners and
/// members are registered as they are created.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEnrichRepository {
    state: Arc<RwLock<EnrichState>>,
    relation: InMemoryOrderedRelation,
}

impl InMemoryEnrichRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// The membership store backing this repository
    pub fn relation(&self) -> InMemoryOrderedRelation {
        self.relation.clone()
    }
}

fn build_item(id: i64, input: EnrichItemInput, created_at: chrono::DateTime<Utc>) -> EnrichItem {
    EnrichItem {
        id,
        name: input.name,
        description: input.description,
        item_type: input.item_type,
        service_name: input.service_name,
        script: input.script,
        json_config: input.json_config,
        json_path: input.json_path,
        behavior_merge_type: input.behavior_merge_type,
        request_timeout: input.request_timeout,
        behavior_on_error: input.behavior_on_error,
        created_at,
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl EnrichRepository for InMemoryEnrichRepository {
    async fn create_item(&self, input: EnrichItemInput) -> EnrichResult<EnrichItem> {
        let mut state = self.state.write().await;
        state.last_item_id += 1;
        let item = build_item(state.last_item_id, input, Utc::now());
        state.items.insert(item.id, item.clone());
        self.relation.register_member(item.id).await;

        tracing::info!(item_id = item.id, "Created enrich item");
        Ok(item)
    }

    async fn get_item(&self, id: i64) -> EnrichResult<Option<EnrichItem>> {
        Ok(self.state.read().await.items.get(&id).cloned())
    }

    async fn list_items(&self, page: &PageRequest) -> EnrichResult<Connection<EnrichItem>> {
        let items = self.state.read().await.items.values().cloned().collect();
        Ok(paginate(items, page)?)
    }

    async fn unbound_items(
        &self,
        pipeline_id: i64,
        page: &PageRequest,
    ) -> EnrichResult<Connection<PipelineItem>> {
        let bound: HashSet<i64> = self
            .relation
            .members(pipeline_id)
            .await?
            .into_iter()
            .map(|m| m.member_id)
            .collect();

        let items = self
            .state
            .read()
            .await
            .items
            .values()
            .filter(|item| !bound.contains(&item.id))
            .map(|item| PipelineItem {
                item: item.clone(),
                weight: None,
            })
            .collect();
        Ok(paginate(items, page)?)
    }

    async fn get_items(&self, ids: Vec<i64>) -> EnrichResult<Vec<EnrichItem>> {
        let state = self.state.read().await;
        let mut items: Vec<EnrichItem> = ids
            .iter()
            .filter_map(|id| state.items.get(id).cloned())
            .collect();
        items.sort_by_key(|item| item.id);
        items.dedup_by_key(|item| item.id);
        Ok(items)
    }

    async fn update_item(&self, id: i64, input: EnrichItemInput) -> EnrichResult<EnrichItem> {
        let mut state = self.state.write().await;
        let existing = state.items.get(&id).ok_or(EnrichError::ItemNotFound(id))?;
        let item = build_item(id, input, existing.created_at);
        state.items.insert(id, item.clone());

        tracing::info!(item_id = id, "Updated enrich item");
        Ok(item)
    }

    async fn delete_item(&self, id: i64, detach: bool) -> EnrichResult<(EnrichItem, Vec<i64>)> {
        let mut state = self.state.write().await;
        if !state.items.contains_key(&id) {
            return Err(EnrichError::ItemNotFound(id));
        }

        let pipelines = self
            .relation
            .unregister_member(id, detach)
            .await
            .map_err(|pipelines| EnrichError::ItemInUse {
                item_id: id,
                pipelines: pipelines.len(),
            })?;
        let item = state.items.remove(&id).ok_or(EnrichError::ItemNotFound(id))?;

        tracing::info!(item_id = id, detached = pipelines.len(), "Deleted enrich item");
        Ok((item, pipelines))
    }

    async fn create_pipeline(
        &self,
        fields: PipelineFields,
        items: Vec<MemberWeight>,
    ) -> EnrichResult<EnrichPipeline> {
        let mut state = self.state.write().await;
        let id = state.last_pipeline_id + 1;
        self.relation.register_owner(id).await;

        if !items.is_empty() {
            if let Err(err) = self.relation.replace_set(id, items, false).await {
                self.relation.unregister_owner(id).await;
                return Err(err.into());
            }
        }

        let now = Utc::now();
        let pipeline = EnrichPipeline {
            id,
            name: fields.name,
            description: fields.description,
            created_at: now,
            updated_at: now,
        };
        state.last_pipeline_id = id;
        state.pipelines.insert(id, pipeline.clone());

        tracing::info!(pipeline_id = id, "Created enrich pipeline");
        Ok(pipeline)
    }

    async fn get_pipeline(&self, id: i64) -> EnrichResult<Option<EnrichPipeline>> {
        Ok(self.state.read().await.pipelines.get(&id).cloned())
    }

    async fn list_pipelines(&self, page: &PageRequest) -> EnrichResult<Connection<EnrichPipeline>> {
        let pipelines = self.state.read().await.pipelines.values().cloned().collect();
        Ok(paginate(pipelines, page)?)
    }

    async fn unbound_pipelines(
        &self,
        item_id: i64,
        page: &PageRequest,
    ) -> EnrichResult<Connection<EnrichPipeline>> {
        let bound: HashSet<i64> = self.relation.owners_of(item_id).await?.into_iter().collect();
        let pipelines = self
            .state
            .read()
            .await
            .pipelines
            .values()
            .filter(|pipeline| !bound.contains(&pipeline.id))
            .cloned()
            .collect();
        Ok(paginate(pipelines, page)?)
    }

    async fn update_pipeline(
        &self,
        id: i64,
        fields: PipelineFields,
        items: Vec<MemberWeight>,
        partial: bool,
    ) -> EnrichResult<EnrichPipeline> {
        let mut state = self.state.write().await;
        if !state.pipelines.contains_key(&id) {
            return Err(EnrichError::PipelineNotFound(id));
        }

        self.relation.replace_set(id, items, partial).await?;

        let pipeline = state
            .pipelines
            .get_mut(&id)
            .ok_or(EnrichError::PipelineNotFound(id))?;
        pipeline.name = fields.name;
        pipeline.description = fields.description;
        pipeline.updated_at = Utc::now();

        tracing::info!(pipeline_id = id, partial, "Updated enrich pipeline");
        Ok(pipeline.clone())
    }

    async fn delete_pipeline(&self, id: i64) -> EnrichResult<EnrichPipeline> {
        let mut state = self.state.write().await;
        let pipeline = state
            .pipelines
            .remove(&id)
            .ok_or(EnrichError::PipelineNotFound(id))?;
        self.relation.unregister_owner(id).await;

        tracing::info!(pipeline_id = id, "Deleted enrich pipeline");
        Ok(pipeline)
    }
}
