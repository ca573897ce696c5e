use axum_helpers::MutationResponse;
use database::pagination::{Connection, PageRequest, paginate};
use entity_events::{EntityEvent, EventBus};
use ordered_relation::{MemberWeight, Membership, OrderedRelation, Placement};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::error::{EnrichError, EnrichResult};
use crate::models::{
    EnrichItem, EnrichItemInput, EnrichPipeline, EnrichPipelineInput, ITEM_ENTITY,
    PIPELINE_ENTITY, PatchEnrichItem, PatchEnrichPipeline, PipelineFields, PipelineItem,
    PipelineItemInput, pipeline_validators,
};
use crate::repository::EnrichRepository;

/// Service layer for enrich items and pipelines
#[derive(Clone)]
pub struct EnrichService<R: EnrichRepository> {
    repository: Arc<R>,
    relation: Arc<dyn OrderedRelation>,
    events: EventBus,
}

fn member_weights(items: Option<Vec<PipelineItemInput>>) -> Vec<MemberWeight> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(MemberWeight::from)
        .collect()
}

impl<R: EnrichRepository> EnrichService<R> {
    pub fn new(repository: R, relation: Arc<dyn OrderedRelation>, events: EventBus) -> Self {
        Self {
            repository: Arc::new(repository),
            relation,
            events,
        }
    }

    // Items

    pub async fn list_items(&self, page: &PageRequest) -> EnrichResult<Connection<EnrichItem>> {
        self.repository.list_items(page).await
    }

    pub async fn get_item(&self, id: i64) -> EnrichResult<EnrichItem> {
        self.repository
            .get_item(id)
            .await?
            .ok_or(EnrichError::ItemNotFound(id))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_item(
        &self,
        input: EnrichItemInput,
    ) -> EnrichResult<MutationResponse<EnrichItem>> {
        let validators = input.validators();
        if !validators.is_empty() {
            return Ok(MutationResponse::invalid(validators));
        }

        let item = self.repository.create_item(input).await?;
        self.events
            .publish(EntityEvent::created(ITEM_ENTITY, item.id, &item));
        Ok(MutationResponse::ok(item))
    }

    #[instrument(skip(self, input))]
    pub async fn update_item(
        &self,
        id: i64,
        input: EnrichItemInput,
    ) -> EnrichResult<MutationResponse<EnrichItem>> {
        let validators = input.validators();
        if !validators.is_empty() {
            return Ok(MutationResponse::invalid(validators));
        }

        let item = self.repository.update_item(id, input).await?;
        self.events
            .publish(EntityEvent::updated(ITEM_ENTITY, item.id, &item));
        Ok(MutationResponse::ok(item))
    }

    #[instrument(skip(self, patch))]
    pub async fn patch_item(
        &self,
        id: i64,
        patch: PatchEnrichItem,
    ) -> EnrichResult<MutationResponse<EnrichItem>> {
        let current = self.get_item(id).await?;
        self.update_item(id, patch.apply_to(current.into())).await
    }

    /// Delete an item; `detach` removes it from every pipeline first
    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: i64, detach: bool) -> EnrichResult<EnrichItem> {
        let (item, pipelines) = self.repository.delete_item(id, detach).await?;

        self.events
            .publish(EntityEvent::deleted(ITEM_ENTITY, item.id, &item));
        for pipeline_id in pipelines {
            self.publish_membership(pipeline_id).await;
        }
        Ok(item)
    }

    /// Pipelines that do not contain `item_id`
    pub async fn unbound_pipelines(
        &self,
        item_id: i64,
        page: &PageRequest,
    ) -> EnrichResult<Connection<EnrichPipeline>> {
        self.get_item(item_id).await?;
        self.repository.unbound_pipelines(item_id, page).await
    }

    // Pipelines

    pub async fn list_pipelines(
        &self,
        page: &PageRequest,
    ) -> EnrichResult<Connection<EnrichPipeline>> {
        self.repository.list_pipelines(page).await
    }

    pub async fn get_pipeline(&self, id: i64) -> EnrichResult<EnrichPipeline> {
        self.repository
            .get_pipeline(id)
            .await?
            .ok_or(EnrichError::PipelineNotFound(id))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_pipeline(
        &self,
        input: EnrichPipelineInput,
    ) -> EnrichResult<MutationResponse<EnrichPipeline>> {
        let validators = pipeline_validators(&input.name, input.items.as_deref());
        if !validators.is_empty() {
            return Ok(MutationResponse::invalid(validators));
        }

        let fields = PipelineFields {
            name: input.name,
            description: input.description,
        };
        let pipeline = self
            .repository
            .create_pipeline(fields, member_weights(input.items))
            .await?;
        self.events
            .publish(EntityEvent::created(PIPELINE_ENTITY, pipeline.id, &pipeline));
        Ok(MutationResponse::ok(pipeline))
    }

    /// Full replace; a missing `items` list empties the pipeline
    #[instrument(skip(self, input))]
    pub async fn update_pipeline(
        &self,
        id: i64,
        input: EnrichPipelineInput,
    ) -> EnrichResult<MutationResponse<EnrichPipeline>> {
        let validators = pipeline_validators(&input.name, input.items.as_deref());
        if !validators.is_empty() {
            return Ok(MutationResponse::invalid(validators));
        }

        let fields = PipelineFields {
            name: input.name,
            description: input.description,
        };
        self.write_pipeline(id, fields, member_weights(input.items), false)
            .await
    }

    /// Only provided fields change; `items` are merged into the current set
    #[instrument(skip(self, patch))]
    pub async fn patch_pipeline(
        &self,
        id: i64,
        patch: PatchEnrichPipeline,
    ) -> EnrichResult<MutationResponse<EnrichPipeline>> {
        let current = self.get_pipeline(id).await?;
        let name = patch.name.unwrap_or(current.name);
        let validators = pipeline_validators(&name, patch.items.as_deref());
        if !validators.is_empty() {
            return Ok(MutationResponse::invalid(validators));
        }

        let fields = PipelineFields {
            name,
            description: patch.description.or(current.description),
        };
        self.write_pipeline(id, fields, member_weights(patch.items), true)
            .await
    }

    async fn write_pipeline(
        &self,
        id: i64,
        fields: PipelineFields,
        items: Vec<MemberWeight>,
        partial: bool,
    ) -> EnrichResult<MutationResponse<EnrichPipeline>> {
        let pipeline = self
            .repository
            .update_pipeline(id, fields, items, partial)
            .await?;
        self.events
            .publish(EntityEvent::updated(PIPELINE_ENTITY, pipeline.id, &pipeline));
        Ok(MutationResponse::ok(pipeline))
    }

    /// Delete a pipeline together with its memberships
    #[instrument(skip(self))]
    pub async fn delete_pipeline(&self, id: i64) -> EnrichResult<EnrichPipeline> {
        let pipeline = self.repository.delete_pipeline(id).await?;
        self.events
            .publish(EntityEvent::deleted(PIPELINE_ENTITY, pipeline.id, &pipeline));
        Ok(pipeline)
    }

    // Membership

    /// Bind an item at the tail (or head) of a pipeline
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        pipeline_id: i64,
        item_id: i64,
        tail: bool,
    ) -> EnrichResult<Vec<PipelineItem>> {
        let members = self
            .relation
            .add_member(pipeline_id, item_id, Placement::from_tail(tail))
            .await?;
        self.membership_changed(pipeline_id, members).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, pipeline_id: i64, item_id: i64) -> EnrichResult<Vec<PipelineItem>> {
        let members = self.relation.remove_member(pipeline_id, item_id).await?;
        self.membership_changed(pipeline_id, members).await
    }

    /// Reorder items; ids that are not bound are ignored
    #[instrument(skip(self, item_ids), fields(count = item_ids.len()))]
    pub async fn sort_items(
        &self,
        pipeline_id: i64,
        item_ids: Vec<i64>,
    ) -> EnrichResult<Vec<PipelineItem>> {
        let members = self.relation.reorder(pipeline_id, item_ids).await?;
        self.membership_changed(pipeline_id, members).await
    }

    /// Items bound to the pipeline in traversal order, or with `not_equal`
    /// the items that are not bound to it
    pub async fn pipeline_items(
        &self,
        pipeline_id: i64,
        page: &PageRequest,
        not_equal: bool,
    ) -> EnrichResult<Connection<PipelineItem>> {
        self.get_pipeline(pipeline_id).await?;
        if not_equal {
            return self.repository.unbound_items(pipeline_id, page).await;
        }

        let members = self.relation.members(pipeline_id).await?;
        Ok(paginate(self.with_items(members).await?, page)?)
    }

    pub async fn first_item(&self, pipeline_id: i64) -> EnrichResult<Option<PipelineItem>> {
        self.get_pipeline(pipeline_id).await?;
        let first = self.relation.first_member(pipeline_id).await?;
        Ok(self.with_items(first.into_iter().collect()).await?.pop())
    }

    /// Item following `item_id` in the pipeline
    pub async fn next_item(
        &self,
        pipeline_id: i64,
        item_id: i64,
    ) -> EnrichResult<Option<PipelineItem>> {
        self.get_pipeline(pipeline_id).await?;
        let next = self.relation.next_member(pipeline_id, item_id).await?;
        Ok(self.with_items(next.into_iter().collect()).await?.pop())
    }

    /// Join memberships with their items, keeping traversal order
    async fn with_items(&self, members: Vec<Membership>) -> EnrichResult<Vec<PipelineItem>> {
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let ids = members.iter().map(|m| m.member_id).collect();
        let mut items: HashMap<i64, EnrichItem> = self
            .repository
            .get_items(ids)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        Ok(members
            .into_iter()
            .filter_map(|m| {
                items.remove(&m.member_id).map(|item| PipelineItem {
                    item,
                    weight: Some(m.weight),
                })
            })
            .collect())
    }

    async fn membership_changed(
        &self,
        pipeline_id: i64,
        members: Vec<Membership>,
    ) -> EnrichResult<Vec<PipelineItem>> {
        self.publish_membership(pipeline_id).await;
        self.with_items(members).await
    }

    async fn publish_membership(&self, pipeline_id: i64) {
        match self.repository.get_pipeline(pipeline_id).await {
            Ok(Some(pipeline)) => {
                self.events
                    .publish(EntityEvent::updated(PIPELINE_ENTITY, pipeline_id, &pipeline));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(pipeline_id, "Skipping membership event: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EnrichItemType;
    use crate::repository::{InMemoryEnrichRepository, MockEnrichRepository};
    use entity_events::EventKind;
    use ordered_relation::MockOrderedRelation;

    fn http_item(name: &str) -> EnrichItemInput {
        EnrichItemInput {
            name: name.to_string(),
            item_type: EnrichItemType::HttpSync,
            service_name: Some("svc".to_string()),
            request_timeout: 5000,
            ..Default::default()
        }
    }

    fn service() -> (EnrichService<InMemoryEnrichRepository>, EventBus) {
        let repository = InMemoryEnrichRepository::new();
        let relation = Arc::new(repository.relation());
        let events = EventBus::new(64);
        (EnrichService::new(repository, relation, events.clone()), events)
    }

    async fn create_item(service: &EnrichService<InMemoryEnrichRepository>, name: &str) -> i64 {
        service
            .create_item(http_item(name))
            .await
            .unwrap()
            .entity
            .unwrap()
            .id
    }

    async fn create_pipeline(
        service: &EnrichService<InMemoryEnrichRepository>,
        items: Option<Vec<PipelineItemInput>>,
    ) -> i64 {
        let input = EnrichPipelineInput {
            name: "ingest".to_string(),
            description: None,
            items,
        };
        service
            .create_pipeline(input)
            .await
            .unwrap()
            .entity
            .unwrap()
            .id
    }

    fn ids(items: &[PipelineItem]) -> Vec<i64> {
        items.iter().map(|i| i.item.id).collect()
    }

    #[tokio::test]
    async fn test_invalid_item_is_not_written() {
        let (service, _) = service();
        let input = EnrichItemInput {
            service_name: None,
            ..http_item("geo")
        };

        let response = service.create_item(input).await.unwrap();

        assert!(response.entity.is_none());
        assert_eq!(response.field_validators[0].field, "service_name");
        let page = service.list_items(&PageRequest::default()).await.unwrap();
        assert_eq!(page.total_count, 0);
    }

    #[tokio::test]
    async fn test_patch_item_revalidates_merged_fields() {
        let (service, _) = service();
        let id = create_item(&service, "geo").await;

        let patch = PatchEnrichItem {
            item_type: Some(EnrichItemType::GroovyScript),
            ..Default::default()
        };
        let response = service.patch_item(id, patch).await.unwrap();
        assert!(!response.is_valid());

        let patch = PatchEnrichItem {
            request_timeout: Some(100),
            ..Default::default()
        };
        let response = service.patch_item(id, patch).await.unwrap();
        assert_eq!(response.entity.unwrap().request_timeout, 100);
    }

    #[tokio::test]
    async fn test_add_and_sort_items() {
        let (service, _) = service();
        let a = create_item(&service, "a").await;
        let b = create_item(&service, "b").await;
        let c = create_item(&service, "c").await;
        let pipeline = create_pipeline(
            &service,
            Some(vec![
                PipelineItemInput { enrich_item_id: a, weight: 0.0 },
                PipelineItemInput { enrich_item_id: b, weight: 1.0 },
            ]),
        )
        .await;

        let items = service.add_item(pipeline, c, true).await.unwrap();
        assert_eq!(ids(&items), vec![a, b, c]);
        assert_eq!(items[2].weight, Some(2.0));

        let items = service.sort_items(pipeline, vec![c, a]).await.unwrap();
        assert_eq!(ids(&items), vec![c, a, b]);
        let weights: Vec<_> = items.iter().map(|i| i.weight.unwrap()).collect();
        assert_eq!(weights, vec![0.0, 1.0, 1.0]);
    }

    #[tokio::test]
    async fn test_add_item_twice_conflicts() {
        let (service, _) = service();
        let a = create_item(&service, "a").await;
        let pipeline = create_pipeline(&service, None).await;

        service.add_item(pipeline, a, false).await.unwrap();
        let err = service.add_item(pipeline, a, false).await.unwrap_err();
        assert!(matches!(err, EnrichError::AlreadyBound { .. }));
    }

    #[tokio::test]
    async fn test_pipeline_items_bound_and_unbound() {
        let (service, _) = service();
        let a = create_item(&service, "alpha").await;
        let b = create_item(&service, "beta").await;
        let pipeline = create_pipeline(
            &service,
            Some(vec![PipelineItemInput { enrich_item_id: b, weight: 0.0 }]),
        )
        .await;

        let bound = service
            .pipeline_items(pipeline, &PageRequest::default(), false)
            .await
            .unwrap();
        assert_eq!(bound.nodes().map(|n| n.item.id).collect::<Vec<_>>(), vec![b]);

        let unbound = service
            .pipeline_items(pipeline, &PageRequest::default(), true)
            .await
            .unwrap();
        let node = unbound.nodes().next().unwrap();
        assert_eq!(node.item.id, a);
        assert_eq!(node.weight, None);

        let err = service
            .pipeline_items(99, &PageRequest::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::PipelineNotFound(99)));
    }

    #[tokio::test]
    async fn test_first_and_next_item() {
        let (service, _) = service();
        let a = create_item(&service, "a").await;
        let b = create_item(&service, "b").await;
        let pipeline = create_pipeline(&service, None).await;
        assert!(service.first_item(pipeline).await.unwrap().is_none());

        service.add_item(pipeline, a, true).await.unwrap();
        service.add_item(pipeline, b, false).await.unwrap();

        let first = service.first_item(pipeline).await.unwrap().unwrap();
        assert_eq!(first.item.id, b);
        let next = service.next_item(pipeline, b).await.unwrap().unwrap();
        assert_eq!(next.item.id, a);
        assert!(service.next_item(pipeline, a).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_patch_pipeline_without_items_keeps_membership() {
        let (service, _) = service();
        let a = create_item(&service, "a").await;
        let pipeline = create_pipeline(
            &service,
            Some(vec![PipelineItemInput { enrich_item_id: a, weight: 0.0 }]),
        )
        .await;

        let patch = PatchEnrichPipeline {
            description: Some("nightly".to_string()),
            ..Default::default()
        };
        let response = service.patch_pipeline(pipeline, patch).await.unwrap();
        assert_eq!(response.entity.unwrap().description.as_deref(), Some("nightly"));
        let page = service
            .pipeline_items(pipeline, &PageRequest::default(), false)
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);

        // a full update without items empties it
        let input = EnrichPipelineInput {
            name: "ingest".to_string(),
            ..Default::default()
        };
        service.update_pipeline(pipeline, input).await.unwrap();
        let page = service
            .pipeline_items(pipeline, &PageRequest::default(), false)
            .await
            .unwrap();
        assert_eq!(page.total_count, 0);
    }

    #[tokio::test]
    async fn test_delete_item_with_detach_notifies_pipelines() {
        let (service, events) = service();
        let a = create_item(&service, "a").await;
        let pipeline = create_pipeline(
            &service,
            Some(vec![PipelineItemInput { enrich_item_id: a, weight: 0.0 }]),
        )
        .await;
        let mut rx = events.subscribe();

        let err = service.delete_item(a, false).await.unwrap_err();
        assert!(matches!(err, EnrichError::ItemInUse { .. }));

        service.delete_item(a, true).await.unwrap();

        let deleted = rx.recv().await.unwrap();
        assert_eq!((deleted.entity.as_str(), deleted.kind), (ITEM_ENTITY, EventKind::Delete));
        let updated = rx.recv().await.unwrap();
        assert_eq!((updated.entity.as_str(), updated.id), (PIPELINE_ENTITY, pipeline));
        assert_eq!(updated.kind, EventKind::Update);
    }

    #[tokio::test]
    async fn test_unbound_pipelines() {
        let (service, _) = service();
        let a = create_item(&service, "a").await;
        let bound = create_pipeline(
            &service,
            Some(vec![PipelineItemInput { enrich_item_id: a, weight: 0.0 }]),
        )
        .await;
        let free = create_pipeline(&service, None).await;

        let page = service
            .unbound_pipelines(a, &PageRequest::default())
            .await
            .unwrap();
        let ids: Vec<i64> = page.nodes().map(|p| p.id).collect();
        assert_eq!(ids, vec![free]);
        assert!(!ids.contains(&bound));
    }

    #[tokio::test]
    async fn test_remove_item_not_bound_with_mocks() {
        let mut relation = MockOrderedRelation::new();
        relation
            .expect_remove_member()
            .with(mockall::predicate::eq(1), mockall::predicate::eq(2))
            .returning(|owner_id, member_id| {
                Err(ordered_relation::RelationError::NotFound { owner_id, member_id })
            });
        let repository = MockEnrichRepository::new();

        let service = EnrichService::new(repository, Arc::new(relation), EventBus::default());
        let err = service.remove_item(1, 2).await.unwrap_err();
        assert!(matches!(err, EnrichError::NotBound { pipeline_id: 1, item_id: 2 }));
    }

    #[tokio::test]
    async fn test_repository_failure_surfaces_as_internal() {
        let mut repository = MockEnrichRepository::new();
        repository
            .expect_list_pipelines()
            .returning(|_| Err(EnrichError::Internal("connection reset".to_string())));

        let service = EnrichService::new(
            repository,
            Arc::new(MockOrderedRelation::new()),
            EventBus::default(),
        );
        let err = service
            .list_pipelines(&PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::Internal(_)));
    }
}
