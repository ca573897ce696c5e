use axum_helpers::{FieldValidator, MutationResponse};
use database::pagination::{Connection, PageRequest, paginate};
use entity_events::{EntityEvent, EventBus};
use ordered_relation::{MemberWeight, Membership, OrderedRelation, Placement};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::error::{BucketError, BucketResult};
use crate::models::{
    BUCKET_ENTITY, Bucket, BucketCategory, BucketCategoryInput, BucketInput, CATEGORY_ENTITY,
    PatchBucket, PatchSuggestionCategory, SuggestionCategory, SuggestionCategoryInput,
    validators_of,
};
use crate::repository::BucketRepository;

/// Service layer for buckets and suggestion categories
#[derive(Clone)]
pub struct BucketService<R: BucketRepository> {
    repository: Arc<R>,
    relation: Arc<dyn OrderedRelation>,
    events: EventBus,
}

impl<R: BucketRepository> BucketService<R> {
    pub fn new(repository: R, relation: Arc<dyn OrderedRelation>, events: EventBus) -> Self {
        Self {
            repository: Arc::new(repository),
            relation,
            events,
        }
    }

    // Buckets

    pub async fn list_buckets(&self, page: &PageRequest) -> BucketResult<Connection<Bucket>> {
        self.repository.list_buckets(page).await
    }

    pub async fn get_bucket(&self, id: i64) -> BucketResult<Bucket> {
        self.repository
            .get_bucket(id)
            .await?
            .ok_or(BucketError::BucketNotFound(id))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_bucket(&self, input: BucketInput) -> BucketResult<MutationResponse<Bucket>> {
        let validators = validators_of(&input);
        if !validators.is_empty() {
            return Ok(MutationResponse::invalid(validators));
        }

        let bucket = self.repository.create_bucket(input).await?;
        self.events
            .publish(EntityEvent::created(BUCKET_ENTITY, bucket.id, &bucket));
        Ok(MutationResponse::ok(bucket))
    }

    #[instrument(skip(self, input))]
    pub async fn update_bucket(
        &self,
        id: i64,
        input: BucketInput,
    ) -> BucketResult<MutationResponse<Bucket>> {
        let validators = validators_of(&input);
        if !validators.is_empty() {
            return Ok(MutationResponse::invalid(validators));
        }

        let bucket = self.repository.update_bucket(id, input).await?;
        self.events
            .publish(EntityEvent::updated(BUCKET_ENTITY, bucket.id, &bucket));
        Ok(MutationResponse::ok(bucket))
    }

    #[instrument(skip(self, patch))]
    pub async fn patch_bucket(
        &self,
        id: i64,
        patch: PatchBucket,
    ) -> BucketResult<MutationResponse<Bucket>> {
        let current = self.get_bucket(id).await?;
        self.update_bucket(id, patch.apply_to(current.into())).await
    }

    /// Delete a bucket together with its category memberships
    #[instrument(skip(self))]
    pub async fn delete_bucket(&self, id: i64) -> BucketResult<Bucket> {
        let bucket = self.repository.delete_bucket(id).await?;
        self.events
            .publish(EntityEvent::deleted(BUCKET_ENTITY, bucket.id, &bucket));
        Ok(bucket)
    }

    // Suggestion categories

    pub async fn list_categories(
        &self,
        page: &PageRequest,
    ) -> BucketResult<Connection<SuggestionCategory>> {
        self.repository.list_categories(page).await
    }

    pub async fn get_category(&self, id: i64) -> BucketResult<SuggestionCategory> {
        self.repository
            .get_category(id)
            .await?
            .ok_or(BucketError::CategoryNotFound(id))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(
        &self,
        input: SuggestionCategoryInput,
    ) -> BucketResult<MutationResponse<SuggestionCategory>> {
        let validators = validators_of(&input);
        if !validators.is_empty() {
            return Ok(MutationResponse::invalid(validators));
        }

        let category = self.repository.create_category(input).await?;
        self.events
            .publish(EntityEvent::created(CATEGORY_ENTITY, category.id, &category));
        Ok(MutationResponse::ok(category))
    }

    #[instrument(skip(self, input))]
    pub async fn update_category(
        &self,
        id: i64,
        input: SuggestionCategoryInput,
    ) -> BucketResult<MutationResponse<SuggestionCategory>> {
        let validators = validators_of(&input);
        if !validators.is_empty() {
            return Ok(MutationResponse::invalid(validators));
        }

        let category = self.repository.update_category(id, input).await?;
        self.events
            .publish(EntityEvent::updated(CATEGORY_ENTITY, category.id, &category));
        Ok(MutationResponse::ok(category))
    }

    #[instrument(skip(self, patch))]
    pub async fn patch_category(
        &self,
        id: i64,
        patch: PatchSuggestionCategory,
    ) -> BucketResult<MutationResponse<SuggestionCategory>> {
        let current = self.get_category(id).await?;
        self.update_category(id, patch.apply_to(current.into()))
            .await
    }

    /// Delete a category; `detach` removes it from every bucket first
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: i64, detach: bool) -> BucketResult<SuggestionCategory> {
        let (category, buckets) = self.repository.delete_category(id, detach).await?;

        self.events
            .publish(EntityEvent::deleted(CATEGORY_ENTITY, category.id, &category));
        for bucket_id in buckets {
            self.publish_membership(bucket_id).await;
        }
        Ok(category)
    }

    /// Buckets that do not contain `category_id`
    pub async fn unbound_buckets(
        &self,
        category_id: i64,
        page: &PageRequest,
    ) -> BucketResult<Connection<Bucket>> {
        self.get_category(category_id).await?;
        self.repository.unbound_buckets(category_id, page).await
    }

    // Membership

    #[instrument(skip(self))]
    pub async fn add_suggestion_category(
        &self,
        bucket_id: i64,
        category_id: i64,
        tail: bool,
    ) -> BucketResult<Vec<BucketCategory>> {
        let members = self
            .relation
            .add_member(bucket_id, category_id, Placement::from_tail(tail))
            .await?;
        self.membership_changed(bucket_id, members).await
    }

    #[instrument(skip(self))]
    pub async fn remove_suggestion_category(
        &self,
        bucket_id: i64,
        category_id: i64,
    ) -> BucketResult<Vec<BucketCategory>> {
        let members = self.relation.remove_member(bucket_id, category_id).await?;
        self.membership_changed(bucket_id, members).await
    }

    /// Reorder categories; ids that are not bound are ignored
    #[instrument(skip(self, category_ids), fields(count = category_ids.len()))]
    pub async fn sort_suggestion_categories(
        &self,
        bucket_id: i64,
        category_ids: Vec<i64>,
    ) -> BucketResult<Vec<BucketCategory>> {
        let members = self.relation.reorder(bucket_id, category_ids).await?;
        self.membership_changed(bucket_id, members).await
    }

    /// Replace the bucket's categories, or upsert them when `partial`.
    ///
    /// Non-finite weights come back as field validators.
    #[instrument(skip(self, categories), fields(count = categories.len()))]
    pub async fn replace_suggestion_categories(
        &self,
        bucket_id: i64,
        categories: Vec<BucketCategoryInput>,
        partial: bool,
    ) -> BucketResult<MutationResponse<Vec<BucketCategory>>> {
        let validators: Vec<FieldValidator> = categories
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.weight.is_finite())
            .map(|(index, _)| {
                FieldValidator::new(
                    format!("suggestion_categories[{index}].weight"),
                    "must be a finite number",
                )
            })
            .collect();
        if !validators.is_empty() {
            return Ok(MutationResponse::invalid(validators));
        }

        let pairs = categories.into_iter().map(MemberWeight::from).collect();
        let members = self.relation.replace_set(bucket_id, pairs, partial).await?;
        Ok(MutationResponse::ok(
            self.membership_changed(bucket_id, members).await?,
        ))
    }

    /// Categories bound to the bucket in traversal order, or with
    /// `not_equal` the categories that are not bound to it
    pub async fn bucket_suggestion_categories(
        &self,
        bucket_id: i64,
        page: &PageRequest,
        not_equal: bool,
    ) -> BucketResult<Connection<BucketCategory>> {
        self.get_bucket(bucket_id).await?;
        if not_equal {
            return self.repository.unbound_categories(bucket_id, page).await;
        }

        let members = self.relation.members(bucket_id).await?;
        Ok(paginate(self.with_categories(members).await?, page)?)
    }

    async fn with_categories(&self, members: Vec<Membership>) -> BucketResult<Vec<BucketCategory>> {
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let ids = members.iter().map(|m| m.member_id).collect();
        let mut categories: HashMap<i64, SuggestionCategory> = self
            .repository
            .get_categories(ids)
            .await?
            .into_iter()
            .map(|category| (category.id, category))
            .collect();

        Ok(members
            .into_iter()
            .filter_map(|m| {
                categories
                    .remove(&m.member_id)
                    .map(|category| BucketCategory {
                        category,
                        weight: Some(m.weight),
                    })
            })
            .collect())
    }

    async fn membership_changed(
        &self,
        bucket_id: i64,
        members: Vec<Membership>,
    ) -> BucketResult<Vec<BucketCategory>> {
        self.publish_membership(bucket_id).await;
        self.with_categories(members).await
    }

    async fn publish_membership(&self, bucket_id: i64) {
        match self.repository.get_bucket(bucket_id).await {
            Ok(Some(bucket)) => {
                self.events
                    .publish(EntityEvent::updated(BUCKET_ENTITY, bucket_id, &bucket));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(bucket_id, "Skipping membership event: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryBucketRepository, MockBucketRepository};
    use entity_events::EventKind;
    use ordered_relation::MockOrderedRelation;

    fn service() -> (BucketService<InMemoryBucketRepository>, EventBus) {
        let repository = InMemoryBucketRepository::new();
        let relation = Arc::new(repository.relation());
        let events = EventBus::new(64);
        (BucketService::new(repository, relation, events.clone()), events)
    }

    async fn bucket(service: &BucketService<InMemoryBucketRepository>) -> i64 {
        let input = BucketInput {
            name: "docs".to_string(),
            ..Default::default()
        };
        service.create_bucket(input).await.unwrap().entity.unwrap().id
    }

    async fn category(service: &BucketService<InMemoryBucketRepository>, name: &str) -> i64 {
        let input = SuggestionCategoryInput {
            name: name.to_string(),
            priority: 1.0,
            ..Default::default()
        };
        service.create_category(input).await.unwrap().entity.unwrap().id
    }

    fn ids(categories: &[BucketCategory]) -> Vec<i64> {
        categories.iter().map(|c| c.category.id).collect()
    }

    #[tokio::test]
    async fn test_add_at_head_reverses_insertion_order() {
        let (service, _) = service();
        let bucket = bucket(&service).await;
        let a = category(&service, "a").await;
        let b = category(&service, "b").await;
        let c = category(&service, "c").await;

        for id in [a, b, c] {
            service.add_suggestion_category(bucket, id, false).await.unwrap();
        }

        let page = service
            .bucket_suggestion_categories(bucket, &PageRequest::default(), false)
            .await
            .unwrap();
        let order: Vec<i64> = page.nodes().map(|n| n.category.id).collect();
        assert_eq!(order, vec![c, b, a]);
    }

    #[tokio::test]
    async fn test_replace_full_and_partial() {
        let (service, _) = service();
        let bucket = bucket(&service).await;
        let a = category(&service, "a").await;
        let b = category(&service, "b").await;
        service.add_suggestion_category(bucket, a, true).await.unwrap();

        // partial with nothing listed is a no-op
        let response = service
            .replace_suggestion_categories(bucket, vec![], true)
            .await
            .unwrap();
        assert_eq!(ids(&response.entity.unwrap()), vec![a]);

        let response = service
            .replace_suggestion_categories(
                bucket,
                vec![BucketCategoryInput {
                    suggestion_category_id: b,
                    weight: 0.5,
                }],
                true,
            )
            .await
            .unwrap();
        assert_eq!(ids(&response.entity.unwrap()), vec![b, a]);

        let response = service
            .replace_suggestion_categories(bucket, vec![], false)
            .await
            .unwrap();
        assert!(response.entity.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_rejects_non_finite_weight() {
        let (service, _) = service();
        let bucket = bucket(&service).await;
        let a = category(&service, "a").await;

        let response = service
            .replace_suggestion_categories(
                bucket,
                vec![BucketCategoryInput {
                    suggestion_category_id: a,
                    weight: f64::NAN,
                }],
                false,
            )
            .await
            .unwrap();
        assert_eq!(
            response.field_validators[0].field,
            "suggestion_categories[0].weight"
        );
    }

    #[tokio::test]
    async fn test_replace_with_unknown_category_changes_nothing() {
        let (service, _) = service();
        let bucket = bucket(&service).await;
        let a = category(&service, "a").await;
        service.add_suggestion_category(bucket, a, true).await.unwrap();

        let err = service
            .replace_suggestion_categories(
                bucket,
                vec![BucketCategoryInput {
                    suggestion_category_id: 404,
                    weight: 0.0,
                }],
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BucketError::CategoryNotFound(404)));

        let page = service
            .bucket_suggestion_categories(bucket, &PageRequest::default(), false)
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);
    }

    #[tokio::test]
    async fn test_membership_change_publishes_bucket_update() {
        let (service, events) = service();
        let bucket = bucket(&service).await;
        let a = category(&service, "a").await;
        let mut rx = events.subscribe();

        service.add_suggestion_category(bucket, a, true).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.entity, BUCKET_ENTITY);
        assert_eq!(event.kind, EventKind::Update);
        assert_eq!(event.id, bucket);
    }

    #[tokio::test]
    async fn test_unbound_buckets_and_not_equal() {
        let (service, _) = service();
        let bound = bucket(&service).await;
        let free = bucket(&service).await;
        let a = category(&service, "a").await;
        let b = category(&service, "b").await;
        service.add_suggestion_category(bound, a, true).await.unwrap();

        let page = service
            .unbound_buckets(a, &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.nodes().map(|b| b.id).collect::<Vec<_>>(), vec![free]);

        let page = service
            .bucket_suggestion_categories(bound, &PageRequest::default(), true)
            .await
            .unwrap();
        assert_eq!(page.nodes().map(|n| n.category.id).collect::<Vec<_>>(), vec![b]);
    }

    #[tokio::test]
    async fn test_invalid_category_is_not_written() {
        let mut repository = MockBucketRepository::new();
        repository.expect_create_category().never();

        let service = BucketService::new(
            repository,
            Arc::new(MockOrderedRelation::new()),
            EventBus::default(),
        );
        let response = service
            .create_category(SuggestionCategoryInput {
                name: String::new(),
                priority: -2.0,
                ..Default::default()
            })
            .await
            .unwrap();

        let fields: Vec<_> = response.field_validators.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "priority"]);
    }

    #[tokio::test]
    async fn test_sort_on_missing_bucket() {
        let mut relation = MockOrderedRelation::new();
        relation
            .expect_reorder()
            .returning(|owner_id, _| Err(ordered_relation::RelationError::OwnerNotFound(owner_id)));

        let service = BucketService::new(
            MockBucketRepository::new(),
            Arc::new(relation),
            EventBus::default(),
        );
        let err = service
            .sort_suggestion_categories(7, vec![1, 2])
            .await
            .unwrap_err();
        assert!(matches!(err, BucketError::BucketNotFound(7)));
    }
}
