use axum_helpers::{FieldValidator, MutationResponse};
use database::pagination::{Connection, PageRequest, paginate};
use entity_events::{EntityEvent, EventBus};
use ordered_relation::{MemberWeight, Membership, OrderedRelation, Placement, RelationError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::error::{AnalyzerError, AnalyzerResult};
use crate::models::{
    ANALYZER_ENTITY, Analyzer, AnalyzerFilter, AnalyzerInput, Filter, FilterInput, FilterKind,
    FilterWeight, PatchAnalyzer, PatchFilter, validators_of,
};
use crate::repository::AnalyzerRepository;

/// Service layer for analyzers and their filter chains
#[derive(Clone)]
pub struct AnalyzerService<R: AnalyzerRepository> {
    repository: Arc<R>,
    token_filters: Arc<dyn OrderedRelation>,
    char_filters: Arc<dyn OrderedRelation>,
    events: EventBus,
}

impl<R: AnalyzerRepository> AnalyzerService<R> {
    pub fn new(
        repository: R,
        token_filters: Arc<dyn OrderedRelation>,
        char_filters: Arc<dyn OrderedRelation>,
        events: EventBus,
    ) -> Self {
        Self {
            repository: Arc::new(repository),
            token_filters,
            char_filters,
            events,
        }
    }

    fn relation(&self, kind: FilterKind) -> &dyn OrderedRelation {
        match kind {
            FilterKind::Token => self.token_filters.as_ref(),
            FilterKind::Char => self.char_filters.as_ref(),
        }
    }

    // Analyzers

    pub async fn list_analyzers(&self, page: &PageRequest) -> AnalyzerResult<Connection<Analyzer>> {
        self.repository.list_analyzers(page).await
    }

    pub async fn get_analyzer(&self, id: i64) -> AnalyzerResult<Analyzer> {
        self.repository
            .get_analyzer(id)
            .await?
            .ok_or(AnalyzerError::AnalyzerNotFound(id))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_analyzer(
        &self,
        input: AnalyzerInput,
    ) -> AnalyzerResult<MutationResponse<Analyzer>> {
        let validators = validators_of(&input);
        if !validators.is_empty() {
            return Ok(MutationResponse::invalid(validators));
        }

        let analyzer = self.repository.create_analyzer(input).await?;
        self.events
            .publish(EntityEvent::created(ANALYZER_ENTITY, analyzer.id, &analyzer));
        Ok(MutationResponse::ok(analyzer))
    }

    #[instrument(skip(self, input))]
    pub async fn update_analyzer(
        &self,
        id: i64,
        input: AnalyzerInput,
    ) -> AnalyzerResult<MutationResponse<Analyzer>> {
        let validators = validators_of(&input);
        if !validators.is_empty() {
            return Ok(MutationResponse::invalid(validators));
        }

        let analyzer = self.repository.update_analyzer(id, input).await?;
        self.events
            .publish(EntityEvent::updated(ANALYZER_ENTITY, analyzer.id, &analyzer));
        Ok(MutationResponse::ok(analyzer))
    }

    #[instrument(skip(self, patch))]
    pub async fn patch_analyzer(
        &self,
        id: i64,
        patch: PatchAnalyzer,
    ) -> AnalyzerResult<MutationResponse<Analyzer>> {
        let current = self.get_analyzer(id).await?;
        self.update_analyzer(id, patch.apply_to(current.into())).await
    }

    #[instrument(skip(self))]
    pub async fn delete_analyzer(&self, id: i64) -> AnalyzerResult<Analyzer> {
        let analyzer = self.repository.delete_analyzer(id).await?;
        self.events
            .publish(EntityEvent::deleted(ANALYZER_ENTITY, analyzer.id, &analyzer));
        Ok(analyzer)
    }

    // Filters

    pub async fn list_filters(
        &self,
        kind: FilterKind,
        page: &PageRequest,
    ) -> AnalyzerResult<Connection<Filter>> {
        self.repository.list_filters(kind, page).await
    }

    pub async fn get_filter(&self, kind: FilterKind, id: i64) -> AnalyzerResult<Filter> {
        self.repository
            .get_filter(kind, id)
            .await?
            .ok_or(AnalyzerError::FilterNotFound { kind, id })
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_filter(
        &self,
        kind: FilterKind,
        input: FilterInput,
    ) -> AnalyzerResult<MutationResponse<Filter>> {
        let validators = validators_of(&input);
        if !validators.is_empty() {
            return Ok(MutationResponse::invalid(validators));
        }

        let filter = self.repository.create_filter(kind, input).await?;
        self.events
            .publish(EntityEvent::created(kind.entity(), filter.id, &filter));
        Ok(MutationResponse::ok(filter))
    }

    #[instrument(skip(self, input))]
    pub async fn update_filter(
        &self,
        kind: FilterKind,
        id: i64,
        input: FilterInput,
    ) -> AnalyzerResult<MutationResponse<Filter>> {
        let validators = validators_of(&input);
        if !validators.is_empty() {
            return Ok(MutationResponse::invalid(validators));
        }

        let filter = self.repository.update_filter(kind, id, input).await?;
        self.events
            .publish(EntityEvent::updated(kind.entity(), filter.id, &filter));
        Ok(MutationResponse::ok(filter))
    }

    #[instrument(skip(self, patch))]
    pub async fn patch_filter(
        &self,
        kind: FilterKind,
        id: i64,
        patch: PatchFilter,
    ) -> AnalyzerResult<MutationResponse<Filter>> {
        let current = self.get_filter(kind, id).await?;
        self.update_filter(kind, id, patch.apply_to(current.into()))
            .await
    }

    /// Delete a filter; `detach` removes it from every analyzer first
    #[instrument(skip(self))]
    pub async fn delete_filter(
        &self,
        kind: FilterKind,
        id: i64,
        detach: bool,
    ) -> AnalyzerResult<Filter> {
        let (filter, analyzers) = self.repository.delete_filter(kind, id, detach).await?;

        self.events
            .publish(EntityEvent::deleted(kind.entity(), filter.id, &filter));
        for analyzer_id in analyzers {
            self.publish_membership(analyzer_id).await;
        }
        Ok(filter)
    }

    /// Analyzers whose `kind` set does not contain `filter_id`
    pub async fn unbound_analyzers(
        &self,
        kind: FilterKind,
        filter_id: i64,
        page: &PageRequest,
    ) -> AnalyzerResult<Connection<Analyzer>> {
        self.get_filter(kind, filter_id).await?;
        self.repository.unbound_analyzers(kind, filter_id, page).await
    }

    // Membership

    #[instrument(skip(self))]
    pub async fn add_filter(
        &self,
        kind: FilterKind,
        analyzer_id: i64,
        filter_id: i64,
        tail: bool,
    ) -> AnalyzerResult<Vec<AnalyzerFilter>> {
        let members = self
            .relation(kind)
            .add_member(analyzer_id, filter_id, Placement::from_tail(tail))
            .await
            .map_err(lift(kind))?;
        self.membership_changed(kind, analyzer_id, members).await
    }

    #[instrument(skip(self))]
    pub async fn remove_filter(
        &self,
        kind: FilterKind,
        analyzer_id: i64,
        filter_id: i64,
    ) -> AnalyzerResult<Vec<AnalyzerFilter>> {
        let members = self
            .relation(kind)
            .remove_member(analyzer_id, filter_id)
            .await
            .map_err(lift(kind))?;
        self.membership_changed(kind, analyzer_id, members).await
    }

    /// Reorder filters; ids that are not bound are ignored
    #[instrument(skip(self, filter_ids), fields(count = filter_ids.len()))]
    pub async fn sort_filters(
        &self,
        kind: FilterKind,
        analyzer_id: i64,
        filter_ids: Vec<i64>,
    ) -> AnalyzerResult<Vec<AnalyzerFilter>> {
        let members = self
            .relation(kind)
            .reorder(analyzer_id, filter_ids)
            .await
            .map_err(lift(kind))?;
        self.membership_changed(kind, analyzer_id, members).await
    }

    /// Replace the analyzer's `kind` set, or upsert into it when `partial`
    #[instrument(skip(self, filters), fields(count = filters.len()))]
    pub async fn replace_filters(
        &self,
        kind: FilterKind,
        analyzer_id: i64,
        filters: Vec<FilterWeight>,
        partial: bool,
    ) -> AnalyzerResult<MutationResponse<Vec<AnalyzerFilter>>> {
        let validators: Vec<FieldValidator> = filters
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.weight.is_finite())
            .map(|(index, _)| {
                FieldValidator::new(format!("filters[{index}].weight"), "must be a finite number")
            })
            .collect();
        if !validators.is_empty() {
            return Ok(MutationResponse::invalid(validators));
        }

        let pairs: Vec<MemberWeight> = filters.into_iter().map(MemberWeight::from).collect();
        let members = self
            .relation(kind)
            .replace_set(analyzer_id, pairs, partial)
            .await
            .map_err(lift(kind))?;
        Ok(MutationResponse::ok(
            self.membership_changed(kind, analyzer_id, members).await?,
        ))
    }

    /// Remove every filter of one kind from an analyzer
    #[instrument(skip(self))]
    pub async fn clear_filters(
        &self,
        kind: FilterKind,
        analyzer_id: i64,
    ) -> AnalyzerResult<Vec<AnalyzerFilter>> {
        let members = self
            .relation(kind)
            .clear(analyzer_id)
            .await
            .map_err(lift(kind))?;
        self.membership_changed(kind, analyzer_id, members).await
    }

    /// Filters bound to the analyzer in traversal order, or with
    /// `not_equal` the filters of that kind not bound to it
    pub async fn analyzer_filters(
        &self,
        kind: FilterKind,
        analyzer_id: i64,
        page: &PageRequest,
        not_equal: bool,
    ) -> AnalyzerResult<Connection<AnalyzerFilter>> {
        self.get_analyzer(analyzer_id).await?;
        if not_equal {
            return self.repository.unbound_filters(kind, analyzer_id, page).await;
        }

        let members = self
            .relation(kind)
            .members(analyzer_id)
            .await
            .map_err(lift(kind))?;
        let nodes = self.with_filters(kind, members).await?;
        Ok(paginate(nodes, page)?)
    }

    async fn with_filters(
        &self,
        kind: FilterKind,
        members: Vec<Membership>,
    ) -> AnalyzerResult<Vec<AnalyzerFilter>> {
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let ids = members.iter().map(|m| m.member_id).collect();
        let mut filters: HashMap<i64, Filter> = self
            .repository
            .get_filters(kind, ids)
            .await?
            .into_iter()
            .map(|filter| (filter.id, filter))
            .collect();

        Ok(members
            .into_iter()
            .filter_map(|m| {
                filters.remove(&m.member_id).map(|filter| AnalyzerFilter {
                    filter,
                    weight: Some(m.weight),
                })
            })
            .collect())
    }

    async fn membership_changed(
        &self,
        kind: FilterKind,
        analyzer_id: i64,
        members: Vec<Membership>,
    ) -> AnalyzerResult<Vec<AnalyzerFilter>> {
        self.publish_membership(analyzer_id).await;
        self.with_filters(kind, members).await
    }

    async fn publish_membership(&self, analyzer_id: i64) {
        match self.repository.get_analyzer(analyzer_id).await {
            Ok(Some(analyzer)) => {
                self.events
                    .publish(EntityEvent::updated(ANALYZER_ENTITY, analyzer_id, &analyzer));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(analyzer_id, "Skipping membership event: {}", e),
        }
    }
}

fn lift(kind: FilterKind) -> impl Fn(RelationError) -> AnalyzerError {
    move |err| AnalyzerError::from_relation(kind, err)
}
