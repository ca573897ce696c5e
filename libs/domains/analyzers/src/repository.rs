use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::pagination::{Connection, PageRequest, paginate};
use ordered_relation::{InMemoryOrderedRelation, OrderedRelation};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{AnalyzerError, AnalyzerResult};
use crate::models::{Analyzer, AnalyzerFilter, AnalyzerInput, Filter, FilterInput, FilterKind};

/// Repository trait for analyzers and their token / char filters.
///
/// Filter methods take the [`FilterKind`] they act on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalyzerRepository: Send + Sync {
    async fn create_analyzer(&self, input: AnalyzerInput) -> AnalyzerResult<Analyzer>;

    async fn get_analyzer(&self, id: i64) -> AnalyzerResult<Option<Analyzer>>;

    /// One page of analyzers, by id unless `page` sorts otherwise
    async fn list_analyzers(&self, page: &PageRequest) -> AnalyzerResult<Connection<Analyzer>>;

    /// One page of the analyzers whose `kind` set does not contain `filter_id`
    async fn unbound_analyzers(
        &self,
        kind: FilterKind,
        filter_id: i64,
        page: &PageRequest,
    ) -> AnalyzerResult<Connection<Analyzer>>;

    async fn update_analyzer(&self, id: i64, input: AnalyzerInput) -> AnalyzerResult<Analyzer>;

    /// Delete an analyzer together with both of its filter sets
    async fn delete_analyzer(&self, id: i64) -> AnalyzerResult<Analyzer>;

    async fn create_filter(&self, kind: FilterKind, input: FilterInput) -> AnalyzerResult<Filter>;

    async fn get_filter(&self, kind: FilterKind, id: i64) -> AnalyzerResult<Option<Filter>>;

    async fn list_filters(
        &self,
        kind: FilterKind,
        page: &PageRequest,
    ) -> AnalyzerResult<Connection<Filter>>;

    /// One page of the `kind` filters not bound to `analyzer_id`
    async fn unbound_filters(
        &self,
        kind: FilterKind,
        analyzer_id: i64,
        page: &PageRequest,
    ) -> AnalyzerResult<Connection<AnalyzerFilter>>;

    /// Filters with the given ids, by id ascending; unknown ids are skipped
    async fn get_filters(&self, kind: FilterKind, ids: Vec<i64>) -> AnalyzerResult<Vec<Filter>>;

    async fn update_filter(
        &self,
        kind: FilterKind,
        id: i64,
        input: FilterInput,
    ) -> AnalyzerResult<Filter>;

    /// Delete a filter, detaching it from its analyzers when `detach` is set.
    /// Returns the deleted filter and the analyzers it was removed from.
    async fn delete_filter(
        &self,
        kind: FilterKind,
        id: i64,
        detach: bool,
    ) -> AnalyzerResult<(Filter, Vec<i64>)>;
}

#[derive(Debug, Default)]
struct FilterTable {
    rows: BTreeMap<i64, Filter>,
    last_id: i64,
}

#[derive(Debug, Default)]
struct AnalyzerState {
    analyzers: BTreeMap<i64, Analyzer>,
    last_analyzer_id: i64,
    token_filters: FilterTable,
    char_filters: FilterTable,
}

impl AnalyzerState {
    fn filters(&self, kind: FilterKind) -> &FilterTable {
        match kind {
            FilterKind::Token => &self.token_filters,
            FilterKind::Char => &self.char_filters,
        }
    }

    fn filters_mut(&mut self, kind: FilterKind) -> &mut FilterTable {
        match kind {
            FilterKind::Token => &mut self.token_filters,
            FilterKind::Char => &mut self.char_filters,
        }
    }
}

/// In-memory implementation of AnalyzerRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryAnalyzerRepository {
    state: Arc<RwLock<AnalyzerState>>,
    token_filters: InMemoryOrderedRelation,
    char_filters: InMemoryOrderedRelation,
}

impl InMemoryAnalyzerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// The membership store for one filter kind
    pub fn relation(&self, kind: FilterKind) -> InMemoryOrderedRelation {
        match kind {
            FilterKind::Token => self.token_filters.clone(),
            FilterKind::Char => self.char_filters.clone(),
        }
    }

    fn relation_ref(&self, kind: FilterKind) -> &InMemoryOrderedRelation {
        match kind {
            FilterKind::Token => &self.token_filters,
            FilterKind::Char => &self.char_filters,
        }
    }
}

fn build_analyzer(id: i64, input: AnalyzerInput, created_at: DateTime<Utc>) -> Analyzer {
    Analyzer {
        id,
        name: input.name,
        description: input.description,
        analyzer_type: input.analyzer_type,
        json_config: input.json_config,
        created_at,
        updated_at: Utc::now(),
    }
}

fn build_filter(id: i64, input: FilterInput, created_at: DateTime<Utc>) -> Filter {
    Filter {
        id,
        name: input.name,
        description: input.description,
        json_config: input.json_config,
        created_at,
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl AnalyzerRepository for InMemoryAnalyzerRepository {
    async fn create_analyzer(&self, input: AnalyzerInput) -> AnalyzerResult<Analyzer> {
        let mut state = self.state.write().await;
        state.last_analyzer_id += 1;
        let analyzer = build_analyzer(state.last_analyzer_id, input, Utc::now());
        state.analyzers.insert(analyzer.id, analyzer.clone());
        for kind in FilterKind::ALL {
            self.relation_ref(kind).register_owner(analyzer.id).await;
        }

        tracing::info!(analyzer_id = analyzer.id, "Created analyzer");
        Ok(analyzer)
    }

    async fn get_analyzer(&self, id: i64) -> AnalyzerResult<Option<Analyzer>> {
        Ok(self.state.read().await.analyzers.get(&id).cloned())
    }

    async fn list_analyzers(&self, page: &PageRequest) -> AnalyzerResult<Connection<Analyzer>> {
        let analyzers = self.state.read().await.analyzers.values().cloned().collect();
        Ok(paginate(analyzers, page)?)
    }

    async fn unbound_analyzers(
        &self,
        kind: FilterKind,
        filter_id: i64,
        page: &PageRequest,
    ) -> AnalyzerResult<Connection<Analyzer>> {
        let bound: HashSet<i64> = self
            .relation_ref(kind)
            .owners_of(filter_id)
            .await
            .map_err(|e| AnalyzerError::from_relation(kind, e))?
            .into_iter()
            .collect();

        let analyzers = self
            .state
            .read()
            .await
            .analyzers
            .values()
            .filter(|analyzer| !bound.contains(&analyzer.id))
            .cloned()
            .collect();
        Ok(paginate(analyzers, page)?)
    }

    async fn update_analyzer(&self, id: i64, input: AnalyzerInput) -> AnalyzerResult<Analyzer> {
        let mut state = self.state.write().await;
        let existing = state
            .analyzers
            .get(&id)
            .ok_or(AnalyzerError::AnalyzerNotFound(id))?;
        let analyzer = build_analyzer(id, input, existing.created_at);
        state.analyzers.insert(id, analyzer.clone());

        tracing::info!(analyzer_id = id, "Updated analyzer");
        Ok(analyzer)
    }

    async fn delete_analyzer(&self, id: i64) -> AnalyzerResult<Analyzer> {
        let mut state = self.state.write().await;
        let analyzer = state
            .analyzers
            .remove(&id)
            .ok_or(AnalyzerError::AnalyzerNotFound(id))?;
        for kind in FilterKind::ALL {
            self.relation_ref(kind).unregister_owner(id).await;
        }

        tracing::info!(analyzer_id = id, "Deleted analyzer");
        Ok(analyzer)
    }

    async fn create_filter(&self, kind: FilterKind, input: FilterInput) -> AnalyzerResult<Filter> {
        let mut state = self.state.write().await;
        let table = state.filters_mut(kind);
        table.last_id += 1;
        let filter = build_filter(table.last_id, input, Utc::now());
        table.rows.insert(filter.id, filter.clone());
        self.relation_ref(kind).register_member(filter.id).await;

        tracing::info!(filter_id = filter.id, %kind, "Created filter");
        Ok(filter)
    }

    async fn get_filter(&self, kind: FilterKind, id: i64) -> AnalyzerResult<Option<Filter>> {
        Ok(self.state.read().await.filters(kind).rows.get(&id).cloned())
    }

    async fn list_filters(
        &self,
        kind: FilterKind,
        page: &PageRequest,
    ) -> AnalyzerResult<Connection<Filter>> {
        let filters = self
            .state
            .read()
            .await
            .filters(kind)
            .rows
            .values()
            .cloned()
            .collect();
        Ok(paginate(filters, page)?)
    }

    async fn unbound_filters(
        &self,
        kind: FilterKind,
        analyzer_id: i64,
        page: &PageRequest,
    ) -> AnalyzerResult<Connection<AnalyzerFilter>> {
        let bound: HashSet<i64> = self
            .relation_ref(kind)
            .members(analyzer_id)
            .await
            .map_err(|e| AnalyzerError::from_relation(kind, e))?
            .into_iter()
            .map(|m| m.member_id)
            .collect();

        let filters = self
            .state
            .read()
            .await
            .filters(kind)
            .rows
            .values()
            .filter(|filter| !bound.contains(&filter.id))
            .map(|filter| AnalyzerFilter {
                filter: filter.clone(),
                weight: None,
            })
            .collect();
        Ok(paginate(filters, page)?)
    }

    async fn get_filters(&self, kind: FilterKind, ids: Vec<i64>) -> AnalyzerResult<Vec<Filter>> {
        let state = self.state.read().await;
        let rows = &state.filters(kind).rows;
        let mut filters: Vec<Filter> = ids.iter().filter_map(|id| rows.get(id).cloned()).collect();
        filters.sort_by_key(|f| f.id);
        filters.dedup_by_key(|f| f.id);
        Ok(filters)
    }

    async fn update_filter(
        &self,
        kind: FilterKind,
        id: i64,
        input: FilterInput,
    ) -> AnalyzerResult<Filter> {
        let mut state = self.state.write().await;
        let table = state.filters_mut(kind);
        let existing = table
            .rows
            .get(&id)
            .ok_or(AnalyzerError::FilterNotFound { kind, id })?;
        let filter = build_filter(id, input, existing.created_at);
        table.rows.insert(id, filter.clone());

        tracing::info!(filter_id = id, %kind, "Updated filter");
        Ok(filter)
    }

    async fn delete_filter(
        &self,
        kind: FilterKind,
        id: i64,
        detach: bool,
    ) -> AnalyzerResult<(Filter, Vec<i64>)> {
        let mut state = self.state.write().await;
        if !state.filters(kind).rows.contains_key(&id) {
            return Err(AnalyzerError::FilterNotFound { kind, id });
        }

        let analyzers = self
            .relation_ref(kind)
            .unregister_member(id, detach)
            .await
            .map_err(|analyzers| AnalyzerError::FilterInUse {
                kind,
                filter_id: id,
                analyzers: analyzers.len(),
            })?;
        let filter = state
            .filters_mut(kind)
            .rows
            .remove(&id)
            .ok_or(AnalyzerError::FilterNotFound { kind, id })?;

        tracing::info!(filter_id = id, %kind, detached = analyzers.len(), "Deleted filter");
        Ok((filter, analyzers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordered_relation::Placement;

    fn filter_input(name: &str) -> FilterInput {
        FilterInput {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn analyzer_input(name: &str) -> AnalyzerInput {
        AnalyzerInput {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_filter_kinds_are_separate_tables() {
        let repo = InMemoryAnalyzerRepository::new();

        let token = repo
            .create_filter(FilterKind::Token, filter_input("lowercase"))
            .await
            .unwrap();
        let char_filter = repo
            .create_filter(FilterKind::Char, filter_input("html_strip"))
            .await
            .unwrap();

        assert_eq!(token.id, 1);
        assert_eq!(char_filter.id, 1);
        let tokens = repo
            .list_filters(FilterKind::Token, &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(tokens.nodes().cloned().collect::<Vec<_>>(), vec![token]);
        assert!(repo.get_filter(FilterKind::Char, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_analyzer_cascades_both_sets() {
        let repo = InMemoryAnalyzerRepository::new();
        let analyzer = repo.create_analyzer(analyzer_input("folding")).await.unwrap();
        for kind in FilterKind::ALL {
            let filter = repo.create_filter(kind, filter_input("f")).await.unwrap();
            repo.relation(kind)
                .add_member(analyzer.id, filter.id, Placement::Tail)
                .await
                .unwrap();
        }

        repo.delete_analyzer(analyzer.id).await.unwrap();

        for kind in FilterKind::ALL {
            assert!(repo.relation(kind).members(analyzer.id).await.unwrap().is_empty());
            repo.delete_filter(kind, 1, false).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_delete_filter_in_use() {
        let repo = InMemoryAnalyzerRepository::new();
        let analyzer = repo.create_analyzer(analyzer_input("folding")).await.unwrap();
        let filter = repo
            .create_filter(FilterKind::Token, filter_input("asciifolding"))
            .await
            .unwrap();
        repo.relation(FilterKind::Token)
            .add_member(analyzer.id, filter.id, Placement::Head)
            .await
            .unwrap();

        let err = repo
            .delete_filter(FilterKind::Token, filter.id, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::FilterInUse {
                kind: FilterKind::Token,
                analyzers: 1,
                ..
            }
        ));

        let (_, detached) = repo
            .delete_filter(FilterKind::Token, filter.id, true)
            .await
            .unwrap();
        assert_eq!(detached, vec![analyzer.id]);
    }

    #[tokio::test]
    async fn test_unbound_listings_follow_the_filter_kind() {
        let repo = InMemoryAnalyzerRepository::new();
        let folding = repo.create_analyzer(analyzer_input("folding")).await.unwrap();
        let plain = repo.create_analyzer(analyzer_input("plain")).await.unwrap();
        let lowercase = repo
            .create_filter(FilterKind::Token, filter_input("lowercase"))
            .await
            .unwrap();
        let stop = repo
            .create_filter(FilterKind::Token, filter_input("stop"))
            .await
            .unwrap();
        let html = repo
            .create_filter(FilterKind::Char, filter_input("html_strip"))
            .await
            .unwrap();
        repo.relation(FilterKind::Token)
            .add_member(folding.id, lowercase.id, Placement::Tail)
            .await
            .unwrap();

        let filters = repo
            .unbound_filters(FilterKind::Token, folding.id, &PageRequest::default())
            .await
            .unwrap();
        let ids: Vec<i64> = filters.nodes().map(|node| node.filter.id).collect();
        assert_eq!(ids, vec![stop.id]);
        assert!(filters.nodes().all(|node| node.weight.is_none()));

        // the char set of `folding` is still empty
        let filters = repo
            .unbound_filters(FilterKind::Char, folding.id, &PageRequest::default())
            .await
            .unwrap();
        let ids: Vec<i64> = filters.nodes().map(|node| node.filter.id).collect();
        assert_eq!(ids, vec![html.id]);

        let analyzers = repo
            .unbound_analyzers(FilterKind::Token, lowercase.id, &PageRequest::default())
            .await
            .unwrap();
        let ids: Vec<i64> = analyzers.nodes().map(|analyzer| analyzer.id).collect();
        assert_eq!(ids, vec![plain.id]);

        // the lowercase id means nothing to the char set
        let analyzers = repo
            .unbound_analyzers(FilterKind::Char, lowercase.id, &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(analyzers.total_count, 2);
    }
}
