//! Integration tests for the analyzers domain against PostgreSQL
//!
//! They need Docker and are ignored by default: `cargo test -- --ignored`.

use database::pagination::PageRequest;
use domain_analyzers::*;
use entity_events::EventBus;
use ordered_relation::{OrderedRelation, PgOrderedRelation, Placement};
use std::sync::Arc;
use test_utils::{TestDataBuilder, TestDatabase, assertions::*};

fn named(name: String) -> FilterInput {
    FilterInput {
        name,
        json_config: Some(r#"{"type":"lowercase"}"#.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_filters_live_in_their_own_tables() {
    let db = TestDatabase::new().await;
    let repo = PgAnalyzerRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("filter_tables");

    let token = repo
        .create_filter(FilterKind::Token, named(builder.name("token", "lowercase")))
        .await
        .unwrap();
    let fetched = assert_some(
        repo.get_filter(FilterKind::Token, token.id).await.unwrap(),
        "token filter should exist",
    );
    assert_eq!(fetched, token);
    let chars = repo
        .list_filters(FilterKind::Char, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(chars.total_count, 0);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_delete_analyzer_cascades_both_join_tables() {
    let db = TestDatabase::new().await;
    let repo = PgAnalyzerRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("analyzer_cascade");

    let analyzer = repo
        .create_analyzer(AnalyzerInput {
            name: builder.name("analyzer", "folding"),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(analyzer.analyzer_type, "custom");

    let mut filters = Vec::new();
    for kind in FilterKind::ALL {
        let filter = repo
            .create_filter(kind, named(builder.name(kind.entity(), "f")))
            .await
            .unwrap();
        let relation = PgOrderedRelation::new(db.connection(), postgres::relation_table(kind));
        relation
            .add_member(analyzer.id, filter.id, Placement::Tail)
            .await
            .unwrap();
        filters.push((kind, filter.id, relation));
    }

    let err = repo
        .delete_filter(FilterKind::Char, filters[1].1, false)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::FilterInUse { analyzers: 1, .. }));

    repo.delete_analyzer(analyzer.id).await.unwrap();

    for (kind, filter_id, relation) in filters {
        assert!(relation.members(analyzer.id).await.unwrap().is_empty());
        repo.delete_filter(kind, filter_id, false).await.unwrap();
    }
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_service_sort_and_replace_against_postgres() {
    let db = TestDatabase::new().await;
    let service = AnalyzerService::new(
        PgAnalyzerRepository::new(db.connection()),
        Arc::new(PgOrderedRelation::new(db.connection(), ANALYZER_TOKEN_FILTER_TABLE)),
        Arc::new(PgOrderedRelation::new(db.connection(), ANALYZER_CHAR_FILTER_TABLE)),
        EventBus::default(),
    );
    let builder = TestDataBuilder::from_test_name("service_sort_replace");

    let analyzer = service
        .create_analyzer(AnalyzerInput {
            name: builder.name("analyzer", "folding"),
            ..Default::default()
        })
        .await
        .unwrap()
        .entity
        .unwrap();
    let mut ids = Vec::new();
    for name in builder.names("token", 3) {
        let filter = service.create_filter(FilterKind::Token, named(name)).await.unwrap();
        ids.push(filter.entity.unwrap().id);
    }

    for &id in &ids {
        service
            .add_filter(FilterKind::Token, analyzer.id, id, true)
            .await
            .unwrap();
    }
    let sorted = service
        .sort_filters(FilterKind::Token, analyzer.id, vec![ids[2], ids[0]])
        .await
        .unwrap();
    let order: Vec<i64> = sorted.iter().map(|f| f.filter.id).collect();
    // ids[1] keeps 2.0, after the reindexed pair
    assert_id_order(&order, &[ids[2], ids[0], ids[1]], "after reorder");

    let replaced = service
        .replace_filters(
            FilterKind::Token,
            analyzer.id,
            vec![FilterWeight { filter_id: ids[1], weight: -1.0 }],
            false,
        )
        .await
        .unwrap()
        .entity
        .unwrap();
    let order: Vec<i64> = replaced.iter().map(|f| f.filter.id).collect();
    assert_id_order(&order, &[ids[1]], "after full replace");

    let cleared = service.clear_filters(FilterKind::Token, analyzer.id).await.unwrap();
    assert!(cleared.is_empty());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_unbound_filters_searched_and_paged_in_sql() {
    let db = TestDatabase::new().await;
    let repo = PgAnalyzerRepository::new(db.connection());
    let relation = PgOrderedRelation::new(db.connection(), ANALYZER_TOKEN_FILTER_TABLE);
    let builder = TestDataBuilder::from_test_name("unbound_filters_sql");

    let analyzer = repo
        .create_analyzer(AnalyzerInput {
            name: builder.name("analyzer", "folding"),
            ..Default::default()
        })
        .await
        .unwrap();
    let mut ids = Vec::new();
    for label in ["stem_a", "stem_b", "stop", "stem_c"] {
        let filter = repo
            .create_filter(FilterKind::Token, named(builder.name("token", label)))
            .await
            .unwrap();
        ids.push(filter.id);
    }
    relation.add_member(analyzer.id, ids[1], Placement::Tail).await.unwrap();

    let request = PageRequest::first(1).search("STEM");
    let page = repo
        .unbound_filters(FilterKind::Token, analyzer.id, &request)
        .await
        .unwrap();
    let page_ids: Vec<i64> = page.nodes().map(|node| node.filter.id).collect();
    assert_id_order(&page_ids, &[ids[0]], "first page");
    assert_eq!(page.total_count, 2);

    let cursor = assert_some(page.page_info.end_cursor.clone(), "end cursor");
    let rest = repo
        .unbound_filters(FilterKind::Token, analyzer.id, &request.clone().after(cursor))
        .await
        .unwrap();
    let rest_ids: Vec<i64> = rest.nodes().map(|node| node.filter.id).collect();
    assert_id_order(&rest_ids, &[ids[3]], "second page");
    assert!(!rest.page_info.has_next_page);

    let analyzers = repo
        .unbound_analyzers(FilterKind::Token, ids[1], &PageRequest::default())
        .await
        .unwrap();
    assert!(analyzers.nodes().all(|node| node.id != analyzer.id));
}
