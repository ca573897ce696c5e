//! Integration tests for the enrich domain
//!
//! These tests use real PostgreSQL via testcontainers to ensure:
//! - The sea-orm entities match the migrated schema (enum columns included)
//! - Pipeline creation and membership replacement share one transaction
//! - Owner deletion cascades and in-use items are protected
//!
//! They need Docker and are ignored by default: `cargo test -- --ignored`.

use database::pagination::PageRequest;
use domain_enrich::models::PipelineFields;
use domain_enrich::*;
use entity_events::EventBus;
use ordered_relation::{MemberWeight, OrderedRelation, PgOrderedRelation, Placement};
use std::sync::Arc;
use test_utils::{TestDataBuilder, TestDatabase, assertions::*};

fn http_item(name: String) -> EnrichItemInput {
    EnrichItemInput {
        name,
        item_type: EnrichItemType::HttpAsync,
        service_name: Some("geo-service".to_string()),
        request_timeout: 1500,
        ..Default::default()
    }
}

// ============================================================================
// Repository Tests
// ============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn test_create_and_get_item() {
    let db = TestDatabase::new().await;
    let repo = PgEnrichRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("create_and_get_item");

    let created = repo.create_item(http_item(builder.name("item", "geo"))).await.unwrap();
    assert_eq!(created.item_type, EnrichItemType::HttpAsync);
    assert_eq!(created.request_timeout, 1500);

    let fetched = assert_some(repo.get_item(created.id).await.unwrap(), "item should exist");
    assert_eq!(fetched, created);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_item_pages_are_cut_in_sql() {
    let db = TestDatabase::new().await;
    let repo = PgEnrichRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("item_pages_in_sql");

    let mut ids = Vec::new();
    for label in ["alpha", "beta", "gamma"] {
        ids.push(repo.create_item(http_item(builder.name("item", label))).await.unwrap().id);
    }

    let first = repo.list_items(&PageRequest::first(2)).await.unwrap();
    let first_ids: Vec<i64> = first.nodes().map(|item| item.id).collect();
    assert_id_order(&first_ids, &ids[..2], "first page");
    assert_eq!(first.total_count, 3);
    assert!(first.page_info.has_next_page);

    let cursor = assert_some(first.page_info.end_cursor.clone(), "end cursor");
    let second = repo.list_items(&PageRequest::first(2).after(cursor)).await.unwrap();
    let second_ids: Vec<i64> = second.nodes().map(|item| item.id).collect();
    assert_id_order(&second_ids, &ids[2..], "second page");
    assert!(second.page_info.has_previous_page);
    assert!(!second.page_info.has_next_page);

    let by_name = repo
        .list_items(&PageRequest::default().sorted_by("name:desc").search("A"))
        .await
        .unwrap();
    let by_name_ids: Vec<i64> = by_name.nodes().map(|item| item.id).collect();
    assert_id_order(&by_name_ids, &[ids[2], ids[1], ids[0]], "name desc");

    let pipeline = repo
        .create_pipeline(
            PipelineFields {
                name: builder.name("pipeline", "p"),
                description: None,
            },
            vec![MemberWeight::new(ids[1], 0.0)],
        )
        .await
        .unwrap();
    let unbound = repo.unbound_items(pipeline.id, &PageRequest::default()).await.unwrap();
    let unbound_ids: Vec<i64> = unbound.nodes().map(|node| node.item.id).collect();
    assert_id_order(&unbound_ids, &[ids[0], ids[2]], "unbound items");

    let pipelines = repo.unbound_pipelines(ids[1], &PageRequest::default()).await.unwrap();
    assert_eq!(pipelines.total_count, 0);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_create_pipeline_with_items_is_atomic() {
    let db = TestDatabase::new().await;
    let repo = PgEnrichRepository::new(db.connection());
    let relation = PgOrderedRelation::new(db.connection(), PIPELINE_ITEM_TABLE);
    let builder = TestDataBuilder::from_test_name("create_pipeline_atomic");

    let item = repo.create_item(http_item(builder.name("item", "a"))).await.unwrap();

    let err = repo
        .create_pipeline(
            PipelineFields {
                name: builder.name("pipeline", "broken"),
                description: None,
            },
            vec![MemberWeight::new(item.id, 0.0), MemberWeight::new(item.id + 1000, 1.0)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EnrichError::ItemNotFound(_)));
    let pipelines = repo.list_pipelines(&PageRequest::default()).await.unwrap();
    assert_eq!(pipelines.total_count, 0);

    let pipeline = repo
        .create_pipeline(
            PipelineFields {
                name: builder.name("pipeline", "ok"),
                description: Some("ingest".to_string()),
            },
            vec![MemberWeight::new(item.id, 4.0)],
        )
        .await
        .unwrap();
    let members = relation.members(pipeline.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].weight, 4.0);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_delete_item_in_use_and_detach() {
    let db = TestDatabase::new().await;
    let repo = PgEnrichRepository::new(db.connection());
    let relation = PgOrderedRelation::new(db.connection(), PIPELINE_ITEM_TABLE);
    let builder = TestDataBuilder::from_test_name("delete_item_in_use");

    let item = repo.create_item(http_item(builder.name("item", "a"))).await.unwrap();
    let pipeline = repo
        .create_pipeline(
            PipelineFields {
                name: builder.name("pipeline", "p"),
                description: None,
            },
            vec![],
        )
        .await
        .unwrap();
    relation
        .add_member(pipeline.id, item.id, Placement::Tail)
        .await
        .unwrap();

    let err = repo.delete_item(item.id, false).await.unwrap_err();
    assert!(matches!(err, EnrichError::ItemInUse { pipelines: 1, .. }));

    let (_, detached) = repo.delete_item(item.id, true).await.unwrap();
    assert_id_order(&detached, &[pipeline.id], "detached pipelines");
    assert!(repo.get_item(item.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_delete_pipeline_cascades() {
    let db = TestDatabase::new().await;
    let repo = PgEnrichRepository::new(db.connection());
    let relation = PgOrderedRelation::new(db.connection(), PIPELINE_ITEM_TABLE);
    let builder = TestDataBuilder::from_test_name("delete_pipeline_cascades");

    let item = repo.create_item(http_item(builder.name("item", "a"))).await.unwrap();
    let pipeline = repo
        .create_pipeline(
            PipelineFields {
                name: builder.name("pipeline", "p"),
                description: None,
            },
            vec![MemberWeight::new(item.id, 0.0)],
        )
        .await
        .unwrap();

    repo.delete_pipeline(pipeline.id).await.unwrap();

    assert!(relation.members(pipeline.id).await.unwrap().is_empty());
    assert!(relation.owners_of(item.id).await.unwrap().is_empty());
    // no longer in use
    repo.delete_item(item.id, false).await.unwrap();
}

// ============================================================================
// Service Tests
// ============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn test_service_scenario_against_postgres() {
    let db = TestDatabase::new().await;
    let relation = Arc::new(PgOrderedRelation::new(db.connection(), PIPELINE_ITEM_TABLE));
    let service = EnrichService::new(
        PgEnrichRepository::new(db.connection()),
        relation,
        EventBus::default(),
    );
    let builder = TestDataBuilder::from_test_name("service_scenario");

    let mut ids = Vec::new();
    for name in builder.names("item", 3) {
        let response = service.create_item(http_item(name)).await.unwrap();
        ids.push(response.entity.unwrap().id);
    }
    let (a, b, c) = (ids[0], ids[1], ids[2]);

    let pipeline = service
        .create_pipeline(EnrichPipelineInput {
            name: builder.name("pipeline", "p"),
            description: None,
            items: Some(vec![
                models::PipelineItemInput { enrich_item_id: a, weight: 0.0 },
                models::PipelineItemInput { enrich_item_id: b, weight: 1.0 },
            ]),
        })
        .await
        .unwrap()
        .entity
        .unwrap();

    let items = service.add_item(pipeline.id, c, true).await.unwrap();
    let order: Vec<i64> = items.iter().map(|i| i.item.id).collect();
    assert_id_order(&order, &[a, b, c], "after tail insert");

    let items = service.sort_items(pipeline.id, vec![c, a]).await.unwrap();
    let order: Vec<i64> = items.iter().map(|i| i.item.id).collect();
    assert_id_order(&order, &[c, a, b], "after reorder");
}
