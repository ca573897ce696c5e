//! Enrich Domain
//!
//! Enrich items (HTTP calls or Groovy scripts applied to documents at
//! ingestion) and enrich pipelines, which hold an ordered, weighted set of
//! items.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← REST endpoints + OpenAPI
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐     ┌──────────────────┐
//! │   Service   │ ──▶ │ OrderedRelation  │  ← pipeline ↔ item weights
//! └──────┬──────┘     └──────────────────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← items + pipelines (trait + implementations)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Entities, DTOs, enums
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use domain_enrich::{handlers, EnrichService, InMemoryEnrichRepository};
//! use entity_events::EventBus;
//!
//! let repository = InMemoryEnrichRepository::new();
//! let relation = Arc::new(repository.relation());
//! let service = EnrichService::new(repository, relation, EventBus::default());
//!
//! let router = handlers::router(service);
//! ```

pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod service;

pub use error::{EnrichError, EnrichResult};
pub use handlers::ApiDoc;
pub use models::{
    EnrichItem, EnrichItemInput, EnrichItemType, EnrichPipeline, EnrichPipelineInput,
    PipelineItem,
};
pub use postgres::{PIPELINE_ITEM_TABLE, PgEnrichRepository};
pub use repository::{EnrichRepository, InMemoryEnrichRepository};
pub use service::EnrichService;
