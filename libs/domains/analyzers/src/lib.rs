//! Analyzers Domain
//!
//! Analyzers describe text analysis chains. Each analyzer owns two
//! independent ordered sets: token filters and char filters, both backed by
//! an [`ordered_relation::OrderedRelation`]. Operations on a set take the
//! [`FilterKind`] they act on.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use domain_analyzers::{handlers, AnalyzerService, FilterKind, InMemoryAnalyzerRepository};
//! use entity_events::EventBus;
//!
//! let repository = InMemoryAnalyzerRepository::new();
//! let token_filters = Arc::new(repository.relation(FilterKind::Token));
//! let char_filters = Arc::new(repository.relation(FilterKind::Char));
//! let service = AnalyzerService::new(repository, token_filters, char_filters, EventBus::default());
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

pub use error::{AnalyzerError, AnalyzerResult};
pub use handlers::ApiDoc;
pub use models::{Analyzer, AnalyzerFilter, AnalyzerInput, Filter, FilterInput, FilterKind, FilterWeight};
pub use postgres::{ANALYZER_CHAR_FILTER_TABLE, ANALYZER_TOKEN_FILTER_TABLE, PgAnalyzerRepository};
pub use repository::{AnalyzerRepository, InMemoryAnalyzerRepository};
pub use service::AnalyzerService;
