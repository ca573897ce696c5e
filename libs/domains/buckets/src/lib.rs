//! Buckets Domain
//!
//! Buckets group the data a search tab queries. Each bucket carries an
//! ordered, weighted list of suggestion categories, the facets shown as
//! search suggestions.
//!
//! Bucket ↔ category membership lives behind an
//! [`ordered_relation::OrderedRelation`]; deleting a bucket drops its
//! memberships, and a category still used by a bucket can only be deleted
//! with `detach`.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use domain_buckets::{handlers, BucketService, InMemoryBucketRepository};
//! use entity_events::EventBus;
//!
//! let repository = InMemoryBucketRepository::new();
//! let relation = Arc::new(repository.relation());
//! let router = handlers::router(BucketService::new(repository, relation, EventBus::default()));
//! ```

pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod service;

pub use error::{BucketError, BucketResult};
pub use handlers::ApiDoc;
pub use models::{
    Bucket, BucketCategory, BucketCategoryInput, BucketInput, RetrieveType, SuggestionCategory,
    SuggestionCategoryInput,
};
pub use postgres::{BUCKET_CATEGORY_TABLE, PgBucketRepository};
pub use repository::{BucketRepository, InMemoryBucketRepository};
pub use service::BucketService;
