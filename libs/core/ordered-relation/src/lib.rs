//! Ordered Relations
//!
//! Weighted many-to-many associations between an *owner* (an enrich pipeline,
//! a bucket, an analyzer) and its *members* (enrich items, suggestion
//! categories, token and char filters).
//!
//! Every membership carries a floating-point weight. Traversal order is
//! ascending weight, with equal weights ordered by ascending member id.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │  OrderedRelation   │  ← async trait used by domain services
//! └─────────┬──────────┘
//!           │
//!   ┌───────┴────────┐
//!   │                │
//! ┌─▼────────┐  ┌────▼──────┐
//! │ InMemory │  │ Postgres  │  ← one transaction per call, owner row locked
//! └─┬────────┘  └────┬──────┘
//!   │                │
//! ┌─▼────────────────▼─┐
//! │      weights       │  ← pure planning: next weight, reorder, replace
//! └────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use ordered_relation::{InMemoryOrderedRelation, OrderedRelation, Placement};
//!
//! # async fn demo() -> ordered_relation::RelationResult<()> {
//! let relation = InMemoryOrderedRelation::new();
//! relation.register_owner(1).await;
//! relation.register_member(10).await;
//!
//! let members = relation.add_member(1, 10, Placement::Tail).await?;
//! assert_eq!(members[0].weight, 1.0);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod manager;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod weights;

pub use error::{RelationError, RelationResult};
pub use manager::OrderedRelation;
#[cfg(any(test, feature = "mock"))]
pub use manager::MockOrderedRelation;
pub use memory::InMemoryOrderedRelation;
pub use model::{MemberWeight, Membership, Placement};
pub use postgres::{PgOrderedRelation, RelationTable};
