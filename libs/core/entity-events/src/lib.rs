//! Entity lifecycle events.
//!
//! Services publish an [`EntityEvent`] after every successful create, update
//! or delete. Membership changes are published as an `update` of the owner.
//!
//! ```text
//!  service ──publish──▶ EventBus (tokio broadcast) ──▶ subscriber streams
//!                                                    └─▶ GET /events (SSE)
//! ```
//!
//! Delivery is at-most-once with no replay: a subscriber only sees events
//! published after it subscribed, and a subscriber that falls more than
//! `capacity` events behind skips the missed ones.

mod bus;
mod event;
pub mod sse;

pub use bus::{DEFAULT_CAPACITY, EventBus, EventFilter};
pub use event::{EntityEvent, EventKind};
pub use sse::{ApiDoc, router};
