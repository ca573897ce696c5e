//! Shared state for the binary-level routes (readiness).
//!
//! Domain routers carry their own services; this only holds what the
//! readiness probe needs.

use entity_events::EventBus;

#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    pub db: database::postgres::DatabaseConnection,
    pub events: EventBus,
}
