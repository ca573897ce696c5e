use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EntityEvent {
    /// Entity type, e.g. `enrich_pipeline`
    pub entity: String,
    pub kind: EventKind,
    pub id: i64,
    /// The entity as it was after the change (before it, for deletes)
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl EntityEvent {
    pub fn new<T: Serialize>(entity: impl Into<String>, kind: EventKind, id: i64, payload: &T) -> Self {
        let entity = entity.into();
        let payload = serde_json::to_value(payload).unwrap_or_else(|e| {
            tracing::warn!(entity = %entity, id, "Event payload not serializable: {}", e);
            serde_json::Value::Null
        });

        Self {
            entity,
            kind,
            id,
            payload,
            occurred_at: Utc::now(),
        }
    }

    pub fn created<T: Serialize>(entity: impl Into<String>, id: i64, payload: &T) -> Self {
        Self::new(entity, EventKind::Create, id, payload)
    }

    pub fn updated<T: Serialize>(entity: impl Into<String>, id: i64, payload: &T) -> Self {
        Self::new(entity, EventKind::Update, id, payload)
    }

    pub fn deleted<T: Serialize>(entity: impl Into<String>, id: i64, payload: &T) -> Self {
        Self::new(entity, EventKind::Delete, id, payload)
    }
}
