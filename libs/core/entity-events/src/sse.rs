//! `GET /events`: server-sent entity events.

use axum::{
    Router,
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use utoipa::OpenApi;

use crate::bus::{EventBus, EventFilter};
use crate::event::{EntityEvent, EventKind};

pub const TAG: &str = "events";

#[derive(OpenApi)]
#[openapi(
    paths(subscribe_events),
    components(schemas(EntityEvent, EventKind)),
    tags((name = TAG, description = "Entity lifecycle event feed"))
)]
pub struct ApiDoc;

pub fn router(bus: EventBus) -> Router {
    Router::new()
        .route("/", get(subscribe_events))
        .with_state(bus)
}

/// Subscribe to entity events.
///
/// Each SSE message is named after the event kind and carries the
/// [`EntityEvent`] as JSON. Only events published after the subscription
/// are delivered.
#[utoipa::path(
    get,
    path = "",
    tag = TAG,
    params(EventFilter),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream", body = EntityEvent)
    )
)]
async fn subscribe_events(
    State(bus): State<EventBus>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!(?filter, subscribers = bus.subscriber_count() + 1, "Event subscriber connected");
    let mut events = Box::pin(bus.stream(filter));

    let stream = async_stream::stream! {
        while let Some(event) = events.next().await {
            match Event::default()
                .event(event.kind.to_string())
                .id(event.id.to_string())
                .json_data(&event)
            {
                Ok(sse_event) => yield Ok(sse_event),
                Err(e) => tracing::warn!(entity = %event.entity, id = event.id, "Failed to encode event: {}", e),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_streams_matching_events() {
        let bus = EventBus::new(16);
        let app = router(bus.clone());

        let response = app
            .oneshot(
                Request::get("/?entity=enrich_pipeline")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(EntityEvent::created("enrich_item", 1, &json!({})));
        bus.publish(EntityEvent::updated("enrich_pipeline", 9, &json!({"name": "p"})));

        let mut body = response.into_body();
        let frame = body.frame().await.unwrap().unwrap();
        let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
        assert!(text.contains("event: update"));
        assert!(text.contains("id: 9"));
        assert!(text.contains("\"entity\":\"enrich_pipeline\""));
    }

    #[tokio::test]
    async fn test_rejects_unknown_kind() {
        let app = router(EventBus::default());
        let response = app
            .oneshot(Request::get("/?kind=rename").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
