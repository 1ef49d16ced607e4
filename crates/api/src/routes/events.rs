use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use site_admin_core::events::types::SiteEvent;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};

use crate::auth::AdminClaims;
use crate::state::AppState;

/// Server-sent stream of backup and restore notifications.
pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/events", get(event_stream))
}

async fn event_stream(
    _admin: AdminClaims,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let updates = BroadcastStream::new(state.event_bus().subscribe()).filter_map(|received| {
        match received {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                tracing::warn!("[SSE] Subscriber lagged by {n} events");
                None
            }
        }
    });

    let stream = tokio_stream::once(SiteEvent::Welcome)
        .chain(updates)
        .map(|event| Ok::<_, Infallible>(to_sse(&event)));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn to_sse(event: &SiteEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|e| {
        tracing::error!("Failed to encode event: {e}");
        Event::default().comment("unencodable event")
    })
}
