//! Server-Sent Events broadcaster
//!
//! Streams application events (curriculum reloads, seeds, session and
//! flashcard changes) to connected clients. Each client holds its own
//! broadcast receiver; dropping the connection drops the subscription.

use crate::api::server::AppContext;
use crate::state::AppEvent;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// GET /events
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    let rx = ctx.state.subscribe_events();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => {
                    let event_type = event_type_str(&event);
                    debug!("Broadcasting SSE event: {}", event_type);
                    Some(Ok(Event::default().event(event_type).data(json)))
                }
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                // Lagged or closed; the client just misses those events
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn event_type_str(event: &AppEvent) -> &'static str {
    match event {
        AppEvent::CurriculumReloaded { .. } => "CurriculumReloaded",
        AppEvent::CurriculumSeeded { .. } => "CurriculumSeeded",
        AppEvent::SessionChanged { .. } => "SessionChanged",
        AppEvent::FlashcardsChanged { .. } => "FlashcardsChanged",
        AppEvent::ThemeChanged { .. } => "ThemeChanged",
    }
}
