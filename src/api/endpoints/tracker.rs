//! `GET /api/tracker/stream`: server-sent enquiry status changes.
//!
//! Each connection sees only events for enquiries inside the caller's
//! access scope, fixed at connect time.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Extension;
use futures_util::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;

use crate::api::types::ApiContext;
use crate::workflow::access::scope_for;
use crate::workflow::Actor;

pub async fn stream(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let scope = scope_for(&actor);
    let rx = ctx.core.events.subscribe();
    tracing::info!(
        user_id = %actor.user_id,
        subscribers = ctx.core.events.subscriber_count(),
        "Tracker subscriber connected"
    );

    let events = stream::unfold((rx, scope), |(mut rx, scope)| async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.visible_to(&scope) => {
                    match Event::default().event("enquiry").json_data(&event) {
                        Ok(sse) => return Some((Ok(sse), (rx, scope))),
                        Err(e) => tracing::warn!(enquiry_id = %event.enquiry_id, "Skipping event: {e}"),
                    }
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Tracker subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
