//! SSE streaming endpoint.
//!
//! GET /streams/:channel?socket_id=&auth=&channel_data=
//!
//! Serves frames published to the in-process StreamHub. There is no bearer
//! token here (EventSource cannot send headers); the caller presents the
//! signed grant it obtained from `POST /authenticate` for this exact
//! socket id and channel.

use std::convert::Infallible;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::debug;

use crate::domains::auth::parse_channel;
use crate::server::app::AxumAppState;

#[derive(Deserialize)]
pub struct StreamQuery {
    socket_id: String,
    auth: String,
    channel_data: Option<String>,
}

pub async fn stream_handler(
    Extension(state): Extension<AxumAppState>,
    Path(channel): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    if parse_channel(&channel).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    let granted = state.deps.socket_signer.verify(
        &query.socket_id,
        &channel,
        query.channel_data.as_deref(),
        &query.auth,
    );
    if !granted {
        debug!(channel = %channel, "stream grant rejected");
        return Err(StatusCode::FORBIDDEN);
    }

    let rx = state.deps.stream_hub.subscribe(&channel).await;

    let connected =
        stream::once(async { Ok::<_, Infallible>(Event::default().event("connected").data("ok")) });

    let events = BroadcastStream::new(rx).filter_map(|result| async {
        match result {
            Ok(frame) => {
                let event_name = frame
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("message")
                    .to_string();
                Event::default()
                    .event(event_name)
                    .json_data(&frame["data"])
                    .ok()
                    .map(Ok)
            }
            Err(BroadcastStreamRecvError::Lagged(n)) => Event::default()
                .event("lagged")
                .json_data(serde_json::json!({ "missed": n }))
                .ok()
                .map(Ok),
        }
    });

    Ok(Sse::new(connected.chain(events)).keep_alive(KeepAlive::default()))
}
