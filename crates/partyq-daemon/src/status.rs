//! Read-only HTTP status endpoints.
//!
//! - `GET /serverStatus`: liveness probe
//! - `GET /amountServers`: number of live sessions
//! - `GET /activeServers`: pretty-printed snapshot of every session

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat};
use partyq_types::Participant;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::error::Result;
use crate::registry::SessionRegistry;
use crate::server::DaemonState;
use crate::session::{Session, SessionCode};
use crate::tally::VoteLedger;

type SharedState = Arc<RwLock<DaemonState>>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/serverStatus", get(server_status))
        .route("/amountServers", get(amount_servers))
        .route("/activeServers", get(active_servers))
        .with_state(state)
}

/// Serve the status router until the listener fails.
///
/// # Errors
///
/// Returns an error if the HTTP server stops with an I/O error.
pub async fn serve(listener: TcpListener, state: SharedState) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Status endpoints on http://{addr}");
    }
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn server_status() -> Json<Value> {
    Json(json!({ "status": "Server is online" }))
}

async fn amount_servers(State(state): State<SharedState>) -> Json<Value> {
    let count = state.read().await.registry.len();
    Json(json!({ "numberOfServers": count }))
}

async fn active_servers(State(state): State<SharedState>) -> Response {
    let rendered = {
        let guard = state.read().await;
        render_active(&guard.registry, guard.clock.now_ms())
    };

    match rendered {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            error!("Failed to render active servers: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Serialize)]
struct ActiveServers<'a> {
    servers: Vec<ServerSummary<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerSummary<'a> {
    server_code: SessionCode,
    start_time: String,
    up_time: String,
    host: &'a Participant,
    users: &'a [Participant],
    /// Raw ledger keyed by URI, in first-vote order
    song_requests: &'a VoteLedger,
    next_tally_in_seconds: Option<u64>,
}

impl<'a> ServerSummary<'a> {
    fn new(session: &'a Session, now_ms: u64) -> Self {
        Self {
            server_code: session.code,
            start_time: rfc3339(session.created_ms),
            up_time: session.elapsed(now_ms).to_string(),
            host: &session.host,
            users: &session.guests,
            song_requests: &session.ledger,
            next_tally_in_seconds: session.timers.next_tally_in().map(|d| d.as_secs()),
        }
    }
}

fn rfc3339(epoch_ms: u64) -> String {
    i64::try_from(epoch_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

/// Four-space indented JSON, serialized straight from the session records so
/// the ledger keeps its insertion order.
fn render_active(registry: &SessionRegistry, now_ms: u64) -> serde_json::Result<Vec<u8>> {
    let payload = ActiveServers {
        servers: registry
            .iter()
            .map(|s| ServerSummary::new(s, now_ms))
            .collect(),
    };

    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    payload.serialize(&mut ser)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use partyq_types::SongInfo;
    use tower::ServiceExt;

    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::SessionSettings;
    use crate::sink::RecordingSink;
    use crate::tally;

    const T0: u64 = 1_700_000_000_000;

    async fn get_body(state: SharedState, uri: &str) -> (StatusCode, String) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn state_at(clock: &ManualClock) -> SharedState {
        DaemonState::shared(SessionSettings::default(), Arc::new(clock.clone()))
    }

    #[tokio::test]
    async fn test_server_status() {
        let clock = ManualClock::at(T0);
        let (status, body) = get_body(state_at(&clock), "/serverStatus").await;
        assert_eq!(status, StatusCode::OK);
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value, json!({"status": "Server is online"}));
    }

    #[tokio::test]
    async fn test_amount_servers() {
        let clock = ManualClock::at(T0);
        let state = state_at(&clock);
        {
            let mut guard = state.write().await;
            guard.registry.create("h1", "One", T0).unwrap();
            guard.registry.create("h2", "Two", T0).unwrap();
        }
        let (_, body) = get_body(state, "/amountServers").await;
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value, json!({"numberOfServers": 2}));
    }

    #[tokio::test]
    async fn test_active_servers_snapshot() {
        let clock = ManualClock::at(T0);
        let state = state_at(&clock);
        let code = {
            let mut guard = state.write().await;
            let code = guard.registry.create("h1", "Ada", T0).unwrap();
            let mut sink = RecordingSink::default();
            for (user, uri) in [("u1", "spotify:b"), ("u2", "spotify:a"), ("u3", "spotify:a")] {
                let song = SongInfo::new(uri);
                tally::cast_vote(&mut guard.registry, &mut sink, code, user, &song).unwrap();
            }
            code
        };
        clock.advance_ms(3_661_000);

        let (status, body) = get_body(state, "/activeServers").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\n    \"servers\""), "{body}");
        // First-voted URI stays first despite having fewer votes
        assert!(body.find("spotify:b").unwrap() < body.find("spotify:a").unwrap());

        let value: Value = serde_json::from_str(&body).unwrap();
        let server = &value["servers"][0];
        assert_eq!(server["serverCode"], json!(code.to_string()));
        assert_eq!(server["startTime"], json!("2023-11-14T22:13:20.000Z"));
        assert_eq!(server["upTime"], json!("1 hours 1 minutes 1 seconds"));
        assert_eq!(
            server["host"],
            json!({"userId": "h1", "username": "Ada", "lastHeartbeat": T0})
        );
        assert_eq!(server["users"], json!([]));
        assert_eq!(server["songRequests"]["spotify:a"]["votes"], json!(["u2", "u3"]));
        let next_tally = server["nextTallyInSeconds"].as_u64().unwrap();
        assert!(next_tally <= 30);
        assert_eq!(clock.now_ms(), T0 + 3_661_000);
    }

    #[tokio::test]
    async fn test_active_servers_empty() {
        let clock = ManualClock::at(T0);
        let (_, body) = get_body(state_at(&clock), "/activeServers").await;
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value, json!({"servers": []}));
    }

    #[test]
    fn test_rfc3339_epoch() {
        assert_eq!(rfc3339(0), "1970-01-01T00:00:00.000Z");
    }
}
