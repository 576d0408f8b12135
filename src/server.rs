//! ==============================================================================
//! server.rs - dashboard, playlist fields and oauth callback relay
//! ==============================================================================
//!
//! routes:
//!     GET  /               dashboard (mood, last reading, playlist form, history)
//!     GET  /callback       spotify redirect target; relays location.href
//!     POST /api/location   body = landed url (same origin only, no cors)
//!     GET  /api/playlists  current playlist fields
//!     POST /api/playlists  replace playlist fields
//!     GET  /api/status     loop snapshot without history
//!     GET  /api/history    recent ticks, newest first (?limit=N)
//!     GET  /health         liveness
//!
//! the implicit grant puts the token in the url fragment, which browsers
//! never send to a server. the /callback page therefore posts its own
//! location back to us and returns to the dashboard; token.rs does the rest
//! on the next tick. the sender must prove it is our own page through its
//! Origin (or Referer) header, otherwise any site the user visits could
//! plant a token of its own.
//!
//! ==============================================================================

use crate::domain::{now_ms, Mood, PlaylistMap, SyncSnapshot, TickRecord};
use crate::playlist::PlaylistFields;
use crate::sync::SharedSnapshot;
use crate::token::BrowserRelay;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

// ==============================================================================
// shared state
// ==============================================================================

#[derive(Clone)]
pub struct WebState {
    pub snapshot: SharedSnapshot,
    pub playlists: Arc<PlaylistFields>,
    pub relay: Arc<BrowserRelay>,
}

pub fn build_router(state: WebState) -> Router {
    // the location relay is merged in after the cors layer so it stays same-origin
    let relay = Router::new().route("/api/location", post(location_handler));

    Router::new()
        .route("/", get(dashboard_handler))
        .route("/callback", get(callback_handler))
        .route("/api/playlists", get(get_playlists).post(set_playlists))
        .route("/api/status", get(status_handler))
        .route("/api/history", get(history_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .merge(relay)
        .with_state(state)
}

pub async fn run_server(state: WebState, bind: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("✓ Dashboard live at http://{}", listener.local_addr()?);
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

// ==============================================================================
// handlers
// ==============================================================================

async fn dashboard_handler(State(state): State<WebState>) -> Html<String> {
    let snapshot = state.snapshot.read().await.clone();
    let playlists = state.playlists.snapshot();
    let authorize = state.relay.pending_authorization();
    Html(render_dashboard(&snapshot, &playlists, authorize.as_ref().map(|u| u.as_str())))
}

const CALLBACK_PAGE: &str = r#"<!doctype html>
<html>
<head><title>moodsync - connecting spotify</title></head>
<body style="font-family: system-ui; padding: 2rem; background: #1a1a2e; color: #eee;">
<p>Connecting Spotify…</p>
<script>
fetch('/api/location', { method: 'POST', headers: { 'Content-Type': 'text/plain' }, body: window.location.href })
  .finally(function () { window.location.replace('/'); });
</script>
</body>
</html>"#;

async fn callback_handler() -> Html<&'static str> {
    Html(CALLBACK_PAGE)
}

async fn location_handler(
    State(state): State<WebState>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let app_origin = state.relay.app_root().origin().ascii_serialization();
    if !sent_by_origin(&headers, &app_origin) {
        warn!("Rejecting location report not sent from {}", app_origin);
        return StatusCode::FORBIDDEN;
    }

    let location = match reqwest::Url::parse(body.trim()) {
        Ok(url) => url,
        Err(e) => {
            warn!("Ignoring unparseable location report: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    if location.origin() != state.relay.app_root().origin() {
        warn!("Ignoring location report from foreign origin {}", location.origin().ascii_serialization());
        return StatusCode::BAD_REQUEST;
    }
    state.relay.report(location);
    StatusCode::NO_CONTENT
}

/// Origin must match when present, otherwise the Referer's origin must
fn sent_by_origin(headers: &HeaderMap, app_origin: &str) -> bool {
    if let Some(origin) = headers.get(header::ORIGIN) {
        return origin.to_str().map(|o| o == app_origin).unwrap_or(false);
    }
    headers
        .get(header::REFERER)
        .and_then(|r| r.to_str().ok())
        .and_then(|r| reqwest::Url::parse(r).ok())
        .map(|r| r.origin().ascii_serialization() == app_origin)
        .unwrap_or(false)
}

async fn get_playlists(State(state): State<WebState>) -> Json<PlaylistMap> {
    Json(state.playlists.snapshot())
}

async fn set_playlists(
    State(state): State<WebState>,
    Json(values): Json<PlaylistMap>,
) -> Json<PlaylistMap> {
    info!("Playlist fields updated");
    state.playlists.replace(values);
    Json(state.playlists.snapshot())
}

async fn status_handler(State(state): State<WebState>) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    Json(serde_json::json!({
        "last_mood": snapshot.last_mood,
        "last_reading": snapshot.last_reading,
        "authorized": snapshot.authorized,
        "updated_ms": snapshot.updated_ms,
        "authorize_url": state.relay.pending_authorization().map(|u| u.to_string()),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

async fn history_handler(
    State(state): State<WebState>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    let limit = params.limit.unwrap_or(snapshot.ticks.len()).min(snapshot.ticks.len());
    let ticks = &snapshot.ticks[..limit];
    Json(serde_json::json!({ "ticks": ticks }))
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": now_ms(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ==============================================================================
// html
// ==============================================================================

fn render_dashboard(snapshot: &SyncSnapshot, playlists: &PlaylistMap, authorize: Option<&str>) -> String {
    let mood = snapshot.last_mood.map(|m| m.as_str()).unwrap_or("unknown");
    let reading = snapshot
        .last_reading
        .map(|r| format!("{:.1}°C · {:.2}g", r.temperature, r.acceleration))
        .unwrap_or_else(|| "no reading yet".to_string());

    let auth = match (snapshot.authorized, authorize) {
        (true, _) => "<p class=\"ok\">Spotify connected</p>".to_string(),
        (false, Some(url)) => format!(
            "<p class=\"warn\">Spotify not connected - <a href=\"{}\">authorize</a></p>",
            html_escape(url)
        ),
        (false, None) => "<p class=\"warn\">Spotify not connected</p>".to_string(),
    };

    let fields: String = Mood::ALL
        .iter()
        .map(|m| {
            format!(
                "<label>{0} <input name=\"{0}\" value=\"{1}\" size=\"48\"></label><br>",
                m.as_str(),
                html_escape(playlists.get(*m))
            )
        })
        .collect();

    let rows: String = snapshot.ticks.iter().map(history_row).collect();

    format!(
        r#"<!doctype html>
<html>
<head><title>moodsync</title>
<style>
body {{ font-family: system-ui; padding: 2rem; background: #1a1a2e; color: #eee; }}
.ok {{ color: #6bff95; }} .warn {{ color: #ff6b6b; }}
a {{ color: #8ab4ff; }}
table {{ border-collapse: collapse; }} td, th {{ padding: 0.2rem 0.8rem; }}
</style>
</head>
<body>
<h1>Current mood: {mood}</h1>
<p>Last reading: {reading}</p>
{auth}
<h2>Playlists</h2>
<form id="playlists">
{fields}
<button type="submit">Save</button>
</form>
<details>
<summary>History ({count})</summary>
<table>
<tr><th>time</th><th>temp</th><th>accel</th><th>mood</th><th>playback</th></tr>
{rows}
</table>
</details>
<script>
document.getElementById('playlists').addEventListener('submit', function (e) {{
  e.preventDefault();
  var body = {{}};
  new FormData(e.target).forEach(function (v, k) {{ body[k] = v; }});
  fetch('/api/playlists', {{ method: 'POST', headers: {{ 'Content-Type': 'application/json' }}, body: JSON.stringify(body) }});
}});
</script>
</body>
</html>"#,
        mood = mood,
        reading = reading,
        auth = auth,
        fields = fields,
        count = snapshot.ticks.len(),
        rows = rows,
    )
}

fn history_row(t: &TickRecord) -> String {
    format!(
        "<tr><td>{}</td><td>{:.1}</td><td>{:.2}</td><td>{}</td><td>{}</td></tr>",
        format_time(t.at_ms),
        t.reading.temperature,
        t.reading.acceleration,
        t.mood,
        t.playback.map(|p| p.as_str()).unwrap_or("-"),
    )
}

fn format_time(at_ms: u64) -> String {
    i64::try_from(at_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| at_ms.to_string())
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
