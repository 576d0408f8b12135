//! Integration tests for the dashboard router and the oauth callback relay.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

use moodsync::domain::{Mood, Playback, PlaylistMap, Reading, TickOutcome, TickRecord};
use moodsync::playlist::{PlaylistFieldReader, PlaylistFields};
use moodsync::server::{build_router, WebState};
use moodsync::sync::SharedSnapshot;
use moodsync::token::{
    AuthorizeParams, BrowserRelay, MemoryTokenStorage, PageNavigator, TokenStorage, TokenStore,
    TOKEN_KEY,
};

fn params() -> AuthorizeParams {
    AuthorizeParams {
        client_id: "client".into(),
        redirect_uri: reqwest::Url::parse("http://127.0.0.1:8888/callback").unwrap(),
        scopes: vec!["user-read-playback-state".into(), "user-modify-playback-state".into()],
        accounts_url: "https://accounts.spotify.com".into(),
    }
}

fn web_state() -> WebState {
    WebState {
        snapshot: SharedSnapshot::default(),
        playlists: Arc::new(PlaylistFields::new(PlaylistMap {
            relaxed: "spotify:playlist:calm".into(),
            ..Default::default()
        })),
        relay: Arc::new(BrowserRelay::new(params().app_root())),
    }
}

fn request(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(body).unwrap()
}

const APP_ORIGIN: &str = "http://127.0.0.1:8888";

/// POST a landed location the way the callback page does, from `origin`
fn report_location(origin: Option<&str>, location: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/location")
        .header("content-type", "text/plain");
    if let Some(origin) = origin {
        builder = builder.header("origin", origin);
    }
    builder.body(Body::from(location.to_string())).unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn extract_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.expect("Should read body");
    String::from_utf8(bytes.to_vec()).unwrap()
}

// =============================================================================
// Basic routes
// =============================================================================

#[tokio::test]
async fn health_endpoint() {
    let app = build_router(web_state());
    let response = app.oneshot(request("GET", "/health", Body::empty())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_u64());
}

#[tokio::test]
async fn dashboard_renders() {
    let app = build_router(web_state());
    let response = app.oneshot(request("GET", "/", Body::empty())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = extract_text(response.into_body()).await;
    assert!(html.contains("Current mood: unknown"));
    assert!(html.contains("spotify:playlist:calm"));
    assert!(html.contains("<details>"));
}

#[tokio::test]
async fn status_starts_empty() {
    let app = build_router(web_state());
    let response = app.oneshot(request("GET", "/api/status", Body::empty())).await.unwrap();

    let body = extract_json(response.into_body()).await;
    assert!(body["last_mood"].is_null());
    assert_eq!(body["authorized"], false);
    assert!(body["authorize_url"].is_null());
}

#[tokio::test]
async fn history_is_empty_list() {
    let app = build_router(web_state());
    let response = app.oneshot(request("GET", "/api/history", Body::empty())).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["ticks"], serde_json::json!([]));
}

#[tokio::test]
async fn history_honours_limit() {
    let state = web_state();
    {
        let mut snapshot = state.snapshot.write().await;
        for (at_ms, playback) in [(3, Some(Playback::NoDevice)), (2, None), (1, Some(Playback::Played))] {
            snapshot.ticks.push(TickRecord {
                at_ms,
                reading: Reading { temperature: 10.0, acceleration: 0.5 },
                mood: Mood::Relaxed,
                outcome: match playback {
                    Some(_) => TickOutcome::Dispatched(Mood::Relaxed),
                    None => TickOutcome::Unchanged(Mood::Relaxed),
                },
                playback,
            });
        }
    }
    let app = build_router(state);

    let response = app.clone().oneshot(request("GET", "/api/history?limit=2", Body::empty())).await.unwrap();
    let body = extract_json(response.into_body()).await;
    let ticks = body["ticks"].as_array().unwrap();
    assert_eq!(ticks.len(), 2);
    assert_eq!(ticks[0]["at_ms"], 3);
    assert_eq!(ticks[0]["playback"], "no_device");
    assert!(ticks[1]["playback"].is_null());

    let response = app.clone().oneshot(request("GET", "/api/history?limit=500", Body::empty())).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["ticks"].as_array().unwrap().len(), 3);

    let response = app.oneshot(request("GET", "/api/history", Body::empty())).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["ticks"][2]["playback"], "played");
}

// =============================================================================
// Playlist fields
// =============================================================================

#[tokio::test]
async fn playlist_fields_can_be_replaced() {
    let state = web_state();
    let fields = state.playlists.clone();
    let app = build_router(state);

    let body = serde_json::json!({
        "relaxed": "spotify:playlist:a",
        "neutral": "",
        "energetic": "spotify:playlist:c"
    });
    let req = Request::builder()
        .method("POST")
        .uri("/api/playlists")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(fields.field(Mood::Relaxed), "spotify:playlist:a");
    assert_eq!(fields.field(Mood::Neutral), "");

    let response = app.oneshot(request("GET", "/api/playlists", Body::empty())).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["energetic"], "spotify:playlist:c");
}

// =============================================================================
// OAuth callback relay
// =============================================================================

#[tokio::test]
async fn callback_page_relays_location() {
    let app = build_router(web_state());
    let response = app.oneshot(request("GET", "/callback", Body::empty())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = extract_text(response.into_body()).await;
    assert!(html.contains("/api/location"));
    assert!(html.contains("window.location.href"));
}

#[tokio::test]
async fn foreign_location_is_rejected() {
    let state = web_state();
    let relay = state.relay.clone();
    let app = build_router(state);

    let response = app
        .oneshot(report_location(Some(APP_ORIGIN), "https://evil.example/callback#access_token=stolen"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(relay.current_location().is_none());
}

#[tokio::test]
async fn cross_site_report_cannot_plant_a_token() {
    let state = web_state();
    let relay = state.relay.clone();
    let app = build_router(state);

    let storage = Arc::new(MemoryTokenStorage::default());
    let tokens = TokenStore::new(storage.clone(), relay.clone(), params());

    let response = app
        .oneshot(report_location(
            Some("https://evil.example"),
            "http://127.0.0.1:8888/callback#access_token=ATTACKER",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get("access-control-allow-origin").is_none());
    assert!(relay.current_location().is_none());

    assert!(tokens.acquire().is_none());
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn report_without_origin_or_referer_is_rejected() {
    let state = web_state();
    let relay = state.relay.clone();
    let app = build_router(state);

    let response = app
        .oneshot(report_location(None, "http://127.0.0.1:8888/callback#access_token=x"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(relay.current_location().is_none());
}

#[tokio::test]
async fn same_origin_referer_is_accepted() {
    let state = web_state();
    let relay = state.relay.clone();
    let app = build_router(state);

    let req = Request::builder()
        .method("POST")
        .uri("/api/location")
        .header("referer", "http://127.0.0.1:8888/callback")
        .body(Body::from("http://127.0.0.1:8888/callback#access_token=ok"))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(relay.current_location().unwrap().path(), "/callback");
}

#[tokio::test]
async fn garbage_location_is_rejected() {
    let app = build_router(web_state());
    let response = app
        .oneshot(report_location(Some(APP_ORIGIN), "not a url"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn full_authorization_round_trip() {
    let state = web_state();
    let relay = state.relay.clone();
    let app = build_router(state);

    let storage = Arc::new(MemoryTokenStorage::default());
    let tokens = TokenStore::new(storage.clone(), relay.clone(), params());

    // tick 1: no token, the user is sent to spotify
    assert!(tokens.acquire().is_none());
    let response = app.clone().oneshot(request("GET", "/api/status", Body::empty())).await.unwrap();
    let body = extract_json(response.into_body()).await;
    let authorize = body["authorize_url"].as_str().unwrap().to_string();
    assert!(authorize.starts_with("https://accounts.spotify.com/authorize?client_id=client"));

    // spotify redirects back, the callback page reports its location
    let response = app
        .oneshot(report_location(
            Some(APP_ORIGIN),
            "http://127.0.0.1:8888/callback#access_token=fresh&token_type=Bearer&expires_in=3600",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // tick 2: token is captured, browser goes home, tick still yields nothing
    assert!(tokens.acquire().is_none());
    assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("fresh"));
    assert_eq!(relay.current_location().unwrap().path(), "/");

    // tick 3: credential available
    assert_eq!(tokens.acquire().unwrap().token(), "fresh");
}
