use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, header};
use time::OffsetDateTime;
use tower::ServiceExt;

use super::*;
use crate::provider::ProviderError;
use crate::routes::middleware::{gate_path, is_bypassed};
use crate::session::DEFAULT_COOKIE_NAME;
use crate::session::test_helpers::{MockProvider, cookie_headers};
use crate::state::test_helpers::test_app_state;

fn test_app(provider: &Arc<MockProvider>) -> Router {
    let pages = Router::new().fallback(|| async { "page" });
    app(test_app_state(provider.clone()), pages)
}

fn expires() -> OffsetDateTime {
    OffsetDateTime::now_utc() + time::Duration::hours(1)
}

fn get(path: &str, headers: HeaderMap) -> Request<Body> {
    let mut request = Request::builder().uri(path).body(Body::empty()).unwrap();
    *request.headers_mut() = headers;
    request
}

fn signed_in(token: &str) -> HeaderMap {
    cookie_headers(DEFAULT_COOKIE_NAME, token, expires())
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &axum::response::Response) -> Option<&str> {
    response.headers().get(header::LOCATION).and_then(|v| v.to_str().ok())
}

// =============================================================================
// is_bypassed
// =============================================================================

#[test]
fn bypass_matches_prefix_on_segment_boundary() {
    assert!(is_bypassed("/api"));
    assert!(is_bypassed("/api/employees"));
    assert!(is_bypassed("/assets/app.js"));
    assert!(is_bypassed("/favicon.ico"));
    assert!(is_bypassed("/healthz"));
    assert!(!is_bypassed("/apiary"));
    assert!(!is_bypassed("/dashboard/api"));
    assert!(!is_bypassed("/"));
}

#[test]
fn gate_path_drops_trailing_slashes() {
    assert_eq!(gate_path("/onboarding/"), "/onboarding");
    assert_eq!(gate_path("/dashboard/payments//"), "/dashboard/payments");
    assert_eq!(gate_path("/onboarding"), "/onboarding");
    assert_eq!(gate_path("/"), "/");
    assert_eq!(gate_path("//"), "/");
}

// =============================================================================
// gate middleware
// =============================================================================

#[tokio::test]
async fn public_page_without_session_is_served() {
    let provider = Arc::new(MockProvider::default());
    let response = test_app(&provider).oneshot(get("/login", HeaderMap::new())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "page");
}

#[tokio::test]
async fn protected_page_without_session_redirects_to_login() {
    let provider = Arc::new(MockProvider::default());
    let response = test_app(&provider).oneshot(get("/dashboard", HeaderMap::new())).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn pending_onboarding_redirects_to_onboarding() {
    let provider = Arc::new(MockProvider::with_user("tok", "user-1", false));
    let response = test_app(&provider)
        .oneshot(get("/dashboard/employees", signed_in("tok")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/onboarding"));
}

#[tokio::test]
async fn pending_onboarding_may_open_onboarding() {
    let provider = Arc::new(MockProvider::with_user("tok", "user-1", false));
    let response = test_app(&provider).oneshot(get("/onboarding", signed_in("tok"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn completed_onboarding_is_sent_to_dashboard() {
    let provider = Arc::new(MockProvider::with_user("tok", "user-1", true));
    let response = test_app(&provider).oneshot(get("/onboarding", signed_in("tok"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/dashboard"));
}

#[tokio::test]
async fn completed_onboarding_reaches_protected_pages() {
    let provider = Arc::new(MockProvider::with_user("tok", "user-1", true));
    let response = test_app(&provider)
        .oneshot(get("/dashboard/payments", signed_in("tok")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "page");
}

#[tokio::test]
async fn provider_outage_fails_closed() {
    let provider = Arc::new(MockProvider::with_user("tok", "user-1", true));
    provider.fail_next(vec![ProviderError::Status { status: 500, body: "down".into() }]);
    let response = test_app(&provider).oneshot(get("/dashboard", signed_in("tok"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn expired_cookie_redirects_to_login() {
    let provider = Arc::new(MockProvider::with_user("tok", "user-1", true));
    let headers = cookie_headers(DEFAULT_COOKIE_NAME, "tok", OffsetDateTime::now_utc() - time::Duration::minutes(1));
    let response = test_app(&provider).oneshot(get("/dashboard", headers)).await.unwrap();
    assert_eq!(location(&response), Some("/login"));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn api_routes_bypass_the_gate() {
    let provider = Arc::new(MockProvider::default());
    let response = test_app(&provider)
        .oneshot(get("/api/auth/session", HeaderMap::new()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(location(&response).is_none());
}

#[tokio::test]
async fn static_assets_bypass_the_gate() {
    let provider = Arc::new(MockProvider::default());
    let response = test_app(&provider).oneshot(get("/assets/app.js", HeaderMap::new())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn healthz_is_ok_without_session() {
    let provider = Arc::new(MockProvider::default());
    let response = test_app(&provider).oneshot(get("/healthz", HeaderMap::new())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_api_path_is_not_found() {
    let provider = Arc::new(MockProvider::default());
    let response = test_app(&provider).oneshot(get("/api/employes", HeaderMap::new())).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_ne!(body_text(response).await, "page");
}

// =============================================================================
// gate in front of the static site
// =============================================================================

const MAX_HOPS: usize = 5;

fn site_fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "shell").unwrap();
    for (page, body) in [("onboarding", "wizard"), ("dashboard", "dashboard")] {
        std::fs::create_dir(dir.path().join(page)).unwrap();
        std::fs::write(dir.path().join(page).join("index.html"), body).unwrap();
    }
    dir
}

fn site_app(provider: &Arc<MockProvider>, site_dir: &Path) -> Router {
    app(test_app_state(provider.clone()), site(site_dir))
}

/// Follow redirects the way a browser would. Returns the final response and
/// every path requested.
async fn follow(app: &Router, path: &str, headers: &HeaderMap) -> (axum::response::Response, Vec<String>) {
    let mut visited = vec![path.to_owned()];
    loop {
        let current = visited.last().unwrap().clone();
        let response = app.clone().oneshot(get(&current, headers.clone())).await.unwrap();
        if !response.status().is_redirection() {
            return (response, visited);
        }
        assert!(visited.len() <= MAX_HOPS, "redirect loop: {visited:?}");
        let next = location(&response).expect("redirect without location").to_owned();
        visited.push(next);
    }
}

#[tokio::test]
async fn pending_onboarding_reaches_wizard_directory() {
    let site_dir = site_fixture();
    let provider = Arc::new(MockProvider::with_user("tok", "user-1", false));
    let app = site_app(&provider, site_dir.path());

    let (response, visited) = follow(&app, "/onboarding", &signed_in("tok")).await;
    assert_eq!(visited, ["/onboarding", "/onboarding/"]);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "wizard");
}

#[tokio::test]
async fn completed_onboarding_cannot_reopen_wizard_directory() {
    let site_dir = site_fixture();
    let provider = Arc::new(MockProvider::with_user("tok", "user-1", true));
    let app = site_app(&provider, site_dir.path());

    let response = app.clone().oneshot(get("/onboarding/", signed_in("tok"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/dashboard"));

    let (response, visited) = follow(&app, "/onboarding/", &signed_in("tok")).await;
    assert_eq!(visited.last().map(String::as_str), Some("/dashboard/"));
    assert_eq!(body_text(response).await, "dashboard");
}

#[tokio::test]
async fn signed_out_directory_url_redirects_to_login() {
    let site_dir = site_fixture();
    let provider = Arc::new(MockProvider::default());
    let response = site_app(&provider, site_dir.path())
        .oneshot(get("/dashboard/", HeaderMap::new()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn unknown_api_path_skips_site_shell() {
    let site_dir = site_fixture();
    let provider = Arc::new(MockProvider::default());
    let response = site_app(&provider, site_dir.path())
        .oneshot(get("/api/employes", HeaderMap::new()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_ne!(body_text(response).await, "shell");
}
