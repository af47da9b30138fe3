//! HTTP-level scenario tests driven through the real router, following the
//! teacher's `axum_test::TestServer` pattern.

use axum_test::TestServer;
use proxypool_core::clock::StaticCalendar;
use proxypool_types::Market;

use crate::router::build_router;
use crate::test_helpers::test_app_state;

async fn server_with_calendar(calendar: StaticCalendar) -> TestServer {
    let state = test_app_state(&[Market::Us], calendar).await;
    TestServer::new(build_router(state)).unwrap()
}

/// Every future date is a declared holiday, so `should_stop` always reports
/// "outside the trading window" regardless of when this test actually runs.
fn always_closed_calendar() -> StaticCalendar {
    let today = chrono::Utc::now().date_naive();
    let mut cal = StaticCalendar::new();
    for offset in -1..8 {
        cal.add_holiday(Market::Us, today + chrono::Duration::days(offset));
    }
    cal
}

#[tokio::test]
async fn happy_path_start_then_serve_a_proxy() {
    let server = server_with_calendar(always_closed_calendar()).await;

    let start = server.post("/api/v1/start").add_query_param("market", "us").add_query_param("force", "true").await;
    start.assert_status_ok();

    // Let the freshly spawned maintenance task complete its first refresh.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let proxy = server.get("/api/v1/us/proxy").await;
    proxy.assert_status_ok();
    let body: serde_json::Value = proxy.json();
    assert_eq!(body["status"], "ok");
    assert!(body["proxy"].as_str().unwrap().starts_with("us-proxy-"));
}

#[tokio::test]
async fn start_without_force_outside_trading_hours_is_refused() {
    let server = server_with_calendar(always_closed_calendar()).await;

    let response =
        server.post("/api/v1/start").add_query_param("market", "us").add_query_param("force", "false").await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "market_closed");

    let forced =
        server.post("/api/v1/start").add_query_param("market", "us").add_query_param("force", "true").await;
    forced.assert_status_ok();
}

#[tokio::test]
async fn scheduler_force_start_marks_manually_started_and_force_stop_clears_it() {
    // Every instantiated (market, mode) gets a default configuration row at
    // boot, so it shows up in the scheduler's per-tick sweep without an
    // operator having to `POST /config` first.
    let server = server_with_calendar(always_closed_calendar()).await;

    server.post("/api/v1/scheduler/force-start/us").await.assert_status_ok();

    let status: serde_json::Value = server.get("/api/v1/scheduler/status").await.json();
    let entry = status["markets"].as_array().unwrap().iter().find(|m| m["market"] == "us").unwrap();
    assert_eq!(entry["is_running"], true);
    assert_eq!(entry["manually_started"], true);

    server.post("/api/v1/scheduler/force-stop/us").await.assert_status_ok();

    let status: serde_json::Value = server.get("/api/v1/scheduler/status").await.json();
    let entry = status["markets"].as_array().unwrap().iter().find(|m| m["market"] == "us").unwrap();
    assert_eq!(entry["is_running"], false);
    assert_eq!(entry["manually_started"], false);
}
