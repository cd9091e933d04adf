mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn liveness_never_touches_the_database() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = reqwest::get(server.url("/health/live")).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["status"], "ok");

    Ok(())
}

#[tokio::test]
async fn readiness_reports_degraded_without_problem_details() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = reqwest::get(server.url("/health")).await?;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let content_type = res.headers()["content-type"].to_str()?.to_string();
    assert!(content_type.starts_with("application/json"), "got {}", content_type);

    let body: Value = res.json().await?;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "unavailable");
    assert!(body["version"].is_string());

    Ok(())
}

#[tokio::test]
async fn root_describes_the_api() -> Result<()> {
    let server = common::spawn_server().await?;

    let body: Value = reqwest::get(server.url("/")).await?.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "BizAdmin API");
    assert!(body["data"]["endpoints"]["products"].is_string());

    Ok(())
}

#[tokio::test]
async fn correlation_id_is_echoed_or_generated() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/health/live"))
        .header("x-correlation-id", "test-correlation-42")
        .send()
        .await?;
    assert_eq!(res.headers()["x-correlation-id"], "test-correlation-42");

    let res = client.get(server.url("/health/live")).send().await?;
    let generated = res.headers()["x-correlation-id"].to_str()?;
    assert_eq!(generated.len(), 36, "expected a UUID, got {}", generated);

    Ok(())
}

#[tokio::test]
async fn security_headers_are_set() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = reqwest::get(server.url("/health/live")).await?;
    let headers = res.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("content-security-policy"));
    assert!(headers.contains_key("referrer-policy"));
    assert!(headers.contains_key("permissions-policy"));
    // Development does not require HTTPS
    assert!(!headers.contains_key("strict-transport-security"));

    let res = reqwest::get(server.url("/api/products")).await?;
    assert_eq!(res.headers()["cache-control"], "no-store");

    Ok(())
}
