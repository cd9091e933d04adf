mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use bizadmin_api::types::Role;

#[tokio::test]
async fn unknown_routes_are_404_problems() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/no/such/thing"))
        .header("x-correlation-id", "corr-404")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.headers()["content-type"].to_str()?.starts_with("application/problem+json"));

    let problem: Value = res.json().await?;
    assert_eq!(problem["status"], 404);
    assert_eq!(problem["title"], "Not Found");
    assert_eq!(problem["instance"], "/no/such/thing");
    assert_eq!(problem["correlationId"], "corr-404");

    Ok(())
}

#[tokio::test]
async fn validation_failures_list_every_field() -> Result<()> {
    let server = common::spawn_server().await?;
    let manager = server.token(Role::Manager)?;

    let res = reqwest::Client::new()
        .post(server.url("/api/products"))
        .bearer_auth(manager)
        .json(&json!({ "sku": "bad sku!", "name": "", "unit_price": -1 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let problem: Value = res.json().await?;
    assert_eq!(problem["status"], 422);
    let errors = problem["errors"].as_object().expect("errors map");
    assert!(errors.contains_key("sku"));
    assert!(errors.contains_key("name"));
    assert!(errors.contains_key("unit_price"));

    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_400_problem() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = reqwest::Client::new()
        .post(server.url("/auth/login"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let problem: Value = res.json().await?;
    assert_eq!(problem["status"], 400);
    assert_eq!(problem["instance"], "/auth/login");

    Ok(())
}

#[tokio::test]
async fn path_rejections_become_problems() -> Result<()> {
    let server = common::spawn_server().await?;
    let viewer = server.token(Role::Viewer)?;

    let res = reqwest::Client::new()
        .get(server.url("/api/products/not-a-uuid"))
        .bearer_auth(viewer)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.headers()["content-type"].to_str()?.starts_with("application/problem+json"));

    Ok(())
}

#[tokio::test]
async fn bad_query_parameters_are_rejected() -> Result<()> {
    let server = common::spawn_server().await?;
    let viewer = server.token(Role::Viewer)?;

    let res = reqwest::Client::new()
        .get(server.url("/api/insights/summary?days=lots"))
        .bearer_auth(viewer)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let problem: Value = res.json().await?;
    assert!(problem["detail"].as_str().unwrap_or_default().contains("days"));

    Ok(())
}
