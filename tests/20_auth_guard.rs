mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use bizadmin_api::types::Role;

#[tokio::test]
async fn api_requires_a_bearer_token() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = reqwest::get(server.url("/api/products")).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers()["content-type"].to_str()?.starts_with("application/problem+json"));

    let problem: Value = res.json().await?;
    assert_eq!(problem["status"], 401);
    assert_eq!(problem["instance"], "/api/products");
    assert!(problem["correlationId"].is_string());

    Ok(())
}

#[tokio::test]
async fn garbage_and_foreign_tokens_are_rejected() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/api/auth/me"))
        .bearer_auth("not-a-jwt")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Signed with a different secret
    let mut other = common::test_config();
    other.auth.jwt_secret = "another-secret-that-is-long-enough-0000".to_string();
    let foreign = common::spawn_with(other).await?.token(Role::Admin)?;
    let res = client
        .get(server.url("/api/auth/me"))
        .bearer_auth(foreign)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn roles_are_enforced_before_any_work() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();
    let viewer = server.token(Role::Viewer)?;
    let manager = server.token(Role::Manager)?;

    let res = client
        .delete(server.url("/api/products/7f1c2f4e-7c55-4d7a-9f57-0d1f6a1b2c3d"))
        .bearer_auth(&viewer)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let problem: Value = res.json().await?;
    assert_eq!(problem["detail"], "Requires admin role");

    let res = client.get(server.url("/api/audit")).bearer_auth(&manager).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .put(server.url("/api/settings/company.name"))
        .bearer_auth(&manager)
        .json(&json!({ "value": "Acme" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn login_attempts_are_rate_limited() -> Result<()> {
    let mut config = common::test_config();
    config.auth.login_rate_limit_per_minute = 2;
    let server = common::spawn_with(config).await?;
    let client = reqwest::Client::new();

    // Empty credentials fail validation without reaching the database
    for _ in 0..2 {
        let res = client
            .post(server.url("/auth/login"))
            .json(&json!({ "username": "", "password": "" }))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    let res = client
        .post(server.url("/auth/login"))
        .json(&json!({ "username": "", "password": "" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = res.headers()["retry-after"].to_str()?.parse()?;
    assert!(retry_after >= 1);

    Ok(())
}

#[tokio::test]
async fn role_is_checked_before_the_body() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();
    let viewer = server.token(Role::Viewer)?;

    // Invalid product: empty name, negative price
    let res = client
        .post(server.url("/api/products"))
        .bearer_auth(&viewer)
        .json(&json!({ "sku": "", "name": "", "unit_price": -1 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Not even JSON
    let res = client
        .post(server.url("/api/users"))
        .bearer_auth(&viewer)
        .header("content-type", "application/json")
        .body("{")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .put(server.url("/api/settings/inventory.low_stock_threshold"))
        .bearer_auth(server.token(Role::Manager)?)
        .json(&json!({ "value": "not a number" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    Ok(())
}
