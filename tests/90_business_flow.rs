//! End-to-end against PostgreSQL. Skipped unless TEST_DATABASE_URL is set.

mod common;

use anyhow::Result;
use serde_json::json;
use uuid::Uuid;

use bizadmin_api::client::ApiClient;
use bizadmin_api::database::models::user::CreateUser;
use bizadmin_api::database::DatabaseManager;
use bizadmin_api::services::Actor;

#[tokio::test]
async fn inventory_order_and_audit_flow() -> Result<()> {
    let Some(database_url) = common::test_database_url() else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };

    let mut config = common::test_config();
    config.database.url = database_url;
    config.database.connection_timeout = 5;
    let server = common::spawn_with(config).await?;
    DatabaseManager::migrate(&server.state.pool).await?;

    let suffix = Uuid::new_v4().simple().to_string()[..8].to_string();
    let username = format!("admin_{}", suffix);
    server
        .state
        .users()
        .create(
            CreateUser {
                username: username.clone(),
                password: "flowtest123".to_string(),
                role: "admin".to_string(),
                email: None,
                display_name: None,
            },
            &Actor::default(),
        )
        .await?;

    let client = ApiClient::new(&server.base_url);
    let session = client.login(&username, "flowtest123").await?;
    assert_eq!(session["user"]["role"], "admin");
    assert!(session["user"].get("password_hash").is_none());

    // Wrong password and unknown user fail identically
    let wrong = ApiClient::new(&server.base_url).login(&username, "nope12345").await.unwrap_err();
    let unknown = ApiClient::new(&server.base_url).login("nobody_here", "nope12345").await.unwrap_err();
    assert_eq!(wrong.status(), Some(401));
    assert_eq!(wrong.to_string(), unknown.to_string());

    let sku = format!("FLOW-{}", suffix);
    let product = client
        .post(
            "/api/products",
            &json!({ "sku": sku, "name": "Flow widget", "unit_price": "12.50", "stock_quantity": 10, "reorder_level": 3 }),
        )
        .await?;
    let product_id = product["data"]["id"].as_str().unwrap_or_default().to_string();
    assert_eq!(product["data"]["stock_quantity"], 10);

    // Duplicate SKU
    let dup = client
        .post("/api/products", &json!({ "sku": sku, "name": "Again", "unit_price": 1 }))
        .await
        .unwrap_err();
    assert_eq!(dup.status(), Some(409));

    let order = client
        .post(
            "/api/customer-orders",
            &json!({ "customer_name": "Ada", "items": [{ "product_id": product_id, "quantity": 4 }] }),
        )
        .await?;
    let order_id = order["data"]["id"].as_str().unwrap_or_default().to_string();
    assert_eq!(order["data"]["status"], "pending");
    assert_eq!(order["data"]["total_amount"], "50.00");
    assert!(order["data"]["order_number"].as_str().unwrap_or_default().starts_with("CO-"));

    let after_order = client.get(&format!("/api/products/{}", product_id)).await?;
    assert_eq!(after_order["data"]["stock_quantity"], 6);

    let too_many = client
        .post(
            "/api/customer-orders",
            &json!({ "customer_name": "Bob", "items": [{ "product_id": product_id, "quantity": 7 }] }),
        )
        .await
        .unwrap_err();
    assert_eq!(too_many.status(), Some(409));

    let illegal = client
        .put(&format!("/api/customer-orders/{}/status", order_id), &json!({ "status": "delivered" }))
        .await
        .unwrap_err();
    assert_eq!(illegal.status(), Some(409));

    client
        .put(&format!("/api/customer-orders/{}/status", order_id), &json!({ "status": "cancelled" }))
        .await?;
    let after_cancel = client.get(&format!("/api/products/{}", product_id)).await?;
    assert_eq!(after_cancel["data"]["stock_quantity"], 10);

    let audit = client
        .get(&format!("/api/audit?entity_type=customer_order&username={}", username))
        .await?;
    assert!(audit["recordsFiltered"].as_i64().unwrap_or_default() >= 2);
    assert!(audit.get("success").is_none(), "DataTables responses are not wrapped");

    let listing = client.get(&format!("/api/products?search[value]={}&draw=7", sku)).await?;
    assert_eq!(listing["draw"], 7);
    assert_eq!(listing["recordsFiltered"], 1);

    client.logout().await?;
    Ok(())
}
