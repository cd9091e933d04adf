//! Refresh token lifecycle and account rules against PostgreSQL.
//! Skipped unless TEST_DATABASE_URL is set.

mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use bizadmin_api::auth::{generate_refresh_token, hash_refresh_token, AuthError};
use bizadmin_api::database::models::user::{ChangePassword, CreateUser, UpdateUser};
use bizadmin_api::database::models::RefreshToken;
use bizadmin_api::services::Actor;
use bizadmin_api::types::Role;

async fn stored_token(pool: &sqlx::PgPool, token: &str) -> Result<RefreshToken> {
    Ok(sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE token_hash = $1")
        .bind(hash_refresh_token(token))
        .fetch_one(pool)
        .await?)
}

#[tokio::test]
async fn refresh_rotates_and_links_the_old_token() -> Result<()> {
    let Some(server) = common::spawn_database_server().await? else {
        return Ok(());
    };
    let user = common::create_user(&server.state, Role::Viewer).await?;
    let auth = server.state.auth();
    let actor = Actor::default();

    let first = auth.login(&user.username, common::TEST_PASSWORD, &actor).await?;
    let second = auth.refresh(&first.refresh_token, &actor).await?;
    assert_ne!(first.refresh_token, second.refresh_token);
    assert_eq!(second.user.id, user.id);

    let old = stored_token(&server.state.pool, &first.refresh_token).await?;
    let new = stored_token(&server.state.pool, &second.refresh_token).await?;
    assert!(old.revoked_at.is_some());
    assert_eq!(old.replaced_by, Some(new.id));
    assert!(new.revoked_at.is_none());

    // The rotated token keeps working
    auth.refresh(&second.refresh_token, &actor).await?;
    Ok(())
}

#[tokio::test]
async fn reused_refresh_token_revokes_every_session() -> Result<()> {
    let Some(server) = common::spawn_database_server().await? else {
        return Ok(());
    };
    let user = common::create_user(&server.state, Role::Manager).await?;
    let auth = server.state.auth();
    let actor = Actor::default();

    let first = auth.login(&user.username, common::TEST_PASSWORD, &actor).await?;
    let other_device = auth.login(&user.username, common::TEST_PASSWORD, &actor).await?;
    let rotated = auth.refresh(&first.refresh_token, &actor).await?;

    let reused = auth.refresh(&first.refresh_token, &actor).await.unwrap_err();
    assert!(matches!(reused, AuthError::RefreshTokenRevoked));

    for token in [&rotated.refresh_token, &other_device.refresh_token] {
        let err = auth.refresh(token, &actor).await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshTokenRevoked));
    }

    let live: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM refresh_tokens WHERE user_id = $1 AND revoked_at IS NULL")
        .bind(user.id)
        .fetch_one(&server.state.pool)
        .await?;
    assert_eq!(live, 0);

    let flagged: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM audit_logs WHERE action = 'token_reuse' AND entity_id = $1",
    )
    .bind(user.id.to_string())
    .fetch_one(&server.state.pool)
    .await?;
    assert!(flagged >= 1);
    Ok(())
}

#[tokio::test]
async fn expired_unknown_and_inactive_refreshes_fail() -> Result<()> {
    let Some(server) = common::spawn_database_server().await? else {
        return Ok(());
    };
    let user = common::create_user(&server.state, Role::Viewer).await?;
    let auth = server.state.auth();
    let actor = Actor::default();

    let expired = generate_refresh_token();
    sqlx::query("INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, now() - interval '1 day')")
        .bind(user.id)
        .bind(hash_refresh_token(&expired))
        .execute(&server.state.pool)
        .await?;
    let err = auth.refresh(&expired, &actor).await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshTokenExpired));

    let err = auth.refresh(&generate_refresh_token(), &actor).await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshTokenUnknown));

    let pair = auth.login(&user.username, common::TEST_PASSWORD, &actor).await?;
    sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
        .bind(user.id)
        .execute(&server.state.pool)
        .await?;
    let err = auth.refresh(&pair.refresh_token, &actor).await.unwrap_err();
    assert!(matches!(err, AuthError::UserInactive));

    // Inactive accounts look like bad credentials at login
    let err = auth.login(&user.username, common::TEST_PASSWORD, &actor).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    Ok(())
}

#[tokio::test]
async fn logout_is_idempotent_and_logout_all_ends_every_session() -> Result<()> {
    let Some(server) = common::spawn_database_server().await? else {
        return Ok(());
    };
    let user = common::create_user(&server.state, Role::Viewer).await?;
    let auth = server.state.auth();
    let actor = Actor::default();
    let client = reqwest::Client::new();

    let pair = auth.login(&user.username, common::TEST_PASSWORD, &actor).await?;
    for _ in 0..2 {
        let res = client
            .post(server.url("/auth/logout"))
            .json(&json!({ "refresh_token": pair.refresh_token }))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }
    let res = client
        .post(server.url("/auth/logout"))
        .json(&json!({ "refresh_token": generate_refresh_token() }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .post(server.url("/auth/refresh"))
        .json(&json!({ "refresh_token": pair.refresh_token }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let laptop = auth.login(&user.username, common::TEST_PASSWORD, &actor).await?;
    let phone = auth.login(&user.username, common::TEST_PASSWORD, &actor).await?;
    let res = client
        .delete(server.url("/api/auth/sessions"))
        .bearer_auth(&laptop.access_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["revoked_sessions"], 2);

    for token in [&laptop.refresh_token, &phone.refresh_token] {
        assert!(stored_token(&server.state.pool, token).await?.revoked_at.is_some());
    }
    Ok(())
}

#[tokio::test]
async fn password_change_ends_sessions() -> Result<()> {
    let Some(server) = common::spawn_database_server().await? else {
        return Ok(());
    };
    let user = common::create_user(&server.state, Role::Viewer).await?;
    let auth = server.state.auth();
    let users = server.state.users();
    let actor = common::actor_for(&user);

    let pair = auth.login(&user.username, common::TEST_PASSWORD, &Actor::default()).await?;

    let wrong = users
        .change_password(
            user.id,
            ChangePassword {
                current_password: "not-my-password1".to_string(),
                new_password: "brandnew4567".to_string(),
            },
            &actor,
        )
        .await
        .unwrap_err();
    assert_eq!(wrong.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    users
        .change_password(
            user.id,
            ChangePassword {
                current_password: common::TEST_PASSWORD.to_string(),
                new_password: "brandnew4567".to_string(),
            },
            &actor,
        )
        .await?;

    let err = auth.refresh(&pair.refresh_token, &Actor::default()).await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshTokenRevoked));
    assert!(auth.login(&user.username, common::TEST_PASSWORD, &Actor::default()).await.is_err());
    auth.login(&user.username, "brandnew4567", &Actor::default()).await?;
    Ok(())
}

#[tokio::test]
async fn admins_cannot_demote_or_deactivate_themselves() -> Result<()> {
    let Some(server) = common::spawn_database_server().await? else {
        return Ok(());
    };
    let admin = common::create_user(&server.state, Role::Admin).await?;
    let users = server.state.users();
    let own = common::actor_for(&admin);

    let demote = UpdateUser { role: Some("viewer".to_string()), ..Default::default() };
    let err = users.update(admin.id, demote, &own).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::CONFLICT);

    let deactivate = UpdateUser { is_active: Some(false), ..Default::default() };
    let err = users.update(admin.id, deactivate, &own).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::CONFLICT);

    // Another admin may do both, and deactivation ends the sessions
    let pair = server.state.auth().login(&admin.username, common::TEST_PASSWORD, &Actor::default()).await?;
    let other = common::actor_for(&common::create_user(&server.state, Role::Admin).await?);
    let update = UpdateUser { role: Some("manager".to_string()), is_active: Some(false), ..Default::default() };
    let updated = users.update(admin.id, update, &other).await?;
    assert_eq!(updated.role, Role::Manager);
    assert!(!updated.is_active);
    assert!(stored_token(&server.state.pool, &pair.refresh_token).await?.revoked_at.is_some());

    let err = users.update(Uuid::new_v4(), UpdateUser::default(), &other).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn usernames_are_unique_ignoring_case() -> Result<()> {
    let Some(server) = common::spawn_database_server().await? else {
        return Ok(());
    };
    let users = server.state.users();
    let username = common::unique("alice");
    let input = |name: String| CreateUser {
        username: name,
        password: common::TEST_PASSWORD.to_string(),
        role: "viewer".to_string(),
        email: None,
        display_name: None,
    };

    users.create(input(username.clone()), &Actor::default()).await?;
    let err = users.create(input(username.to_uppercase()), &Actor::default()).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::CONFLICT);

    // Login still finds the account whatever the case
    server
        .state
        .auth()
        .login(&username.to_uppercase(), common::TEST_PASSWORD, &Actor::default())
        .await?;
    Ok(())
}
