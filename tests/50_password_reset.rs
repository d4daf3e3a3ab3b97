mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use blog_api::database::CredentialStore;
use common::{TestApp, PASSWORD};

const NEW_PASSWORD: &str = "brand-new-secret";

#[tokio::test]
async fn forgot_then_reset() -> Result<()> {
    let app = TestApp::new();
    let user = app.user("Forgetful", &[], &[]).await?;

    let res = app.post_json("/password/forgot", None, json!({ "email": user.email })).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "We have emailed your password reset link!");

    let notice = app.outbox.last_for(&user.email).context("no reset mail sent")?;
    assert_eq!(notice.token.len(), 64);
    assert!(notice.link.starts_with("http://localhost:3000/password/reset/"));

    let reset = app
        .post_json(
            "/password/reset",
            None,
            json!({
                "token": notice.token,
                "email": user.email,
                "password": NEW_PASSWORD,
                "password_confirmation": NEW_PASSWORD
            }),
        )
        .await?;
    assert_eq!(reset.status, StatusCode::OK);
    assert_eq!(reset.body["message"], "Your password has been reset!");

    let old = app
        .post_json("/login", None, json!({ "email": user.email, "password": PASSWORD }))
        .await?;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);
    let new = app
        .post_json("/login", None, json!({ "email": user.email, "password": NEW_PASSWORD }))
        .await?;
    assert_eq!(new.status, StatusCode::OK);

    // Tokens are single use
    let replay = app
        .post_json(
            "/password/reset",
            None,
            json!({
                "token": notice.token,
                "email": user.email,
                "password": NEW_PASSWORD,
                "password_confirmation": NEW_PASSWORD
            }),
        )
        .await?;
    assert_eq!(replay.status, StatusCode::BAD_REQUEST);
    assert_eq!(replay.body["email"][0], "This password reset token is invalid.");
    Ok(())
}

#[tokio::test]
async fn unknown_email_is_a_bad_request() -> Result<()> {
    let app = TestApp::new();
    let res = app
        .post_json("/password/forgot", None, json!({ "email": "nobody@example.com" }))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["email"][0], "We can't find a user with that email address.");

    let invalid = app.post_json("/password/forgot", None, json!({ "email": "not-an-email" })).await?;
    assert_eq!(invalid.status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn wrong_or_expired_tokens_are_rejected() -> Result<()> {
    let app = TestApp::new();
    let user = app.user("Late", &[], &[]).await?;
    app.post_json("/password/forgot", None, json!({ "email": user.email })).await?;
    let notice = app.outbox.last_for(&user.email).context("no reset mail sent")?;

    let body = |token: &str| {
        json!({
            "token": token,
            "email": user.email,
            "password": NEW_PASSWORD,
            "password_confirmation": NEW_PASSWORD
        })
    };

    let wrong = app.post_json("/password/reset", None, body("not-the-token")).await?;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);

    let mut reset = app
        .store
        .find_password_reset(&user.email)
        .await?
        .context("reset record missing")?;
    reset.created_at = Utc::now() - Duration::minutes(61);
    app.store.put_password_reset(reset).await?;

    let expired = app.post_json("/password/reset", None, body(&notice.token)).await?;
    assert_eq!(expired.status, StatusCode::BAD_REQUEST);
    assert_eq!(expired.body["email"][0], "This password reset token is invalid.");

    let mismatch = app
        .post_json(
            "/password/reset",
            None,
            json!({ "token": notice.token, "email": user.email, "password": NEW_PASSWORD }),
        )
        .await?;
    assert_eq!(mismatch.status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}
