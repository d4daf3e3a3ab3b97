mod common;

use anyhow::{Context, Result};
use reqwest::StatusCode;

#[tokio::test]
async fn health_endpoint_responds_over_tcp() -> Result<()> {
    let app = common::TestApp::new();
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    let router = app.router.clone();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    let client = reqwest::Client::new();
    let base_url = format!("http://127.0.0.1:{}", port);

    let res = client.get(format!("{}/health", base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], "memory");

    let res = client.get(format!("{}/api/posts", base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn root_lists_endpoints() -> Result<()> {
    let app = common::TestApp::new();
    let res = app.get("/", None).await?;
    assert_eq!(res.status, axum::http::StatusCode::OK);
    assert_eq!(res.body["data"]["name"], "Blog API");
    Ok(())
}
