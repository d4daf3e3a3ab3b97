#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use blog_api::auth::{password::hash_password, Permission, Role};
use blog_api::config::AppConfig;
use blog_api::database::models::{NewUser, TaxonomyKind, Term};
use blog_api::database::{MemoryStore, TaxonomyStore, UserStore};
use blog_api::services::OutboxMailer;
use blog_api::state::AppState;
use blog_api::storage::{FileStorage, MemoryDisk, StorageError};

pub const PASSWORD: &str = "password123";

/// 1x1 transparent PNG
pub const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49,
    0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00,
    0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Disk that stores normally but refuses every delete.
pub struct ReadOnlyDeletes {
    inner: Arc<MemoryDisk>,
}

#[async_trait]
impl FileStorage for ReadOnlyDeletes {
    fn disk(&self) -> &str {
        self.inner.disk()
    }

    async fn put(&self, path: &str, contents: Bytes) -> Result<(), StorageError> {
        self.inner.put(path, contents).await
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        Err(StorageError::Io {
            path: path.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only disk"),
        })
    }
}

/// In-process application over the memory store, disk and mailer.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub files: Arc<MemoryDisk>,
    pub outbox: Arc<OutboxMailer>,
}

/// A seeded account and a bearer token for it.
pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub token: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        let files = Arc::new(MemoryDisk::new());
        Self::build(files.clone(), files)
    }

    /// Uploads land in `files` as usual but deleting them always fails.
    pub fn with_failing_deletes() -> Self {
        let files = Arc::new(MemoryDisk::new());
        let disk = Arc::new(ReadOnlyDeletes { inner: files.clone() });
        Self::build(files, disk)
    }

    fn build(files: Arc<MemoryDisk>, disk: Arc<dyn FileStorage>) -> Self {
        let mut config = AppConfig::development();
        config.api.app_url = "http://localhost:3000".to_string();
        config.api.enable_request_logging = false;

        let store = Arc::new(MemoryStore::new());
        let outbox = Arc::new(OutboxMailer::new());
        let state = AppState::new(config, store.clone(), disk, outbox.clone());

        Self {
            router: blog_api::app(state.clone()),
            state,
            store,
            files,
            outbox,
        }
    }

    pub async fn user(&self, name: &str, roles: &[Role], grants: &[Permission]) -> Result<TestUser> {
        let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
        let user = self
            .store
            .insert_user(NewUser {
                name: name.to_string(),
                email: email.clone(),
                password_hash: hash_password(PASSWORD)?,
            })
            .await?;
        for role in roles {
            self.store.assign_role(user.id, *role).await?;
        }
        for permission in grants {
            self.store.grant_permission(user.id, *permission).await?;
        }
        let (token, _) = self.state.tokens.issue(user.id)?;
        Ok(TestUser { id: user.id, email, token })
    }

    pub async fn author(&self, name: &str) -> Result<TestUser> {
        self.user(name, &[], &[Permission::CreatePosts]).await
    }

    pub async fn term(&self, kind: TaxonomyKind, name: &str) -> Result<Term> {
        Ok(self.store.insert_term(kind, name, &blog_api::slug::slugify(name)).await?)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<TestResponse> {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Result<TestResponse> {
        self.send(Method::DELETE, uri, token, None).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put_json(&self, uri: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.send(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<TestResponse> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        self.dispatch(request).await
    }

    /// Sends `body` verbatim with the given content type.
    pub async fn raw(&self, method: Method, uri: &str, token: &str, content_type: &str, body: &[u8]) -> Result<TestResponse> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::ACCEPT, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_vec()))?;
        self.dispatch(request).await
    }

    /// `multipart/form-data` request; `files` are `(field, filename, bytes)`.
    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        token: &str,
        fields: &[(&str, &str)],
        files: &[(&str, &str, &[u8])],
    ) -> Result<TestResponse> {
        let boundary = "----blogapitestboundary";
        let mut body: Vec<u8> = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    boundary, name, value
                )
                .as_bytes(),
            );
        }
        for (name, filename, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    boundary, name, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))?;
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self.router.clone().oneshot(request).await.context("router failed")?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
        };
        Ok(TestResponse { status, body })
    }
}
