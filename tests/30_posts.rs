mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use blog_api::auth::{Permission, Role};
use blog_api::database::models::TaxonomyKind;
use common::{TestApp, TestUser, PNG};

async fn create_post(app: &TestApp, user: &TestUser, body: Value) -> Result<i64> {
    let res = app.post_json("/posts", Some(&user.token), body).await?;
    assert_eq!(res.status, StatusCode::CREATED, "create failed: {}", res.body);
    Ok(res.body["data"]["id"].as_i64().unwrap_or_default())
}

fn ids(terms: &Value) -> Vec<i64> {
    let mut ids: Vec<i64> = terms
        .as_array()
        .map(|items| items.iter().filter_map(|t| t["id"].as_i64()).collect())
        .unwrap_or_default();
    ids.sort();
    ids
}

#[tokio::test]
async fn create_post_with_relations() -> Result<()> {
    let app = TestApp::new();
    let author = app.author("Writer").await?;
    let news = app.term(TaxonomyKind::Category, "News").await?;
    let rust = app.term(TaxonomyKind::Tag, "Rust").await?;

    let res = app
        .post_json(
            "/posts",
            Some(&author.token),
            json!({
                "title": "Hello",
                "content": "World",
                "status": "published",
                "categories": [news.id],
                "tags": [rust.id, rust.id]
            }),
        )
        .await?;

    assert_eq!(res.status, StatusCode::CREATED);
    let data = &res.body["data"];
    assert_eq!(data["title"], "Hello");
    assert_eq!(data["status"], "published");
    assert_eq!(data["author"]["id"], author.id);
    assert_eq!(ids(&data["categories"]), vec![news.id]);
    assert_eq!(ids(&data["tags"]), vec![rust.id]);
    assert!(data["featured_image"].is_null());
    Ok(())
}

#[tokio::test]
async fn create_requires_permission() -> Result<()> {
    let app = TestApp::new();
    let reader = app.user("Reader", &[Role::Reader], &[]).await?;

    let res = app
        .post_json(
            "/posts",
            Some(&reader.token),
            json!({ "title": "Hello", "content": "World", "status": "draft" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["error"], "User does not have the right permissions.");

    // Reading stays open to any authenticated user
    let list = app.get("/posts", Some(&reader.token)).await?;
    assert_eq!(list.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn create_validation_errors() -> Result<()> {
    let app = TestApp::new();
    let author = app.author("Writer").await?;
    let rust = app.term(TaxonomyKind::Tag, "Rust").await?;

    let res = app
        .post_json(
            "/posts",
            Some(&author.token),
            json!({ "title": "", "status": "archived", "tags": [rust.id, 999] }),
        )
        .await?;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    let errors = &res.body["errors"];
    assert_eq!(errors["title"][0], "The title field is required.");
    assert_eq!(errors["content"][0], "The content field is required.");
    assert_eq!(errors["status"][0], "The selected status is invalid.");
    assert_eq!(errors["tags.1"][0], "The selected tags.1 is invalid.");

    let list = app.get("/posts", Some(&author.token)).await?;
    assert_eq!(list.body["meta"]["total"], 0);
    Ok(())
}

#[tokio::test]
async fn missing_post_is_not_found() -> Result<()> {
    let app = TestApp::new();
    let author = app.author("Writer").await?;

    assert_eq!(app.get("/posts/99999", Some(&author.token)).await?.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/posts/abc", Some(&author.token)).await?.status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.put_json("/posts/99999", Some(&author.token), json!({ "title": "x" })).await?.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(app.delete("/posts/99999", Some(&author.token)).await?.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn missing_post_is_not_found_before_the_body_is_read() -> Result<()> {
    let app = TestApp::new();
    let author = app.author("Writer").await?;

    let malformed = app
        .raw(Method::PUT, "/posts/99999", &author.token, "application/json", b"{\"title\": ")
        .await?;
    assert_eq!(malformed.status, StatusCode::NOT_FOUND);

    // The same body against an existing post is a client error
    let id = create_post(&app, &author, json!({ "title": "Real", "content": "Body", "status": "draft" })).await?;
    let res = app
        .raw(Method::PUT, &format!("/posts/{}", id), &author.token, "application/json", b"{\"title\": ")
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn blank_update_fields_are_rejected() -> Result<()> {
    let app = TestApp::new();
    let author = app.author("Writer").await?;
    let id = create_post(&app, &author, json!({ "title": "Kept", "content": "Body", "status": "draft" })).await?;
    let uri = format!("/posts/{}", id);

    let blank = app.put_json(&uri, Some(&author.token), json!({ "title": "", "content": "   " })).await?;
    assert_eq!(blank.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(blank.body["errors"]["title"][0], "The title field must be a string.");
    assert_eq!(blank.body["errors"]["content"][0], "The content field must be a string.");

    let status = app.put_json(&uri, Some(&author.token), json!({ "status": "" })).await?;
    assert_eq!(status.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(status.body["errors"]["status"][0], "The selected status is invalid.");

    let unchanged = app.get(&uri, Some(&author.token)).await?;
    assert_eq!(unchanged.body["data"]["title"], "Kept");
    assert_eq!(unchanged.body["data"]["content"], "Body");
    assert_eq!(unchanged.body["data"]["status"], "draft");
    Ok(())
}

#[tokio::test]
async fn owner_can_delete_without_blanket_permission() -> Result<()> {
    let app = TestApp::new();
    let author = app.author("Writer").await?;
    let id = create_post(&app, &author, json!({ "title": "Mine", "content": "Body", "status": "draft" })).await?;

    let res = app.delete(&format!("/posts/{}", id), Some(&author.token)).await?;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert!(res.body.is_null());

    let gone = app.get(&format!("/posts/{}", id), Some(&author.token)).await?;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn stranger_cannot_mutate() -> Result<()> {
    let app = TestApp::new();
    let owner = app.author("Owner").await?;
    let stranger = app.author("Stranger").await?;
    let id = create_post(&app, &owner, json!({ "title": "Mine", "content": "Body", "status": "draft" })).await?;
    let uri = format!("/posts/{}", id);

    let update = app.put_json(&uri, Some(&stranger.token), json!({ "title": "Hijacked" })).await?;
    assert_eq!(update.status, StatusCode::FORBIDDEN);
    assert_eq!(update.body["error"], "Unauthorized");

    // Ownership is checked before validation
    let invalid = app.put_json(&uri, Some(&stranger.token), json!({ "status": "bogus" })).await?;
    assert_eq!(invalid.status, StatusCode::FORBIDDEN);

    let delete = app.delete(&uri, Some(&stranger.token)).await?;
    assert_eq!(delete.status, StatusCode::FORBIDDEN);

    let unchanged = app.get(&uri, Some(&owner.token)).await?;
    assert_eq!(unchanged.body["data"]["title"], "Mine");
    Ok(())
}

#[tokio::test]
async fn blanket_permissions_override_ownership() -> Result<()> {
    let app = TestApp::new();
    let owner = app.author("Owner").await?;
    let editor = app.user("Editor", &[Role::Editor], &[]).await?;
    let id = create_post(&app, &owner, json!({ "title": "Draft", "content": "Body", "status": "draft" })).await?;
    let uri = format!("/posts/{}", id);

    let update = app.put_json(&uri, Some(&editor.token), json!({ "status": "published" })).await?;
    assert_eq!(update.status, StatusCode::OK);
    assert_eq!(update.body["data"]["status"], "published");
    assert_eq!(update.body["data"]["author"]["id"], owner.id);

    assert_eq!(app.delete(&uri, Some(&editor.token)).await?.status, StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn partial_update_keeps_untouched_fields() -> Result<()> {
    let app = TestApp::new();
    let author = app.author("Writer").await?;
    let news = app.term(TaxonomyKind::Category, "News").await?;
    let id = create_post(
        &app,
        &author,
        json!({ "title": "Before", "content": "Body", "status": "draft", "categories": [news.id] }),
    )
    .await?;

    let res = app
        .put_json(&format!("/posts/{}", id), Some(&author.token), json!({ "title": "After" }))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    let data = &res.body["data"];
    assert_eq!(data["title"], "After");
    assert_eq!(data["content"], "Body");
    assert_eq!(data["status"], "draft");
    assert_eq!(ids(&data["categories"]), vec![news.id]);
    Ok(())
}

#[tokio::test]
async fn update_syncs_associations() -> Result<()> {
    let app = TestApp::new();
    let author = app.author("Writer").await?;
    let a = app.term(TaxonomyKind::Tag, "Alpha").await?;
    let b = app.term(TaxonomyKind::Tag, "Beta").await?;
    let c = app.term(TaxonomyKind::Tag, "Gamma").await?;
    let id = create_post(
        &app,
        &author,
        json!({ "title": "Tagged", "content": "Body", "status": "draft", "tags": [a.id, b.id] }),
    )
    .await?;
    let uri = format!("/posts/{}", id);

    let res = app.put_json(&uri, Some(&author.token), json!({ "tags": [b.id, c.id] })).await?;
    assert_eq!(ids(&res.body["data"]["tags"]), vec![b.id, c.id]);

    let cleared = app.put_json(&uri, Some(&author.token), json!({ "tags": [] })).await?;
    assert_eq!(cleared.status, StatusCode::OK);
    assert_eq!(cleared.body["data"]["tags"], json!([]));
    Ok(())
}

#[tokio::test]
async fn multipart_upload_stores_featured_image() -> Result<()> {
    let app = TestApp::new();
    let author = app.author("Writer").await?;
    let news = app.term(TaxonomyKind::Category, "News").await?;
    let news_id = news.id.to_string();

    let res = app
        .multipart(
            Method::POST,
            "/api/posts",
            &author.token,
            &[("title", "Pictured"), ("content", "Body"), ("status", "published"), ("categories[]", news_id.as_str())],
            &[("featured_image", "photo.png", PNG)],
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);

    let url = res.body["data"]["featured_image"].as_str().unwrap_or_default().to_string();
    assert!(url.starts_with("http://localhost:3000/storage/posts/"), "{}", url);
    assert!(url.ends_with(".png"));
    assert_eq!(ids(&res.body["data"]["categories"]), vec![news.id]);

    let stored = app.files.paths().await;
    assert_eq!(stored.len(), 1);
    assert!(url.ends_with(&stored[0]));

    // Replacing the image removes the previous file
    let id = res.body["data"]["id"].as_i64().unwrap_or_default();
    let replaced = app
        .multipart(
            Method::PUT,
            &format!("/posts/{}", id),
            &author.token,
            &[],
            &[("featured_image", "other.png", PNG)],
        )
        .await?;
    assert_eq!(replaced.status, StatusCode::OK);
    let paths = app.files.paths().await;
    assert_eq!(paths.len(), 1);
    assert_ne!(paths[0], stored[0]);

    assert_eq!(app.delete(&format!("/posts/{}", id), Some(&author.token)).await?.status, StatusCode::NO_CONTENT);
    assert!(app.files.paths().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_file_deletes_do_not_fail_requests() -> Result<()> {
    let app = TestApp::with_failing_deletes();
    let author = app.author("Writer").await?;

    let created = app
        .multipart(
            Method::POST,
            "/posts",
            &author.token,
            &[("title", "Pictured"), ("content", "Body"), ("status", "draft")],
            &[("featured_image", "photo.png", PNG)],
        )
        .await?;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let id = created.body["data"]["id"].as_i64().unwrap_or_default();
    let first = created.body["data"]["featured_image"].as_str().unwrap_or_default().to_string();
    let uri = format!("/posts/{}", id);

    let replaced = app
        .multipart(Method::PUT, &uri, &author.token, &[], &[("featured_image", "other.png", PNG)])
        .await?;
    assert_eq!(replaced.status, StatusCode::OK, "{}", replaced.body);
    let second = replaced.body["data"]["featured_image"].as_str().unwrap_or_default().to_string();
    assert!(second.ends_with(".png"), "{}", second);
    assert_ne!(second, first);
    // The old file could not be removed, so both remain on the disk
    assert_eq!(app.files.paths().await.len(), 2);

    assert_eq!(app.delete(&uri, Some(&author.token)).await?.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri, Some(&author.token)).await?.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn non_image_upload_is_rejected() -> Result<()> {
    let app = TestApp::new();
    let author = app.author("Writer").await?;

    let res = app
        .multipart(
            Method::POST,
            "/posts",
            &author.token,
            &[("title", "Doc"), ("content", "Body"), ("status", "draft")],
            &[("featured_image", "notes.txt", b"plain text, not an image")],
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["errors"]["featured_image"][0], "The featured image field must be an image.");
    assert!(app.files.paths().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn index_paginates() -> Result<()> {
    let app = TestApp::new();
    let author = app.author("Writer").await?;
    for n in 0..3 {
        create_post(&app, &author, json!({ "title": format!("Post {}", n), "content": "Body", "status": "draft" })).await?;
    }

    let res = app.get("/posts?per_page=2&page=2", Some(&author.token)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(
        res.body["meta"],
        json!({ "current_page": 2, "last_page": 2, "per_page": 2, "total": 3 })
    );
    assert_eq!(res.body["data"][0]["author"]["name"], "Writer");
    // Ordered by id, so the last page holds the newest post
    assert_eq!(res.body["data"][0]["title"], "Post 2");
    Ok(())
}

#[tokio::test]
async fn direct_grant_enables_blanket_delete() -> Result<()> {
    let app = TestApp::new();
    let owner = app.author("Owner").await?;
    let moderator = app.user("Moderator", &[], &[Permission::DeletePosts]).await?;
    let id = create_post(&app, &owner, json!({ "title": "Spam", "content": "Body", "status": "published" })).await?;

    let res = app.delete(&format!("/posts/{}", id), Some(&moderator.token)).await?;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    Ok(())
}
