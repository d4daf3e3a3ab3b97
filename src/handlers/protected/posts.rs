// handlers/protected/posts.rs - /posts resource

use axum::extract::{FromRequest, Path, Query, Request, State};
use serde::Deserialize;

use super::parse_id;
use crate::api::{PageMeta, Payload, PostResource};
use crate::database::PageRequest;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// `?page=N&per_page=M`; unparseable values fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl PageQuery {
    fn page_request(&self, default_per_page: u32, max_per_page: u32) -> PageRequest {
        let parse = |raw: &Option<String>| raw.as_deref().and_then(|v| v.trim().parse::<u32>().ok());
        let page = parse(&self.page).filter(|p| *p > 0).unwrap_or(1);
        let per_page = parse(&self.per_page)
            .unwrap_or(default_per_page)
            .clamp(1, max_per_page.max(1));
        PageRequest::new(page, per_page)
    }
}

/// GET /posts - paginated in id order, relations loaded
pub async fn index(State(state): State<AppState>, Query(query): Query<PageQuery>) -> ApiResult<Vec<PostResource>> {
    let api = &state.config.api;
    let page = query.page_request(api.default_per_page, api.max_per_page);

    let (posts, total) = state.posts().index(page).await?;
    let meta = PageMeta::new(page.page, page.per_page, total);

    Ok(ApiResponse::success(PostResource::collection(&posts, state.app_url())).with("meta", meta))
}

/// POST /posts - requires `create posts`; the caller becomes the author
pub async fn store(State(state): State<AppState>, auth: AuthUser, Payload(input): Payload) -> ApiResult<PostResource> {
    let loaded = state.posts().create(&auth.identity, input).await?;
    Ok(ApiResponse::created(PostResource::new(&loaded, state.app_url())))
}

/// GET /posts/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<PostResource> {
    let loaded = state.posts().show(parse_id(&id)?).await?;
    Ok(ApiResponse::success(PostResource::new(&loaded, state.app_url())))
}

/// PUT /posts/:id - partial update, owner or `edit all posts`
///
/// The body is read only after the post is found and the caller passes the
/// ownership guard, so a missing post answers 404 whatever the payload.
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult<PostResource> {
    let posts = state.posts();
    let post = posts.editable(&auth.identity, parse_id(&id)?).await?;
    let Payload(input) = Payload::from_request(request, &state).await?;
    let loaded = posts.update(&auth.identity, post, input).await?;
    Ok(ApiResponse::success(PostResource::new(&loaded, state.app_url())))
}

/// DELETE /posts/:id - owner or `delete all posts`
pub async fn destroy(State(state): State<AppState>, auth: AuthUser, Path(id): Path<String>) -> ApiResult<()> {
    state.posts().destroy(&auth.identity, parse_id(&id)?).await?;
    Ok(ApiResponse::no_content())
}
