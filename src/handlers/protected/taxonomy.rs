// handlers/protected/taxonomy.rs - /categories and /tags resources
//
// Both taxonomies share these handlers; the router tags each nest with an
// `Extension<TaxonomyKind>`.

use axum::extract::{Extension, FromRequest, Path, Request, State};

use super::parse_id;
use crate::api::{Payload, TermResource};
use crate::database::models::TaxonomyKind;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /{categories,tags}
pub async fn index(State(state): State<AppState>, Extension(kind): Extension<TaxonomyKind>) -> ApiResult<Vec<TermResource>> {
    let terms = state.taxonomy(kind).list().await?;
    Ok(ApiResponse::success(terms.iter().map(TermResource::from).collect()))
}

/// POST /{categories,tags} - slug derived from the name
pub async fn store(
    State(state): State<AppState>,
    Extension(kind): Extension<TaxonomyKind>,
    Payload(input): Payload,
) -> ApiResult<TermResource> {
    let term = state.taxonomy(kind).create(input).await?;
    Ok(ApiResponse::created(TermResource::from(&term)))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(kind): Extension<TaxonomyKind>,
    Path(id): Path<String>,
) -> ApiResult<TermResource> {
    let term = state.taxonomy(kind).show(parse_id(&id)?).await?;
    Ok(ApiResponse::success(TermResource::from(&term)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(kind): Extension<TaxonomyKind>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult<TermResource> {
    let terms = state.taxonomy(kind);
    let term = terms.show(parse_id(&id)?).await?;
    let Payload(input) = Payload::from_request(request, &state).await?;
    let term = terms.update(term, input).await?;
    Ok(ApiResponse::success(TermResource::from(&term)))
}

/// DELETE /{categories,tags}/:id - detaches the term from every post
pub async fn destroy(
    State(state): State<AppState>,
    Extension(kind): Extension<TaxonomyKind>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.taxonomy(kind).destroy(parse_id(&id)?).await?;
    Ok(ApiResponse::no_content())
}
