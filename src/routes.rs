use axum::{
    extract::{DefaultBodyLimit, Extension},
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::database::models::TaxonomyKind;
use crate::handlers::{self, protected, public};
use crate::middleware::{require_auth, require_create_posts};
use crate::state::AppState;

/// The full application. Resource routes answer both bare and under `/api`.
pub fn app(state: AppState) -> Router {
    let api = public_routes().merge(protected_routes(state.clone()));

    let mut router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(api.clone())
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes));

    if state.config.security.enable_cors {
        router = router.layer(cors_layer(&state.config.security));
    }
    if state.config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(public::auth::register))
        .route("/login", post(public::auth::login))
        .route("/password/forgot", post(public::password::forgot))
        .route("/password/reset", post(public::password::reset))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::{posts, user};

    Router::new()
        .route("/user", get(user::show))
        .route("/logout", post(user::logout))
        .route(
            "/posts",
            get(posts::index).merge(post(posts::store).route_layer(middleware::from_fn(require_create_posts))),
        )
        .route(
            "/posts/:id",
            get(posts::show).put(posts::update).patch(posts::update).delete(posts::destroy),
        )
        .nest("/categories", taxonomy_routes(TaxonomyKind::Category))
        .nest("/tags", taxonomy_routes(TaxonomyKind::Tag))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn taxonomy_routes(kind: TaxonomyKind) -> Router<AppState> {
    use protected::taxonomy;

    Router::new()
        .route("/", get(taxonomy::index).post(taxonomy::store))
        .route(
            "/:id",
            get(taxonomy::show)
                .put(taxonomy::update)
                .patch(taxonomy::update)
                .delete(taxonomy::destroy),
        )
        .layer(Extension(kind))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
