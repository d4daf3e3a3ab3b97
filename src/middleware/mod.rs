pub mod auth;
pub mod response;

pub use auth::{require_auth, require_create_posts, require_permission, AuthUser};
pub use response::{ApiResponse, ApiResult};
