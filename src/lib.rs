pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod slug;
pub mod state;
pub mod storage;
pub mod validation;

pub use error::ApiError;
pub use routes::app;
pub use state::AppState;
