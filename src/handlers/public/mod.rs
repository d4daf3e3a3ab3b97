// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition and password recovery. Everything else lives under
// `protected` and requires a bearer token.

pub mod auth;
pub mod password;
