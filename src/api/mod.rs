pub mod format;
pub mod payload;

pub use format::{IdentityResource, PageMeta, PostResource, TermResource, UserResource};
pub use payload::Payload;
