pub mod post;
pub mod term;
pub mod user;

pub use post::{NewPost, Post, PostChanges, PostStatus};
pub use term::{TaxonomyKind, Term};
pub use user::{NewUser, PasswordReset, User};
