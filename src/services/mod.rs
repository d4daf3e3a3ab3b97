pub mod accounts;
pub mod mailer;
pub mod posts;
pub mod taxonomy;

pub use accounts::{AccountService, IssuedToken};
pub use mailer::{LogMailer, Mailer, OutboxMailer};
pub use posts::{LoadedPost, PostService};
pub use taxonomy::TaxonomyService;
