use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::{Identity, Permission, Role};
use crate::database::manager::DatabaseError;
use crate::database::models::{NewPost, NewUser, PasswordReset, Post, PostChanges, TaxonomyKind, Term, User};

/// One page of a listing, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn find_post(&self, id: i64) -> Result<Option<Post>, DatabaseError>;

    /// Posts ordered by id, plus the total row count.
    async fn list_posts(&self, page: PageRequest) -> Result<(Vec<Post>, u64), DatabaseError>;

    async fn insert_post(&self, post: NewPost) -> Result<Post, DatabaseError>;

    /// Fails with `NotFound` when the post vanished between lookup and write.
    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Post, DatabaseError>;

    /// Removes the post and its association rows. Returns whether a row was deleted.
    async fn delete_post(&self, id: i64) -> Result<bool, DatabaseError>;

    async fn related_ids(&self, post_id: i64, kind: TaxonomyKind) -> Result<Vec<i64>, DatabaseError>;

    /// Adds association rows; pairs already present are left as they are.
    async fn attach(&self, post_id: i64, kind: TaxonomyKind, ids: &[i64]) -> Result<(), DatabaseError>;

    async fn detach(&self, post_id: i64, kind: TaxonomyKind, ids: &[i64]) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    /// All terms of a kind, ordered by name.
    async fn list_terms(&self, kind: TaxonomyKind) -> Result<Vec<Term>, DatabaseError>;

    async fn find_term(&self, kind: TaxonomyKind, id: i64) -> Result<Option<Term>, DatabaseError>;

    async fn find_terms(&self, kind: TaxonomyKind, ids: &[i64]) -> Result<Vec<Term>, DatabaseError>;

    /// Subset of `ids` that reference an existing term. Read-only.
    async fn existing_term_ids(&self, kind: TaxonomyKind, ids: &[i64]) -> Result<Vec<i64>, DatabaseError>;

    async fn insert_term(&self, kind: TaxonomyKind, name: &str, slug: &str) -> Result<Term, DatabaseError>;

    async fn update_term(&self, kind: TaxonomyKind, id: i64, name: &str, slug: &str) -> Result<Term, DatabaseError>;

    /// Removes the term and every association row pointing at it.
    async fn delete_term(&self, kind: TaxonomyKind, id: i64) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: i64) -> Result<Option<User>, DatabaseError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    /// Fails with `Conflict("email")` when the address is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError>;

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), DatabaseError>;

    async fn assign_role(&self, id: i64, role: Role) -> Result<(), DatabaseError>;

    async fn grant_permission(&self, id: i64, permission: Permission) -> Result<(), DatabaseError>;

    /// The user with roles and effective permissions resolved.
    async fn identity(&self, id: i64) -> Result<Option<Identity>, DatabaseError>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Replaces any outstanding reset for the same email.
    async fn put_password_reset(&self, reset: PasswordReset) -> Result<(), DatabaseError>;

    async fn find_password_reset(&self, email: &str) -> Result<Option<PasswordReset>, DatabaseError>;

    async fn delete_password_reset(&self, email: &str) -> Result<(), DatabaseError>;

    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), DatabaseError>;

    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, DatabaseError>;
}

/// Everything the service persists, behind one handle.
#[async_trait]
pub trait Store: PostStore + TaxonomyStore + UserStore + CredentialStore {
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}
