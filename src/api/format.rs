//! Response shaping: internal records to their external JSON representation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::Identity;
use crate::database::models::{PostStatus, Term, User};
use crate::services::LoadedPost;
use crate::storage::public_url;

/// `2024-05-01 13:45:00`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuthorSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TermSummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl From<&Term> for TermSummary {
    fn from(term: &Term) -> Self {
        Self {
            id: term.id,
            name: term.name.clone(),
            slug: term.slug.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostResource {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub featured_image: Option<String>,
    pub status: PostStatus,
    pub author: Option<AuthorSummary>,
    pub categories: Vec<TermSummary>,
    pub tags: Vec<TermSummary>,
    pub created_at: String,
    pub updated_at: String,
}

impl PostResource {
    pub fn new(loaded: &LoadedPost, app_url: &str) -> Self {
        let post = &loaded.post;
        let summaries = |terms: &Option<Vec<Term>>| -> Vec<TermSummary> {
            terms.iter().flatten().map(TermSummary::from).collect()
        };

        Self {
            id: post.id,
            title: post.title.clone(),
            content: post.content.clone(),
            featured_image: post.featured_image.as_deref().map(|path| public_url(app_url, path)),
            status: post.status,
            author: loaded.author.as_ref().map(AuthorSummary::from),
            categories: summaries(&loaded.categories),
            tags: summaries(&loaded.tags),
            created_at: format_timestamp(&post.created_at),
            updated_at: format_timestamp(&post.updated_at),
        }
    }

    pub fn collection(loaded: &[LoadedPost], app_url: &str) -> Vec<Self> {
        loaded.iter().map(|post| Self::new(post, app_url)).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TermResource {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Term> for TermResource {
    fn from(term: &Term) -> Self {
        Self {
            id: term.id,
            name: term.name.clone(),
            slug: term.slug.clone(),
            created_at: format_timestamp(&term.created_at),
            updated_at: format_timestamp(&term.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResource {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&User> for UserResource {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: format_timestamp(&user.created_at),
            updated_at: format_timestamp(&user.updated_at),
        }
    }
}

/// The acting user as returned by `GET /user`.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityResource {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub roles: Vec<&'static str>,
    pub permissions: Vec<&'static str>,
}

impl From<&Identity> for IdentityResource {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            name: identity.name.clone(),
            email: identity.email.clone(),
            roles: identity.roles.iter().map(|r| r.as_str()).collect(),
            permissions: identity.permissions.names(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageMeta {
    pub current_page: u32,
    pub last_page: u64,
    pub per_page: u32,
    pub total: u64,
}

impl PageMeta {
    pub fn new(current_page: u32, per_page: u32, total: u64) -> Self {
        let per_page = per_page.max(1);
        Self {
            current_page,
            last_page: total.div_ceil(u64::from(per_page)).max(1),
            per_page,
            total,
        }
    }
}
