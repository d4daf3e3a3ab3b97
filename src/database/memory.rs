use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{Identity, Permission, PermissionSet, Role};
use crate::database::manager::DatabaseError;
use crate::database::models::{NewPost, NewUser, PasswordReset, Post, PostChanges, TaxonomyKind, Term, User};
use crate::database::store::{CredentialStore, PageRequest, PostStore, Store, TaxonomyStore, UserStore};

#[derive(Default)]
struct Tables {
    next_id: HashMap<&'static str, i64>,
    users: BTreeMap<i64, User>,
    roles: BTreeMap<i64, Vec<Role>>,
    grants: BTreeMap<i64, PermissionSet>,
    posts: BTreeMap<i64, Post>,
    terms: HashMap<TaxonomyKind, BTreeMap<i64, Term>>,
    /// (post_id, term_id) per taxonomy
    pivots: HashMap<TaxonomyKind, BTreeSet<(i64, i64)>>,
    resets: HashMap<String, PasswordReset>,
    revoked: HashMap<Uuid, DateTime<Utc>>,
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> i64 {
        let id = self.next_id.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn terms(&self, kind: TaxonomyKind) -> impl Iterator<Item = &Term> {
        self.terms.get(&kind).into_iter().flat_map(|t| t.values())
    }

    fn pivot(&mut self, kind: TaxonomyKind) -> &mut BTreeSet<(i64, i64)> {
        self.pivots.entry(kind).or_default()
    }
}

/// Store kept entirely in process memory. Used when no database is configured
/// and by the test suite.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn find_post(&self, id: i64) -> Result<Option<Post>, DatabaseError> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn list_posts(&self, page: PageRequest) -> Result<(Vec<Post>, u64), DatabaseError> {
        let tables = self.tables.read().await;
        let total = tables.posts.len() as u64;
        let posts = tables
            .posts
            .values()
            .skip(page.offset() as usize)
            .take(page.per_page as usize)
            .cloned()
            .collect();
        Ok((posts, total))
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post, DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let post = Post {
            id: tables.next_id("posts"),
            user_id: post.user_id,
            title: post.title,
            content: post.content,
            featured_image: post.featured_image,
            status: post.status,
            created_at: now,
            updated_at: now,
        };
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Post, DatabaseError> {
        let mut tables = self.tables.write().await;
        let post = tables
            .posts
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(format!("Post {} not found", id)))?;
        changes.apply(post);
        post.updated_at = Utc::now();
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        for pivot in tables.pivots.values_mut() {
            pivot.retain(|(post_id, _)| *post_id != id);
        }
        Ok(tables.posts.remove(&id).is_some())
    }

    async fn related_ids(&self, post_id: i64, kind: TaxonomyKind) -> Result<Vec<i64>, DatabaseError> {
        let tables = self.tables.read().await;
        let ids = tables
            .pivots
            .get(&kind)
            .map(|pivot| {
                pivot
                    .range((post_id, i64::MIN)..=(post_id, i64::MAX))
                    .map(|(_, term_id)| *term_id)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    async fn attach(&self, post_id: i64, kind: TaxonomyKind, ids: &[i64]) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let pivot = tables.pivot(kind);
        pivot.extend(ids.iter().map(|term_id| (post_id, *term_id)));
        Ok(())
    }

    async fn detach(&self, post_id: i64, kind: TaxonomyKind, ids: &[i64]) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let pivot = tables.pivot(kind);
        for term_id in ids {
            pivot.remove(&(post_id, *term_id));
        }
        Ok(())
    }
}

#[async_trait]
impl TaxonomyStore for MemoryStore {
    async fn list_terms(&self, kind: TaxonomyKind) -> Result<Vec<Term>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut terms: Vec<Term> = tables.terms(kind).cloned().collect();
        terms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(terms)
    }

    async fn find_term(&self, kind: TaxonomyKind, id: i64) -> Result<Option<Term>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.terms.get(&kind).and_then(|t| t.get(&id)).cloned())
    }

    async fn find_terms(&self, kind: TaxonomyKind, ids: &[i64]) -> Result<Vec<Term>, DatabaseError> {
        let wanted: BTreeSet<i64> = ids.iter().copied().collect();
        let tables = self.tables.read().await;
        Ok(tables.terms(kind).filter(|t| wanted.contains(&t.id)).cloned().collect())
    }

    async fn existing_term_ids(&self, kind: TaxonomyKind, ids: &[i64]) -> Result<Vec<i64>, DatabaseError> {
        let tables = self.tables.read().await;
        let Some(terms) = tables.terms.get(&kind) else {
            return Ok(vec![]);
        };
        Ok(ids.iter().copied().filter(|id| terms.contains_key(id)).collect())
    }

    async fn insert_term(&self, kind: TaxonomyKind, name: &str, slug: &str) -> Result<Term, DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let term = Term {
            id: tables.next_id(kind.table()),
            name: name.to_string(),
            slug: slug.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.terms.entry(kind).or_default().insert(term.id, term.clone());
        Ok(term)
    }

    async fn update_term(&self, kind: TaxonomyKind, id: i64, name: &str, slug: &str) -> Result<Term, DatabaseError> {
        let mut tables = self.tables.write().await;
        let term = tables
            .terms
            .get_mut(&kind)
            .and_then(|t| t.get_mut(&id))
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {} not found", kind.label(), id)))?;
        term.name = name.to_string();
        term.slug = slug.to_string();
        term.updated_at = Utc::now();
        Ok(term.clone())
    }

    async fn delete_term(&self, kind: TaxonomyKind, id: i64) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.pivot(kind).retain(|(_, term_id)| *term_id != id);
        Ok(tables
            .terms
            .get_mut(&kind)
            .map(|t| t.remove(&id).is_some())
            .unwrap_or(false))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(DatabaseError::Conflict("email".to_string()));
        }
        let now = Utc::now();
        let user = User {
            id: tables.next_id("users"),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(format!("User {} not found", id)))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn assign_role(&self, id: i64, role: Role) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let roles = tables.roles.entry(id).or_default();
        if !roles.contains(&role) {
            roles.push(role);
        }
        Ok(())
    }

    async fn grant_permission(&self, id: i64, permission: Permission) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.grants.entry(id).or_default().insert(permission);
        Ok(())
    }

    async fn identity(&self, id: i64) -> Result<Option<Identity>, DatabaseError> {
        let tables = self.tables.read().await;
        let Some(user) = tables.users.get(&id) else {
            return Ok(None);
        };
        let roles = tables.roles.get(&id).cloned().unwrap_or_default();
        let direct = tables.grants.get(&id).copied().unwrap_or_default();
        Ok(Some(Identity::new(user.id, user.name.clone(), user.email.clone(), roles, direct)))
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn put_password_reset(&self, reset: PasswordReset) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.resets.insert(reset.email.clone(), reset);
        Ok(())
    }

    async fn find_password_reset(&self, email: &str) -> Result<Option<PasswordReset>, DatabaseError> {
        Ok(self.tables.read().await.resets.get(email).cloned())
    }

    async fn delete_password_reset(&self, email: &str) -> Result<(), DatabaseError> {
        self.tables.write().await.resets.remove(email);
        Ok(())
    }

    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        tables.revoked.retain(|_, exp| *exp >= now);
        tables.revoked.insert(jti, expires_at);
        Ok(())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.tables.read().await.revoked.contains_key(&jti))
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
