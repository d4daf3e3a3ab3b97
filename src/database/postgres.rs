use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::auth::{Identity, Permission, PermissionSet, Role};
use crate::database::manager::DatabaseError;
use crate::database::models::{NewPost, NewUser, PasswordReset, Post, PostChanges, TaxonomyKind, Term, User};
use crate::database::store::{CredentialStore, PageRequest, PostStore, Store, TaxonomyStore, UserStore};

const POST_COLUMNS: &str = "id, user_id, title, content, featured_image, status, created_at, updated_at";
const TERM_COLUMNS: &str = "id, name, slug, created_at, updated_at";
const USER_COLUMNS: &str = "id, name, email, password, created_at, updated_at";

/// PostgreSQL-backed store. Schema lives in `sql/schema.sql`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn post_from_row(row: &PgRow) -> Result<Post, DatabaseError> {
    let status: String = row.try_get("status")?;
    Ok(Post {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        featured_image: row.try_get("featured_image")?,
        status: status.parse().map_err(DatabaseError::Corrupt)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Unique violations become `Conflict(field)`, everything else passes through.
fn unique_violation(err: sqlx::Error, field: &str) -> DatabaseError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            return DatabaseError::Conflict(field.to_string());
        }
    }
    DatabaseError::Sqlx(err)
}

#[async_trait]
impl PostStore for PgStore {
    async fn find_post(&self, id: i64) -> Result<Option<Post>, DatabaseError> {
        let sql = format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(post_from_row).transpose()
    }

    async fn list_posts(&self, page: PageRequest) -> Result<(Vec<Post>, u64), DatabaseError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!("SELECT {} FROM posts ORDER BY id LIMIT $1 OFFSET $2", POST_COLUMNS);
        let rows = sqlx::query(&sql)
            .bind(i64::from(page.per_page))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        let posts = rows.iter().map(post_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok((posts, total.max(0) as u64))
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post, DatabaseError> {
        let sql = format!(
            "INSERT INTO posts (user_id, title, content, featured_image, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            POST_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(post.user_id)
            .bind(&post.title)
            .bind(&post.content)
            .bind(&post.featured_image)
            .bind(post.status.as_str())
            .fetch_one(&self.pool)
            .await?;
        post_from_row(&row)
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Post, DatabaseError> {
        // user_id is deliberately absent: ownership is fixed at insert
        let sql = format!(
            "UPDATE posts SET \
                title = COALESCE($2, title), \
                content = COALESCE($3, content), \
                featured_image = COALESCE($4, featured_image), \
                status = COALESCE($5, status), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            POST_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(changes.title)
            .bind(changes.content)
            .bind(changes.featured_image)
            .bind(changes.status.map(|s| s.as_str()))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => post_from_row(&row),
            None => Err(DatabaseError::NotFound(format!("Post {} not found", id))),
        }
    }

    async fn delete_post(&self, id: i64) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        for kind in [TaxonomyKind::Category, TaxonomyKind::Tag] {
            let sql = format!("DELETE FROM {} WHERE post_id = $1", kind.pivot_table());
            sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
        }
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn related_ids(&self, post_id: i64, kind: TaxonomyKind) -> Result<Vec<i64>, DatabaseError> {
        let sql = format!(
            "SELECT {col} FROM {pivot} WHERE post_id = $1 ORDER BY {col}",
            col = kind.pivot_column(),
            pivot = kind.pivot_table()
        );
        let ids = sqlx::query_scalar(&sql).bind(post_id).fetch_all(&self.pool).await?;
        Ok(ids)
    }

    async fn attach(&self, post_id: i64, kind: TaxonomyKind, ids: &[i64]) -> Result<(), DatabaseError> {
        if ids.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "INSERT INTO {pivot} (post_id, {col}) SELECT $1, UNNEST($2::bigint[]) ON CONFLICT DO NOTHING",
            col = kind.pivot_column(),
            pivot = kind.pivot_table()
        );
        sqlx::query(&sql)
            .bind(post_id)
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn detach(&self, post_id: i64, kind: TaxonomyKind, ids: &[i64]) -> Result<(), DatabaseError> {
        if ids.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "DELETE FROM {pivot} WHERE post_id = $1 AND {col} = ANY($2)",
            col = kind.pivot_column(),
            pivot = kind.pivot_table()
        );
        sqlx::query(&sql)
            .bind(post_id)
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TaxonomyStore for PgStore {
    async fn list_terms(&self, kind: TaxonomyKind) -> Result<Vec<Term>, DatabaseError> {
        let sql = format!("SELECT {} FROM {} ORDER BY name, id", TERM_COLUMNS, kind.table());
        let terms = sqlx::query_as::<_, Term>(&sql).fetch_all(&self.pool).await?;
        Ok(terms)
    }

    async fn find_term(&self, kind: TaxonomyKind, id: i64) -> Result<Option<Term>, DatabaseError> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", TERM_COLUMNS, kind.table());
        let term = sqlx::query_as::<_, Term>(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(term)
    }

    async fn find_terms(&self, kind: TaxonomyKind, ids: &[i64]) -> Result<Vec<Term>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!("SELECT {} FROM {} WHERE id = ANY($1) ORDER BY id", TERM_COLUMNS, kind.table());
        let terms = sqlx::query_as::<_, Term>(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(terms)
    }

    async fn existing_term_ids(&self, kind: TaxonomyKind, ids: &[i64]) -> Result<Vec<i64>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!("SELECT id FROM {} WHERE id = ANY($1)", kind.table());
        let found = sqlx::query_scalar(&sql).bind(ids.to_vec()).fetch_all(&self.pool).await?;
        Ok(found)
    }

    async fn insert_term(&self, kind: TaxonomyKind, name: &str, slug: &str) -> Result<Term, DatabaseError> {
        let sql = format!(
            "INSERT INTO {} (name, slug) VALUES ($1, $2) RETURNING {}",
            kind.table(),
            TERM_COLUMNS
        );
        let term = sqlx::query_as::<_, Term>(&sql)
            .bind(name)
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
        Ok(term)
    }

    async fn update_term(&self, kind: TaxonomyKind, id: i64, name: &str, slug: &str) -> Result<Term, DatabaseError> {
        let sql = format!(
            "UPDATE {} SET name = $2, slug = $3, updated_at = NOW() WHERE id = $1 RETURNING {}",
            kind.table(),
            TERM_COLUMNS
        );
        sqlx::query_as::<_, Term>(&sql)
            .bind(id)
            .bind(name)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {} not found", kind.label(), id)))
    }

    async fn delete_term(&self, kind: TaxonomyKind, id: i64) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!("DELETE FROM {} WHERE {} = $1", kind.pivot_table(), kind.pivot_column());
        sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
        let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
        let result = sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE lower(email) = lower($1)", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let sql = format!(
            "INSERT INTO users (name, email, password) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "email"))
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE users SET password = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }

    async fn assign_role(&self, id: i64, role: Role) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn grant_permission(&self, id: i64, permission: Permission) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO user_permissions (user_id, permission) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(id)
            .bind(permission.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn identity(&self, id: i64) -> Result<Option<Identity>, DatabaseError> {
        let Some(user) = self.find_user(id).await? else {
            return Ok(None);
        };

        let role_names: Vec<String> = sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        let permission_names: Vec<String> =
            sqlx::query_scalar("SELECT permission FROM user_permissions WHERE user_id = $1")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;

        // Unknown names come from rows written by other tooling; skip them rather than lock the user out
        let roles = role_names
            .iter()
            .filter_map(|name| match name.parse::<Role>() {
                Ok(role) => Some(role),
                Err(e) => {
                    tracing::warn!(user_id = id, "ignoring role: {}", e);
                    None
                }
            })
            .collect();
        let direct: PermissionSet = permission_names
            .iter()
            .filter_map(|name| match name.parse::<Permission>() {
                Ok(permission) => Some(permission),
                Err(e) => {
                    tracing::warn!(user_id = id, "ignoring permission: {}", e);
                    None
                }
            })
            .collect();

        Ok(Some(Identity::new(user.id, user.name, user.email, roles, direct)))
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn put_password_reset(&self, reset: PasswordReset) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO password_reset_tokens (email, token_hash, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT (email) DO UPDATE SET token_hash = EXCLUDED.token_hash, created_at = EXCLUDED.created_at",
        )
        .bind(&reset.email)
        .bind(&reset.token_hash)
        .bind(reset.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_password_reset(&self, email: &str) -> Result<Option<PasswordReset>, DatabaseError> {
        let reset = sqlx::query_as::<_, PasswordReset>(
            "SELECT email, token_hash, created_at FROM password_reset_tokens WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reset)
    }

    async fn delete_password_reset(&self, email: &str) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM password_reset_tokens WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;
        sqlx::query("INSERT INTO revoked_tokens (jti, expires_at) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(jti)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, DatabaseError> {
        let revoked: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE jti = $1)")
            .bind(jti)
            .fetch_one(&self.pool)
            .await?;
        Ok(revoked)
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
