use std::collections::BTreeSet;
use std::sync::Arc;

use crate::auth::{ensure_can_mutate, Identity, Permission};
use crate::database::models::{NewPost, Post, PostChanges, PostStatus, TaxonomyKind, Term, User};
use crate::database::{DatabaseError, PageRequest, Store};
use crate::error::{ApiError, FieldErrors};
use crate::storage::{FileStorage, UploadedFile};
use crate::validation::{rules, validate, RawInput, Validated};

/// Directory on the disk that holds featured images.
const UPLOAD_DIRECTORY: &str = "posts";

/// A post with the relations the response needs. `None` means not loaded.
#[derive(Debug, Clone)]
pub struct LoadedPost {
    pub post: Post,
    pub author: Option<User>,
    pub categories: Option<Vec<Term>>,
    pub tags: Option<Vec<Term>>,
}

/// Association rows to drop and to add so `current` becomes `desired`.
pub fn association_diff(current: &[i64], desired: &[i64]) -> (Vec<i64>, Vec<i64>) {
    let current: BTreeSet<i64> = current.iter().copied().collect();
    let desired: BTreeSet<i64> = desired.iter().copied().collect();
    let remove = current.difference(&desired).copied().collect();
    let add = desired.difference(&current).copied().collect();
    (remove, add)
}

/// Post create/update/destroy pipeline: validation, ownership, file storage,
/// persistence, association sync.
#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn Store>,
    files: Arc<dyn FileStorage>,
}

impl PostService {
    pub fn new(store: Arc<dyn Store>, files: Arc<dyn FileStorage>) -> Self {
        Self { store, files }
    }

    pub async fn index(&self, page: PageRequest) -> Result<(Vec<LoadedPost>, u64), ApiError> {
        let (posts, total) = self.store.list_posts(page).await?;
        let loaded = futures::future::try_join_all(posts.into_iter().map(|post| self.load(post))).await?;
        Ok((loaded, total))
    }

    pub async fn show(&self, id: i64) -> Result<LoadedPost, ApiError> {
        let post = self.find(id).await?;
        self.load(post).await
    }

    pub async fn create(&self, actor: &Identity, input: RawInput) -> Result<LoadedPost, ApiError> {
        let mut validated = validate(rules::POST_CREATE, input, &*self.store).await?;

        let featured_image = match validated.take_file("featured_image") {
            Some(file) => Some(self.store_upload(&file).await?),
            None => None,
        };

        let new_post = NewPost {
            user_id: actor.id,
            title: validated.string("title").unwrap_or_default(),
            content: validated.string("content").unwrap_or_default(),
            featured_image,
            status: status(&validated)?.unwrap_or(PostStatus::Draft),
        };
        let post = self.store.insert_post(new_post).await?;

        for kind in [TaxonomyKind::Category, TaxonomyKind::Tag] {
            if let Some(ids) = validated.ids(field_for(kind)) {
                let ids: Vec<i64> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
                self.store.attach(post.id, kind, &ids).await?;
            }
        }

        tracing::info!(post_id = post.id, user_id = actor.id, "post created");
        self.load(post).await
    }

    /// Resolves a post the actor may edit: 404 first, then the ownership guard.
    pub async fn editable(&self, actor: &Identity, id: i64) -> Result<Post, ApiError> {
        let post = self.find(id).await?;
        ensure_can_mutate(actor, &post, Permission::EditPosts)?;
        Ok(post)
    }

    /// Applies a partial update to a post already resolved by [`Self::editable`].
    pub async fn update(&self, actor: &Identity, post: Post, input: RawInput) -> Result<LoadedPost, ApiError> {
        let mut validated = validate(rules::POST_UPDATE, input, &*self.store).await?;

        let mut changes = PostChanges {
            title: validated.string("title"),
            content: validated.string("content"),
            featured_image: None,
            status: status(&validated)?,
        };

        if let Some(file) = validated.take_file("featured_image") {
            if let Some(previous) = &post.featured_image {
                self.discard_file(previous).await;
            }
            changes.featured_image = Some(self.store_upload(&file).await?);
        }

        let post = if changes.is_empty() {
            post
        } else {
            self.store.update_post(post.id, changes).await?
        };

        for kind in [TaxonomyKind::Category, TaxonomyKind::Tag] {
            if let Some(desired) = validated.ids(field_for(kind)) {
                self.sync(post.id, kind, &desired).await?;
            }
        }

        tracing::info!(post_id = post.id, user_id = actor.id, "post updated");
        self.load(post).await
    }

    pub async fn destroy(&self, actor: &Identity, id: i64) -> Result<(), ApiError> {
        let post = self.find(id).await?;
        ensure_can_mutate(actor, &post, Permission::DeletePosts)?;

        if let Some(path) = &post.featured_image {
            self.discard_file(path).await;
        }

        if !self.store.delete_post(post.id).await? {
            tracing::debug!(post_id = post.id, "post already gone at delete time");
        }

        tracing::info!(post_id = post.id, user_id = actor.id, "post deleted");
        Ok(())
    }

    async fn find(&self, id: i64) -> Result<Post, ApiError> {
        self.store.find_post(id).await?.ok_or_else(|| {
            tracing::warn!(post_id = id, "post not found");
            ApiError::not_found(format!("Post {} not found", id))
        })
    }

    async fn store_upload(&self, file: &UploadedFile) -> Result<String, ApiError> {
        let path = file.hash_name(UPLOAD_DIRECTORY);
        self.files.put(&path, file.bytes.clone()).await?;
        tracing::debug!(disk = self.files.disk(), path = %path, "stored featured image");
        Ok(path)
    }

    /// Best-effort removal of a stored file; failures are logged, not returned.
    async fn discard_file(&self, path: &str) {
        if let Err(e) = self.files.delete(path).await {
            tracing::warn!(disk = self.files.disk(), path, error = %e, "failed to delete stored file");
        }
    }

    async fn sync(&self, post_id: i64, kind: TaxonomyKind, desired: &[i64]) -> Result<(), ApiError> {
        let current = self.store.related_ids(post_id, kind).await?;
        let (remove, add) = association_diff(&current, desired);
        self.store.detach(post_id, kind, &remove).await?;
        self.store.attach(post_id, kind, &add).await?;
        tracing::debug!(post_id, kind = kind.label(), removed = remove.len(), added = add.len(), "synced associations");
        Ok(())
    }

    async fn terms_of(&self, post_id: i64, kind: TaxonomyKind) -> Result<Vec<Term>, DatabaseError> {
        let ids = self.store.related_ids(post_id, kind).await?;
        self.store.find_terms(kind, &ids).await
    }

    async fn load(&self, post: Post) -> Result<LoadedPost, ApiError> {
        let (author, categories, tags) = futures::try_join!(
            self.store.find_user(post.user_id),
            self.terms_of(post.id, TaxonomyKind::Category),
            self.terms_of(post.id, TaxonomyKind::Tag),
        )?;
        Ok(LoadedPost {
            post,
            author,
            categories: Some(categories),
            tags: Some(tags),
        })
    }
}

fn field_for(kind: TaxonomyKind) -> &'static str {
    match kind {
        TaxonomyKind::Category => "categories",
        TaxonomyKind::Tag => "tags",
    }
}

fn status(validated: &Validated) -> Result<Option<PostStatus>, ApiError> {
    validated
        .str("status")
        .map(str::parse::<PostStatus>)
        .transpose()
        .map_err(|reason| {
            tracing::debug!("{}", reason);
            ApiError::validation(FieldErrors::from([(
                "status".to_string(),
                vec!["The selected status is invalid.".to_string()],
            )]))
        })
}
