use std::sync::Arc;

use crate::database::models::{TaxonomyKind, Term};
use crate::database::Store;
use crate::error::ApiError;
use crate::slug::slugify;
use crate::validation::{rules, validate, RawInput};

/// Category and tag maintenance. Both kinds share this one implementation.
#[derive(Clone)]
pub struct TaxonomyService {
    store: Arc<dyn Store>,
    kind: TaxonomyKind,
}

impl TaxonomyService {
    pub fn new(store: Arc<dyn Store>, kind: TaxonomyKind) -> Self {
        Self { store, kind }
    }

    pub async fn list(&self) -> Result<Vec<Term>, ApiError> {
        Ok(self.store.list_terms(self.kind).await?)
    }

    pub async fn show(&self, id: i64) -> Result<Term, ApiError> {
        self.find(id).await
    }

    pub async fn create(&self, input: RawInput) -> Result<Term, ApiError> {
        let name = self.validated_name(input).await?;
        let term = self.store.insert_term(self.kind, &name, &slugify(&name)).await?;
        tracing::info!(kind = self.kind.label(), id = term.id, slug = %term.slug, "term created");
        Ok(term)
    }

    /// The slug always follows the current name.
    /// Renames a term already resolved by [`Self::show`].
    pub async fn update(&self, term: Term, input: RawInput) -> Result<Term, ApiError> {
        let name = self.validated_name(input).await?;
        let term = self.store.update_term(self.kind, term.id, &name, &slugify(&name)).await?;
        tracing::info!(kind = self.kind.label(), id = term.id, slug = %term.slug, "term updated");
        Ok(term)
    }

    pub async fn destroy(&self, id: i64) -> Result<(), ApiError> {
        let term = self.find(id).await?;
        self.store.delete_term(self.kind, term.id).await?;
        tracing::info!(kind = self.kind.label(), id = term.id, "term deleted");
        Ok(())
    }

    async fn find(&self, id: i64) -> Result<Term, ApiError> {
        self.store.find_term(self.kind, id).await?.ok_or_else(|| {
            tracing::warn!(kind = self.kind.label(), id, "term not found");
            ApiError::not_found(format!("{} {} not found", self.kind.label(), id))
        })
    }

    async fn validated_name(&self, input: RawInput) -> Result<String, ApiError> {
        let validated = validate(rules::TERM, input, &*self.store).await?;
        Ok(validated.string("name").unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use serde_json::json;

    fn service(kind: TaxonomyKind) -> TaxonomyService {
        TaxonomyService::new(Arc::new(MemoryStore::new()), kind)
    }

    fn input(value: serde_json::Value) -> RawInput {
        RawInput::from_json(value).unwrap()
    }

    #[tokio::test]
    async fn rename_regenerates_slug() {
        let categories = service(TaxonomyKind::Category);
        let created = categories.create(input(json!({ "name": "Science Tech" }))).await.unwrap();
        assert_eq!(created.slug, "science-tech");

        let renamed = categories
            .update(created.clone(), input(json!({ "name": "Space & Time" })))
            .await
            .unwrap();
        assert_eq!(renamed.id, created.id);
        assert_eq!(renamed.slug, "space-time");
    }

    #[tokio::test]
    async fn missing_term_is_not_found_before_validation() {
        let tags = service(TaxonomyKind::Tag);
        assert_eq!(tags.show(99).await.unwrap_err().status_code(), 404);
        assert_eq!(tags.destroy(99).await.unwrap_err().status_code(), 404);
    }

    #[tokio::test]
    async fn name_is_required() {
        let tags = service(TaxonomyKind::Tag);
        let err = tags.create(input(json!({ "name": "" }))).await.unwrap_err();
        assert_eq!(err.status_code(), 422);
    }
}
