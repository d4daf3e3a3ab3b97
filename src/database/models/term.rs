use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The two flat taxonomies a post can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxonomyKind {
    Category,
    Tag,
}

impl TaxonomyKind {
    pub fn table(&self) -> &'static str {
        match self {
            TaxonomyKind::Category => "categories",
            TaxonomyKind::Tag => "tags",
        }
    }

    /// Join table between posts and this taxonomy
    pub fn pivot_table(&self) -> &'static str {
        match self {
            TaxonomyKind::Category => "category_post",
            TaxonomyKind::Tag => "post_tag",
        }
    }

    pub fn pivot_column(&self) -> &'static str {
        match self {
            TaxonomyKind::Category => "category_id",
            TaxonomyKind::Tag => "tag_id",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaxonomyKind::Category => "Category",
            TaxonomyKind::Tag => "Tag",
        }
    }
}

/// A category or a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Term {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
