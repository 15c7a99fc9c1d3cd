//! Content repository boundary
//!
//! The importer talks to the content store only through the traits defined
//! here. `sqlite` provides the bundled implementation.

use serde::{Deserialize, Serialize};

use crate::media::AssetRef;

pub mod sqlite;

/// Metadata key holding the business key used for deduplication.
pub const GROUP_ID: &str = "group_id";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct ItemId(pub i64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct TermId(pub i64);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl std::fmt::Display for TermId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Publication status of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Publish,
    #[default]
    Draft,
    Pending,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Draft => "draft",
            Self::Pending => "pending",
        }
    }

    /// Parse a user supplied status. Anything unknown becomes `Draft`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "publish" => Self::Publish,
            "pending" => Self::Pending,
            _ => Self::Draft,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes written on create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub content_type: String,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub status: Status,
    pub slug: String,
}

pub trait TermStore {
    type Error: std::error::Error;

    /// Look up a term by exact name anywhere in the taxonomy.
    fn find_term(
        &self,
        taxonomy: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<TermId>, Self::Error>>;

    fn create_term(
        &self,
        taxonomy: &str,
        name: &str,
        parent: Option<TermId>,
    ) -> impl Future<Output = Result<TermId, Self::Error>>;
}

pub trait ContentRepository {
    type Error: std::error::Error;

    /// Find an item of `content_type` whose `group_id` metadata equals `key`.
    /// An empty key never matches.
    fn find_item_by_business_key(
        &self,
        content_type: &str,
        key: &str,
    ) -> impl Future<Output = Result<Option<ItemId>, Self::Error>>;

    fn create_item(&self, item: &NewItem) -> impl Future<Output = Result<ItemId, Self::Error>>;

    /// Overwrite body, excerpt, status and slug. The title is written only
    /// when `update_title` is set.
    fn update_item(
        &self,
        id: ItemId,
        item: &NewItem,
        update_title: bool,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Create or update the item identified by `(item.content_type, key)`.
    ///
    /// Implementations must guarantee:
    /// - `None` (or an empty key) always creates a new item.
    /// - With a key, an existing item of the same content type carrying that
    ///   `group_id` is updated as in [`ContentRepository::update_item`];
    ///   otherwise a new item is created and its `group_id` recorded before
    ///   the call returns.
    /// - Lookup and write happen atomically with respect to other upserts.
    ///
    /// Returns the item id and whether it was created.
    fn upsert(
        &self,
        key: Option<&str>,
        item: &NewItem,
        update_title: bool,
    ) -> impl Future<Output = Result<(ItemId, bool), Self::Error>>;

    fn set_featured_media(
        &self,
        id: ItemId,
        asset: &AssetRef,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Replace the item's terms in `taxonomy`, keeping the given order.
    fn assign_terms(
        &self,
        id: ItemId,
        taxonomy: &str,
        terms: &[TermId],
    ) -> impl Future<Output = Result<(), Self::Error>>;

    fn set_metadata(
        &self,
        id: ItemId,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), Self::Error>>;
}
