use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Article, ImageHashRecord, Page, Topic};
use crate::Result;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Whether an article with this external id has already been stored
    async fn exists(&self, external_id: &str) -> Result<bool>;

    /// Store a new article.
    ///
    /// Fails with `Error::DuplicateArticle` when the external id is taken and
    /// `Error::SlugTaken` when `(topic, slug)` is taken. Stores never overwrite.
    async fn insert(&self, article: Article) -> Result<Article>;

    /// Newest first by `published_at`, optionally restricted to one topic
    async fn find_latest(&self, topic: Option<&Topic>, page: u64, per_page: u64) -> Result<Page<Article>>;

    async fn find_one(&self, topic: &Topic, slug: &str) -> Result<Option<Article>>;

    /// Article counts for every topic that has at least one article
    async fn counts_by_topic(&self) -> Result<BTreeMap<String, u64>>;

    async fn most_recent_processed_at(&self) -> Result<Option<DateTime<Utc>>>;
}

#[async_trait]
pub trait ImageHashStore: Send + Sync {
    async fn find_hash(&self, hash: &str) -> Result<Option<ImageHashRecord>>;

    /// Record a first-seen hash. Fails with `Error::DuplicateImage` if it is already known.
    async fn insert_hash(&self, record: ImageHashRecord) -> Result<()>;
}
