use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nh_core::types::normalize_paging;
use nh_core::{Article, ArticleStore, Error, ImageHashRecord, ImageHashStore, Page, Result, Topic};
use tokio::sync::RwLock;

use crate::StorageBackend;

#[derive(Default)]
pub struct MemoryStore {
    articles: Vec<Article>,
    image_hashes: HashMap<String, ImageHashRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, external_id: &str) -> bool {
        self.articles.iter().any(|a| a.external_id == external_id)
    }

    pub fn insert(&mut self, article: Article) -> Result<Article> {
        if self.exists(&article.external_id) {
            return Err(Error::DuplicateArticle { external_id: article.external_id });
        }
        if self.articles.iter().any(|a| a.topic == article.topic && a.slug == article.slug) {
            return Err(Error::SlugTaken {
                topic: article.topic.to_string(),
                slug: article.slug,
            });
        }
        self.articles.push(article.clone());
        Ok(article)
    }

    pub fn find_latest(&self, topic: Option<&Topic>, page: u64, per_page: u64) -> Page<Article> {
        let (page, per_page, offset) = normalize_paging(page, per_page);
        let mut matching: Vec<&Article> = self.articles
            .iter()
            .filter(|a| topic.map_or(true, |t| &a.topic == t))
            .collect();
        matching.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.external_id.cmp(&b.external_id))
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(offset as usize)
            .take(per_page as usize)
            .cloned()
            .collect();

        Page { items, total, page, per_page }
    }

    pub fn find_one(&self, topic: &Topic, slug: &str) -> Option<Article> {
        self.articles
            .iter()
            .find(|a| &a.topic == topic && a.slug == slug)
            .cloned()
    }

    pub fn counts_by_topic(&self) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for article in &self.articles {
            *counts.entry(article.topic.to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub fn most_recent_processed_at(&self) -> Option<DateTime<Utc>> {
        self.articles.iter().map(|a| a.processed_at).max()
    }
}

pub struct InMemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::new())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn connect(_url: Option<&str>) -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait]
impl ArticleStore for InMemoryStorage {
    async fn exists(&self, external_id: &str) -> Result<bool> {
        Ok(self.store.read().await.exists(external_id))
    }

    async fn insert(&self, article: Article) -> Result<Article> {
        self.store.write().await.insert(article)
    }

    async fn find_latest(&self, topic: Option<&Topic>, page: u64, per_page: u64) -> Result<Page<Article>> {
        Ok(self.store.read().await.find_latest(topic, page, per_page))
    }

    async fn find_one(&self, topic: &Topic, slug: &str) -> Result<Option<Article>> {
        Ok(self.store.read().await.find_one(topic, slug))
    }

    async fn counts_by_topic(&self) -> Result<BTreeMap<String, u64>> {
        Ok(self.store.read().await.counts_by_topic())
    }

    async fn most_recent_processed_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.store.read().await.most_recent_processed_at())
    }
}

#[async_trait]
impl ImageHashStore for InMemoryStorage {
    async fn find_hash(&self, hash: &str) -> Result<Option<ImageHashRecord>> {
        Ok(self.store.read().await.image_hashes.get(hash).cloned())
    }

    async fn insert_hash(&self, record: ImageHashRecord) -> Result<()> {
        let mut store = self.store.write().await;
        if store.image_hashes.contains_key(&record.hash) {
            return Err(Error::DuplicateImage(record.hash));
        }
        store.image_hashes.insert(record.hash.clone(), record);
        Ok(())
    }
}
