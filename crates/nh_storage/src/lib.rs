use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nh_core::{ArticleStore, Error, ImageHashStore, Result, Topic};
use serde::Serialize;
use tracing::info;

pub mod backends;

pub use backends::*;

#[async_trait]
pub trait StorageBackend: ArticleStore + ImageHashStore + Sized + 'static {
    fn get_error_message() -> &'static str;

    /// Open the backend, creating its collections if needed
    async fn connect(url: Option<&str>) -> Result<Self>;
}

/// Both collections of one backend, shared behind trait objects.
#[derive(Clone)]
pub struct Storage {
    pub articles: Arc<dyn ArticleStore>,
    pub images: Arc<dyn ImageHashStore>,
}

impl Storage {
    pub fn from_backend<T: StorageBackend>(backend: T) -> Self {
        let backend = Arc::new(backend);
        Self {
            articles: backend.clone(),
            images: backend,
        }
    }
}

async fn open<T: StorageBackend>(url: Option<&str>) -> Result<Storage> {
    let backend = T::connect(url)
        .await
        .map_err(|e| Error::Persistence(format!("{} ({})", T::get_error_message(), e)))?;
    Ok(Storage::from_backend(backend))
}

/// Build a storage backend by name: `memory` or `sqlite`.
pub async fn create_storage(kind: &str, url: Option<&str>) -> Result<Storage> {
    let storage = match kind {
        "memory" => open::<InMemoryStorage>(url).await?,
        #[cfg(feature = "sqlite")]
        "sqlite" => open::<SQLiteStorage>(url).await?,
        other => {
            return Err(Error::Config(format!("Unsupported storage backend: {}", other)));
        }
    };
    info!("🏦 Storage backend ready (using {})", kind);
    Ok(storage)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleStats {
    pub total_articles: u64,
    pub articles_by_topic: BTreeMap<String, u64>,
    pub latest_update: Option<DateTime<Utc>>,
}

/// Aggregate counts over the configured topics; topics with no articles report zero.
pub async fn collect_stats(store: &dyn ArticleStore, topics: &[Topic]) -> Result<ArticleStats> {
    let counts = store.counts_by_topic().await?;
    let total_articles = counts.values().sum();
    let articles_by_topic = topics
        .iter()
        .map(|t| (t.to_string(), counts.get(t.as_str()).copied().unwrap_or(0)))
        .collect();

    Ok(ArticleStats {
        total_articles,
        articles_by_topic,
        latest_update: store.most_recent_processed_at().await?,
    })
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{collect_stats, create_storage, ArticleStats, Storage, StorageBackend};
}
