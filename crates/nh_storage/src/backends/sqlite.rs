use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use nh_core::types::normalize_paging;
use nh_core::{Article, ArticleStore, Error, ImageHashRecord, ImageHashStore, Page, Result, Topic};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::StorageBackend;

const DEFAULT_URL: &str = "sqlite:articles.db";

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        external_id TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        slug TEXT NOT NULL,
        content TEXT NOT NULL,
        image_url TEXT,
        topic TEXT NOT NULL,
        source TEXT NOT NULL,
        published_at TEXT NOT NULL,
        processed_at TEXT NOT NULL,
        summary TEXT NOT NULL,
        keywords TEXT NOT NULL,
        path TEXT NOT NULL,
        UNIQUE (topic, slug)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS articles_published_at ON articles (published_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS image_hashes (
        hash TEXT PRIMARY KEY,
        url TEXT NOT NULL,
        first_seen TEXT NOT NULL
    )
    "#,
];

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be available at ./articles.db"
    }

    async fn connect(url: Option<&str>) -> Result<Self> {
        Self::new_with_url(url.unwrap_or(DEFAULT_URL)).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::new_with_url(&format!("sqlite:{}", db_path.display())).await
    }

    pub async fn new_with_url(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::Config(format!("Invalid sqlite url {}: {}", url, e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::Persistence(format!("Failed to connect to database: {}", e)))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Persistence(format!("Failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self { pool: Arc::new(pool) })
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    // fixed width so text ordering matches time ordering
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Persistence(format!("Failed to parse date {}: {}", value, e)))
}

fn query_error(context: &str, e: sqlx::Error) -> Error {
    Error::Persistence(format!("{}: {}", context, e))
}

fn insert_error(article: &Article, e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db_err) = &e {
        let message = db_err.message();
        if db_err.is_unique_violation() || message.contains("UNIQUE constraint failed") {
            if message.contains("external_id") {
                return Error::DuplicateArticle { external_id: article.external_id.clone() };
            }
            if message.contains("slug") {
                return Error::SlugTaken {
                    topic: article.topic.to_string(),
                    slug: article.slug.clone(),
                };
            }
        }
    }
    query_error("Failed to store article", e)
}

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    let get = |column: &str| -> Result<String> {
        row.try_get::<String, _>(column)
            .map_err(|e| query_error("Failed to read article row", e))
    };

    let keywords: Vec<String> = serde_json::from_str(&get("keywords")?)?;
    let image_url = row
        .try_get::<Option<String>, _>("image_url")
        .map_err(|e| query_error("Failed to read article row", e))?;

    Ok(Article {
        external_id: get("external_id")?,
        title: get("title")?,
        slug: get("slug")?,
        content: get("content")?,
        image_url,
        topic: Topic::new(get("topic")?)?,
        source: get("source")?,
        published_at: parse_timestamp(&get("published_at")?)?,
        processed_at: parse_timestamp(&get("processed_at")?)?,
        summary: get("summary")?,
        keywords,
        path: get("path")?,
    })
}

#[async_trait]
impl ArticleStore for SQLiteStorage {
    async fn exists(&self, external_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM articles WHERE external_id = ? LIMIT 1")
            .bind(external_id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| query_error("Failed to check article", e))?;
        Ok(row.is_some())
    }

    async fn insert(&self, article: Article) -> Result<Article> {
        let keywords = serde_json::to_string(&article.keywords)?;

        sqlx::query(
            r#"
            INSERT INTO articles
            (external_id, title, slug, content, image_url, topic, source,
             published_at, processed_at, summary, keywords, path)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&article.external_id)
        .bind(&article.title)
        .bind(&article.slug)
        .bind(&article.content)
        .bind(article.image_url.as_deref())
        .bind(article.topic.as_str())
        .bind(&article.source)
        .bind(timestamp(&article.published_at))
        .bind(timestamp(&article.processed_at))
        .bind(&article.summary)
        .bind(keywords)
        .bind(&article.path)
        .execute(&*self.pool)
        .await
        .map_err(|e| insert_error(&article, e))?;

        Ok(article)
    }

    async fn find_latest(&self, topic: Option<&Topic>, page: u64, per_page: u64) -> Result<Page<Article>> {
        let (page, per_page, offset) = normalize_paging(page, per_page);
        let topic = topic.map(Topic::as_str);

        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE (?1 IS NULL OR topic = ?1)
            ORDER BY published_at DESC, external_id ASC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(topic)
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| query_error("Failed to list articles", e))?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE (?1 IS NULL OR topic = ?1)")
            .bind(topic)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| query_error("Failed to count articles", e))?;

        let items = rows.iter().map(row_to_article).collect::<Result<Vec<_>>>()?;
        Ok(Page { items, total: total as u64, page, per_page })
    }

    async fn find_one(&self, topic: &Topic, slug: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE topic = ? AND slug = ?")
            .bind(topic.as_str())
            .bind(slug)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| query_error("Failed to find article", e))?;
        row.as_ref().map(row_to_article).transpose()
    }

    async fn counts_by_topic(&self) -> Result<BTreeMap<String, u64>> {
        let rows = sqlx::query("SELECT topic, COUNT(*) AS n FROM articles GROUP BY topic")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| query_error("Failed to count articles", e))?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let topic: String = row.try_get("topic").map_err(|e| query_error("Failed to read count", e))?;
            let n: i64 = row.try_get("n").map_err(|e| query_error("Failed to read count", e))?;
            counts.insert(topic, n as u64);
        }
        Ok(counts)
    }

    async fn most_recent_processed_at(&self) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<String> = sqlx::query_scalar("SELECT MAX(processed_at) FROM articles")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| query_error("Failed to read latest update", e))?;
        latest.as_deref().map(parse_timestamp).transpose()
    }
}

#[async_trait]
impl ImageHashStore for SQLiteStorage {
    async fn find_hash(&self, hash: &str) -> Result<Option<ImageHashRecord>> {
        let row = sqlx::query("SELECT hash, url, first_seen FROM image_hashes WHERE hash = ?")
            .bind(hash)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| query_error("Failed to find image hash", e))?;

        match row {
            Some(row) => {
                let read = |column: &str| -> Result<String> {
                    row.try_get::<String, _>(column)
                        .map_err(|e| query_error("Failed to read image hash", e))
                };
                Ok(Some(ImageHashRecord {
                    hash: read("hash")?,
                    url: read("url")?,
                    first_seen: parse_timestamp(&read("first_seen")?)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn insert_hash(&self, record: ImageHashRecord) -> Result<()> {
        sqlx::query("INSERT INTO image_hashes (hash, url, first_seen) VALUES (?, ?, ?)")
            .bind(&record.hash)
            .bind(&record.url)
            .bind(timestamp(&record.first_seen))
            .execute(&*self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err)
                    if db_err.is_unique_violation() || db_err.message().contains("UNIQUE constraint failed") =>
                {
                    Error::DuplicateImage(record.hash.clone())
                }
                _ => query_error("Failed to store image hash", e),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn article(external_id: &str, topic: &str, slug: &str, hours: i64) -> Article {
        let topic = Topic::new(topic).unwrap();
        let published_at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::hours(hours);
        Article {
            external_id: external_id.to_string(),
            title: format!("Title {}", external_id),
            slug: slug.to_string(),
            content: "Body".to_string(),
            image_url: Some("http://img.test/a.jpg".to_string()),
            path: Article::path_for(&topic, slug),
            topic,
            source: "test".to_string(),
            published_at,
            processed_at: published_at + Duration::minutes(5),
            summary: "Summary".to_string(),
            keywords: vec!["markets".to_string(), "rates".to_string()],
        }
    }

    #[tokio::test]
    async fn test_sqlite_storage() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();

        let stored = article("a1", "world", "first", 1);
        storage.insert(stored.clone()).await.unwrap();
        assert!(storage.exists("a1").await.unwrap());
        assert!(!storage.exists("a2").await.unwrap());

        let world = Topic::new("world").unwrap();
        let found = storage.find_one(&world, "first").await.unwrap().unwrap();
        assert_eq!(found, stored);
    }

    #[tokio::test]
    async fn test_sqlite_uniqueness() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();

        storage.insert(article("a1", "world", "first", 1)).await.unwrap();

        let err = storage.insert(article("a1", "world", "second", 2)).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateArticle { .. }), "{:?}", err);

        let err = storage.insert(article("a2", "world", "first", 2)).await.unwrap_err();
        assert!(matches!(err, Error::SlugTaken { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn test_sqlite_pagination_and_stats() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();

        for i in 0..25 {
            storage
                .insert(article(&format!("w{:02}", i), "world", &format!("story-{}", i), i))
                .await
                .unwrap();
        }
        storage.insert(article("e1", "economics", "story", 30)).await.unwrap();

        let world = Topic::new("world").unwrap();
        let page = storage.find_latest(Some(&world), 3, 10).await.unwrap();
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.total_pages(), 3);
        assert_eq!(page.items[0].external_id, "w04");

        let latest = storage.find_latest(None, 1, 3).await.unwrap();
        assert_eq!(latest.total, 26);
        assert_eq!(latest.items[0].external_id, "e1");

        let counts = storage.counts_by_topic().await.unwrap();
        assert_eq!(counts.get("world"), Some(&25));
        assert_eq!(counts.get("economics"), Some(&1));

        let expected = article("e1", "economics", "story", 30).processed_at;
        assert_eq!(storage.most_recent_processed_at().await.unwrap(), Some(expected));
    }

    #[tokio::test]
    async fn test_sqlite_image_hashes() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();

        let record = ImageHashRecord {
            hash: "deadbeef".to_string(),
            url: "http://img.test/a.jpg".to_string(),
            first_seen: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };
        storage.insert_hash(record.clone()).await.unwrap();
        assert_eq!(storage.find_hash("deadbeef").await.unwrap(), Some(record.clone()));

        let err = storage.insert_hash(record).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateImage(_)));
    }
}
