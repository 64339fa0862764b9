use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use nh_core::slug::{slugify, with_suffix};
use nh_core::{
    Article, ArticleStore, Candidate, Error, ImageScreen, SourceFeed, TextGenerator, Topic,
};
use nh_inference::{ContentRewriter, MetadataGenerator};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Attempts per candidate when `(topic, slug)` is already taken: `slug`, `slug-2`, ...
pub const MAX_SLUG_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub topics: Vec<Topic>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { topics: Topic::defaults() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub fetched: usize,
    pub skipped_existing: usize,
    pub persisted: usize,
    pub failed: usize,
    pub images_dropped: usize,
    pub rewrite_fallbacks: usize,
    pub metadata_fallbacks: usize,
}

impl RunStats {
    fn merge(&mut self, other: &RunStats) {
        self.fetched += other.fetched;
        self.skipped_existing += other.skipped_existing;
        self.persisted += other.persisted;
        self.failed += other.failed;
        self.images_dropped += other.images_dropped;
        self.rewrite_fallbacks += other.rewrite_fallbacks;
        self.metadata_fallbacks += other.metadata_fallbacks;
    }
}

/// Everything one run persisted, in configured topic order then feed order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub articles: Vec<Article>,
    pub stats: RunStats,
}

enum Outcome {
    Persisted(Article),
    AlreadyStored,
    Failed,
}

pub struct IngestionPipeline {
    topics: Vec<Topic>,
    feed: Arc<dyn SourceFeed>,
    store: Arc<dyn ArticleStore>,
    screener: Arc<dyn ImageScreen>,
    rewriter: ContentRewriter,
    metadata: MetadataGenerator,
}

impl IngestionPipeline {
    pub fn new(
        config: &IngestConfig,
        feed: Arc<dyn SourceFeed>,
        store: Arc<dyn ArticleStore>,
        screener: Arc<dyn ImageScreen>,
        model: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            topics: config.topics.clone(),
            feed,
            store,
            screener,
            rewriter: ContentRewriter::new(model.clone()),
            metadata: MetadataGenerator::new(model),
        }
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Ingest every configured topic. Topics run concurrently and never abort each other.
    pub async fn run(&self) -> RunReport {
        info!("🚀 Starting ingestion run for {} topics via {}", self.topics.len(), self.feed.source_name());

        let runs = join_all(self.topics.iter().map(|topic| self.run_topic(topic))).await;

        let mut report = RunReport::default();
        for (articles, stats) in runs {
            report.articles.extend(articles);
            report.stats.merge(&stats);
        }

        info!(
            "✅ Ingestion run finished: {} persisted, {} already stored, {} failed",
            report.stats.persisted, report.stats.skipped_existing, report.stats.failed
        );
        report
    }

    async fn run_topic(&self, topic: &Topic) -> (Vec<Article>, RunStats) {
        let mut stats = RunStats::default();
        let mut articles = Vec::new();

        let candidates = self.feed.fetch(topic).await;
        if candidates.is_empty() {
            info!("📭 No candidates for {}", topic);
            return (articles, stats);
        }
        stats.fetched = candidates.len();

        for candidate in candidates {
            match self.process_candidate(candidate, &mut stats).await {
                Outcome::Persisted(article) => {
                    stats.persisted += 1;
                    articles.push(article);
                }
                Outcome::AlreadyStored => stats.skipped_existing += 1,
                Outcome::Failed => stats.failed += 1,
            }
        }

        info!("📰 {}: {} new articles out of {} candidates", topic, articles.len(), stats.fetched);
        (articles, stats)
    }

    async fn process_candidate(&self, candidate: Candidate, stats: &mut RunStats) -> Outcome {
        let external_id = candidate.external_id.as_str();
        let topic = &candidate.topic;

        match self.store.exists(external_id).await {
            Ok(true) => {
                debug!(external_id, topic = %topic, "⏭️ Already stored");
                return Outcome::AlreadyStored;
            }
            Ok(false) => {}
            Err(e) => {
                error!(external_id, topic = %topic, "💥 Dedup check failed, skipping: {}", e);
                return Outcome::Failed;
            }
        }

        info!(external_id, topic = %topic, "📰 Processing: {}", candidate.title);

        let image_url = match candidate.image_url.as_deref() {
            Some(url) => {
                if self.screener.screen(url).await.is_reject() {
                    stats.images_dropped += 1;
                    None
                } else {
                    Some(url.to_string())
                }
            }
            None => None,
        };

        let content = self.rewriter.rewrite(&candidate.content).await;
        if content.is_fallback() {
            stats.rewrite_fallbacks += 1;
        }
        let content = content.into_value();

        let metadata = self.metadata.generate(&candidate.title, &content).await;
        if metadata.is_fallback() {
            stats.metadata_fallbacks += 1;
        }
        let metadata = metadata.into_value();

        let base_slug = base_slug(&candidate);
        let processed_at = Utc::now();

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let slug = with_suffix(&base_slug, attempt);
            let article = Article {
                external_id: candidate.external_id.clone(),
                title: candidate.title.clone(),
                path: Article::path_for(topic, &slug),
                slug,
                content: content.clone(),
                image_url: image_url.clone(),
                topic: topic.clone(),
                source: candidate.source.clone(),
                published_at: candidate.published_at,
                processed_at,
                summary: metadata.summary.clone(),
                keywords: metadata.keywords.clone(),
            };

            match self.store.insert(article).await {
                Ok(article) => {
                    info!(external_id, topic = %topic, "💾 Stored {}", article.path);
                    return Outcome::Persisted(article);
                }
                Err(Error::SlugTaken { slug, .. }) => {
                    debug!(external_id, topic = %topic, "Slug {} taken, trying next suffix", slug);
                }
                Err(Error::DuplicateArticle { .. }) => {
                    debug!(external_id, topic = %topic, "⏭️ Stored concurrently by another run");
                    return Outcome::AlreadyStored;
                }
                Err(e) => {
                    error!(external_id, topic = %topic, "💥 Failed to persist article: {}", e);
                    return Outcome::Failed;
                }
            }
        }

        warn!(
            external_id,
            topic = %topic,
            "💥 No free slug for {} after {} attempts",
            base_slug,
            MAX_SLUG_ATTEMPTS
        );
        Outcome::Failed
    }
}

/// Slug from the title, else from the external id, else a fixed word.
fn base_slug(candidate: &Candidate) -> String {
    let slug = slugify(&candidate.title);
    if !slug.is_empty() {
        return slug;
    }
    let slug = slugify(&candidate.external_id);
    if !slug.is_empty() {
        return slug;
    }
    "article".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candidate(title: &str, external_id: &str) -> Candidate {
        Candidate {
            external_id: external_id.to_string(),
            title: title.to_string(),
            content: String::new(),
            image_url: None,
            source: "test".to_string(),
            published_at: Utc::now(),
            topic: Topic::new("world").unwrap(),
        }
    }

    #[test]
    fn test_base_slug_fallbacks() {
        assert_eq!(base_slug(&candidate("Global Markets Rally!", "id1")), "global-markets-rally");
        assert_eq!(base_slug(&candidate("東京", "NYT-123")), "nyt-123");
        assert_eq!(base_slug(&candidate("!!!", "???")), "article");
    }

    #[test]
    fn test_stats_merge() {
        let mut total = RunStats { fetched: 2, persisted: 1, ..RunStats::default() };
        total.merge(&RunStats { fetched: 3, failed: 1, images_dropped: 2, ..RunStats::default() });
        assert_eq!(total.fetched, 5);
        assert_eq!(total.persisted, 1);
        assert_eq!(total.failed, 1);
        assert_eq!(total.images_dropped, 2);
    }
}
