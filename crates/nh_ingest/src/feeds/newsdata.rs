use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use nh_core::{Candidate, Error, Result, SourceFeed, Topic};
use reqwest::Client;
use scraper::{Html, Node};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Placeholder NewsData puts in `content` on plans without full text.
const PAID_PLAN_PLACEHOLDER: &str = "ONLY AVAILABLE IN PAID PLANS";

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub language: String,
    pub timeout_secs: u64,
    pub topics: Vec<Topic>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://newsdata.io/api/1/news".to_string(),
            language: "en".to_string(),
            timeout_secs: 30,
            topics: Topic::defaults(),
        }
    }
}

#[derive(Deserialize)]
struct NewsDataResponse {
    status: String,
    #[serde(default)]
    results: Value,
}

#[derive(Deserialize)]
struct RawItem {
    article_id: Option<String>,
    title: Option<String>,
    content: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    source: Option<String>,
    source_id: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// Client for the newsdata.io `news` endpoint.
pub struct NewsDataClient {
    client: Client,
    api_key: String,
    config: FeedConfig,
}

impl NewsDataClient {
    pub fn new(config: FeedConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Config("NewsData API key is required".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, api_key, config })
    }

    async fn try_fetch(&self, topic: &Topic) -> Result<Vec<Candidate>> {
        let body = self.client
            .get(&self.config.base_url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("category", topic.as_str()),
                ("language", self.config.language.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_candidates(&body, topic, Utc::now())
    }
}

#[async_trait]
impl SourceFeed for NewsDataClient {
    fn source_name(&self) -> &str {
        "NewsData"
    }

    async fn fetch(&self, topic: &Topic) -> Vec<Candidate> {
        if !self.config.topics.contains(topic) {
            warn!("⚠️ Topic {} is not configured, skipping", topic);
            return Vec::new();
        }

        match self.try_fetch(topic).await {
            Ok(candidates) => {
                info!("📥 Fetched {} candidates for {}", candidates.len(), topic);
                candidates
            }
            Err(e) => {
                warn!("⚠️ Feed unavailable for {}: {}", topic, e);
                Vec::new()
            }
        }
    }
}

/// Decode a NewsData response body into candidates for `topic`.
///
/// Items without an id or title are dropped, as are items that fail to decode.
pub fn parse_candidates(body: &str, topic: &Topic, fetched_at: DateTime<Utc>) -> Result<Vec<Candidate>> {
    let response: NewsDataResponse = serde_json::from_str(body)?;
    if response.status != "success" {
        let message = response
            .results
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(Error::Feed(format!("status {}: {}", response.status, message)));
    }

    let items = match response.results {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => return Err(Error::Feed(format!("unexpected results payload: {}", other))),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawItem>(item) {
            Ok(raw) => into_candidate(raw, topic, fetched_at),
            Err(e) => {
                debug!("Skipping undecodable feed item: {}", e);
                None
            }
        })
        .collect())
}

fn into_candidate(raw: RawItem, topic: &Topic, fetched_at: DateTime<Utc>) -> Option<Candidate> {
    let external_id = non_empty(raw.article_id)?;
    let title = non_empty(raw.title)?;

    let content = non_empty(raw.content)
        .filter(|c| !c.eq_ignore_ascii_case(PAID_PLAN_PLACEHOLDER))
        .or_else(|| non_empty(raw.description))
        .map(|c| strip_markup(&c))
        .unwrap_or_default();

    Some(Candidate {
        external_id,
        title: strip_markup(&title).replace('\n', " "),
        content,
        image_url: non_empty(raw.image_url),
        source: non_empty(raw.source)
            .or_else(|| non_empty(raw.source_id))
            .unwrap_or_else(|| "unknown".to_string()),
        published_at: raw
            .pub_date
            .as_deref()
            .and_then(parse_pub_date)
            .unwrap_or(fetched_at),
        topic: topic.clone(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

const BLOCK_ELEMENTS: &[&str] = &[
    "p", "br", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "tr",
];

/// Text content of an HTML fragment with entities decoded. Block elements
/// become line breaks and runs of whitespace collapse to one space.
fn strip_markup(text: &str) -> String {
    let fragment = Html::parse_fragment(text);
    let mut raw = String::with_capacity(text.len());
    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(t) => raw.push_str(t),
            Node::Element(e) if BLOCK_ELEMENTS.contains(&e.name()) => raw.push('\n'),
            _ => {}
        }
    }

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_pub_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn world() -> Topic {
        Topic::new("world").unwrap()
    }

    #[test]
    fn test_parse_candidates() {
        let body = r#"{
            "status": "success",
            "totalResults": 2,
            "results": [
                {
                    "article_id": "abc123",
                    "title": "Global Markets Rally",
                    "content": "Stocks rose on Tuesday.",
                    "image_url": "https://img.test/markets.jpg",
                    "source_id": "reuters",
                    "pubDate": "2024-05-01 08:30:00"
                },
                {
                    "article_id": "def456",
                    "title": "Summit opens",
                    "content": null,
                    "description": "<p>Leaders <b>meet</b> in Geneva.</p>",
                    "image_url": null,
                    "source": "AP",
                    "pubDate": "2024-05-01T09:00:00Z"
                }
            ]
        }"#;
        let fetched_at = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let candidates = parse_candidates(body, &world(), fetched_at).unwrap();
        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert_eq!(first.external_id, "abc123");
        assert_eq!(first.source, "reuters");
        assert_eq!(first.image_url.as_deref(), Some("https://img.test/markets.jpg"));
        assert_eq!(first.published_at, Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap());
        assert_eq!(first.topic, world());

        let second = &candidates[1];
        assert_eq!(second.content, "Leaders meet in Geneva.");
        assert_eq!(second.source, "AP");
        assert_eq!(second.image_url, None);
        assert_eq!(second.published_at, Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_drops_unusable_items() {
        let body = r#"{
            "status": "success",
            "results": [
                { "title": "No id" },
                { "article_id": "x1", "title": "  " },
                { "article_id": 42, "title": "Wrong id type" },
                {
                    "article_id": "x2",
                    "title": "Paywalled",
                    "content": "ONLY AVAILABLE IN PAID PLANS",
                    "description": "Short teaser.",
                    "pubDate": "yesterday"
                }
            ]
        }"#;
        let fetched_at = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let candidates = parse_candidates(body, &world(), fetched_at).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].external_id, "x2");
        assert_eq!(candidates[0].content, "Short teaser.");
        assert_eq!(candidates[0].source, "unknown");
        assert_eq!(candidates[0].published_at, fetched_at);
    }

    #[test]
    fn test_parse_error_status() {
        let body = r#"{"status":"error","results":{"message":"API key invalid","code":"Unauthorized"}}"#;
        let err = parse_candidates(body, &world(), Utc::now()).unwrap_err();
        assert!(err.to_string().contains("API key invalid"));

        assert!(parse_candidates("<html>", &world(), Utc::now()).is_err());
    }

    #[test]
    fn test_strip_markup_keeps_boundaries() {
        assert_eq!(strip_markup("<p>Leaders meet.</p><p>Talks follow.</p>"), "Leaders meet.\nTalks follow.");
        assert_eq!(strip_markup("Line one<br>Line two"), "Line one\nLine two");
        assert_eq!(strip_markup("AT&amp;T shares fall"), "AT&T shares fall");
        assert_eq!(strip_markup("Leaders <b>meet</b>  in\tGeneva."), "Leaders meet in Geneva.");
        assert_eq!(strip_markup("Plain text"), "Plain text");
    }

    #[test]
    fn test_client_requires_api_key() {
        assert!(NewsDataClient::new(FeedConfig::default()).is_err());
        let config = FeedConfig {
            api_key: Some("key".to_string()),
            ..FeedConfig::default()
        };
        assert!(NewsDataClient::new(config).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_never_fails() {
        let config = FeedConfig {
            api_key: Some("key".to_string()),
            base_url: "http://127.0.0.1:9/api/1/news".to_string(),
            timeout_secs: 2,
            ..FeedConfig::default()
        };
        let client = NewsDataClient::new(config).unwrap();

        assert!(client.fetch(&world()).await.is_empty());
        assert!(client.fetch(&Topic::new("sports").unwrap()).await.is_empty());
    }
}
