use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A configured category articles are filed under, e.g. `world`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && !name.starts_with('-')
            && !name.ends_with('-')
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if valid {
            Ok(Self(name))
        } else {
            Err(Error::InvalidTopic(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn defaults() -> Vec<Topic> {
        ["world", "technology", "economics"]
            .into_iter()
            .map(|name| Topic(name.to_string()))
            .collect()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Topic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Topic::new(s.trim().to_lowercase())
    }
}

impl TryFrom<String> for Topic {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Topic::new(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

/// A raw item as returned by the feed, before any processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub external_id: String,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub topic: Topic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub external_id: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub image_url: Option<String>,
    pub topic: Topic,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    pub summary: String,
    pub keywords: Vec<String>,
    pub path: String,
}

impl Article {
    pub fn path_for(topic: &Topic, slug: &str) -> String {
        format!("/{}/{}", topic, slug)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageHashRecord {
    pub hash: String,
    pub url: String,
    pub first_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub summary: String,
    pub keywords: Vec<String>,
}

/// One page of a listing. `page` is 1-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(self.per_page)
    }
}

/// Clamps caller supplied paging to `(page >= 1, per_page >= 1)` and returns the row offset.
pub fn normalize_paging(page: u64, per_page: u64) -> (u64, u64, u64) {
    let page = page.max(1);
    let per_page = per_page.max(1);
    (page, per_page, (page - 1) * per_page)
}
