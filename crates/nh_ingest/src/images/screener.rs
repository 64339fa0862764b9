use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use nh_core::{Error, ImageHashRecord, ImageHashStore, ImageScreen, RejectReason, Result, ScreenVerdict};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use super::rights::find_rights_marker;

#[derive(Debug, Clone)]
pub struct ScreenConfig {
    pub timeout_secs: u64,
    pub max_bytes: usize,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Rejects images that were seen before (byte-identical) or that carry an
/// explicit rights marker in their metadata. Fails closed.
///
/// This is a heuristic, not a licence check: re-encoded or cropped copies and
/// images without embedded markers pass.
pub struct ImageScreener {
    client: Client,
    hashes: Arc<dyn ImageHashStore>,
    max_bytes: usize,
}

impl ImageScreener {
    pub fn new(hashes: Arc<dyn ImageHashStore>, config: &ScreenConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            hashes,
            max_bytes: config.max_bytes,
        })
    }

    async fn fetch(&self, image_url: &str) -> Result<Vec<u8>> {
        let url = Url::parse(image_url).map_err(|e| Error::Feed(format!("Invalid image URL {}: {}", image_url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::Feed(format!("Unsupported image URL scheme: {}", url.scheme())));
        }

        let mut response = self.client.get(url).send().await?.error_for_status()?;
        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(Error::Feed(format!("Image too large: {} bytes", len)));
            }
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(Error::Feed(format!("Image too large: over {} bytes", self.max_bytes)));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    /// Metadata and duplicate checks on bytes that were already fetched.
    pub async fn screen_bytes(&self, image_url: &str, bytes: &[u8]) -> ScreenVerdict {
        if let Some(field) = find_rights_marker(bytes) {
            return ScreenVerdict::Reject(RejectReason::RightsMarker(field));
        }

        let hash = content_hash(bytes);
        match self.hashes.find_hash(&hash).await {
            Ok(Some(seen)) => {
                debug!("🖼️ Image {} matches {} first seen {}", image_url, seen.url, seen.first_seen);
                return ScreenVerdict::Reject(RejectReason::Duplicate { hash });
            }
            Ok(None) => {}
            Err(e) => return ScreenVerdict::Reject(RejectReason::HashStoreUnavailable(e.to_string())),
        }

        let record = ImageHashRecord {
            hash: hash.clone(),
            url: image_url.to_string(),
            first_seen: Utc::now(),
        };
        match self.hashes.insert_hash(record).await {
            Ok(()) => ScreenVerdict::Safe,
            // another run recorded the same bytes between our lookup and insert
            Err(Error::DuplicateImage(_)) => ScreenVerdict::Reject(RejectReason::Duplicate { hash }),
            Err(e) => ScreenVerdict::Reject(RejectReason::HashStoreUnavailable(e.to_string())),
        }
    }
}

pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[async_trait]
impl ImageScreen for ImageScreener {
    async fn screen(&self, image_url: &str) -> ScreenVerdict {
        let verdict = match self.fetch(image_url).await {
            Ok(bytes) => self.screen_bytes(image_url, &bytes).await,
            Err(e) => ScreenVerdict::Reject(RejectReason::FetchFailed(e.to_string())),
        };

        match &verdict {
            ScreenVerdict::Safe => info!("🖼️ Image accepted: {}", image_url),
            ScreenVerdict::Reject(reason) => warn!("🚫 Image dropped ({}): {}", reason, image_url),
        }
        verdict
    }
}
