use std::fmt;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    FetchFailed(String),
    RightsMarker(String),
    Duplicate { hash: String },
    HashStoreUnavailable(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::FetchFailed(e) => write!(f, "fetch failed: {}", e),
            RejectReason::RightsMarker(field) => write!(f, "rights marker in {}", field),
            RejectReason::Duplicate { hash } => write!(f, "already seen ({})", hash),
            RejectReason::HashStoreUnavailable(e) => write!(f, "hash store unavailable: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenVerdict {
    Safe,
    Reject(RejectReason),
}

impl ScreenVerdict {
    pub fn is_reject(&self) -> bool {
        matches!(self, ScreenVerdict::Reject(_))
    }
}

/// Decides whether an image may be reused.
#[async_trait]
pub trait ImageScreen: Send + Sync {
    async fn screen(&self, image_url: &str) -> ScreenVerdict;
}
