use async_trait::async_trait;

use crate::types::{Candidate, Topic};

#[async_trait]
pub trait SourceFeed: Send + Sync {
    fn source_name(&self) -> &str;

    /// Fetch the current batch for a topic.
    ///
    /// Never fails: an unreachable or empty upstream yields an empty batch.
    async fn fetch(&self, topic: &Topic) -> Vec<Candidate>;
}
