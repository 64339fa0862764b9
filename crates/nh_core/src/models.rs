use async_trait::async_trait;

use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A chat style generative text service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Run one completion and return the raw text of the first choice
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
