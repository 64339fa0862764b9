use std::fmt;

use async_trait::async_trait;
use nh_core::{CompletionRequest, Error, Result, TextGenerator};

/// Stands in when no text service is configured.
///
/// Every call fails, so rewriting passes text through and metadata falls back to truncation.
pub struct DummyModel;

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

#[async_trait]
impl TextGenerator for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        Err(Error::Inference("Dummy model does not generate text".to_string()))
    }
}
