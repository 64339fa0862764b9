use std::sync::Arc;

use nh_core::{CompletionRequest, Derived, TextGenerator};
use tracing::{debug, warn};

const SYSTEM_ROLE: &str = "You are a professional news editor.";
const MAX_TOKENS: u32 = 1500;
const TEMPERATURE: f32 = 0.7;

/// Turns raw feed text into a distinct, edited version of the story.
pub struct ContentRewriter {
    model: Arc<dyn TextGenerator>,
}

impl ContentRewriter {
    pub fn new(model: Arc<dyn TextGenerator>) -> Self {
        Self { model }
    }

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest {
            system: SYSTEM_ROLE.to_string(),
            user: format!(
                "Rewrite the following news article in a professional, journalistic style. \
                 Make it engaging while maintaining accuracy and adding relevant context:\n\n{}",
                text
            ),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }

    /// Single attempt. On any failure the original text comes back untouched.
    pub async fn rewrite(&self, text: &str) -> Derived<String> {
        if text.trim().is_empty() {
            return Derived::fallback(text.to_string(), "nothing to rewrite");
        }

        match self.model.complete(&Self::request(text)).await {
            Ok(rewritten) if !rewritten.trim().is_empty() => {
                debug!("✍️ Rewrote {} chars into {}", text.len(), rewritten.len());
                Derived::Generated(rewritten.trim().to_string())
            }
            Ok(_) => {
                warn!("⚠️ {} returned an empty rewrite, keeping original text", self.model.name());
                Derived::fallback(text.to_string(), "empty response")
            }
            Err(e) => {
                warn!("⚠️ Rewrite failed, keeping original text: {}", e);
                Derived::fallback(text.to_string(), e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScriptedModel;
    use nh_core::Error;

    #[tokio::test]
    async fn test_rewrite_uses_model_output() {
        let model = Arc::new(ScriptedModel::new(|request| {
            assert_eq!(request.system, SYSTEM_ROLE);
            assert_eq!(request.max_tokens, MAX_TOKENS);
            assert!(request.user.ends_with("Stocks rose."));
            Ok("  Equity markets climbed on Tuesday.\n".to_string())
        }));
        let rewriter = ContentRewriter::new(model.clone());

        let result = rewriter.rewrite("Stocks rose.").await;
        assert_eq!(result, Derived::Generated("Equity markets climbed on Tuesday.".to_string()));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_rewrite_falls_back_to_original() {
        let rewriter = ContentRewriter::new(Arc::new(ScriptedModel::new(|_| {
            Err(Error::Inference("quota exceeded".to_string()))
        })));

        let raw = "Original  text,\nexactly as fetched. ";
        let result = rewriter.rewrite(raw).await;
        assert!(result.is_fallback());
        assert_eq!(result.value(), raw);
        assert!(result.fallback_reason().unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_rewrite_rejects_blank_output() {
        let rewriter = ContentRewriter::new(Arc::new(ScriptedModel::new(|_| Ok("   \n".to_string()))));
        let result = rewriter.rewrite("Some text").await;
        assert!(result.is_fallback());
        assert_eq!(result.into_value(), "Some text");
    }

    #[tokio::test]
    async fn test_rewrite_skips_empty_input() {
        let model = Arc::new(ScriptedModel::new(|_| Ok("unused".to_string())));
        let rewriter = ContentRewriter::new(model.clone());
        assert!(rewriter.rewrite("").await.is_fallback());
        assert_eq!(model.calls(), 0);
    }
}
