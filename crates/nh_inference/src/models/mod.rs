use std::sync::Arc;

use nh_core::{Error, Result, TextGenerator};
use tracing::info;

pub mod dummy;
pub mod openai;
pub mod scripted;

pub use dummy::DummyModel;
pub use openai::OpenAIModel;
pub use scripted::ScriptedModel;

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model_name: String,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model_name: "gpt-3.5-turbo".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Build a text generator by name: `openai` or `dummy`.
pub fn create_model(kind: &str, config: &ModelConfig) -> Result<Arc<dyn TextGenerator>> {
    let model: Arc<dyn TextGenerator> = match kind {
        "openai" => Arc::new(OpenAIModel::new(config)?),
        "dummy" => Arc::new(DummyModel),
        other => return Err(Error::Config(format!("Unknown model: {}", other))),
    };
    info!("🧠 Text model initialized (using {})", model.name());
    Ok(model)
}
