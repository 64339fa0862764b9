use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use nh_core::{CompletionRequest, Result, TextGenerator};

type Responder = dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync;

/// A text generator driven by a closure, for wiring up pipelines without a live service.
pub struct ScriptedModel {
    responder: Box<Responder>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedModel {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(request)
    }
}
