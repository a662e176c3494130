//! Text generation adapter: provider abstraction + disabled/mock clients.
//!
//! Generation is an opaque `prompt -> text` capability. Every failure is
//! recoverable; callers substitute a placeholder.

pub mod gemini;

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{Credentials, PipelineConfig};
use crate::error::{SignalError, SignalResult};

pub use gemini::GeminiGenerator;

pub type GenerateFuture<'a> = Pin<Box<dyn Future<Output = SignalResult<String>> + Send + 'a>>;

/// Sampling knobs passed through to the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateOptions {
    #[serde(default = "GenerateOptions::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "GenerateOptions::default_temperature")]
    pub temperature: f32,
    #[serde(default = "GenerateOptions::default_top_p")]
    pub top_p: f32,
}

impl GenerateOptions {
    fn default_max_tokens() -> u32 {
        1500
    }
    fn default_temperature() -> f32 {
        0.6
    }
    fn default_top_p() -> f32 {
        0.95
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: Self::default_max_tokens(),
            temperature: Self::default_temperature(),
            top_p: Self::default_top_p(),
        }
    }
}

/// Trait object used by the downstream stages (summaries, context, compose).
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a str, opts: &'a GenerateOptions) -> GenerateFuture<'a>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynGenerator = Arc<dyn TextGenerator>;

/// Factory: Gemini when a key is present, otherwise a disabled client.
pub fn build_generator(cfg: &PipelineConfig, creds: &Credentials) -> DynGenerator {
    match &creds.gemini {
        Some(key) => match GeminiGenerator::new(key, &cfg.endpoints.gemini_model) {
            Ok(g) => Arc::new(g),
            Err(e) => {
                warn!(target: "signals::generate", error = %e, "generator client init failed; generation disabled");
                Arc::new(DisabledGenerator)
            }
        },
        None => {
            warn!(target: "signals::config", "GEMINI_API_KEY not set; generation disabled");
            Arc::new(DisabledGenerator)
        }
    }
}

/// Always fails with a configuration error; used when no key is configured.
pub struct DisabledGenerator;

impl TextGenerator for DisabledGenerator {
    fn generate<'a>(&'a self, _prompt: &'a str, _opts: &'a GenerateOptions) -> GenerateFuture<'a> {
        Box::pin(async {
            Err(SignalError::Configuration(
                "text generation is not configured".to_string(),
            ))
        })
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic generator for tests/local runs. Returns `fixed` (or the
/// configured error) and records every prompt it sees.
#[derive(Default)]
pub struct MockGenerator {
    fixed: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn fixed(text: impl Into<String>) -> Self {
        Self {
            fixed: Some(text.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A generator whose every call fails with a provider error.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl TextGenerator for MockGenerator {
    fn generate<'a>(&'a self, prompt: &'a str, _opts: &'a GenerateOptions) -> GenerateFuture<'a> {
        if let Ok(mut g) = self.prompts.lock() {
            g.push(prompt.to_string());
        }
        let out = self.fixed.clone();
        Box::pin(async move {
            out.ok_or_else(|| SignalError::provider("mock", "scripted failure"))
        })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}
