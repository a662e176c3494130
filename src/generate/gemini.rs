//! Gemini `generateContent` provider.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerateFuture, GenerateOptions, TextGenerator};
use crate::error::{SignalError, SignalResult};

pub const SOURCE_NAME: &str = "gemini";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Req<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize, Default)]
struct Resp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<RespContent>,
}

#[derive(Deserialize)]
struct RespContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}

#[derive(Deserialize)]
struct RespPart {
    #[serde(default)]
    text: String,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> SignalResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent("prospect-signals/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SignalError::Configuration(format!("gemini client: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    async fn generate_impl(&self, prompt: &str, opts: &GenerateOptions) -> SignalResult<String> {
        let req = Req {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: opts.max_tokens,
                temperature: opts.temperature,
                top_p: opts.top_p,
            },
        };
        let url = format!("{BASE_URL}/{}:generateContent", self.model);

        let body: Resp = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&req)
            .send()
            .await
            .map_err(|e| SignalError::from_reqwest(SOURCE_NAME, e))?
            .error_for_status()
            .map_err(|e| SignalError::from_reqwest(SOURCE_NAME, e))?
            .json()
            .await
            .map_err(|e| SignalError::provider(SOURCE_NAME, format!("decode: {e}")))?;

        let text = first_text(body);
        debug!(target: "signals::generate", chars = text.len(), "generation complete");
        if text.trim().is_empty() {
            return Err(SignalError::provider(SOURCE_NAME, "empty completion"));
        }
        Ok(text.trim().to_string())
    }
}

fn first_text(resp: Resp) -> String {
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
        .unwrap_or_default()
}

impl TextGenerator for GeminiGenerator {
    fn generate<'a>(&'a self, prompt: &'a str, opts: &'a GenerateOptions) -> GenerateFuture<'a> {
        Box::pin(self.generate_impl(prompt, opts))
    }
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }
}
