// src/config/mod.rs
//! Pipeline configuration: defaults, file loading (TOML or JSON), env overrides,
//! and API credentials.

pub mod terms;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::generate::GenerateOptions;

pub const ENV_CONFIG_PATH: &str = "SIGNALS_CONFIG_PATH";
pub const ENV_MIN_ARTICLES: &str = "SIGNALS_MIN_ARTICLES";
pub const ENV_MAX_ARTICLES: &str = "SIGNALS_MAX_ARTICLES";
pub const ENV_LOOKBACK_DAYS: &str = "SIGNALS_LOOKBACK_DAYS";
pub const ENV_WORKER_WIDTH: &str = "SIGNALS_WORKER_WIDTH";

pub const ENV_NEWS_API_KEY: &str = "NEWS_API";
pub const ENV_SERPER_API_KEY: &str = "SERPER_API_KEY";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";

fn default_min_articles() -> usize {
    3
}
fn default_max_articles() -> usize {
    7
}
fn default_lookback_days() -> i64 {
    60
}
fn default_worker_width() -> usize {
    5
}
fn default_extract_timeout_secs() -> u64 {
    10
}
fn default_industry() -> String {
    "tech".to_string()
}
fn default_true() -> bool {
    true
}

/// Facts about the product being pitched; fed into context and compose prompts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub usp: String,
}

/// Base URLs of the external collaborators. Overridable for staging/proxies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoints {
    #[serde(default = "Endpoints::default_newsapi")]
    pub newsapi_url: String,
    #[serde(default = "Endpoints::default_serper")]
    pub serper_url: String,
    #[serde(default = "Endpoints::default_gemini_model")]
    pub gemini_model: String,
}

impl Endpoints {
    fn default_newsapi() -> String {
        "https://newsapi.org/v2/everything".to_string()
    }
    fn default_serper() -> String {
        "https://google.serper.dev/search".to_string()
    }
    fn default_gemini_model() -> String {
        "gemini-2.0-flash-001".to_string()
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            newsapi_url: Self::default_newsapi(),
            serper_url: Self::default_serper(),
            gemini_model: Self::default_gemini_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default = "default_min_articles")]
    pub min_articles: usize,
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,
    /// Primary-source lookback window, in days, ending today.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    /// Concurrent extraction+scoring operations per fetch.
    #[serde(default = "default_worker_width")]
    pub worker_width: usize,
    #[serde(default = "default_extract_timeout_secs")]
    pub extract_timeout_secs: u64,
    #[serde(default = "default_industry")]
    pub default_industry: String,
    #[serde(default = "default_true")]
    pub generate_context: bool,
    #[serde(default)]
    pub product: ProductProfile,
    #[serde(default)]
    pub generation: GenerateOptions,
    #[serde(default)]
    pub endpoints: Endpoints,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_articles: default_min_articles(),
            max_articles: default_max_articles(),
            lookback_days: default_lookback_days(),
            worker_width: default_worker_width(),
            extract_timeout_secs: default_extract_timeout_secs(),
            default_industry: default_industry(),
            generate_context: true,
            product: ProductProfile::default(),
            generation: GenerateOptions::default(),
            endpoints: Endpoints::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit path. Supports TOML or JSON; env overrides applied after.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())?;
        Ok(cfg.with_env_overrides().sanitized())
    }

    /// Load using env var + fallbacks:
    /// 1) $SIGNALS_CONFIG_PATH
    /// 2) config/pipeline.toml
    /// 3) config/pipeline.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in ["config/pipeline.toml", "config/pipeline.json"] {
            let p = PathBuf::from(candidate);
            if p.exists() {
                return Self::load_from(&p);
            }
        }
        Ok(Self::default().with_env_overrides().sanitized())
    }

    /// Apply `SIGNALS_*` numeric overrides; unparsable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse::<usize>(ENV_MIN_ARTICLES) {
            self.min_articles = v;
        }
        if let Some(v) = env_parse::<usize>(ENV_MAX_ARTICLES) {
            self.max_articles = v;
        }
        if let Some(v) = env_parse::<i64>(ENV_LOOKBACK_DAYS) {
            self.lookback_days = v;
        }
        if let Some(v) = env_parse::<usize>(ENV_WORKER_WIDTH) {
            self.worker_width = v;
        }
        self
    }

    /// Clamp values into a usable range.
    pub fn sanitized(mut self) -> Self {
        self.max_articles = self.max_articles.max(1);
        self.min_articles = self.min_articles.min(self.max_articles);
        self.worker_width = self.worker_width.max(1);
        self.lookback_days = self.lookback_days.max(1);
        self.extract_timeout_secs = self.extract_timeout_secs.max(1);
        if self.default_industry.trim().is_empty() {
            self.default_industry = default_industry();
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing pipeline config json");
    }
    match toml::from_str::<PipelineConfig>(s) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!("unsupported pipeline config format: {toml_err}")),
    }
}

/// API credentials, read from the environment. Absent or blank keys become `None`
/// and turn the matching collaborator into a no-op.
#[derive(Clone, Default, PartialEq)]
pub struct Credentials {
    pub news_api: Option<String>,
    pub serper: Option<String>,
    pub gemini: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            news_api: non_blank_env(ENV_NEWS_API_KEY),
            serper: non_blank_env(ENV_SERPER_API_KEY),
            gemini: non_blank_env(ENV_GEMINI_API_KEY),
        }
    }
}

// Keys never reach logs; only their presence.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("news_api", &self.news_api.is_some())
            .field("serper", &self.serper.is_some())
            .field("gemini", &self.gemini.is_some())
            .finish()
    }
}

fn non_blank_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn defaults_match_pipeline_policy() {
        let c = PipelineConfig::default();
        assert_eq!(c.min_articles, 3);
        assert_eq!(c.max_articles, 7);
        assert_eq!(c.lookback_days, 60);
        assert_eq!(c.worker_width, 5);
        assert_eq!(c.extract_timeout_secs, 10);
    }

    #[test]
    fn sanitize_keeps_min_below_max() {
        let c = PipelineConfig {
            min_articles: 9,
            max_articles: 0,
            worker_width: 0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(c.max_articles, 1);
        assert_eq!(c.min_articles, 1);
        assert_eq!(c.worker_width, 1);
    }

    #[test]
    fn toml_and_json_both_parse() {
        let toml = r#"
min_articles = 2
max_articles = 5

[product]
name = "SecureShield AI"
"#;
        let c = parse_config(toml, "toml").unwrap();
        assert_eq!(c.max_articles, 5);
        assert_eq!(c.product.name, "SecureShield AI");
        assert_eq!(c.lookback_days, 60);

        let json = r#"{"max_articles": 4, "worker_width": 2}"#;
        let j = parse_config(json, "json").unwrap();
        assert_eq!(j.max_articles, 4);
        assert_eq!(j.worker_width, 2);
        assert_eq!(j.min_articles, 3);
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_apply_and_bad_values_are_ignored() {
        env::set_var(ENV_MAX_ARTICLES, "4");
        env::set_var(ENV_WORKER_WIDTH, "not-a-number");
        let c = PipelineConfig::default().with_env_overrides().sanitized();
        assert_eq!(c.max_articles, 4);
        assert_eq!(c.worker_width, 5);
        env::remove_var(ENV_MAX_ARTICLES);
        env::remove_var(ENV_WORKER_WIDTH);
    }

    #[test]
    fn credentials_debug_hides_keys() {
        let c = Credentials {
            news_api: Some("secret-key".into()),
            serper: None,
            gemini: None,
        };
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("news_api: true"));
    }
}
