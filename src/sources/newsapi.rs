// src/sources/newsapi.rs
//! Primary news source (NewsAPI `/v2/everything`).
//!
//! A fetch is a two-attempt state transition: the strict query (exact entity
//! name AND any of up to five keywords, inside the lookback window) and, when
//! that reports a non-ok status or returns nothing, one simplified query with
//! the entity name only. A failed simplified attempt means zero results.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::terms::DEFAULT_KEYWORDS;
use crate::error::{SignalError, SignalResult};
use crate::extract::ContentExtractor;
use crate::model::{NewsItem, RawItem};
use crate::sources::{clean_text, enrich_items, parse_published, EnrichContext};

pub const SOURCE_NAME: &str = "newsapi";
/// Keywords beyond this many are dropped from the query (still used for scoring).
pub const MAX_QUERY_KEYWORDS: usize = 5;

/// Query parameters sent to the provider (`apiKey` is added by the HTTP backend).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewsQuery {
    pub q: String,
    pub language: String,
    #[serde(rename = "sortBy")]
    pub sort_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: usize,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NewsApiResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub articles: Vec<NewsApiArticle>,
    #[serde(default)]
    pub message: Option<String>,
}

impl NewsApiResponse {
    pub fn ok(articles: Vec<NewsApiArticle>) -> Self {
        Self {
            status: "ok".to_string(),
            articles,
            message: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            status: "error".to_string(),
            articles: Vec::new(),
            message: Some(message.to_string()),
        }
    }

    fn is_ok_with_items(&self) -> bool {
        self.status == "ok" && !self.articles.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NewsApiArticle {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "publishedAt")]
    pub published_at: Option<String>,
    #[serde(default)]
    pub source: Option<ArticleSource>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ArticleSource {
    #[serde(default)]
    pub name: Option<String>,
}

impl NewsApiArticle {
    fn into_raw(self, now: DateTime<Utc>) -> RawItem {
        RawItem {
            title: clean_text(self.title.as_deref().unwrap_or_default()),
            description: clean_text(self.description.as_deref().unwrap_or_default()),
            content: clean_text(self.content.as_deref().unwrap_or_default()),
            url: self.url.unwrap_or_default().trim().to_string(),
            source: self
                .source
                .and_then(|s| s.name)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Unknown Source".to_string()),
            published_at: self
                .published_at
                .as_deref()
                .and_then(|s| parse_published(s, now)),
        }
    }
}

/// Transport for the primary source.
#[async_trait]
pub trait NewsApiBackend: Send + Sync {
    async fn everything(&self, query: &NewsQuery) -> SignalResult<NewsApiResponse>;
    fn name(&self) -> &'static str;
}

pub struct HttpNewsApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpNewsApi {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> SignalResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent("prospect-signals/0.1")
            .build()
            .map_err(|e| SignalError::Configuration(format!("newsapi client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl NewsApiBackend for HttpNewsApi {
    async fn everything(&self, query: &NewsQuery) -> SignalResult<NewsApiResponse> {
        let resp = self
            .client
            .get(&self.base_url)
            .header("Accept", "application/json")
            .query(query)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| SignalError::from_reqwest(SOURCE_NAME, e))?;

        let status = resp.status();
        if !status.is_success() {
            // The provider reports errors as JSON; keep its message when present.
            let detail = resp
                .json::<NewsApiResponse>()
                .await
                .ok()
                .and_then(|r| r.message)
                .unwrap_or_default();
            return Err(SignalError::provider(
                SOURCE_NAME,
                format!("http {status} {detail}").trim().to_string(),
            ));
        }

        resp.json::<NewsApiResponse>()
            .await
            .map_err(|e| SignalError::provider(SOURCE_NAME, format!("decode: {e}")))
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }
}

/// Which query shape an attempt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryAttempt {
    Strict,
    Simplified,
}

/// Primary source client. Without a backend (no credential) every fetch
/// reports a configuration error and performs no I/O.
#[derive(Clone)]
pub struct PrimarySource {
    backend: Option<Arc<dyn NewsApiBackend>>,
    extractor: ContentExtractor,
    lookback_days: i64,
    width: usize,
}

impl PrimarySource {
    pub fn new(
        backend: Option<Arc<dyn NewsApiBackend>>,
        extractor: ContentExtractor,
        lookback_days: i64,
        width: usize,
    ) -> Self {
        Self {
            backend,
            extractor,
            lookback_days: lookback_days.max(1),
            width: width.max(1),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Fetch, extract and score items about `entity_name`; unsorted.
    ///
    /// Errors only with `Transport` (strict attempt unreachable) or
    /// `Configuration` (no backend). Provider problems become a retry or
    /// an empty list.
    pub async fn fetch(
        &self,
        entity_name: &str,
        keywords: &[String],
        industry: &str,
        page_size: usize,
        is_competitor: bool,
        now: DateTime<Utc>,
    ) -> SignalResult<Vec<NewsItem>> {
        let Some(backend) = &self.backend else {
            return Err(SignalError::Configuration(
                "primary news source has no API key".to_string(),
            ));
        };
        let t0 = Instant::now();
        let keywords = effective_keywords(keywords);

        let mut attempt = QueryAttempt::Strict;
        let articles = loop {
            let query = self.build_query(attempt, entity_name, &keywords, page_size, now);
            counter!("signals_primary_requests_total").increment(1);
            debug!(target: "signals::primary", entity = entity_name, ?attempt, q = %query.q, "querying primary source");

            let failure = match backend.everything(&query).await {
                Ok(resp) if resp.is_ok_with_items() => break resp.articles,
                Ok(resp) => format!(
                    "status={} items={} {}",
                    resp.status,
                    resp.articles.len(),
                    resp.message.unwrap_or_default()
                ),
                Err(e) if e.is_transport() && attempt == QueryAttempt::Strict => {
                    counter!("signals_provider_errors_total").increment(1);
                    warn!(target: "signals::primary", entity = entity_name, error = %e, "primary source unreachable");
                    return Err(e);
                }
                Err(e) => {
                    counter!("signals_provider_errors_total").increment(1);
                    e.to_string()
                }
            };

            match attempt {
                QueryAttempt::Strict => {
                    counter!("signals_primary_retries_total").increment(1);
                    warn!(target: "signals::primary", entity = entity_name, reason = %failure.trim(), "strict query failed, trying simplified query");
                    attempt = QueryAttempt::Simplified;
                }
                QueryAttempt::Simplified => {
                    info!(target: "signals::primary", entity = entity_name, reason = %failure.trim(), "simplified query yielded nothing");
                    break Vec::new();
                }
            }
        };

        let raw: Vec<RawItem> = articles
            .into_iter()
            .take(page_size)
            .map(|a| a.into_raw(now))
            .collect();

        let ctx = EnrichContext {
            entity_name,
            keywords: &keywords,
            industry,
            is_competitor,
            now,
        };
        let items = enrich_items(raw, ctx, &self.extractor, self.width).await;

        histogram!("signals_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        info!(target: "signals::primary", entity = entity_name, competitor = is_competitor, items = items.len(), "primary fetch complete");
        Ok(items)
    }

    pub fn build_query(
        &self,
        attempt: QueryAttempt,
        entity_name: &str,
        keywords: &[String],
        page_size: usize,
        now: DateTime<Utc>,
    ) -> NewsQuery {
        match attempt {
            QueryAttempt::Strict => NewsQuery {
                q: strict_query(entity_name, keywords),
                language: "en".to_string(),
                sort_by: "relevancy".to_string(),
                from: Some(
                    (now - ChronoDuration::days(self.lookback_days))
                        .format("%Y-%m-%d")
                        .to_string(),
                ),
                to: Some(now.format("%Y-%m-%d").to_string()),
                page_size,
            },
            QueryAttempt::Simplified => NewsQuery {
                q: format!("\"{entity_name}\""),
                language: "en".to_string(),
                sort_by: "relevancy".to_string(),
                from: None,
                to: None,
                page_size,
            },
        }
    }
}

/// Caller keywords (trimmed, blanks dropped), or the first five defaults when none.
pub fn effective_keywords(keywords: &[String]) -> Vec<String> {
    let cleaned: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if cleaned.is_empty() {
        DEFAULT_KEYWORDS
            .iter()
            .take(MAX_QUERY_KEYWORDS)
            .map(|k| k.to_string())
            .collect()
    } else {
        cleaned
    }
}

/// `"Entity" AND ("k1" OR "k2" ...)` with at most five keywords.
pub fn strict_query(entity_name: &str, keywords: &[String]) -> String {
    let any_of = keywords
        .iter()
        .take(MAX_QUERY_KEYWORDS)
        .map(|k| format!("\"{k}\""))
        .collect::<Vec<_>>()
        .join(" OR ");
    if any_of.is_empty() {
        format!("\"{entity_name}\"")
    } else {
        format!("\"{entity_name}\" AND ({any_of})")
    }
}
