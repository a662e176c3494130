// src/sources/serper.rs
//! Secondary (backup) search source: Serper news search.
//! Used when the primary source is unreachable or returned too few items.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::terms::DEFAULT_KEYWORDS;
use crate::error::{SignalError, SignalResult};
use crate::extract::ContentExtractor;
use crate::model::{sort_by_score, NewsItem, RawItem};
use crate::sources::{clean_text, enrich_items, parse_published, EnrichContext};

pub const SOURCE_NAME: &str = "serper";
/// Results requested per search.
pub const PAGE_SIZE: usize = 10;
/// Results returned to the caller after ranking.
pub const MAX_RESULTS: usize = 5;
const MAX_QUERY_KEYWORDS: usize = 3;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchRequest {
    pub q: String,
    pub gl: String,
    pub hl: String,
    pub num: usize,
    #[serde(rename = "type")]
    pub kind: String,
}

impl SearchRequest {
    pub fn news(q: String) -> Self {
        Self {
            q,
            gl: "us".to_string(),
            hl: "en".to_string(),
            num: PAGE_SIZE,
            kind: "news".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SearchResponse {
    #[serde(default)]
    pub news: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SearchHit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl SearchHit {
    fn into_raw(self, now: DateTime<Utc>) -> RawItem {
        let snippet = clean_text(self.snippet.as_deref().unwrap_or_default());
        RawItem {
            title: clean_text(self.title.as_deref().unwrap_or_default()),
            description: snippet.clone(),
            content: snippet,
            url: self.link.as_deref().unwrap_or_default().trim().to_string(),
            source: self
                .source
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Google Search".to_string()),
            published_at: self.date.as_deref().and_then(|d| parse_published(d, now)),
        }
    }
}

/// Transport for the secondary source.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> SignalResult<SearchResponse>;
    fn name(&self) -> &'static str;
}

pub struct HttpSerper {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpSerper {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> SignalResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SignalError::Configuration(format!("serper client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl SearchBackend for HttpSerper {
    async fn search(&self, request: &SearchRequest) -> SignalResult<SearchResponse> {
        self.client
            .post(&self.url)
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| SignalError::from_reqwest(SOURCE_NAME, e))?
            .error_for_status()
            .map_err(|e| SignalError::from_reqwest(SOURCE_NAME, e))?
            .json::<SearchResponse>()
            .await
            .map_err(|e| SignalError::provider(SOURCE_NAME, format!("decode: {e}")))
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }
}

/// Secondary source client. Without a backend it is a no-op.
#[derive(Clone)]
pub struct SecondarySource {
    backend: Option<Arc<dyn SearchBackend>>,
    extractor: ContentExtractor,
    width: usize,
}

impl SecondarySource {
    pub fn new(
        backend: Option<Arc<dyn SearchBackend>>,
        extractor: ContentExtractor,
        width: usize,
    ) -> Self {
        Self {
            backend,
            extractor,
            width: width.max(1),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Up to five scored items, highest score first. Any failure yields an empty list.
    pub async fn fetch(
        &self,
        entity_name: &str,
        keywords: &[String],
        industry: &str,
        now: DateTime<Utc>,
    ) -> Vec<NewsItem> {
        let Some(backend) = &self.backend else {
            return Vec::new();
        };

        let request = SearchRequest::news(search_query(entity_name, keywords));
        let response = match backend.search(&request).await {
            Ok(r) => r,
            Err(e) => {
                counter!("signals_provider_errors_total").increment(1);
                warn!(target: "signals::secondary", entity = entity_name, error = %e, "backup search failed");
                return Vec::new();
            }
        };

        let raw: Vec<RawItem> = response.news.into_iter().map(|h| h.into_raw(now)).collect();
        let ctx = EnrichContext {
            entity_name,
            keywords,
            industry,
            is_competitor: false,
            now,
        };
        let mut items = enrich_items(raw, ctx, &self.extractor, self.width).await;
        sort_by_score(&mut items);
        items.truncate(MAX_RESULTS);

        info!(target: "signals::secondary", entity = entity_name, items = items.len(), "backup search complete");
        items
    }
}

/// `Entity k1 k2 k3`, using the first three defaults when no keywords are given.
pub fn search_query(entity_name: &str, keywords: &[String]) -> String {
    let mut kws: Vec<&str> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .take(MAX_QUERY_KEYWORDS)
        .collect();
    if kws.is_empty() {
        kws = DEFAULT_KEYWORDS.iter().take(MAX_QUERY_KEYWORDS).copied().collect();
    }
    format!("{} {}", entity_name.trim(), kws.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_uses_three_keywords() {
        let kws: Vec<String> = ["cloud", "AI", "edge", "5g"].iter().map(|s| s.to_string()).collect();
        assert_eq!(search_query("Acme Corp", &kws), "Acme Corp cloud AI edge");
        assert_eq!(search_query("Acme", &[]), "Acme cloud AI artificial intelligence");
    }

    #[test]
    fn request_serializes_wire_shape() {
        let v = serde_json::to_value(SearchRequest::news("Acme".into())).unwrap();
        assert_eq!(v["type"], "news");
        assert_eq!(v["num"], 10);
        assert_eq!(v["gl"], "us");
        assert_eq!(v["hl"], "en");
    }

    #[test]
    fn hit_maps_snippet_to_body_and_default_source() {
        let h = SearchHit {
            title: Some("Acme wins".into()),
            snippet: Some("Acme won a deal".into()),
            link: Some("https://n.test/1".into()),
            date: Some("2 days ago".into()),
            source: None,
        };
        let raw = h.into_raw(Utc::now());
        assert_eq!(raw.description, raw.content);
        assert_eq!(raw.source, "Google Search");
        assert!(raw.published_at.is_some());
    }

    #[test]
    fn null_fields_do_not_sink_the_response() {
        let body = r#"{"news":[
            {"title":null,"snippet":"Acme grows","link":"https://a.test","date":null,"source":null},
            {"title":"Acme hires","snippet":"Acme hired a CFO","link":"https://b.test"}
        ]}"#;
        let resp: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.news.len(), 2);

        let raw: Vec<RawItem> = resp.news.into_iter().map(|h| h.into_raw(Utc::now())).collect();
        assert!(!raw[0].is_usable());
        assert_eq!(raw[0].title, "");
        assert!(raw[1].is_usable());
        assert_eq!(raw[1].url, "https://b.test");
    }
}
