// src/fakes.rs
//! In-memory stand-ins for the HTTP collaborators. Used by unit and
//! integration tests and by local dry runs; they perform no I/O.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::batch::ProgressListener;
use crate::error::{SignalError, SignalResult};
use crate::extract::{ContentExtractor, PageFetcher};
use crate::sources::newsapi::{ArticleSource, NewsApiArticle, NewsApiResponse, NewsQuery};
use crate::sources::serper::{SearchHit, SearchRequest, SearchResponse};
use crate::sources::{NewsApiBackend, SearchBackend};

/// Primary-source fake. Responses are scripted per entity (matched by the
/// quoted entity name in the query) and handed out in order; an exhausted or
/// unknown entity gets an ok-but-empty response.
#[derive(Default)]
pub struct StaticNewsBackend {
    scripts: Mutex<Vec<(String, VecDeque<SignalResult<NewsApiResponse>>)>>,
    queries: Mutex<Vec<NewsQuery>>,
}

impl StaticNewsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `responses` for queries about `entity`.
    pub fn on(self, entity: &str, responses: Vec<SignalResult<NewsApiResponse>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .push((format!("\"{entity}\""), responses.into()));
        self
    }

    pub fn queries(&self) -> Vec<NewsQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl NewsApiBackend for StaticNewsBackend {
    async fn everything(&self, query: &NewsQuery) -> SignalResult<NewsApiResponse> {
        self.queries.lock().unwrap().push(query.clone());
        let mut scripts = self.scripts.lock().unwrap();
        let next = scripts
            .iter_mut()
            .find(|(needle, _)| query.q.starts_with(needle.as_str()))
            .and_then(|(_, queue)| queue.pop_front());
        next.unwrap_or_else(|| Ok(NewsApiResponse::ok(Vec::new())))
    }

    fn name(&self) -> &'static str {
        "static-news"
    }
}

/// Secondary-source fake returning one fixed response for every request.
pub struct StaticSearchBackend {
    response: SignalResult<SearchResponse>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl StaticSearchBackend {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            response: Ok(SearchResponse { news: hits }),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: SignalError) -> Self {
        Self {
            response: Err(err),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for StaticSearchBackend {
    async fn search(&self, request: &SearchRequest) -> SignalResult<SearchResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.response.clone()
    }

    fn name(&self) -> &'static str {
        "static-search"
    }
}

/// Page fetcher serving HTML from a map; unknown URLs fail with an extraction error.
#[derive(Default)]
pub struct StaticPageFetcher {
    pages: HashMap<String, String>,
    calls: AtomicUsize,
}

impl StaticPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for StaticPageFetcher {
    async fn fetch_html(&self, url: &str) -> SignalResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| SignalError::Extraction {
                url: url.to_string(),
                message: "no such page".to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "static-pages"
    }
}

/// Extractor whose every fetch fails (items keep their source text).
pub fn offline_extractor() -> ContentExtractor {
    ContentExtractor::new(Arc::new(StaticPageFetcher::new()))
}

/// Collects progress fractions and step messages.
#[derive(Default)]
pub struct RecordingListener {
    pub fractions: Mutex<Vec<f64>>,
    pub steps: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn fractions(&self) -> Vec<f64> {
        self.fractions.lock().unwrap().clone()
    }

    pub fn steps(&self) -> Vec<String> {
        self.steps.lock().unwrap().clone()
    }
}

impl ProgressListener for RecordingListener {
    fn on_progress(&self, fraction: f64) {
        self.fractions.lock().unwrap().push(fraction);
    }

    fn on_step(&self, message: &str) {
        self.steps.lock().unwrap().push(message.to_string());
    }
}

/// Primary-source article with the given fields and a wire-format date.
pub fn article(title: &str, body: &str, url: &str, published_at: Option<&str>) -> NewsApiArticle {
    NewsApiArticle {
        title: Some(title.to_string()),
        description: Some(body.to_string()),
        content: Some(body.to_string()),
        url: Some(url.to_string()),
        published_at: published_at.map(str::to_string),
        source: Some(ArticleSource {
            name: Some("Test Wire".to_string()),
        }),
    }
}

/// Secondary-source hit.
pub fn hit(title: &str, snippet: &str, link: &str) -> SearchHit {
    SearchHit {
        title: Some(title.to_string()),
        snippet: Some(snippet.to_string()),
        link: Some(link.to_string()),
        date: None,
        source: Some("Search Wire".to_string()),
    }
}
