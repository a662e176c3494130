// src/extract.rs
//! Single-page content extraction: fetch one URL, strip page chrome, return
//! bounded plain text. Failures are logged and yield an empty string.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use scraper::{Html, Node};
use tracing::{debug, warn};

use crate::error::{SignalError, SignalResult};
use crate::model::NewsItem;

/// Word budget for extracted text.
pub const MAX_WORDS: usize = 800;
/// Items whose source excerpt is shorter than this get extracted.
pub const EXTRACT_BELOW_CHARS: usize = 500;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Elements whose text never reaches the output.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "nav", "header", "footer", "aside"];

/// Raw page retrieval. Separated so tests can serve HTML from memory.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_html(&self, url: &str) -> SignalResult<String>;
    fn name(&self) -> &'static str;
}

pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> SignalResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_UA)
            .timeout(timeout)
            .build()
            .map_err(|e| SignalError::Configuration(format!("page fetch client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_html(&self, url: &str) -> SignalResult<String> {
        let extraction = |e: reqwest::Error| SignalError::Extraction {
            url: url.to_string(),
            message: e.to_string(),
        };
        self.client
            .get(url)
            .send()
            .await
            .map_err(extraction)?
            .error_for_status()
            .map_err(extraction)?
            .text()
            .await
            .map_err(extraction)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[derive(Clone)]
pub struct ContentExtractor {
    fetcher: Arc<dyn PageFetcher>,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Extractor backed by a real HTTP client with the given timeout.
    pub fn http(timeout: Duration) -> SignalResult<Self> {
        Ok(Self::new(Arc::new(HttpPageFetcher::new(timeout)?)))
    }

    /// Plain text of the page at `url`, or an empty string on any failure.
    pub async fn extract(&self, url: &str) -> String {
        match self.fetcher.fetch_html(url).await {
            Ok(html) => {
                let text = html_to_text(&html);
                debug!(target: "signals::extract", url, words = text.split_whitespace().count(), "extracted page");
                text
            }
            Err(e) => {
                warn!(target: "signals::extract", url, error = %e, fetcher = self.fetcher.name(), "content extraction failed");
                counter!("signals_extract_failures_total").increment(1);
                String::new()
            }
        }
    }

    /// Extract and attach page text when the item's excerpt is short.
    pub async fn supplement(&self, item: &mut NewsItem) {
        if !needs_extraction(item) {
            return;
        }
        let text = self.extract(&item.url).await;
        item.attach_full_content(text);
    }
}

/// Only short excerpts with a URL are worth a page fetch.
pub fn needs_extraction(item: &NewsItem) -> bool {
    !item.url.trim().is_empty() && item.content.chars().count() < EXTRACT_BELOW_CHARS
}

/// Reduce an HTML document to whitespace-collapsed text, skipping page chrome,
/// and cap it at `MAX_WORDS`.
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();
    for node in doc.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| match a.value() {
            Node::Element(el) => SKIPPED_ELEMENTS.contains(&el.name()),
            _ => false,
        });
        if !hidden {
            parts.push(&text.text);
        }
    }
    truncate_words(&parts.join(" "), MAX_WORDS)
}

/// Collapse whitespace and keep the first `max` words, appending `...` when cut.
pub fn truncate_words(text: &str, max: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > max {
        format!("{}...", words[..max].join(" "))
    } else {
        words.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_chrome_and_scripts() {
        let html = r#"<html><head><style>body{color:red}</style><script>var x=1;</script></head>
            <body><header>Site Header</header><nav>Home | About</nav>
            <article><h1>Acme  raises</h1><p>Acme raised
            funds.</p></article><aside>Related</aside><footer>(c) 2025</footer></body></html>"#;
        let text = html_to_text(html);
        assert_eq!(text, "Acme raises Acme raised funds.");
    }

    #[test]
    fn truncates_to_word_budget_with_marker() {
        let long = (0..850).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let out = truncate_words(&long, MAX_WORDS);
        assert!(out.ends_with("w799..."));
        assert_eq!(out.split_whitespace().count(), MAX_WORDS);

        assert_eq!(truncate_words("a  b\n c", 800), "a b c");
    }
}
