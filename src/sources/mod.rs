// src/sources/mod.rs
//! News source clients and the shared item enrichment step
//! (page extraction + scoring, fanned out over a bounded pool).

pub mod newsapi;
pub mod serper;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveDateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::extract::ContentExtractor;
use crate::model::{NewsItem, RawItem};
use crate::relevance::{score_input, ScoreInput};

pub use newsapi::{HttpNewsApi, NewsApiBackend, PrimarySource, QueryAttempt};
pub use serper::{HttpSerper, SearchBackend, SecondarySource};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "signals_primary_requests_total",
            "Requests sent to the primary news source."
        );
        describe_counter!(
            "signals_primary_retries_total",
            "Primary fetches retried with the simplified query."
        );
        describe_counter!(
            "signals_provider_errors_total",
            "Source transport/provider errors."
        );
        describe_counter!(
            "signals_extract_failures_total",
            "Page extractions that yielded no text."
        );
        describe_counter!(
            "signals_items_scored_total",
            "News items scored across all sources."
        );
        describe_counter!(
            "signals_backfill_total",
            "Entity fetches that consulted the secondary source."
        );
        describe_histogram!("signals_fetch_ms", "Entity fetch time in milliseconds.");
    });
}

/// Who the items are about and how to score them.
#[derive(Debug, Clone, Copy)]
pub struct EnrichContext<'a> {
    pub entity_name: &'a str,
    pub keywords: &'a [String],
    pub industry: &'a str,
    pub is_competitor: bool,
    pub now: DateTime<Utc>,
}

/// Turn usable raw items into scored `NewsItem`s. Extraction + scoring for up to
/// `width` items runs concurrently; output order is unspecified.
pub async fn enrich_items(
    raw: Vec<RawItem>,
    ctx: EnrichContext<'_>,
    extractor: &ContentExtractor,
    width: usize,
) -> Vec<NewsItem> {
    let items: Vec<NewsItem> = stream::iter(
        raw.into_iter()
            .filter(RawItem::is_usable)
            .map(|r| enrich_one(r, ctx, extractor)),
    )
    .buffer_unordered(width.max(1))
    .collect()
    .await;

    counter!("signals_items_scored_total").increment(items.len() as u64);
    items
}

async fn enrich_one(raw: RawItem, ctx: EnrichContext<'_>, extractor: &ContentExtractor) -> NewsItem {
    let mut item = NewsItem {
        url: raw.url,
        title: raw.title,
        description: raw.description,
        content: raw.content,
        full_content: None,
        source: raw.source,
        published_at: raw.published_at,
        entity_name: ctx.entity_name.to_string(),
        is_competitor: ctx.is_competitor,
        relevance_score: 0.0,
        relevance_details: Default::default(),
    };

    extractor.supplement(&mut item).await;

    let text = item.scoring_text();
    let (score, details) = score_input(&ScoreInput {
        text: &text,
        entity_name: ctx.entity_name,
        keywords: ctx.keywords,
        industry: ctx.industry,
        is_competitor: ctx.is_competitor,
        published_at: item.published_at,
        now: ctx.now,
    });
    item.relevance_score = score;
    item.relevance_details = details;
    item
}

/// Decode entities, strip tags, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    let decoded = html_escape::decode_html_entities(s);
    let stripped = re_tags.replace_all(&decoded, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse the date formats the sources emit. Unknown formats yield `None`.
///
/// Accepted: RFC 3339 (`2025-03-07T10:00:00Z`), a `YYYY-MM-DD` prefix,
/// `Mar 7, 2025`, and relative forms like `3 days ago` (resolved against `now`).
pub fn parse_published(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(prefix) = s.get(..10) {
        if let Ok(d) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return d.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
        }
    }
    for fmt in ["%b %d, %Y", "%B %d, %Y", "%d %b %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
        }
    }
    if let Ok(n) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(n.and_utc());
    }
    parse_relative(s, now)
}

fn parse_relative(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    static RE_REL: OnceCell<Regex> = OnceCell::new();
    let re = RE_REL.get_or_init(|| {
        Regex::new(r"(?i)^(\d+)\s+(minute|min|hour|day|week|month)s?\s+ago$").expect("relative regex")
    });
    let caps = re.captures(s)?;
    let n: i64 = caps.get(1)?.as_str().parse().ok()?;
    let delta = match caps.get(2)?.as_str().to_ascii_lowercase().as_str() {
        "minute" | "min" => ChronoDuration::minutes(n),
        "hour" => ChronoDuration::hours(n),
        "day" => ChronoDuration::days(n),
        "week" => ChronoDuration::weeks(n),
        "month" => ChronoDuration::days(n * 30),
        _ => return None,
    };
    now.checked_sub_signed(delta)
}
