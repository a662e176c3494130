// src/model.rs
//! Core records shared by the source clients, the fetch orchestrator, the cache
//! and the batch runner.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-component breakdown of a relevance score.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelevanceDetails {
    pub company_mentions: usize,
    pub variation_mentions: usize,
    pub keyword_matches: Vec<String>,
    pub industry_matches: Vec<String>,
    /// Whole days between publication and scoring time, when the date parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recency_days: Option<i64>,
}

/// One retrieved article/result. `url` is the dedup key within an entity's result set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: String,
    /// Extracted page text; only present when `content` was short.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub entity_name: String,
    pub is_competitor: bool,
    pub relevance_score: f64,
    pub relevance_details: RelevanceDetails,
}

impl NewsItem {
    /// Text the scorer sees: title, description and source excerpt.
    pub fn scoring_text(&self) -> String {
        format!("{} {} {}", self.title, self.description, self.content)
    }

    /// Attach extracted page text once. Later calls and empty text are ignored.
    pub fn attach_full_content(&mut self, text: String) {
        if self.full_content.is_none() && !text.is_empty() {
            self.full_content = Some(text);
        }
    }
}

/// Source-provided fields before scoring. Built by the source clients from
/// their wire formats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub title: String,
    pub description: String,
    pub content: String,
    pub url: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl RawItem {
    /// A raw item qualifies when it has a title and some body text.
    pub fn is_usable(&self) -> bool {
        !self.title.trim().is_empty()
            && !(self.description.trim().is_empty() && self.content.trim().is_empty())
    }
}

/// Input to the entity fetch orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchRequest {
    pub entity_name: String,
    #[serde(default)]
    pub competitor_name: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "FetchRequest::default_industry")]
    pub industry: String,
    #[serde(default = "FetchRequest::default_min")]
    pub min_articles: usize,
    #[serde(default = "FetchRequest::default_max")]
    pub max_articles: usize,
    #[serde(default)]
    pub force_refresh: bool,
}

impl FetchRequest {
    fn default_industry() -> String {
        "tech".to_string()
    }
    fn default_min() -> usize {
        3
    }
    fn default_max() -> usize {
        7
    }

    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            competitor_name: None,
            keywords: Vec::new(),
            industry: Self::default_industry(),
            min_articles: Self::default_min(),
            max_articles: Self::default_max(),
            force_refresh: false,
        }
    }

    /// Competitor name with blanks treated as absent.
    pub fn competitor(&self) -> Option<&str> {
        self.competitor_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Competitor items kept: two at most, never more than `max_articles`.
    pub fn competitor_cap(&self) -> usize {
        self.max_articles.clamp(1, 2)
    }
}

/// One batch input row. Only `prospect_company` drives the pipeline; the other
/// columns (and any extra ones) pass through to the outcome and the email prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Prospect {
    #[serde(default)]
    pub prospect_name: String,
    #[serde(default)]
    pub prospect_title: String,
    #[serde(default)]
    pub prospect_email: String,
    pub prospect_company: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Prospect {
    pub fn new(company: impl Into<String>) -> Self {
        Self {
            prospect_company: company.into(),
            ..Default::default()
        }
    }

    pub fn entity(&self) -> &str {
        self.prospect_company.trim()
    }
}

/// Non-fatal observations recorded during a fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Fewer non-competitor items than requested after backfill.
    BelowMinimum { found: usize, wanted: usize },
    /// Competitor fetch hit a transport error; competitor list left empty.
    CompetitorUnavailable { reason: String },
    /// Primary source unreachable; results (if any) came from the secondary.
    PrimaryUnreachable { reason: String },
}

/// Terminal state of an entity fetch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    Done,
    Failed,
}

/// Ranked results for one entity: primary items then competitor items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchResult {
    pub entity_name: String,
    pub primary: Vec<NewsItem>,
    pub competitor: Vec<NewsItem>,
    pub outcome: FetchOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl FetchResult {
    pub fn empty(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            primary: Vec::new(),
            competitor: Vec::new(),
            outcome: FetchOutcome::Done,
            failure_reason: None,
            diagnostics: Vec::new(),
        }
    }

    /// Flattened view: primary items followed by competitor items.
    pub fn items(&self) -> Vec<NewsItem> {
        self.primary
            .iter()
            .chain(self.competitor.iter())
            .cloned()
            .collect()
    }

    /// Rebuild the split view from a flattened (cached) list.
    pub fn from_items(entity_name: &str, items: &[NewsItem], max: usize) -> Self {
        let cap = max.min(2);
        let mut out = Self::empty(entity_name);
        out.primary = items
            .iter()
            .filter(|i| !i.is_competitor)
            .take(max)
            .cloned()
            .collect();
        out.competitor = items
            .iter()
            .filter(|i| i.is_competitor)
            .take(cap)
            .cloned()
            .collect();
        out
    }
}

/// Sort by relevance score, highest first. Stable for equal scores.
pub fn sort_by_score(items: &mut [NewsItem]) {
    items.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
}
