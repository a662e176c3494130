// src/relevance.rs
//! Relevance scoring for candidate news items.
//!
//! The score is an additive heuristic over plain text:
//! - entity mentions (case-insensitive substring count),
//! - punctuated/possessive variations of the entity name,
//! - product keyword hits,
//! - industry term hits (default keyword list + industry publisher list),
//! - recency, when the item carries a parseable publish date,
//! followed by a multiplicative penalty for thin text (< 500 chars).
//!
//! Weights are a fixed compatibility contract; changing any of them changes
//! ranking for every cached entity. No I/O, no mutation of inputs.

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::config::terms::industry_terms;
use crate::model::RelevanceDetails;

/// Texts shorter than this (in chars) are multiplied by `SHORT_TEXT_FACTOR`.
pub const SHORT_TEXT_CHARS: usize = 500;
pub const SHORT_TEXT_FACTOR: f64 = 0.7;

/// Points per hit and caps, split by primary entity vs competitor.
#[derive(Debug, Clone, Copy)]
struct Weights {
    mention: usize,
    mention_cap: usize,
    variation: usize,
    variation_cap: usize,
    keyword: usize,
}

const PRIMARY: Weights = Weights {
    mention: 5,
    mention_cap: 25,
    variation: 2,
    variation_cap: 10,
    keyword: 3,
};

const COMPETITOR: Weights = Weights {
    mention: 3,
    mention_cap: 15,
    variation: 1,
    variation_cap: 5,
    keyword: 2,
};

const INDUSTRY_TERM_POINTS: f64 = 1.0;

/// Everything the scorer looks at for one item.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub text: &'a str,
    pub entity_name: &'a str,
    pub keywords: &'a [String],
    pub industry: &'a str,
    pub is_competitor: bool,
    pub published_at: Option<DateTime<Utc>>,
    /// Reference time for recency; pass a fixed value for reproducible scores.
    pub now: DateTime<Utc>,
}

/// Score text without a publish date (no recency component).
pub fn score(
    text: &str,
    entity_name: &str,
    keywords: &[String],
    industry: &str,
    is_competitor: bool,
) -> (f64, RelevanceDetails) {
    score_input(&ScoreInput {
        text,
        entity_name,
        keywords,
        industry,
        is_competitor,
        published_at: None,
        now: Utc::now(),
    })
}

/// Full scoring function. Same input always yields the same output.
pub fn score_input(input: &ScoreInput<'_>) -> (f64, RelevanceDetails) {
    let w = if input.is_competitor { COMPETITOR } else { PRIMARY };
    let text_lower = input.text.to_lowercase();
    let entity_lower = input.entity_name.trim().to_lowercase();

    let mut details = RelevanceDetails::default();
    let mut total = 0.0f64;

    // 1) Entity mentions
    let mentions = count_occurrences(&text_lower, &entity_lower);
    details.company_mentions = mentions;
    total += (mentions * w.mention).min(w.mention_cap) as f64;

    // 2) Punctuated / possessive variations
    let variations = variation_count(&text_lower, &entity_lower);
    details.variation_mentions = variations;
    total += (variations * w.variation).min(w.variation_cap) as f64;

    // 3) Product keywords
    for kw in input.keywords {
        let k = kw.trim().to_lowercase();
        if !k.is_empty() && text_lower.contains(&k) {
            details.keyword_matches.push(kw.clone());
            total += w.keyword as f64;
        }
    }

    // 4) Industry terms
    for term in industry_terms(input.industry) {
        if text_lower.contains(&term.to_lowercase()) {
            details.industry_matches.push(term.to_string());
            total += INDUSTRY_TERM_POINTS;
        }
    }

    // 5) Recency
    if let Some(published) = input.published_at {
        let days = days_ago(published, input.now);
        details.recency_days = Some(days);
        total += recency_points(days);
    }

    // 6) Thin-content penalty, applied last
    if input.text.chars().count() < SHORT_TEXT_CHARS {
        total *= SHORT_TEXT_FACTOR;
    }

    trace!(
        target: "signals::relevance",
        entity = input.entity_name,
        competitor = input.is_competitor,
        mentions,
        variations,
        keywords = details.keyword_matches.len(),
        industry = details.industry_matches.len(),
        score = total,
        "scored item"
    );

    (total, details)
}

/// Non-overlapping substring count; an empty needle never matches.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// Sum of `" name "`, `"name,"`, `"name."` and `"name's"` occurrences.
pub fn variation_count(text_lower: &str, entity_lower: &str) -> usize {
    if entity_lower.is_empty() {
        return 0;
    }
    [
        format!(" {entity_lower} "),
        format!("{entity_lower},"),
        format!("{entity_lower}."),
        format!("{entity_lower}'s"),
    ]
    .iter()
    .map(|v| count_occurrences(text_lower, v))
    .sum()
}

/// Whole calendar days between `published` and `now`; future dates count as today.
pub fn days_ago(published: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now.date_naive() - published.date_naive()).num_days().max(0)
}

/// `max(0, 10 - days/3)`
pub fn recency_points(days: i64) -> f64 {
    (10.0 - days as f64 / 3.0).max(0.0)
}
