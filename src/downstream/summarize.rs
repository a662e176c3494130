//! Per-article summaries through the text generator, plus the summary joins
//! the context and compose stages consume.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::{debug, warn};

use crate::generate::{DynGenerator, GenerateOptions};
use crate::model::NewsItem;

/// `full_content` longer than this is preferred as summary input.
pub const FULL_CONTENT_MIN_CHARS: usize = 300;
/// Otherwise `content` longer than this.
pub const CONTENT_MIN_CHARS: usize = 100;
/// Shorter inputs are not worth a generator call; the title is the summary.
pub const MIN_INPUT_CHARS: usize = 50;
/// Summaries joined into the prospect news summary.
pub const NEWS_SUMMARY_ITEMS: usize = 3;
/// Summaries joined into the competitor summary.
pub const COMPETITOR_SUMMARY_ITEMS: usize = 2;

const REDUNDANT_PHRASES: &[&str] = &[
    "according to the article",
    "the article states that",
    "the article notes that",
    "the article mentions that",
    "as mentioned in the article",
];

#[derive(Clone)]
pub struct Summarizer {
    generator: DynGenerator,
    opts: GenerateOptions,
}

impl Summarizer {
    pub fn new(generator: DynGenerator, opts: GenerateOptions) -> Self {
        Self { generator, opts }
    }

    /// One-paragraph summary of `item`. Falls back to the title when the text is
    /// too thin or the generator fails.
    pub async fn summarize(&self, item: &NewsItem) -> String {
        let Some(text) = select_text(item) else {
            return item.title.clone();
        };
        if text.chars().count() < MIN_INPUT_CHARS {
            return item.title.clone();
        }

        let details = key_details(&text, &item.entity_name);
        let prompt = summary_prompt(&text, &details, &item.entity_name);
        match self.generator.generate(&prompt, &self.opts).await {
            Ok(raw) => {
                let out = finish_summary(&raw, &item.entity_name, item.published_at);
                debug!(target: "signals::summarize", url = %item.url, chars = out.len(), "summarized item");
                if out.is_empty() {
                    item.title.clone()
                } else {
                    out
                }
            }
            Err(e) => {
                warn!(target: "signals::summarize", url = %item.url, generator = self.generator.name(), error = %e, "summary failed, using title");
                item.title.clone()
            }
        }
    }
}

/// `"{title}. {body}"` from the richest body available, or `None` when only
/// the title exists.
pub fn select_text(item: &NewsItem) -> Option<String> {
    let body = match item.full_content.as_deref() {
        Some(full) if full.chars().count() > FULL_CONTENT_MIN_CHARS => full,
        _ if item.content.chars().count() > CONTENT_MIN_CHARS => item.content.as_str(),
        _ if !item.description.trim().is_empty() => item.description.as_str(),
        _ => return None,
    };
    Some(format!("{}. {}", item.title, body))
}

/// Company name, product names, money amounts, percentages and dates found in
/// `text`, first occurrence order, no repeats.
pub fn key_details(text: &str, company: &str) -> Vec<String> {
    static PATTERNS: OnceCell<Vec<(Regex, usize)>> = OnceCell::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            (r"\b[A-Z][a-zA-Z0-9]+ (?:[A-Z][a-zA-Z0-9]+ )*(?:API|Cloud|Platform|Suite|Service|Software|Hardware|Solution|Tool|App|Application)\b", 3),
            (r"\$\d+(?:\.\d+)?(?:\s?[mb]illion|\s?[mk])?", 2),
            (r"\d+(?:\.\d+)?%", 2),
            (r"(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}", 2),
        ]
        .into_iter()
        .filter_map(|(p, n)| Regex::new(p).ok().map(|re| (re, n)))
        .collect()
    });

    let mut out: Vec<String> = Vec::new();
    let mut push = |s: &str| {
        if !s.is_empty() && !out.iter().any(|o| o == s) {
            out.push(s.to_string());
        }
    };
    push(company.trim());
    for (re, limit) in patterns {
        for m in re.find_iter(text).take(*limit) {
            push(m.as_str().trim());
        }
    }
    out
}

pub fn summary_prompt(text: &str, details: &[String], company: &str) -> String {
    let details_line = if details.is_empty() {
        String::new()
    } else {
        format!("Keep these details if they appear: {}.\n", details.join("; "))
    };
    format!(
        "Summarize the following news article about {company} in 3-4 factual sentences \
         for a sales representative. Plain text only.\n{details_line}\nARTICLE:\n{text}"
    )
}

/// Prefix company and date context, strip filler phrases, capitalize sentences.
pub fn finish_summary(raw: &str, company: &str, published_at: Option<DateTime<Utc>>) -> String {
    let mut summary = raw.trim().to_string();
    let company = company.trim();
    if !company.is_empty() && !summary.to_lowercase().contains(&company.to_lowercase()) {
        summary = format!("In news related to {company}, {summary}");
    }
    if let Some(ts) = published_at {
        summary = format!(
            "According to an article published on {}, {summary}",
            ts.format("%B %d, %Y")
        );
    }
    format_summary(&summary)
}

pub fn format_summary(summary: &str) -> String {
    static RE_FILLER: OnceCell<Regex> = OnceCell::new();
    static RE_SENTENCE_END: OnceCell<Regex> = OnceCell::new();
    let filler = RE_FILLER.get_or_init(|| {
        let alts = REDUNDANT_PHRASES
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!("(?i)(?:{alts})")).expect("filler regex")
    });
    let sentence_end = RE_SENTENCE_END.get_or_init(|| Regex::new(r"[.!?]\s+").expect("sentence regex"));

    let stripped = filler.replace_all(summary, "");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sentences = Vec::new();
    let mut start = 0;
    for m in sentence_end.find_iter(&collapsed) {
        sentences.push(&collapsed[start..m.start() + 1]);
        start = m.end();
    }
    sentences.push(&collapsed[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(capitalize_first)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// First three summaries separated by blank lines, or the no-news sentence.
pub fn news_summary(summaries: &[String], company: &str) -> String {
    if summaries.is_empty() {
        return no_news_summary(company);
    }
    summaries
        .iter()
        .take(NEWS_SUMMARY_ITEMS)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn no_news_summary(company: &str) -> String {
    format!("No specific recent news found for {company}.")
}

/// First two competitor summaries separated by blank lines; empty when none.
pub fn competitor_summary(summaries: &[String]) -> String {
    summaries
        .iter()
        .take(COMPETITOR_SUMMARY_ITEMS)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n")
}
