// src/fetch.rs
//! Entity fetch orchestrator.
//!
//! `Init → PrimaryFetch → CompetitorFetch? → BackfillCheck → Done`, with
//! `Failed` reachable from `PrimaryFetch` on a transport (or configuration)
//! error. Empty results are not failures. The orchestrator never returns an
//! error to its caller: the worst case is an empty `FetchResult` carrying a
//! failure reason.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{info, warn};

use crate::config::{Credentials, PipelineConfig};
use crate::error::SignalResult;
use crate::extract::ContentExtractor;
use crate::model::{sort_by_score, Diagnostic, FetchOutcome, FetchRequest, FetchResult, NewsItem};
use crate::sources::{
    ensure_metrics_described, HttpNewsApi, HttpSerper, NewsApiBackend, PrimarySource,
    SearchBackend, SecondarySource,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum FetchState {
    Init,
    PrimaryFetch,
    CompetitorFetch,
    BackfillCheck,
    Done,
    Failed(String),
}

#[derive(Clone)]
pub struct EntityFetcher {
    primary: PrimarySource,
    secondary: SecondarySource,
}

impl EntityFetcher {
    pub fn new(primary: PrimarySource, secondary: SecondarySource) -> Self {
        Self { primary, secondary }
    }

    /// Wire real HTTP clients. Missing credentials leave the matching source
    /// unconfigured (logged once here).
    pub fn from_config(cfg: &PipelineConfig, creds: &Credentials) -> SignalResult<Self> {
        let extractor = ContentExtractor::http(Duration::from_secs(cfg.extract_timeout_secs))?;

        let news: Option<Arc<dyn NewsApiBackend>> = match &creds.news_api {
            Some(key) => Some(Arc::new(HttpNewsApi::new(&cfg.endpoints.newsapi_url, key)?)),
            None => {
                warn!(target: "signals::config", "NEWS_API not set; primary news source disabled");
                None
            }
        };
        let search: Option<Arc<dyn SearchBackend>> = match &creds.serper {
            Some(key) => Some(Arc::new(HttpSerper::new(&cfg.endpoints.serper_url, key)?)),
            None => {
                warn!(target: "signals::config", "SERPER_API_KEY not set; backup search disabled");
                None
            }
        };

        Ok(Self::new(
            PrimarySource::new(news, extractor.clone(), cfg.lookback_days, cfg.worker_width),
            SecondarySource::new(search, extractor, cfg.worker_width),
        ))
    }

    pub async fn fetch(&self, req: &FetchRequest) -> FetchResult {
        self.fetch_at(req, Utc::now()).await
    }

    /// Run the fetch state machine with an explicit reference time.
    pub async fn fetch_at(&self, req: &FetchRequest, now: DateTime<Utc>) -> FetchResult {
        ensure_metrics_described();

        let entity = req.entity_name.trim();
        let max = req.max_articles.max(1);
        let competitor_cap = req.competitor_cap();
        let mut result = FetchResult::empty(entity);
        let mut state = FetchState::Init;

        loop {
            state = match state {
                FetchState::Init => FetchState::PrimaryFetch,

                FetchState::PrimaryFetch => {
                    match self
                        .primary
                        .fetch(entity, &req.keywords, &req.industry, max, false, now)
                        .await
                    {
                        Ok(items) => {
                            result.primary = rank(items, max);
                            if req.competitor().is_some() {
                                FetchState::CompetitorFetch
                            } else {
                                FetchState::BackfillCheck
                            }
                        }
                        Err(e) => FetchState::Failed(e.to_string()),
                    }
                }

                FetchState::CompetitorFetch => {
                    if let Some(name) = req.competitor() {
                        match self
                            .primary
                            .fetch(name, &req.keywords, &req.industry, competitor_cap, true, now)
                            .await
                        {
                            Ok(items) => result.competitor = rank(items, competitor_cap),
                            Err(e) => {
                                warn!(target: "signals::fetch", entity, competitor = name, error = %e, "competitor fetch failed, continuing without it");
                                result.diagnostics.push(Diagnostic::CompetitorUnavailable {
                                    reason: e.to_string(),
                                });
                            }
                        }
                    }
                    FetchState::BackfillCheck
                }

                FetchState::BackfillCheck => {
                    self.backfill(req, entity, max, &mut result, now).await;
                    FetchState::Done
                }

                FetchState::Done => {
                    result.outcome = FetchOutcome::Done;
                    break;
                }

                FetchState::Failed(reason) => {
                    self.recover_from_primary_failure(req, entity, max, reason, &mut result, now)
                        .await;
                    break;
                }
            };
        }

        note_shortfall(&mut result, req.min_articles);
        info!(
            target: "signals::fetch",
            entity,
            primary = result.primary.len(),
            competitor = result.competitor.len(),
            outcome = ?result.outcome,
            "entity fetch finished"
        );
        result
    }

    /// Top up the primary list from the secondary source when it is below the minimum.
    async fn backfill(
        &self,
        req: &FetchRequest,
        entity: &str,
        max: usize,
        result: &mut FetchResult,
        now: DateTime<Utc>,
    ) {
        if result.primary.len() >= req.min_articles || !self.secondary.is_configured() {
            return;
        }
        counter!("signals_backfill_total").increment(1);
        let backup = self
            .secondary
            .fetch(entity, &req.keywords, &req.industry, now)
            .await;
        let before = result.primary.len();
        merge_by_url(&mut result.primary, &result.competitor, backup, max);
        info!(target: "signals::fetch", entity, added = result.primary.len() - before, "backfilled from secondary source");
    }

    async fn recover_from_primary_failure(
        &self,
        req: &FetchRequest,
        entity: &str,
        max: usize,
        reason: String,
        result: &mut FetchResult,
        now: DateTime<Utc>,
    ) {
        warn!(target: "signals::fetch", entity, reason = %reason, "primary source unavailable");
        result
            .diagnostics
            .push(Diagnostic::PrimaryUnreachable { reason: reason.clone() });

        if self.secondary.is_configured() {
            counter!("signals_backfill_total").increment(1);
            let backup = self
                .secondary
                .fetch(entity, &req.keywords, &req.industry, now)
                .await;
            merge_by_url(&mut result.primary, &[], backup, max);
        }

        if result.primary.is_empty() {
            result.outcome = FetchOutcome::Failed;
            result.failure_reason = Some(reason);
        } else {
            result.outcome = FetchOutcome::Done;
        }
    }
}

/// Sort by score, drop repeated URLs (keeping the best-scored), cap.
fn rank(mut items: Vec<NewsItem>, cap: usize) -> Vec<NewsItem> {
    sort_by_score(&mut items);
    let mut seen = HashSet::new();
    items.retain(|i| seen.insert(i.url.clone()));
    items.truncate(cap);
    items
}

/// Append `extra` items whose URL is not already present in `primary` or
/// `competitor`, until `primary` holds `cap` items; then re-sort `primary`.
pub fn merge_by_url(
    primary: &mut Vec<NewsItem>,
    competitor: &[NewsItem],
    extra: Vec<NewsItem>,
    cap: usize,
) {
    let mut seen: HashSet<String> = primary
        .iter()
        .chain(competitor.iter())
        .map(|i| i.url.clone())
        .collect();
    for mut item in extra {
        if primary.len() >= cap {
            break;
        }
        if seen.insert(item.url.clone()) {
            item.is_competitor = false;
            primary.push(item);
        }
    }
    sort_by_score(primary);
}

fn note_shortfall(result: &mut FetchResult, min_articles: usize) {
    let found = result.primary.len();
    if found < min_articles {
        warn!(target: "signals::fetch", entity = %result.entity_name, found, wanted = min_articles, "fewer articles than requested");
        result.diagnostics.push(Diagnostic::BelowMinimum {
            found,
            wanted: min_articles,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RelevanceDetails;

    fn item(url: &str, score: f64) -> NewsItem {
        NewsItem {
            url: url.into(),
            title: url.into(),
            description: "d".into(),
            content: String::new(),
            full_content: None,
            source: "s".into(),
            published_at: None,
            entity_name: "Acme".into(),
            is_competitor: false,
            relevance_score: score,
            relevance_details: RelevanceDetails::default(),
        }
    }

    #[test]
    fn merge_skips_known_urls_and_respects_cap() {
        let mut primary = vec![item("a", 4.0)];
        let competitor = vec![item("c", 9.0)];
        let extra = vec![item("a", 1.0), item("c", 1.0), item("b", 6.0), item("d", 2.0), item("e", 1.0)];
        merge_by_url(&mut primary, &competitor, extra, 3);
        let urls: Vec<_> = primary.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, ["b", "a", "d"]);
    }

    #[test]
    fn rank_dedups_and_truncates() {
        let items = vec![item("a", 1.0), item("a", 3.0), item("b", 2.0), item("c", 0.5)];
        let ranked = rank(items, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].url, "a");
        assert_eq!(ranked[0].relevance_score, 3.0);
        assert_eq!(ranked[1].url, "b");
    }
}
