//! Batch orchestrator: drives prospects one at a time through
//! fetch → summarize → context → compose, sharing the session cache.
//!
//! A failing entity is recorded and the batch moves on. Cancellation is
//! observed between entities only, so a populated cache entry is never left
//! half-written by a cancel.

pub mod progress;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::{CacheEntry, SessionCache};
use crate::config::{Credentials, PipelineConfig};
use crate::downstream::context::ContextRequest;
use crate::downstream::{
    compose_or_placeholder, competitor_summary, news_summary, ComposeInput, Composer,
    ContextWriter, PromptComposer, Summarizer,
};
use crate::error::{SignalError, SignalResult};
use crate::fetch::EntityFetcher;
use crate::generate::{build_generator, DynGenerator};
use crate::model::{Diagnostic, FetchRequest, FetchResult, NewsItem, Prospect};

pub use progress::{EntityProgress, Progress, ProgressListener, Stage};

/// Per-run settings shared by every prospect in a job. Unset values fall back
/// to the pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobOptions {
    #[serde(default)]
    pub competitor_name: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub min_articles: Option<usize>,
    #[serde(default)]
    pub max_articles: Option<usize>,
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default)]
    pub generate_context: Option<bool>,
}

/// Ordered prospects plus the progress accumulator for this run.
pub struct BatchJob {
    pub prospects: Vec<Prospect>,
    pub options: JobOptions,
    progress: Progress,
}

impl BatchJob {
    pub fn new(prospects: Vec<Prospect>, options: JobOptions) -> Self {
        let progress = Progress::new(prospects.len());
        Self {
            prospects,
            options,
            progress,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.progress = self.progress.with_listener(listener);
        self
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    Failed,
    Cancelled,
}

/// What one prospect produced: the populated cache entry and email, or an error note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityOutcome {
    pub prospect: Prospect,
    pub entity: String,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<CacheEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub from_cache: bool,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EntityOutcome {
    fn failed(prospect: Prospect, status: OutcomeStatus, error: &SignalError) -> Self {
        Self {
            entity: prospect.entity().to_string(),
            prospect,
            status,
            entry: None,
            email: None,
            from_cache: false,
            diagnostics: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// Reply for a single cached fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalsReply {
    pub from_cache: bool,
    pub result: FetchResult,
}

/// Settings after merging job options over the configuration.
#[derive(Debug, Clone)]
struct RunSettings {
    industry: String,
    min_articles: usize,
    max_articles: usize,
    generate_context: bool,
}

struct Processed {
    entry: CacheEntry,
    email: String,
    from_cache: bool,
    diagnostics: Vec<Diagnostic>,
}

pub struct BatchOrchestrator {
    config: PipelineConfig,
    fetcher: EntityFetcher,
    cache: Arc<SessionCache>,
    summarizer: Summarizer,
    context: ContextWriter,
    composer: Arc<dyn Composer>,
}

impl BatchOrchestrator {
    pub fn new(
        config: PipelineConfig,
        fetcher: EntityFetcher,
        generator: DynGenerator,
        cache: Arc<SessionCache>,
    ) -> Self {
        let opts = config.generation.clone();
        Self {
            summarizer: Summarizer::new(generator.clone(), opts.clone()),
            context: ContextWriter::new(generator.clone(), opts.clone()),
            composer: Arc::new(PromptComposer::new(generator, opts)),
            config,
            fetcher,
            cache,
        }
    }

    /// Production wiring: HTTP sources and the Gemini generator (or disabled
    /// stand-ins for missing credentials).
    pub fn from_config(config: PipelineConfig, creds: &Credentials) -> SignalResult<Self> {
        let fetcher = EntityFetcher::from_config(&config, creds)?;
        let generator = build_generator(&config, creds);
        Ok(Self::new(config, fetcher, generator, Arc::new(SessionCache::new())))
    }

    pub fn with_composer(mut self, composer: Arc<dyn Composer>) -> Self {
        self.composer = composer;
        self
    }

    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every prospect in order. Always returns one outcome per prospect.
    pub async fn run_batch(&self, job: &BatchJob, cancel: &CancellationToken) -> Vec<EntityOutcome> {
        let settings = self.settings(&job.options);
        let total = job.prospects.len();
        info!(target: "signals::batch", prospects = total, "batch started");

        let mut outcomes = Vec::with_capacity(total);
        for (idx, prospect) in job.prospects.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(target: "signals::batch", remaining = total - idx, "batch cancelled");
                outcomes.extend(job.prospects[idx..].iter().cloned().map(|p| {
                    EntityOutcome::failed(p, OutcomeStatus::Cancelled, &SignalError::Cancelled)
                }));
                break;
            }

            job.progress.step(&format!(
                "Processing prospect {}/{}: {}...",
                idx + 1,
                total,
                display_name(prospect)
            ));
            let mut slice = job.progress.entity();
            let outcome = match self
                .process_entity(prospect, &job.options, &settings, &job.progress, &mut slice)
                .await
            {
                Ok(done) => EntityOutcome {
                    entity: prospect.entity().to_string(),
                    prospect: prospect.clone(),
                    status: OutcomeStatus::Completed,
                    entry: Some(done.entry),
                    email: Some(done.email),
                    from_cache: done.from_cache,
                    diagnostics: done.diagnostics,
                    error: None,
                },
                Err(e) => {
                    warn!(target: "signals::batch", entity = prospect.entity(), error = %e, "entity failed, continuing");
                    EntityOutcome::failed(prospect.clone(), OutcomeStatus::Failed, &e)
                }
            };
            slice.finish();
            outcomes.push(outcome);
        }

        info!(
            target: "signals::batch",
            prospects = total,
            failed = outcomes.iter().filter(|o| o.status != OutcomeStatus::Completed).count(),
            progress = job.progress.fraction(),
            "batch finished"
        );
        outcomes
    }

    async fn process_entity(
        &self,
        prospect: &Prospect,
        opts: &JobOptions,
        settings: &RunSettings,
        progress: &Progress,
        slice: &mut EntityProgress<'_>,
    ) -> SignalResult<Processed> {
        let entity = prospect.entity();
        if entity.is_empty() {
            return Err(SignalError::EntityProcessing {
                entity: String::new(),
                message: "prospect_company is empty".to_string(),
            });
        }
        let _claim = self.cache.claim(entity).ok_or_else(|| busy(entity))?;

        if opts.force_refresh {
            self.cache.invalidate(entity);
        }

        let (mut entry, from_cache, diagnostics) = match self.cache.get(entity) {
            Some(entry) if entry.summarized => {
                info!(target: "signals::batch", entity, items = entry.items.len(), "reusing cached signals");
                slice.complete(Stage::Summarize);
                (entry, true, Vec::new())
            }
            Some(mut entry) => {
                info!(target: "signals::batch", entity, items = entry.items.len(), "summarizing cached items");
                slice.complete(Stage::Fetch);
                self.summarize_into(&mut entry, entity, settings, progress, slice)
                    .await;
                self.cache.put(entity, entry.clone());
                (entry, true, Vec::new())
            }
            None => {
                progress.step(&format!(
                    "Step 1/4: Searching for relevant news articles for {entity}..."
                ));
                let req = self.fetch_request(entity, opts, settings);
                let result = self.fetcher.fetch(&req).await;
                let mut entry = CacheEntry::fetched(result.items());
                self.cache.put(entity, entry.clone());
                slice.complete(Stage::Fetch);

                self.summarize_into(&mut entry, entity, settings, progress, slice)
                    .await;
                self.cache.put(entity, entry.clone());
                (entry, false, result.diagnostics)
            }
        };

        let news = news_summary(&entry.summaries, entity);
        let competitor_news = competitor_summary(&entry.competitor_summaries);
        let competitor = opts
            .competitor_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        entry.sales_context = if settings.generate_context {
            progress.step(&format!("Step 3/4: Generating sales context for {entity}..."));
            self.context
                .write(&ContextRequest {
                    company: entity,
                    industry: &settings.industry,
                    competitor,
                    news_summary: &news,
                    competitor_summary: &competitor_news,
                    product: &self.config.product,
                })
                .await
        } else {
            String::new()
        };
        self.cache.put(entity, entry.clone());
        slice.complete(Stage::Context);

        progress.step(&format!(
            "Step 4/4: Crafting personalized email for {}...",
            display_name(prospect)
        ));
        let email = compose_or_placeholder(
            self.composer.as_ref(),
            &ComposeInput {
                prospect,
                industry: &settings.industry,
                news_summary: &news,
                competitor,
                competitor_summary: &competitor_news,
                sales_context: &entry.sales_context,
                product: &self.config.product,
            },
        )
        .await;
        slice.complete(Stage::Compose);

        Ok(Processed {
            entry,
            email,
            from_cache,
            diagnostics,
        })
    }

    /// Summaries for up to `max_articles` prospect items and `min(2, max)`
    /// competitor items; the summarize slice advances per article.
    async fn summarize_into(
        &self,
        entry: &mut CacheEntry,
        entity: &str,
        settings: &RunSettings,
        progress: &Progress,
        slice: &mut EntityProgress<'_>,
    ) {
        let max = settings.max_articles;
        let prospect_items: Vec<&NewsItem> = entry
            .items
            .iter()
            .filter(|i| !i.is_competitor)
            .take(max)
            .collect();
        let competitor_items: Vec<&NewsItem> = entry
            .items
            .iter()
            .filter(|i| i.is_competitor)
            .take(max.min(2))
            .collect();
        let n = prospect_items.len() + competitor_items.len();

        if !prospect_items.is_empty() {
            progress.step(&format!(
                "Step 2/4: Summarizing {} news articles for {entity}...",
                prospect_items.len()
            ));
        }

        let mut summaries = Vec::with_capacity(prospect_items.len());
        let mut competitor_summaries = Vec::with_capacity(competitor_items.len());
        for (i, item) in prospect_items.iter().chain(competitor_items.iter()).enumerate() {
            let s = self.summarizer.summarize(item).await;
            if !s.trim().is_empty() {
                if item.is_competitor {
                    competitor_summaries.push(s);
                } else {
                    summaries.push(s);
                }
            }
            slice.within(Stage::Summarize, i, n);
        }
        slice.complete(Stage::Summarize);

        entry.summaries = summaries;
        entry.competitor_summaries = competitor_summaries;
        entry.summarized = true;
    }

    /// Single fetch through the cache. Stores items only; a later batch run
    /// summarizes them before use.
    pub async fn fetch_signals(&self, req: &FetchRequest) -> SignalResult<SignalsReply> {
        let entity = req.entity_name.trim();
        if entity.is_empty() {
            return Err(SignalError::EntityProcessing {
                entity: String::new(),
                message: "entity_name is empty".to_string(),
            });
        }
        let _claim = self.cache.claim(entity).ok_or_else(|| busy(entity))?;

        if req.force_refresh {
            self.cache.invalidate(entity);
        }
        if let Some(entry) = self.cache.get(entity) {
            return Ok(SignalsReply {
                from_cache: true,
                result: FetchResult::from_items(entity, &entry.items, req.max_articles.max(1)),
            });
        }

        let result = self.fetcher.fetch(req).await;
        self.cache.put(entity, CacheEntry::fetched(result.items()));
        Ok(SignalsReply {
            from_cache: false,
            result,
        })
    }

    fn settings(&self, opts: &JobOptions) -> RunSettings {
        let max_articles = opts
            .max_articles
            .unwrap_or(self.config.max_articles)
            .max(1);
        let min_articles = opts
            .min_articles
            .unwrap_or(self.config.min_articles)
            .min(max_articles);
        let industry = opts
            .industry
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .unwrap_or_else(|| self.config.default_industry.clone());
        RunSettings {
            industry,
            min_articles,
            max_articles,
            generate_context: opts.generate_context.unwrap_or(self.config.generate_context),
        }
    }

    fn fetch_request(&self, entity: &str, opts: &JobOptions, settings: &RunSettings) -> FetchRequest {
        FetchRequest {
            entity_name: entity.to_string(),
            competitor_name: opts.competitor_name.clone(),
            keywords: opts.keywords.clone(),
            industry: settings.industry.clone(),
            min_articles: settings.min_articles,
            max_articles: settings.max_articles,
            force_refresh: opts.force_refresh,
        }
    }
}

fn busy(entity: &str) -> SignalError {
    SignalError::EntityProcessing {
        entity: entity.to_string(),
        message: "another run is writing this entity".to_string(),
    }
}

fn display_name(p: &Prospect) -> &str {
    let name = p.prospect_name.trim();
    if name.is_empty() {
        p.entity()
    } else {
        name
    }
}
