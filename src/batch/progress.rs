//! Weighted batch progress.
//!
//! Each entity owns `STAGES * STAGE_UNITS` integer units (fetch, summarize,
//! context, compose, one quarter each). Units only ever get added, capped at
//! the batch total, so the reported fraction never decreases and reaches
//! exactly 1.0 when the last entity's compose stage completes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use metrics::{describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tracing::debug;

pub const STAGES: u64 = 4;
pub const STAGE_UNITS: u64 = 1_000_000;
const ENTITY_UNITS: u64 = STAGES * STAGE_UNITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Summarize,
    Context,
    Compose,
}

impl Stage {
    fn index(self) -> u64 {
        match self {
            Stage::Fetch => 0,
            Stage::Summarize => 1,
            Stage::Context => 2,
            Stage::Compose => 3,
        }
    }
}

/// Receives progress updates and step messages.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, fraction: f64);
    fn on_step(&self, _message: &str) {}
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_gauge!(
            "signals_batch_progress",
            "Fraction of the running batch completed (0..1)."
        );
    });
}

pub struct Progress {
    total: u64,
    done: AtomicU64,
    listener: Option<Arc<dyn ProgressListener>>,
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("total", &self.total)
            .field("done", &self.done.load(Ordering::SeqCst))
            .finish()
    }
}

impl Progress {
    pub fn new(entities: usize) -> Self {
        ensure_metrics_described();
        Self {
            total: entities as u64 * ENTITY_UNITS,
            done: AtomicU64::new(0),
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Completed fraction; an empty batch counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.done.load(Ordering::SeqCst) as f64 / self.total as f64
    }

    pub fn is_complete(&self) -> bool {
        self.done.load(Ordering::SeqCst) >= self.total
    }

    pub fn step(&self, message: &str) {
        debug!(target: "signals::batch", message, "batch step");
        if let Some(l) = &self.listener {
            l.on_step(message);
        }
    }

    /// Tracker for the next entity's share.
    pub fn entity(&self) -> EntityProgress<'_> {
        EntityProgress {
            progress: self,
            used: 0,
        }
    }

    fn advance(&self, units: u64) {
        if units == 0 {
            return;
        }
        let total = self.total;
        let prev = match self
            .done
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| {
                (d < total).then(|| (d + units).min(total))
            }) {
            Ok(prev) => prev,
            Err(_) => return,
        };
        let now = (prev + units).min(total);
        let fraction = now as f64 / total as f64;
        gauge!("signals_batch_progress").set(fraction);
        if let Some(l) = &self.listener {
            l.on_progress(fraction);
        }
    }
}

/// One entity's slice of the batch. Positions only move forward.
pub struct EntityProgress<'a> {
    progress: &'a Progress,
    used: u64,
}

impl EntityProgress<'_> {
    /// Mark everything up to the end of `stage` as done.
    pub fn complete(&mut self, stage: Stage) {
        self.move_to((stage.index() + 1) * STAGE_UNITS);
    }

    /// Item `i` (0-based) of `n` within `stage` is done.
    pub fn within(&mut self, stage: Stage, i: usize, n: usize) {
        if n == 0 {
            return;
        }
        let done = (i as u64 + 1).min(n as u64);
        self.move_to(stage.index() * STAGE_UNITS + STAGE_UNITS * done / n as u64);
    }

    /// Fill whatever is left of this entity's share (completion or failure).
    pub fn finish(&mut self) {
        self.move_to(ENTITY_UNITS);
    }

    fn move_to(&mut self, target: u64) {
        let target = target.min(ENTITY_UNITS);
        if target > self.used {
            self.progress.advance(target - self.used);
            self.used = target;
        }
    }
}
