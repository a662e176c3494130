//! Stages that run after the fetch: summaries, sales context, email composition.
//! All three go through the text generator and degrade to placeholders.

pub mod compose;
pub mod context;
pub mod summarize;

pub use compose::{compose_or_placeholder, ComposeInput, Composer, PromptComposer};
pub use context::{ContextRequest, ContextWriter};
pub use summarize::{competitor_summary, news_summary, Summarizer};
