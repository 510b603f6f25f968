//! # Scrivener Core
//!
//! Core library for Scrivener, a research report generator.
//! Provides the section research loop, plan negotiation, report assembly,
//! search backends, LLM providers (brain), configuration, and sessions.

pub mod brain;
pub mod config;
pub mod error;
pub mod persistence;
pub mod prompts;
pub mod providers;
pub mod research;
pub mod search;
pub mod types;

// Re-export commonly used types at the crate root.
pub use brain::{Brain, LlmProvider, MockLlmProvider, OutputSchema};
pub use config::{ConfigOverrides, LlmConfig, ReportConfig, load_config};
pub use error::{Result, ScrivenerError};
pub use research::{
    AutoApprove, FeedbackChannel, FeedbackResponse, NoOpReportCallback, ReportCallback,
    ReportPhase, ReportPipeline, ReportPlan, ReportSession, ResearchContext, ResearchModels,
    Section, SessionSummary,
};
pub use search::{
    MockSearchBackend, QueryResults, SearchApi, SearchBackend, SearchConfig, SearchExecutor,
    SearchParams, SearchResult,
};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
