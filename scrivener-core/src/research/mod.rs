//! Report research: planning, per-section research loops, and assembly.
//!
//! The pipeline is:
//! 1. **Plan**: search for context and propose sections (`planner`)
//! 2. **Review**: a human approves the plan or asks for changes
//! 3. **Research**: one loop per researched section, run concurrently (`section`)
//! 4. **Write**: draft the remaining sections and assemble the report (`assembler`)

pub mod assembler;
pub mod callback;
pub mod models;
pub mod pipeline;
pub mod planner;
pub mod section;
pub mod session;
pub mod state;

pub use assembler::{
    CompletedReport, CompletedSections, ReportAssembler, compile_final_report,
    format_completed_sections,
};
pub use callback::{NoOpReportCallback, ReportCallback};
pub use models::ResearchModels;
pub use pipeline::ReportPipeline;
pub use planner::{
    AutoApprove, FeedbackChannel, FeedbackResponse, NegotiatedPlan, PlanNegotiator,
    feedback_prompt,
};
pub use section::{LoopState, SectionResearchLoop, next_after_grade};
pub use session::{ReportPhase, ReportSession, SessionSummary};
pub use state::{Grade, ReportPlan, ResearchState, Section, SectionOutput, Verdict};

use crate::config::ReportConfig;
use crate::search::SearchExecutor;
use std::sync::Arc;

/// Shared, read-only handles for one report run.
///
/// Cloned into every research loop; nothing in it is mutated after
/// construction.
#[derive(Clone)]
pub struct ResearchContext {
    pub models: Arc<ResearchModels>,
    pub search: SearchExecutor,
    pub number_of_queries: usize,
    pub max_search_depth: usize,
    pub report_structure: String,
    pub callback: Arc<dyn ReportCallback>,
}

impl ResearchContext {
    pub fn new(models: Arc<ResearchModels>, search: SearchExecutor, config: &ReportConfig) -> Self {
        Self {
            models,
            search,
            number_of_queries: config.number_of_queries,
            max_search_depth: config.max_search_depth,
            report_structure: config.report_structure.clone(),
            callback: Arc::new(NoOpReportCallback),
        }
    }

    pub fn with_callback(mut self, callback: Arc<dyn ReportCallback>) -> Self {
        self.callback = callback;
        self
    }
}
