//! The two model roles used during report generation.
//!
//! The writer generates search queries and drafts section text; the planner
//! produces report plans and grades drafts.

use super::state::{
    GRADE_SCHEMA, Grade, QUERIES_SCHEMA, Queries, SECTIONS_SCHEMA, Section, Sections, query_strings,
};
use crate::brain::Brain;
use crate::config::{LlmConfig, ReportConfig};
use crate::error::LlmError;
use crate::prompts;
use crate::providers::create_provider;
use crate::types::TokenUsage;
use tracing::debug;

pub struct ResearchModels {
    pub planner: Brain,
    pub writer: Brain,
}

impl ResearchModels {
    pub fn new(planner: Brain, writer: Brain) -> Self {
        Self { planner, writer }
    }

    /// Build both roles from configuration.
    pub fn from_config(config: &ReportConfig) -> Result<Self, LlmError> {
        Ok(Self::new(
            brain_for(&config.planner)?,
            brain_for(&config.writer)?,
        ))
    }

    /// Search queries for one section.
    pub async fn generate_queries(
        &self,
        topic: &str,
        section_topic: &str,
        number_of_queries: usize,
    ) -> Result<Vec<String>, LlmError> {
        let system = prompts::query_writer_instructions(topic, section_topic, number_of_queries);
        let queries: Queries = self
            .writer
            .think_structured(&system, prompts::QUERY_WRITER_REQUEST, &QUERIES_SCHEMA)
            .await?;
        normalize_query_batch(queries, number_of_queries)
    }

    /// Search queries used to gather context for planning.
    pub async fn generate_planning_queries(
        &self,
        topic: &str,
        report_structure: &str,
        number_of_queries: usize,
    ) -> Result<Vec<String>, LlmError> {
        let system =
            prompts::planner_query_writer_instructions(topic, report_structure, number_of_queries);
        let queries: Queries = self
            .writer
            .think_structured(&system, prompts::PLANNER_QUERY_REQUEST, &QUERIES_SCHEMA)
            .await?;
        normalize_query_batch(queries, number_of_queries)
    }

    /// Candidate sections for a report. Content is always reset to empty.
    pub async fn plan_sections(
        &self,
        topic: &str,
        report_structure: &str,
        context: &str,
        feedback: Option<&str>,
    ) -> Result<Vec<Section>, LlmError> {
        let system = prompts::planner_instructions(topic, report_structure, context, feedback);
        let planned: Sections = self
            .planner
            .think_structured(&system, prompts::PLANNER_REQUEST, &SECTIONS_SCHEMA)
            .await?;
        Ok(planned
            .sections
            .into_iter()
            .map(|mut section| {
                section.content.clear();
                section
            })
            .collect())
    }

    /// Draft or revise a researched section from the current sources.
    pub async fn draft_section(
        &self,
        topic: &str,
        section: &Section,
        context: &str,
    ) -> Result<String, LlmError> {
        let inputs = prompts::section_writer_inputs(
            topic,
            &section.name,
            &section.description,
            &section.content,
            context,
        );
        self.writer
            .think(prompts::SECTION_WRITER_INSTRUCTIONS, &inputs)
            .await
    }

    pub async fn grade_section(
        &self,
        topic: &str,
        section: &Section,
        number_of_follow_up_queries: usize,
    ) -> Result<Grade, LlmError> {
        let system = prompts::section_grader_instructions(
            topic,
            &section.description,
            &section.content,
            number_of_follow_up_queries,
        );
        self.planner
            .think_structured(&system, prompts::GRADER_REQUEST, &GRADE_SCHEMA)
            .await
    }

    /// Draft a section that needs no research, using completed sections as context.
    pub async fn draft_final_section(
        &self,
        topic: &str,
        section: &Section,
        context: &str,
    ) -> Result<String, LlmError> {
        let system = prompts::final_section_writer_instructions(
            topic,
            &section.name,
            &section.description,
            context,
        );
        self.writer
            .think(&system, prompts::FINAL_SECTION_REQUEST)
            .await
    }

    /// Combined token usage of both roles.
    pub fn total_usage(&self) -> TokenUsage {
        let mut usage = self.planner.total_usage();
        usage.accumulate(&self.writer.total_usage());
        usage
    }
}

fn brain_for(config: &LlmConfig) -> Result<Brain, LlmError> {
    let provider = create_provider(config)?;
    Ok(configure_brain(Brain::new(provider), config))
}

/// Apply per-role sampling settings. `max_tokens = 0` leaves the limit to
/// the provider default.
fn configure_brain(brain: Brain, config: &LlmConfig) -> Brain {
    let brain = brain.with_temperature(config.temperature);
    match config.max_tokens {
        0 => brain,
        n => brain.with_max_tokens(n),
    }
}

/// Enforce the requested batch size on generated queries.
///
/// Extra queries are dropped. A batch with fewer usable queries than
/// requested is an `LlmError::StructuredOutput`.
pub fn normalize_query_batch(
    queries: Queries,
    number_of_queries: usize,
) -> Result<Vec<String>, LlmError> {
    let mut batch = query_strings(&queries.queries);
    if batch.len() < number_of_queries {
        return Err(LlmError::StructuredOutput {
            schema: QUERIES_SCHEMA.name.to_string(),
            message: format!(
                "expected {} search queries, got {}",
                number_of_queries,
                batch.len()
            ),
        });
    }
    if batch.len() > number_of_queries {
        debug!(
            generated = batch.len(),
            requested = number_of_queries,
            "Dropping extra generated queries"
        );
        batch.truncate(number_of_queries);
    }
    Ok(batch)
}
