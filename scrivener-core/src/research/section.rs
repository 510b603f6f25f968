//! The per-section research loop.
//!
//! Each researched section runs its own loop:
//! generate queries → search → draft → grade, then either finish or search
//! again with the grader's follow-up queries. The loop is bounded by
//! `max_search_depth` search rounds.

use super::ResearchContext;
use super::state::{Grade, ResearchState, Section, SectionOutput, Verdict};
use crate::error::LlmError;
use std::fmt;
use tracing::{debug, info, warn};

/// States of the section research loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    GeneratingQueries,
    Searching,
    Drafting,
    Grading,
    Done,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::GeneratingQueries => "generating_queries",
            LoopState::Searching => "searching",
            LoopState::Drafting => "drafting",
            LoopState::Grading => "grading",
            LoopState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Transition out of `Grading`.
///
/// A pass finishes the section. So does reaching the search ceiling,
/// whatever the verdict.
pub fn next_after_grade(grade: &Grade, iteration_count: usize, max_search_depth: usize) -> LoopState {
    if grade.grade == Verdict::Pass || iteration_count >= max_search_depth {
        LoopState::Done
    } else {
        LoopState::Searching
    }
}

/// One research loop, owning the state of a single section.
pub struct SectionResearchLoop {
    ctx: ResearchContext,
    state: ResearchState,
}

impl SectionResearchLoop {
    pub fn new(ctx: ResearchContext, topic: impl Into<String>, section: Section) -> Self {
        Self {
            ctx,
            state: ResearchState::new(topic, section),
        }
    }

    /// Drive the loop to completion.
    ///
    /// Model errors are returned as-is; search failures have already been
    /// absorbed by the executor.
    pub async fn run(mut self) -> Result<SectionOutput, LlmError> {
        let mut current = LoopState::GeneratingQueries;
        loop {
            debug!(section = %self.state.section.name, state = %current, "Research loop step");
            current = match current {
                LoopState::GeneratingQueries => self.generate_queries().await?,
                LoopState::Searching => self.search().await,
                LoopState::Drafting => self.draft().await?,
                LoopState::Grading => self.grade().await?,
                LoopState::Done => break,
            };
        }

        info!(
            section = %self.state.section.name,
            iterations = self.state.iteration_count,
            "Section research complete"
        );
        self.ctx
            .callback
            .on_section_complete(&self.state.section.name);
        Ok(SectionOutput {
            completed_sections: vec![self.state.section],
        })
    }

    async fn generate_queries(&mut self) -> Result<LoopState, LlmError> {
        let queries = self
            .ctx
            .models
            .generate_queries(
                &self.state.topic,
                &self.state.section.description,
                self.ctx.number_of_queries,
            )
            .await?;
        self.ctx
            .callback
            .on_queries_generated(&self.state.section.name, &queries);
        self.state.pending_queries = queries;
        Ok(LoopState::Searching)
    }

    async fn search(&mut self) -> LoopState {
        self.state.accumulated_source_text =
            self.ctx.search.execute(&self.state.pending_queries).await;
        self.state.iteration_count += 1;
        debug!(
            section = %self.state.section.name,
            iteration = self.state.iteration_count,
            chars = self.state.accumulated_source_text.len(),
            "Search round complete"
        );
        self.ctx
            .callback
            .on_search_complete(&self.state.section.name, self.state.iteration_count);
        LoopState::Drafting
    }

    async fn draft(&mut self) -> Result<LoopState, LlmError> {
        let content = self
            .ctx
            .models
            .draft_section(
                &self.state.topic,
                &self.state.section,
                &self.state.accumulated_source_text,
            )
            .await?;
        self.state.section.content = content;
        Ok(LoopState::Grading)
    }

    async fn grade(&mut self) -> Result<LoopState, LlmError> {
        let grade = self
            .ctx
            .models
            .grade_section(
                &self.state.topic,
                &self.state.section,
                self.ctx.number_of_queries,
            )
            .await?;
        let section = self.state.section.name.as_str();
        let iteration = self.state.iteration_count;
        info!(section, iteration, verdict = %grade.grade, "Section graded");
        self.ctx
            .callback
            .on_section_graded(section, iteration, grade.grade);

        let next = next_after_grade(&grade, iteration, self.ctx.max_search_depth);
        let follow_ups = grade.follow_ups();
        match (grade.grade, next) {
            (Verdict::Pass, _) if !follow_ups.is_empty() => {
                warn!(
                    section,
                    count = follow_ups.len(),
                    "Grader passed the section but returned follow-up queries; ignoring them"
                );
            }
            (Verdict::Fail, LoopState::Done) => {
                info!(section, iteration, "Search depth reached; keeping current draft");
            }
            (Verdict::Fail, _) if follow_ups.is_empty() => {
                warn!(
                    section,
                    "Grader failed the section without follow-up queries; repeating previous queries"
                );
            }
            (Verdict::Fail, _) => self.state.pending_queries = follow_ups,
            _ => {}
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_finishes() {
        assert_eq!(next_after_grade(&Grade::pass(), 1, 3), LoopState::Done);
    }

    #[test]
    fn test_fail_below_ceiling_searches_again() {
        assert_eq!(
            next_after_grade(&Grade::fail(["q"]), 1, 3),
            LoopState::Searching
        );
    }

    #[test]
    fn test_ceiling_finishes_regardless_of_verdict() {
        assert_eq!(next_after_grade(&Grade::fail(["q"]), 2, 2), LoopState::Done);
        assert_eq!(next_after_grade(&Grade::fail(["q"]), 5, 2), LoopState::Done);
    }

    #[test]
    fn test_loop_state_display() {
        assert_eq!(LoopState::GeneratingQueries.to_string(), "generating_queries");
        assert_eq!(LoopState::Done.to_string(), "done");
    }
}
