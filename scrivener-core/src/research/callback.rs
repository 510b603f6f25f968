//! Progress reporting hooks for report generation.

use super::session::ReportPhase;
use super::state::Verdict;

/// Callback for report generation progress.
///
/// Section-level hooks fire from concurrently running research loops, so
/// implementations must be cheap and thread-safe.
pub trait ReportCallback: Send + Sync {
    /// Called when the report moves to a new phase.
    fn on_phase_change(&self, _phase: ReportPhase) {}

    /// Called when a section has a fresh batch of queries.
    fn on_queries_generated(&self, _section: &str, _queries: &[String]) {}

    /// Called after a search round for a section.
    fn on_search_complete(&self, _section: &str, _iteration: usize) {}

    /// Called after the grader has judged a section draft.
    fn on_section_graded(&self, _section: &str, _iteration: usize, _verdict: Verdict) {}

    /// Called when a section's content is final.
    fn on_section_complete(&self, _section: &str) {}

    /// Called when a section could not be completed.
    fn on_section_failed(&self, _section: &str, _error: &str) {}
}

/// A no-op callback for when no progress reporting is needed.
pub struct NoOpReportCallback;

impl ReportCallback for NoOpReportCallback {}
