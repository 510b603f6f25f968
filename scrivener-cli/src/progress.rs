//! Progress output for long-running report generation.

use scrivener_core::ReportCallback;
use scrivener_core::ReportPhase;
use scrivener_core::research::Verdict;

/// Prints report progress to stderr.
pub(crate) struct CliProgress {
    quiet: bool,
}

impl CliProgress {
    pub(crate) fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    fn line(&self, text: String) {
        if !self.quiet {
            eprintln!("{}", text);
        }
    }
}

impl ReportCallback for CliProgress {
    fn on_phase_change(&self, phase: ReportPhase) {
        let label = match phase {
            ReportPhase::Planning => "Planning report",
            ReportPhase::AwaitingFeedback => "Waiting for plan review",
            ReportPhase::Researching => "Researching sections",
            ReportPhase::Writing => "Writing remaining sections",
            ReportPhase::Complete => "Report complete",
            ReportPhase::Failed => "Report failed",
        };
        self.line(format!("\x1b[1;34m==>\x1b[0m {}", label));
    }

    fn on_queries_generated(&self, section: &str, queries: &[String]) {
        self.line(format!(
            "\x1b[36m  [{}]\x1b[0m searching: {}",
            section,
            queries.join(" | ")
        ));
    }

    fn on_section_graded(&self, section: &str, iteration: usize, verdict: Verdict) {
        let verdict = match verdict {
            Verdict::Pass => "\x1b[32mpass\x1b[0m",
            Verdict::Fail => "\x1b[33mfail\x1b[0m",
        };
        self.line(format!(
            "\x1b[36m  [{}]\x1b[0m round {} graded {}",
            section, iteration, verdict
        ));
    }

    fn on_section_complete(&self, section: &str) {
        self.line(format!("\x1b[32m  [{}] done\x1b[0m", section));
    }

    fn on_section_failed(&self, section: &str, error: &str) {
        eprintln!("\x1b[31m  [{}] failed:\x1b[0m {}", section, error);
    }
}
