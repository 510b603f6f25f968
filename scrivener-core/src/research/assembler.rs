//! Report assembly: research fan-out, context synthesis, and final ordering.

use super::ResearchContext;
use super::section::SectionResearchLoop;
use super::state::{ReportPlan, Section};
use crate::error::AssemblyError;
use futures::future::join_all;
use std::collections::HashMap;
use tracing::{info, warn};

/// Sections finished so far, keyed by name, plus per-section failures.
#[derive(Debug, Default, Clone)]
pub struct CompletedSections {
    completed: HashMap<String, Section>,
    failures: HashMap<String, String>,
}

impl CompletedSections {
    pub fn insert(&mut self, section: Section) {
        self.completed.insert(section.name.clone(), section);
    }

    pub fn record_failure(&mut self, name: impl Into<String>, error: impl ToString) {
        self.failures.insert(name.into(), error.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&Section> {
        self.completed.get(name)
    }

    pub fn failure(&self, name: &str) -> Option<&str> {
        self.failures.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Completed sections in plan order, skipping ones that are missing.
    pub fn in_plan_order<'a>(&'a self, plan: &'a ReportPlan) -> impl Iterator<Item = &'a Section> {
        plan.sections()
            .iter()
            .filter_map(|planned| self.completed.get(&planned.name))
    }
}

/// The assembled report and its sections in plan order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedReport {
    pub sections: Vec<Section>,
    pub report: String,
}

/// Runs the research loops and writes the final report.
pub struct ReportAssembler {
    ctx: ResearchContext,
}

impl ReportAssembler {
    pub fn new(ctx: ResearchContext) -> Self {
        Self { ctx }
    }

    /// Research every section that needs it, concurrently.
    ///
    /// A failed loop is recorded against its section and does not stop the
    /// others.
    pub async fn research(&self, topic: &str, plan: &ReportPlan) -> CompletedSections {
        let loops = plan.research_sections().map(|section| {
            let name = section.name.clone();
            let research = SectionResearchLoop::new(self.ctx.clone(), topic, section.clone());
            async move { (name, research.run().await) }
        });

        let mut sections = CompletedSections::default();
        for (name, outcome) in join_all(loops).await {
            match outcome {
                Ok(output) => {
                    for section in output.completed_sections {
                        sections.insert(section);
                    }
                }
                Err(e) => {
                    warn!(section = %name, error = %e, "Section research failed");
                    self.ctx.callback.on_section_failed(&name, &e.to_string());
                    sections.record_failure(name, e);
                }
            }
        }

        info!(
            completed = sections.len(),
            failed = sections.failure_count(),
            "Research fan-in complete"
        );
        sections
    }

    /// Draft the sections that need no research, using only the researched
    /// sections as context, then compile the report.
    pub async fn write(
        &self,
        topic: &str,
        plan: &ReportPlan,
        mut sections: CompletedSections,
    ) -> Result<CompletedReport, AssemblyError> {
        let researched: Vec<Section> = sections
            .in_plan_order(plan)
            .filter(|s| s.requires_research)
            .cloned()
            .collect();
        let context = format_completed_sections(&researched);

        let drafts = plan.direct_sections().map(|section| {
            let models = &self.ctx.models;
            let context = context.as_str();
            async move {
                let outcome = models.draft_final_section(topic, section, context).await;
                (section, outcome)
            }
        });

        for (section, outcome) in join_all(drafts).await {
            match outcome {
                Ok(content) => {
                    let mut written = section.clone();
                    written.content = content;
                    self.ctx.callback.on_section_complete(&written.name);
                    sections.insert(written);
                }
                Err(e) => {
                    warn!(section = %section.name, error = %e, "Section drafting failed");
                    self.ctx
                        .callback
                        .on_section_failed(&section.name, &e.to_string());
                    sections.record_failure(section.name.clone(), e);
                }
            }
        }

        compile_final_report(plan, &sections)
    }

    /// Research, then write.
    pub async fn assemble(
        &self,
        topic: &str,
        plan: &ReportPlan,
    ) -> Result<CompletedReport, AssemblyError> {
        let sections = self.research(topic, plan).await;
        self.write(topic, plan, sections).await
    }
}

/// Render completed sections as the context block for final drafting.
pub fn format_completed_sections(sections: &[Section]) -> String {
    let heavy = "=".repeat(60);
    let light = "-".repeat(60);
    let mut out = String::new();
    for (idx, section) in sections.iter().enumerate() {
        let content = if section.content.is_empty() {
            "[Not written yet]"
        } else {
            section.content.as_str()
        };
        out.push_str(&format!(
            "\n{heavy}\nSection {}: {}\n{light}\nDescription:\n{}\nRequires research:\n{}\n\nContent:\n{}\n",
            idx + 1,
            section.name,
            section.description,
            section.requires_research,
            content
        ));
    }
    out
}

/// Join section contents in plan order.
///
/// Every planned section must be present; a section that failed is reported
/// with its error, one that is simply absent as missing.
pub fn compile_final_report(
    plan: &ReportPlan,
    sections: &CompletedSections,
) -> Result<CompletedReport, AssemblyError> {
    let mut ordered = Vec::with_capacity(plan.len());
    for planned in plan.sections() {
        if let Some(message) = sections.failure(&planned.name) {
            return Err(AssemblyError::SectionFailed {
                name: planned.name.clone(),
                message: message.to_string(),
            });
        }
        let section = sections
            .get(&planned.name)
            .ok_or_else(|| AssemblyError::MissingSection {
                name: planned.name.clone(),
            })?;
        ordered.push(section.clone());
    }

    let report = ordered
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    Ok(CompletedReport {
        sections: ordered,
        report,
    })
}
