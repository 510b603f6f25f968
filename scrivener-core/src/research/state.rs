//! Data model for report planning and section research.

use crate::brain::OutputSchema;
use crate::error::PlanError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// One planned unit of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Display title, unique within a plan.
    pub name: String,
    /// Research and writing brief.
    pub description: String,
    /// Whether the section goes through the research loop.
    #[serde(alias = "research")]
    pub requires_research: bool,
    #[serde(default)]
    pub content: String,
}

impl Section {
    pub fn new(name: impl Into<String>, description: impl Into<String>, requires_research: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            requires_research,
            content: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub search_query: String,
}

/// Structured output of the query writers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Queries {
    pub queries: Vec<SearchQuery>,
}

/// Structured output of the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sections {
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("pass"),
            Verdict::Fail => f.write_str("fail"),
        }
    }
}

/// Structured output of the grader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub grade: Verdict,
    #[serde(default)]
    pub follow_up_queries: Vec<SearchQuery>,
}

impl Grade {
    pub fn pass() -> Self {
        Self {
            grade: Verdict::Pass,
            follow_up_queries: Vec::new(),
        }
    }

    pub fn fail<I, S>(queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            grade: Verdict::Fail,
            follow_up_queries: queries
                .into_iter()
                .map(|q| SearchQuery {
                    search_query: q.into(),
                })
                .collect(),
        }
    }

    /// Non-blank follow-up query strings.
    pub fn follow_ups(&self) -> Vec<String> {
        query_strings(&self.follow_up_queries)
    }
}

/// Trimmed, non-blank query strings.
pub fn query_strings(queries: &[SearchQuery]) -> Vec<String> {
    queries
        .iter()
        .map(|q| q.search_query.trim())
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect()
}

pub const QUERIES_SCHEMA: OutputSchema = OutputSchema {
    name: "Queries",
    shape: r#"{"queries": [{"search_query": "<search query>"}]}"#,
};

pub const SECTIONS_SCHEMA: OutputSchema = OutputSchema {
    name: "Sections",
    shape: r#"{"sections": [{"name": "<section name>", "description": "<what the section covers>", "research": true, "content": ""}]}"#,
};

pub const GRADE_SCHEMA: OutputSchema = OutputSchema {
    name: "Feedback",
    shape: r#"{"grade": "pass" or "fail", "follow_up_queries": [{"search_query": "<search query>"}]}"#,
};

/// Ordered, validated list of sections.
///
/// Serialized as a bare list; deserializing runs the same validation as
/// [`ReportPlan::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Section>", into = "Vec<Section>")]
pub struct ReportPlan {
    sections: Vec<Section>,
}

impl ReportPlan {
    /// Validate and freeze a list of sections.
    ///
    /// A plan must be non-empty and its section names non-blank and unique;
    /// names are the assembly key.
    pub fn new(sections: Vec<Section>) -> Result<Self, PlanError> {
        if sections.is_empty() {
            return Err(PlanError::Empty);
        }
        let mut seen = HashSet::new();
        for section in &sections {
            if section.name.trim().is_empty() {
                return Err(PlanError::BlankName);
            }
            if !seen.insert(section.name.as_str()) {
                return Err(PlanError::DuplicateSection {
                    name: section.name.clone(),
                });
            }
        }
        Ok(Self { sections })
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn research_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.requires_research)
    }

    pub fn direct_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| !s.requires_research)
    }

    /// Plan summary shown to the human reviewer.
    pub fn review_summary(&self) -> String {
        self.sections
            .iter()
            .map(|s| {
                format!(
                    "Section: {}\nDescription: {}\nResearch needed: {}\n",
                    s.name,
                    s.description,
                    if s.requires_research { "Yes" } else { "No" }
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Per-section working state, owned by one research loop.
#[derive(Debug, Clone)]
pub struct ResearchState {
    pub topic: String,
    pub section: Section,
    pub iteration_count: usize,
    pub pending_queries: Vec<String>,
    pub accumulated_source_text: String,
}

impl ResearchState {
    pub fn new(topic: impl Into<String>, section: Section) -> Self {
        Self {
            topic: topic.into(),
            section,
            iteration_count: 0,
            pending_queries: Vec::new(),
            accumulated_source_text: String::new(),
        }
    }
}

impl TryFrom<Vec<Section>> for ReportPlan {
    type Error = PlanError;

    fn try_from(sections: Vec<Section>) -> Result<Self, Self::Error> {
        Self::new(sections)
    }
}

impl From<ReportPlan> for Vec<Section> {
    fn from(plan: ReportPlan) -> Self {
        plan.sections
    }
}

/// Output of a finished research loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionOutput {
    pub completed_sections: Vec<Section>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::parse_structured;

    #[test]
    fn test_plan_rejects_duplicates() {
        let err = ReportPlan::new(vec![
            Section::new("Intro", "a", false),
            Section::new("Intro", "b", true),
        ])
        .unwrap_err();
        assert!(matches!(err, PlanError::DuplicateSection { ref name } if name == "Intro"));
    }

    #[test]
    fn test_plan_deserialization_validates() {
        let duplicate = r#"[
            {"name": "A", "description": "first", "requires_research": true},
            {"name": "A", "description": "second", "requires_research": false}
        ]"#;
        let err = serde_json::from_str::<ReportPlan>(duplicate).unwrap_err();
        assert!(err.to_string().contains("Duplicate section name in plan: A"));

        assert!(serde_json::from_str::<ReportPlan>("[]").is_err());
        assert!(
            serde_json::from_str::<ReportPlan>(
                r#"[{"name": " ", "description": "d", "requires_research": true}]"#
            )
            .is_err()
        );
    }

    #[test]
    fn test_plan_serde_keeps_order() {
        let plan = ReportPlan::new(vec![
            Section::new("Introduction", "overview", false),
            Section::new("Hardware", "qubits", true),
        ])
        .unwrap();
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json[0]["name"], "Introduction");
        assert_eq!(json[1]["requires_research"], true);
        let restored: ReportPlan = serde_json::from_value(json).unwrap();
        assert_eq!(restored, plan);
    }

    #[test]
    fn test_plan_rejects_empty_and_blank() {
        assert!(matches!(ReportPlan::new(vec![]), Err(PlanError::Empty)));
        assert!(matches!(
            ReportPlan::new(vec![Section::new("  ", "x", true)]),
            Err(PlanError::BlankName)
        ));
    }

    #[test]
    fn test_plan_partitions() {
        let plan = ReportPlan::new(vec![
            Section::new("Introduction", "overview", false),
            Section::new("Hardware", "qubits", true),
            Section::new("Conclusion", "summary", false),
        ])
        .unwrap();
        let research: Vec<_> = plan.research_sections().map(|s| s.name.as_str()).collect();
        let direct: Vec<_> = plan.direct_sections().map(|s| s.name.as_str()).collect();
        assert_eq!(research, vec!["Hardware"]);
        assert_eq!(direct, vec!["Introduction", "Conclusion"]);
    }

    #[test]
    fn test_review_summary() {
        let plan = ReportPlan::new(vec![
            Section::new("Hardware", "Qubit technologies", true),
            Section::new("Conclusion", "Wrap-up", false),
        ])
        .unwrap();
        assert_eq!(
            plan.review_summary(),
            "Section: Hardware\nDescription: Qubit technologies\nResearch needed: Yes\n\n\n\
             Section: Conclusion\nDescription: Wrap-up\nResearch needed: No\n"
        );
    }

    #[test]
    fn test_sections_parse_with_research_alias() {
        let text = r#"{"sections": [{"name": "A", "description": "d", "research": true, "content": ""}]}"#;
        let parsed: Sections = parse_structured(text, &SECTIONS_SCHEMA).unwrap();
        assert!(parsed.sections[0].requires_research);

        let text = r#"{"sections": [{"name": "B", "description": "d", "requires_research": false}]}"#;
        let parsed: Sections = parse_structured(text, &SECTIONS_SCHEMA).unwrap();
        assert!(!parsed.sections[0].requires_research);
        assert!(parsed.sections[0].content.is_empty());
    }

    #[test]
    fn test_grade_parsing() {
        let grade: Grade = parse_structured(
            r#"{"grade": "fail", "follow_up_queries": [{"search_query": "surface code thresholds"}, {"search_query": " "}]}"#,
            &GRADE_SCHEMA,
        )
        .unwrap();
        assert_eq!(grade.grade, Verdict::Fail);
        assert_eq!(grade.follow_ups(), vec!["surface code thresholds"]);

        let grade: Grade = parse_structured(r#"{"grade": "pass"}"#, &GRADE_SCHEMA).unwrap();
        assert_eq!(grade, Grade::pass());

        assert!(parse_structured::<Grade>(r#"{"grade": "maybe"}"#, &GRADE_SCHEMA).is_err());
    }
}
