//! Report session state with persistence.
//!
//! A session records one report from topic to final text so that the plan
//! review can be answered later, from another process.

use super::state::{ReportPlan, Section};
use crate::error::{Result, SessionError};
use crate::persistence::{atomic_write_json, json_files_in, load_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// Current phase of a report session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportPhase {
    /// Searching for context and drafting a plan.
    Planning,
    /// Waiting for the reviewer to approve or revise the plan.
    AwaitingFeedback,
    /// Section research loops are running.
    Researching,
    /// Drafting the remaining sections and assembling the report.
    Writing,
    /// Report complete.
    Complete,
    /// Session failed.
    Failed,
}

impl fmt::Display for ReportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportPhase::Planning => "planning",
            ReportPhase::AwaitingFeedback => "awaiting_feedback",
            ReportPhase::Researching => "researching",
            ReportPhase::Writing => "writing",
            ReportPhase::Complete => "complete",
            ReportPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A persistent report session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSession {
    pub id: Uuid,
    pub topic: String,
    pub phase: ReportPhase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Latest candidate or approved plan.
    pub plan: Option<ReportPlan>,
    /// Reviewer feedback, oldest first.
    #[serde(default)]
    pub feedback_history: Vec<String>,
    /// Written sections in plan order, once the report is complete.
    #[serde(default)]
    pub sections: Vec<Section>,
    pub report: Option<String>,
    pub error: Option<String>,
}

impl ReportSession {
    pub fn new(topic: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            phase: ReportPhase::Planning,
            created_at: now,
            updated_at: now,
            plan: None,
            feedback_history: Vec::new(),
            sections: Vec::new(),
            report: None,
            error: None,
        }
    }

    /// Transition to a new phase.
    pub fn transition(&mut self, new_phase: ReportPhase) {
        self.phase = new_phase;
        self.updated_at = Utc::now();
    }

    /// Mark the session as failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.transition(ReportPhase::Failed);
    }

    /// Fail with `SessionError::WrongPhase` unless the session is in `expected`.
    pub fn expect_phase(&self, expected: ReportPhase) -> std::result::Result<(), SessionError> {
        if self.phase == expected {
            return Ok(());
        }
        Err(SessionError::WrongPhase {
            id: self.id.to_string(),
            phase: self.phase.to_string(),
            expected: expected.to_string(),
        })
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, ReportPhase::Complete | ReportPhase::Failed)
    }

    fn path_in(dir: &Path, id: &Uuid) -> PathBuf {
        dir.join(format!("{id}.json"))
    }

    /// Persist the session to `dir/<id>.json`.
    pub fn save(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = Self::path_in(dir, &self.id);
        atomic_write_json(&path, self)?;
        Ok(path)
    }

    /// Load a session by full id or unique id prefix.
    pub fn load(dir: &Path, id: &str) -> Result<Self> {
        if let Ok(uuid) = Uuid::parse_str(id)
            && let Some(session) = load_json(&Self::path_in(dir, &uuid))?
        {
            return Ok(session);
        }

        let mut matches = Self::list(dir)?
            .into_iter()
            .filter(|summary| summary.id.to_string().starts_with(id));
        match (matches.next(), matches.next()) {
            (Some(summary), None) => load_json(&Self::path_in(dir, &summary.id))?
                .ok_or_else(|| SessionError::NotFound { id: id.to_string() }.into()),
            _ => Err(SessionError::NotFound { id: id.to_string() }.into()),
        }
    }

    /// Summaries of all saved sessions, most recently updated first.
    ///
    /// Unreadable session files are skipped with a warning.
    pub fn list(dir: &Path) -> Result<Vec<SessionSummary>> {
        let mut summaries = Vec::new();
        for path in json_files_in(dir)? {
            match load_json::<ReportSession>(&path) {
                Ok(Some(session)) => summaries.push(session.summary()),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable session"),
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            topic: self.topic.clone(),
            phase: self.phase,
            sections: self.plan.as_ref().map_or(0, ReportPlan::len),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Summary of a report session for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub topic: String,
    pub phase: ReportPhase,
    pub sections: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
