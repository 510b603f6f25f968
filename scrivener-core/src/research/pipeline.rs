//! End-to-end report generation with session tracking.
//!
//! `run` holds the plan review in-process through a `FeedbackChannel`.
//! `plan` and `resume` split the same flow at the review point so the
//! answer can arrive later; the session is persisted in between.

use super::assembler::ReportAssembler;
use super::callback::ReportCallback;
use super::models::ResearchModels;
use super::planner::{FeedbackChannel, FeedbackResponse, PlanNegotiator};
use super::session::{ReportPhase, ReportSession};
use super::state::ReportPlan;
use super::ResearchContext;
use crate::config::ReportConfig;
use crate::error::{PlanError, Result};
use crate::search::SearchExecutor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct ReportPipeline {
    ctx: ResearchContext,
    sessions_dir: Option<PathBuf>,
}

impl ReportPipeline {
    pub fn new(ctx: ResearchContext) -> Self {
        Self {
            ctx,
            sessions_dir: None,
        }
    }

    /// Build the model roles and search executor from configuration.
    pub fn from_config(config: &ReportConfig) -> Result<Self> {
        config.validate()?;
        let models = Arc::new(ResearchModels::from_config(config)?);
        let search = SearchExecutor::from_config(&config.search)?;
        Ok(Self::new(ResearchContext::new(models, search, config)))
    }

    pub fn with_callback(mut self, callback: Arc<dyn ReportCallback>) -> Self {
        self.ctx.callback = callback;
        self
    }

    /// Persist sessions to `dir` after every phase change.
    pub fn with_sessions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sessions_dir = Some(dir.into());
        self
    }

    pub fn context(&self) -> &ResearchContext {
        &self.ctx
    }

    /// Generate a full report, asking `channel` to review the plan.
    pub async fn run(&self, topic: &str, channel: &dyn FeedbackChannel) -> Result<ReportSession> {
        let mut session = ReportSession::new(topic);
        self.persist(&session)?;
        info!(session = %session.id, topic, "Starting report");

        let outcome: Result<()> = async {
            let negotiated = PlanNegotiator::new(self.ctx.clone())
                .negotiate(topic, channel)
                .await?;
            session.feedback_history = negotiated.feedback_history;
            session.plan = Some(negotiated.plan.clone());
            self.research_and_write(&mut session, &negotiated.plan).await
        }
        .await;
        self.finish(session, outcome)
    }

    /// Generate a plan and stop at the review point.
    pub async fn plan(&self, topic: &str) -> Result<ReportSession> {
        let mut session = ReportSession::new(topic);
        self.persist(&session)?;

        let outcome: Result<()> = async {
            let plan = PlanNegotiator::new(self.ctx.clone())
                .generate_plan(topic, None)
                .await?;
            session.plan = Some(plan);
            self.enter(&mut session, ReportPhase::AwaitingFeedback)
        }
        .await;
        self.finish(session, outcome)
    }

    /// Continue a session waiting on plan review.
    ///
    /// Approval runs research and writing to completion. A revision
    /// regenerates the plan with the feedback and waits for review again.
    pub async fn resume(
        &self,
        mut session: ReportSession,
        response: FeedbackResponse,
    ) -> Result<ReportSession> {
        session.expect_phase(ReportPhase::AwaitingFeedback)?;
        let plan = session.plan.clone().ok_or(PlanError::Empty)?;
        let topic = session.topic.clone();
        info!(session = %session.id, response = ?response, "Resuming report");

        let outcome: Result<()> = async {
            match response {
                FeedbackResponse::Approve => self.research_and_write(&mut session, &plan).await,
                FeedbackResponse::Revise(feedback) => {
                    self.enter(&mut session, ReportPhase::Planning)?;
                    let revised = PlanNegotiator::new(self.ctx.clone())
                        .generate_plan(&topic, Some(feedback.as_str()))
                        .await?;
                    session.feedback_history.push(feedback);
                    session.plan = Some(revised);
                    self.enter(&mut session, ReportPhase::AwaitingFeedback)
                }
            }
        }
        .await;
        self.finish(session, outcome)
    }

    async fn research_and_write(
        &self,
        session: &mut ReportSession,
        plan: &ReportPlan,
    ) -> Result<()> {
        let assembler = ReportAssembler::new(self.ctx.clone());

        self.enter(session, ReportPhase::Researching)?;
        let sections = assembler.research(&session.topic, plan).await;

        self.enter(session, ReportPhase::Writing)?;
        let report = assembler.write(&session.topic, plan, sections).await?;

        session.sections = report.sections;
        session.report = Some(report.report);
        self.enter(session, ReportPhase::Complete)?;

        let usage = self.ctx.models.total_usage();
        info!(
            session = %session.id,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Report complete"
        );
        Ok(())
    }

    fn enter(&self, session: &mut ReportSession, phase: ReportPhase) -> Result<()> {
        session.transition(phase);
        self.ctx.callback.on_phase_change(phase);
        self.persist(session)
    }

    fn persist(&self, session: &ReportSession) -> Result<()> {
        if let Some(dir) = &self.sessions_dir {
            session.save(dir)?;
        }
        Ok(())
    }

    /// Record a failure on the session before handing the error back.
    fn finish(&self, mut session: ReportSession, outcome: Result<()>) -> Result<ReportSession> {
        match outcome {
            Ok(()) => Ok(session),
            Err(e) => {
                error!(session = %session.id, error = %e, "Report failed");
                session.fail(e.to_string());
                self.ctx.callback.on_phase_change(ReportPhase::Failed);
                if let Err(save_err) = self.persist(&session) {
                    warn!(session = %session.id, error = %save_err, "Failed to save failed session");
                }
                Err(e)
            }
        }
    }
}
