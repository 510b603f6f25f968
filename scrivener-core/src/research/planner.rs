//! Report planning and the human review cycle.

use super::ResearchContext;
use super::session::ReportPhase;
use super::state::ReportPlan;
use crate::error::{ProtocolError, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

/// Text shown to the reviewer for a candidate plan.
pub fn feedback_prompt(plan: &ReportPlan) -> String {
    format!(
        "Please provide feedback on the following report plan.\n\n{}\n\n\
         Does the report plan meet your needs?\n\
         Pass 'true' if it does, and to approve it.\n\
         Or provide feedback on how it needs to be improved.",
        plan.review_summary()
    )
}

/// A reviewer's answer to a candidate plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackResponse {
    Approve,
    Revise(String),
}

impl TryFrom<Value> for FeedbackResponse {
    type Error = ProtocolError;

    /// `true` approves and a string asks for a revision. Anything else is
    /// rejected rather than coerced.
    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::Bool(true) => Ok(FeedbackResponse::Approve),
            Value::String(text) => Ok(FeedbackResponse::Revise(text)),
            other => Err(ProtocolError::UnsupportedResponse {
                kind: json_kind(&other).to_string(),
            }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean false",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Where plan reviews are sent.
///
/// `request_feedback` may wait indefinitely; there is no timeout default.
#[async_trait]
pub trait FeedbackChannel: Send + Sync {
    async fn request_feedback(&self, prompt: &str) -> std::result::Result<Value, ProtocolError>;
}

/// Approves every plan without asking.
pub struct AutoApprove;

#[async_trait]
impl FeedbackChannel for AutoApprove {
    async fn request_feedback(&self, _prompt: &str) -> std::result::Result<Value, ProtocolError> {
        Ok(Value::Bool(true))
    }
}

/// An approved plan and the feedback that shaped it.
#[derive(Debug, Clone)]
pub struct NegotiatedPlan {
    pub plan: ReportPlan,
    pub feedback_history: Vec<String>,
}

/// Generates plans and mediates review until one is approved.
pub struct PlanNegotiator {
    ctx: ResearchContext,
}

impl PlanNegotiator {
    pub fn new(ctx: ResearchContext) -> Self {
        Self { ctx }
    }

    /// Search for planning context and produce a validated plan.
    ///
    /// `feedback` is the reviewer's text from the previous round, if any;
    /// the plan is regenerated from scratch each time.
    pub async fn generate_plan(&self, topic: &str, feedback: Option<&str>) -> Result<ReportPlan> {
        self.ctx.callback.on_phase_change(ReportPhase::Planning);
        let queries = self
            .ctx
            .models
            .generate_planning_queries(
                topic,
                &self.ctx.report_structure,
                self.ctx.number_of_queries,
            )
            .await?;
        debug!(count = queries.len(), "Planning queries generated");

        let context = self.ctx.search.execute(&queries).await;
        let sections = self
            .ctx
            .models
            .plan_sections(topic, &self.ctx.report_structure, &context, feedback)
            .await?;
        let plan = ReportPlan::new(sections)?;
        info!(
            topic,
            sections = plan.len(),
            revised = feedback.is_some(),
            "Report plan generated"
        );
        Ok(plan)
    }

    /// Ask the reviewer about `plan` and decode the answer.
    pub async fn review(
        &self,
        plan: &ReportPlan,
        channel: &dyn FeedbackChannel,
    ) -> Result<FeedbackResponse> {
        self.ctx.callback.on_phase_change(ReportPhase::AwaitingFeedback);
        let raw = channel.request_feedback(&feedback_prompt(plan)).await?;
        Ok(FeedbackResponse::try_from(raw)?)
    }

    /// Plan, review, and revise until the reviewer approves.
    pub async fn negotiate(
        &self,
        topic: &str,
        channel: &dyn FeedbackChannel,
    ) -> Result<NegotiatedPlan> {
        let mut feedback_history: Vec<String> = Vec::new();
        loop {
            let plan = self
                .generate_plan(topic, feedback_history.last().map(String::as_str))
                .await?;
            match self.review(&plan, channel).await? {
                FeedbackResponse::Approve => {
                    info!(topic, rounds = feedback_history.len() + 1, "Report plan approved");
                    return Ok(NegotiatedPlan {
                        plan,
                        feedback_history,
                    });
                }
                FeedbackResponse::Revise(text) => {
                    info!(topic, feedback = %text, "Report plan revision requested");
                    feedback_history.push(text);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::state::Section;
    use serde_json::json;

    #[test]
    fn test_feedback_response_decoding() {
        assert_eq!(
            FeedbackResponse::try_from(json!(true)).unwrap(),
            FeedbackResponse::Approve
        );
        assert_eq!(
            FeedbackResponse::try_from(json!("add more about error correction")).unwrap(),
            FeedbackResponse::Revise("add more about error correction".into())
        );
    }

    #[test]
    fn test_feedback_response_rejects_other_shapes() {
        for value in [json!(false), json!(null), json!(1), json!(["yes"]), json!({"ok": true})] {
            let err = FeedbackResponse::try_from(value).unwrap_err();
            assert!(matches!(err, ProtocolError::UnsupportedResponse { .. }));
        }
        let err = FeedbackResponse::try_from(json!(false)).unwrap_err();
        assert!(err.to_string().contains("boolean false"));
    }

    #[test]
    fn test_feedback_prompt() {
        let plan = ReportPlan::new(vec![Section::new("Hardware", "Qubits", true)]).unwrap();
        let prompt = feedback_prompt(&plan);
        assert!(prompt.starts_with("Please provide feedback on the following report plan.\n\n"));
        assert!(prompt.contains("Section: Hardware\nDescription: Qubits\nResearch needed: Yes\n"));
        assert!(prompt.ends_with("Or provide feedback on how it needs to be improved."));
    }

    #[tokio::test]
    async fn test_auto_approve() {
        let value = AutoApprove.request_feedback("plan").await.unwrap();
        assert_eq!(value, json!(true));
    }
}
