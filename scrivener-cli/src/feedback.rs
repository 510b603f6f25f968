//! Interactive plan review in the terminal.

use async_trait::async_trait;
use scrivener_core::FeedbackChannel;
use scrivener_core::error::ProtocolError;
use serde_json::Value;
use tracing::warn;

/// Prints the plan and reads the reviewer's answer from stdin.
pub(crate) struct TerminalFeedback;

#[async_trait]
impl FeedbackChannel for TerminalFeedback {
    async fn request_feedback(&self, prompt: &str) -> Result<Value, ProtocolError> {
        println!("\n\x1b[33m[Plan Review]\x1b[0m\n{}\n", prompt);

        let answer = tokio::task::spawn_blocking(|| {
            dialoguer::Input::<String>::new()
                .with_prompt("Feedback (press Enter or type 'true' to approve)")
                .allow_empty(true)
                .interact_text()
        })
        .await
        .map_err(|_| ProtocolError::ChannelClosed)?
        .map_err(|e| {
            warn!(error = %e, "Failed to read plan feedback");
            ProtocolError::ChannelClosed
        })?;

        Ok(parse_answer(&answer))
    }
}

/// Map typed input onto the feedback payload.
pub(crate) fn parse_answer(answer: &str) -> Value {
    let trimmed = answer.trim();
    match trimmed.to_lowercase().as_str() {
        "" | "true" | "yes" | "y" => Value::Bool(true),
        _ => Value::String(trimmed.to_string()),
    }
}
