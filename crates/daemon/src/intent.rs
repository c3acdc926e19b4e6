use anyhow::Result;
use serde_json::Value;
use tracing::{info, warn};

use crate::context::ProjectContext;
use crate::llm::{ChatMessage, LlmClient};

/// Where a user message should be routed.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentDecision {
    /// Perform an edit. `payload` is whatever draft the classifier attached;
    /// planning starts from `instruction`.
    DirectEdit {
        instruction: String,
        payload: Option<Value>,
    },
    /// Question about what the assistant can do, or a clarifying question
    /// for an ambiguous command.
    CapabilityQuestion { question: String },
    /// Question about what is in the active video.
    ContentQuestion { question: String },
}

#[async_trait::async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, conversation: &[ChatMessage], context: &ProjectContext) -> Result<IntentDecision>;
}

pub struct LlmIntentClassifier {
    llm: LlmClient,
}

impl LlmIntentClassifier {
    pub fn new(llm: LlmClient) -> Self {
        LlmIntentClassifier { llm }
    }
}

#[async_trait::async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, conversation: &[ChatMessage], context: &ProjectContext) -> Result<IntentDecision> {
        let latest = conversation
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let prompt = routing_prompt(context);
        let value = self.llm.complete_json(&prompt, conversation).await?;
        let decision = parse_decision(&value, &latest);
        info!("[Intent] Routed '{}' as {}", latest, decision_label(&decision));
        Ok(decision)
    }
}

fn decision_label(decision: &IntentDecision) -> &'static str {
    match decision {
        IntentDecision::DirectEdit { .. } => "execute_edit",
        IntentDecision::CapabilityQuestion { .. } => "functional_question",
        IntentDecision::ContentQuestion { .. } => "contextual_question",
    }
}

fn routing_prompt(context: &ProjectContext) -> String {
    format!(
        r#"You route messages for a video editing assistant that works on several videos at once.
Decide what the user's latest message needs and reply with one JSON object {{"tool_choice": ..., "data": ...}}.

"execute_edit": the user gives an editing command (trim, add text, filter, speed, combine, audio work).
  data: {{"instruction": "<the command, restated with concrete video ids where you can>"}}
"functional_question": the user asks what you can do, or the command is too ambiguous to run.
  data: {{"question": "<your clarifying question, or the user's question>"}}
"contextual_question": the user asks about what is shown or heard in the active video.
  data: {{"question": "<the user's question>"}}

"This video" or "the current video" means the active video.

Media bin:
{media_bin}

Active video id: "{active}""#,
        media_bin = context.media_bin_json(),
        active = context.active_media_id,
    )
}

/// Turn the classifier's JSON into a decision. Unknown or missing choices
/// fall back to answering, never to editing.
pub fn parse_decision(value: &Value, fallback_instruction: &str) -> IntentDecision {
    let choice = value
        .get("tool_choice")
        .and_then(|c| c.as_str())
        .unwrap_or_default();
    let data = value.get("data");

    let text_field = |key: &str| {
        data.and_then(|d| d.get(key))
            .and_then(|q| q.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string)
    };
    let question = || text_field("question").unwrap_or_else(|| fallback_instruction.to_string());

    match choice {
        "execute_edit" => IntentDecision::DirectEdit {
            instruction: text_field("instruction").unwrap_or_else(|| fallback_instruction.to_string()),
            payload: data.cloned().filter(|d| !d.is_null()),
        },
        "functional_question" => IntentDecision::CapabilityQuestion { question: question() },
        "contextual_question" => IntentDecision::ContentQuestion { question: question() },
        other => {
            warn!("[Intent] Unknown tool choice '{}', answering instead", other);
            IntentDecision::CapabilityQuestion { question: question() }
        }
    }
}
