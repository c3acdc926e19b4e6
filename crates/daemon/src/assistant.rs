use anyhow::{Context, Result};
use edit_engine::response::PLANNING_FAILURE_MESSAGE;
use edit_engine::{
    EditOrchestrator, ExecutionOutcome, FinalArtifact, MediaRegistry, OperationKind, PrimitiveOperations,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::api::artifact_url;
use crate::context::ProjectContext;
use crate::intent::{IntentClassifier, IntentDecision};
use crate::llm::{ChatMessage, LlmClient};
use crate::planner::ActionPlanner;
use crate::vision::VisionAnalyzer;

/// Answers questions that need no editing.
#[async_trait::async_trait]
pub trait QuestionAnswerer: Send + Sync {
    async fn answer(
        &self,
        question: &str,
        context: &ProjectContext,
        video_description: Option<&str>,
    ) -> Result<String>;
}

pub struct LlmQuestionAnswerer {
    llm: LlmClient,
}

impl LlmQuestionAnswerer {
    pub fn new(llm: LlmClient) -> Self {
        LlmQuestionAnswerer { llm }
    }
}

const CAPABILITIES: &str = "trimming clips, adding text overlays, applying visual filters \
(black and white, sepia, blur, brightness, contrast, color tints, fades, rotation, mirroring), \
changing playback speed, joining clips together, extracting audio, adding an audio track to a video, \
and moving the audio of one video onto another";

#[async_trait::async_trait]
impl QuestionAnswerer for LlmQuestionAnswerer {
    async fn answer(
        &self,
        question: &str,
        context: &ProjectContext,
        video_description: Option<&str>,
    ) -> Result<String> {
        let mut prompt = format!(
            "You are a friendly video editing assistant. You can help with {}.\n\
             Answer the user's question briefly. If it is a clarifying question you need to ask, ask it plainly.\n\n\
             Media bin:\n{}\n\nActive video id: \"{}\"",
            CAPABILITIES,
            context.media_bin_json(),
            context.active_media_id
        );
        if let Some(description) = video_description {
            prompt.push_str(&format!("\n\nWhat the active video shows:\n{}", description));
        }
        self.llm.complete_text(&prompt, &[ChatMessage::user(question)]).await
    }
}

/// One chat turn as the assistant receives it.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub command: String,
    pub history: Vec<ChatMessage>,
    pub registry: MediaRegistry,
    pub active_media_id: String,
    pub video_description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
}

/// Reply for the chat client. The registry is handed back so the caller can
/// keep the artifacts this turn produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    pub status: ReplyStatus,
    pub message: String,
    pub final_artifacts: Vec<FinalArtifact>,
    pub output_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationKind>,
    pub registry: MediaRegistry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_description: Option<String>,
}

impl AssistantReply {
    fn answered(message: String, registry: MediaRegistry, video_description: Option<String>) -> Self {
        AssistantReply {
            status: ReplyStatus::Success,
            message,
            final_artifacts: Vec::new(),
            output_urls: Vec::new(),
            failed_step: None,
            operation: None,
            registry,
            video_description,
        }
    }

    fn failed(message: impl Into<String>, registry: MediaRegistry) -> Self {
        AssistantReply {
            status: ReplyStatus::Error,
            message: message.into(),
            final_artifacts: Vec::new(),
            output_urls: Vec::new(),
            failed_step: None,
            operation: None,
            registry,
            video_description: None,
        }
    }

    fn from_outcome(outcome: ExecutionOutcome, registry: MediaRegistry) -> Self {
        match outcome {
            ExecutionOutcome::Success { final_artifacts, message } => AssistantReply {
                status: ReplyStatus::Success,
                message,
                output_urls: final_artifacts.iter().map(|a| artifact_url(&a.path)).collect(),
                final_artifacts,
                failed_step: None,
                operation: None,
                registry,
                video_description: None,
            },
            ExecutionOutcome::Error { failed_step, operation, message } => AssistantReply {
                failed_step,
                operation,
                ..AssistantReply::failed(message, registry)
            },
        }
    }
}

/// Routes each user turn to editing, answering, or content analysis.
pub struct Assistant {
    classifier: Arc<dyn IntentClassifier>,
    planner: Arc<dyn ActionPlanner>,
    vision: Arc<dyn VisionAnalyzer>,
    answerer: Arc<dyn QuestionAnswerer>,
    operations: Arc<dyn PrimitiveOperations>,
}

impl Assistant {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        planner: Arc<dyn ActionPlanner>,
        vision: Arc<dyn VisionAnalyzer>,
        answerer: Arc<dyn QuestionAnswerer>,
        operations: Arc<dyn PrimitiveOperations>,
    ) -> Self {
        Assistant {
            classifier,
            planner,
            vision,
            answerer,
            operations,
        }
    }

    /// Handle one turn. `Err` means a collaborator (LLM, vision) could not be
    /// reached; every other failure comes back as an error reply.
    pub async fn handle(&self, request: EditRequest) -> Result<AssistantReply> {
        let mut conversation = request.history.clone();
        let repeats_last = conversation
            .last()
            .map_or(false, |m| m.role == "user" && m.content == request.command);
        if !repeats_last {
            conversation.push(ChatMessage::user(request.command.clone()));
        }

        let context = ProjectContext::new(&request.registry, request.active_media_id.clone());
        let decision = self
            .classifier
            .classify(&conversation, &context)
            .await
            .context("Intent classification failed")?;

        match decision {
            IntentDecision::DirectEdit { instruction, payload } => {
                if let Some(payload) = &payload {
                    debug!("[Assistant] Classifier draft: {}", payload);
                }
                self.edit(&instruction, &context, request.registry, request.active_media_id)
                    .await
            }
            IntentDecision::CapabilityQuestion { question } => {
                info!("[Assistant] Answering capability question");
                let answer = self
                    .answerer
                    .answer(&question, &context, None)
                    .await
                    .context("Answering failed")?;
                Ok(AssistantReply::answered(answer, request.registry, None))
            }
            IntentDecision::ContentQuestion { question } => {
                let description = match request.video_description {
                    Some(description) if !description.trim().is_empty() => description,
                    _ => {
                        let path = match request.registry.get(&request.active_media_id) {
                            Some(path) => path.to_path_buf(),
                            None => {
                                warn!(
                                    "[Assistant] Active video '{}' is not in the media bin",
                                    request.active_media_id
                                );
                                return Ok(AssistantReply::failed(
                                    format!("Video path not found for ID '{}'.", request.active_media_id),
                                    request.registry,
                                ));
                            }
                        };
                        info!("[Assistant] No description cached, analyzing {}", path.display());
                        self.vision
                            .describe(&path)
                            .await
                            .context("Video content analysis failed")?
                    }
                };
                let answer = self
                    .answerer
                    .answer(&question, &context, Some(&description))
                    .await
                    .context("Answering failed")?;
                Ok(AssistantReply::answered(answer, request.registry, Some(description)))
            }
        }
    }

    async fn edit(
        &self,
        instruction: &str,
        context: &ProjectContext,
        registry: MediaRegistry,
        active_media_id: String,
    ) -> Result<AssistantReply> {
        let output = match self.planner.plan(instruction, context).await {
            Ok(output) => output,
            Err(e) => {
                error!("[Assistant] Planning failed for '{}': {}", instruction, e);
                return Ok(AssistantReply::failed(PLANNING_FAILURE_MESSAGE, registry));
            }
        };

        let operations = self.operations.clone();
        let (outcome, registry) = tokio::task::spawn_blocking(move || {
            let mut registry = registry;
            let outcome = EditOrchestrator::new(operations.as_ref()).execute_descriptors(
                output.steps,
                output.policy,
                &mut registry,
                &active_media_id,
            );
            (outcome, registry)
        })
        .await
        .context("Edit run did not complete")?;

        Ok(AssistantReply::from_outcome(outcome, registry))
    }
}
