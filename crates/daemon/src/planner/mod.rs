use edit_engine::{OperationKind, OutputPolicy, StepDescriptor};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::context::ProjectContext;
use crate::llm::{ChatMessage, LlmClient};

/// An ordered step list plus how its final outputs should be chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerOutput {
    pub steps: Vec<StepDescriptor>,
    pub policy: OutputPolicy,
}

#[derive(Debug, Error)]
pub enum PlanningFailure {
    #[error("planner unavailable: {0}")]
    Unavailable(String),
    #[error("planner returned an unusable plan: {0}")]
    Malformed(String),
}

#[async_trait::async_trait]
pub trait ActionPlanner: Send + Sync {
    async fn plan(&self, instruction: &str, context: &ProjectContext) -> Result<PlannerOutput, PlanningFailure>;
}

pub struct LlmActionPlanner {
    llm: LlmClient,
}

impl LlmActionPlanner {
    pub fn new(llm: LlmClient) -> Self {
        LlmActionPlanner { llm }
    }
}

#[async_trait::async_trait]
impl ActionPlanner for LlmActionPlanner {
    async fn plan(&self, instruction: &str, context: &ProjectContext) -> Result<PlannerOutput, PlanningFailure> {
        let prompt = planning_prompt(context);
        let value = self
            .llm
            .complete_json(&prompt, &[ChatMessage::user(instruction)])
            .await
            .map_err(|e| {
                error!("[Planner] LLM call failed: {:#}", e);
                PlanningFailure::Unavailable(format!("{:#}", e))
            })?;

        let output = parse_planner_output(&value)?;
        info!(
            "[Planner] {} step(s) for '{}' ({:?})",
            output.steps.len(),
            instruction,
            output.policy
        );
        Ok(output)
    }
}

fn planning_prompt(context: &ProjectContext) -> String {
    let operations = OperationKind::ALL
        .iter()
        .map(|op| op.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You turn one video editing request into an ordered list of primitive operations.
Reply with a single JSON object:
{{"steps": [{{"operation": "<name>", "arguments": {{...}}}}], "single_output": <true|false>}}

Operations and their arguments:
- trim: video_id, start (seconds), end (seconds, optional)
- add_text: video_id, text, start, duration, position ("center", "top", "bottom"), style {{font_size, color}}
- apply_filter: video_id, filter_description (plain words, e.g. "black and white", "warm tint")
- change_speed: video_id, factor (2 = twice as fast, 0.5 = half speed)
- concatenate: video_ids (two or more, in playback order)
- extract_audio: video_id
- attach_audio: video_id, audio_id
- transfer_audio: source_video_id, destination_video_id

Rules:
1. Only use these operations: {operations}.
2. Use media ids from the media bin, never filenames or paths.
3. To use the output of an earlier step, write "result of step N" in place of the id. N counts from 1 and must be smaller than the current step.
4. If the request does not name a video, use the active video.
5. "each video" or "all videos" means one independent step per video in the media bin.
6. Set "single_output" to true only when the user wants one combined result, e.g. merging clips into a single video.

Media bin:
{media_bin}

Active video id: "{active}""#,
        operations = operations,
        media_bin = context.media_bin_json(),
        active = context.active_media_id,
    )
}

/// Validate the planner's JSON reply. Individual step names are checked
/// later when the plan is built, so one bad step is reported by index.
pub fn parse_planner_output(value: &Value) -> Result<PlannerOutput, PlanningFailure> {
    let raw_steps = value
        .get("steps")
        .or_else(|| value.get("actions"))
        .and_then(|s| s.as_array())
        .ok_or_else(|| PlanningFailure::Malformed("missing 'steps' list".to_string()))?;

    if raw_steps.is_empty() {
        return Err(PlanningFailure::Malformed("'steps' is empty".to_string()));
    }

    let steps = raw_steps
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            StepDescriptor::from_value(raw.clone())
                .map_err(|e| PlanningFailure::Malformed(format!("step {}: {}", i + 1, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let single = value
        .get("single_output")
        .and_then(|s| s.as_bool())
        .unwrap_or(false);

    Ok(PlannerOutput {
        steps,
        policy: OutputPolicy::from_single_output(single),
    })
}
