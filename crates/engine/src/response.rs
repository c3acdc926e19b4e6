use serde::Serialize;
use std::path::PathBuf;

use crate::ops::OperationKind;
use crate::registry::{MediaId, MediaKind};

pub const PLANNING_FAILURE_MESSAGE: &str =
    "Sorry, I could not understand that editing request. Could you rephrase it?";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalArtifact {
    pub media_id: MediaId,
    pub path: PathBuf,
    pub kind: MediaKind,
}

/// What a run hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecutionOutcome {
    #[serde(rename_all = "camelCase")]
    Success {
        final_artifacts: Vec<FinalArtifact>,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        failed_step: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        operation: Option<OperationKind>,
        message: String,
    },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            ExecutionOutcome::Success { message, .. } | ExecutionOutcome::Error { message, .. } => message,
        }
    }

    pub fn final_artifacts(&self) -> &[FinalArtifact] {
        match self {
            ExecutionOutcome::Success { final_artifacts, .. } => final_artifacts,
            ExecutionOutcome::Error { .. } => &[],
        }
    }
}

pub fn success(final_artifacts: Vec<FinalArtifact>) -> ExecutionOutcome {
    let message = summarize(&final_artifacts);
    ExecutionOutcome::Success { final_artifacts, message }
}

pub fn failure(failed_step: Option<usize>, operation: Option<OperationKind>, message: impl Into<String>) -> ExecutionOutcome {
    ExecutionOutcome::Error {
        failed_step,
        operation,
        message: message.into(),
    }
}

fn summarize(artifacts: &[FinalArtifact]) -> String {
    match artifacts {
        [] => "No final output was generated.".to_string(),
        [only] if only.kind == MediaKind::Audio => {
            "Audio extraction complete! Your new audio file is ready.".to_string()
        }
        [_] => "Video editing complete! Your new video is ready.".to_string(),
        many => format!(
            "Successfully created {} new files. They have been added to your media bin.",
            many.len()
        ),
    }
}
