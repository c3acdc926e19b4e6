use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::registry::MediaId;

/// The closed set of primitive edits the orchestrator can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Trim,
    AddText,
    ApplyFilter,
    ChangeSpeed,
    Concatenate,
    ExtractAudio,
    AttachAudio,
    TransferAudio,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        OperationKind::Trim,
        OperationKind::AddText,
        OperationKind::ApplyFilter,
        OperationKind::ChangeSpeed,
        OperationKind::Concatenate,
        OperationKind::ExtractAudio,
        OperationKind::AttachAudio,
        OperationKind::TransferAudio,
    ];

    /// Accepts the canonical names and the older tool-style names.
    pub fn parse(name: &str) -> Option<OperationKind> {
        match name.trim().to_ascii_lowercase().as_str() {
            "trim" | "trim_video" => Some(OperationKind::Trim),
            "add_text" | "add_text_to_video" => Some(OperationKind::AddText),
            "apply_filter" | "apply_filter_to_video" => Some(OperationKind::ApplyFilter),
            "change_speed" | "change_video_speed" => Some(OperationKind::ChangeSpeed),
            "concatenate" | "concatenate_videos" => Some(OperationKind::Concatenate),
            "extract_audio" => Some(OperationKind::ExtractAudio),
            "attach_audio" | "add_audio_to_video" => Some(OperationKind::AttachAudio),
            "transfer_audio" | "extract_and_add_audio" => Some(OperationKind::TransferAudio),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Trim => "trim",
            OperationKind::AddText => "add_text",
            OperationKind::ApplyFilter => "apply_filter",
            OperationKind::ChangeSpeed => "change_speed",
            OperationKind::Concatenate => "concatenate",
            OperationKind::ExtractAudio => "extract_audio",
            OperationKind::AttachAudio => "attach_audio",
            OperationKind::TransferAudio => "transfer_audio",
        }
    }

    /// Argument that falls back to the active media when the step omits it.
    pub fn target_field(&self) -> Option<&'static str> {
        match self {
            OperationKind::Concatenate => None,
            OperationKind::TransferAudio => Some("destination_video_id"),
            _ => Some("video_id"),
        }
    }

    /// Older argument spellings of the target field, checked before defaulting.
    fn target_aliases(&self) -> &'static [&'static str] {
        match self {
            OperationKind::Concatenate => &[],
            OperationKind::TransferAudio => &["destination_id", "target_video_id"],
            _ => &["active_video_id", "video_path", "video"],
        }
    }

    /// Point the target at `active_media_id` when no spelling of it carries a
    /// value. Null spellings are dropped first so they cannot shadow the
    /// default. Returns whether the default was applied.
    pub fn default_target(&self, args: &mut Map<String, Value>, active_media_id: &str) -> bool {
        let Some(field) = self.target_field() else {
            return false;
        };
        let keys: Vec<&str> = std::iter::once(field)
            .chain(self.target_aliases().iter().copied())
            .collect();
        args.retain(|key, value| !(value.is_null() && keys.contains(&key.as_str())));
        if keys.iter().any(|key| args.contains_key(*key)) {
            return false;
        }
        args.insert(field.to_string(), Value::String(active_media_id.to_string()));
        true
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("invalid arguments for {operation}: {reason}")]
    InvalidArguments { operation: OperationKind, reason: String },
    #[error("{0}")]
    Rejected(String),
}

impl OperationError {
    pub fn rejected(message: impl Into<String>) -> Self {
        OperationError::Rejected(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrimArgs {
    #[serde(alias = "active_video_id", alias = "video_path", alias = "video")]
    pub video_id: MediaId,
    #[serde(alias = "start_time")]
    pub start: f64,
    #[serde(default, alias = "end_time")]
    pub end: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextStyle {
    #[serde(default = "default_font_size", alias = "fontsize")]
    pub font_size: u32,
    #[serde(default = "default_text_color")]
    pub color: String,
}

fn default_font_size() -> u32 {
    70
}

fn default_text_color() -> String {
    "white".to_string()
}

impl Default for TextStyle {
    fn default() -> Self {
        TextStyle {
            font_size: default_font_size(),
            color: default_text_color(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddTextArgs {
    #[serde(alias = "active_video_id", alias = "video_path", alias = "video")]
    pub video_id: MediaId,
    pub text: String,
    #[serde(default, alias = "start_time")]
    pub start: f64,
    pub duration: f64,
    #[serde(default = "default_position")]
    pub position: String,
    #[serde(default)]
    pub style: TextStyle,
}

fn default_position() -> String {
    "center".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterArgs {
    #[serde(alias = "active_video_id", alias = "video_path", alias = "video")]
    pub video_id: MediaId,
    #[serde(alias = "filter", alias = "description")]
    pub filter_description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpeedArgs {
    #[serde(alias = "active_video_id", alias = "video_path", alias = "video")]
    pub video_id: MediaId,
    #[serde(alias = "speed_factor", alias = "speed")]
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConcatArgs {
    #[serde(alias = "videos")]
    pub video_ids: Vec<MediaId>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractAudioArgs {
    #[serde(alias = "active_video_id", alias = "video_path", alias = "video")]
    pub video_id: MediaId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttachAudioArgs {
    #[serde(alias = "active_video_id", alias = "video_path", alias = "video")]
    pub video_id: MediaId,
    #[serde(alias = "audio_path", alias = "audio")]
    pub audio_id: MediaId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransferAudioArgs {
    #[serde(alias = "source_id", alias = "source")]
    pub source_video_id: MediaId,
    #[serde(alias = "destination_id", alias = "target_video_id")]
    pub destination_video_id: MediaId,
}

/// A fully resolved primitive call: concrete ids and literal parameters only.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveCall {
    Trim(TrimArgs),
    AddText(AddTextArgs),
    ApplyFilter(FilterArgs),
    ChangeSpeed(SpeedArgs),
    Concatenate(ConcatArgs),
    ExtractAudio(ExtractAudioArgs),
    AttachAudio(AttachAudioArgs),
    TransferAudio(TransferAudioArgs),
}

impl PrimitiveCall {
    pub fn from_arguments(kind: OperationKind, args: &Map<String, Value>) -> Result<Self, OperationError> {
        let call = match kind {
            OperationKind::Trim => PrimitiveCall::Trim(typed(kind, args)?),
            OperationKind::AddText => PrimitiveCall::AddText(typed(kind, args)?),
            OperationKind::ApplyFilter => PrimitiveCall::ApplyFilter(typed(kind, args)?),
            OperationKind::ChangeSpeed => PrimitiveCall::ChangeSpeed(typed(kind, args)?),
            OperationKind::Concatenate => PrimitiveCall::Concatenate(typed(kind, args)?),
            OperationKind::ExtractAudio => PrimitiveCall::ExtractAudio(typed(kind, args)?),
            OperationKind::AttachAudio => PrimitiveCall::AttachAudio(typed(kind, args)?),
            OperationKind::TransferAudio => PrimitiveCall::TransferAudio(typed(kind, args)?),
        };
        call.validate()?;
        Ok(call)
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            PrimitiveCall::Trim(_) => OperationKind::Trim,
            PrimitiveCall::AddText(_) => OperationKind::AddText,
            PrimitiveCall::ApplyFilter(_) => OperationKind::ApplyFilter,
            PrimitiveCall::ChangeSpeed(_) => OperationKind::ChangeSpeed,
            PrimitiveCall::Concatenate(_) => OperationKind::Concatenate,
            PrimitiveCall::ExtractAudio(_) => OperationKind::ExtractAudio,
            PrimitiveCall::AttachAudio(_) => OperationKind::AttachAudio,
            PrimitiveCall::TransferAudio(_) => OperationKind::TransferAudio,
        }
    }

    /// Media ids this call reads, in argument order.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            PrimitiveCall::Trim(a) => vec![a.video_id.as_str()],
            PrimitiveCall::AddText(a) => vec![a.video_id.as_str()],
            PrimitiveCall::ApplyFilter(a) => vec![a.video_id.as_str()],
            PrimitiveCall::ChangeSpeed(a) => vec![a.video_id.as_str()],
            PrimitiveCall::Concatenate(a) => a.video_ids.iter().map(|s| s.as_str()).collect(),
            PrimitiveCall::ExtractAudio(a) => vec![a.video_id.as_str()],
            PrimitiveCall::AttachAudio(a) => vec![a.video_id.as_str(), a.audio_id.as_str()],
            PrimitiveCall::TransferAudio(a) => {
                vec![a.source_video_id.as_str(), a.destination_video_id.as_str()]
            }
        }
    }

    // Checks that need no media file; range checks against the real
    // duration belong to the adapter.
    fn validate(&self) -> Result<(), OperationError> {
        let invalid = |reason: String| {
            Err(OperationError::InvalidArguments {
                operation: self.kind(),
                reason,
            })
        };
        match self {
            PrimitiveCall::Trim(a) => {
                if !a.start.is_finite() || a.start < 0.0 {
                    return invalid(format!("start time {} must be zero or positive", a.start));
                }
                if let Some(end) = a.end {
                    if end <= a.start {
                        return invalid(format!(
                            "end time {}s must be after start time {}s",
                            end, a.start
                        ));
                    }
                }
            }
            PrimitiveCall::AddText(a) => {
                if a.text.trim().is_empty() {
                    return invalid("text to overlay is empty".to_string());
                }
                if a.start < 0.0 {
                    return invalid(format!("start time {} must be zero or positive", a.start));
                }
                if a.duration <= 0.0 {
                    return invalid(format!("duration {} must be positive", a.duration));
                }
            }
            PrimitiveCall::ApplyFilter(a) => {
                if a.filter_description.trim().is_empty() {
                    return invalid("filter description is empty".to_string());
                }
            }
            PrimitiveCall::ChangeSpeed(a) => {
                if !a.factor.is_finite() || a.factor <= 0.0 {
                    return invalid(format!("speed factor {} must be greater than zero", a.factor));
                }
            }
            PrimitiveCall::Concatenate(a) => {
                if a.video_ids.len() < 2 {
                    return invalid(format!(
                        "concatenation needs at least two videos, got {}",
                        a.video_ids.len()
                    ));
                }
            }
            PrimitiveCall::ExtractAudio(_)
            | PrimitiveCall::AttachAudio(_)
            | PrimitiveCall::TransferAudio(_) => {}
        }
        Ok(())
    }
}

fn typed<T: DeserializeOwned>(kind: OperationKind, args: &Map<String, Value>) -> Result<T, OperationError> {
    serde_json::from_value(Value::Object(args.clone())).map_err(|e| OperationError::InvalidArguments {
        operation: kind,
        reason: e.to_string(),
    })
}

/// Media backend the orchestrator drives.
///
/// Every method receives concrete file paths, never media ids or
/// placeholders, and either produces exactly one new artifact file or fails
/// without leaving one behind.
pub trait PrimitiveOperations: Send + Sync {
    fn trim(&self, video: &Path, start: f64, end: Option<f64>) -> Result<PathBuf, OperationError>;

    fn add_text(
        &self,
        video: &Path,
        text: &str,
        start: f64,
        duration: f64,
        position: &str,
        style: &TextStyle,
    ) -> Result<PathBuf, OperationError>;

    fn apply_filter(&self, video: &Path, filter_description: &str) -> Result<PathBuf, OperationError>;

    fn change_speed(&self, video: &Path, factor: f64) -> Result<PathBuf, OperationError>;

    fn concatenate(&self, videos: &[&Path]) -> Result<PathBuf, OperationError>;

    fn extract_audio(&self, video: &Path) -> Result<PathBuf, OperationError>;

    fn attach_audio(&self, video: &Path, audio: &Path) -> Result<PathBuf, OperationError>;

    fn transfer_audio(&self, source: &Path, destination: &Path) -> Result<PathBuf, OperationError>;
}
