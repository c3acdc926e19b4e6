//! In-memory collaborators for daemon tests.

use anyhow::{anyhow, Result};
use edit_engine::{OperationError, OperationKind, PrimitiveOperations, TextStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::assistant::QuestionAnswerer;
use crate::context::ProjectContext;
use crate::intent::{IntentClassifier, IntentDecision};
use crate::llm::ChatMessage;
use crate::planner::{ActionPlanner, PlannerOutput, PlanningFailure};
use crate::vision::VisionAnalyzer;

/// Names each output `/out/<input stem>_<operation>_<call number>.<ext>`.
#[derive(Default)]
pub struct FakeOperations {
    calls: Mutex<Vec<OperationKind>>,
}

impl FakeOperations {
    pub fn calls(&self) -> Vec<OperationKind> {
        self.calls.lock().unwrap().clone()
    }

    fn produce(&self, kind: OperationKind, input: &Path, ext: &str) -> Result<PathBuf, OperationError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(kind);
        let stem = input.file_stem().unwrap().to_string_lossy().to_string();
        Ok(PathBuf::from(format!("/out/{}_{}_{}.{}", stem, kind, calls.len(), ext)))
    }
}

impl PrimitiveOperations for FakeOperations {
    fn trim(&self, video: &Path, _start: f64, _end: Option<f64>) -> Result<PathBuf, OperationError> {
        self.produce(OperationKind::Trim, video, "mp4")
    }

    fn add_text(
        &self,
        video: &Path,
        _text: &str,
        _start: f64,
        _duration: f64,
        _position: &str,
        _style: &TextStyle,
    ) -> Result<PathBuf, OperationError> {
        self.produce(OperationKind::AddText, video, "mp4")
    }

    fn apply_filter(&self, video: &Path, _filter_description: &str) -> Result<PathBuf, OperationError> {
        self.produce(OperationKind::ApplyFilter, video, "mp4")
    }

    fn change_speed(&self, video: &Path, _factor: f64) -> Result<PathBuf, OperationError> {
        self.produce(OperationKind::ChangeSpeed, video, "mp4")
    }

    fn concatenate(&self, videos: &[&Path]) -> Result<PathBuf, OperationError> {
        self.produce(OperationKind::Concatenate, videos[0], "mp4")
    }

    fn extract_audio(&self, video: &Path) -> Result<PathBuf, OperationError> {
        self.produce(OperationKind::ExtractAudio, video, "mp3")
    }

    fn attach_audio(&self, video: &Path, _audio: &Path) -> Result<PathBuf, OperationError> {
        self.produce(OperationKind::AttachAudio, video, "mp4")
    }

    fn transfer_audio(&self, _source: &Path, destination: &Path) -> Result<PathBuf, OperationError> {
        self.produce(OperationKind::TransferAudio, destination, "mp4")
    }
}

pub struct ScriptedClassifier {
    decision: Option<IntentDecision>,
}

impl ScriptedClassifier {
    pub fn new(decision: IntentDecision) -> Self {
        ScriptedClassifier { decision: Some(decision) }
    }

    pub fn unavailable() -> Self {
        ScriptedClassifier { decision: None }
    }
}

#[async_trait::async_trait]
impl IntentClassifier for ScriptedClassifier {
    async fn classify(&self, _conversation: &[ChatMessage], _context: &ProjectContext) -> Result<IntentDecision> {
        self.decision
            .clone()
            .ok_or_else(|| anyhow!("LLM returned error 503 Service Unavailable"))
    }
}

pub struct ScriptedPlanner {
    output: Option<PlannerOutput>,
}

impl ScriptedPlanner {
    pub fn new(output: Option<PlannerOutput>) -> Self {
        ScriptedPlanner { output }
    }
}

#[async_trait::async_trait]
impl ActionPlanner for ScriptedPlanner {
    async fn plan(&self, _instruction: &str, _context: &ProjectContext) -> Result<PlannerOutput, PlanningFailure> {
        self.output
            .clone()
            .ok_or_else(|| PlanningFailure::Malformed("missing 'steps' list".to_string()))
    }
}

pub struct CountingVision {
    pub calls: AtomicUsize,
    description: String,
}

impl CountingVision {
    pub fn new(description: &str) -> Self {
        CountingVision {
            calls: AtomicUsize::new(0),
            description: description.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl VisionAnalyzer for CountingVision {
    async fn describe(&self, _media_path: &Path) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.description.clone())
    }
}

pub struct EchoAnswerer;

#[async_trait::async_trait]
impl QuestionAnswerer for EchoAnswerer {
    async fn answer(
        &self,
        question: &str,
        _context: &ProjectContext,
        video_description: Option<&str>,
    ) -> Result<String> {
        Ok(match video_description {
            Some(description) => format!("About '{}': {}", question, description),
            None => format!("About '{}': I can trim, filter and more.", question),
        })
    }
}
