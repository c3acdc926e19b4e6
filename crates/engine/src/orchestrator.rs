use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ops::{OperationError, OperationKind, PrimitiveCall, PrimitiveOperations};
use crate::outputs::final_output_indices;
use crate::placeholder::{self, ResolutionError};
use crate::plan::{OutputPolicy, Plan, PlanError, Step, StepDescriptor};
use crate::registry::{MediaId, MediaKind, MediaRegistry};
use crate::response::{self, ExecutionOutcome, FinalArtifact, PLANNING_FAILURE_MESSAGE};

/// Artifact produced by one successful step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub step: usize,
    pub media_id: MediaId,
    pub path: PathBuf,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub results: BTreeMap<usize, ExecutionResult>,
    pub final_artifacts: Vec<FinalArtifact>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Planning(#[from] PlanError),
    #[error("Step {step} ({operation}) could not run: {source}")]
    Resolution {
        step: usize,
        operation: OperationKind,
        source: ResolutionError,
    },
    #[error("Step {step} ({operation}) failed: {source}")]
    Operation {
        step: usize,
        operation: OperationKind,
        source: OperationError,
    },
}

impl OrchestrationError {
    pub fn failed_step(&self) -> Option<usize> {
        match self {
            OrchestrationError::Planning(e) => e.step(),
            OrchestrationError::Resolution { step, .. } | OrchestrationError::Operation { step, .. } => Some(*step),
        }
    }

    pub fn operation(&self) -> Option<OperationKind> {
        match self {
            OrchestrationError::Planning(_) => None,
            OrchestrationError::Resolution { operation, .. }
            | OrchestrationError::Operation { operation, .. } => Some(*operation),
        }
    }

    /// Text shown to the user. Malformed plans get a generic apology.
    pub fn user_message(&self) -> String {
        match self {
            OrchestrationError::Planning(PlanError::UnknownOperation { .. }) => self.to_string(),
            OrchestrationError::Planning(_) => PLANNING_FAILURE_MESSAGE.to_string(),
            _ => self.to_string(),
        }
    }

    pub fn into_outcome(self) -> ExecutionOutcome {
        response::failure(self.failed_step(), self.operation(), self.user_message())
    }
}

enum StepFailure {
    Resolution(ResolutionError),
    Operation(OperationError),
}

impl From<ResolutionError> for StepFailure {
    fn from(e: ResolutionError) -> Self {
        StepFailure::Resolution(e)
    }
}

impl From<OperationError> for StepFailure {
    fn from(e: OperationError) -> Self {
        StepFailure::Operation(e)
    }
}

/// Runs a plan step by step against a media backend.
pub struct EditOrchestrator<'a> {
    ops: &'a dyn PrimitiveOperations,
}

impl<'a> EditOrchestrator<'a> {
    pub fn new(ops: &'a dyn PrimitiveOperations) -> Self {
        EditOrchestrator { ops }
    }

    /// Execute `plan`, adding every produced artifact to `registry`.
    pub fn execute(&self, plan: &Plan, registry: &mut MediaRegistry, active_media_id: &str) -> ExecutionOutcome {
        match self.run(plan, registry, active_media_id) {
            Ok(report) => response::success(report.final_artifacts),
            Err(e) => e.into_outcome(),
        }
    }

    /// Build the plan from planner output, then execute it.
    pub fn execute_descriptors(
        &self,
        descriptors: Vec<StepDescriptor>,
        policy: OutputPolicy,
        registry: &mut MediaRegistry,
        active_media_id: &str,
    ) -> ExecutionOutcome {
        match Plan::new(descriptors, policy) {
            Ok(plan) => self.execute(&plan, registry, active_media_id),
            Err(e) => {
                warn!("[Orchestrator] Rejected plan: {}", e);
                OrchestrationError::from(e).into_outcome()
            }
        }
    }

    pub fn run(
        &self,
        plan: &Plan,
        registry: &mut MediaRegistry,
        active_media_id: &str,
    ) -> Result<ExecutionReport, OrchestrationError> {
        // Every placeholder must point backwards before anything touches disk
        for step in plan.steps() {
            placeholder::check_order(step.index, &step.arguments).map_err(|source| {
                OrchestrationError::Resolution {
                    step: step.index,
                    operation: step.operation,
                    source,
                }
            })?;
        }

        let mut produced: BTreeMap<usize, MediaId> = BTreeMap::new();
        let mut results: BTreeMap<usize, ExecutionResult> = BTreeMap::new();

        for step in plan.steps() {
            info!(
                "[Orchestrator] Step {}/{}: {}",
                step.index,
                plan.len(),
                step.operation
            );

            let path = match self.run_step(step, registry, &produced, active_media_id) {
                Ok(path) => path,
                Err(failure) => {
                    let err = match failure {
                        StepFailure::Resolution(source) => OrchestrationError::Resolution {
                            step: step.index,
                            operation: step.operation,
                            source,
                        },
                        StepFailure::Operation(source) => OrchestrationError::Operation {
                            step: step.index,
                            operation: step.operation,
                            source,
                        },
                    };
                    warn!(
                        "[Orchestrator] Aborting run: {}. Completed before failure: {:?}",
                        err,
                        results.values().map(|r| &r.path).collect::<Vec<_>>()
                    );
                    return Err(err);
                }
            };

            let kind = MediaKind::from_path(&path);
            let media_id = registry.register_artifact(step.index, &path);
            info!(
                "[Orchestrator] Step {} produced {} ({}) at {}",
                step.index,
                media_id,
                kind.as_str(),
                path.display()
            );

            produced.insert(step.index, media_id.clone());
            results.insert(
                step.index,
                ExecutionResult {
                    step: step.index,
                    media_id,
                    path,
                    kind,
                },
            );
        }

        let final_artifacts = final_output_indices(plan)
            .into_iter()
            .filter_map(|index| results.get(&index))
            .map(|r| FinalArtifact {
                media_id: r.media_id.clone(),
                path: r.path.clone(),
                kind: r.kind,
            })
            .collect();

        Ok(ExecutionReport { results, final_artifacts })
    }

    fn run_step(
        &self,
        step: &Step,
        registry: &MediaRegistry,
        produced: &BTreeMap<usize, MediaId>,
        active_media_id: &str,
    ) -> Result<PathBuf, StepFailure> {
        let mut arguments = placeholder::resolve(&step.arguments, produced)?;

        if step.operation.default_target(&mut arguments, active_media_id) {
            debug!("[Orchestrator] Step {} targets the active media {}", step.index, active_media_id);
        }

        let call = PrimitiveCall::from_arguments(step.operation, &arguments)?;
        debug!("[Orchestrator] Step {} reads {:?}", step.index, call.inputs());
        self.dispatch(&call, registry)
    }

    fn dispatch(&self, call: &PrimitiveCall, registry: &MediaRegistry) -> Result<PathBuf, StepFailure> {
        let ops = self.ops;
        let path = match call {
            PrimitiveCall::Trim(a) => ops.trim(registry.path_of(&a.video_id)?, a.start, a.end)?,
            PrimitiveCall::AddText(a) => ops.add_text(
                registry.path_of(&a.video_id)?,
                &a.text,
                a.start,
                a.duration,
                &a.position,
                &a.style,
            )?,
            PrimitiveCall::ApplyFilter(a) => {
                ops.apply_filter(registry.path_of(&a.video_id)?, &a.filter_description)?
            }
            PrimitiveCall::ChangeSpeed(a) => ops.change_speed(registry.path_of(&a.video_id)?, a.factor)?,
            PrimitiveCall::Concatenate(a) => {
                let videos = a
                    .video_ids
                    .iter()
                    .map(|id| registry.path_of(id))
                    .collect::<Result<Vec<&Path>, _>>()?;
                ops.concatenate(&videos)?
            }
            PrimitiveCall::ExtractAudio(a) => ops.extract_audio(registry.path_of(&a.video_id)?)?,
            PrimitiveCall::AttachAudio(a) => ops.attach_audio(
                registry.path_of(&a.video_id)?,
                registry.path_of(&a.audio_id)?,
            )?,
            PrimitiveCall::TransferAudio(a) => ops.transfer_audio(
                registry.path_of(&a.source_video_id)?,
                registry.path_of(&a.destination_video_id)?,
            )?,
        };
        Ok(path)
    }
}
