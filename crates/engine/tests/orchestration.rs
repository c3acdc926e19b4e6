use edit_engine::ops::{OperationError, OperationKind, PrimitiveOperations, TextStyle};
use edit_engine::orchestrator::{EditOrchestrator, OrchestrationError};
use edit_engine::placeholder::ResolutionError;
use edit_engine::plan::{OutputPolicy, Plan, StepDescriptor};
use edit_engine::registry::{MediaKind, MediaRegistry};
use edit_engine::response::ExecutionOutcome;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// In-memory backend: names outputs after their inputs and records every call.
#[derive(Default)]
struct FakeOps {
    calls: Mutex<Vec<(OperationKind, Vec<PathBuf>)>>,
    overlays: Mutex<Vec<String>>,
    fail_on: Option<(OperationKind, &'static str)>,
}

impl FakeOps {
    fn failing(kind: OperationKind, message: &'static str) -> Self {
        FakeOps {
            fail_on: Some((kind, message)),
            ..FakeOps::default()
        }
    }

    fn record(&self, kind: OperationKind, inputs: &[&Path], ext: &str) -> Result<PathBuf, OperationError> {
        if let Some((failing, message)) = self.fail_on {
            if failing == kind {
                return Err(OperationError::rejected(message));
            }
        }
        let mut calls = self.calls.lock().unwrap();
        calls.push((kind, inputs.iter().map(|p| p.to_path_buf()).collect()));
        let stem = inputs[0].file_stem().unwrap().to_string_lossy().to_string();
        Ok(PathBuf::from(format!("/out/{}_{}_{}.{}", stem, kind, calls.len(), ext)))
    }

    fn calls(&self) -> Vec<(OperationKind, Vec<PathBuf>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl PrimitiveOperations for FakeOps {
    fn trim(&self, video: &Path, _start: f64, _end: Option<f64>) -> Result<PathBuf, OperationError> {
        self.record(OperationKind::Trim, &[video], "mp4")
    }

    fn add_text(
        &self,
        video: &Path,
        text: &str,
        _start: f64,
        _duration: f64,
        _position: &str,
        _style: &TextStyle,
    ) -> Result<PathBuf, OperationError> {
        self.overlays.lock().unwrap().push(text.to_string());
        self.record(OperationKind::AddText, &[video], "mp4")
    }

    fn apply_filter(&self, video: &Path, _filter_description: &str) -> Result<PathBuf, OperationError> {
        self.record(OperationKind::ApplyFilter, &[video], "mp4")
    }

    fn change_speed(&self, video: &Path, _factor: f64) -> Result<PathBuf, OperationError> {
        self.record(OperationKind::ChangeSpeed, &[video], "mp4")
    }

    fn concatenate(&self, videos: &[&Path]) -> Result<PathBuf, OperationError> {
        self.record(OperationKind::Concatenate, videos, "mp4")
    }

    fn extract_audio(&self, video: &Path) -> Result<PathBuf, OperationError> {
        self.record(OperationKind::ExtractAudio, &[video], "mp3")
    }

    fn attach_audio(&self, video: &Path, audio: &Path) -> Result<PathBuf, OperationError> {
        self.record(OperationKind::AttachAudio, &[video, audio], "mp4")
    }

    fn transfer_audio(&self, source: &Path, destination: &Path) -> Result<PathBuf, OperationError> {
        self.record(OperationKind::TransferAudio, &[source, destination], "mp4")
    }
}

fn registry() -> MediaRegistry {
    MediaRegistry::from_entries([
        ("v1", "/media/beach.mp4"),
        ("v2", "/media/city.mp4"),
        ("v3", "/media/forest.mp4"),
    ])
}

fn plan(steps: serde_json::Value) -> Plan {
    Plan::from_json(&steps, OutputPolicy::Independent).unwrap()
}

#[test]
fn scenario_a_trim_then_filter_yields_only_the_filtered_video() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let plan = plan(json!([
        {"operation": "trim", "arguments": {"video_id": "v1", "start": 0, "end": 3}},
        {"operation": "apply_filter", "arguments": {"video_id": "{result of step 1}", "filter_description": "grayscale"}},
    ]));

    let report = EditOrchestrator::new(&ops).run(&plan, &mut registry, "v1").unwrap();

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.final_artifacts.len(), 1);
    assert_eq!(report.final_artifacts[0].media_id, report.results[&2].media_id);

    // The filter ran on the trimmed file, not on the original upload
    let calls = ops.calls();
    assert_eq!(calls[1].1, vec![report.results[&1].path.clone()]);
}

#[test]
fn scenario_b_concatenation_collapses_to_the_last_step() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let plan = plan(json!([
        {"operation": "trim", "arguments": {"video_id": "v1", "start": 10, "end": 14}},
        {"operation": "trim", "arguments": {"video_id": "v2", "start": 10, "end": 14}},
        {"operation": "concatenate", "arguments": {"video_ids": ["result_1", "result_2"]}},
    ]));

    let report = EditOrchestrator::new(&ops).run(&plan, &mut registry, "v1").unwrap();

    assert_eq!(report.results.len(), 3);
    assert_eq!(report.final_artifacts.len(), 1);
    assert_eq!(report.final_artifacts[0].media_id, report.results[&3].media_id);
    assert_eq!(
        ops.calls()[2].1,
        vec![report.results[&1].path.clone(), report.results[&2].path.clone()]
    );
}

#[test]
fn scenario_c_independent_filters_are_both_final() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let plan = plan(json!([
        {"operation": "apply_filter", "arguments": {"video_id": "v1", "filter_description": "sepia"}},
        {"operation": "apply_filter", "arguments": {"video_id": "v2", "filter_description": "sepia"}},
    ]));

    let outcome = EditOrchestrator::new(&ops).execute(&plan, &mut registry, "v1");

    assert!(outcome.is_success());
    let finals = outcome.final_artifacts();
    assert_eq!(finals.len(), 2);
    assert!(finals[0].path.to_string_lossy().contains("beach"));
    assert!(finals[1].path.to_string_lossy().contains("city"));
    assert!(outcome.message().contains("2 new files"));
}

#[test]
fn scenario_d_extracted_audio_is_consumed_not_returned() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let plan = plan(json!([
        {"operation": "extract_audio", "arguments": {"video_id": "v1"}},
        {"operation": "attach_audio", "arguments": {"video_id": "v2", "audio_id": "{result of step 1}"}},
    ]));

    let report = EditOrchestrator::new(&ops).run(&plan, &mut registry, "v1").unwrap();

    assert_eq!(report.results[&1].kind, MediaKind::Audio);
    assert_eq!(report.results[&2].kind, MediaKind::Video);
    assert_eq!(report.final_artifacts.len(), 1);
    assert_eq!(report.final_artifacts[0].media_id, report.results[&2].media_id);
}

#[test]
fn scenario_e_reference_past_the_plan_aborts_before_running_anything() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let plan = plan(json!([
        {"operation": "trim", "arguments": {"video_id": "v1", "start": 0, "end": 3}},
        {"operation": "apply_filter", "arguments": {"video_id": "result of step 5", "filter_description": "sepia"}},
        {"operation": "change_speed", "arguments": {"video_id": "result of step 2", "factor": 2}},
    ]));

    let err = EditOrchestrator::new(&ops).run(&plan, &mut registry, "v1").unwrap_err();
    assert_eq!(
        err,
        OrchestrationError::Resolution {
            step: 2,
            operation: OperationKind::ApplyFilter,
            source: ResolutionError::ForwardReference { step: 2, referenced: 5 },
        }
    );
    assert!(ops.calls().is_empty());
    assert_eq!(registry.len(), 3);

    let outcome = EditOrchestrator::new(&ops).execute(&plan, &mut registry, "v1");
    match outcome {
        ExecutionOutcome::Error { failed_step, operation, .. } => {
            assert_eq!(failed_step, Some(2));
            assert_eq!(operation, Some(OperationKind::ApplyFilter));
        }
        other => panic!("expected an error outcome, got {:?}", other),
    }
}

#[test]
fn self_reference_never_resolves() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let plan = plan(json!([
        {"operation": "apply_filter", "arguments": {"video_id": "result of step 1", "filter_description": "sepia"}},
    ]));

    let err = EditOrchestrator::new(&ops).run(&plan, &mut registry, "v1").unwrap_err();
    assert_eq!(err.failed_step(), Some(1));
    assert!(ops.calls().is_empty());
}

#[test]
fn long_linear_chain_has_exactly_one_final_artifact() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let mut steps = vec![json!({"operation": "trim", "arguments": {"video_id": "v1", "start": 0, "end": 30}})];
    for i in 1..6 {
        steps.push(json!({
            "operation": "change_speed",
            "arguments": {"video_id": format!("result of step {}", i), "factor": 1.1},
        }));
    }
    let plan = plan(json!(steps));

    let report = EditOrchestrator::new(&ops).run(&plan, &mut registry, "v1").unwrap();

    assert_eq!(report.results.len(), 6);
    assert_eq!(report.final_artifacts.len(), 1);
    assert_eq!(report.final_artifacts[0].media_id, report.results[&6].media_id);
}

#[test]
fn concatenation_overrides_an_unconsumed_branch() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let plan = plan(json!([
        {"operation": "apply_filter", "arguments": {"video_id": "v3", "filter_description": "sepia"}},
        {"operation": "trim", "arguments": {"video_id": "v1", "start": 0, "end": 2}},
        {"operation": "concatenate", "arguments": {"video_ids": ["result of step 2", "v2"]}},
    ]));

    let report = EditOrchestrator::new(&ops).run(&plan, &mut registry, "v1").unwrap();
    assert_eq!(report.final_artifacts.len(), 1);
    assert_eq!(report.final_artifacts[0].media_id, report.results[&3].media_id);
}

#[test]
fn missing_target_defaults_to_the_active_media() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let plan = plan(json!([
        {"operation": "trim_video", "arguments": {"start_time": 4, "end_time": 8}},
    ]));

    EditOrchestrator::new(&ops).run(&plan, &mut registry, "v2").unwrap();
    assert_eq!(ops.calls()[0].1, vec![PathBuf::from("/media/city.mp4")]);
}

#[test]
fn null_target_alias_falls_back_to_the_active_media() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let plan = plan(json!([
        {"action": "trim_video", "active_video_id": null, "start_time": 4, "end_time": 8},
    ]));

    EditOrchestrator::new(&ops).run(&plan, &mut registry, "v3").unwrap();
    assert_eq!(ops.calls()[0].1, vec![PathBuf::from("/media/forest.mp4")]);
}

#[test]
fn overlay_text_that_looks_like_a_reference_is_kept_verbatim() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let plan = plan(json!([
        {"operation": "add_text", "arguments": {"video_id": "v1", "text": "Result 1", "duration": 3}},
        {"operation": "add_text", "arguments": {"video_id": "result of step 1", "text": "Result 2", "duration": 3}},
    ]));

    let report = EditOrchestrator::new(&ops).run(&plan, &mut registry, "v1").unwrap();

    assert_eq!(report.results.len(), 2);
    assert_eq!(*ops.overlays.lock().unwrap(), vec!["Result 1".to_string(), "Result 2".to_string()]);
    assert_eq!(ops.calls()[1].1, vec![report.results[&1].path.clone()]);
}

#[test]
fn produced_artifacts_join_the_registry() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let plan = plan(json!([
        {"operation": "trim", "arguments": {"video_id": "v1", "start": 0, "end": 3}},
        {"operation": "extract_audio", "arguments": {"video_id": "result of step 1"}},
    ]));

    let report = EditOrchestrator::new(&ops).run(&plan, &mut registry, "v1").unwrap();

    assert_eq!(registry.len(), 5);
    for result in report.results.values() {
        assert_eq!(registry.get(&result.media_id), Some(result.path.as_path()));
    }
    assert_eq!(registry.get("v1"), Some(Path::new("/media/beach.mp4")));
}

#[test]
fn unknown_media_is_a_resolution_error() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let plan = plan(json!([
        {"operation": "apply_filter", "arguments": {"video_id": "v9", "filter_description": "sepia"}},
    ]));

    let err = EditOrchestrator::new(&ops).run(&plan, &mut registry, "v1").unwrap_err();
    assert!(matches!(
        err,
        OrchestrationError::Resolution {
            step: 1,
            source: ResolutionError::UnknownMedia { .. },
            ..
        }
    ));
    assert!(err.to_string().contains("'v9' is not in the media bin"));
}

#[test]
fn operation_failure_stops_the_run_and_keeps_its_message() {
    let ops = FakeOps::failing(OperationKind::ApplyFilter, "unknown filter 'sparkles'");
    let mut registry = registry();
    let plan = plan(json!([
        {"operation": "trim", "arguments": {"video_id": "v1", "start": 0, "end": 3}},
        {"operation": "apply_filter", "arguments": {"video_id": "result of step 1", "filter_description": "sparkles"}},
        {"operation": "change_speed", "arguments": {"video_id": "result of step 2", "factor": 2}},
    ]));

    let outcome = EditOrchestrator::new(&ops).execute(&plan, &mut registry, "v1");

    match &outcome {
        ExecutionOutcome::Error { failed_step, operation, message } => {
            assert_eq!(*failed_step, Some(2));
            assert_eq!(*operation, Some(OperationKind::ApplyFilter));
            assert!(message.contains("unknown filter 'sparkles'"));
        }
        other => panic!("expected an error outcome, got {:?}", other),
    }
    assert!(outcome.final_artifacts().is_empty());
    // Step 3 never ran
    assert_eq!(ops.calls().len(), 1);
}

#[test]
fn invalid_parameters_are_reported_not_dispatched() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let plan = plan(json!([
        {"operation": "trim", "arguments": {"video_id": "v1", "start": 9, "end": 3}},
    ]));

    let err = EditOrchestrator::new(&ops).run(&plan, &mut registry, "v1").unwrap_err();
    assert_eq!(err.failed_step(), Some(1));
    assert!(err.to_string().contains("must be after start time"));
    assert!(ops.calls().is_empty());
}

#[test]
fn unknown_operation_from_the_planner_is_reported() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let outcome = EditOrchestrator::new(&ops).execute_descriptors(
        vec![
            StepDescriptor::new("trim", json!({"video_id": "v1", "start": 0, "end": 1})),
            StepDescriptor::new("levitate", json!({})),
        ],
        OutputPolicy::Independent,
        &mut registry,
        "v1",
    );

    match outcome {
        ExecutionOutcome::Error { failed_step, message, .. } => {
            assert_eq!(failed_step, Some(2));
            assert!(message.contains("levitate"));
        }
        other => panic!("expected an error outcome, got {:?}", other),
    }
    assert!(ops.calls().is_empty());
}

#[test]
fn single_output_policy_from_the_planner_keeps_only_the_last_result() {
    let ops = FakeOps::default();
    let mut registry = registry();
    let outcome = EditOrchestrator::new(&ops).execute_descriptors(
        vec![
            StepDescriptor::new("apply_filter", json!({"video_id": "v1", "filter_description": "sepia"})),
            StepDescriptor::new("apply_filter", json!({"video_id": "v2", "filter_description": "sepia"})),
        ],
        OutputPolicy::SingleCombined,
        &mut registry,
        "v1",
    );

    assert_eq!(outcome.final_artifacts().len(), 1);
    assert!(outcome.final_artifacts()[0].path.to_string_lossy().contains("city"));
}
