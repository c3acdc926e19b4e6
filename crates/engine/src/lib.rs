pub mod ops;
pub mod orchestrator;
pub mod outputs;
pub mod placeholder;
pub mod plan;
pub mod registry;
pub mod response;

pub use ops::{OperationError, OperationKind, PrimitiveCall, PrimitiveOperations, TextStyle};
pub use orchestrator::{EditOrchestrator, ExecutionReport, ExecutionResult, OrchestrationError};
pub use plan::{OutputPolicy, Plan, PlanError, Step, StepDescriptor};
pub use registry::{MediaEntry, MediaId, MediaKind, MediaRegistry};
pub use response::{ExecutionOutcome, FinalArtifact};
