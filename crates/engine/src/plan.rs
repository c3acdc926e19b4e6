use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::ops::OperationKind;
use crate::placeholder;

/// One step as it arrives from the planner: `{operation, arguments}`.
///
/// Two older shapes are also accepted: `{"action": "trim", "start": 1, ...}`
/// with the arguments inlined, and `{"trim_video": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepDescriptor {
    pub operation: String,
    pub arguments: Map<String, Value>,
}

impl StepDescriptor {
    pub fn new(operation: impl Into<String>, arguments: Value) -> Self {
        StepDescriptor {
            operation: operation.into(),
            arguments: match arguments {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    pub fn from_value(value: Value) -> Result<Self, String> {
        let mut obj = match value {
            Value::Object(obj) => obj,
            other => return Err(format!("step must be a JSON object, got {}", other)),
        };

        for key in ["operation", "action", "tool"] {
            if let Some(name) = obj.remove(key) {
                let name = name
                    .as_str()
                    .ok_or_else(|| format!("'{}' must be a string", key))?
                    .to_string();
                let arguments = match obj.remove("arguments").or_else(|| obj.remove("args")) {
                    Some(Value::Object(args)) => args,
                    Some(other) => return Err(format!("arguments must be an object, got {}", other)),
                    None => obj,
                };
                return Ok(StepDescriptor { operation: name, arguments });
            }
        }

        if obj.len() == 1 {
            if let Some((name, Value::Object(args))) = obj.into_iter().next() {
                return Ok(StepDescriptor { operation: name, arguments: args });
            }
        }
        Err("step has no operation name".to_string())
    }
}

impl<'de> Deserialize<'de> for StepDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        StepDescriptor::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// How the final artifacts of a plan are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputPolicy {
    /// Every result no later step consumes is final.
    #[default]
    Independent,
    /// The user asked for one combined output: only the last result is final.
    SingleCombined,
}

impl OutputPolicy {
    pub fn from_single_output(single: bool) -> Self {
        if single {
            OutputPolicy::SingleCombined
        } else {
            OutputPolicy::Independent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("the plan has no steps")]
    Empty,
    #[error("step {step} uses unknown operation '{name}'")]
    UnknownOperation { step: usize, name: String },
    #[error("could not read the plan: {0}")]
    Malformed(String),
}

impl PlanError {
    pub fn step(&self) -> Option<usize> {
        match self {
            PlanError::UnknownOperation { step, .. } => Some(*step),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// 1-based position in the plan.
    pub index: usize,
    pub operation: OperationKind,
    pub arguments: Map<String, Value>,
}

impl Step {
    /// Earlier steps whose results this step consumes.
    pub fn depends_on(&self) -> BTreeSet<usize> {
        placeholder::references(&self.arguments)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    steps: Vec<Step>,
    policy: OutputPolicy,
}

impl Plan {
    pub fn new(descriptors: Vec<StepDescriptor>, policy: OutputPolicy) -> Result<Plan, PlanError> {
        if descriptors.is_empty() {
            return Err(PlanError::Empty);
        }

        let steps = descriptors
            .into_iter()
            .enumerate()
            .map(|(i, descriptor)| {
                let index = i + 1;
                let operation = OperationKind::parse(&descriptor.operation).ok_or_else(|| {
                    PlanError::UnknownOperation {
                        step: index,
                        name: descriptor.operation.clone(),
                    }
                })?;
                Ok(Step {
                    index,
                    operation,
                    arguments: descriptor.arguments,
                })
            })
            .collect::<Result<Vec<_>, PlanError>>()?;

        Ok(Plan { steps, policy })
    }

    /// Parse raw planner JSON (an array of step objects) into a plan.
    pub fn from_json(steps: &Value, policy: OutputPolicy) -> Result<Plan, PlanError> {
        let descriptors: Vec<StepDescriptor> =
            serde_json::from_value(steps.clone()).map_err(|e| PlanError::Malformed(e.to_string()))?;
        Plan::new(descriptors, policy)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.steps.len()
    }

    pub fn policy(&self) -> OutputPolicy {
        self.policy
    }

    pub fn has_concatenation(&self) -> bool {
        self.steps.iter().any(|s| s.operation == OperationKind::Concatenate)
    }
}
