use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::registry::MediaId;

/// Key of the structured form `{"result_of_step": N}`.
pub const STRUCTURED_MARKER: &str = "result_of_step";

/// Argument keys that name media, canonical spellings and their aliases.
/// Placeholders are only recognised under these keys.
pub const MEDIA_FIELDS: &[&str] = &[
    "video_id",
    "audio_id",
    "video_ids",
    "source_video_id",
    "destination_video_id",
    "active_video_id",
    "video_path",
    "video",
    "videos",
    "audio_path",
    "audio",
    "source_id",
    "source",
    "destination_id",
    "target_video_id",
];

// Whole-value match only: `result of step 2`, `{{result_of_step_2}}`, `result_2`.
static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\{*\s*result(?:[\s_]+of[\s_]+step[\s_]+|_)(\d+)\s*\}*$")
        .expect("placeholder grammar is a valid regex")
});

fn is_media_field(key: &str) -> bool {
    MEDIA_FIELDS.contains(&key)
}

/// Reference to the artifact produced by step `N` (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlaceholderRef(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("step {referenced} has no result to use (it failed or was never reached)")]
    MissingStep { referenced: usize },
    #[error("step {step} refers to the result of step {referenced}, which does not run before it")]
    ForwardReference { step: usize, referenced: usize },
    #[error("media '{media_id}' is not in the media bin")]
    UnknownMedia { media_id: String },
}

pub fn parse_placeholder(value: &Value) -> Option<PlaceholderRef> {
    match value {
        Value::String(s) => PLACEHOLDER_RE
            .captures(s.trim())
            .and_then(|caps| caps[1].parse::<usize>().ok())
            .map(PlaceholderRef),
        Value::Object(obj) if obj.len() == 1 => obj
            .get(STRUCTURED_MARKER)
            .and_then(|n| n.as_u64())
            .map(|n| PlaceholderRef(n as usize)),
        _ => None,
    }
}

/// Every step index referenced by the media arguments in `args`, nested lists included.
pub fn references(args: &Map<String, Value>) -> BTreeSet<usize> {
    let mut found = BTreeSet::new();
    for value in args.iter().filter(|(key, _)| is_media_field(key)).map(|(_, v)| v) {
        collect_references(value, &mut found);
    }
    found
}

fn collect_references(value: &Value, found: &mut BTreeSet<usize>) {
    if let Some(PlaceholderRef(n)) = parse_placeholder(value) {
        found.insert(n);
        return;
    }
    if let Value::Array(items) = value {
        items.iter().for_each(|v| collect_references(v, found));
    }
}

/// Reject references that do not point strictly backwards from `step`.
pub fn check_order(step: usize, args: &Map<String, Value>) -> Result<(), ResolutionError> {
    match references(args).into_iter().find(|&n| n == 0 || n >= step) {
        Some(referenced) => Err(ResolutionError::ForwardReference { step, referenced }),
        None => Ok(()),
    }
}

/// Substitute every placeholder in a media argument with the id produced by
/// the step it names.
///
/// Free-text arguments and values without placeholder syntax pass through
/// untouched, so resolving an already resolved argument set returns it unchanged.
pub fn resolve(
    args: &Map<String, Value>,
    results: &BTreeMap<usize, MediaId>,
) -> Result<Map<String, Value>, ResolutionError> {
    args.iter()
        .map(|(key, value)| {
            let resolved = if is_media_field(key) {
                resolve_value(value, results)?
            } else {
                value.clone()
            };
            Ok((key.clone(), resolved))
        })
        .collect()
}

fn resolve_value(value: &Value, results: &BTreeMap<usize, MediaId>) -> Result<Value, ResolutionError> {
    if let Some(PlaceholderRef(n)) = parse_placeholder(value) {
        return results
            .get(&n)
            .map(|id| Value::String(id.clone()))
            .ok_or(ResolutionError::MissingStep { referenced: n });
    }
    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| resolve_value(v, results))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}
