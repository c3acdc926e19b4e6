use edit_engine::{MediaEntry, MediaRegistry};
use serde_json::{Map, Value};

/// What the classifier and planner are told about the project: the media bin
/// by filename and the video the user is looking at.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectContext {
    pub media: Vec<MediaEntry>,
    pub active_media_id: String,
}

impl ProjectContext {
    pub fn new(registry: &MediaRegistry, active_media_id: impl Into<String>) -> Self {
        ProjectContext {
            media: registry.describe(),
            active_media_id: active_media_id.into(),
        }
    }

    /// `{"<id>": {"filename": ..., "kind": ...}}`, pretty printed for prompts.
    pub fn media_bin_json(&self) -> String {
        let bin: Map<String, Value> = self
            .media
            .iter()
            .map(|entry| {
                (
                    entry.id.clone(),
                    serde_json::json!({"filename": entry.filename, "kind": entry.kind}),
                )
            })
            .collect();
        serde_json::to_string_pretty(&Value::Object(bin)).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_bin_lists_filenames_not_paths() {
        let registry = MediaRegistry::from_entries([
            ("v1", "/home/me/uploads/beach.mp4"),
            ("a1", "/home/me/uploads/song.mp3"),
        ]);
        let context = ProjectContext::new(&registry, "v1");
        let rendered = context.media_bin_json();

        assert!(rendered.contains("beach.mp4"));
        assert!(rendered.contains("\"audio\""));
        assert!(!rendered.contains("/home/me"));
    }
}
