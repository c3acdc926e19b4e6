use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::placeholder::ResolutionError;

/// Opaque media identifier. Uploaded media carry whatever id the caller chose;
/// artifacts produced during a run get a synthetic `result_<step>_<token>` id.
pub type MediaId = String;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "aac", "m4a", "flac", "ogg", "opus"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// Classify by file extension. Anything not recognised as audio is video.
    pub fn from_path(path: &Path) -> MediaKind {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext {
            Some(ext) if AUDIO_EXTENSIONS.contains(&ext.as_str()) => MediaKind::Audio,
            _ => MediaKind::Video,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

/// One line of registry context handed to the planner and classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaEntry {
    pub id: MediaId,
    pub filename: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRegistry {
    entries: HashMap<MediaId, PathBuf>,
}

impl MediaRegistry {
    pub fn new() -> Self {
        MediaRegistry::default()
    }

    pub fn from_entries<I, K, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<MediaId>,
        P: Into<PathBuf>,
    {
        MediaRegistry {
            entries: entries
                .into_iter()
                .map(|(id, path)| (id.into(), path.into()))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Path> {
        self.entries.get(id).map(|p| p.as_path())
    }

    /// Look up a path, reporting an absent id as a resolution failure.
    pub fn path_of(&self, id: &str) -> Result<&Path, ResolutionError> {
        self.get(id)
            .ok_or_else(|| ResolutionError::UnknownMedia { media_id: id.to_string() })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn insert(&mut self, id: impl Into<MediaId>, path: impl Into<PathBuf>) {
        self.entries.insert(id.into(), path.into());
    }

    /// Add a freshly produced artifact under a new synthetic id.
    pub fn register_artifact(&mut self, step: usize, path: impl Into<PathBuf>) -> MediaId {
        let mut id = synthetic_id(step);
        while self.entries.contains_key(&id) {
            id = synthetic_id(step);
        }
        self.entries.insert(id.clone(), path.into());
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MediaId, &PathBuf)> {
        self.entries.iter()
    }

    /// Filename and kind for every entry, sorted by id so prompts are stable.
    pub fn describe(&self) -> Vec<MediaEntry> {
        let mut described: Vec<MediaEntry> = self
            .entries
            .iter()
            .map(|(id, path)| MediaEntry {
                id: id.clone(),
                filename: path
                    .file_name()
                    .map(|f| f.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.to_string_lossy().to_string()),
                kind: MediaKind::from_path(path),
            })
            .collect();
        described.sort_by(|a, b| a.id.cmp(&b.id));
        described
    }
}

fn synthetic_id(step: usize) -> MediaId {
    let token = Uuid::new_v4().simple().to_string();
    format!("result_{}_{}", step, &token[..8])
}
