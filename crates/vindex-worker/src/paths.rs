//! Filesystem layout under the configured data root.
//!
//! ```text
//! uploads/{video_id}_{name}.{ext}        input (external producer)
//! processed/{video_id}/normalized.mp4    normalize output
//! processed/{video_id}/audio.wav         normalize output
//! frames/{video_id}/scene_{idx:03}.jpg   frames output
//! subs/{video_id}.srt                    transcribe sidecar
//! ```
//!
//! Paths are keyed by video ID, so concurrent jobs never share files.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a stored upload path against the data root. Absolute paths
    /// pass through untouched.
    pub fn resolve_upload(&self, stored_path: &str) -> PathBuf {
        let path = Path::new(stored_path);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        self.root.join(stored_path.trim_start_matches('/'))
    }

    pub fn processed_dir(&self, video_id: &str) -> PathBuf {
        self.root.join("processed").join(video_id)
    }

    pub fn normalized_path(&self, video_id: &str) -> PathBuf {
        self.processed_dir(video_id).join("normalized.mp4")
    }

    /// Normalized path relative to the data root, as stored in the videos row.
    pub fn normalized_rel(&self, video_id: &str) -> String {
        format!("processed/{video_id}/normalized.mp4")
    }

    pub fn audio_path(&self, video_id: &str) -> PathBuf {
        self.processed_dir(video_id).join("audio.wav")
    }

    pub fn frames_dir(&self, video_id: &str) -> PathBuf {
        self.root.join("frames").join(video_id)
    }

    pub fn frame_path(&self, video_id: &str, scene_idx: usize) -> PathBuf {
        self.frames_dir(video_id).join(format!("scene_{scene_idx:03}.jpg"))
    }

    /// Frame path relative to the data root, as stored in the frames row.
    pub fn frame_rel(&self, video_id: &str, scene_idx: usize) -> String {
        format!("frames/{video_id}/scene_{scene_idx:03}.jpg")
    }

    pub fn srt_path(&self, video_id: &str) -> PathBuf {
        self.root.join("subs").join(format!("{video_id}.srt"))
    }
}
