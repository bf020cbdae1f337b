//! Deterministic identifier derivation for entities produced by the pipeline.
//!
//! Every derived row ID is a pure function of its parent ID and a dense
//! index. Re-running a stage therefore regenerates the exact same IDs, which
//! is what makes conflict-ignore re-insertion safe.

use std::fmt;

/// Kind of derived entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedKind {
    Scene,
    Frame,
    Segment,
}

impl DerivedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DerivedKind::Scene => "scene",
            DerivedKind::Frame => "frame",
            DerivedKind::Segment => "segment",
        }
    }
}

impl fmt::Display for DerivedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the ID of a scene, frame or transcript segment.
///
/// Format: `{video_id}_{kind}_{idx}` with the index zero-padded to at least
/// three digits (wider indices keep all their digits).
pub fn derived_id(video_id: &str, kind: DerivedKind, idx: usize) -> String {
    format!("{video_id}_{kind}_{idx:03}")
}

/// Derive the caption ID for a frame.
pub fn caption_id(frame_id: &str) -> String {
    format!("{frame_id}_caption")
}
