//! Row types for the entities the pipeline produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A half-open time interval of the normalized video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRow {
    pub id: String,
    pub video_id: String,
    /// Dense 0-based index within the video.
    pub idx: i32,
    pub t_start: f64,
    pub t_end: f64,
}

/// A still image sampled inside a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRow {
    pub id: String,
    pub scene_id: String,
    /// Timestamp of the sampled frame, within the scene interval.
    pub t_frame: f64,
    /// Path of the saved JPEG, relative to the data root.
    pub path: String,
    /// 64-bit perceptual hash, hex-encoded.
    pub phash: String,
}

/// One contiguous utterance from the audio track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegmentRow {
    pub id: String,
    pub video_id: String,
    pub t_start: f64,
    pub t_end: f64,
    pub text: String,
}

/// A transcribed utterance as returned by the speech-to-text capability,
/// before IDs are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpokenSegment {
    pub t_start: f64,
    pub t_end: f64,
    pub text: String,
}

/// A UI control visible in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    pub position: String,
}

/// Text detected on screen in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextOnScreen {
    pub text: String,
    pub position: String,
}

/// Structured entity payload stored alongside a caption.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameEntities {
    pub controls: Vec<ControlItem>,
    pub text_on_screen: Vec<TextOnScreen>,
}

/// Validated output of the vision capability for one frame.
///
/// Unknown or missing fields fail deserialization, which is how schema
/// violations are detected at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrameAnalysis {
    pub caption: String,
    pub controls: Vec<ControlItem>,
    pub text_on_screen: Vec<TextOnScreen>,
}

impl FrameAnalysis {
    /// Split the analysis into the caption text and the entity payload.
    pub fn into_parts(self) -> (String, FrameEntities) {
        let entities = FrameEntities {
            controls: self.controls,
            text_on_screen: self.text_on_screen,
        };
        (self.caption, entities)
    }
}

/// AI analysis of one frame, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionRow {
    pub id: String,
    pub frame_id: String,
    pub caption: String,
    pub entities: FrameEntities,
}

/// A pending queue entry, as exposed by the health view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingJob {
    pub id: String,
    pub video_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub original_path: String,
}

/// Read-only counters for the health view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    /// Job counts by status string.
    pub jobs: HashMap<String, i64>,
    /// Video counts by status string.
    pub videos: HashMap<String, i64>,
    pub videos_with_transcripts: i64,
    pub total_segments: i64,
    pub total_frames: i64,
    pub total_captions: i64,
}
