//! Shared data models for the vindex worker.
//!
//! This crate provides:
//! - The deterministic identifier scheme for derived entities
//! - Job and video status enums
//! - Row types for scenes, frames, transcript segments and frame captions
//! - The structured vision payload
//! - SRT cue rendering

pub mod entities;
pub mod ids;
pub mod srt;
pub mod status;

pub use entities::{
    CaptionRow, ControlItem, FrameAnalysis, FrameEntities, FrameRow, PendingJob, SceneRow,
    SpokenSegment, StoreStats, TextOnScreen, TranscriptSegmentRow,
};
pub use ids::{caption_id, derived_id, DerivedKind};
pub use srt::{format_srt_timestamp, render_srt, SrtCue};
pub use status::{ClaimedJob, JobStatus, VideoStatus};

/// Dimensionality of the text embedding vectors stored in the database.
pub const EMBEDDING_DIMENSION: usize = 1536;
