//! Capability interfaces the worker consumes.
//!
//! `JobSource` covers the queue side (claim/complete/fail/reset/peek),
//! `Storage` the pipeline's reads and writes. `PgGateway` implements both
//! against Postgres; tests provide in-memory implementations.

use async_trait::async_trait;

use vindex_models::{
    CaptionRow, ClaimedJob, FrameRow, PendingJob, SceneRow, StoreStats, TranscriptSegmentRow,
};

use crate::error::StoreResult;

/// Queue operations for one worker process.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Atomically claim the oldest pending job, transitioning it to
    /// `processing` and incrementing its attempt counter. Returns `None`
    /// when the queue is empty.
    async fn claim_next_job(&self) -> StoreResult<Option<ClaimedJob>>;

    /// Mark a job done and its video ready.
    async fn complete_job(&self, job_id: &str, video_id: &str) -> StoreResult<()>;

    /// Mark a job failed, recording a truncated error message.
    async fn fail_job(&self, job_id: &str, error: &str) -> StoreResult<()>;

    /// Return a job to `pending` for another attempt, preserving its
    /// attempt counter and recording the last error.
    async fn reset_job(&self, job_id: &str, error: &str) -> StoreResult<()>;

    /// FIFO head of the pending queue (health view).
    async fn peek_pending(&self, limit: i64) -> StoreResult<Vec<PendingJob>>;
}

/// Persistence operations the pipeline stages use.
#[async_trait]
pub trait Storage: Send + Sync {
    /// `original_path` of a video, or NotFound.
    async fn fetch_video_path(&self, video_id: &str) -> StoreResult<String>;

    /// Normalized path and duration if stage 1 has recorded them.
    async fn normalized_info(&self, video_id: &str) -> StoreResult<Option<(String, f64)>>;

    async fn update_video_normalized(
        &self,
        video_id: &str,
        normalized_path: &str,
        duration_sec: f64,
    ) -> StoreResult<()>;

    async fn scenes_for_video(&self, video_id: &str) -> StoreResult<Vec<SceneRow>>;
    async fn bulk_insert_scenes(&self, rows: &[SceneRow]) -> StoreResult<()>;

    async fn frames_for_video(&self, video_id: &str) -> StoreResult<Vec<FrameRow>>;
    async fn bulk_insert_frames(&self, rows: &[FrameRow]) -> StoreResult<()>;

    async fn has_segments(&self, video_id: &str) -> StoreResult<bool>;
    async fn bulk_insert_segments(&self, rows: &[TranscriptSegmentRow]) -> StoreResult<()>;

    /// Frames of the video that do not yet have a caption, by frame ID.
    async fn frames_missing_caption(&self, video_id: &str) -> StoreResult<Vec<FrameRow>>;
    async fn bulk_insert_captions(&self, rows: &[CaptionRow]) -> StoreResult<()>;

    async fn segments_missing_embedding(
        &self,
        video_id: &str,
    ) -> StoreResult<Vec<TranscriptSegmentRow>>;
    async fn captions_missing_embedding(&self, video_id: &str) -> StoreResult<Vec<CaptionRow>>;

    async fn update_segment_embedding(&self, id: &str, embedding: &[f32]) -> StoreResult<()>;
    async fn update_caption_embedding(&self, id: &str, embedding: &[f32]) -> StoreResult<()>;

    /// Counters for the health view.
    async fn stats(&self) -> StoreResult<StoreStats>;

    /// Connectivity probe for the liveness endpoint.
    async fn ping(&self) -> StoreResult<()>;
}
