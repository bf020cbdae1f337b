//! Pipeline orchestrator.
//!
//! Runs the six stages in fixed order for one `(job_id, video_id)`. Each
//! stage reads prior state from storage and skips itself when its output
//! already exists, which is what makes a re-queued job resumable. Stage
//! errors bubble up classified; the controller decides between re-queueing
//! and failing the job.

use std::future::Future;
use std::sync::Arc;

use vindex_ai::{AiError, SpeechToText, TextEmbedder, VisionAnalyzer};
use vindex_db::{Storage, StoreError};
use vindex_media::MediaToolkit;

use crate::error::WorkerResult;
use crate::paths::DataLayout;
use crate::retry::{retry_async, RetryConfig};

pub mod embed;
pub mod frames;
pub mod normalize;
pub mod scenes;
pub mod transcribe;
pub mod vision;

#[cfg(test)]
pub(crate) mod testing;

/// Stage toggles and tuning knobs.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_frames_per_video: usize,
    pub vision_max_concurrent: usize,
    pub enable_transcription: bool,
    pub enable_vision_analysis: bool,
    pub enable_embeddings: bool,
}

/// Collaborators shared by every stage, constructed once at process start.
pub struct PipelineContext {
    pub storage: Arc<dyn Storage>,
    pub media: Arc<dyn MediaToolkit>,
    pub speech: Arc<dyn SpeechToText>,
    pub vision: Arc<dyn VisionAnalyzer>,
    pub embedder: Arc<dyn TextEmbedder>,
    pub layout: DataLayout,
    pub settings: PipelineSettings,
}

/// Run the full pipeline for one claimed job.
pub async fn run_pipeline(ctx: &PipelineContext, job_id: &str, video_id: &str) -> WorkerResult<()> {
    let normalized = normalize::run(ctx, job_id, video_id).await?;
    transcribe::run(ctx, job_id, video_id, &normalized.audio_path).await?;
    let scene_rows = scenes::run(ctx, job_id, video_id, &normalized.video_path).await?;
    frames::run(ctx, job_id, video_id, &normalized.video_path, &scene_rows).await?;
    vision::run(ctx, job_id, video_id).await?;
    embed::run(ctx, job_id, video_id).await?;
    Ok(())
}

/// Retry a storage operation on transient failures before giving up.
pub(crate) async fn with_store_retry<T, F, Fut>(
    operation: &'static str,
    f: F,
) -> Result<T, StoreError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    retry_async(
        &RetryConfig::new(operation).with_max_retries(2),
        |e: &StoreError| e.is_transient(),
        f,
    )
    .await
}

/// Retry an AI call on transient failures before giving up.
pub(crate) async fn with_ai_retry<T, F, Fut>(operation: &'static str, f: F) -> Result<T, AiError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    retry_async(
        &RetryConfig::new(operation),
        |e: &AiError| e.is_retryable(),
        f,
    )
    .await
}
