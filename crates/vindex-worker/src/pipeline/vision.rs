//! Stage 5: caption frames with the vision capability.
//!
//! Calls run concurrently behind a counting semaphore. A frame whose
//! payload keeps failing validation is skipped with a warning; the stage
//! still succeeds. Frames whose task never completed (a dispatch failure,
//! not a per-frame error) are re-processed sequentially.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use vindex_ai::{AiError, VisionAnalyzer};
use vindex_models::{caption_id, CaptionRow, FrameAnalysis};

use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::{with_store_retry, PipelineContext};
use crate::retry::{retry_async, RetryConfig};

/// Attempts per frame before it is skipped (initial call + retries).
const PER_FRAME_RETRIES: u32 = 2;

pub async fn run(ctx: &PipelineContext, job_id: &str, video_id: &str) -> WorkerResult<()> {
    if !ctx.settings.enable_vision_analysis {
        tracing::debug!(job_id, video_id, "Vision analysis disabled, skipping stage");
        return Ok(());
    }

    let storage = &ctx.storage;
    let frames =
        with_store_retry("frames_missing_caption", || storage.frames_missing_caption(video_id))
            .await?;
    if frames.is_empty() {
        info!(job_id, video_id, milestone = "VISION", skipped = true, "No frames awaiting captions");
        return Ok(());
    }

    let semaphore = Arc::new(Semaphore::new(ctx.settings.vision_max_concurrent.max(1)));
    let mut join_set = JoinSet::new();
    for (order, frame) in frames.iter().enumerate() {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::invariant("vision semaphore closed"))?;
        let vision = Arc::clone(&ctx.vision);
        let image = ctx.layout.root().join(&frame.path);
        join_set.spawn(async move {
            let _permit = permit;
            (order, analyze_frame(vision, image).await)
        });
    }

    // Keyed by input order so persisted captions line up with frame index
    // no matter when each call finished.
    let mut results: BTreeMap<usize, Result<FrameAnalysis, AiError>> = BTreeMap::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((order, result)) => {
                results.insert(order, result);
            }
            Err(e) => {
                warn!(job_id, video_id, "Vision task did not complete: {e}");
            }
        }
    }

    // Concurrent dispatch lost some tasks entirely; finish those frames
    // one at a time.
    let unprocessed: Vec<usize> = (0..frames.len()).filter(|i| !results.contains_key(i)).collect();
    if !unprocessed.is_empty() {
        warn!(
            job_id,
            video_id,
            count = unprocessed.len(),
            "Falling back to sequential vision processing"
        );
        for order in unprocessed {
            let image = ctx.layout.root().join(&frames[order].path);
            let result = analyze_frame(Arc::clone(&ctx.vision), image).await;
            results.insert(order, result);
        }
    }

    let mut rows: Vec<CaptionRow> = Vec::new();
    let mut skipped = 0usize;
    for (order, result) in results {
        let frame = &frames[order];
        match result {
            Ok(analysis) => {
                let (caption, entities) = analysis.into_parts();
                rows.push(CaptionRow {
                    id: caption_id(&frame.id),
                    frame_id: frame.id.clone(),
                    caption,
                    entities,
                });
            }
            Err(e) => {
                skipped += 1;
                warn!(job_id, video_id, frame_id = %frame.id, "Skipping frame after failed vision analysis: {e}");
            }
        }
    }

    with_store_retry("insert_captions", || storage.bulk_insert_captions(&rows)).await?;

    info!(
        job_id,
        video_id,
        milestone = "VISION",
        captioned = rows.len(),
        skipped,
        "Vision analysis complete"
    );
    Ok(())
}

/// One frame's analysis with bounded retries.
///
/// Schema violations are treated as transient here (the model may produce a
/// valid payload on a second try) but only within the per-frame budget.
async fn analyze_frame(
    vision: Arc<dyn VisionAnalyzer>,
    image: PathBuf,
) -> Result<FrameAnalysis, AiError> {
    let config = RetryConfig::new("vision_caption").with_max_retries(PER_FRAME_RETRIES);
    retry_async(
        &config,
        |e: &AiError| e.is_retryable() || matches!(e, AiError::SchemaViolation(_)),
        || vision.caption_frame(&image),
    )
    .await
}
