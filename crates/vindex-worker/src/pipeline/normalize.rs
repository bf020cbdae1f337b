//! Stage 1: normalize the upload and extract its audio track.

use std::path::PathBuf;
use tracing::{debug, info};

use vindex_media::MediaError;

use crate::error::WorkerResult;
use crate::pipeline::{with_store_retry, PipelineContext};

/// Artifacts the later stages consume.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// Absolute path of the normalized video.
    pub video_path: PathBuf,
    /// Absolute path of the extracted audio.
    pub audio_path: PathBuf,
    pub duration_sec: f64,
}

pub async fn run(ctx: &PipelineContext, job_id: &str, video_id: &str) -> WorkerResult<Normalized> {
    let storage = &ctx.storage;
    let video_path = ctx.layout.normalized_path(video_id);
    let audio_path = ctx.layout.audio_path(video_id);

    if let Some((_, duration_sec)) =
        with_store_retry("normalized_info", || storage.normalized_info(video_id)).await?
    {
        // The audio sidecar only gates the skip when something downstream
        // will read it.
        let audio_ok = !ctx.settings.enable_transcription || audio_path.exists();
        if video_path.exists() && audio_ok {
            debug!(job_id, video_id, "Normalized artifact present, skipping transcode");
            info!(job_id, video_id, milestone = "NORMALIZED", skipped = true, duration_sec, "Video already normalized");
            return Ok(Normalized {
                video_path,
                audio_path,
                duration_sec,
            });
        }
    }

    let stored_path =
        with_store_retry("fetch_video_path", || storage.fetch_video_path(video_id)).await?;
    let input = ctx.layout.resolve_upload(&stored_path);
    if !input.exists() {
        return Err(MediaError::FileNotFound(input).into());
    }
    ctx.media.probe(&input).await?;

    let duration_sec = ctx.media.transcode(&input, &video_path, &audio_path).await?;

    let normalized_rel = ctx.layout.normalized_rel(video_id);
    with_store_retry("update_video_normalized", || {
        storage.update_video_normalized(video_id, &normalized_rel, duration_sec)
    })
    .await?;

    info!(job_id, video_id, milestone = "NORMALIZED", duration_sec, "Video normalized");
    Ok(Normalized {
        video_path,
        audio_path,
        duration_sec,
    })
}
