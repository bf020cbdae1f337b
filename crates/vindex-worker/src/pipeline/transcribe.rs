//! Stage 2: transcribe the audio and write the SRT sidecar.

use std::path::Path;
use tracing::{debug, info};

use vindex_models::{derived_id, DerivedKind, SrtCue, TranscriptSegmentRow};

use crate::error::WorkerResult;
use crate::pipeline::{with_ai_retry, with_store_retry, PipelineContext};

pub async fn run(
    ctx: &PipelineContext,
    job_id: &str,
    video_id: &str,
    audio_path: &Path,
) -> WorkerResult<()> {
    if !ctx.settings.enable_transcription {
        debug!(job_id, video_id, "Transcription disabled, skipping stage");
        return Ok(());
    }

    let storage = &ctx.storage;
    if with_store_retry("has_segments", || storage.has_segments(video_id)).await? {
        info!(job_id, video_id, milestone = "TRANSCRIBED", skipped = true, "Transcript already present");
        return Ok(());
    }

    let spoken = with_ai_retry("transcribe", || ctx.speech.transcribe(audio_path)).await?;

    let rows: Vec<TranscriptSegmentRow> = spoken
        .iter()
        .enumerate()
        .map(|(i, s)| TranscriptSegmentRow {
            id: derived_id(video_id, DerivedKind::Segment, i),
            video_id: video_id.to_string(),
            t_start: s.t_start,
            t_end: s.t_end,
            text: s.text.clone(),
        })
        .collect();

    with_store_retry("insert_segments", || storage.bulk_insert_segments(&rows)).await?;
    write_srt_sidecar(ctx, video_id, &rows).await?;

    info!(job_id, video_id, milestone = "TRANSCRIBED", segments = rows.len(), "Audio transcribed");
    Ok(())
}

/// Write (or overwrite) the subtitle sidecar for a video.
async fn write_srt_sidecar(
    ctx: &PipelineContext,
    video_id: &str,
    rows: &[TranscriptSegmentRow],
) -> WorkerResult<()> {
    let cues: Vec<SrtCue> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| SrtCue::from_segment(i + 1, row))
        .collect();

    let srt_path = ctx.layout.srt_path(video_id);
    if let Some(parent) = srt_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&srt_path, vindex_models::render_srt(&cues)).await?;
    debug!(video_id, path = %srt_path.display(), "Wrote subtitle sidecar");
    Ok(())
}
