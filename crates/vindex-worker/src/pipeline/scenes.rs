//! Stage 3: detect scene boundaries.

use std::path::Path;
use tracing::info;

use vindex_models::{derived_id, DerivedKind, SceneRow};

use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::{with_store_retry, PipelineContext};

pub async fn run(
    ctx: &PipelineContext,
    job_id: &str,
    video_id: &str,
    normalized_path: &Path,
) -> WorkerResult<Vec<SceneRow>> {
    let storage = &ctx.storage;

    let existing = with_store_retry("scenes_for_video", || storage.scenes_for_video(video_id)).await?;
    if !existing.is_empty() {
        info!(job_id, video_id, milestone = "SCENES", skipped = true, count = existing.len(), "Scenes already present");
        return Ok(existing);
    }

    let intervals = ctx.media.detect_scenes(normalized_path).await?;
    validate_intervals(&intervals)?;

    let rows: Vec<SceneRow> = intervals
        .iter()
        .enumerate()
        .map(|(i, &(t_start, t_end))| SceneRow {
            id: derived_id(video_id, DerivedKind::Scene, i),
            video_id: video_id.to_string(),
            idx: i as i32,
            t_start,
            t_end,
        })
        .collect();

    with_store_retry("insert_scenes", || storage.bulk_insert_scenes(&rows)).await?;

    info!(job_id, video_id, milestone = "SCENES", count = rows.len(), "Scene detection complete");
    Ok(rows)
}

/// A detector returning no scenes or disordered intervals is a programming
/// error, not a transient condition.
fn validate_intervals(intervals: &[(f64, f64)]) -> WorkerResult<()> {
    if intervals.is_empty() {
        return Err(WorkerError::invariant("scene detection produced no scenes"));
    }
    for &(t_start, t_end) in intervals {
        if t_start >= t_end {
            return Err(WorkerError::invariant(format!(
                "degenerate scene interval [{t_start}, {t_end})"
            )));
        }
    }
    for window in intervals.windows(2) {
        if window[1].0 < window[0].1 {
            return Err(WorkerError::invariant(format!(
                "overlapping scene intervals [{}, {}) and [{}, {})",
                window[0].0, window[0].1, window[1].0, window[1].1
            )));
        }
    }
    Ok(())
}
