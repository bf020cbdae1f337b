//! Stage 4: extract representative frames and deduplicate them.
//!
//! Candidate scenes are chosen so the first and last scene are always
//! covered and the rest spread evenly by index. One frame is sampled at
//! each candidate scene's midpoint, then near-duplicates are dropped by
//! perceptual-hash distance, with the first and last candidates always
//! retained. Surviving frames get a dense index in acceptance order, which
//! keeps the whole stage deterministic for identical inputs.

use std::path::Path;
use tracing::{info, warn};

use vindex_media::{hamming_distance, phash_hex, MediaError};
use vindex_models::{derived_id, DerivedKind, FrameRow, SceneRow};

use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::{with_store_retry, PipelineContext};

/// Maximum Hamming distance at which two frames count as duplicates.
const DUPLICATE_THRESHOLD: u32 = 6;

/// An extracted midpoint frame, before deduplication.
#[derive(Debug, Clone)]
pub(crate) struct FrameCandidate {
    pub scene_id: String,
    pub t_frame: f64,
    pub path_rel: String,
    pub phash: u64,
}

pub async fn run(
    ctx: &PipelineContext,
    job_id: &str,
    video_id: &str,
    normalized_path: &Path,
    scenes: &[SceneRow],
) -> WorkerResult<()> {
    let storage = &ctx.storage;

    let existing = with_store_retry("frames_for_video", || storage.frames_for_video(video_id)).await?;
    if !existing.is_empty() {
        info!(job_id, video_id, milestone = "FRAMES", skipped = true, count = existing.len(), "Frames already present");
        return Ok(());
    }
    if scenes.is_empty() {
        return Err(WorkerError::invariant("frames stage called with no scenes"));
    }

    let selected = select_candidates(scenes.len(), ctx.settings.max_frames_per_video);

    let mut candidates: Vec<FrameCandidate> = Vec::with_capacity(selected.len());
    for &pos in &selected {
        let scene = &scenes[pos];
        let scene_idx = scene.idx as usize;
        let midpoint = (scene.t_start + scene.t_end) / 2.0;
        let out = ctx.layout.frame_path(video_id, scene_idx);

        if let Err(e) = ctx.media.extract_frame(normalized_path, midpoint, &out).await {
            warn!(job_id, video_id, scene_idx, "Frame extraction failed, skipping scene: {e}");
            continue;
        }
        match ctx.media.perceptual_hash(&out).await {
            Ok(phash) => candidates.push(FrameCandidate {
                scene_id: scene.id.clone(),
                t_frame: midpoint,
                path_rel: ctx.layout.frame_rel(video_id, scene_idx),
                phash,
            }),
            Err(e) => {
                warn!(job_id, video_id, scene_idx, "Hashing failed, skipping scene: {e}");
            }
        }
    }

    if candidates.is_empty() {
        // Every single extraction failed; that smells like a broken
        // normalized file or an ffmpeg problem, so let the job retry.
        return Err(MediaError::ffmpeg_failed("no frames could be extracted", None, None).into());
    }

    let accepted = dedupe_candidates(&candidates, DUPLICATE_THRESHOLD);
    let rows: Vec<FrameRow> = accepted
        .iter()
        .enumerate()
        .map(|(idx, &pos)| {
            let candidate = &candidates[pos];
            FrameRow {
                id: derived_id(video_id, DerivedKind::Frame, idx),
                scene_id: candidate.scene_id.clone(),
                t_frame: candidate.t_frame,
                path: candidate.path_rel.clone(),
                phash: phash_hex(candidate.phash),
            }
        })
        .collect();

    with_store_retry("insert_frames", || storage.bulk_insert_frames(&rows)).await?;

    info!(
        job_id,
        video_id,
        milestone = "FRAMES",
        extracted = candidates.len(),
        kept = rows.len(),
        "Frame extraction complete"
    );
    Ok(())
}

/// Choose which scene positions to sample.
///
/// With `scene_count <= max_frames` every scene is a candidate. Otherwise
/// the selected indices are `round(i * (N-1) / (K-1))` for `i = 0..K-1`,
/// deduplicated in order, which always includes scene 0 and scene N-1.
pub(crate) fn select_candidates(scene_count: usize, max_frames: usize) -> Vec<usize> {
    if scene_count == 0 || max_frames == 0 {
        return Vec::new();
    }
    if scene_count <= max_frames {
        return (0..scene_count).collect();
    }
    if max_frames == 1 {
        return vec![0];
    }

    let n = (scene_count - 1) as f64;
    let k = (max_frames - 1) as f64;
    let mut selected = Vec::with_capacity(max_frames);
    for i in 0..max_frames {
        let idx = (i as f64 * n / k).round() as usize;
        if selected.last() != Some(&idx) {
            selected.push(idx);
        }
    }
    selected
}

/// Deduplicate candidates in scene order.
///
/// A candidate survives when its hash is farther than `threshold` from every
/// already-accepted hash; earlier scenes win ties. The first and last
/// candidates are always retained. Returns indices into `candidates`.
pub(crate) fn dedupe_candidates(candidates: &[FrameCandidate], threshold: u32) -> Vec<usize> {
    let mut accepted: Vec<usize> = Vec::new();
    let last = candidates.len().saturating_sub(1);
    for (i, candidate) in candidates.iter().enumerate() {
        let forced = i == 0 || i == last;
        let duplicate = accepted
            .iter()
            .any(|&j| hamming_distance(candidate.phash, candidates[j].phash) <= threshold);
        if forced || !duplicate {
            accepted.push(i);
        }
    }
    accepted
}
