//! Scene boundary detection via the ffmpeg scene-change filter.
//!
//! The filter yields cut timestamps; `build_scenes` turns them into
//! adjacent half-open intervals covering `[0, duration)`, merging intervals
//! shorter than the minimum-length target into their predecessor. The
//! minimum length is a target, not an invariant: a short video still yields
//! one scene.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::command::check_ffmpeg;
use crate::error::{MediaError, MediaResult};

/// Detect scene-change cut points, in seconds, ascending.
pub async fn detect_scene_cuts(video: &Path, threshold: f64) -> MediaResult<Vec<f64>> {
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }
    check_ffmpeg()?;

    let filter = format!("select='gt(scene,{threshold})',showinfo");
    let output = Command::new("ffmpeg")
        .args(["-v", "info", "-i"])
        .arg(video)
        .args(["-vf", &filter, "-f", "null", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffmpeg_failed(
            "scene detection failed",
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
            output.status.code(),
        ));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut cuts: Vec<f64> = stderr
        .lines()
        .filter_map(parse_showinfo_pts)
        .collect();
    cuts.sort_by(|a, b| a.total_cmp(b));
    cuts.dedup();

    debug!("Detected {} scene cuts in {}", cuts.len(), video.display());
    Ok(cuts)
}

/// Extract `pts_time` from an ffmpeg showinfo log line.
fn parse_showinfo_pts(line: &str) -> Option<f64> {
    if !line.contains("Parsed_showinfo") {
        return None;
    }
    let rest = line.split("pts_time:").nth(1)?;
    let token = rest.split_whitespace().next()?;
    token.parse().ok()
}

/// Build adjacent half-open scene intervals from cut points.
///
/// Cuts outside `(0, duration)` are discarded. A cut that would leave the
/// current interval shorter than `min_len` is skipped, merging the short
/// piece into its successor; a short trailing piece is merged into the
/// previous interval. The result always contains at least one scene, the
/// first starts at 0 and the last ends at `duration`.
pub fn build_scenes(cuts: &[f64], duration: f64, min_len: f64) -> Vec<(f64, f64)> {
    if duration <= 0.0 {
        return Vec::new();
    }

    let mut scenes: Vec<(f64, f64)> = Vec::new();
    let mut start = 0.0;
    for &cut in cuts {
        if cut <= start || cut >= duration {
            continue;
        }
        if cut - start < min_len {
            continue;
        }
        scenes.push((start, cut));
        start = cut;
    }

    if duration - start < min_len {
        if let Some(last) = scenes.last_mut() {
            last.1 = duration;
        } else {
            scenes.push((start, duration));
        }
    } else {
        scenes.push((start, duration));
    }

    info!(
        "Built {} scenes from {} cuts over {:.2}s",
        scenes.len(),
        cuts.len(),
        duration
    );
    scenes
}
