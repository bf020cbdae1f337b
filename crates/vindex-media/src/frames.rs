//! Single-frame extraction.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Extract one JPEG frame at `timestamp` seconds into `out`.
pub async fn extract_frame(
    runner: &FfmpegRunner,
    video: &Path,
    timestamp: f64,
    out: &Path,
) -> MediaResult<()> {
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }
    if let Some(parent) = out.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let cmd = FfmpegCommand::new(video, out)
        .seek(timestamp)
        .single_frame()
        .video_codec("mjpeg")
        .output_arg("-f")
        .output_arg("image2");
    runner.run(&cmd).await?;

    if !out.exists() {
        return Err(MediaError::ffmpeg_failed(
            format!("frame extraction produced no file at {}", out.display()),
            None,
            None,
        ));
    }
    Ok(())
}
