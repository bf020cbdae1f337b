//! Normalization transcode: 720p/30fps H.264 video plus 16 kHz mono WAV.

use std::path::Path;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Transcode `input` into a normalized video and an extracted audio track.
///
/// Returns the duration of the normalized output in seconds. Output parent
/// directories are created as needed; existing outputs are overwritten.
pub async fn transcode(
    runner: &FfmpegRunner,
    input: &Path,
    video_out: &Path,
    audio_out: &Path,
) -> MediaResult<f64> {
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    for out in [video_out, audio_out] {
        if let Some(parent) = out.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    info!("Normalizing {} -> {}", input.display(), video_out.display());
    let video_cmd = FfmpegCommand::new(input, video_out)
        .video_filter("scale=-2:720,fps=30")
        .video_codec("libx264")
        .crf(22)
        .preset("medium")
        .no_audio();
    runner.run(&video_cmd).await?;

    info!("Extracting audio {} -> {}", input.display(), audio_out.display());
    let audio_cmd = FfmpegCommand::new(input, audio_out)
        .no_video()
        .audio_codec("pcm_s16le")
        .output_arg("-ac")
        .output_arg("1")
        .output_arg("-ar")
        .output_arg("16000");
    runner.run(&audio_cmd).await?;

    if !video_out.exists() || !audio_out.exists() {
        return Err(MediaError::ffmpeg_failed(
            "normalization produced no output files",
            None,
            None,
        ));
    }

    // Duration read back from the normalized artifact, not the input: frame
    // rate conversion can shift it slightly.
    let info = probe_video(video_out).await?;
    Ok(info.duration)
}
