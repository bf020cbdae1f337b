//! The `MediaToolkit` capability and its ffmpeg-backed implementation.

use async_trait::async_trait;
use std::path::Path;

use crate::command::FfmpegRunner;
use crate::error::MediaResult;
use crate::probe::{probe_video, MediaInfo};
use crate::scene_detect::{build_scenes, detect_scene_cuts};
use crate::{frames, phash, transcode};

/// Local media operations the pipeline stages consume.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Validate and inspect a media file.
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;

    /// Normalize to 720p/30fps H.264 and extract 16 kHz mono audio.
    /// Returns the normalized duration in seconds.
    async fn transcode(&self, input: &Path, video_out: &Path, audio_out: &Path)
        -> MediaResult<f64>;

    /// Ordered adjacent half-open scene intervals covering the video.
    async fn detect_scenes(&self, video: &Path) -> MediaResult<Vec<(f64, f64)>>;

    /// Write a single JPEG frame at `timestamp` seconds.
    async fn extract_frame(&self, video: &Path, timestamp: f64, out: &Path) -> MediaResult<()>;

    /// 64-bit perceptual hash of an image file.
    async fn perceptual_hash(&self, image: &Path) -> MediaResult<u64>;
}

/// ffmpeg/ffprobe-backed toolkit.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    runner: FfmpegRunner,
    scene_threshold: f64,
    min_scene_len: f64,
}

impl FfmpegToolkit {
    pub fn new() -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(1800),
            scene_threshold: 0.3,
            min_scene_len: 15.0,
        }
    }

    pub fn with_min_scene_len(mut self, seconds: f64) -> Self {
        self.min_scene_len = seconds;
        self
    }
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        probe_video(path).await
    }

    async fn transcode(
        &self,
        input: &Path,
        video_out: &Path,
        audio_out: &Path,
    ) -> MediaResult<f64> {
        transcode::transcode(&self.runner, input, video_out, audio_out).await
    }

    async fn detect_scenes(&self, video: &Path) -> MediaResult<Vec<(f64, f64)>> {
        let info = probe_video(video).await?;
        let cuts = detect_scene_cuts(video, self.scene_threshold).await?;
        Ok(build_scenes(&cuts, info.duration, self.min_scene_len))
    }

    async fn extract_frame(&self, video: &Path, timestamp: f64, out: &Path) -> MediaResult<()> {
        frames::extract_frame(&self.runner, video, timestamp, out).await
    }

    async fn perceptual_hash(&self, image: &Path) -> MediaResult<u64> {
        phash::hash_file(image).await
    }
}
