//! Local media primitives for the vindex worker.
//!
//! Wraps ffmpeg/ffprobe subprocesses behind the `MediaToolkit` capability:
//! transcoding, scene detection, frame extraction and perceptual hashing.

pub mod command;
pub mod error;
pub mod frames;
pub mod phash;
pub mod probe;
pub mod scene_detect;
pub mod toolkit;
pub mod transcode;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use phash::{hamming_distance, parse_phash_hex, phash_hex};
pub use probe::{probe_video, MediaInfo};
pub use toolkit::{FfmpegToolkit, MediaToolkit};
