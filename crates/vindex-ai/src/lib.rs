//! Remote AI capabilities: transcription, vision captioning and embeddings.
//!
//! The pipeline depends on the `SpeechToText`, `VisionAnalyzer` and
//! `TextEmbedder` traits; `OpenAiClient` implements all three against the
//! OpenAI HTTP API.

pub mod client;
pub mod embed;
pub mod error;
pub mod transcribe;
pub mod vision;

pub use client::OpenAiClient;
pub use error::{AiError, AiResult};

use async_trait::async_trait;
use std::path::Path;

use vindex_models::{FrameAnalysis, SpokenSegment};

/// Audio transcription capability.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Ordered, non-overlapping utterances covering the audio.
    async fn transcribe(&self, audio: &Path) -> AiResult<Vec<SpokenSegment>>;
}

/// Frame captioning capability.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// Structured analysis of one frame, validated against the caption schema.
    async fn caption_frame(&self, image: &Path) -> AiResult<FrameAnalysis>;
}

/// Text embedding capability.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// One 1536-dimensional vector per input string, in input order.
    async fn embed(&self, texts: &[String]) -> AiResult<Vec<Vec<f32>>>;
}
