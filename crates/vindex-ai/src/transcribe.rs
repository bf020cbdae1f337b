//! Whisper transcription.

use std::path::Path;

use reqwest::multipart;
use serde::Deserialize;
use tracing::{info, warn};

use vindex_models::SpokenSegment;

use crate::client::OpenAiClient;
use crate::error::{AiError, AiResult};

const TRANSCRIPTION_MODEL: &str = "whisper-1";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<ApiSegment>,
}

#[derive(Debug, Deserialize)]
struct ApiSegment {
    start: f64,
    end: f64,
    text: String,
}

/// Transcribe an audio file into ordered utterances.
pub async fn transcribe(client: &OpenAiClient, audio: &Path) -> AiResult<Vec<SpokenSegment>> {
    let bytes = tokio::fs::read(audio).await?;
    let file_name = audio
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio.wav".to_string());

    let form = multipart::Form::new()
        .part(
            "file",
            multipart::Part::bytes(bytes)
                .file_name(file_name)
                .mime_str("audio/wav")
                .map_err(AiError::Http)?,
        )
        .text("model", TRANSCRIPTION_MODEL)
        .text("response_format", "verbose_json")
        .text("timestamp_granularities[]", "segment");

    let response = client
        .http
        .post(client.url("/audio/transcriptions"))
        .bearer_auth(&client.api_key)
        .multipart(form)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(OpenAiClient::api_error(response).await);
    }

    let parsed: TranscriptionResponse = response
        .json()
        .await
        .map_err(|e| AiError::schema_violation(format!("transcription response: {e}")))?;

    let mut segments: Vec<SpokenSegment> = parsed
        .segments
        .iter()
        .filter_map(|s| {
            let text = s.text.trim();
            if text.is_empty() || s.end <= s.start {
                warn!("Dropping degenerate transcript segment [{:.2}, {:.2}]", s.start, s.end);
                return None;
            }
            Some(SpokenSegment {
                t_start: s.start,
                t_end: s.end,
                text: text.to_string(),
            })
        })
        .collect();

    // Whole-file fallback when the provider returns no per-segment timing.
    if segments.is_empty() && !parsed.text.trim().is_empty() {
        segments.push(SpokenSegment {
            t_start: 0.0,
            t_end: parsed.duration.unwrap_or(0.0).max(0.01),
            text: parsed.text.trim().to_string(),
        });
    }

    info!("Transcribed {} into {} segments", audio.display(), segments.len());
    Ok(segments)
}
