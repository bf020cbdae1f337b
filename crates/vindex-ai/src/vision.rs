//! GPT-4o vision captioning with schema-validated structured output.

use std::path::Path;

use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use vindex_models::FrameAnalysis;

use crate::client::OpenAiClient;
use crate::error::{AiError, AiResult};

const VISION_MODEL: &str = "gpt-4o";

const VISION_PROMPT: &str = "Analyze this video frame and describe it. Report:\n\
1. What is happening in the scene\n\
2. Any controls, buttons, dials, or interfaces visible\n\
3. Any text or labels that appear on screen\n\
Be thorough and accurate.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// JSON schema the model is constrained to (mirrors `FrameAnalysis`).
fn response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "caption": {"type": "string"},
            "controls": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "type": {"type": "string"},
                        "label": {"type": "string"},
                        "position": {"type": "string"}
                    },
                    "required": ["type", "label", "position"],
                    "additionalProperties": false
                }
            },
            "text_on_screen": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "text": {"type": "string"},
                        "position": {"type": "string"}
                    },
                    "required": ["text", "position"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["caption", "controls", "text_on_screen"],
        "additionalProperties": false
    })
}

/// Caption one frame. A payload that fails validation surfaces as
/// `SchemaViolation`; the vision stage owns the bounded per-frame retry.
pub async fn caption_frame(client: &OpenAiClient, image: &Path) -> AiResult<FrameAnalysis> {
    let bytes = tokio::fs::read(image).await?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);

    let body = json!({
        "model": VISION_MODEL,
        "messages": [{
            "role": "user",
            "content": [
                {"type": "text", "text": VISION_PROMPT},
                {
                    "type": "image_url",
                    "image_url": {"url": format!("data:image/jpeg;base64,{encoded}")}
                }
            ]
        }],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": "frame_analysis",
                "schema": response_schema(),
                "strict": true
            }
        },
        "temperature": 0.1
    });

    let response = client
        .http
        .post(client.url("/chat/completions"))
        .bearer_auth(&client.api_key)
        .json(&body)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(OpenAiClient::api_error(response).await);
    }

    let chat: ChatResponse = response
        .json()
        .await
        .map_err(|e| AiError::schema_violation(format!("chat response: {e}")))?;

    let content = chat
        .choices
        .first()
        .and_then(|c| c.message.content.as_deref())
        .ok_or(AiError::EmptyResponse)?;

    let analysis = parse_analysis(content)?;
    info!(
        "Captioned {}: {} controls, {} text items",
        image.display(),
        analysis.controls.len(),
        analysis.text_on_screen.len()
    );
    Ok(analysis)
}

/// Validate the model output against the caption schema.
pub fn parse_analysis(content: &str) -> AiResult<FrameAnalysis> {
    serde_json::from_str(strip_code_fences(content))
        .map_err(|e| AiError::schema_violation(e.to_string()))
}

/// Some models wrap JSON replies in markdown fences despite JSON mode.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}
