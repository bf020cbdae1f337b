//! OpenAI HTTP client shared by the transcription, vision and embedding
//! capabilities.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;

use vindex_models::{FrameAnalysis, SpokenSegment};

use crate::error::{AiError, AiResult};
use crate::{SpeechToText, TextEmbedder, VisionAnalyzer};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// OpenAI API client. Constructed once at process start and shared.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    pub(crate) http: Client,
    pub(crate) api_key: String,
    pub(crate) base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> AiResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AiError::config("OpenAI API key is empty"));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint (test servers, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Map a non-success response to an API error.
    pub(crate) async fn api_error(response: reqwest::Response) -> AiError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        AiError::Api { status, message }
    }
}

#[async_trait]
impl SpeechToText for OpenAiClient {
    async fn transcribe(&self, audio: &Path) -> AiResult<Vec<SpokenSegment>> {
        crate::transcribe::transcribe(self, audio).await
    }
}

#[async_trait]
impl VisionAnalyzer for OpenAiClient {
    async fn caption_frame(&self, image: &Path) -> AiResult<FrameAnalysis> {
        crate::vision::caption_frame(self, image).await
    }
}

#[async_trait]
impl TextEmbedder for OpenAiClient {
    async fn embed(&self, texts: &[String]) -> AiResult<Vec<Vec<f32>>> {
        crate::embed::embed(self, texts).await
    }
}
