//! Batched text embeddings.

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use vindex_models::EMBEDDING_DIMENSION;

use crate::client::OpenAiClient;
use crate::error::{AiError, AiResult};

const EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Embed a batch of texts, preserving input order.
pub async fn embed(client: &OpenAiClient, texts: &[String]) -> AiResult<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let body = json!({
        "model": EMBEDDING_MODEL,
        "input": texts,
        "dimensions": EMBEDDING_DIMENSION,
    });

    let response = client
        .http
        .post(client.url("/embeddings"))
        .bearer_auth(&client.api_key)
        .json(&body)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(OpenAiClient::api_error(response).await);
    }

    let parsed: EmbeddingResponse = response
        .json()
        .await
        .map_err(|e| AiError::schema_violation(format!("embedding response: {e}")))?;

    if parsed.data.len() != texts.len() {
        return Err(AiError::schema_violation(format!(
            "expected {} embeddings, got {}",
            texts.len(),
            parsed.data.len()
        )));
    }

    // The API reply carries explicit indices; order by them rather than
    // trusting response order.
    let mut ordered: Vec<(usize, Vec<f32>)> =
        parsed.data.into_iter().map(|d| (d.index, d.embedding)).collect();
    ordered.sort_by_key(|(idx, _)| *idx);

    for (_, vector) in &ordered {
        if vector.len() != EMBEDDING_DIMENSION {
            return Err(AiError::schema_violation(format!(
                "embedding has {} dimensions, expected {EMBEDDING_DIMENSION}",
                vector.len()
            )));
        }
    }

    debug!("Embedded batch of {}", texts.len());
    Ok(ordered.into_iter().map(|(_, v)| v).collect())
}
