//! Stage 6: embed transcript segments and frame captions.

use tracing::info;

use vindex_models::CaptionRow;

use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::{with_ai_retry, with_store_retry, PipelineContext};

/// Maximum strings per embedding request.
const EMBED_BATCH_SIZE: usize = 100;

enum Target {
    Segment(String),
    Caption(String),
}

pub async fn run(ctx: &PipelineContext, job_id: &str, video_id: &str) -> WorkerResult<()> {
    if !ctx.settings.enable_embeddings {
        tracing::debug!(job_id, video_id, "Embeddings disabled, skipping stage");
        return Ok(());
    }

    let storage = &ctx.storage;
    let segments = with_store_retry("segments_missing_embedding", || {
        storage.segments_missing_embedding(video_id)
    })
    .await?;
    let captions = with_store_retry("captions_missing_embedding", || {
        storage.captions_missing_embedding(video_id)
    })
    .await?;

    let mut items: Vec<(Target, String)> = Vec::with_capacity(segments.len() + captions.len());
    for segment in &segments {
        if !segment.text.trim().is_empty() {
            items.push((Target::Segment(segment.id.clone()), segment.text.clone()));
        }
    }
    for caption in &captions {
        let text = caption_embed_text(caption);
        if !text.trim().is_empty() {
            items.push((Target::Caption(caption.id.clone()), text));
        }
    }

    if items.is_empty() {
        info!(job_id, video_id, milestone = "EMBEDDINGS", skipped = true, "Nothing awaiting embeddings");
        return Ok(());
    }

    let total = items.len();
    for chunk in items.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = chunk.iter().map(|(_, text)| text.clone()).collect();
        let vectors = with_ai_retry("embed_batch", || ctx.embedder.embed(&texts)).await?;
        if vectors.len() != chunk.len() {
            return Err(WorkerError::invariant(format!(
                "embedding batch returned {} vectors for {} inputs",
                vectors.len(),
                chunk.len()
            )));
        }
        for ((target, _), vector) in chunk.iter().zip(vectors.iter()) {
            match target {
                Target::Segment(id) => {
                    with_store_retry("update_segment_embedding", || {
                        storage.update_segment_embedding(id, vector)
                    })
                    .await?;
                }
                Target::Caption(id) => {
                    with_store_retry("update_caption_embedding", || {
                        storage.update_caption_embedding(id, vector)
                    })
                    .await?;
                }
            }
        }
    }

    info!(
        job_id,
        video_id,
        milestone = "EMBEDDINGS",
        segments = segments.len(),
        captions = captions.len(),
        total,
        "Embeddings generated"
    );
    Ok(())
}

/// Text embedded for a caption: the caption enriched with its entities.
pub(crate) fn caption_embed_text(row: &CaptionRow) -> String {
    let mut text = format!("Caption: {}", row.caption);
    if !row.entities.controls.is_empty() {
        let controls: Vec<String> = row
            .entities
            .controls
            .iter()
            .map(|c| format!("{} ({}) at {}", c.label, c.kind, c.position))
            .collect();
        text.push_str(&format!(" Controls: {}", controls.join("; ")));
    }
    if !row.entities.text_on_screen.is_empty() {
        let on_screen: Vec<String> = row
            .entities
            .text_on_screen
            .iter()
            .map(|t| t.text.clone())
            .collect();
        text.push_str(&format!(" Text on screen: {}", on_screen.join("; ")));
    }
    text
}
