//! Postgres implementation of the storage gateway.

use std::time::Duration;

use pgvector::Vector;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};

use vindex_models::{
    CaptionRow, ClaimedJob, FrameEntities, FrameRow, PendingJob, SceneRow, StoreStats,
    TranscriptSegmentRow,
};

use crate::error::{StoreError, StoreResult};
use crate::traits::{JobSource, Storage};

/// Maximum length of a persisted job error message.
const MAX_ERROR_LEN: usize = 500;

/// Pooled gateway to the relational store.
#[derive(Debug, Clone)]
pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    /// Connect with the worker's standard pool settings.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        info!("Database connection pool initialized");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Truncate an error message at a character boundary.
pub(crate) fn truncate_error(message: &str) -> &str {
    match message.char_indices().nth(MAX_ERROR_LEN) {
        Some((byte_idx, _)) => &message[..byte_idx],
        None => message,
    }
}

fn scene_from_row(row: &PgRow) -> Result<SceneRow, sqlx::Error> {
    Ok(SceneRow {
        id: row.try_get("id")?,
        video_id: row.try_get("video_id")?,
        idx: row.try_get("idx")?,
        t_start: row.try_get("t_start")?,
        t_end: row.try_get("t_end")?,
    })
}

fn frame_from_row(row: &PgRow) -> Result<FrameRow, sqlx::Error> {
    Ok(FrameRow {
        id: row.try_get("id")?,
        scene_id: row.try_get("scene_id")?,
        t_frame: row.try_get("t_frame")?,
        path: row.try_get("path")?,
        phash: row.try_get("phash")?,
    })
}

fn segment_from_row(row: &PgRow) -> Result<TranscriptSegmentRow, sqlx::Error> {
    Ok(TranscriptSegmentRow {
        id: row.try_get("id")?,
        video_id: row.try_get("video_id")?,
        t_start: row.try_get("t_start")?,
        t_end: row.try_get("t_end")?,
        text: row.try_get("text")?,
    })
}

fn caption_from_row(row: &PgRow) -> Result<CaptionRow, sqlx::Error> {
    let entities: sqlx::types::Json<FrameEntities> = row.try_get("entities")?;
    Ok(CaptionRow {
        id: row.try_get("id")?,
        frame_id: row.try_get("frame_id")?,
        caption: row.try_get("caption")?,
        entities: entities.0,
    })
}

#[async_trait::async_trait]
impl JobSource for PgGateway {
    async fn claim_next_job(&self) -> StoreResult<Option<ClaimedJob>> {
        // Single transaction: take the FIFO head with SKIP LOCKED so
        // concurrent workers never claim the same row, then flip the parent
        // video to processing before committing.
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "WITH next AS ( \
                 SELECT id, video_id FROM jobs \
                 WHERE status = 'pending' \
                 ORDER BY created_at \
                 FOR UPDATE SKIP LOCKED \
                 LIMIT 1 \
             ) \
             UPDATE jobs \
             SET status = 'processing', attempts = COALESCE(attempts, 0) + 1 \
             FROM next \
             WHERE jobs.id = next.id \
             RETURNING jobs.id, jobs.video_id, jobs.attempts",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = claimed else {
            tx.rollback().await?;
            return Ok(None);
        };

        let job = ClaimedJob {
            job_id: row.try_get("id").map_err(StoreError::Database)?,
            video_id: row.try_get("video_id").map_err(StoreError::Database)?,
            attempts: row.try_get("attempts").map_err(StoreError::Database)?,
        };

        sqlx::query("UPDATE videos SET status = 'processing' WHERE id = $1")
            .bind(&job.video_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(job_id = %job.job_id, video_id = %job.video_id, attempts = job.attempts, "Claimed job");
        Ok(Some(job))
    }

    async fn complete_job(&self, job_id: &str, video_id: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE jobs SET status = 'done' WHERE id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE videos SET status = 'ready' WHERE id = $1")
            .bind(video_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(job_id, video_id, "Job done, video ready");
        Ok(())
    }

    async fn fail_job(&self, job_id: &str, error: &str) -> StoreResult<()> {
        sqlx::query("UPDATE jobs SET status = 'failed', error = $2 WHERE id = $1")
            .bind(job_id)
            .bind(truncate_error(error))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reset_job(&self, job_id: &str, error: &str) -> StoreResult<()> {
        sqlx::query("UPDATE jobs SET status = 'pending', error = $2 WHERE id = $1")
            .bind(job_id)
            .bind(truncate_error(error))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn peek_pending(&self, limit: i64) -> StoreResult<Vec<PendingJob>> {
        let rows = sqlx::query(
            "SELECT j.id, j.video_id, j.created_at, v.original_path \
             FROM jobs j \
             JOIN videos v ON j.video_id = v.id \
             WHERE j.status = 'pending' \
             ORDER BY j.created_at \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PendingJob {
                    id: row.try_get("id")?,
                    video_id: row.try_get("video_id")?,
                    created_at: row.try_get("created_at")?,
                    original_path: row.try_get("original_path")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::Database)
    }
}

#[async_trait::async_trait]
impl Storage for PgGateway {
    async fn fetch_video_path(&self, video_id: &str) -> StoreResult<String> {
        let row = sqlx::query("SELECT original_path FROM videos WHERE id = $1")
            .bind(video_id)
            .fetch_optional(&self.pool)
            .await?;

        let path: Option<String> = match row {
            Some(row) => row.try_get("original_path").map_err(StoreError::Database)?,
            None => None,
        };
        path.filter(|p| !p.is_empty())
            .ok_or_else(|| StoreError::not_found(format!("original_path for video {video_id}")))
    }

    async fn normalized_info(&self, video_id: &str) -> StoreResult<Option<(String, f64)>> {
        let row = sqlx::query("SELECT normalized_path, duration_sec FROM videos WHERE id = $1")
            .bind(video_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else { return Ok(None) };
        let path: Option<String> = row.try_get("normalized_path").map_err(StoreError::Database)?;
        let duration: Option<f64> = row.try_get("duration_sec").map_err(StoreError::Database)?;
        Ok(path.zip(duration))
    }

    async fn update_video_normalized(
        &self,
        video_id: &str,
        normalized_path: &str,
        duration_sec: f64,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE videos SET normalized_path = $2, duration_sec = $3 WHERE id = $1")
            .bind(video_id)
            .bind(normalized_path)
            .bind(duration_sec)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn scenes_for_video(&self, video_id: &str) -> StoreResult<Vec<SceneRow>> {
        let rows = sqlx::query(
            "SELECT id, video_id, idx, t_start, t_end FROM scenes \
             WHERE video_id = $1 ORDER BY idx",
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(scene_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Database)
    }

    async fn bulk_insert_scenes(&self, rows: &[SceneRow]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO scenes (id, video_id, idx, t_start, t_end) ");
        qb.push_values(rows, |mut b, row| {
            b.push_bind(&row.id)
                .push_bind(&row.video_id)
                .push_bind(row.idx)
                .push_bind(row.t_start)
                .push_bind(row.t_end);
        });
        qb.push(" ON CONFLICT (video_id, idx) DO NOTHING");
        qb.build().execute(&self.pool).await?;
        debug!(count = rows.len(), "Inserted scenes");
        Ok(())
    }

    async fn frames_for_video(&self, video_id: &str) -> StoreResult<Vec<FrameRow>> {
        let rows = sqlx::query(
            "SELECT f.id, f.scene_id, f.t_frame, f.path, f.phash \
             FROM frames f \
             JOIN scenes s ON f.scene_id = s.id \
             WHERE s.video_id = $1 \
             ORDER BY f.id",
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(frame_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Database)
    }

    async fn bulk_insert_frames(&self, rows: &[FrameRow]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO frames (id, scene_id, t_frame, path, phash) ");
        qb.push_values(rows, |mut b, row| {
            b.push_bind(&row.id)
                .push_bind(&row.scene_id)
                .push_bind(row.t_frame)
                .push_bind(&row.path)
                .push_bind(&row.phash);
        });
        qb.push(" ON CONFLICT (id) DO NOTHING");
        qb.build().execute(&self.pool).await?;
        debug!(count = rows.len(), "Inserted frames");
        Ok(())
    }

    async fn has_segments(&self, video_id: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM transcript_segments WHERE video_id = $1) AS present")
            .bind(video_id)
            .fetch_one(&self.pool)
            .await?;
        row.try_get("present").map_err(StoreError::Database)
    }

    async fn bulk_insert_segments(&self, rows: &[TranscriptSegmentRow]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO transcript_segments (id, video_id, t_start, t_end, text) ");
        qb.push_values(rows, |mut b, row| {
            b.push_bind(&row.id)
                .push_bind(&row.video_id)
                .push_bind(row.t_start)
                .push_bind(row.t_end)
                .push_bind(&row.text);
        });
        qb.push(" ON CONFLICT (video_id, t_start, t_end) DO NOTHING");
        qb.build().execute(&self.pool).await?;
        debug!(count = rows.len(), "Inserted transcript segments");
        Ok(())
    }

    async fn frames_missing_caption(&self, video_id: &str) -> StoreResult<Vec<FrameRow>> {
        let rows = sqlx::query(
            "SELECT f.id, f.scene_id, f.t_frame, f.path, f.phash \
             FROM frames f \
             JOIN scenes s ON f.scene_id = s.id \
             LEFT JOIN frame_captions fc ON fc.frame_id = f.id \
             WHERE s.video_id = $1 AND fc.id IS NULL \
             ORDER BY f.id",
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(frame_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Database)
    }

    async fn bulk_insert_captions(&self, rows: &[CaptionRow]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO frame_captions (id, frame_id, caption, entities) ");
        qb.push_values(rows, |mut b, row| {
            b.push_bind(&row.id)
                .push_bind(&row.frame_id)
                .push_bind(&row.caption)
                .push_bind(sqlx::types::Json(&row.entities));
        });
        qb.push(" ON CONFLICT (id) DO NOTHING");
        qb.build().execute(&self.pool).await?;
        debug!(count = rows.len(), "Inserted frame captions");
        Ok(())
    }

    async fn segments_missing_embedding(
        &self,
        video_id: &str,
    ) -> StoreResult<Vec<TranscriptSegmentRow>> {
        let rows = sqlx::query(
            "SELECT id, video_id, t_start, t_end, text FROM transcript_segments \
             WHERE video_id = $1 AND embedding IS NULL \
             ORDER BY id",
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(segment_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Database)
    }

    async fn captions_missing_embedding(&self, video_id: &str) -> StoreResult<Vec<CaptionRow>> {
        let rows = sqlx::query(
            "SELECT fc.id, fc.frame_id, fc.caption, fc.entities \
             FROM frame_captions fc \
             JOIN frames f ON fc.frame_id = f.id \
             JOIN scenes s ON f.scene_id = s.id \
             WHERE s.video_id = $1 AND fc.embedding IS NULL \
             ORDER BY fc.id",
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(caption_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Database)
    }

    async fn update_segment_embedding(&self, id: &str, embedding: &[f32]) -> StoreResult<()> {
        sqlx::query("UPDATE transcript_segments SET embedding = $2 WHERE id = $1")
            .bind(id)
            .bind(Vector::from(embedding.to_vec()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_caption_embedding(&self, id: &str, embedding: &[f32]) -> StoreResult<()> {
        sqlx::query("UPDATE frame_captions SET embedding = $2 WHERE id = $1")
            .bind(id)
            .bind(Vector::from(embedding.to_vec()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        let mut stats = StoreStats::default();

        let job_rows = sqlx::query("SELECT status, COUNT(*) AS count FROM jobs GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        for row in &job_rows {
            let status: String = row.try_get("status").map_err(StoreError::Database)?;
            let count: i64 = row.try_get("count").map_err(StoreError::Database)?;
            stats.jobs.insert(status, count);
        }

        let video_rows = sqlx::query("SELECT status, COUNT(*) AS count FROM videos GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        for row in &video_rows {
            let status: String = row.try_get("status").map_err(StoreError::Database)?;
            let count: i64 = row.try_get("count").map_err(StoreError::Database)?;
            stats.videos.insert(status, count);
        }

        let counters = sqlx::query(
            "SELECT \
                 (SELECT COUNT(DISTINCT video_id) FROM transcript_segments) AS videos_with_transcripts, \
                 (SELECT COUNT(*) FROM transcript_segments) AS total_segments, \
                 (SELECT COUNT(*) FROM frames) AS total_frames, \
                 (SELECT COUNT(*) FROM frame_captions) AS total_captions",
        )
        .fetch_one(&self.pool)
        .await?;
        stats.videos_with_transcripts = counters
            .try_get("videos_with_transcripts")
            .map_err(StoreError::Database)?;
        stats.total_segments = counters.try_get("total_segments").map_err(StoreError::Database)?;
        stats.total_frames = counters.try_get("total_frames").map_err(StoreError::Database)?;
        stats.total_captions = counters.try_get("total_captions").map_err(StoreError::Database)?;

        Ok(stats)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
