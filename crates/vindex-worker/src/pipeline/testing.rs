//! In-memory collaborators used by the pipeline and controller tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use vindex_ai::{AiError, AiResult, SpeechToText, TextEmbedder, VisionAnalyzer};
use vindex_db::{JobSource, Storage, StoreError, StoreResult};
use vindex_media::{MediaError, MediaInfo, MediaResult, MediaToolkit};
use vindex_models::{
    CaptionRow, ClaimedJob, FrameAnalysis, FrameRow, JobStatus, PendingJob, SceneRow,
    SpokenSegment, StoreStats, TranscriptSegmentRow, VideoStatus,
};

use crate::paths::DataLayout;
use crate::pipeline::{PipelineContext, PipelineSettings};

#[derive(Debug, Clone, PartialEq)]
pub struct MemVideo {
    pub id: String,
    pub original_path: String,
    pub status: VideoStatus,
    pub normalized_path: Option<String>,
    pub duration_sec: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemJob {
    pub id: String,
    pub video_id: String,
    pub status: JobStatus,
    pub attempts: i32,
    pub error: Option<String>,
}

/// Full store contents; comparable across runs for idempotence checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemState {
    pub videos: Vec<MemVideo>,
    pub jobs: Vec<MemJob>,
    pub scenes: Vec<SceneRow>,
    pub frames: Vec<FrameRow>,
    pub segments: Vec<TranscriptSegmentRow>,
    pub segment_embeddings: HashMap<String, Vec<f32>>,
    pub captions: Vec<CaptionRow>,
    pub caption_embeddings: HashMap<String, Vec<f32>>,
}

/// In-memory store implementing both capability interfaces. The single
/// mutex makes every operation atomic, mirroring the transactional claims
/// of the real gateway.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_video(&self, id: &str, original_path: &str) {
        self.state.lock().unwrap().videos.push(MemVideo {
            id: id.to_string(),
            original_path: original_path.to_string(),
            status: VideoStatus::Uploaded,
            normalized_path: None,
            duration_sec: None,
        });
    }

    pub fn add_job(&self, id: &str, video_id: &str) {
        self.add_job_with_attempts(id, video_id, 0);
    }

    pub fn add_job_with_attempts(&self, id: &str, video_id: &str, attempts: i32) {
        self.state.lock().unwrap().jobs.push(MemJob {
            id: id.to_string(),
            video_id: video_id.to_string(),
            status: JobStatus::Pending,
            attempts,
            error: None,
        });
    }

    pub fn snapshot(&self) -> MemState {
        self.state.lock().unwrap().clone()
    }

    pub fn job(&self, id: &str) -> Option<MemJob> {
        self.state.lock().unwrap().jobs.iter().find(|j| j.id == id).cloned()
    }

    pub fn video(&self, id: &str) -> Option<MemVideo> {
        self.state.lock().unwrap().videos.iter().find(|v| v.id == id).cloned()
    }

    fn scene_ids_of_video(state: &MemState, video_id: &str) -> HashSet<String> {
        state
            .scenes
            .iter()
            .filter(|s| s.video_id == video_id)
            .map(|s| s.id.clone())
            .collect()
    }

    fn frames_of_video(state: &MemState, video_id: &str) -> Vec<FrameRow> {
        let scene_ids = Self::scene_ids_of_video(state, video_id);
        let mut frames: Vec<FrameRow> = state
            .frames
            .iter()
            .filter(|f| scene_ids.contains(&f.scene_id))
            .cloned()
            .collect();
        frames.sort_by(|a, b| a.id.cmp(&b.id));
        frames
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn fetch_video_path(&self, video_id: &str) -> StoreResult<String> {
        let state = self.state.lock().unwrap();
        state
            .videos
            .iter()
            .find(|v| v.id == video_id)
            .map(|v| v.original_path.clone())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| StoreError::not_found(format!("original_path for video {video_id}")))
    }

    async fn normalized_info(&self, video_id: &str) -> StoreResult<Option<(String, f64)>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .videos
            .iter()
            .find(|v| v.id == video_id)
            .and_then(|v| v.normalized_path.clone().zip(v.duration_sec)))
    }

    async fn update_video_normalized(
        &self,
        video_id: &str,
        normalized_path: &str,
        duration_sec: f64,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(video) = state.videos.iter_mut().find(|v| v.id == video_id) {
            video.normalized_path = Some(normalized_path.to_string());
            video.duration_sec = Some(duration_sec);
        }
        Ok(())
    }

    async fn scenes_for_video(&self, video_id: &str) -> StoreResult<Vec<SceneRow>> {
        let state = self.state.lock().unwrap();
        let mut scenes: Vec<SceneRow> = state
            .scenes
            .iter()
            .filter(|s| s.video_id == video_id)
            .cloned()
            .collect();
        scenes.sort_by_key(|s| s.idx);
        Ok(scenes)
    }

    async fn bulk_insert_scenes(&self, rows: &[SceneRow]) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        for row in rows {
            let exists = state
                .scenes
                .iter()
                .any(|s| s.video_id == row.video_id && s.idx == row.idx);
            if !exists {
                state.scenes.push(row.clone());
            }
        }
        Ok(())
    }

    async fn frames_for_video(&self, video_id: &str) -> StoreResult<Vec<FrameRow>> {
        let state = self.state.lock().unwrap();
        Ok(Self::frames_of_video(&state, video_id))
    }

    async fn bulk_insert_frames(&self, rows: &[FrameRow]) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        for row in rows {
            if !state.frames.iter().any(|f| f.id == row.id) {
                state.frames.push(row.clone());
            }
        }
        Ok(())
    }

    async fn has_segments(&self, video_id: &str) -> StoreResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.segments.iter().any(|s| s.video_id == video_id))
    }

    async fn bulk_insert_segments(&self, rows: &[TranscriptSegmentRow]) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        for row in rows {
            let exists = state.segments.iter().any(|s| {
                s.video_id == row.video_id && s.t_start == row.t_start && s.t_end == row.t_end
            });
            if !exists {
                state.segments.push(row.clone());
            }
        }
        Ok(())
    }

    async fn frames_missing_caption(&self, video_id: &str) -> StoreResult<Vec<FrameRow>> {
        let state = self.state.lock().unwrap();
        let captioned: HashSet<String> =
            state.captions.iter().map(|c| c.frame_id.clone()).collect();
        Ok(Self::frames_of_video(&state, video_id)
            .into_iter()
            .filter(|f| !captioned.contains(&f.id))
            .collect())
    }

    async fn bulk_insert_captions(&self, rows: &[CaptionRow]) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        for row in rows {
            if !state.captions.iter().any(|c| c.id == row.id) {
                state.captions.push(row.clone());
            }
        }
        Ok(())
    }

    async fn segments_missing_embedding(
        &self,
        video_id: &str,
    ) -> StoreResult<Vec<TranscriptSegmentRow>> {
        let state = self.state.lock().unwrap();
        let mut segments: Vec<TranscriptSegmentRow> = state
            .segments
            .iter()
            .filter(|s| s.video_id == video_id && !state.segment_embeddings.contains_key(&s.id))
            .cloned()
            .collect();
        segments.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(segments)
    }

    async fn captions_missing_embedding(&self, video_id: &str) -> StoreResult<Vec<CaptionRow>> {
        let state = self.state.lock().unwrap();
        let frame_ids: HashSet<String> = Self::frames_of_video(&state, video_id)
            .into_iter()
            .map(|f| f.id)
            .collect();
        let mut captions: Vec<CaptionRow> = state
            .captions
            .iter()
            .filter(|c| {
                frame_ids.contains(&c.frame_id) && !state.caption_embeddings.contains_key(&c.id)
            })
            .cloned()
            .collect();
        captions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(captions)
    }

    async fn update_segment_embedding(&self, id: &str, embedding: &[f32]) -> StoreResult<()> {
        self.state
            .lock()
            .unwrap()
            .segment_embeddings
            .insert(id.to_string(), embedding.to_vec());
        Ok(())
    }

    async fn update_caption_embedding(&self, id: &str, embedding: &[f32]) -> StoreResult<()> {
        self.state
            .lock()
            .unwrap()
            .caption_embeddings
            .insert(id.to_string(), embedding.to_vec());
        Ok(())
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        let state = self.state.lock().unwrap();
        let mut stats = StoreStats {
            videos_with_transcripts: state
                .segments
                .iter()
                .map(|s| s.video_id.as_str())
                .collect::<HashSet<_>>()
                .len() as i64,
            total_segments: state.segments.len() as i64,
            total_frames: state.frames.len() as i64,
            total_captions: state.captions.len() as i64,
            ..StoreStats::default()
        };
        for job in &state.jobs {
            *stats.jobs.entry(job.status.as_str().to_string()).or_insert(0) += 1;
        }
        for video in &state.videos {
            *stats.videos.entry(video.status.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(stats)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl JobSource for MemoryStore {
    async fn claim_next_job(&self) -> StoreResult<Option<ClaimedJob>> {
        let mut state = self.state.lock().unwrap();
        let Some(job) = state.jobs.iter_mut().find(|j| j.status == JobStatus::Pending) else {
            return Ok(None);
        };
        job.status = JobStatus::Processing;
        job.attempts += 1;
        let claimed = ClaimedJob {
            job_id: job.id.clone(),
            video_id: job.video_id.clone(),
            attempts: job.attempts,
        };
        if let Some(video) = state.videos.iter_mut().find(|v| v.id == claimed.video_id) {
            video.status = VideoStatus::Processing;
        }
        Ok(Some(claimed))
    }

    async fn complete_job(&self, job_id: &str, video_id: &str) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(job) = state.jobs.iter_mut().find(|j| j.id == job_id) {
            job.status = JobStatus::Done;
        }
        if let Some(video) = state.videos.iter_mut().find(|v| v.id == video_id) {
            video.status = VideoStatus::Ready;
        }
        Ok(())
    }

    async fn fail_job(&self, job_id: &str, error: &str) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(job) = state.jobs.iter_mut().find(|j| j.id == job_id) {
            job.status = JobStatus::Failed;
            job.error = Some(error.to_string());
        }
        Ok(())
    }

    async fn reset_job(&self, job_id: &str, error: &str) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(job) = state.jobs.iter_mut().find(|j| j.id == job_id) {
            job.status = JobStatus::Pending;
            job.error = Some(error.to_string());
        }
        Ok(())
    }

    async fn peek_pending(&self, limit: i64) -> StoreResult<Vec<PendingJob>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .take(limit as usize)
            .map(|j| PendingJob {
                id: j.id.clone(),
                video_id: j.video_id.clone(),
                created_at: None,
                original_path: state
                    .videos
                    .iter()
                    .find(|v| v.id == j.video_id)
                    .map(|v| v.original_path.clone())
                    .unwrap_or_default(),
            })
            .collect())
    }
}

fn scene_idx_from_path(path: &Path) -> Option<usize> {
    path.file_stem()?.to_str()?.strip_prefix("scene_")?.parse().ok()
}

/// Media toolkit returning scripted results and writing placeholder files.
pub struct ScriptedMedia {
    pub duration: f64,
    pub scenes: Vec<(f64, f64)>,
    /// Perceptual hash per scene index.
    pub phashes: Vec<u64>,
    pub fail_transcode: bool,
    pub transcode_calls: AtomicUsize,
    pub detect_calls: AtomicUsize,
    pub extract_calls: AtomicUsize,
}

impl ScriptedMedia {
    pub fn new(duration: f64, scenes: Vec<(f64, f64)>, phashes: Vec<u64>) -> Self {
        Self {
            duration,
            scenes,
            phashes,
            fail_transcode: false,
            transcode_calls: AtomicUsize::new(0),
            detect_calls: AtomicUsize::new(0),
            extract_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MediaToolkit for ScriptedMedia {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        Ok(MediaInfo {
            duration: self.duration,
            width: 1280,
            height: 720,
            fps: 30.0,
        })
    }

    async fn transcode(
        &self,
        _input: &Path,
        video_out: &Path,
        audio_out: &Path,
    ) -> MediaResult<f64> {
        self.transcode_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_transcode {
            return Err(MediaError::ffmpeg_failed("scripted transcode failure", None, Some(1)));
        }
        for out in [video_out, audio_out] {
            if let Some(parent) = out.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(out, b"scripted media").await?;
        }
        Ok(self.duration)
    }

    async fn detect_scenes(&self, _video: &Path) -> MediaResult<Vec<(f64, f64)>> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scenes.clone())
    }

    async fn extract_frame(&self, _video: &Path, _timestamp: f64, out: &Path) -> MediaResult<()> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(parent) = out.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(out, b"jpeg").await?;
        Ok(())
    }

    async fn perceptual_hash(&self, image: &Path) -> MediaResult<u64> {
        let idx = scene_idx_from_path(image)
            .ok_or_else(|| MediaError::ImageDecode(format!("unexpected path {}", image.display())))?;
        self.phashes
            .get(idx)
            .copied()
            .ok_or_else(|| MediaError::ImageDecode(format!("no scripted hash for scene {idx}")))
    }
}

/// Speech-to-text returning a fixed transcript.
pub struct ScriptedSpeech {
    pub segments: Vec<SpokenSegment>,
    pub calls: AtomicUsize,
}

impl ScriptedSpeech {
    pub fn new(segments: Vec<SpokenSegment>) -> Self {
        Self {
            segments,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SpeechToText for ScriptedSpeech {
    async fn transcribe(&self, _audio: &Path) -> AiResult<Vec<SpokenSegment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.segments.clone())
    }
}

/// Vision analyzer that fails persistently for configured scenes.
pub struct ScriptedVision {
    pub fail_scenes: HashSet<usize>,
    pub calls: AtomicUsize,
}

impl ScriptedVision {
    pub fn new() -> Self {
        Self {
            fail_scenes: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_scenes(scenes: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_scenes: scenes.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VisionAnalyzer for ScriptedVision {
    async fn caption_frame(&self, image: &Path) -> AiResult<FrameAnalysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let idx = scene_idx_from_path(image)
            .ok_or_else(|| AiError::schema_violation(format!("unexpected path {}", image.display())))?;
        if self.fail_scenes.contains(&idx) {
            return Err(AiError::schema_violation(format!("scripted failure for scene {idx}")));
        }
        Ok(FrameAnalysis {
            caption: format!("frame of scene {idx}"),
            controls: Vec::new(),
            text_on_screen: Vec::new(),
        })
    }
}

/// Embedder producing deterministic vectors derived from the input text.
pub struct ScriptedEmbedder {
    pub batch_sizes: Mutex<Vec<usize>>,
}

impl ScriptedEmbedder {
    pub fn new() -> Self {
        Self {
            batch_sizes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TextEmbedder for ScriptedEmbedder {
    async fn embed(&self, texts: &[String]) -> AiResult<Vec<Vec<f32>>> {
        self.batch_sizes.lock().unwrap().push(texts.len());
        Ok(texts
            .iter()
            .map(|t| vec![t.len() as f32 / 100.0; 8])
            .collect())
    }
}

pub fn default_settings() -> PipelineSettings {
    PipelineSettings {
        max_frames_per_video: 50,
        vision_max_concurrent: 5,
        enable_transcription: true,
        enable_vision_analysis: true,
        enable_embeddings: true,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn context(
    store: Arc<MemoryStore>,
    media: Arc<ScriptedMedia>,
    speech: Arc<ScriptedSpeech>,
    vision: Arc<ScriptedVision>,
    embedder: Arc<ScriptedEmbedder>,
    root: PathBuf,
    settings: PipelineSettings,
) -> PipelineContext {
    PipelineContext {
        storage: store,
        media,
        speech,
        vision,
        embedder,
        layout: DataLayout::new(root),
        settings,
    }
}
