//! SRT subtitle rendering.
//!
//! One cue per transcript segment, numbered from 1, timestamps in the
//! standard `HH:MM:SS,mmm` form.

use crate::entities::TranscriptSegmentRow;

/// A single subtitle cue.
#[derive(Debug, Clone, PartialEq)]
pub struct SrtCue {
    /// 1-based cue number.
    pub index: usize,
    pub t_start: f64,
    pub t_end: f64,
    pub text: String,
}

impl SrtCue {
    pub fn from_segment(index: usize, segment: &TranscriptSegmentRow) -> Self {
        Self {
            index,
            t_start: segment.t_start,
            t_end: segment.t_end,
            text: segment.text.clone(),
        }
    }
}

/// Format seconds as an SRT timestamp (`HH:MM:SS,mmm`).
pub fn format_srt_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let total_millis = (seconds * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

/// Render cues as a complete SRT document.
pub fn render_srt(cues: &[SrtCue]) -> String {
    let mut out = String::new();
    for cue in cues {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_srt_timestamp(cue.t_start),
            format_srt_timestamp(cue.t_end),
            cue.text
        ));
    }
    out
}
