use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::script::Script;

/// Floor for the text-length heuristic so short narration never
/// collapses to a near-zero section.
const MIN_SECTION_SEC: f64 = 5.0;
/// Narration reading speed assumed when no audio exists yet.
const CHARS_PER_SEC: f64 = 9.0;

/// Resolved schedule for one section. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionTimeline {
    pub id: String,
    /// 1-based section index.
    pub index: usize,
    pub start_sec: f64,
    pub duration_sec: f64,
    pub on_screen_text: String,
    pub narration: String,
    pub audio_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineSummary {
    pub sections: Vec<SectionTimeline>,
    pub total_duration: f64,
}

/// Canonical narration file name for a section: `{index:02}_{id}.wav`.
pub fn audio_file_name(index: usize, id: &str) -> String {
    format!("{index:02}_{id}.wav")
}

/// Sample-accurate playback length from the WAV container header.
fn wav_duration(path: &Path) -> Result<f64> {
    let reader = hound::WavReader::open(path).map_err(|e| CoreError::AudioUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Ok(0.0);
    }
    Ok(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

fn estimate_from_text(text: &str) -> f64 {
    let chars = text.trim().chars().count().max(1);
    (chars as f64 / CHARS_PER_SEC).max(MIN_SECTION_SEC)
}

/// Lay out all sections in script order. Sections with a narration WAV
/// on disk use its exact playback length; the rest fall back to the
/// larger of the author's duration hint and the text-length heuristic.
pub fn build_timeline(script: &Script, audio_dir: &Path) -> Result<TimelineSummary> {
    script.validate()?;

    let pause = f64::from(script.voice.pause_msec) / 1000.0;
    let mut sections = Vec::with_capacity(script.sections.len());
    let mut cursor = 0.0;

    for (i, section) in script.sections.iter().enumerate() {
        let index = i + 1;
        let audio_path = audio_dir.join(audio_file_name(index, &section.id));
        let (duration_sec, audio_path) = if audio_path.exists() {
            (wav_duration(&audio_path)?, Some(audio_path))
        } else {
            let hint = section.duration_hint_sec.unwrap_or(0.0);
            (hint.max(estimate_from_text(&section.narration)), None)
        };
        sections.push(SectionTimeline {
            id: section.id.clone(),
            index,
            start_sec: cursor,
            duration_sec,
            on_screen_text: section.on_screen_text.clone(),
            narration: section.narration.clone(),
            audio_path,
        });
        cursor += duration_sec + pause;
    }

    // Drop the trailing pause after the last section.
    let total_duration = (cursor - pause).max(0.0);
    Ok(TimelineSummary {
        sections,
        total_duration,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
