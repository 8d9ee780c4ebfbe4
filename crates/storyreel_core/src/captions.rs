//! Caption and metadata writers derived from the resolved timeline.

use serde_json::json;
use std::path::Path;

use crate::error::Result;
use crate::script::Script;
use crate::timeline::TimelineSummary;

/// SRT timestamp: `HH:MM:SS,mmm`. Negative inputs clamp to zero.
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let millis = (seconds * 1000.0).round() as u64;
    let ms = millis % 1000;
    let secs = (millis / 1000) % 60;
    let mins = (millis / 60_000) % 60;
    let hours = millis / 3_600_000;
    format!("{hours:02}:{mins:02}:{secs:02},{ms:03}")
}

/// Render the SRT document: one cue per section, on-screen text first,
/// narration below it.
pub fn srt_document(timeline: &TimelineSummary) -> String {
    let mut lines: Vec<String> = Vec::new();
    for section in &timeline.sections {
        let start = format_timestamp(section.start_sec);
        let end = format_timestamp(section.start_sec + section.duration_sec);
        let mut caption: Vec<&str> = Vec::new();
        if !section.on_screen_text.is_empty() {
            caption.push(&section.on_screen_text);
        }
        if !section.narration.is_empty() {
            caption.push(&section.narration);
        }
        let text = if caption.is_empty() {
            "(no text)".to_string()
        } else {
            caption.join("\n")
        };
        lines.push(section.index.to_string());
        lines.push(format!("{start} --> {end}"));
        lines.push(text);
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn write_srt(timeline: &TimelineSummary, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, srt_document(timeline))?;
    Ok(())
}

/// JSON description of the produced timeline. When `text_cache_dir` is
/// given, the rendered text-overlay artifacts found there are listed.
pub fn metadata_document(
    script: &Script,
    timeline: &TimelineSummary,
    text_cache_dir: Option<&Path>,
) -> serde_json::Value {
    let mut data = json!({
        "project": script.project,
        "title": script.title,
        "locale": script.locale,
        "total_duration_sec": timeline.total_duration,
        "video_resolution": {
            "width": script.video.width,
            "height": script.video.height,
        },
        "sections": timeline.sections.iter().map(|s| json!({
            "id": s.id,
            "index": s.index,
            "start_sec": s.start_sec,
            "duration_sec": s.duration_sec,
            "audio_path": s.audio_path.as_ref().map(|p| p.display().to_string()),
            "on_screen_text": s.on_screen_text,
            "narration": s.narration,
        })).collect::<Vec<_>>(),
    });

    if let Some(bgm) = &script.bgm {
        data["bgm"] = json!({ "path": bgm.file });
    }

    if let Some(cache_dir) = text_cache_dir {
        let files = list_text_artifacts(cache_dir);
        if !files.is_empty() {
            data["text_assets"] = json!({
                "cache_dir": cache_dir.display().to_string(),
                "files": files,
            });
        }
    }

    data
}

fn list_text_artifacts(cache_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(cache_dir) else {
        return vec![];
    };
    let mut files: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.starts_with("text_") && name.ends_with(".png"))
        .collect();
    files.sort();
    files
}

pub fn write_metadata(
    script: &Script,
    timeline: &TimelineSummary,
    path: &Path,
    text_cache_dir: Option<&Path>,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = metadata_document(script, timeline, text_cache_dir);
    std::fs::write(path, serde_json::to_string_pretty(&data)?)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{OutputSpec, Section, TextStyle, VideoSpec, VoiceSpec};
    use crate::timeline::SectionTimeline;

    fn sample_timeline() -> TimelineSummary {
        TimelineSummary {
            sections: vec![
                SectionTimeline {
                    id: "s1".to_string(),
                    index: 1,
                    start_sec: 0.0,
                    duration_sec: 2.0,
                    on_screen_text: "見出し".to_string(),
                    narration: "ナレーション本文".to_string(),
                    audio_path: None,
                },
                SectionTimeline {
                    id: "s2".to_string(),
                    index: 2,
                    start_sec: 2.5,
                    duration_sec: 3.0,
                    on_screen_text: String::new(),
                    narration: String::new(),
                    audio_path: None,
                },
            ],
            total_duration: 5.5,
        }
    }

    fn sample_script() -> Script {
        Script {
            project: "proj".to_string(),
            title: "タイトル".to_string(),
            locale: "ja-JP".to_string(),
            video: VideoSpec {
                width: 1920,
                height: 1080,
                fps: 30,
                bg: "bg.mp4".to_string(),
                bg_fit: Default::default(),
            },
            voice: VoiceSpec {
                speaker_id: 1,
                speed_scale: 1.0,
                pitch_scale: 0.0,
                intonation_scale: 1.0,
                volume_scale: 1.0,
                pause_msec: 0,
            },
            text_style: TextStyle {
                font: "Arial".to_string(),
                fontsize: 54,
                fill: "#FFFFFF".to_string(),
                stroke: Default::default(),
                position: Default::default(),
                max_chars_per_line: 22,
                lines: 3,
                animation: None,
            },
            bgm: None,
            watermark: None,
            credits: None,
            sections: vec![Section {
                id: "s1".to_string(),
                on_screen_text: "見出し".to_string(),
                segments: vec![],
                layout: None,
                narration: "ナレーション本文".to_string(),
                duration_hint_sec: None,
                bg: None,
                bg_keyword: None,
                overlays: vec![],
                effects: vec![],
            }],
            output: OutputSpec {
                filename: "out.mp4".to_string(),
                srt: true,
                thumbnail_time_sec: 1.0,
            },
        }
    }

    #[test]
    fn timestamp_formatting() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(1.5), "00:00:01,500");
        assert_eq!(format_timestamp(62.05), "00:01:02,050");
        assert_eq!(format_timestamp(3661.25), "01:01:01,250");
        assert_eq!(format_timestamp(-3.0), "00:00:00,000");
    }

    #[test]
    fn srt_contains_cues_in_order() {
        let doc = srt_document(&sample_timeline());
        let expected_first = "1\n00:00:00,000 --> 00:00:02,000\n見出し\nナレーション本文\n";
        assert!(doc.starts_with(expected_first));
        assert!(doc.contains("2\n00:00:02,500 --> 00:00:05,500\n(no text)"));
    }

    #[test]
    fn metadata_lists_sections_and_total() {
        let data = metadata_document(&sample_script(), &sample_timeline(), None);
        assert_eq!(data["project"], "proj");
        assert_eq!(data["total_duration_sec"], 5.5);
        assert_eq!(data["video_resolution"]["width"], 1920);
        assert_eq!(data["sections"].as_array().unwrap().len(), 2);
        assert_eq!(data["sections"][1]["start_sec"], 2.5);
        assert!(data["sections"][0]["audio_path"].is_null());
        assert!(data.get("bgm").is_none());
    }

    #[test]
    fn metadata_includes_text_cache_listing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("text_abc123.png"), b"png").unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

        let data = metadata_document(&sample_script(), &sample_timeline(), Some(dir.path()));
        let files = data["text_assets"]["files"].as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0], "text_abc123.png");
    }

    #[test]
    fn write_srt_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captions/out.srt");
        write_srt(&sample_timeline(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("00:00:00,000 --> 00:00:02,000"));
    }
}
