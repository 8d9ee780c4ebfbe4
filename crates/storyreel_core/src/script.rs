use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

/// How a background asset maps onto the frame. The default letterboxes
/// (scale down, pad to the exact frame); cropping is an explicit
/// opt-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BgFit {
    Cover,
    #[default]
    Contain,
    Stretch,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoSpec {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Background asset path; per-section overrides take precedence.
    pub bg: String,
    #[serde(default)]
    pub bg_fit: BgFit,
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_fps() -> u32 {
    30
}

// ---------------------------------------------------------------------------
// Voice
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoiceSpec {
    pub speaker_id: u32,
    #[serde(default = "default_unit_scale")]
    pub speed_scale: f64,
    #[serde(default)]
    pub pitch_scale: f64,
    #[serde(default = "default_unit_scale")]
    pub intonation_scale: f64,
    #[serde(default = "default_unit_scale")]
    pub volume_scale: f64,
    /// Silence inserted between sections, in milliseconds.
    #[serde(default)]
    pub pause_msec: u32,
}

fn default_unit_scale() -> f64 {
    1.0
}

// ---------------------------------------------------------------------------
// Text styling
// ---------------------------------------------------------------------------

/// One axis of a text/overlay position: a literal pixel offset or a
/// symbolic anchor token such as `center`, `right-120`, `bottom-40`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PosValue {
    Px(i32),
    Anchor(String),
}

impl PosValue {
    pub fn anchor(token: impl Into<String>) -> Self {
        PosValue::Anchor(token.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextPos {
    #[serde(default = "default_pos_x")]
    pub x: PosValue,
    #[serde(default = "default_pos_y")]
    pub y: PosValue,
}

impl TextPos {
    pub fn new(x: PosValue, y: PosValue) -> Self {
        Self { x, y }
    }
}

impl Default for TextPos {
    fn default() -> Self {
        Self {
            x: default_pos_x(),
            y: default_pos_y(),
        }
    }
}

fn default_pos_x() -> PosValue {
    PosValue::anchor("center")
}

fn default_pos_y() -> PosValue {
    PosValue::anchor("bottom-160")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stroke {
    #[serde(default = "default_stroke_color")]
    pub color: String,
    #[serde(default = "default_stroke_width")]
    pub width: u32,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            color: default_stroke_color(),
            width: default_stroke_width(),
        }
    }
}

fn default_stroke_color() -> String {
    "#000000".to_string()
}

fn default_stroke_width() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextStyle {
    /// Font family name or a concrete font file path.
    pub font: String,
    #[serde(default = "default_fontsize")]
    pub fontsize: u32,
    #[serde(default = "default_fill")]
    pub fill: String,
    #[serde(default)]
    pub stroke: Stroke,
    #[serde(default)]
    pub position: TextPos,
    #[serde(default = "default_max_chars")]
    pub max_chars_per_line: u32,
    #[serde(default = "default_lines")]
    pub lines: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
}

fn default_fontsize() -> u32 {
    54
}

fn default_fill() -> String {
    "#FFFFFF".to_string()
}

fn default_max_chars() -> u32 {
    22
}

fn default_lines() -> u32 {
    3
}

/// Segment-level style override: only non-null fields replace the base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StyleOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fontsize: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Stroke>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<TextPos>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chars_per_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
}

impl TextStyle {
    /// Shallow-merge an override onto this style.
    pub fn merged(&self, over: Option<&StyleOverride>) -> TextStyle {
        let mut out = self.clone();
        let Some(over) = over else { return out };
        if let Some(v) = &over.font {
            out.font = v.clone();
        }
        if let Some(v) = over.fontsize {
            out.fontsize = v;
        }
        if let Some(v) = &over.fill {
            out.fill = v.clone();
        }
        if let Some(v) = &over.stroke {
            out.stroke = v.clone();
        }
        if let Some(v) = &over.position {
            out.position = v.clone();
        }
        if let Some(v) = over.max_chars_per_line {
            out.max_chars_per_line = v;
        }
        if let Some(v) = over.lines {
            out.lines = v;
        }
        if let Some(v) = &over.animation {
            out.animation = Some(v.clone());
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Optional attachments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BgmSpec {
    pub file: String,
    #[serde(default = "default_bgm_volume")]
    pub volume_db: f64,
    #[serde(default = "default_ducking")]
    pub ducking_db: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

fn default_bgm_volume() -> f64 {
    -16.0
}

fn default_ducking() -> f64 {
    -6.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Watermark {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default = "default_wm_fontsize")]
    pub fontsize: u32,
    #[serde(default = "default_fill")]
    pub fill: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<u32>,
    #[serde(default = "default_wm_position")]
    pub position: TextPos,
    /// How long the watermark text stays visible from the start.
    #[serde(default = "default_wm_duration")]
    pub duration_sec: f64,
}

fn default_wm_fontsize() -> u32 {
    28
}

fn default_wm_position() -> TextPos {
    TextPos::new(PosValue::anchor("right-40"), PosValue::anchor("top+40"))
}

fn default_wm_duration() -> f64 {
    8.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credits {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub text: String,
    #[serde(default = "default_credits_position")]
    pub position: TextPos,
}

fn default_true() -> bool {
    true
}

fn default_credits_position() -> TextPos {
    TextPos::new(PosValue::anchor("left+40"), PosValue::anchor("bottom-40"))
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlayImage {
    pub file: String,
    #[serde(default)]
    pub position: TextPos,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub id: String,
    /// Single-line fallback used when `segments` is empty.
    #[serde(default)]
    pub on_screen_text: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    pub narration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hint_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_keyword: Option<String>,
    #[serde(default)]
    pub overlays: Vec<OverlayImage>,
    #[serde(default)]
    pub effects: Vec<String>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSpec {
    pub filename: String,
    #[serde(default = "default_true")]
    pub srt: bool,
    #[serde(default = "default_thumbnail_time")]
    pub thumbnail_time_sec: f64,
}

fn default_thumbnail_time() -> f64 {
    1.0
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Script {
    pub project: String,
    pub title: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    pub video: VideoSpec,
    pub voice: VoiceSpec,
    pub text_style: TextStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgm: Option<BgmSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<Watermark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<Credits>,
    pub sections: Vec<Section>,
    pub output: OutputSpec,
}

fn default_locale() -> String {
    "ja-JP".to_string()
}

impl Script {
    /// A script with no sections is unrenderable.
    pub fn validate(&self) -> Result<()> {
        if self.sections.is_empty() {
            return Err(CoreError::EmptyScript);
        }
        Ok(())
    }

    /// Save the script to a file as pretty-printed JSON.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Load and validate a script from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let script: Script = serde_json::from_str(&data)?;
        script.validate()?;
        Ok(script)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_script(section_count: usize) -> Script {
        let sections = (1..=section_count)
            .map(|i| Section {
                id: format!("s{i}"),
                on_screen_text: format!("セクション{i}"),
                segments: vec![],
                layout: None,
                narration: "テストナレーション".to_string(),
                duration_hint_sec: None,
                bg: None,
                bg_keyword: None,
                overlays: vec![],
                effects: vec![],
            })
            .collect();
        Script {
            project: "test-project".to_string(),
            title: "テスト動画".to_string(),
            locale: default_locale(),
            video: VideoSpec {
                width: 1920,
                height: 1080,
                fps: 30,
                bg: "assets/default.mp4".to_string(),
                bg_fit: BgFit::default(),
            },
            voice: VoiceSpec {
                speaker_id: 3,
                speed_scale: 1.0,
                pitch_scale: 0.0,
                intonation_scale: 1.0,
                volume_scale: 1.0,
                pause_msec: 200,
            },
            text_style: TextStyle {
                font: "Arial".to_string(),
                fontsize: 54,
                fill: default_fill(),
                stroke: Stroke::default(),
                position: TextPos::default(),
                max_chars_per_line: 22,
                lines: 3,
                animation: None,
            },
            bgm: None,
            watermark: None,
            credits: None,
            sections,
            output: OutputSpec {
                filename: "out.mp4".to_string(),
                srt: true,
                thumbnail_time_sec: 1.0,
            },
        }
    }

    #[test]
    fn validate_rejects_empty_sections() {
        let mut script = minimal_script(1);
        script.sections.clear();
        assert!(matches!(script.validate(), Err(CoreError::EmptyScript)));
    }

    #[test]
    fn pos_value_parses_int_and_string() {
        let pos: TextPos = serde_json::from_str(r#"{"x": "center", "y": -40}"#).unwrap();
        assert_eq!(pos.x, PosValue::anchor("center"));
        assert_eq!(pos.y, PosValue::Px(-40));
    }

    #[test]
    fn text_pos_defaults() {
        let pos: TextPos = serde_json::from_str("{}").unwrap();
        assert_eq!(pos.x, PosValue::anchor("center"));
        assert_eq!(pos.y, PosValue::anchor("bottom-160"));
    }

    #[test]
    fn merged_overrides_only_set_fields() {
        let base = minimal_script(1).text_style;
        let over = StyleOverride {
            fontsize: Some(72),
            fill: Some("#FF0000".to_string()),
            ..StyleOverride::default()
        };
        let merged = base.merged(Some(&over));
        assert_eq!(merged.fontsize, 72);
        assert_eq!(merged.fill, "#FF0000");
        assert_eq!(merged.font, base.font);
        assert_eq!(merged.stroke, base.stroke);
    }

    #[test]
    fn merged_without_override_is_identity() {
        let base = minimal_script(1).text_style;
        assert_eq!(base.merged(None), base);
    }

    #[test]
    fn serde_roundtrip_script() {
        let mut script = minimal_script(2);
        script.bgm = Some(BgmSpec {
            file: "bgm.mp3".to_string(),
            volume_db: -12.0,
            ducking_db: -6.0,
            license: Some("CC-BY".to_string()),
        });
        script.sections[0].segments.push(Segment {
            text: "見出し".to_string(),
            style: Some(StyleOverride {
                fontsize: Some(64),
                ..StyleOverride::default()
            }),
        });
        let json = serde_json::to_string(&script).unwrap();
        let back: Script = serde_json::from_str(&json).unwrap();
        assert_eq!(script, back);
    }

    #[test]
    fn deserialize_fills_defaults() {
        let json = r#"{
            "project": "p",
            "title": "t",
            "video": {"bg": "bg.mp4"},
            "voice": {"speaker_id": 1},
            "text_style": {"font": "Arial"},
            "sections": [{"id": "s1", "narration": "n"}],
            "output": {"filename": "out.mp4"}
        }"#;
        let script: Script = serde_json::from_str(json).unwrap();
        assert_eq!(script.video.width, 1920);
        assert_eq!(script.video.fps, 30);
        assert_eq!(script.video.bg_fit, BgFit::Contain);
        assert_eq!(script.voice.speed_scale, 1.0);
        assert_eq!(script.text_style.fontsize, 54);
        assert_eq!(script.text_style.stroke.width, 3);
        assert!(script.output.srt);
        assert!(script.sections[0].segments.is_empty());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        let script = minimal_script(2);
        script.save_to_file(&path).unwrap();
        let back = Script::load_from_file(&path).unwrap();
        assert_eq!(script, back);
    }
}
