//! Builds a complete [`RenderPlan`] from a script and its resolved
//! timeline. Each section becomes its own video chain (background,
//! text, effects, overlays) and the chains are concatenated; the audio
//! side concatenates narration takes and optionally mixes in ducked
//! BGM. All labels are generated from local counters, so a plan is
//! self-contained and validates structurally before ffmpeg sees it.

use std::path::{Path, PathBuf};

use tracing::warn;

use storyreel_core::script::{BgFit, Script, Section, TextStyle};
use storyreel_core::timeline::TimelineSummary;

use crate::effects;
use crate::error::{RenderError, Result};
use crate::fonts::FontResolver;
use crate::plan::{FilterStage, RenderInput, RenderPlan};
use crate::position::{
    format_position, DRAWTEXT_X, DRAWTEXT_Y, OVERLAY_X, OVERLAY_Y,
};
use crate::textfit;
use crate::textimage::{self, RasterSpec, LINE_GAP_PX};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Fraction of the frame width on-screen text may occupy.
const TEXT_WIDTH_RATIO: f32 = 0.9;
const MIN_FONT_PX: f32 = 24.0;

/// First segment of a multi-segment caption gets the emphasis tier.
const EMPHASIS_SCALE: f64 = 1.25;
const EMPHASIS_EXTRA_STROKE: u32 = 2;
const EMPHASIS_FILL: &str = "#FFD966";

const CREDITS_LEAD_SEC: f64 = 4.0;
const CREDITS_TAIL_SEC: f64 = 0.5;
const CREDITS_MIN_FONT: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    /// Pre-rasterized PNG overlays (sharp strokes, cacheable).
    Raster,
    /// Native `drawtext` filters; no raster cache required.
    Drawtext,
}

#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub text_mode: TextMode,
    /// Directory for content-addressed `text_*.png` artifacts.
    pub cache_dir: PathBuf,
    pub output_path: PathBuf,
}

/// Compile a script + timeline into a validated render plan.
pub fn assemble(
    script: &Script,
    timeline: &TimelineSummary,
    opts: &AssembleOptions,
) -> Result<RenderPlan> {
    Assembler {
        script,
        timeline,
        opts,
        fonts: FontResolver::new(),
        inputs: Vec::new(),
        stages: Vec::new(),
    }
    .build()
}

pub fn db_to_linear(value_db: f64) -> f64 {
    10f64.powf(value_db / 20.0)
}

/// Escape a string for use inside `drawtext=text='...'`. Normalizes
/// CR/CRLF and literal `\n` sequences to real newlines first, then
/// escapes what would otherwise terminate the filter argument.
pub fn escape_text(text: &str) -> String {
    let normalized = text
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace("\\n", "\n");
    normalized
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace(':', "\\:")
        .replace(',', "\\,")
        .replace('\'', "\\'")
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_string_lossy().to_lowercase().as_str()))
        .unwrap_or(false)
}

fn background_fit_filter(width: u32, height: u32, fit: &BgFit) -> String {
    match fit {
        BgFit::Cover => format!(
            "scale={width}:{height}:force_original_aspect_ratio=increase,\
             crop={width}:{height},setsar=1"
        ),
        BgFit::Contain => format!(
            "scale={width}:{height}:force_original_aspect_ratio=decrease,\
             pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1"
        ),
        BgFit::Stretch => format!("scale={width}:{height},setsar=1"),
    }
}

fn emphasized(base: &TextStyle) -> TextStyle {
    let mut style = base.clone();
    style.fontsize = (f64::from(base.fontsize) * EMPHASIS_SCALE).round() as u32;
    style.stroke.width = base.stroke.width + EMPHASIS_EXTRA_STROKE;
    style.fill = EMPHASIS_FILL.to_string();
    style
}

struct Assembler<'a> {
    script: &'a Script,
    timeline: &'a TimelineSummary,
    opts: &'a AssembleOptions,
    fonts: FontResolver,
    inputs: Vec<RenderInput>,
    stages: Vec<FilterStage>,
}

impl Assembler<'_> {
    fn build(mut self) -> Result<RenderPlan> {
        self.script.validate()?;
        let video_out = self.build_video()?;
        let audio_out = self.build_audio();
        let plan = RenderPlan {
            inputs: self.inputs,
            stages: self.stages,
            video_out,
            audio_out,
            fps: self.script.video.fps,
            output_path: self.opts.output_path.clone(),
        };
        plan.validate()?;
        Ok(plan)
    }

    fn add_input(&mut self, pre_args: Vec<String>, path: PathBuf) -> usize {
        let index = self.inputs.len();
        self.inputs.push(RenderInput {
            index,
            pre_args,
            path,
        });
        index
    }

    fn push(&mut self, inputs: Vec<String>, filter: String, output: String) -> String {
        self.stages.push(FilterStage {
            inputs,
            filter,
            outputs: vec![output.clone()],
        });
        output
    }

    // ---- video ----

    fn build_video(&mut self) -> Result<String> {
        let script = self.script;
        let timeline = self.timeline;

        // A timeline built from a different script is a caller bug;
        // zipping the two would silently drop sections.
        if script.sections.len() != timeline.sections.len() {
            return Err(RenderError::SectionCountMismatch {
                script: script.sections.len(),
                timeline: timeline.sections.len(),
            });
        }

        let mut section_labels = Vec::with_capacity(timeline.sections.len());
        for (i, (section, tl)) in script
            .sections
            .iter()
            .zip(&timeline.sections)
            .enumerate()
        {
            let label = self.build_section_video(i, section, tl.duration_sec.max(0.1))?;
            section_labels.push(label);
        }

        let n = section_labels.len();
        let mut label = self.push(
            section_labels,
            format!("concat=n={n}:v=1:a=0"),
            "vcat".to_string(),
        );

        let total = timeline.total_duration.max(1.0);
        label = self.apply_watermark(label, total);
        label = self.apply_credits(label);
        Ok(label)
    }

    fn build_section_video(
        &mut self,
        i: usize,
        section: &Section,
        duration: f64,
    ) -> Result<String> {
        let script = self.script;

        let bg = section.bg.as_deref().unwrap_or(&script.video.bg);
        let bg_path = Path::new(bg);
        if !bg_path.exists() {
            return Err(RenderError::MissingBackground {
                section: section.id.clone(),
                path: bg_path.to_path_buf(),
            });
        }
        let pre_args = if is_image(bg_path) {
            vec![
                "-loop".into(),
                "1".into(),
                "-t".into(),
                format!("{duration:.2}"),
            ]
        } else {
            vec!["-stream_loop".into(), "-1".into()]
        };
        let input_idx = self.add_input(pre_args, bg_path.to_path_buf());

        let mut label = self.push(
            vec![format!("{input_idx}:v")],
            format!("trim=duration={duration:.3},setpts=PTS-STARTPTS"),
            format!("vsec{i}"),
        );
        label = self.push(
            vec![label],
            background_fit_filter(script.video.width, script.video.height, &script.video.bg_fit),
            format!("vbase{i}"),
        );

        label = self.apply_section_text(label, i, section, duration)?;

        for (n, name) in section.effects.iter().enumerate() {
            if let Some(filter) = effects::effect_filter(name, 0.0, duration) {
                label = self.push(vec![label], filter, format!("vfx{i}_{n}"));
            }
        }

        for (k, overlay) in section.overlays.iter().enumerate() {
            let path = Path::new(&overlay.file);
            if !path.exists() {
                warn!(section = %section.id, file = %overlay.file, "overlay image missing, skipping");
                continue;
            }
            let pre_args = if is_image(path) {
                vec![
                    "-loop".into(),
                    "1".into(),
                    "-t".into(),
                    format!("{duration:.2}"),
                ]
            } else {
                vec![]
            };
            let idx = self.add_input(pre_args, path.to_path_buf());
            let mut ov_label = format!("{idx}:v");
            if let Some(scale) = overlay.scale {
                ov_label = self.push(
                    vec![ov_label],
                    format!("scale=iw*{scale:.4}:ih*{scale:.4}"),
                    format!("ov{i}_{k}s"),
                );
            }
            if let Some(opacity) = overlay.opacity {
                ov_label = self.push(
                    vec![ov_label],
                    format!("format=rgba,colorchannelmixer=aa={opacity:.3}"),
                    format!("ov{i}_{k}a"),
                );
            }
            let x = format_position(&overlay.position.x, OVERLAY_X, 1.0);
            let y = format_position(&overlay.position.y, OVERLAY_Y, 1.0);
            label = self.push(
                vec![label, ov_label],
                format!("overlay=x={x}:y={y}:format=auto:shortest=1"),
                format!("vov{i}_{k}"),
            );
        }

        Ok(label)
    }

    /// Text blocks for one section: either its segments (first one on
    /// the emphasis tier) or the single on-screen line in the base
    /// style.
    fn section_text_blocks(&self, section: &Section) -> Vec<(String, TextStyle)> {
        let base = &self.script.text_style;
        if !section.segments.is_empty() {
            return section
                .segments
                .iter()
                .enumerate()
                .map(|(k, seg)| {
                    let tier = if k == 0 { emphasized(base) } else { base.clone() };
                    (seg.text.clone(), tier.merged(seg.style.as_ref()))
                })
                .collect();
        }
        if section.on_screen_text.trim().is_empty() {
            return vec![];
        }
        vec![(section.on_screen_text.clone(), base.clone())]
    }

    fn apply_section_text(
        &mut self,
        mut label: String,
        i: usize,
        section: &Section,
        duration: f64,
    ) -> Result<String> {
        let script = self.script;
        let max_width = script.video.width as f32 * TEXT_WIDTH_RATIO;
        let cache_dir = self.opts.cache_dir.clone();
        let text_mode = self.opts.text_mode;

        let mut y_offset: u32 = 0;
        for (k, (text, style)) in self.section_text_blocks(section).into_iter().enumerate() {
            match text_mode {
                TextMode::Raster => {
                    let font = self.fonts.load(&style.font)?;
                    let fit = textfit::fit_text(
                        &font,
                        &text,
                        style.fontsize as f32,
                        max_width,
                        MIN_FONT_PX,
                        style.stroke.width as f32,
                    );
                    if !fit.fits {
                        warn!(
                            section = %section.id,
                            text = %fit.text,
                            width = fit.max_line_width,
                            max_width,
                            "on-screen text still overflows the frame after fitting"
                        );
                    }
                    let artifact = textimage::render_text(
                        &font,
                        &RasterSpec {
                            text: &fit.text,
                            font_name: &style.font,
                            size: fit.size,
                            fill: &style.fill,
                            stroke_color: &style.stroke.color,
                            stroke_width: style.stroke.width,
                            max_width,
                        },
                        &cache_dir,
                    )?;
                    let idx = self.add_input(vec![], artifact.path.clone());
                    let x = format_position(&style.position.x, OVERLAY_X, 1.0);
                    let y = offset_expr(
                        format_position(&style.position.y, OVERLAY_Y, 1.0),
                        y_offset,
                    );
                    label = self.push(
                        vec![label, format!("{idx}:v")],
                        format!("overlay=x={x}:y={y}:enable='between(t,0.00,{duration:.2})'"),
                        format!("vtxt{i}_{k}"),
                    );
                    y_offset += artifact.height + LINE_GAP_PX;
                }
                TextMode::Drawtext => {
                    let (text, size) = match self.fonts.load(&style.font) {
                        Ok(font) => {
                            let fit = textfit::fit_text(
                                &font,
                                &text,
                                style.fontsize as f32,
                                max_width,
                                MIN_FONT_PX,
                                style.stroke.width as f32,
                            );
                            if !fit.fits {
                                warn!(
                                    section = %section.id,
                                    text = %fit.text,
                                    width = fit.max_line_width,
                                    max_width,
                                    "on-screen text still overflows the frame after fitting"
                                );
                            }
                            (fit.text, fit.size.round() as u32)
                        }
                        Err(err) => {
                            warn!(
                                section = %section.id,
                                font = %style.font,
                                %err,
                                "font not loadable, skipping fit check"
                            );
                            (text, style.fontsize)
                        }
                    };
                    let fontfile = self.fonts.resolve(&style.font);
                    let x = format_position(&style.position.x, DRAWTEXT_X, 1.0);
                    let y = offset_expr(
                        format_position(&style.position.y, DRAWTEXT_Y, 1.0),
                        y_offset,
                    );
                    let filter = format!(
                        "drawtext=fontfile='{}':text='{}':fontsize={size}:fontcolor={}:\
                         borderw={}:bordercolor={}:x={x}:y={y}:\
                         enable='between(t,0.00,{duration:.2})'",
                        fontfile.display(),
                        escape_text(&text),
                        style.fill,
                        style.stroke.width,
                        style.stroke.color,
                    );
                    label = self.push(vec![label], filter, format!("vtxt{i}_{k}"));
                    y_offset += size + LINE_GAP_PX;
                }
            }
        }
        Ok(label)
    }

    // ---- post-concat overlays ----

    fn apply_watermark(&mut self, mut label: String, total: f64) -> String {
        let script = self.script;
        let Some(wm) = &script.watermark else {
            return label;
        };

        if let Some(file) = &wm.file {
            let path = Path::new(file);
            if path.exists() {
                let pre_args = if is_image(path) {
                    vec![
                        "-loop".into(),
                        "1".into(),
                        "-t".into(),
                        format!("{total:.2}"),
                    ]
                } else {
                    vec![]
                };
                let idx = self.add_input(pre_args, path.to_path_buf());
                let x = format_position(&wm.position.x, OVERLAY_X, 1.0);
                let y = format_position(&wm.position.y, OVERLAY_Y, 1.0);
                label = self.push(
                    vec![label, format!("{idx}:v")],
                    format!("overlay=x={x}:y={y}:format=auto:shortest=1"),
                    "vwm".to_string(),
                );
            } else {
                warn!(file = %file, "watermark image missing, skipping");
            }
        }

        // The text slot doubles as the BGM attribution line.
        let text = wm
            .text
            .clone()
            .or_else(|| script.bgm.as_ref().and_then(|b| b.license.clone()));
        if let Some(text) = text {
            if !text.trim().is_empty() {
                let font = wm.font.as_deref().unwrap_or(&script.text_style.font);
                let fontfile = self.fonts.resolve(font);
                let stroke_color = wm
                    .stroke_color
                    .as_deref()
                    .unwrap_or(&script.text_style.stroke.color);
                let stroke_width = wm.stroke_width.unwrap_or(script.text_style.stroke.width);
                let x = format_position(&wm.position.x, DRAWTEXT_X, 1.0);
                let y = format_position(&wm.position.y, DRAWTEXT_Y, 1.0);
                let end = wm.duration_sec.max(0.1).min(total);
                label = self.push(
                    vec![label],
                    format!(
                        "drawtext=fontfile='{}':text='{}':fontsize={}:fontcolor={}:\
                         borderw={stroke_width}:bordercolor={stroke_color}:x={x}:y={y}:\
                         enable='between(t,0.00,{end:.2})'",
                        fontfile.display(),
                        escape_text(&text),
                        wm.fontsize,
                        wm.fill,
                    ),
                    "vwmtxt".to_string(),
                );
            }
        }
        label
    }

    fn apply_credits(&mut self, label: String) -> String {
        let script = self.script;
        let total = self.timeline.total_duration;
        let Some(credits) = &script.credits else {
            return label;
        };
        if !credits.enabled || credits.text.trim().is_empty() {
            return label;
        }

        let start = (total - CREDITS_LEAD_SEC).max(0.0);
        let end = total + CREDITS_TAIL_SEC;
        let fontsize =
            ((f64::from(script.text_style.fontsize) * 0.75) as u32).max(CREDITS_MIN_FONT);
        let fontfile = self.fonts.resolve(&script.text_style.font);
        let x = format_position(&credits.position.x, DRAWTEXT_X, 1.0);
        let y = format_position(&credits.position.y, DRAWTEXT_Y, 1.0);
        self.push(
            vec![label],
            format!(
                "drawtext=fontfile='{}':text='{}':fontsize={fontsize}:fontcolor=white:\
                 borderw=2:bordercolor=black:x={x}:y={y}:\
                 enable='between(t,{start:.2},{end:.2})'",
                fontfile.display(),
                escape_text(&credits.text),
            ),
            "vcred".to_string(),
        )
    }

    // ---- audio ----

    fn build_audio(&mut self) -> String {
        let script = self.script;
        let timeline = self.timeline;
        let total = timeline.total_duration.max(1.0);

        let mut narration = Vec::new();
        for tl in &timeline.sections {
            let Some(path) = &tl.audio_path else { continue };
            if !path.exists() {
                continue;
            }
            let idx = self.add_input(vec![], path.clone());
            let k = narration.len();
            let label = self.push(
                vec![format!("{idx}:a")],
                "aformat=sample_rates=48000:channel_layouts=stereo,asetpts=PTS-STARTPTS"
                    .to_string(),
                format!("nar{k}"),
            );
            narration.push(label);
        }

        let voice = if narration.is_empty() {
            self.push(
                vec![],
                format!(
                    "anullsrc=channel_layout=stereo:sample_rate=48000,\
                     atrim=duration={total:.3}"
                ),
                "voice".to_string(),
            )
        } else {
            let n = narration.len();
            self.push(narration, format!("concat=n={n}:v=0:a=1"), "voice".to_string())
        };

        let Some(bgm) = &script.bgm else {
            return voice;
        };
        let bgm_path = Path::new(&bgm.file);
        if !bgm_path.exists() {
            warn!(file = %bgm.file, "bgm file missing, narration only");
            return voice;
        }

        let idx = self.add_input(vec!["-stream_loop".into(), "-1".into()], bgm_path.to_path_buf());
        let pad = total + 1.0;
        let gain = db_to_linear(bgm.volume_db);
        let mut bgm_label = self.push(
            vec![format!("{idx}:a")],
            format!(
                "apad=pad_dur={pad:.3},atrim=duration={pad:.3},\
                 asetpts=PTS-STARTPTS,volume={gain:.4}"
            ),
            "bgm".to_string(),
        );

        // The narration drives the compressor, so the mix copy and the
        // sidechain copy must be distinct streams.
        let voice_for_mix = if bgm.ducking_db != 0.0 {
            self.stages.push(FilterStage::new(
                [voice],
                "asplit=2",
                ["voice_mix", "voice_sc"],
            ));
            bgm_label = self.push(
                vec![bgm_label, "voice_sc".to_string()],
                "sidechaincompress=threshold=-32dB:ratio=8:attack=5:release=250:makeup=0"
                    .to_string(),
                "bgm_duck".to_string(),
            );
            "voice_mix".to_string()
        } else {
            voice
        };

        self.push(
            vec![bgm_label, voice_for_mix],
            "amix=inputs=2:duration=longest:dropout_transition=0".to_string(),
            "aout".to_string(),
        )
    }
}

fn offset_expr(base: String, offset: u32) -> String {
    if offset == 0 {
        base
    } else {
        format!("{base}+{offset}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
