//! Typed render plan: inputs, filter-graph stages, and the final
//! encode arguments. The graph is held as structured stage records
//! rather than one pre-joined string, so wiring can be validated and
//! inspected before anything is handed to ffmpeg.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};

/// One filter node: named input pads, a filter expression, named
/// output pads. Most stages have exactly one output; `asplit` and
/// friends produce several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterStage {
    pub inputs: Vec<String>,
    pub filter: String,
    pub outputs: Vec<String>,
}

impl FilterStage {
    pub fn new(
        inputs: impl IntoIterator<Item = impl Into<String>>,
        filter: impl Into<String>,
        outputs: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            filter: filter.into(),
            outputs: outputs.into_iter().map(Into::into).collect(),
        }
    }
}

/// One `-i` input together with the arguments that must precede it
/// (`-loop`, `-stream_loop`, `-t`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderInput {
    pub index: usize,
    pub pre_args: Vec<String>,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    pub inputs: Vec<RenderInput>,
    pub stages: Vec<FilterStage>,
    /// Label of the pad mapped to the video stream.
    pub video_out: String,
    /// Label of the pad mapped to the audio stream.
    pub audio_out: String,
    pub fps: u32,
    pub output_path: PathBuf,
}

impl RenderPlan {
    /// Check that every stage input is either an external stream pad
    /// (`N:v` / `N:a` for a declared input) or the output of an
    /// earlier stage, that no label is produced twice, and that both
    /// mapped pads exist. Since stages only consume labels defined
    /// earlier, a plan that validates is also acyclic.
    pub fn validate(&self) -> Result<()> {
        let mut defined: Vec<&str> = Vec::new();
        for stage in &self.stages {
            for input in &stage.inputs {
                let external = self.is_external_pad(input);
                if !external && !defined.contains(&input.as_str()) {
                    return Err(RenderError::UndefinedLabel(input.clone()));
                }
            }
            for output in &stage.outputs {
                if defined.contains(&output.as_str()) {
                    return Err(RenderError::DuplicateLabel(output.clone()));
                }
                defined.push(output.as_str());
            }
        }
        for mapped in [&self.video_out, &self.audio_out] {
            if !defined.contains(&mapped.as_str()) {
                return Err(RenderError::MissingOutput(mapped.clone()));
            }
        }
        Ok(())
    }

    fn is_external_pad(&self, label: &str) -> bool {
        let Some((idx, stream)) = label.split_once(':') else {
            return false;
        };
        if !matches!(stream, "v" | "a") {
            return false;
        }
        match idx.parse::<usize>() {
            Ok(i) => i < self.inputs.len(),
            Err(_) => false,
        }
    }

    /// Serialize the stages into a `-filter_complex` expression.
    pub fn filter_complex(&self) -> String {
        self.stages
            .iter()
            .map(|stage| {
                let ins: String = stage.inputs.iter().map(|l| format!("[{l}]")).collect();
                let outs: String = stage.outputs.iter().map(|l| format!("[{l}]")).collect();
                format!("{ins}{}{outs}", stage.filter)
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Full ffmpeg argument list for this plan.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into()];
        for input in &self.inputs {
            args.extend(input.pre_args.iter().cloned());
            args.push("-i".into());
            args.push(input.path.to_string_lossy().into_owned());
        }
        args.push("-filter_complex".into());
        args.push(self.filter_complex());
        args.extend([
            "-map".into(),
            format!("[{}]", self.video_out),
            "-map".into(),
            format!("[{}]", self.audio_out),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "medium".into(),
            "-crf".into(),
            "18".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-r".into(),
            self.fps.to_string(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "192k".into(),
            "-ar".into(),
            "48000".into(),
            "-shortest".into(),
        ]);
        args.push(self.output_path.to_string_lossy().into_owned());
        args
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
