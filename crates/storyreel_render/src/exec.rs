//! Runs a validated plan through ffmpeg and reports progress parsed
//! from its stderr.

use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{RenderError, Result};
use crate::plan::RenderPlan;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderProgress {
    pub percent: f64,
    pub frame: u64,
    pub fps: f64,
    /// ffmpeg's reported speed string, e.g. "1.50x".
    pub speed: String,
    pub eta_seconds: Option<f64>,
}

/// Execute a render plan by spawning ffmpeg.
/// Sends progress updates via the channel.
pub async fn run(
    plan: &RenderPlan,
    progress_tx: watch::Sender<RenderProgress>,
    total_secs: f64,
) -> Result<()> {
    plan.validate()?;
    let args = plan.ffmpeg_args();
    debug!(args = ?args, "spawning ffmpeg");

    let mut child = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RenderError::FfmpegNotFound
            } else {
                RenderError::Io(e)
            }
        })?;

    let stderr = child.stderr.take().ok_or_else(|| {
        RenderError::Io(std::io::Error::other("ffmpeg stderr not captured"))
    })?;
    let mut lines = BufReader::new(stderr).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(progress) = parse_progress(&line, total_secs) {
            let _ = progress_tx.send(progress);
        }
    }

    let status = child.wait().await.map_err(RenderError::Io)?;
    if !status.success() {
        return Err(RenderError::FfmpegFailed {
            status: status.to_string(),
            command: format!("ffmpeg {}", args.join(" ")),
        });
    }

    info!(output = %plan.output_path.display(), "render complete");
    Ok(())
}

/// Parse an ffmpeg stderr progress line.
///
/// Example line: `frame=  123 fps= 60 ... time=00:01:02.05 speed=1.50x`
pub fn parse_progress(line: &str, total_secs: f64) -> Option<RenderProgress> {
    if !line.contains("time=") {
        return None;
    }

    let frame = extract_value(line, "frame=")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = extract_value(line, "fps=")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0);

    let speed = extract_value(line, "speed=").unwrap_or_default();

    let time_secs = extract_value(line, "time=")
        .and_then(|v| parse_time_str(&v))
        .unwrap_or(0.0);

    let percent = if total_secs > 0.0 {
        (time_secs / total_secs * 100.0).min(100.0)
    } else {
        0.0
    };

    let speed_factor = speed.trim_end_matches('x').parse::<f64>().unwrap_or(0.0);
    let eta_seconds = if speed_factor > 0.0 && total_secs > time_secs {
        Some((total_secs - time_secs) / speed_factor)
    } else {
        None
    };

    Some(RenderProgress {
        percent,
        frame,
        fps,
        speed,
        eta_seconds,
    })
}

/// Extract a value from an ffmpeg key=value progress line.
fn extract_value(line: &str, key: &str) -> Option<String> {
    let start = line.find(key)? + key.len();
    let rest = line[start..].trim_start();
    let end = rest
        .find(|c: char| c.is_whitespace())
        .unwrap_or(rest.len());
    let val = &rest[..end];
    if val.is_empty() {
        None
    } else {
        Some(val.to_string())
    }
}

/// Parse an ffmpeg time string like "00:01:02.05" into seconds.
fn parse_time_str(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let mins: f64 = parts[1].parse().ok()?;
    let secs: f64 = parts[2].parse().ok()?;
    Some(hours * 3600.0 + mins * 60.0 + secs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_progress_extracts_time_and_percent() {
        let line = "frame=  123 fps= 60 q=28.0 size=  1024kB time=00:00:05.00 bitrate=1677.7kbits/s speed=1.25x";
        let progress = parse_progress(line, 10.0).unwrap();
        assert_eq!(progress.frame, 123);
        assert!((progress.fps - 60.0).abs() < 1e-9);
        assert!((progress.percent - 50.0).abs() < 1e-9);
        assert_eq!(progress.speed, "1.25x");
        let eta = progress.eta_seconds.unwrap();
        assert!((eta - 4.0).abs() < 1e-9);
    }

    #[test]
    fn parse_progress_ignores_non_progress_lines() {
        assert!(parse_progress("Input #0, mov,mp4...", 10.0).is_none());
        assert!(parse_progress("Stream #0:0: Video: h264", 10.0).is_none());
        assert!(parse_progress("", 10.0).is_none());
    }

    #[test]
    fn parse_progress_handles_zero_total() {
        let line = "frame=  1 fps= 30 time=00:00:01.00 speed=1.00x";
        let progress = parse_progress(line, 0.0).unwrap();
        assert_eq!(progress.percent, 0.0);
        assert!(progress.eta_seconds.is_none());
    }

    #[test]
    fn percent_is_capped_at_100() {
        let line = "frame=  1 fps= 30 time=00:00:20.00 speed=1.00x";
        let progress = parse_progress(line, 10.0).unwrap();
        assert_eq!(progress.percent, 100.0);
    }

    #[test]
    fn parse_time_str_valid() {
        assert!((parse_time_str("00:01:02.05").unwrap() - 62.05).abs() < 0.001);
        assert!((parse_time_str("01:00:00.00").unwrap() - 3600.0).abs() < 0.001);
    }

    #[test]
    fn parse_time_str_invalid() {
        assert!(parse_time_str("1:02").is_none());
        assert!(parse_time_str("nonsense").is_none());
        assert!(parse_time_str("aa:bb:cc").is_none());
    }
}
