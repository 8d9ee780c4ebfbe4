//! Command-line driver: script + narration directory in, finished
//! video (plus SRT captions and a metadata sidecar) out.

use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use storyreel_core::captions;
use storyreel_core::script::Script;
use storyreel_core::timeline;
use storyreel_render::assemble::{assemble, AssembleOptions, TextMode};
use storyreel_render::exec::{self, RenderProgress};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 4 {
        bail!("usage: {} <script.json> <audio_dir> <output.mp4>", args[0]);
    }
    let script_path = PathBuf::from(&args[1]);
    let audio_dir = PathBuf::from(&args[2]);
    let output_path = PathBuf::from(&args[3]);

    let script = Script::load_from_file(&script_path)
        .with_context(|| format!("loading {}", script_path.display()))?;
    let timeline = timeline::build_timeline(&script, &audio_dir)?;
    info!(
        sections = timeline.sections.len(),
        total_sec = timeline.total_duration,
        "timeline resolved"
    );

    let cache_dir = output_path
        .parent()
        .map(|p| p.join("text_cache"))
        .unwrap_or_else(|| PathBuf::from("text_cache"));
    let opts = AssembleOptions {
        text_mode: TextMode::Raster,
        cache_dir: cache_dir.clone(),
        output_path: output_path.clone(),
    };
    let plan = assemble(&script, &timeline, &opts)?;
    info!(
        inputs = plan.inputs.len(),
        stages = plan.stages.len(),
        "render plan assembled"
    );

    if script.output.srt {
        let srt_path = output_path.with_extension("srt");
        captions::write_srt(&timeline, &srt_path)?;
        info!(path = %srt_path.display(), "captions written");
    }
    let meta_path = output_path.with_extension("json");
    captions::write_metadata(&script, &timeline, &meta_path, Some(&cache_dir))?;
    info!(path = %meta_path.display(), "metadata written");

    let (progress_tx, mut progress_rx) = tokio::sync::watch::channel(RenderProgress::default());
    let reporter = tokio::spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let p = progress_rx.borrow().clone();
            info!(
                percent = p.percent,
                frame = p.frame,
                speed = %p.speed,
                "rendering"
            );
        }
    });

    let result = exec::run(&plan, progress_tx, timeline.total_duration).await;
    let _ = reporter.await;
    result?;

    info!(output = %output_path.display(), "done");
    Ok(())
}
