use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::Parser;
use layers::LayerId;
use runtime::frame::Frame;
use runtime::status::StatusLevel;
use scene::graph::{SceneGraph, SceneStats};
use scene::sink::FrameSink;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use viewer_native::Viewer;
use viewer_native::config::ViewerConfig;
use viewer_native::highlight::Flash;
use viewer_native::source::FileSource;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless globe viewer")]
struct Args {
    /// Viewer configuration (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory layer sources are resolved against (default: the config's directory)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Number of frames to run
    #[arg(long, default_value_t = 120)]
    frames: u64,

    /// Simulated frame rate
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Named region to focus before the first frame
    #[arg(long)]
    focus: Option<String>,

    /// Flash the focused region's outline
    #[arg(long)]
    flash: bool,

    /// Zoom in until at least this zoom factor
    #[arg(long)]
    zoom: Option<f64>,

    /// Extra layer ids to enable at start
    #[arg(long = "enable")]
    enable: Vec<String>,

    /// Log a scene summary every N frames
    #[arg(long, default_value_t = 30)]
    summary_every: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let args = Args::parse();
    if !(args.fps > 0.0) {
        return Err(format!("--fps must be positive (got {})", args.fps));
    }

    let config = match &args.config {
        Some(path) => ViewerConfig::load(path).map_err(|e| format!("{}: {e}", path.display()))?,
        None => ViewerConfig::default(),
    };
    let data_dir = args
        .data_dir
        .clone()
        .or_else(|| args.config.as_deref().and_then(Path::parent).map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    let source = Rc::new(FileSource::new(&data_dir));
    let mut viewer = Viewer::from_config(&config, source).map_err(|e| e.to_string())?;
    for id in &args.enable {
        viewer
            .enable_layer(&LayerId::new(id.clone()))
            .map_err(|e| e.to_string())?;
    }
    info!(
        layers = viewer.layers().len(),
        data_dir = %data_dir.display(),
        "viewer ready"
    );

    if let Some(region) = &args.focus {
        viewer.focus_region(region).map_err(|e| e.to_string())?;
        if args.flash {
            let flash = Flash::new(
                config.highlight.color,
                config.highlight.duration_ms,
            )
            .replacing(region.clone());
            if viewer
                .flash_region(region, flash)
                .map_err(|e| e.to_string())?
                .is_none()
            {
                warn!(region = %region, "region produced no highlight");
            }
        }
    }
    if let Some(target) = args.zoom {
        if !viewer.camera_mut().ensure_zoom_at_least(target, 64) {
            warn!(target, zoom = viewer.camera().zoom_factor(), "zoom target not reached");
        }
    }

    let mut sink = SummarySink {
        every: args.summary_every.max(1),
        last: SceneStats::default(),
    };
    let frame_ms = 1000.0 / args.fps;
    for i in 0..args.frames {
        viewer.tick(i as f64 * frame_ms, &mut sink);
        for notice in viewer.drain_notices() {
            match notice.level {
                StatusLevel::Info => info!(source = %notice.source, "{}", notice.message),
                StatusLevel::Warning | StatusLevel::Error => {
                    warn!(source = %notice.source, "{}", notice.message)
                }
            }
        }
    }

    for layer in viewer.layers() {
        info!(
            layer = %layer.id,
            kind = ?layer.kind,
            enabled = layer.enabled,
            objects = layer.owned_objects,
            "layer summary"
        );
    }
    let zoom = viewer.camera().zoom_factor();
    let tier = viewer.label_tier();
    info!(
        zoom,
        tier = tier.index,
        rank_cutoff = tier.rank_cutoff,
        label_cap = tier.label_cap,
        "finished"
    );
    viewer.shutdown();
    Ok(())
}

/// Logs scene statistics periodically and whenever they change.
struct SummarySink {
    every: u64,
    last: SceneStats,
}

impl FrameSink for SummarySink {
    fn present(&mut self, frame: &Frame, scene: &SceneGraph) {
        let stats = scene.stats();
        if stats != self.last || frame.index % self.every == 0 {
            info!(
                frame = frame.index,
                objects = stats.objects,
                lines = stats.lines,
                points = stats.points,
                meshes = stats.meshes,
                labels = stats.labels,
                vertices = stats.vertices,
                "scene"
            );
            self.last = stats;
        }
    }
}
