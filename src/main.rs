mod app;
mod snapshot;
mod util;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use app::{AppConfig, SimulationParams, ViewKind};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Snapshot JSON with points, results and optional edges.
    snapshot: PathBuf,

    #[arg(long, value_enum, default_value = "graph")]
    view: ViewKind,

    /// Highlight run speed multiplier, clamped to 0.5..=2.0.
    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    /// Many-body strength; negative values repel.
    #[arg(long, default_value_t = -200.0, allow_negative_numbers = true)]
    charge: f32,

    #[arg(long, default_value_t = 100.0)]
    link_distance: f32,

    #[arg(long, default_value_t = 50.0)]
    collide_radius: f32,

    #[arg(long, default_value_t = 0.05)]
    center_strength: f32,

    #[arg(long, default_value_t = 0.4)]
    velocity_decay: f32,
}

impl Args {
    fn config(&self) -> AppConfig {
        AppConfig {
            view: self.view,
            speed: app::clamp_speed(self.speed),
            params: SimulationParams {
                charge: self.charge,
                link_distance: self.link_distance.max(1.0),
                collide_radius: self.collide_radius.max(0.0),
                center_strength: self.center_strength.clamp(0.0, 1.0),
                velocity_decay: self.velocity_decay.clamp(0.0, 1.0),
                ..SimulationParams::default()
            },
        }
    }
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.config();
    tracing::info!(snapshot = %args.snapshot.display(), ?config, "starting");

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "docscape",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::DocscapeApp::new(
                cc,
                args.snapshot.clone(),
                config.clone(),
            )))
        }),
    )
}
