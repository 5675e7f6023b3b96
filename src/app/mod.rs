use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use eframe::egui::{self, Context};
use tracing::{error, info};

use crate::snapshot::{Snapshot, load_snapshot};

mod camera;
mod graph;
mod interaction;
mod physics;
mod scale;
mod scene;
mod sequencer;
mod ui;

pub(crate) use graph::ViewKind;
pub(crate) use physics::SimulationParams;
pub(crate) use sequencer::clamp_speed;

use graph::ActiveView;
use interaction::ViewEvent;

/// Startup settings taken from the command line.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) view: ViewKind,
    pub(crate) speed: f32,
    pub(crate) params: SimulationParams,
}

pub struct DocscapeApp {
    snapshot_path: PathBuf,
    config: AppConfig,
    gl_available: bool,
    state: AppState,
    reload_rx: Option<Receiver<Result<Snapshot, String>>>,
}

enum AppState {
    Loading {
        rx: Receiver<Result<Snapshot, String>>,
    },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    snapshot: Arc<Snapshot>,
    view: ActiveView,
    gl_available: bool,
    cloud_unavailable_reported: bool,
    params: SimulationParams,
    speed: f32,
    search: String,
    search_cache: Option<SearchCache>,
    hovered: Option<String>,
    recent_events: VecDeque<ViewEvent>,
    notice: Option<String>,
}

struct SearchCache {
    query: String,
    matches: Arc<HashSet<String>>,
    ranked: Vec<(i64, usize)>,
}

impl DocscapeApp {
    pub fn new(cc: &eframe::CreationContext<'_>, snapshot_path: PathBuf, config: AppConfig) -> Self {
        let gl_available = cc.gl.is_some();
        if !gl_available {
            info!("no GL context, the 3D view will be unavailable");
        }
        let state = Self::start_load(snapshot_path.clone());
        Self {
            snapshot_path,
            config,
            gl_available,
            state,
            reload_rx: None,
        }
    }

    fn spawn_load(snapshot_path: PathBuf) -> Receiver<Result<Snapshot, String>> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = load_snapshot(&snapshot_path).map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(snapshot_path: PathBuf) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(snapshot_path),
        }
    }

    fn ready(&self, snapshot: Snapshot) -> AppState {
        AppState::Ready(Box::new(ViewModel::new(
            snapshot,
            &self.config,
            self.gl_available,
        )))
    }
}

impl eframe::App for DocscapeApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(result) => {
                        transition = Some(result);
                    }
                    Err(TryRecvError::Empty) => ctx.request_repaint(),
                    Err(TryRecvError::Disconnected) => {
                        transition = Some(Err("Background load worker disconnected".to_owned()));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading snapshot...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                let mut retry = false;
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load snapshot");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    retry = ui.button("Retry").clicked();
                });
                if retry {
                    self.state = Self::start_load(self.snapshot_path.clone());
                    return;
                }
            }
            AppState::Ready(model) => {
                let mut reload_requested = false;
                let is_reloading = self.reload_rx.is_some();
                model.show(ctx, &self.snapshot_path, &mut reload_requested, is_reloading);

                if reload_requested && self.reload_rx.is_none() {
                    self.reload_rx = Some(Self::spawn_load(self.snapshot_path.clone()));
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        Ok(result) => transition = Some(result),
                        Err(TryRecvError::Empty) => {
                            self.reload_rx = Some(rx);
                            ctx.request_repaint();
                        }
                        Err(TryRecvError::Disconnected) => {
                            transition =
                                Some(Err("Background load worker disconnected".to_owned()));
                        }
                    }
                }
            }
        }

        if let Some(result) = transition {
            if let AppState::Ready(model) = &mut self.state {
                model.view.teardown();
            }
            self.reload_rx = None;
            self.state = match result {
                Ok(snapshot) => self.ready(snapshot),
                Err(message) => {
                    error!(path = %self.snapshot_path.display(), %message, "snapshot load failed");
                    AppState::Error(message)
                }
            };
        }
    }
}
