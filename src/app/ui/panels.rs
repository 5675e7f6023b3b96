use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

use eframe::egui::{self, Align, Context, Layout};
use tracing::{info, warn};

use crate::snapshot::Snapshot;

use super::super::graph::{ActiveView, ForceGraphView, ViewKind};
use super::super::interaction::ViewEvent;
use super::super::{AppConfig, ViewModel};

const RECENT_EVENTS: usize = 16;

impl ViewModel {
    pub(in crate::app) fn new(snapshot: Snapshot, config: &AppConfig, gl_available: bool) -> Self {
        let snapshot = Arc::new(snapshot);
        let mut model = Self {
            view: ActiveView::Graph(Box::new(ForceGraphView::new(
                Arc::clone(&snapshot),
                config.params,
            ))),
            snapshot,
            gl_available,
            cloud_unavailable_reported: false,
            params: config.params,
            speed: config.speed,
            search: String::new(),
            search_cache: None,
            hovered: None,
            recent_events: VecDeque::with_capacity(RECENT_EVENTS),
            notice: None,
        };
        if config.view != ViewKind::Graph {
            model.switch_view(config.view);
        }
        model
    }

    /// Tears the current view down and mounts `kind`. A view that cannot be
    /// mounted falls back to the force graph.
    pub(in crate::app) fn switch_view(&mut self, kind: ViewKind) {
        if self.view.kind() == kind {
            return;
        }
        self.view.teardown();
        self.hovered = None;

        self.view = match ActiveView::mount(kind, &self.snapshot, self.params, self.gl_available) {
            Ok(view) => view,
            Err(error) => {
                if !self.cloud_unavailable_reported {
                    warn!(view = kind.label(), %error, "falling back to the force graph");
                    self.cloud_unavailable_reported = true;
                }
                self.notice = Some(format!("{error}. Showing the force graph instead."));
                ActiveView::Graph(Box::new(ForceGraphView::new(
                    Arc::clone(&self.snapshot),
                    self.params,
                )))
            }
        };
    }

    pub(in crate::app) fn start_animation(&mut self, now: f64) {
        let accepted = self
            .view
            .context_mut()
            .start_sequence(&self.snapshot.results, self.speed, now);
        if accepted {
            self.notice = None;
        } else if self.view.context().sequencer.is_animating() {
            self.notice = Some("A highlight run is already in progress.".to_owned());
        }
    }

    fn collect_events(&mut self) {
        for event in self.view.context_mut().take_events() {
            match &event {
                ViewEvent::Hover(id) => self.hovered.clone_from(id),
                ViewEvent::AnimationComplete => info!("highlight run complete"),
                ViewEvent::DragStart { .. } | ViewEvent::DragMove { .. } | ViewEvent::DragEnd { .. } => {}
            }

            // Consecutive moves of one drag collapse into a single entry.
            let same_drag = matches!(
                (self.recent_events.back(), &event),
                (Some(ViewEvent::DragMove { id: last, .. }), ViewEvent::DragMove { id, .. }) if last == id
            );
            if same_drag {
                self.recent_events.pop_back();
            }
            if self.recent_events.len() == RECENT_EVENTS {
                self.recent_events.pop_front();
            }
            self.recent_events.push_back(event);
        }
    }

    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        snapshot_path: &Path,
        reload_requested: &mut bool,
        is_loading: bool,
    ) {
        let matches = self.search_matches();

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("docscape");
                    ui.separator();
                    ui.label(format!("snapshot: {}", snapshot_path.display()));
                    ui.label(format!("points: {}", self.snapshot.point_count()));
                    ui.label(format!("results: {}", self.snapshot.results.len()));
                    ui.separator();

                    let mut requested = self.view.kind();
                    for kind in ViewKind::ALL {
                        ui.selectable_value(&mut requested, kind, kind.label());
                    }
                    if requested != self.view.kind() {
                        self.switch_view(requested);
                    }

                    ui.separator();
                    let reload_button = ui.add_enabled(!is_loading, egui::Button::new("Reload"));
                    if reload_button.clicked() {
                        *reload_requested = true;
                    }

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if let Some(status) = self.status_text() {
                            ui.label(status);
                        }
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                if let Some(notice) = &self.notice {
                    ui.colored_label(egui::Color32::from_rgb(245, 206, 93), notice);
                }
                self.view.show(ui, &matches);
            });

        self.collect_events();
    }

    fn status_text(&self) -> Option<String> {
        match &self.view {
            ActiveView::Graph(view) => {
                let simulation = view.simulation();
                Some(format!(
                    "{} · alpha {:.3} · ticks {}",
                    simulation.phase().label(),
                    simulation.alpha(),
                    simulation.ticks()
                ))
            }
            ActiveView::Scatter(_) => None,
            ActiveView::Cloud(view) => {
                let skipped = view.scene().skipped();
                (skipped > 0).then(|| format!("{skipped} points without depth hidden"))
            }
        }
    }

    pub(in crate::app) fn search_matches(&mut self) -> Arc<HashSet<String>> {
        self.refresh_search_cache();
        self.search_cache
            .as_ref()
            .map(|cache| Arc::clone(&cache.matches))
            .unwrap_or_default()
    }
}
