use std::collections::HashSet;
use std::sync::Arc;

use eframe::egui::{self, RichText, Ui};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::util::clip_label;

use super::super::graph::ActiveView;
use super::super::physics::SimulationParams;
use super::super::sequencer::{MAX_SPEED, MIN_SPEED};
use super::super::{SearchCache, ViewModel};

const SEARCH_ROWS: usize = 12;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_lowercase(), &query.to_lowercase()))
}

/// Ranked `(score, point index)` pairs for every label matching `query`.
pub(in crate::app) fn rank_labels<'a>(
    labels: impl IntoIterator<Item = &'a str>,
    query: &str,
) -> Vec<(i64, usize)> {
    let matcher = SkimMatcherV2::default();
    let mut ranked = labels
        .into_iter()
        .enumerate()
        .filter_map(|(index, label)| {
            fuzzy_match_score(&matcher, label, query).map(|score| (score, index))
        })
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    ranked
}

impl ViewModel {
    pub(in crate::app) fn refresh_search_cache(&mut self) {
        let query = self.search.trim();
        if query.is_empty() {
            self.search_cache = None;
            return;
        }
        if self
            .search_cache
            .as_ref()
            .is_some_and(|cache| cache.query == query)
        {
            return;
        }

        let ranked = rank_labels(
            self.snapshot.points.iter().map(|point| point.label.as_str()),
            query,
        );
        let matches = ranked
            .iter()
            .map(|&(_, index)| self.snapshot.points[index].id.clone())
            .collect::<HashSet<_>>();
        self.search_cache = Some(SearchCache {
            query: query.to_owned(),
            matches: Arc::new(matches),
            ranked,
        });
    }

    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.heading("Highlight run");
            ui.add_space(4.0);
            ui.add(
                egui::Slider::new(&mut self.speed, MIN_SPEED..=MAX_SPEED)
                    .step_by(0.1)
                    .text("speed")
                    .suffix("×"),
            );
            let animating = self.view.context().sequencer.is_animating();
            let has_results = !self.snapshot.results.is_empty();
            ui.horizontal(|ui| {
                let animate = ui.add_enabled(
                    !animating && has_results,
                    egui::Button::new(if animating { "Animating..." } else { "Animate results" }),
                );
                if animate.clicked() {
                    let now = ui.input(|input| input.time);
                    self.start_animation(now);
                }
                if ui
                    .add_enabled(animating, egui::Button::new("Stop"))
                    .clicked()
                {
                    self.view.context_mut().sequencer.cancel();
                }
            });
            if !has_results {
                ui.small("This snapshot has no results to walk through.");
            }

            ui.separator();
            self.draw_search(ui);

            if let ActiveView::Graph(view) = &mut self.view {
                ui.separator();
                ui.heading("Physics");
                ui.add_space(4.0);

                let mut params = self.params;
                physics_sliders(ui, &mut params);
                if params != self.params {
                    self.params = params;
                    view.set_params(params);
                }

                ui.horizontal(|ui| {
                    if ui.button("Reheat layout").clicked() {
                        view.reheat();
                    }
                    if ui.button("Defaults").clicked() {
                        let defaults = SimulationParams {
                            center: self.params.center,
                            ..SimulationParams::default()
                        };
                        self.params = defaults;
                        view.set_params(defaults);
                    }
                });

                let simulation = view.simulation();
                ui.small(format!(
                    "{} · kinetic energy {:.2}",
                    simulation.phase().label(),
                    simulation.kinetic_energy()
                ));
            }

            ui.separator();
            ui.label(RichText::new("Navigation").strong());
            ui.small("Drag a node to pin it; release to let it rejoin the layout.");
            ui.small("Drag the background to pan, scroll to zoom.");
            ui.small("In the 3D view, drag to orbit and right-drag to pan.");
        });
    }

    fn draw_search(&mut self, ui: &mut Ui) {
        ui.heading("Search labels");
        ui.add_space(4.0);
        ui.add(
            egui::TextEdit::singleline(&mut self.search)
                .hint_text("fuzzy match")
                .desired_width(f32::INFINITY),
        );
        self.refresh_search_cache();

        let Some(cache) = &self.search_cache else {
            return;
        };
        if cache.ranked.is_empty() {
            ui.small("No labels match.");
            return;
        }
        ui.small(format!("{} matching points", cache.ranked.len()));
        for &(score, index) in cache.ranked.iter().take(SEARCH_ROWS) {
            let point = &self.snapshot.points[index];
            ui.horizontal(|ui| {
                ui.label(clip_label(&point.label, 32).into_owned());
                ui.small(format!("{score}"));
            });
        }
    }
}

fn physics_sliders(ui: &mut Ui, params: &mut SimulationParams) {
    ui.add(egui::Slider::new(&mut params.charge, -1000.0..=0.0).text("charge"));
    ui.add(egui::Slider::new(&mut params.link_distance, 10.0..=400.0).text("link distance"));
    ui.add(egui::Slider::new(&mut params.collide_radius, 0.0..=120.0).text("collide radius"));
    ui.add(egui::Slider::new(&mut params.center_strength, 0.0..=1.0).text("center pull"));
    ui.add(egui::Slider::new(&mut params.velocity_decay, 0.05..=0.95).text("velocity decay"));
}
