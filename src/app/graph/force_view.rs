use std::collections::HashSet;
use std::sync::Arc;

use eframe::egui::{self, CursorIcon, PointerButton, Pos2, Rect, Sense, Stroke, Ui, Vec2};
use tracing::debug;

use crate::app::interaction::{DragState, ViewEvent, Viewport, hit_disc};
use crate::app::physics::{Phase, SimLink, Simulation, SimulationParams};
use crate::app::scale::{Extent2, ScaleMapper2};
use crate::app::scene::style::{
    RESULT_COLOR, VisualScheme, circle_visible, draw_background, edge_stroke, node_visual,
    segment_visible,
};
use crate::app::scene::{EdgeSpec, NodeSpec, Scene2d};
use crate::snapshot::Snapshot;

use super::build::graph_edges;
use super::{ViewContext, frame_visual, paint_floating_labels, paint_node, point_traits};

fn graph_caption(label: &str, strength: Option<f32>) -> String {
    match strength {
        Some(strength) => format!("{label} ({strength:.2})"),
        None => label.to_owned(),
    }
}

pub(crate) struct ForceGraphView {
    snapshot: Arc<Snapshot>,
    simulation: Simulation,
    scene: Scene2d,
    viewport: Viewport,
    drag: Option<DragState>,
    context: ViewContext,
    frame: u64,
    overlay_seen: bool,
}

impl ForceGraphView {
    pub(crate) fn new(snapshot: Arc<Snapshot>, params: SimulationParams) -> Self {
        let extent = Extent2::GRAPH;
        let mapper = ScaleMapper2::fit(&snapshot.points, extent);
        let positions = snapshot
            .points
            .iter()
            .map(|point| mapper.project(point).to_vec2())
            .collect::<Vec<_>>();

        let mut scene = Scene2d::new(VisualScheme::Graph);
        let overlay = crate::app::sequencer::SequenceOverlay::default();
        let specs = snapshot
            .points
            .iter()
            .zip(&positions)
            .map(|(point, position)| NodeSpec {
                id: &point.id,
                label: &point.label,
                caption: graph_caption(&point.label, snapshot.strength_of(&point.id)),
                position: position.to_pos2(),
                traits: point_traits(&snapshot, &overlay, &point.id, false),
            })
            .collect::<Vec<_>>();
        scene.sync(&specs);

        let edges = graph_edges(&snapshot);
        let edge_specs = edges
            .iter()
            .map(|edge| EdgeSpec {
                source: &snapshot.points[edge.source].id,
                target: &snapshot.points[edge.target].id,
                emphasis: edge.emphasis,
            })
            .collect::<Vec<_>>();
        scene.sync_edges(&edge_specs);

        let radii = scene.nodes().map(|node| node.visual.radius).collect::<Vec<_>>();
        let links = edges
            .iter()
            .map(|edge| SimLink {
                source: edge.source,
                target: edge.target,
                rest_length: edge.rest_length,
            })
            .collect();
        let simulation = Simulation::new(&positions, &radii, links, params);
        debug!(
            nodes = positions.len(),
            links = edges.len(),
            forces = ?simulation.force_names().collect::<Vec<_>>(),
            "force graph built"
        );

        Self {
            snapshot,
            simulation,
            scene,
            viewport: Viewport::new(extent.center()),
            drag: None,
            context: ViewContext::default(),
            frame: 0,
            overlay_seen: false,
        }
    }

    pub(crate) fn context(&self) -> &ViewContext {
        &self.context
    }

    pub(crate) fn context_mut(&mut self) -> &mut ViewContext {
        &mut self.context
    }

    pub(crate) fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub(crate) fn set_params(&mut self, params: SimulationParams) {
        self.simulation.set_params(params);
    }

    pub(crate) fn reheat(&mut self) {
        self.simulation.reheat();
    }

    /// Recomputes every node's traits after a highlight change or pin.
    fn refresh_traits(&mut self) {
        let overlay = &self.context.overlay;
        for (point, node) in self.snapshot.points.iter().zip(self.simulation.nodes()) {
            let traits = point_traits(&self.snapshot, overlay, &point.id, node.pinned);
            self.scene.set_traits(&point.id, traits);
        }
    }

    fn node_under(&self, rect: Rect, pointer: Pos2) -> Option<usize> {
        let zoom = self.viewport.zoom;
        hit_disc(
            pointer,
            self.scene.nodes().enumerate().map(|(index, node)| {
                (
                    index,
                    self.viewport.to_screen(rect, node.position),
                    node.visual.radius * zoom,
                )
            }),
        )
    }

    fn handle_pointer(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) {
        let pointer = ui.input(|input| input.pointer.hover_pos());

        if response.hovered() {
            let scroll = ui.input(|input| input.raw_scroll_delta.y);
            if scroll.abs() > f32::EPSILON {
                let anchor = pointer.unwrap_or_else(|| rect.center());
                self.viewport
                    .zoom_at(rect, anchor, Viewport::scroll_factor(scroll));
            }
        }

        if response.drag_started_by(PointerButton::Primary)
            && let Some(pointer) = pointer
            && let Some(index) = self.node_under(rect, pointer)
        {
            let id = self.snapshot.points[index].id.clone();
            let world = self.viewport.to_world(rect, pointer);
            self.simulation.pin(index);
            self.simulation.drag_to(index, world.to_vec2());
            self.context.emit(ViewEvent::DragStart {
                id: id.clone(),
                position: world,
            });
            self.drag = Some(DragState { index, id });
            self.refresh_traits();
        }

        match &self.drag {
            Some(drag) if response.dragged_by(PointerButton::Primary) => {
                if let Some(pointer) = pointer {
                    let world = self.viewport.to_world(rect, pointer);
                    self.simulation.drag_to(drag.index, world.to_vec2());
                    if response.drag_delta() != Vec2::ZERO {
                        self.context.emit(ViewEvent::DragMove {
                            id: drag.id.clone(),
                            position: world,
                        });
                    }
                }
            }
            Some(_) => {}
            None => {
                if response.dragged_by(PointerButton::Primary)
                    || response.dragged_by(PointerButton::Secondary)
                    || response.dragged_by(PointerButton::Middle)
                {
                    self.viewport.pan_by(response.drag_delta());
                }
            }
        }

        if response.drag_stopped()
            && let Some(drag) = self.drag.take()
        {
            self.simulation.unpin(drag.index);
            let position = self
                .simulation
                .nodes()
                .get(drag.index)
                .map(|node| node.position.to_pos2())
                .unwrap_or_default();
            self.context.emit(ViewEvent::DragEnd {
                id: drag.id,
                position,
            });
            self.refresh_traits();
        }

        let hovered = if let Some(drag) = &self.drag {
            Some(drag.index)
        } else {
            pointer
                .filter(|_| response.hovered())
                .and_then(|pointer| self.node_under(rect, pointer))
        };
        let hovered_id = hovered.map(|index| self.snapshot.points[index].id.clone());
        if let Some(change) = self.context.hover(hovered_id.as_deref()) {
            if let Some(left) = &change.left {
                self.scene.set_focused(left, false);
            }
            if let Some(entered) = &change.entered {
                self.scene.set_focused(entered, true);
            }
        }
        if self.drag.is_some() {
            ui.ctx().set_cursor_icon(CursorIcon::Grabbing);
        } else if hovered.is_some() {
            ui.ctx().set_cursor_icon(CursorIcon::Grab);
        }
    }

    /// Integrates at the rate the current phase asks for.
    fn step_simulation(&mut self) -> bool {
        self.frame = self.frame.wrapping_add(1);
        let Some(interval) = self.simulation.phase().tick_interval() else {
            return false;
        };
        if self.frame % interval != 0 {
            return true;
        }
        self.simulation.tick();
        self.scene
            .write_positions(self.simulation.positions().map(|position| position.to_pos2()));
        self.simulation.phase() != Phase::Idle
    }

    pub(crate) fn show(&mut self, ui: &mut Ui, search_matches: &HashSet<String>) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        let now = ui.input(|input| input.time);

        let animating = self.context.advance(now);
        if animating || self.overlay_seen != self.context.overlay.is_active() {
            self.overlay_seen = self.context.overlay.is_active();
            self.refresh_traits();
        }

        self.handle_pointer(ui, rect, &response);
        let moving = self.step_simulation();

        draw_background(&painter, rect, self.viewport.origin(rect), self.viewport.zoom);
        if self.snapshot.point_count() == 0 {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "No points to lay out",
                egui::FontId::proportional(16.0),
                egui::Color32::from_gray(170),
            );
            return;
        }

        self.paint(&painter, rect, ui, search_matches, now);

        if moving || animating || self.drag.is_some() {
            ui.ctx().request_repaint();
        }
    }

    fn paint(
        &self,
        painter: &egui::Painter,
        rect: Rect,
        ui: &Ui,
        search_matches: &HashSet<String>,
        now: f64,
    ) {
        let viewport = &self.viewport;
        let zoom = viewport.zoom;
        let overlay = &self.context.overlay;

        for edge in self.scene.edges() {
            let (Some(from), Some(to)) = (self.scene.slot(edge.from), self.scene.slot(edge.to)) else {
                continue;
            };
            let start = viewport.to_screen(rect, from.position);
            let end = viewport.to_screen(rect, to.position);
            if segment_visible(rect, start, end) {
                painter.line_segment([start, end], edge_stroke(edge.emphasis, zoom));
            }
        }

        for (from, to) in overlay.connectors() {
            let (Some(from), Some(to)) = (self.scene.get(from), self.scene.get(to)) else {
                continue;
            };
            painter.line_segment(
                [
                    viewport.to_screen(rect, from.position),
                    viewport.to_screen(rect, to.position),
                ],
                Stroke::new(2.5, RESULT_COLOR),
            );
        }

        // Highlighted nodes last so they sit on top.
        let mut ordered = self.scene.nodes().collect::<Vec<_>>();
        ordered.sort_by_key(|node| (node.traits.highlighted, node.focused));
        for node in ordered {
            let visual = frame_visual(ui, VisualScheme::Graph, node, overlay, now);
            let center = viewport.to_screen(rect, node.position);
            if !circle_visible(rect, center, visual.radius * zoom + 200.0) {
                continue;
            }
            paint_node(
                painter,
                center,
                &visual,
                &node.caption,
                zoom,
                search_matches.contains(&node.id),
            );
        }

        paint_floating_labels(painter, overlay, now, |id| {
            let node = self.scene.get(id)?;
            let radius = node_visual(VisualScheme::Graph, node.traits).radius
                * overlay.pulse_scale(id, now)
                * zoom;
            Some((viewport.to_screen(rect, node.position), radius))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{PointInput, ResultEntry};

    fn view() -> ForceGraphView {
        let points = (0..6)
            .map(|index| PointInput {
                id: format!("doc{index}"),
                label: format!("Document {index}"),
                content: String::new(),
                x: index as f32,
                y: (index * index) as f32,
                z: None,
            })
            .collect();
        let results = vec![
            ResultEntry {
                id: "doc2".to_owned(),
                strength: 0.75,
            },
            ResultEntry {
                id: "doc4".to_owned(),
                strength: 0.5,
            },
        ];
        let (snapshot, _) = Snapshot::from_parts(points, results, None);
        ForceGraphView::new(Arc::new(snapshot), SimulationParams::default())
    }

    #[test]
    fn builds_one_primitive_per_point_and_star_edges() {
        let view = view();
        assert_eq!(view.scene.len(), 6);
        // 5 + 5 minus the shared doc2-doc4 link.
        assert_eq!(view.scene.edges().len(), 9);
        assert_eq!(
            view.scene.get("doc2").map(|node| node.caption.as_str()),
            Some("Document 2 (0.75)")
        );
        assert_eq!(view.simulation().phase(), Phase::Running);
    }

    #[test]
    fn collision_radius_covers_the_visual_radius() {
        let view = view();
        for (node, primitive) in view.simulation().nodes().iter().zip(view.scene.nodes()) {
            assert!(node.radius >= primitive.visual.radius);
        }
    }

    #[test]
    fn ticks_write_positions_into_the_scene() {
        let mut view = view();
        let before = view.scene.get("doc0").map(|node| node.position);
        for _ in 0..4 {
            view.step_simulation();
        }
        let after = view.scene.get("doc0").map(|node| node.position);
        assert_ne!(before, after);
        let simulated = view.simulation().nodes()[0].position.to_pos2();
        assert_eq!(after, Some(simulated));
    }

    #[test]
    fn pinning_is_reflected_in_traits() {
        let mut view = view();
        view.simulation.pin(1);
        view.refresh_traits();
        assert!(view.scene.get("doc1").is_some_and(|node| node.traits.pinned));

        view.simulation.unpin(1);
        view.refresh_traits();
        assert!(view.scene.get("doc1").is_some_and(|node| !node.traits.pinned));
    }
}
