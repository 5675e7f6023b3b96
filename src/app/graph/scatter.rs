use std::collections::HashSet;
use std::sync::Arc;

use eframe::egui::{
    self, Align2, Color32, FontId, PointerButton, Pos2, Rect, Sense, Stroke, Ui, pos2, vec2,
};

use crate::app::interaction::{Viewport, hit_disc};
use crate::app::scale::{Extent2, ScaleMapper2};
use crate::app::scene::style::{
    DOCUMENT_COLOR, RESULT_COLOR, VisualScheme, draw_background, edge_stroke, with_opacity,
};
use crate::app::scene::{NodeSpec, Scene2d};
use crate::snapshot::Snapshot;

use super::build::result_connectors;
use super::{ViewContext, frame_visual, paint_floating_labels, paint_node, point_traits};

/// Input coordinates drawn as-is, results linked pairwise.
pub(crate) struct ScatterView {
    snapshot: Arc<Snapshot>,
    scene: Scene2d,
    mapper: ScaleMapper2,
    connectors: Vec<(usize, usize)>,
    viewport: Viewport,
    context: ViewContext,
    overlay_seen: bool,
}

impl ScatterView {
    pub(crate) fn new(snapshot: Arc<Snapshot>) -> Self {
        let extent = Extent2::GRAPH;
        let mapper = ScaleMapper2::fit(&snapshot.points, extent);
        let mut view = Self {
            scene: Scene2d::new(VisualScheme::Scatter),
            mapper,
            connectors: result_connectors(&snapshot),
            viewport: Viewport::new(extent.center()),
            context: ViewContext::default(),
            overlay_seen: false,
            snapshot,
        };

        let specs = view
            .snapshot
            .points
            .iter()
            .map(|point| NodeSpec {
                id: &point.id,
                label: &point.label,
                caption: match view.snapshot.strength_of(&point.id) {
                    Some(strength) => format!("{} ({strength:.3})", point.label),
                    None => point.label.clone(),
                },
                position: mapper.project(point),
                traits: point_traits(&view.snapshot, &view.context.overlay, &point.id, false),
            })
            .collect::<Vec<_>>();
        view.scene.sync(&specs);
        view
    }

    pub(crate) fn context(&self) -> &ViewContext {
        &self.context
    }

    pub(crate) fn context_mut(&mut self) -> &mut ViewContext {
        &mut self.context
    }

    fn refresh_traits(&mut self) {
        for point in &self.snapshot.points {
            let traits = point_traits(&self.snapshot, &self.context.overlay, &point.id, false);
            self.scene.set_traits(&point.id, traits);
        }
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
        if response.dragged_by(PointerButton::Primary)
            || response.dragged_by(PointerButton::Secondary)
            || response.dragged_by(PointerButton::Middle)
        {
            self.viewport.pan_by(response.drag_delta());
        }

        let zoom = self.viewport.zoom;
        let hovered = pointer.filter(|_| response.hovered()).and_then(|pointer| {
            hit_disc(
                pointer,
                self.scene.nodes().enumerate().map(|(index, node)| {
                    let radius = node.effective_visual(VisualScheme::Scatter).radius;
                    (index, self.viewport.to_screen(rect, node.position), radius * zoom)
                }),
            )
        });
        let hovered_id = hovered.map(|index| self.snapshot.points[index].id.clone());
        if let Some(change) = self.context.hover(hovered_id.as_deref()) {
            if let Some(left) = &change.left {
                self.scene.set_focused(left, false);
            }
            if let Some(entered) = &change.entered {
                self.scene.set_focused(entered, true);
            }
        }
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

        let viewport = self.viewport;
        let zoom = viewport.zoom;
        let overlay = &self.context.overlay;
        draw_background(&painter, rect, viewport.origin(rect), zoom);

        if !overlay.is_active() {
            for &(from, to) in &self.connectors {
                let from = &self.snapshot.points[from].id;
                let to = &self.snapshot.points[to].id;
                let (Some(from), Some(to)) = (self.scene.get(from), self.scene.get(to)) else {
                    continue;
                };
                painter.line_segment(
                    [
                        viewport.to_screen(rect, from.position),
                        viewport.to_screen(rect, to.position),
                    ],
                    edge_stroke(true, zoom),
                );
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

        let mut ordered = self.scene.nodes().collect::<Vec<_>>();
        ordered.sort_by_key(|node| (node.traits.highlighted, node.focused));
        for node in ordered {
            let visual = frame_visual(ui, VisualScheme::Scatter, node, overlay, now);
            let center = viewport.to_screen(rect, node.position);
            paint_node(&painter, center, &visual, "", zoom, search_matches.contains(&node.id));

            if visual.show_label && !overlay.is_active() {
                painter.text(
                    center - vec2(0.0, visual.radius * zoom + 8.0),
                    Align2::CENTER_BOTTOM,
                    &node.caption,
                    FontId::proportional(visual.label_size),
                    if node.traits.highlighted {
                        RESULT_COLOR
                    } else {
                        visual.label_color
                    },
                );
            }
        }

        paint_floating_labels(&painter, overlay, now, |id| {
            let node = self.scene.get(id)?;
            Some((viewport.to_screen(rect, node.position), node.visual.radius * zoom))
        });
        paint_legend(&painter, rect);
        if let Some(pointer) = response.hover_pos() {
            paint_readout(&painter, rect, self.mapper.invert(viewport.to_world(rect, pointer)));
        }

        if animating {
            ui.ctx().request_repaint();
        }
    }
}

fn paint_legend(painter: &egui::Painter, rect: Rect) {
    let origin = pos2(rect.right() - 150.0, rect.top() + 20.0);
    let entries = [
        ("Document", DOCUMENT_COLOR, 5.0, 0.6),
        ("Search result", RESULT_COLOR, 8.0, 1.0),
    ];
    for (row, (text, color, radius, opacity)) in entries.into_iter().enumerate() {
        let center = origin + vec2(0.0, row as f32 * 25.0);
        painter.circle_filled(center, radius, with_opacity(color, opacity));
        painter.text(
            Pos2::new(center.x + 15.0, center.y),
            Align2::LEFT_CENTER,
            text,
            FontId::proportional(12.0),
            Color32::from_gray(210),
        );
    }
}

fn paint_readout(painter: &egui::Painter, rect: Rect, (x, y): (Option<f32>, Option<f32>)) {
    let axis = |value: Option<f32>| value.map_or_else(|| "-".to_owned(), |value| format!("{value:.3}"));
    painter.text(
        pos2(rect.left() + 12.0, rect.bottom() - 12.0),
        Align2::LEFT_BOTTOM,
        format!("x {}  y {}", axis(x), axis(y)),
        FontId::monospace(12.0),
        Color32::from_gray(170),
    );
}
