use std::collections::HashSet;

use anyhow::{Result, bail};
use eframe::egui::{
    self, Align2, Color32, FontId, Painter, PointerButton, Rect, Sense, Stroke, Ui, vec2,
};
use glam::Vec3;
use tracing::debug;

use crate::app::camera::OrbitCamera;
use crate::app::scene::cloud::{AXIS_LENGTH, CloudScene, RenderLoop};
use crate::app::scene::style::{BACKGROUND, RESULT_COLOR, SEARCH_COLOR, blend_color, shade, with_opacity};
use crate::snapshot::Snapshot;

use super::{ViewContext, paint_floating_labels};

const AMBIENT: f32 = 0.6;
const DIRECTIONAL: f32 = 0.8;

fn light_direction() -> Vec3 {
    Vec3::new(1.0, 1.0, 1.0).normalize()
}

/// The 3D point cloud: static placement, orbit camera and a render loop
/// that runs for as long as the view is mounted.
pub(crate) struct CloudView {
    scene: CloudScene,
    camera: OrbitCamera,
    render_loop: RenderLoop,
    context: ViewContext,
}

impl CloudView {
    /// Fails when no GPU context is available so the host can fall back to
    /// a 2D view.
    pub(crate) fn new(snapshot: &Snapshot, gl_available: bool) -> Result<Self> {
        if !gl_available {
            bail!("3D view unavailable: no graphics context");
        }
        let scene = CloudScene::build(snapshot);
        let mut render_loop = RenderLoop::default();
        render_loop.start();
        Ok(Self {
            scene,
            camera: OrbitCamera::default(),
            render_loop,
            context: ViewContext::default(),
        })
    }

    pub(crate) fn context(&self) -> &ViewContext {
        &self.context
    }

    pub(crate) fn context_mut(&mut self) -> &mut ViewContext {
        &mut self.context
    }

    pub(crate) fn scene(&self) -> &CloudScene {
        &self.scene
    }

    pub(crate) fn stop_render_loop(&mut self) {
        self.render_loop.cancel();
    }

    fn handle_pointer(&mut self, ui: &Ui, rect: Rect, response: &egui::Response, now: f64) {
        if response.dragged_by(PointerButton::Primary) {
            self.camera.rotate(response.drag_delta());
        }
        if response.dragged_by(PointerButton::Secondary) || response.dragged_by(PointerButton::Middle) {
            let pan = response.drag_delta() * (self.camera.distance() / rect.height().max(1.0));
            self.camera.target += Vec3::new(-pan.x, pan.y, 0.0);
        }
        if response.hovered() {
            let scroll = ui.input(|input| input.raw_scroll_delta.y);
            self.camera.dolly(scroll);
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .filter(|_| response.hovered() && !response.dragged());
        let hovered = pointer.and_then(|pointer| {
            let ray = self
                .camera
                .ray_from_ndc(OrbitCamera::ndc(rect, pointer), rect.aspect_ratio())?;
            self.scene.pick(&ray, &self.context.overlay, now)
        });
        let hovered_id = hovered.map(|index| self.scene.meshes()[index].id.clone());
        self.context.hover(hovered_id.as_deref());
    }

    pub(crate) fn show(&mut self, ui: &mut Ui, search_matches: &HashSet<String>) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        let now = ui.input(|input| input.time);

        self.context.advance(now);
        self.handle_pointer(ui, rect, &response, now);

        if !self.render_loop.frame() {
            return;
        }
        self.camera.update();
        self.paint(&painter, rect, search_matches, now);
        ui.ctx().request_repaint();
    }

    fn paint_line(&self, painter: &Painter, rect: Rect, from: Vec3, to: Vec3, stroke: Stroke) {
        if let (Some((start, _)), Some((end, _))) =
            (self.camera.project(rect, from), self.camera.project(rect, to))
        {
            painter.line_segment([start, end], stroke);
        }
    }

    fn paint(&self, painter: &Painter, rect: Rect, search_matches: &HashSet<String>, now: f64) {
        painter.rect_filled(rect, 0.0, BACKGROUND);
        let overlay = &self.context.overlay;

        let axes = [
            (Vec3::X, Color32::from_rgb(230, 80, 80)),
            (Vec3::Y, Color32::from_rgb(90, 200, 110)),
            (Vec3::Z, Color32::from_rgb(90, 140, 240)),
        ];
        for (axis, color) in axes {
            self.paint_line(painter, rect, Vec3::ZERO, axis * AXIS_LENGTH, Stroke::new(1.5, color));
        }

        let connector = Stroke::new(2.0, with_opacity(RESULT_COLOR, 0.5));
        for (from, to) in self.scene.static_connectors(overlay) {
            self.paint_line(painter, rect, from, to, connector);
        }
        for (from, to) in self.scene.sequence_connectors(overlay) {
            self.paint_line(painter, rect, from, to, Stroke::new(2.5, RESULT_COLOR));
        }

        let camera_position = self.camera.position();
        let light = light_direction();
        let mut visible = self
            .scene
            .meshes()
            .iter()
            .filter_map(|mesh| {
                let (center, depth) = self.camera.project(rect, mesh.center)?;
                Some((mesh, center, depth))
            })
            .collect::<Vec<_>>();
        // Painter's algorithm: far meshes first.
        visible.sort_by(|a, b| b.2.total_cmp(&a.2));

        let focused = self.context.focus.current();
        for (mesh, center, depth) in &visible {
            let look = self.scene.look(mesh, overlay, now);
            let radius = self.camera.screen_radius(rect, look.radius, *depth).max(1.5);
            let facing = (camera_position - mesh.center).normalize_or_zero();
            let lambert = facing.dot(light).max(0.0);
            let fill = with_opacity(shade(look.color, AMBIENT + DIRECTIONAL * lambert * 0.5), look.opacity);

            painter.circle_filled(*center, radius, fill);
            painter.circle_filled(
                *center - vec2(radius * 0.3, radius * 0.3),
                radius * 0.45,
                with_opacity(blend_color(look.color, Color32::WHITE, 0.35), look.opacity * 0.8),
            );
            if search_matches.contains(&mesh.id) {
                painter.circle_stroke(*center, radius + 3.0, Stroke::new(1.5, SEARCH_COLOR));
            }
            if focused == Some(mesh.id.as_str()) {
                painter.circle_stroke(*center, radius + 2.0, Stroke::new(2.0, Color32::WHITE));
                painter.text(
                    *center + vec2(radius + 6.0, 0.0),
                    Align2::LEFT_CENTER,
                    &mesh.label,
                    FontId::proportional(13.0),
                    Color32::WHITE,
                );
            }
        }

        paint_floating_labels(painter, overlay, now, |id| {
            let mesh = self.scene.mesh(id)?;
            let (center, depth) = self.camera.project(rect, mesh.center)?;
            let look = self.scene.look(mesh, overlay, now);
            Some((center, self.camera.screen_radius(rect, look.radius, depth)))
        });

        if self.scene.skipped() > 0 {
            painter.text(
                rect.left_bottom() + vec2(10.0, -10.0),
                Align2::LEFT_BOTTOM,
                format!("{} points without depth not shown", self.scene.skipped()),
                FontId::proportional(12.0),
                Color32::from_gray(150),
            );
        }
    }
}

impl Drop for CloudView {
    fn drop(&mut self) {
        if self.render_loop.is_active() {
            debug!("cloud view dropped with a live render loop");
            self.render_loop.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::PointInput;

    fn snapshot() -> Snapshot {
        let points = (0..3)
            .map(|index| PointInput {
                id: format!("p{index}"),
                label: format!("P{index}"),
                content: String::new(),
                x: index as f32,
                y: 0.0,
                z: Some(index as f32),
            })
            .collect();
        Snapshot::from_parts(points, Vec::new(), None).0
    }

    #[test]
    fn missing_graphics_context_is_reported() {
        let error = CloudView::new(&snapshot(), false).err().expect("capability error");
        assert!(error.to_string().contains("no graphics context"));
    }

    #[test]
    fn render_loop_runs_until_stopped() {
        let mut view = CloudView::new(&snapshot(), true).expect("view");
        assert_eq!(view.scene().meshes().len(), 3);
        assert!(view.render_loop.frame());
        view.stop_render_loop();
        assert!(!view.render_loop.frame());
    }
}
