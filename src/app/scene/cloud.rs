use std::collections::HashMap;

use eframe::egui::Color32;
use glam::Vec3;
use tracing::debug;

use crate::app::interaction::{Ray, pick_nearest};
use crate::app::scale::ScaleMapper3;
use crate::app::sequencer::SequenceOverlay;
use crate::snapshot::Snapshot;

use super::style::{DOCUMENT_COLOR, RESULT_COLOR, blend_color};

pub(crate) const RESULT_MESH_RADIUS: f32 = 0.08;
pub(crate) const DOCUMENT_MESH_RADIUS: f32 = 0.04;
pub(crate) const AXIS_LENGTH: f32 = 3.0;

#[derive(Clone, Debug)]
pub(crate) struct Mesh {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) center: Vec3,
    pub(crate) radius: f32,
    pub(crate) is_result: bool,
    pub(crate) strength: f32,
}

/// How a mesh should look on a given frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct MeshLook {
    pub(crate) radius: f32,
    pub(crate) color: Color32,
    pub(crate) opacity: f32,
}

pub(crate) struct CloudScene {
    meshes: Vec<Mesh>,
    slot_by_id: HashMap<String, usize>,
    /// Static links between every pair of results.
    connectors: Vec<(usize, usize)>,
    skipped: usize,
}

impl CloudScene {
    /// Points without a depth component are left out.
    pub(crate) fn build(snapshot: &Snapshot) -> Self {
        let mapper = ScaleMapper3::fit(&snapshot.points, ScaleMapper3::CLOUD_HALF_SIZE);
        let mut meshes = Vec::with_capacity(snapshot.point_count());
        let mut slot_by_id = HashMap::with_capacity(snapshot.point_count());
        let mut skipped = 0;

        for point in &snapshot.points {
            let Some(center) = mapper.project(point) else {
                skipped += 1;
                continue;
            };
            let strength = snapshot.strength_of(&point.id);
            let is_result = strength.is_some();
            slot_by_id.insert(point.id.clone(), meshes.len());
            meshes.push(Mesh {
                id: point.id.clone(),
                label: point.label.clone(),
                center,
                radius: if is_result {
                    RESULT_MESH_RADIUS
                } else {
                    DOCUMENT_MESH_RADIUS
                },
                is_result,
                strength: strength.unwrap_or(0.0),
            });
        }

        let result_slots = snapshot
            .results
            .iter()
            .filter_map(|result| slot_by_id.get(&result.id).copied())
            .collect::<Vec<_>>();
        let mut connectors = Vec::new();
        for (offset, &from) in result_slots.iter().enumerate() {
            for &to in &result_slots[offset + 1..] {
                connectors.push((from, to));
            }
        }

        if skipped > 0 {
            debug!(skipped, "points without depth left out of the cloud");
        }
        Self {
            meshes,
            slot_by_id,
            connectors,
            skipped,
        }
    }

    pub(crate) fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub(crate) fn mesh(&self, id: &str) -> Option<&Mesh> {
        self.slot_by_id.get(id).map(|&slot| &self.meshes[slot])
    }

    pub(crate) fn skipped(&self) -> usize {
        self.skipped
    }

    /// Static result connectors; hidden while a run owns the highlights.
    pub(crate) fn static_connectors<'a>(
        &'a self,
        overlay: &SequenceOverlay,
    ) -> impl Iterator<Item = (Vec3, Vec3)> + 'a {
        let visible = !overlay.is_active();
        self.connectors
            .iter()
            .filter(move |_| visible)
            .map(|&(from, to)| (self.meshes[from].center, self.meshes[to].center))
    }

    /// Connectors revealed by the current run.
    pub(crate) fn sequence_connectors<'a>(
        &'a self,
        overlay: &'a SequenceOverlay,
    ) -> impl Iterator<Item = (Vec3, Vec3)> + 'a {
        overlay.connectors().iter().filter_map(|(from, to)| {
            Some((self.mesh(from)?.center, self.mesh(to)?.center))
        })
    }

    pub(crate) fn look(&self, mesh: &Mesh, overlay: &SequenceOverlay, now: f64) -> MeshLook {
        if !overlay.is_active() {
            return if mesh.is_result {
                MeshLook {
                    radius: mesh.radius,
                    color: RESULT_COLOR,
                    opacity: 1.0,
                }
            } else {
                MeshLook {
                    radius: mesh.radius,
                    color: DOCUMENT_COLOR,
                    opacity: 0.6,
                }
            };
        }

        // A run resets everything to the plain document look, then lights
        // up each step as it arrives.
        let base = MeshLook {
            radius: DOCUMENT_MESH_RADIUS,
            color: DOCUMENT_COLOR,
            opacity: 0.6,
        };
        if overlay.mark(&mesh.id).is_none() {
            return base;
        }
        let tint = overlay.tint(&mesh.id, now);
        MeshLook {
            radius: RESULT_MESH_RADIUS * overlay.pulse_scale(&mesh.id, now),
            color: blend_color(DOCUMENT_COLOR, RESULT_COLOR, tint),
            opacity: 0.6 + 0.4 * tint,
        }
    }

    /// Nearest mesh hit by `ray`, using each mesh's current radius.
    pub(crate) fn pick(&self, ray: &Ray, overlay: &SequenceOverlay, now: f64) -> Option<usize> {
        pick_nearest(
            ray,
            self.meshes.iter().enumerate().map(|(index, mesh)| {
                (index, mesh.center, self.look(mesh, overlay, now).radius)
            }),
        )
        .map(|(index, _)| index)
    }
}

/// A repaint loop that can be stopped. Each frame asks whether it should keep
/// running; after `cancel` it never schedules again.
#[derive(Debug, Default)]
pub(crate) struct RenderLoop {
    active: bool,
    frames: u64,
}

impl RenderLoop {
    pub(crate) fn start(&mut self) {
        if !self.active {
            debug!("render loop started");
        }
        self.active = true;
    }

    /// Counts one frame and reports whether another should be scheduled.
    pub(crate) fn frame(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.frames += 1;
        true
    }

    pub(crate) fn cancel(&mut self) {
        if self.active {
            debug!(frames = self.frames, "render loop cancelled");
        }
        self.active = false;
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    #[cfg(test)]
    pub(crate) fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::sequencer::SequenceEvent;
    use crate::snapshot::{PointInput, ResultEntry};

    fn snapshot() -> Snapshot {
        let point = |id: &str, x: f32, z: Option<f32>| PointInput {
            id: id.to_owned(),
            label: id.to_uppercase(),
            content: String::new(),
            x,
            y: x * 0.5,
            z,
        };
        let (snapshot, _) = Snapshot::from_parts(
            vec![
                point("a", 0.0, Some(0.0)),
                point("b", 1.0, Some(1.0)),
                point("c", 2.0, Some(2.0)),
                point("flat", 3.0, None),
            ],
            vec![
                ResultEntry {
                    id: "a".to_owned(),
                    strength: 0.9,
                },
                ResultEntry {
                    id: "c".to_owned(),
                    strength: 0.5,
                },
            ],
            None,
        );
        snapshot
    }

    #[test]
    fn points_without_depth_are_skipped() {
        let scene = CloudScene::build(&snapshot());
        assert_eq!(scene.meshes().len(), 3);
        assert_eq!(scene.skipped(), 1);
        assert!(scene.mesh("flat").is_none());
        assert_eq!(scene.mesh("a").map(|mesh| mesh.radius), Some(RESULT_MESH_RADIUS));
        assert_eq!(scene.mesh("b").map(|mesh| mesh.radius), Some(DOCUMENT_MESH_RADIUS));
    }

    #[test]
    fn results_are_connected_pairwise_until_a_run_starts() {
        let scene = CloudScene::build(&snapshot());
        let mut overlay = SequenceOverlay::default();
        assert_eq!(scene.static_connectors(&overlay).count(), 1);

        overlay.apply(&SequenceEvent::Reset { count: 2 }, 0.0);
        assert_eq!(scene.static_connectors(&overlay).count(), 0);
        overlay.apply(
            &SequenceEvent::Connector {
                from: "a".to_owned(),
                to: "c".to_owned(),
            },
            0.0,
        );
        assert_eq!(scene.sequence_connectors(&overlay).count(), 1);
    }

    #[test]
    fn run_resets_then_pulses_highlighted_meshes() {
        let scene = CloudScene::build(&snapshot());
        let mut overlay = SequenceOverlay::default();
        overlay.apply(&SequenceEvent::Reset { count: 2 }, 0.0);

        let a = scene.mesh("a").expect("mesh a");
        assert_eq!(scene.look(a, &overlay, 0.0).color, DOCUMENT_COLOR);

        overlay.apply(
            &SequenceEvent::Highlight {
                rank: 1,
                id: "a".to_owned(),
                strength: 0.9,
            },
            1.0,
        );
        let peak = scene.look(a, &overlay, 1.5);
        assert!((peak.radius - RESULT_MESH_RADIUS * 1.5).abs() < 1e-5);
        assert_eq!(peak.color, RESULT_COLOR);
        assert_eq!(scene.look(a, &overlay, 2.0).radius, RESULT_MESH_RADIUS);
    }

    #[test]
    fn pick_returns_the_nearest_hit() {
        let scene = CloudScene::build(&snapshot());
        let overlay = SequenceOverlay::default();
        let target = scene.mesh("b").expect("mesh b").center;
        let ray = Ray {
            origin: target + Vec3::new(0.0, 0.0, 10.0),
            direction: Vec3::NEG_Z,
        };
        let hit = scene.pick(&ray, &overlay, 0.0).map(|index| scene.meshes()[index].id.as_str());
        assert_eq!(hit, Some("b"));
    }

    #[test]
    fn render_loop_stops_after_cancel() {
        let mut render_loop = RenderLoop::default();
        assert!(!render_loop.frame());
        render_loop.start();
        assert!(render_loop.frame());
        assert!(render_loop.frame());
        render_loop.cancel();
        assert!(!render_loop.frame());
        assert_eq!(render_loop.frames(), 2);
        assert!(!render_loop.is_active());
    }
}
