//! Pointer state shared by the views: pan/zoom, node drags, hover focus and
//! 3D picking.

use eframe::egui::{Pos2, Rect, Vec2};
use glam::Vec3;

pub(crate) const MIN_ZOOM: f32 = 0.5;
pub(crate) const MAX_ZOOM: f32 = 5.0;

/// Events a view reports to the host, in the order they happened.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ViewEvent {
    Hover(Option<String>),
    DragStart { id: String, position: Pos2 },
    DragMove { id: String, position: Pos2 },
    DragEnd { id: String, position: Pos2 },
    AnimationComplete,
}

/// Pan and zoom applied to a 2D render space. `anchor` is the render-space
/// point shown at the middle of the canvas before any panning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Viewport {
    pub(crate) anchor: Vec2,
    pub(crate) pan: Vec2,
    pub(crate) zoom: f32,
}

impl Viewport {
    pub(crate) fn new(anchor: Pos2) -> Self {
        Self {
            anchor: anchor.to_vec2(),
            pan: Vec2::ZERO,
            zoom: 1.0,
        }
    }

    pub(crate) fn to_screen(&self, rect: Rect, world: Pos2) -> Pos2 {
        rect.center() + self.pan + (world.to_vec2() - self.anchor) * self.zoom
    }

    pub(crate) fn to_world(&self, rect: Rect, screen: Pos2) -> Pos2 {
        ((screen - rect.center() - self.pan) / self.zoom + self.anchor).to_pos2()
    }

    /// Screen origin of the render space, used to align the background grid.
    pub(crate) fn origin(&self, rect: Rect) -> Pos2 {
        self.to_screen(rect, Pos2::ZERO)
    }

    pub(crate) fn pan_by(&mut self, delta: Vec2) {
        if delta.x.is_finite() && delta.y.is_finite() {
            self.pan += delta;
        }
    }

    /// Zooms by `factor`, keeping the render-space point under `pointer` fixed.
    pub(crate) fn zoom_at(&mut self, rect: Rect, pointer: Pos2, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let world_before = self.to_world(rect, pointer);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = pointer - rect.center() - (world_before.to_vec2() - self.anchor) * self.zoom;
    }

    /// Scroll wheel delta to a zoom factor.
    pub(crate) fn scroll_factor(scroll: f32) -> f32 {
        (1.0 + scroll * 0.0018).clamp(0.85, 1.15)
    }
}

/// The node currently held by the primary pointer button.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DragState {
    pub(crate) index: usize,
    pub(crate) id: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct FocusChange {
    pub(crate) left: Option<String>,
    pub(crate) entered: Option<String>,
}

/// Remembers which node is under the pointer so focus styling is applied
/// and removed exactly once per transition.
#[derive(Clone, Debug, Default)]
pub(crate) struct FocusTracker {
    current: Option<String>,
}

impl FocusTracker {
    pub(crate) fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub(crate) fn update(&mut self, next: Option<&str>) -> Option<FocusChange> {
        if self.current.as_deref() == next {
            return None;
        }
        let left = self.current.take();
        self.current = next.map(str::to_owned);
        Some(FocusChange {
            left,
            entered: self.current.clone(),
        })
    }

    pub(crate) fn clear(&mut self) -> Option<FocusChange> {
        self.update(None)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Ray {
    pub(crate) origin: Vec3,
    /// Unit length.
    pub(crate) direction: Vec3,
}

/// Distance along `ray` to the first intersection with the sphere, if any.
pub(crate) fn ray_sphere(ray: &Ray, center: Vec3, radius: f32) -> Option<f32> {
    let offset = ray.origin - center;
    let b = offset.dot(ray.direction);
    let c = offset.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let near = -b - root;
    if near >= 0.0 {
        return Some(near);
    }
    let far = -b + root;
    (far >= 0.0).then_some(far)
}

/// The closest sphere along the ray.
pub(crate) fn pick_nearest(
    ray: &Ray,
    spheres: impl IntoIterator<Item = (usize, Vec3, f32)>,
) -> Option<(usize, f32)> {
    spheres
        .into_iter()
        .filter_map(|(index, center, radius)| {
            ray_sphere(ray, center, radius).map(|distance| (index, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Nearest disc under `pointer` among `(index, center, radius)` candidates.
pub(crate) fn hit_disc(
    pointer: Pos2,
    discs: impl IntoIterator<Item = (usize, Pos2, f32)>,
) -> Option<usize> {
    discs
        .into_iter()
        .filter_map(|(index, center, radius)| {
            let distance = center.distance(pointer);
            (distance <= radius).then_some((index, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use eframe::egui::{pos2, vec2};

    use super::*;

    fn rect() -> Rect {
        Rect::from_min_size(pos2(10.0, 10.0), vec2(800.0, 600.0))
    }

    #[test]
    fn screen_and_world_round_trip() {
        let mut viewport = Viewport::new(pos2(400.0, 300.0));
        viewport.pan_by(vec2(25.0, -10.0));
        viewport.zoom = 2.0;
        let world = pos2(123.0, 456.0);
        let back = viewport.to_world(rect(), viewport.to_screen(rect(), world));
        assert!((back - world).length() < 1e-3);
        assert_eq!(
            Viewport::new(pos2(400.0, 300.0)).to_screen(rect(), pos2(400.0, 300.0)),
            rect().center()
        );
    }

    #[test]
    fn zoom_keeps_the_pointer_anchored_and_clamped() {
        let mut viewport = Viewport::new(pos2(400.0, 300.0));
        let pointer = pos2(200.0, 150.0);
        let under = viewport.to_world(rect(), pointer);

        viewport.zoom_at(rect(), pointer, 1.15);
        assert!((viewport.to_world(rect(), pointer) - under).length() < 1e-3);

        for _ in 0..100 {
            viewport.zoom_at(rect(), pointer, 1.15);
        }
        assert_eq!(viewport.zoom, MAX_ZOOM);
        for _ in 0..200 {
            viewport.zoom_at(rect(), pointer, 0.85);
        }
        assert_eq!(viewport.zoom, MIN_ZOOM);
    }

    #[test]
    fn focus_transitions_are_reported_once() {
        let mut focus = FocusTracker::default();
        assert_eq!(
            focus.update(Some("a")),
            Some(FocusChange {
                left: None,
                entered: Some("a".to_owned()),
            })
        );
        assert_eq!(focus.update(Some("a")), None);
        assert_eq!(
            focus.update(Some("b")),
            Some(FocusChange {
                left: Some("a".to_owned()),
                entered: Some("b".to_owned()),
            })
        );
        assert_eq!(focus.clear().and_then(|change| change.left), Some("b".to_owned()));
        assert_eq!(focus.current(), None);
    }

    #[test]
    fn nearest_sphere_wins() {
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 10.0),
            direction: Vec3::NEG_Z,
        };
        let spheres = [
            (0, Vec3::new(0.0, 0.0, 0.0), 0.5),
            (1, Vec3::new(0.0, 0.0, 4.0), 0.5),
            (2, Vec3::new(3.0, 0.0, 6.0), 0.5),
        ];
        assert_eq!(pick_nearest(&ray, spheres).map(|hit| hit.0), Some(1));
        assert_eq!(ray_sphere(&ray, Vec3::new(0.0, 0.0, 20.0), 1.0), None);
    }

    #[test]
    fn disc_hit_prefers_the_closest_center() {
        let discs = [(0, pos2(0.0, 0.0), 10.0), (1, pos2(6.0, 0.0), 10.0)];
        assert_eq!(hit_disc(pos2(4.0, 0.0), discs), Some(1));
        assert_eq!(hit_disc(pos2(40.0, 0.0), discs), None);
    }
}
