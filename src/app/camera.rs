use std::f32::consts::FRAC_PI_2;

use eframe::egui::{Pos2, Rect, Vec2, pos2, vec2};
use glam::{Mat4, Vec3, Vec4Swizzles};

use super::interaction::Ray;

const ROTATE_SPEED: f32 = 0.005;
const DAMPING: f32 = 0.1;
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;
const MIN_DISTANCE: f32 = 0.5;
const MAX_DISTANCE: f32 = 50.0;
const REST_VELOCITY: f32 = 1e-5;

/// Perspective camera orbiting a target point, with damped rotation.
#[derive(Clone, Debug)]
pub(crate) struct OrbitCamera {
    pub(crate) target: Vec3,
    distance: f32,
    yaw: f32,
    pitch: f32,
    fov_y: f32,
    near: f32,
    far: f32,
    yaw_velocity: f32,
    pitch_velocity: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 5.0,
            yaw: 0.0,
            pitch: 0.0,
            fov_y: 75_f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
        }
    }
}

impl OrbitCamera {
    pub(crate) fn position(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target
            + Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw) * self.distance
    }

    pub(crate) fn distance(&self) -> f32 {
        self.distance
    }

    /// Adds rotational velocity from a pointer drag, in pixels.
    pub(crate) fn rotate(&mut self, drag: Vec2) {
        self.yaw_velocity -= drag.x * ROTATE_SPEED;
        self.pitch_velocity += drag.y * ROTATE_SPEED;
    }

    /// Positive `scroll` moves the camera closer.
    pub(crate) fn dolly(&mut self, scroll: f32) {
        if !scroll.is_finite() || scroll == 0.0 {
            return;
        }
        let factor = 0.95_f32.powf(scroll / 50.0);
        self.distance = (self.distance * factor).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    /// Applies and decays the pending rotation. Returns whether the camera
    /// is still moving.
    pub(crate) fn update(&mut self) -> bool {
        self.yaw += self.yaw_velocity * DAMPING;
        self.pitch = (self.pitch + self.pitch_velocity * DAMPING).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.yaw_velocity *= 1.0 - DAMPING;
        self.pitch_velocity *= 1.0 - DAMPING;

        if self.yaw_velocity.abs() < REST_VELOCITY {
            self.yaw_velocity = 0.0;
        }
        if self.pitch_velocity.abs() < REST_VELOCITY {
            self.pitch_velocity = 0.0;
        }
        self.is_moving()
    }

    pub(crate) fn is_moving(&self) -> bool {
        self.yaw_velocity != 0.0 || self.pitch_velocity != 0.0
    }

    pub(crate) fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub(crate) fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y, aspect.max(1e-3), self.near, self.far)
    }

    pub(crate) fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }

    /// Screen position and view depth of a world point, or `None` when it is
    /// behind the camera or outside the clip range.
    pub(crate) fn project(&self, rect: Rect, world: Vec3) -> Option<(Pos2, f32)> {
        let clip = self.view_projection(rect.aspect_ratio()) * world.extend(1.0);
        if clip.w <= self.near {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        if !(-1.0..=1.0).contains(&ndc.z) {
            return None;
        }
        let screen = pos2(
            rect.left() + (ndc.x + 1.0) * 0.5 * rect.width(),
            rect.top() + (1.0 - ndc.y) * 0.5 * rect.height(),
        );
        Some((screen, clip.w))
    }

    /// On-screen radius of a sphere at view depth `depth`.
    pub(crate) fn screen_radius(&self, rect: Rect, radius: f32, depth: f32) -> f32 {
        if depth <= 0.0 {
            return 0.0;
        }
        radius / (depth * (self.fov_y * 0.5).tan()) * rect.height() * 0.5
    }

    pub(crate) fn ndc(rect: Rect, screen: Pos2) -> Vec2 {
        vec2(
            (screen.x - rect.left()) / rect.width() * 2.0 - 1.0,
            1.0 - (screen.y - rect.top()) / rect.height() * 2.0,
        )
    }

    /// World-space ray through a normalised device coordinate.
    pub(crate) fn ray_from_ndc(&self, ndc: Vec2, aspect: f32) -> Option<Ray> {
        let inverse = self.view_projection(aspect).inverse();
        let near = inverse.project_point3(Vec3::new(ndc.x, ndc.y, -1.0));
        let far = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
        let direction = (far - near).try_normalize()?;
        Some(Ray {
            origin: near,
            direction,
        })
    }
}
