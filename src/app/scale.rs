//! Data space → render space projection.
//!
//! Every axis gets its own linear scale fitted to the observed minimum and
//! maximum. A degenerate axis (no values, or all values equal) maps every
//! input to the middle of its output range.

use eframe::egui::{Pos2, pos2};
use glam::Vec3;
use tracing::debug;

use crate::snapshot::Point;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LinearScale {
    domain: Option<(f32, f32)>,
    range: (f32, f32),
}

impl LinearScale {
    pub(crate) fn fit(values: impl IntoIterator<Item = f32>, range: (f32, f32)) -> Self {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for value in values.into_iter().filter(|value| value.is_finite()) {
            min = min.min(value);
            max = max.max(value);
        }

        let domain = (min.is_finite() && max.is_finite() && max - min > f32::EPSILON * max.abs().max(1.0))
            .then_some((min, max));
        Self { domain, range }
    }

    fn range_bounds(&self) -> (f32, f32) {
        (self.range.0.min(self.range.1), self.range.0.max(self.range.1))
    }

    pub(crate) fn apply(&self, value: f32) -> f32 {
        let (r0, r1) = self.range;
        let Some((d0, d1)) = self.domain else {
            return (r0 + r1) * 0.5;
        };

        let t = (value - d0) / (d1 - d0);
        let (low, high) = self.range_bounds();
        (r0 + (r1 - r0) * t).clamp(low, high)
    }

    pub(crate) fn invert(&self, value: f32) -> Option<f32> {
        let (d0, d1) = self.domain?;
        let (r0, r1) = self.range;
        Some(d0 + (d1 - d0) * ((value - r0) / (r1 - r0)))
    }

    pub(crate) fn is_degenerate(&self) -> bool {
        self.domain.is_none()
    }
}

/// A 2D render extent with a uniform margin on every side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Extent2 {
    pub(crate) width: f32,
    pub(crate) height: f32,
    pub(crate) margin: f32,
}

impl Extent2 {
    pub(crate) const GRAPH: Self = Self {
        width: 800.0,
        height: 600.0,
        margin: 20.0,
    };

    pub(crate) fn center(&self) -> Pos2 {
        pos2(self.width * 0.5, self.height * 0.5)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, point: Pos2) -> bool {
        point.x >= self.margin
            && point.x <= self.width - self.margin
            && point.y >= self.margin
            && point.y <= self.height - self.margin
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ScaleMapper2 {
    x: LinearScale,
    y: LinearScale,
}

impl ScaleMapper2 {
    /// Larger data Y is drawn higher on screen, so the Y range is inverted.
    pub(crate) fn fit(points: &[Point], extent: Extent2) -> Self {
        let x = LinearScale::fit(
            points.iter().map(|point| point.x),
            (extent.margin, extent.width - extent.margin),
        );
        let y = LinearScale::fit(
            points.iter().map(|point| point.y),
            (extent.height - extent.margin, extent.margin),
        );
        if x.is_degenerate() || y.is_degenerate() {
            debug!(
                x_flat = x.is_degenerate(),
                y_flat = y.is_degenerate(),
                "degenerate axis, points collapse to the center"
            );
        }
        Self { x, y }
    }

    pub(crate) fn project(&self, point: &Point) -> Pos2 {
        pos2(self.x.apply(point.x), self.y.apply(point.y))
    }

    /// Data coordinates under a render-space position. `None` on a degenerate axis.
    pub(crate) fn invert(&self, position: Pos2) -> (Option<f32>, Option<f32>) {
        (self.x.invert(position.x), self.y.invert(position.y))
    }
}

/// Fits points into the axis-aligned cube `[-half_size, half_size]³`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ScaleMapper3 {
    x: LinearScale,
    y: LinearScale,
    z: LinearScale,
}

impl ScaleMapper3 {
    pub(crate) const CLOUD_HALF_SIZE: f32 = 2.0;

    /// Only points with a depth component are placed, so only they take part
    /// in the fit on any axis.
    pub(crate) fn fit(points: &[Point], half_size: f32) -> Self {
        let range = (-half_size, half_size);
        let placed = || points.iter().filter(|point| point.z.is_some());
        Self {
            x: LinearScale::fit(placed().map(|point| point.x), range),
            y: LinearScale::fit(placed().map(|point| point.y), range),
            z: LinearScale::fit(placed().filter_map(|point| point.z), range),
        }
    }

    pub(crate) fn project(&self, point: &Point) -> Option<Vec3> {
        let z = point.z?;
        Some(Vec3::new(
            self.x.apply(point.x),
            self.y.apply(point.y),
            self.z.apply(z),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, x: f32, y: f32, z: Option<f32>) -> Point {
        Point {
            id: id.to_owned(),
            label: id.to_owned(),
            content: String::new(),
            x,
            y,
            z,
        }
    }

    #[test]
    fn min_and_max_map_to_the_range_bounds() {
        let scale = LinearScale::fit([-3.0, 1.0, 7.0], (20.0, 780.0));
        assert_eq!(scale.apply(-3.0), 20.0);
        assert_eq!(scale.apply(7.0), 780.0);
        assert_eq!(scale.apply(2.0), 400.0);
        assert_eq!(scale.invert(400.0), Some(2.0));
    }

    #[test]
    fn degenerate_axis_falls_back_to_the_center() {
        let empty = LinearScale::fit(std::iter::empty(), (0.0, 10.0));
        assert!(empty.is_degenerate());
        assert_eq!(empty.apply(123.0), 5.0);

        let flat = LinearScale::fit([4.0, 4.0, 4.0], (-2.0, 2.0));
        assert!(flat.is_degenerate());
        assert_eq!(flat.apply(4.0), 0.0);
        assert_eq!(flat.invert(0.0), None);
    }

    #[test]
    fn projected_points_stay_inside_the_extent() {
        let points = (0..40)
            .map(|i| {
                let t = i as f32;
                point(&format!("p{i}"), (t * 1.7).sin() * 1e4, t * t - 300.0, None)
            })
            .collect::<Vec<_>>();
        let extent = Extent2::GRAPH;
        let mapper = ScaleMapper2::fit(&points, extent);

        for point in &points {
            assert!(extent.contains(mapper.project(point)));
        }
    }

    #[test]
    fn single_point_lands_on_the_extent_center() {
        let points = [point("only", 12.0, -8.0, Some(3.0))];
        let mapper = ScaleMapper2::fit(&points, Extent2::GRAPH);
        assert_eq!(mapper.project(&points[0]), Extent2::GRAPH.center());

        let cloud = ScaleMapper3::fit(&points, ScaleMapper3::CLOUD_HALF_SIZE);
        assert_eq!(cloud.project(&points[0]), Some(Vec3::ZERO));
    }

    #[test]
    fn axes_are_fitted_independently() {
        let points = [
            point("a", 0.0, 5.0, Some(1.0)),
            point("b", 10.0, 5.0, Some(1.0)),
            point("c", 5.0, 5.0, None),
        ];
        let cloud = ScaleMapper3::fit(&points, 2.0);

        assert_eq!(cloud.project(&points[0]), Some(Vec3::new(-2.0, 0.0, 0.0)));
        assert_eq!(cloud.project(&points[1]), Some(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(cloud.project(&points[2]), None);

        let flat = ScaleMapper2::fit(&points, Extent2::GRAPH);
        assert_eq!(flat.project(&points[2]), pos2(400.0, 300.0));
        assert_eq!(flat.project(&points[0]).x, 20.0);
        assert_eq!(flat.invert(pos2(780.0, 300.0)), (Some(10.0), None));
    }

    #[test]
    fn cloud_fit_ignores_points_without_depth() {
        let points = [
            point("a", 0.0, 0.0, Some(0.0)),
            point("b", 4.0, 8.0, Some(1.0)),
            point("flat", -100.0, 100.0, None),
        ];
        let cloud = ScaleMapper3::fit(&points, 2.0);

        assert_eq!(cloud.project(&points[0]), Some(Vec3::new(-2.0, -2.0, -2.0)));
        assert_eq!(cloud.project(&points[1]), Some(Vec3::new(2.0, 2.0, 2.0)));
    }
}
