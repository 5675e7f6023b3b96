use eframe::egui::{Vec2, vec2};

const LEAF_CAPACITY: usize = 8;
const MAX_DEPTH: usize = 12;

#[derive(Clone, Copy, Debug)]
pub(super) struct CellBounds {
    pub(super) center: Vec2,
    pub(super) half_extent: f32,
}

impl CellBounds {
    fn enclosing(points: &[Vec2]) -> Option<Self> {
        let mut min = vec2(f32::INFINITY, f32::INFINITY);
        let mut max = vec2(f32::NEG_INFINITY, f32::NEG_INFINITY);
        for point in points {
            min = min.min(*point);
            max = max.max(*point);
        }

        if !min.x.is_finite() || !min.y.is_finite() || !max.x.is_finite() || !max.y.is_finite() {
            return None;
        }

        let span = (max - min).max_elem().max(1.0);
        Some(Self {
            center: (min + max) * 0.5,
            half_extent: span * 0.5 + 1.0,
        })
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        (point.x - self.center.x).abs() <= self.half_extent
            && (point.y - self.center.y).abs() <= self.half_extent
    }

    pub(super) fn side(self) -> f32 {
        self.half_extent * 2.0
    }

    fn quadrant(self, point: Vec2) -> usize {
        usize::from(point.x >= self.center.x) | (usize::from(point.y >= self.center.y) << 1)
    }

    fn child(self, quadrant: usize) -> Self {
        let quarter = self.half_extent * 0.5;
        let sx = if quadrant & 1 == 0 { -quarter } else { quarter };
        let sy = if quadrant & 2 == 0 { -quarter } else { quarter };
        Self {
            center: self.center + vec2(sx, sy),
            half_extent: quarter,
        }
    }

    /// Gap between two cells; zero when they touch or overlap.
    fn gap(self, other: Self) -> f32 {
        let reach = self.half_extent + other.half_extent;
        let dx = ((self.center.x - other.center.x).abs() - reach).max(0.0);
        let dy = ((self.center.y - other.center.y).abs() - reach).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }
}

/// Region quadtree over node positions. Each cell keeps its point count and
/// center of mass for Barnes–Hut, and its largest disc radius so collision
/// queries can skip cells that are too far apart to touch.
pub(super) struct TreeCell {
    pub(super) bounds: CellBounds,
    pub(super) center_of_mass: Vec2,
    pub(super) mass: f32,
    pub(super) max_radius: f32,
    pub(super) members: Vec<usize>,
    pub(super) children: [Option<Box<TreeCell>>; 4],
}

impl TreeCell {
    pub(super) fn build(positions: &[Vec2], radii: &[f32]) -> Option<Self> {
        let bounds = CellBounds::enclosing(positions)?;
        let members = (0..positions.len()).collect();
        Some(Self::subdivide(bounds, members, positions, radii, 0))
    }

    fn subdivide(
        bounds: CellBounds,
        members: Vec<usize>,
        positions: &[Vec2],
        radii: &[f32],
        depth: usize,
    ) -> Self {
        let mut center_of_mass = Vec2::ZERO;
        let mut max_radius = 0.0_f32;
        for &index in &members {
            center_of_mass += positions[index];
            max_radius = max_radius.max(radii.get(index).copied().unwrap_or(0.0));
        }
        let mass = members.len() as f32;
        if mass > 0.0 {
            center_of_mass /= mass;
        }

        let mut cell = Self {
            bounds,
            center_of_mass,
            mass,
            max_radius,
            members,
            children: std::array::from_fn(|_| None),
        };
        if depth >= MAX_DEPTH || cell.members.len() <= LEAF_CAPACITY {
            return cell;
        }

        let mut buckets: [Vec<usize>; 4] = std::array::from_fn(|_| Vec::new());
        for &index in &cell.members {
            buckets[bounds.quadrant(positions[index])].push(index);
        }
        // Coincident points never separate; keep them in one leaf.
        if buckets.iter().filter(|bucket| !bucket.is_empty()).count() <= 1 {
            return cell;
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            cell.children[quadrant] = Some(Box::new(Self::subdivide(
                bounds.child(quadrant),
                bucket,
                positions,
                radii,
                depth + 1,
            )));
        }
        cell.members.clear();
        cell
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    pub(super) fn children(&self) -> impl Iterator<Item = &TreeCell> {
        self.children.iter().filter_map(|child| child.as_deref())
    }

    /// Every index pair whose discs could touch, each pair reported once.
    pub(super) fn contact_candidates(&self, out: &mut Vec<(usize, usize)>) {
        Self::pairs_within(self, self, true, out);
    }

    fn pairs_within(a: &TreeCell, b: &TreeCell, same: bool, out: &mut Vec<(usize, usize)>) {
        if a.bounds.gap(b.bounds) > a.max_radius + b.max_radius {
            return;
        }

        if a.is_leaf() && b.is_leaf() {
            if same {
                for (offset, &from) in a.members.iter().enumerate() {
                    for &to in &a.members[offset + 1..] {
                        out.push((from, to));
                    }
                }
            } else {
                for &from in &a.members {
                    for &to in &b.members {
                        out.push((from, to));
                    }
                }
            }
            return;
        }

        if same {
            let children = a.children().collect::<Vec<_>>();
            for (offset, first) in children.iter().enumerate() {
                Self::pairs_within(first, first, true, out);
                for second in &children[offset + 1..] {
                    Self::pairs_within(first, second, false, out);
                }
            }
            return;
        }

        let split_a = !a.is_leaf() && (b.is_leaf() || a.bounds.half_extent >= b.bounds.half_extent);
        if split_a {
            for child in a.children() {
                Self::pairs_within(child, b, false, out);
            }
        } else {
            for child in b.children() {
                Self::pairs_within(a, child, false, out);
            }
        }
    }
}
