use eframe::egui::{Vec2, vec2};
use tracing::debug;

use super::SimNode;
use super::quadtree::TreeCell;

/// Everything a force may read during one tick.
pub(crate) struct ForceContext<'a> {
    pub(super) nodes: &'a [SimNode],
    pub(super) alpha: f32,
    pub(super) tree: Option<&'a TreeCell>,
}

/// One composable contribution to the layout.
///
/// `accumulate` adds velocity deltas (already scaled by alpha) for every
/// node; `relax` runs after integration and may move positions directly to
/// satisfy a hard constraint. Pinned nodes are never moved by either.
pub(crate) trait Force {
    fn name(&self) -> &'static str;

    fn accumulate(&self, ctx: &ForceContext<'_>, deltas: &mut [Vec2]);

    fn relax(&self, _nodes: &mut [SimNode]) -> usize {
        0
    }
}

/// Deterministic unit direction for coincident points.
fn jiggle(a: usize, b: usize) -> Vec2 {
    let angle = ((a as f32) * 0.618_034 + (b as f32) * 0.414_214) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin())
}

/// Mutual charge between all nodes, approximated with Barnes–Hut.
/// Negative strength pushes nodes apart.
pub(crate) struct ManyBody {
    pub(crate) strength: f32,
    pub(crate) theta: f32,
    pub(crate) min_distance: f32,
}

impl ManyBody {
    fn visit(&self, cell: &TreeCell, index: usize, point: Vec2, nodes: &[SimNode], alpha: f32) -> Vec2 {
        if cell.mass <= 0.0 {
            return Vec2::ZERO;
        }
        let min_distance_sq = self.min_distance * self.min_distance;

        if cell.is_leaf() {
            let mut delta_v = Vec2::ZERO;
            for &other in &cell.members {
                if other == index {
                    continue;
                }
                let mut delta = nodes[other].position - point;
                if delta.length_sq() <= f32::EPSILON {
                    delta = jiggle(index, other) * self.min_distance;
                }
                let distance_sq = delta.length_sq().max(min_distance_sq);
                delta_v += delta * (self.strength * alpha / distance_sq);
            }
            return delta_v;
        }

        let delta = cell.center_of_mass - point;
        let distance_sq = delta.length_sq().max(min_distance_sq);
        let far_enough = !cell.bounds.contains(point)
            && cell.bounds.side() * cell.bounds.side() < self.theta * self.theta * distance_sq;
        if far_enough {
            return delta * (self.strength * cell.mass * alpha / distance_sq);
        }

        cell.children()
            .map(|child| self.visit(child, index, point, nodes, alpha))
            .fold(Vec2::ZERO, |sum, part| sum + part)
    }
}

impl Force for ManyBody {
    fn name(&self) -> &'static str {
        "many-body"
    }

    fn accumulate(&self, ctx: &ForceContext<'_>, deltas: &mut [Vec2]) {
        let Some(tree) = ctx.tree else {
            return;
        };
        for (index, delta) in deltas.iter_mut().enumerate() {
            let node = &ctx.nodes[index];
            if node.pinned {
                continue;
            }
            *delta += self.visit(tree, index, node.position, ctx.nodes, ctx.alpha);
        }
    }
}

/// Pull toward a fixed point, proportional to the distance from it.
pub(crate) struct Center {
    pub(crate) target: Vec2,
    pub(crate) strength: f32,
}

impl Force for Center {
    fn name(&self) -> &'static str {
        "center"
    }

    fn accumulate(&self, ctx: &ForceContext<'_>, deltas: &mut [Vec2]) {
        let gain = self.strength * ctx.alpha;
        for (node, delta) in ctx.nodes.iter().zip(deltas.iter_mut()) {
            *delta += (self.target - node.position) * gain;
        }
    }
}

/// Keeps node discs from overlapping.
///
/// During accumulation overlapping discs (judged on their predicted next
/// positions) get a soft push. `relax` then corrects positions pass by pass
/// until no pair overlaps. The pass budget grows with the node count; a
/// cluster that outlasts it is scaled out as a whole.
pub(crate) struct Collide {
    pub(crate) strength: f32,
    pub(crate) passes: usize,
    pub(crate) tolerance: f32,
}

impl Collide {
    fn candidates(nodes: &[SimNode], positions: impl Fn(&SimNode) -> Vec2) -> Vec<(usize, usize)> {
        let points = nodes.iter().map(positions).collect::<Vec<_>>();
        let radii = nodes.iter().map(|node| node.radius).collect::<Vec<_>>();
        let mut pairs = Vec::new();
        if let Some(tree) = TreeCell::build(&points, &radii) {
            tree.contact_candidates(&mut pairs);
        }
        pairs
    }
}

impl Force for Collide {
    fn name(&self) -> &'static str {
        "collide"
    }

    fn accumulate(&self, ctx: &ForceContext<'_>, deltas: &mut [Vec2]) {
        let nodes = ctx.nodes;
        for (a, b) in Self::candidates(nodes, |node| node.position + node.velocity) {
            let predicted_a = nodes[a].position + nodes[a].velocity;
            let predicted_b = nodes[b].position + nodes[b].velocity;
            let delta = predicted_a - predicted_b;
            let distance = delta.length();
            let reach = nodes[a].radius + nodes[b].radius;
            if distance >= reach {
                continue;
            }

            let direction = if distance > 0.0001 {
                delta / distance
            } else {
                jiggle(a, b)
            };
            let push = direction * ((reach - distance) * self.strength * 0.5);
            deltas[a] += push;
            deltas[b] -= push;
        }
    }

    fn relax(&self, nodes: &mut [SimNode]) -> usize {
        let mut corrections = 0;
        for _ in 0..self.passes.max(nodes.len()) {
            let moved = self.relax_pass(nodes);
            corrections += moved;
            if moved == 0 {
                return corrections;
            }
        }

        // Pass budget spent on a dense cluster: spread the whole layout until
        // every pair clears its reach.
        for _ in 0..SCALE_OUT_ROUNDS {
            let moved = self.relax_pass(nodes);
            corrections += moved;
            if moved == 0 || !self.scale_out(nodes) {
                break;
            }
        }
        corrections
    }
}

const SCALE_OUT_ROUNDS: usize = 4;

impl Collide {
    fn relax_pass(&self, nodes: &mut [SimNode]) -> usize {
        let mut moved = 0;
        for (a, b) in Self::candidates(nodes, |node| node.position) {
            let (pinned_a, pinned_b) = (nodes[a].pinned, nodes[b].pinned);
            if pinned_a && pinned_b {
                continue;
            }

            let delta = nodes[a].position - nodes[b].position;
            let distance = delta.length();
            let reach = nodes[a].radius + nodes[b].radius;
            let overlap = reach - distance;
            if overlap <= self.tolerance {
                continue;
            }

            let direction = if distance > 0.0001 {
                delta / distance
            } else {
                jiggle(a, b)
            };
            // A small overshoot lets the pass terminate instead of
            // creeping toward contact.
            let correction = direction * (overlap + self.tolerance * 0.5);
            match (pinned_a, pinned_b) {
                (true, _) => nodes[b].position -= correction,
                (_, true) => nodes[a].position += correction,
                _ => {
                    nodes[a].position += correction * 0.5;
                    nodes[b].position -= correction * 0.5;
                }
            }
            moved += 1;
        }
        moved
    }

    /// Scales free nodes away from an anchor so that every overlapping pair
    /// reaches its contact distance. The anchor is the pinned node when there
    /// is exactly one, otherwise the centroid. Returns `false` when nothing
    /// needed to move.
    fn scale_out(&self, nodes: &mut [SimNode]) -> bool {
        let mut factor = 1.0_f32;
        for (a, b) in Self::candidates(nodes, |node| node.position) {
            if nodes[a].pinned && nodes[b].pinned {
                continue;
            }
            let distance = (nodes[a].position - nodes[b].position).length();
            let reach = nodes[a].radius + nodes[b].radius;
            if reach - distance <= self.tolerance || distance <= 0.0001 {
                continue;
            }
            factor = factor.max((reach + self.tolerance * 0.5) / distance);
        }
        if factor <= 1.0 {
            return false;
        }

        let mut pinned = nodes.iter().filter(|node| node.pinned);
        let anchor = match (pinned.next(), pinned.next()) {
            (Some(node), None) => node.position,
            _ => {
                nodes.iter().fold(Vec2::ZERO, |sum, node| sum + node.position)
                    / nodes.len() as f32
            }
        };
        for node in nodes.iter_mut().filter(|node| !node.pinned) {
            node.position = anchor + (node.position - anchor) * factor;
        }
        debug!(factor, nodes = nodes.len(), "collision passes exhausted, layout scaled out");
        true
    }
}

#[derive(Clone, Copy, Debug)]
struct Spring {
    source: usize,
    target: usize,
    rest_length: f32,
    strength: f32,
    bias: f32,
}

/// Springs along edges, pulling each pair toward its rest length. Stiffness
/// defaults to `1 / min(degree)` so hubs are not yanked around by their
/// many neighbours.
pub(crate) struct Link {
    springs: Vec<Spring>,
}

impl Link {
    pub(crate) fn new(
        node_count: usize,
        edges: &[super::SimLink],
        rest_length: f32,
        strength: Option<f32>,
    ) -> Self {
        let mut degree = vec![0usize; node_count];
        for edge in edges {
            if edge.source < node_count && edge.target < node_count && edge.source != edge.target {
                degree[edge.source] += 1;
                degree[edge.target] += 1;
            }
        }

        let springs = edges
            .iter()
            .filter(|edge| {
                edge.source < node_count && edge.target < node_count && edge.source != edge.target
            })
            .map(|edge| {
                let source_degree = degree[edge.source] as f32;
                let target_degree = degree[edge.target] as f32;
                Spring {
                    source: edge.source,
                    target: edge.target,
                    rest_length: edge.rest_length.unwrap_or(rest_length),
                    strength: strength.unwrap_or(1.0 / source_degree.min(target_degree)),
                    bias: source_degree / (source_degree + target_degree),
                }
            })
            .collect();

        Self { springs }
    }
}

impl Force for Link {
    fn name(&self) -> &'static str {
        "link"
    }

    fn accumulate(&self, ctx: &ForceContext<'_>, deltas: &mut [Vec2]) {
        let nodes = ctx.nodes;
        for spring in &self.springs {
            let source = &nodes[spring.source];
            let target = &nodes[spring.target];
            let mut delta =
                (target.position + target.velocity) - (source.position + source.velocity);
            if delta.length_sq() <= f32::EPSILON {
                delta = jiggle(spring.source, spring.target) * 0.001;
            }
            let distance = delta.length();
            let stretch = (distance - spring.rest_length) / distance * ctx.alpha * spring.strength;
            let pull = delta * stretch;

            deltas[spring.target] -= pull * spring.bias;
            deltas[spring.source] += pull * (1.0 - spring.bias);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::SimLink;
    use super::*;

    fn node(x: f32, y: f32, radius: f32) -> SimNode {
        SimNode {
            position: vec2(x, y),
            velocity: Vec2::ZERO,
            radius,
            pinned: false,
            rejoining: false,
        }
    }

    fn deltas_for(force: &dyn Force, nodes: &[SimNode], alpha: f32) -> Vec<Vec2> {
        let positions = nodes.iter().map(|node| node.position).collect::<Vec<_>>();
        let radii = nodes.iter().map(|node| node.radius).collect::<Vec<_>>();
        let tree = TreeCell::build(&positions, &radii);
        let ctx = ForceContext {
            nodes,
            alpha,
            tree: tree.as_ref(),
        };
        let mut deltas = vec![Vec2::ZERO; nodes.len()];
        force.accumulate(&ctx, &mut deltas);
        deltas
    }

    #[test]
    fn negative_charge_pushes_nodes_apart() {
        let nodes = [node(0.0, 0.0, 1.0), node(10.0, 0.0, 1.0)];
        let force = ManyBody {
            strength: -200.0,
            theta: 0.9,
            min_distance: 1.0,
        };
        let deltas = deltas_for(&force, &nodes, 1.0);
        assert!(deltas[0].x < 0.0);
        assert!(deltas[1].x > 0.0);
        assert!((deltas[0].x + 20.0).abs() < 1e-4);
    }

    #[test]
    fn coincident_nodes_do_not_produce_nan() {
        let nodes = [node(3.0, 3.0, 1.0), node(3.0, 3.0, 1.0)];
        let force = ManyBody {
            strength: -30.0,
            theta: 0.9,
            min_distance: 1.0,
        };
        let deltas = deltas_for(&force, &nodes, 1.0);
        assert!(deltas.iter().all(|delta| delta.x.is_finite() && delta.y.is_finite()));
        assert!(deltas[0].length() > 0.0);
    }

    #[test]
    fn center_pull_grows_with_distance() {
        let nodes = [node(10.0, 0.0, 1.0), node(0.0, 40.0, 1.0)];
        let force = Center {
            target: Vec2::ZERO,
            strength: 0.1,
        };
        let deltas = deltas_for(&force, &nodes, 0.5);
        assert_eq!(deltas[0], vec2(-0.5, 0.0));
        assert_eq!(deltas[1], vec2(0.0, -2.0));
    }

    #[test]
    fn springs_pull_stretched_pairs_together() {
        let nodes = [node(0.0, 0.0, 1.0), node(300.0, 0.0, 1.0)];
        let link = Link::new(
            2,
            &[SimLink {
                source: 0,
                target: 1,
                rest_length: None,
            }],
            100.0,
            None,
        );
        let deltas = deltas_for(&link, &nodes, 1.0);
        assert!(deltas[0].x > 0.0);
        assert!(deltas[1].x < 0.0);
    }

    #[test]
    fn relaxation_separates_overlapping_discs() {
        let mut nodes = vec![
            node(0.0, 0.0, 10.0),
            node(4.0, 0.0, 10.0),
            node(0.0, 3.0, 10.0),
            node(2.0, 2.0, 10.0),
            node(2.0, 2.0, 10.0),
        ];
        let collide = Collide {
            strength: 0.7,
            passes: 200,
            tolerance: 1e-3,
        };
        assert!(collide.relax(&mut nodes) > 0);

        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                let distance = (nodes[i].position - nodes[j].position).length();
                assert!(distance >= 20.0 - 1e-2, "{i}/{j} overlap: {distance}");
            }
        }
    }

    #[test]
    fn exhausted_budget_scales_the_cluster_out() {
        let mut nodes = (0..64)
            .map(|i| node((i % 8) as f32, (i / 8) as f32, 25.0))
            .collect::<Vec<_>>();
        nodes[9].pinned = true;
        let anchor = nodes[9].position;
        let collide = Collide {
            strength: 0.7,
            passes: 1,
            tolerance: 1e-3,
        };
        collide.relax(&mut nodes);

        assert_eq!(nodes[9].position, anchor);
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                let distance = (nodes[i].position - nodes[j].position).length();
                assert!(distance >= 50.0 - 1e-2, "{i}/{j} overlap: {distance}");
            }
        }
    }

    #[test]
    fn relaxation_never_moves_pinned_nodes() {
        let mut nodes = vec![node(0.0, 0.0, 10.0), node(5.0, 0.0, 10.0)];
        nodes[0].pinned = true;
        let collide = Collide {
            strength: 0.7,
            passes: 8,
            tolerance: 1e-3,
        };
        collide.relax(&mut nodes);
        assert_eq!(nodes[0].position, Vec2::ZERO);
        assert!(nodes[1].position.x >= 20.0 - 1e-2);
    }
}
