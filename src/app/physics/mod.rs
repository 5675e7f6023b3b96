//! 2D force-directed layout.
//!
//! A [`Simulation`] owns one node set and integrates it under a list of
//! [`Force`]s. Alpha starts at 1 and decays multiplicatively toward its
//! target every tick; any perturbation (pin, drag, unpin, parameter change)
//! reheats it to the restart value.

mod forces;
mod quadtree;

use eframe::egui::{Vec2, vec2};
use tracing::debug;

use forces::{Center, Collide, Force, ForceContext, Link, ManyBody};
use quadtree::TreeCell;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SimulationParams {
    pub(crate) center: Vec2,
    pub(crate) charge: f32,
    pub(crate) theta: f32,
    pub(crate) min_distance: f32,
    pub(crate) link_distance: f32,
    pub(crate) link_strength: Option<f32>,
    pub(crate) collide_radius: f32,
    pub(crate) collide_strength: f32,
    pub(crate) collide_passes: usize,
    pub(crate) center_strength: f32,
    pub(crate) velocity_decay: f32,
    pub(crate) max_speed: f32,
    pub(crate) alpha_min: f32,
    pub(crate) alpha_decay: f32,
    pub(crate) alpha_restart: f32,
    pub(crate) settle_energy: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            center: vec2(400.0, 300.0),
            charge: -200.0,
            theta: 0.9,
            min_distance: 1.0,
            link_distance: 100.0,
            link_strength: None,
            collide_radius: 50.0,
            collide_strength: 0.7,
            collide_passes: 32,
            center_strength: 0.05,
            velocity_decay: 0.4,
            max_speed: 60.0,
            alpha_min: 0.001,
            alpha_decay: 1.0 - 0.001_f32.powf(1.0 / 300.0),
            alpha_restart: 0.3,
            settle_energy: 0.05,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Cold,
    Running,
    Settling,
    Idle,
}

impl Phase {
    /// How many display frames pass between ticks, `None` when the layout is at rest.
    pub(crate) fn tick_interval(self) -> Option<u64> {
        match self {
            Self::Running => Some(1),
            Self::Settling => Some(2),
            Self::Cold | Self::Idle => None,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::Running => "running",
            Self::Settling => "settling",
            Self::Idle => "idle",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SimNode {
    pub(crate) position: Vec2,
    pub(crate) velocity: Vec2,
    pub(crate) radius: f32,
    pub(crate) pinned: bool,
    /// Set on release: the next tick holds the node still so it rejoins
    /// the layout without a kick.
    pub(crate) rejoining: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SimLink {
    pub(crate) source: usize,
    pub(crate) target: usize,
    pub(crate) rest_length: Option<f32>,
}

pub(crate) struct Simulation {
    nodes: Vec<SimNode>,
    links: Vec<SimLink>,
    params: SimulationParams,
    forces: Vec<Box<dyn Force>>,
    alpha: f32,
    alpha_target: f32,
    phase: Phase,
    /// Kinetic energy of the previous tick; later ticks may not exceed it.
    /// Cleared on reheat and while anything is pinned.
    energy_ceiling: Option<f32>,
    visual_radii: Vec<f32>,
    deltas: Vec<Vec2>,
    ticks: u64,
}

impl Simulation {
    /// `radii` are the visual radii; the collision radius never drops below them.
    pub(crate) fn new(
        positions: &[Vec2],
        radii: &[f32],
        links: Vec<SimLink>,
        params: SimulationParams,
    ) -> Self {
        let nodes = positions
            .iter()
            .enumerate()
            .map(|(index, &position)| SimNode {
                position,
                velocity: Vec2::ZERO,
                radius: radii
                    .get(index)
                    .copied()
                    .unwrap_or(0.0)
                    .max(params.collide_radius),
                pinned: false,
                rejoining: false,
            })
            .collect::<Vec<_>>();

        let phase = if nodes.is_empty() {
            Phase::Cold
        } else {
            Phase::Running
        };
        let mut simulation = Self {
            visual_radii: (0..positions.len())
                .map(|index| radii.get(index).copied().unwrap_or(0.0))
                .collect(),
            deltas: vec![Vec2::ZERO; nodes.len()],
            forces: Vec::new(),
            nodes,
            links,
            params,
            alpha: 1.0,
            alpha_target: 0.0,
            phase,
            energy_ceiling: None,
            ticks: 0,
        };
        simulation.forces = simulation.build_forces();
        simulation
    }

    fn build_forces(&self) -> Vec<Box<dyn Force>> {
        let params = &self.params;
        vec![
            Box::new(ManyBody {
                strength: params.charge,
                theta: params.theta,
                min_distance: params.min_distance,
            }),
            Box::new(Center {
                target: params.center,
                strength: params.center_strength,
            }),
            Box::new(Collide {
                strength: params.collide_strength,
                passes: params.collide_passes,
                tolerance: 1e-3,
            }),
            Box::new(Link::new(
                self.nodes.len(),
                &self.links,
                params.link_distance,
                params.link_strength,
            )),
        ]
    }

    pub(crate) fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    pub(crate) fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub(crate) fn alpha(&self) -> f32 {
        self.alpha
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn ticks(&self) -> u64 {
        self.ticks
    }

    pub(crate) fn force_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.forces.iter().map(|force| force.name())
    }

    pub(crate) fn kinetic_energy(&self) -> f32 {
        self.nodes
            .iter()
            .filter(|node| !node.pinned)
            .map(|node| 0.5 * node.velocity.length_sq())
            .sum()
    }

    pub(crate) fn set_params(&mut self, params: SimulationParams) {
        if params == self.params {
            return;
        }
        for (node, visual) in self.nodes.iter_mut().zip(&self.visual_radii) {
            node.radius = visual.max(params.collide_radius);
        }
        self.params = params;
        self.forces = self.build_forces();
        self.reheat();
    }

    /// Restarts the layout after a perturbation.
    pub(crate) fn reheat(&mut self) {
        if self.nodes.is_empty() {
            return;
        }
        self.alpha = self.params.alpha_restart;
        self.energy_ceiling = None;
        if self.phase != Phase::Running {
            debug!(from = self.phase.label(), "simulation reheated");
        }
        self.phase = Phase::Running;
    }

    pub(crate) fn pin(&mut self, index: usize) {
        let Some(node) = self.nodes.get_mut(index) else {
            return;
        };
        node.pinned = true;
        node.rejoining = false;
        node.velocity = Vec2::ZERO;
        self.alpha_target = self.params.alpha_restart;
        self.reheat();
    }

    /// Moves a pinned node straight to `position`; unpinned nodes are left alone.
    pub(crate) fn drag_to(&mut self, index: usize, position: Vec2) {
        let Some(node) = self.nodes.get_mut(index) else {
            return;
        };
        if !node.pinned || !position.x.is_finite() || !position.y.is_finite() {
            return;
        }
        node.position = position;
        self.reheat();
    }

    pub(crate) fn unpin(&mut self, index: usize) {
        let Some(node) = self.nodes.get_mut(index) else {
            return;
        };
        if !node.pinned {
            return;
        }
        node.pinned = false;
        node.velocity = Vec2::ZERO;
        node.rejoining = true;
        if !self.nodes.iter().any(|node| node.pinned) {
            self.alpha_target = 0.0;
        }
        self.reheat();
    }

    pub(crate) fn positions(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.nodes.iter().map(|node| node.position)
    }

    /// Advances one step. Returns `false` when nothing was integrated.
    pub(crate) fn tick(&mut self) -> bool {
        if self.nodes.is_empty() {
            self.phase = Phase::Cold;
            return false;
        }
        if self.phase == Phase::Idle {
            return false;
        }

        self.alpha += (self.alpha_target - self.alpha) * self.params.alpha_decay;

        let positions = self.nodes.iter().map(|node| node.position).collect::<Vec<_>>();
        let radii = self.nodes.iter().map(|node| node.radius).collect::<Vec<_>>();
        let tree = TreeCell::build(&positions, &radii);

        self.deltas.clear();
        self.deltas.resize(self.nodes.len(), Vec2::ZERO);
        let ctx = ForceContext {
            nodes: &self.nodes,
            alpha: self.alpha,
            tree: tree.as_ref(),
        };
        for force in &self.forces {
            force.accumulate(&ctx, &mut self.deltas);
        }

        let retain = 1.0 - self.params.velocity_decay.clamp(0.0, 1.0);
        let max_speed_sq = self.params.max_speed * self.params.max_speed;
        for (node, delta) in self.nodes.iter_mut().zip(&self.deltas) {
            if node.pinned || node.rejoining {
                node.velocity = Vec2::ZERO;
                continue;
            }
            let mut velocity = (node.velocity + *delta) * retain;
            if !velocity.x.is_finite() || !velocity.y.is_finite() {
                velocity = Vec2::ZERO;
            }
            let speed_sq = velocity.length_sq();
            if speed_sq > max_speed_sq {
                velocity *= self.params.max_speed / speed_sq.sqrt();
            }
            node.velocity = velocity;
        }

        let any_pinned = self.nodes.iter().any(|node| node.pinned);
        let mut energy = self.kinetic_energy();
        if let Some(ceiling) = self.energy_ceiling
            && !any_pinned
            && energy > ceiling
        {
            let scale = if energy > 0.0 {
                (ceiling / energy).sqrt()
            } else {
                0.0
            };
            for node in self.nodes.iter_mut().filter(|node| !node.pinned) {
                node.velocity *= scale;
            }
            energy = self.kinetic_energy().min(ceiling);
        }
        self.energy_ceiling = (!any_pinned).then_some(energy);

        for node in &mut self.nodes {
            if node.pinned || node.rejoining {
                node.rejoining = false;
                continue;
            }
            node.position += node.velocity;
        }

        for force in &self.forces {
            force.relax(&mut self.nodes);
        }

        self.ticks += 1;
        let next_phase = if self.alpha < self.params.alpha_min {
            Phase::Idle
        } else if energy / (self.nodes.len() as f32) < self.params.settle_energy {
            Phase::Settling
        } else {
            Phase::Running
        };
        if next_phase != self.phase {
            debug!(
                from = self.phase.label(),
                to = next_phase.label(),
                alpha = self.alpha,
                ticks = self.ticks,
                "simulation phase changed"
            );
            self.phase = next_phase;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(count: usize, radius: f32) -> Vec<Vec2> {
        (0..count)
            .map(|i| {
                let angle = i as f32 / count as f32 * std::f32::consts::TAU;
                vec2(400.0, 300.0) + vec2(angle.cos(), angle.sin()) * radius
            })
            .collect()
    }

    fn star_links(count: usize) -> Vec<SimLink> {
        (1..count)
            .map(|target| SimLink {
                source: 0,
                target,
                rest_length: None,
            })
            .collect()
    }

    fn small_params() -> SimulationParams {
        SimulationParams {
            collide_radius: 12.0,
            ..SimulationParams::default()
        }
    }

    #[test]
    fn empty_simulation_stays_cold() {
        let mut simulation = Simulation::new(&[], &[], Vec::new(), SimulationParams::default());
        assert_eq!(simulation.phase(), Phase::Cold);
        assert!(!simulation.tick());
        simulation.reheat();
        assert_eq!(simulation.phase(), Phase::Cold);
    }

    #[test]
    fn alpha_decays_multiplicatively() {
        let positions = ring(6, 50.0);
        let params = small_params();
        let mut simulation = Simulation::new(&positions, &[8.0; 6], star_links(6), params);

        let mut previous = simulation.alpha();
        for _ in 0..20 {
            simulation.tick();
            let expected = previous * (1.0 - params.alpha_decay);
            assert!((simulation.alpha() - expected).abs() < 1e-6);
            previous = simulation.alpha();
        }
    }

    #[test]
    fn kinetic_energy_never_rises_without_pins() {
        let positions = ring(24, 30.0);
        let mut simulation =
            Simulation::new(&positions, &[8.0; 24], star_links(24), small_params());

        simulation.tick();
        let mut previous = simulation.kinetic_energy();
        for _ in 0..250 {
            simulation.tick();
            let energy = simulation.kinetic_energy();
            assert!(energy <= previous * (1.0 + 1e-4) + 1e-6, "{energy} > {previous}");
            previous = energy;
        }
    }

    #[test]
    fn layout_eventually_goes_idle_and_wakes_on_pin() {
        let positions = ring(5, 80.0);
        let mut simulation = Simulation::new(&positions, &[8.0; 5], star_links(5), small_params());

        let mut ticks = 0;
        while simulation.tick() {
            ticks += 1;
            assert!(ticks < 10_000, "simulation never cooled down");
        }
        assert_eq!(simulation.phase(), Phase::Idle);
        assert_eq!(simulation.phase().tick_interval(), None);

        simulation.pin(2);
        assert_eq!(simulation.phase(), Phase::Running);
        assert_eq!(simulation.alpha(), simulation.params().alpha_restart);
        assert!(simulation.tick());
    }

    #[test]
    fn perturbations_reset_alpha_to_restart() {
        let positions = ring(8, 60.0);
        let mut simulation = Simulation::new(&positions, &[8.0; 8], star_links(8), small_params());
        for _ in 0..40 {
            simulation.tick();
        }
        let restart = simulation.params().alpha_restart;

        simulation.pin(3);
        assert_eq!(simulation.alpha(), restart);
        simulation.tick();
        simulation.drag_to(3, vec2(10.0, 10.0));
        assert_eq!(simulation.alpha(), restart);
        simulation.tick();
        simulation.unpin(3);
        assert_eq!(simulation.alpha(), restart);
    }

    #[test]
    fn pinned_node_follows_the_pointer_exactly() {
        let positions = ring(10, 40.0);
        let mut simulation =
            Simulation::new(&positions, &[8.0; 10], star_links(10), small_params());

        simulation.pin(0);
        for step in 0..30 {
            let pointer = vec2(100.0 + step as f32 * 7.5, 220.0 - step as f32 * 3.25);
            simulation.drag_to(0, pointer);
            simulation.tick();
            assert_eq!(simulation.nodes()[0].position, pointer);
            assert_eq!(simulation.nodes()[0].velocity, Vec2::ZERO);
        }
    }

    #[test]
    fn released_node_rejoins_without_a_kick() {
        let positions = ring(10, 40.0);
        let mut simulation =
            Simulation::new(&positions, &[8.0; 10], star_links(10), small_params());

        simulation.pin(4);
        simulation.drag_to(4, vec2(700.0, 500.0));
        simulation.tick();
        simulation.unpin(4);
        assert!(!simulation.nodes()[4].pinned);

        simulation.tick();
        assert_eq!(simulation.nodes()[4].velocity, Vec2::ZERO);
        simulation.tick();
        assert!(simulation.nodes()[4].velocity.length() > 0.0);
    }

    #[test]
    fn drag_ignores_unpinned_nodes_and_bad_coordinates() {
        let positions = ring(3, 40.0);
        let mut simulation = Simulation::new(&positions, &[8.0; 3], Vec::new(), small_params());
        simulation.drag_to(1, vec2(0.0, 0.0));
        assert_eq!(simulation.nodes()[1].position, positions[1]);

        simulation.pin(1);
        simulation.drag_to(1, vec2(f32::NAN, 0.0));
        assert_eq!(simulation.nodes()[1].position, positions[1]);
        simulation.drag_to(99, vec2(1.0, 1.0));
    }

    #[test]
    fn collision_relaxation_holds_after_every_tick() {
        let positions = (0..16)
            .map(|i| vec2(400.0 + (i % 4) as f32 * 2.0, 300.0 + (i / 4) as f32 * 2.0))
            .collect::<Vec<_>>();
        let mut simulation = Simulation::new(
            &positions,
            &[6.0; 16],
            star_links(16),
            SimulationParams {
                collide_radius: 15.0,
                collide_passes: 500,
                ..SimulationParams::default()
            },
        );

        for _ in 0..30 {
            simulation.tick();
            let nodes = simulation.nodes();
            for i in 0..nodes.len() {
                for j in (i + 1)..nodes.len() {
                    let distance = (nodes[i].position - nodes[j].position).length();
                    let reach = nodes[i].radius + nodes[j].radius;
                    assert!(distance >= reach - 1e-2, "{i}/{j}: {distance} < {reach}");
                }
            }
        }
    }

    #[test]
    fn dense_cluster_clears_overlap_with_default_params() {
        let count = 100;
        let positions = (0..count)
            .map(|i| vec2(380.0 + (i % 10) as f32 * 4.0, 280.0 + (i / 10) as f32 * 4.0))
            .collect::<Vec<_>>();
        let mut simulation = Simulation::new(
            &positions,
            &[8.0; 100],
            star_links(count),
            SimulationParams::default(),
        );

        for tick in 0..40 {
            simulation.tick();
            let nodes = simulation.nodes();
            for i in 0..nodes.len() {
                for j in (i + 1)..nodes.len() {
                    let distance = (nodes[i].position - nodes[j].position).length();
                    let reach = nodes[i].radius + nodes[j].radius;
                    assert!(
                        distance >= reach - 1e-2,
                        "tick {tick}, {i}/{j}: {distance} < {reach}"
                    );
                }
            }
        }
    }

    #[test]
    fn collision_radius_never_undercuts_visual_radius() {
        let simulation = Simulation::new(
            &[vec2(0.0, 0.0), vec2(50.0, 0.0)],
            &[40.0, 4.0],
            Vec::new(),
            small_params(),
        );
        assert_eq!(simulation.nodes()[0].radius, 40.0);
        assert_eq!(simulation.nodes()[1].radius, 12.0);
        assert_eq!(
            simulation.force_names().collect::<Vec<_>>(),
            ["many-body", "center", "collide", "link"]
        );
    }
}
