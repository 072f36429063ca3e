//! Incremental force-directed layout.
//!
//! The engine owns a working copy of every node's position and velocity and
//! advances it one tick per frame while it is [`LayoutState::Settling`].

mod forces;
mod quadtree;

use std::collections::HashMap;
use std::f32::consts::TAU;

use eframe::egui::{Vec2, vec2};
use tracing::{debug, warn};

use crate::config::LayoutConfig;
use crate::model::{GraphModel, Node, NodeId, Position};
use crate::util::stable_pair;
use forces::{ChargeParams, SpringParams, apply_centering, apply_springs, charge_on, resolve_collisions};
use quadtree::QuadTree;

/// Graph-space point every unpinned node is gently pulled toward.
pub const LAYOUT_CENTER: Vec2 = Vec2::ZERO;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutState {
    /// No nodes to lay out.
    Idle,
    Settling,
    /// Motion fell below the energy threshold; ticks are no-ops until woken.
    Converged,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pin {
    Free,
    /// Held at `at`; the engine never moves a pinned node itself.
    Pinned { at: Vec2 },
}

#[derive(Clone, Debug)]
pub struct LayoutNode {
    pub id: NodeId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub pin: Pin,
    /// Last model position this node adopted. A model position equal to it
    /// is old news and never overrides the simulation.
    reported: Option<Position>,
}

impl LayoutNode {
    fn new(id: NodeId, position: Vec2, reported: Option<Position>) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            pin: Pin::Free,
            reported,
        }
    }

    pub fn is_pinned(&self) -> bool {
        matches!(self.pin, Pin::Pinned { .. })
    }

    fn adopt(&mut self, reported: Option<Position>) -> bool {
        let Some(position) = reported.filter(|position| position.is_finite()) else {
            return false;
        };
        if self.is_pinned() || self.reported == Some(position) {
            return false;
        }

        self.position = position.to_vec2();
        self.velocity = Vec2::ZERO;
        self.reported = Some(position);
        true
    }
}

#[derive(Default)]
struct Scratch {
    positions: Vec<Vec2>,
    forces: Vec<Vec2>,
}

pub struct LayoutEngine {
    config: LayoutConfig,
    nodes: Vec<LayoutNode>,
    index_by_id: HashMap<NodeId, usize>,
    links: Vec<(usize, usize)>,
    state: LayoutState,
    alpha: f32,
    alpha_target: f32,
    calm_ticks: u32,
    energy: f32,
    synced: Option<(u64, u64)>,
    scratch: Scratch,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            index_by_id: HashMap::new(),
            links: Vec::new(),
            state: LayoutState::Idle,
            alpha: 1.0,
            alpha_target: 0.0,
            calm_ticks: 0,
            energy: 0.0,
            synced: None,
            scratch: Scratch::default(),
        }
    }

    pub fn state(&self) -> LayoutState {
        self.state
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Mean kinetic energy of the free nodes after the last tick.
    pub fn energy(&self) -> f32 {
        self.energy
    }

    #[cfg(test)]
    pub fn nodes(&self) -> &[LayoutNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&LayoutNode> {
        self.index_by_id.get(id).map(|&index| &self.nodes[index])
    }

    pub fn position(&self, id: &str) -> Option<Vec2> {
        self.node(id).map(|node| node.position)
    }

    pub fn is_pinned(&self, id: &str) -> bool {
        self.node(id).is_some_and(LayoutNode::is_pinned)
    }

    pub fn any_pinned(&self) -> bool {
        self.nodes.iter().any(LayoutNode::is_pinned)
    }

    /// Brings the working set in line with `model`.
    ///
    /// Existing nodes keep their simulated position unless the model reports
    /// a position they have not adopted before. New nodes are seeded from
    /// the model, next to an already placed neighbour, or around the center.
    /// Returns whether anything changed.
    pub fn sync(&mut self, model: &GraphModel) -> bool {
        let key = (model.structure_revision(), model.revision());
        if self.synced == Some(key) {
            return false;
        }
        self.synced = Some(key);

        let mut previous: HashMap<NodeId, LayoutNode> = self
            .nodes
            .drain(..)
            .map(|node| (node.id.clone(), node))
            .collect();

        let mut unplaced = Vec::new();
        let mut added = 0usize;
        let mut adopted = 0usize;
        for node in model.nodes() {
            match previous.remove(&node.id) {
                Some(mut existing) => {
                    if existing.adopt(node.position) {
                        adopted += 1;
                    }
                    self.nodes.push(existing);
                }
                None => {
                    added += 1;
                    match seed_from_model(node) {
                        Some(seeded) => self.nodes.push(seeded),
                        None => {
                            unplaced.push(self.nodes.len());
                            self.nodes.push(LayoutNode::new(node.id.clone(), LAYOUT_CENTER, None));
                        }
                    }
                }
            }
        }
        let removed = previous.len();

        self.index_by_id = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect();

        let links: Vec<(usize, usize)> = model
            .renderable_connections()
            .filter(|connection| !connection.is_self_loop())
            .filter_map(|connection| {
                Some((
                    *self.index_by_id.get(&connection.source)?,
                    *self.index_by_id.get(&connection.target)?,
                ))
            })
            .collect();
        let links_changed = links != self.links;
        self.links = links;

        self.seed_unplaced(&unplaced);

        debug!(added, removed, adopted, links = self.links.len(), "layout synced");

        if self.nodes.is_empty() {
            self.state = LayoutState::Idle;
            return added + removed > 0;
        }

        let changed = added > 0 || removed > 0 || links_changed || adopted > 0;
        if changed || self.state == LayoutState::Idle {
            self.wake(self.config.reheat_alpha);
        }
        changed
    }

    fn seed_unplaced(&mut self, unplaced: &[usize]) {
        let mut placed = vec![true; self.nodes.len()];
        for &index in unplaced {
            placed[index] = false;
        }

        for &index in unplaced {
            let anchor = self.links.iter().find_map(|&(source, target)| {
                let other = if source == index {
                    target
                } else if target == index {
                    source
                } else {
                    return None;
                };
                placed[other].then_some(self.nodes[other].position)
            });

            let (jitter_x, jitter_y) = stable_pair(&self.nodes[index].id);
            let jitter = nonzero_direction(vec2(jitter_x, jitter_y), index);
            self.nodes[index].position = match anchor {
                Some(anchor) => anchor + jitter * (self.config.link_distance * 0.5),
                None => LAYOUT_CENTER + jitter * self.config.seed_radius,
            };
            placed[index] = true;
        }
    }

    fn wake(&mut self, alpha_floor: f32) {
        if self.nodes.is_empty() {
            self.state = LayoutState::Idle;
            return;
        }
        self.alpha = self.alpha.max(alpha_floor);
        self.calm_ticks = 0;
        self.state = LayoutState::Settling;
    }

    /// Full-energy re-layout. A node held by an active drag stays pinned.
    pub fn restart(&mut self) {
        self.alpha = 1.0;
        self.wake(1.0);
    }

    /// Holds `id` at its current position. Returns false for unknown ids.
    pub fn pin(&mut self, id: &str) -> bool {
        let Some(&index) = self.index_by_id.get(id) else {
            return false;
        };
        let node = &mut self.nodes[index];
        node.pin = Pin::Pinned { at: node.position };
        node.velocity = Vec2::ZERO;

        self.alpha_target = self.config.drag_alpha_target;
        self.wake(0.0);
        true
    }

    pub fn move_pinned(&mut self, id: &str, to: Vec2) -> bool {
        let Some(&index) = self.index_by_id.get(id) else {
            return false;
        };
        let node = &mut self.nodes[index];
        if !node.is_pinned() || !(to.x.is_finite() && to.y.is_finite()) {
            return false;
        }
        node.pin = Pin::Pinned { at: to };
        node.position = to;

        if self.state == LayoutState::Converged {
            self.wake(0.0);
        }
        true
    }

    /// Releases `id` and returns where it was held. The released position
    /// counts as already reported, so a later load carrying it is a no-op.
    pub fn unpin(&mut self, id: &str) -> Option<Vec2> {
        let &index = self.index_by_id.get(id)?;
        let node = &mut self.nodes[index];
        let Pin::Pinned { at } = node.pin else {
            return None;
        };
        node.pin = Pin::Free;
        node.position = at;
        node.velocity = Vec2::ZERO;
        node.reported = Some(Position::from(at));

        if !self.any_pinned() {
            self.alpha_target = 0.0;
        }
        Some(at)
    }

    /// Advances the simulation by one step. Returns whether any node moved.
    pub fn tick(&mut self) -> bool {
        if self.state != LayoutState::Settling {
            return false;
        }

        self.recover_non_finite();
        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;

        let count = self.nodes.len();
        let config = self.config;
        let alpha = self.alpha;

        self.scratch.positions.clear();
        self.scratch.positions.extend(self.nodes.iter().map(|node| match node.pin {
            Pin::Pinned { at } => at,
            Pin::Free => node.position,
        }));
        self.scratch.forces.clear();
        self.scratch.forces.resize(count, Vec2::ZERO);
        let positions = &self.scratch.positions;
        let forces = &mut self.scratch.forces;

        if count > 1
            && let Some(tree) = QuadTree::build(positions)
        {
            let charge = ChargeParams {
                strength: config.charge_strength,
                min_distance_sq: config.charge_min_distance * config.charge_min_distance,
                theta: config.barnes_hut_theta,
            };
            for (index, force) in forces.iter_mut().enumerate() {
                *force += charge_on(&tree, index, positions, charge, alpha);
            }
            resolve_collisions(
                &tree,
                positions,
                config.collision_radius,
                config.collision_strength,
                forces,
            );
        }

        apply_springs(
            &self.links,
            positions,
            SpringParams {
                rest_length: config.link_distance,
                strength: config.link_strength,
            },
            alpha,
            forces,
        );
        apply_centering(positions, LAYOUT_CENTER, config.center_strength, alpha, forces);

        let retain = 1.0 - config.velocity_decay;
        let max_step_sq = config.max_displacement * config.max_displacement;
        let mut moved = false;
        let mut energy = 0.0_f32;
        let mut free = 0usize;

        for (node, force) in self.nodes.iter_mut().zip(forces.iter()) {
            if let Pin::Pinned { at } = node.pin {
                node.position = at;
                node.velocity = Vec2::ZERO;
                continue;
            }

            let mut velocity = (node.velocity + *force) * retain;
            let speed_sq = velocity.length_sq();
            if speed_sq > max_step_sq {
                velocity *= config.max_displacement / speed_sq.sqrt();
            }

            node.velocity = velocity;
            node.position += velocity;
            moved |= velocity != Vec2::ZERO;
            energy += 0.5 * velocity.length_sq();
            free += 1;
        }

        self.energy = if free == 0 { 0.0 } else { energy / free as f32 };
        if !self.energy.is_finite() {
            self.recover_non_finite();
            self.energy = 0.0;
            self.calm_ticks = 0;
            return true;
        }

        let cooled = self.alpha < config.alpha_min && self.alpha_target < config.alpha_min;
        if self.energy < config.energy_epsilon || cooled {
            self.calm_ticks += 1;
        } else {
            self.calm_ticks = 0;
        }
        if self.calm_ticks >= config.calm_ticks {
            self.settle();
        }
        moved
    }

    fn settle(&mut self) {
        for node in &mut self.nodes {
            node.velocity = Vec2::ZERO;
        }
        self.state = LayoutState::Converged;
        debug!(alpha = self.alpha, nodes = self.nodes.len(), "layout converged");
    }

    fn recover_non_finite(&mut self) {
        let seed_radius = self.config.seed_radius;
        for (index, node) in self.nodes.iter_mut().enumerate() {
            let pin_ok = match node.pin {
                Pin::Pinned { at } => finite(at),
                Pin::Free => true,
            };
            if finite(node.position) && finite(node.velocity) && pin_ok {
                continue;
            }

            let (x, y) = stable_pair(&node.id);
            let reseeded = LAYOUT_CENTER + nonzero_direction(vec2(x, y), index) * seed_radius;
            warn!(node = %node.id, "non-finite layout state, reseeding node");
            node.position = reseeded;
            node.velocity = Vec2::ZERO;
            if node.is_pinned() {
                node.pin = Pin::Pinned { at: reseeded };
            }
        }
    }
}

fn seed_from_model(node: &Node) -> Option<LayoutNode> {
    let position = node.position.filter(|position| position.is_finite())?;
    Some(LayoutNode::new(
        node.id.clone(),
        position.to_vec2(),
        Some(position),
    ))
}

fn finite(value: Vec2) -> bool {
    value.x.is_finite() && value.y.is_finite()
}

fn nonzero_direction(value: Vec2, index: usize) -> Vec2 {
    if value.length_sq() > 1e-6 {
        return value;
    }
    let angle = (index as f32 * 0.618_034).fract() * TAU;
    vec2(angle.cos(), angle.sin())
}
