use std::f32::consts::TAU;

use eframe::egui::{Vec2, vec2};

use super::quadtree::QuadTree;

#[derive(Clone, Copy, Debug)]
pub(super) struct ChargeParams {
    pub(super) strength: f32,
    pub(super) min_distance_sq: f32,
    pub(super) theta: f32,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct SpringParams {
    pub(super) rest_length: f32,
    pub(super) strength: f32,
}

/// Unit vector pointing from `b` to `a`. Coincident points get a fixed
/// angle derived from their indices so the pair still separates.
fn separation(delta: Vec2, a: usize, b: usize) -> (Vec2, f32) {
    let distance = delta.length();
    if distance > 1e-4 {
        return (delta / distance, distance);
    }

    let (low, high) = if a < b { (a, b) } else { (b, a) };
    let angle = (low as f32 * 0.618_034 + high as f32 * 0.414_214).fract() * TAU;
    let direction = vec2(angle.cos(), angle.sin());
    (if a < b { direction } else { -direction }, 0.0)
}

/// Barnes-Hut repulsion felt by point `index`, scaled by `alpha`.
pub(super) fn charge_on(
    tree: &QuadTree,
    index: usize,
    positions: &[Vec2],
    params: ChargeParams,
    alpha: f32,
) -> Vec2 {
    let point = positions[index];
    let mut total = Vec2::ZERO;
    let mut stack = vec![tree.root()];

    while let Some(cell_index) = stack.pop() {
        let cell = tree.cell(cell_index);
        if cell.mass <= 0.0 {
            continue;
        }

        if cell.is_leaf() {
            for &other in &cell.members {
                if other == index {
                    continue;
                }
                let (direction, distance) = separation(point - positions[other], index, other);
                let distance_sq = (distance * distance).max(params.min_distance_sq);
                total += direction * (params.strength / distance_sq);
            }
            continue;
        }

        let delta = point - cell.centroid;
        let distance_sq = delta.length_sq().max(params.min_distance_sq);
        let far_enough = !cell.square.contains(point)
            && cell.square.side() * cell.square.side() < params.theta * params.theta * distance_sq;

        if far_enough {
            let direction = delta / distance_sq.sqrt();
            total += direction * (params.strength * cell.mass / distance_sq);
        } else {
            stack.extend(cell.children.iter().flatten().copied());
        }
    }

    total * alpha
}

/// Pushes apart every pair closer than `2 * radius`. Applied at full
/// strength whatever the current alpha.
pub(super) fn resolve_collisions(
    tree: &QuadTree,
    positions: &[Vec2],
    radius: f32,
    strength: f32,
    forces: &mut [Vec2],
) {
    let min_gap = radius * 2.0;
    if min_gap <= 0.0 {
        return;
    }

    for (index, &point) in positions.iter().enumerate() {
        tree.for_each_near(point, min_gap, |other| {
            if other <= index {
                return;
            }
            let (direction, distance) = separation(point - positions[other], index, other);
            if distance >= min_gap {
                return;
            }
            let push = direction * ((min_gap - distance) * strength * 0.5);
            forces[index] += push;
            forces[other] -= push;
        });
    }
}

/// Springs pulling linked endpoints toward `rest_length`.
pub(super) fn apply_springs(
    links: &[(usize, usize)],
    positions: &[Vec2],
    params: SpringParams,
    alpha: f32,
    forces: &mut [Vec2],
) {
    for &(source, target) in links {
        if source == target {
            continue;
        }
        let (direction, distance) =
            separation(positions[target] - positions[source], target, source);
        let stretch = (distance - params.rest_length) * params.strength * alpha;
        let pull = direction * (stretch * 0.5);
        forces[source] += pull;
        forces[target] -= pull;
    }
}

pub(super) fn apply_centering(
    positions: &[Vec2],
    center: Vec2,
    strength: f32,
    alpha: f32,
    forces: &mut [Vec2],
) {
    for (force, &point) in forces.iter_mut().zip(positions) {
        *force += (center - point) * (strength * alpha);
    }
}
