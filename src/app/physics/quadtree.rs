use eframe::egui::{Vec2, vec2};

const LEAF_CAPACITY: usize = 8;
const MAX_DEPTH: u32 = 12;

/// Axis-aligned square region of graph space.
#[derive(Clone, Copy, Debug)]
pub(super) struct Square {
    pub(super) center: Vec2,
    pub(super) half: f32,
}

impl Square {
    fn enclosing(points: &[Vec2]) -> Option<Self> {
        // f32::min/max skip NaN, so bounds alone cannot reject it
        if points.is_empty()
            || !points
                .iter()
                .all(|point| point.x.is_finite() && point.y.is_finite())
        {
            return None;
        }

        let mut min = vec2(f32::INFINITY, f32::INFINITY);
        let mut max = vec2(f32::NEG_INFINITY, f32::NEG_INFINITY);
        for point in points {
            min = min.min(*point);
            max = max.max(*point);
        }

        let span = (max - min).max_elem().max(1.0);
        Some(Self {
            center: (min + max) * 0.5,
            half: span * 0.5 + 1.0,
        })
    }

    fn quadrant_of(self, point: Vec2) -> usize {
        usize::from(point.x >= self.center.x) | (usize::from(point.y >= self.center.y) << 1)
    }

    fn quadrant(self, quadrant: usize) -> Self {
        let quarter = self.half * 0.5;
        let dx = if quadrant & 1 == 0 { -quarter } else { quarter };
        let dy = if quadrant & 2 == 0 { -quarter } else { quarter };
        Self {
            center: self.center + vec2(dx, dy),
            half: quarter,
        }
    }

    pub(super) fn side(self) -> f32 {
        self.half * 2.0
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        (point.x - self.center.x).abs() <= self.half && (point.y - self.center.y).abs() <= self.half
    }

    /// Squared distance from `point` to the nearest point of the square.
    pub(super) fn distance_sq_to(self, point: Vec2) -> f32 {
        let dx = ((point.x - self.center.x).abs() - self.half).max(0.0);
        let dy = ((point.y - self.center.y).abs() - self.half).max(0.0);
        dx * dx + dy * dy
    }
}

pub(super) struct Cell {
    pub(super) square: Square,
    pub(super) mass: f32,
    pub(super) centroid: Vec2,
    /// Point indices; only populated on leaves.
    pub(super) members: Vec<usize>,
    pub(super) children: [Option<usize>; 4],
}

impl Cell {
    pub(super) fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }
}

/// Flat quadtree; cell 0 is the root and children point back into `cells`.
pub(super) struct QuadTree {
    cells: Vec<Cell>,
}

impl QuadTree {
    pub(super) fn build(points: &[Vec2]) -> Option<Self> {
        let square = Square::enclosing(points)?;
        let mut tree = Self {
            cells: Vec::with_capacity(points.len() / 2 + 1),
        };
        tree.insert_cell(square, (0..points.len()).collect(), points, 0);
        Some(tree)
    }

    fn insert_cell(
        &mut self,
        square: Square,
        members: Vec<usize>,
        points: &[Vec2],
        depth: u32,
    ) -> usize {
        let mass = members.len() as f32;
        let centroid = if members.is_empty() {
            square.center
        } else {
            members.iter().fold(Vec2::ZERO, |sum, &index| sum + points[index]) / mass
        };

        let slot = self.cells.len();
        self.cells.push(Cell {
            square,
            mass,
            centroid,
            members: Vec::new(),
            children: [None; 4],
        });

        if members.len() <= LEAF_CAPACITY || depth >= MAX_DEPTH {
            self.cells[slot].members = members;
            return slot;
        }

        let mut buckets: [Vec<usize>; 4] = Default::default();
        for index in members {
            buckets[square.quadrant_of(points[index])].push(index);
        }

        // every point landed in one quadrant: coincident points, keep as a leaf
        if buckets.iter().filter(|bucket| !bucket.is_empty()).count() <= 1 {
            self.cells[slot].members = buckets.into_iter().flatten().collect();
            return slot;
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            let child = self.insert_cell(square.quadrant(quadrant), bucket, points, depth + 1);
            self.cells[slot].children[quadrant] = Some(child);
        }
        slot
    }

    pub(super) fn root(&self) -> usize {
        0
    }

    pub(super) fn cell(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    /// Calls `visit` for every point that may lie within `radius` of `point`.
    pub(super) fn for_each_near(&self, point: Vec2, radius: f32, mut visit: impl FnMut(usize)) {
        let radius_sq = radius * radius;
        let mut stack = vec![self.root()];
        while let Some(index) = stack.pop() {
            let cell = &self.cells[index];
            if cell.square.distance_sq_to(point) > radius_sq {
                continue;
            }
            if cell.is_leaf() {
                cell.members.iter().copied().for_each(&mut visit);
            } else {
                stack.extend(cell.children.iter().flatten().copied());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(count: usize) -> Vec<Vec2> {
        (0..count)
            .map(|index| vec2((index % 10) as f32 * 30.0, (index / 10) as f32 * 30.0))
            .collect()
    }

    #[test]
    fn root_mass_counts_every_point() {
        let points = grid(57);
        let tree = QuadTree::build(&points).unwrap();
        assert_eq!(tree.cell(tree.root()).mass, 57.0);
        assert!(!tree.cell(tree.root()).is_leaf());
    }

    #[test]
    fn non_finite_points_yield_no_tree() {
        assert!(QuadTree::build(&[vec2(0.0, 0.0), vec2(f32::NAN, 1.0)]).is_none());
        assert!(QuadTree::build(&[vec2(f32::NAN, f32::NAN), vec2(3.0, 4.0)]).is_none());
        assert!(QuadTree::build(&[vec2(f32::INFINITY, 0.0)]).is_none());
        assert!(QuadTree::build(&[]).is_none());
    }

    #[test]
    fn coincident_points_stay_in_one_leaf() {
        let points = vec![vec2(5.0, 5.0); 20];
        let tree = QuadTree::build(&points).unwrap();
        let root = tree.cell(tree.root());
        assert!(root.is_leaf());
        assert_eq!(root.members.len(), 20);
    }

    #[test]
    fn neighbourhood_query_finds_every_close_point() {
        let points = grid(100);
        let tree = QuadTree::build(&points).unwrap();
        let probe = vec2(45.0, 45.0);

        let mut found = Vec::new();
        tree.for_each_near(probe, 40.0, |index| found.push(index));

        for (index, point) in points.iter().enumerate() {
            if (*point - probe).length() <= 40.0 {
                assert!(found.contains(&index), "missing point {index}");
            }
        }
    }
}
