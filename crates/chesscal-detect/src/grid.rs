//! Lattice assembly: turn an unordered cloud of saddle points into a
//! labelled `width x height` grid.

use crate::candidates::Candidate;
use chesscal_core::BoardSize;
use kiddo::{KdTree, SquaredEuclidean};
use log::{debug, trace};
use nalgebra::{Point2, Vector2};
use std::collections::{HashMap, HashSet, VecDeque};

type Label = (i32, i32);

const DIRECTIONS: [Label; 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Corners of one assembled board, row-major, plus the local grid step of
/// each corner (distance to its closest grid neighbour).
#[derive(Clone, Debug)]
pub(crate) struct AssembledBoard {
    pub corners: Vec<Point2<f32>>,
    pub spacing: Vec<f32>,
}

struct Lattice<'a> {
    candidates: &'a [Candidate],
    tree: KdTree<f32, 2>,
    labels: HashMap<Label, usize>,
    used: HashSet<usize>,
}

impl<'a> Lattice<'a> {
    fn new(candidates: &'a [Candidate]) -> Self {
        let coords = candidates
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect::<Vec<_>>();
        let tree: KdTree<f32, 2> = (&coords).into();
        Self {
            candidates,
            tree,
            labels: HashMap::new(),
            used: HashSet::new(),
        }
    }

    fn position(&self, label: Label) -> Option<Point2<f32>> {
        self.labels
            .get(&label)
            .map(|&idx| self.candidates[idx].position)
    }

    fn reset(&mut self) {
        self.labels.clear();
        self.used.clear();
    }

    fn assign(&mut self, label: Label, idx: usize) {
        self.labels.insert(label, idx);
        self.used.insert(idx);
    }

    /// Two grid axes around `seed`: the nearest neighbour and the closest
    /// roughly perpendicular neighbour at a comparable distance.
    fn seed_axes(&self, seed: usize) -> Option<(Vector2<f32>, Vector2<f32>)> {
        let p = self.candidates[seed].position;
        let near = self
            .tree
            .nearest_n::<SquaredEuclidean>(&[p.x, p.y], 9);

        let mut offsets = near
            .into_iter()
            .filter(|nn| nn.item as usize != seed && nn.distance > 0.0)
            .map(|nn| self.candidates[nn.item as usize].position - p);

        let u = offsets.next()?;
        let du = u.norm();
        let v = offsets.find(|o| {
            let d = o.norm();
            d < 2.0 * du && (o.dot(&u) / (d * du)).abs() < 0.5
        })?;
        Some((u, v))
    }

    /// Predicted position of `label + dir` seen from the labelled `label`.
    fn predict(
        &self,
        label: Label,
        dir: Label,
        axes: (Vector2<f32>, Vector2<f32>),
    ) -> Option<Point2<f32>> {
        let p = self.position(label)?;

        // Continue the line through the opposite neighbour.
        if let Some(back) = self.position((label.0 - dir.0, label.1 - dir.1)) {
            return Some(p + (p - back));
        }

        // Copy the step from a parallel edge one row/column over.
        for side in [(dir.1, dir.0), (-dir.1, -dir.0)] {
            let a = self.position((label.0 + side.0, label.1 + side.1));
            let b = self.position((label.0 + side.0 + dir.0, label.1 + side.1 + dir.1));
            if let (Some(a), Some(b)) = (a, b) {
                return Some(p + (b - a));
            }
        }

        let (u, v) = axes;
        Some(p + u * dir.0 as f32 + v * dir.1 as f32)
    }

    fn grow(&mut self, seed: usize, axes: (Vector2<f32>, Vector2<f32>), tolerance: f32, limit: usize) {
        self.reset();
        self.assign((0, 0), seed);

        let mut queue = VecDeque::from([(0, 0)]);
        while let Some(label) = queue.pop_front() {
            for dir in DIRECTIONS {
                let next = (label.0 + dir.0, label.1 + dir.1);
                if self.labels.contains_key(&next) {
                    continue;
                }
                let Some(p) = self.position(label) else {
                    continue;
                };
                let Some(pred) = self.predict(label, dir, axes) else {
                    continue;
                };
                let step = (pred - p).norm();
                if !step.is_finite() || step < 1.0 {
                    continue;
                }

                let Some(nn) = self
                    .tree
                    .nearest_n::<SquaredEuclidean>(&[pred.x, pred.y], 1)
                    .into_iter()
                    .next()
                else {
                    continue;
                };
                let idx = nn.item as usize;
                if nn.distance.sqrt() > tolerance * step || self.used.contains(&idx) {
                    continue;
                }

                self.assign(next, idx);
                if self.labels.len() > limit {
                    trace!("lattice growth stopped at {} labels", self.labels.len());
                    return;
                }
                queue.push_back(next);
            }
        }
    }

    /// Every fully populated `span_i x span_j` window of the current labels.
    fn full_windows(&self, span_i: i32, span_j: i32) -> Vec<Label> {
        let Some(min_i) = self.labels.keys().map(|l| l.0).min() else {
            return Vec::new();
        };
        let max_i = self.labels.keys().map(|l| l.0).max().unwrap_or(min_i);
        let min_j = self.labels.keys().map(|l| l.1).min().unwrap_or(0);
        let max_j = self.labels.keys().map(|l| l.1).max().unwrap_or(min_j);

        let mut out = Vec::new();
        for i0 in min_i..=(max_i - span_i + 1) {
            for j0 in min_j..=(max_j - span_j + 1) {
                let full = (0..span_i)
                    .all(|di| (0..span_j).all(|dj| self.labels.contains_key(&(i0 + di, j0 + dj))));
                if full {
                    out.push((i0, j0));
                }
            }
        }
        out
    }
}

/// Assemble a `board` sized grid from `candidates`.
///
/// Returns `None` unless a seed grows into a lattice containing exactly one
/// fully populated window of the board's size (either orientation).
pub(crate) fn assemble_board(
    candidates: &[Candidate],
    board: BoardSize,
    tolerance: f32,
    max_seeds: usize,
) -> Option<AssembledBoard> {
    let (w, h) = (board.width as i32, board.height as i32);
    if w < 2 || h < 2 || candidates.len() < board.corner_count() {
        return None;
    }

    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| candidates[b].response.total_cmp(&candidates[a].response));

    let mut lattice = Lattice::new(candidates);
    let limit = 4 * board.corner_count();

    for &seed in order.iter().take(max_seeds.max(1)) {
        let Some(axes) = lattice.seed_axes(seed) else {
            continue;
        };
        lattice.grow(seed, axes, tolerance, limit);
        if lattice.labels.len() < board.corner_count() {
            continue;
        }

        let mut windows: Vec<(Label, bool)> = lattice
            .full_windows(w, h)
            .into_iter()
            .map(|l| (l, false))
            .collect();
        if w != h {
            windows.extend(lattice.full_windows(h, w).into_iter().map(|l| (l, true)));
        }

        match windows.as_slice() {
            [(origin, transposed)] => {
                debug!(
                    "seed {} grew {} labels into a unique board window",
                    seed,
                    lattice.labels.len()
                );
                return canonical_board(&lattice, board, *origin, *transposed);
            }
            [] => trace!("seed {}: no full window in {} labels", seed, lattice.labels.len()),
            _ => {
                debug!("seed {}: {} candidate windows, ambiguous", seed, windows.len());
                return None;
            }
        }
    }
    None
}

fn canonical_board(
    lattice: &Lattice<'_>,
    board: BoardSize,
    origin: Label,
    transposed: bool,
) -> Option<AssembledBoard> {
    let (w, h) = (board.width as i32, board.height as i32);
    let grid_label = |c: i32, r: i32| {
        if transposed {
            (origin.0 + r, origin.1 + c)
        } else {
            (origin.0 + c, origin.1 + r)
        }
    };
    let at = |c: i32, r: i32| lattice.position(grid_label(c, r));

    let col_axis = (at(w - 1, 0)? - at(0, 0)?) + (at(w - 1, h - 1)? - at(0, h - 1)?);
    let flip_cols = col_axis.x < 0.0;
    let col_axis = if flip_cols { -col_axis } else { col_axis };

    let row_axis = (at(0, h - 1)? - at(0, 0)?) + (at(w - 1, h - 1)? - at(w - 1, 0)?);
    let cross = col_axis.x * row_axis.y - col_axis.y * row_axis.x;
    let flip_rows = cross < 0.0;

    let mut corners = Vec::with_capacity(board.corner_count());
    for r in 0..h {
        for c in 0..w {
            let cc = if flip_cols { w - 1 - c } else { c };
            let rr = if flip_rows { h - 1 - r } else { r };
            corners.push(at(cc, rr)?);
        }
    }

    let spacing = (0..h)
        .flat_map(|r| (0..w).map(move |c| (c, r)))
        .map(|(c, r)| {
            let p = corners[(r * w + c) as usize];
            DIRECTIONS
                .iter()
                .filter_map(|&(dc, dr)| {
                    let (nc, nr) = (c + dc, r + dr);
                    (nc >= 0 && nc < w && nr >= 0 && nr < h)
                        .then(|| (corners[(nr * w + nc) as usize] - p).norm())
                })
                .fold(f32::INFINITY, f32::min)
        })
        .collect();

    Some(AssembledBoard { corners, spacing })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice_points(cols: i32, rows: i32, origin: Point2<f32>, u: Vector2<f32>, v: Vector2<f32>) -> Vec<Candidate> {
        (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (c, r)))
            .map(|(c, r)| Candidate {
                position: origin + u * c as f32 + v * r as f32,
                response: 1.0 + (c * 7 + r * 3) as f32 * 0.01,
            })
            .collect()
    }

    #[test]
    fn regular_grid_is_assembled_row_major() {
        let pts = lattice_points(
            5,
            4,
            Point2::new(50.0, 40.0),
            Vector2::new(20.0, 0.0),
            Vector2::new(0.0, 20.0),
        );
        let board = assemble_board(&pts, BoardSize::new(5, 4), 0.35, 8).expect("board");
        assert_eq!(board.corners.len(), 20);
        assert_eq!(board.corners[0], Point2::new(50.0, 40.0));
        assert_eq!(board.corners[4], Point2::new(130.0, 40.0));
        assert_eq!(board.corners[5], Point2::new(50.0, 60.0));
        assert!(board.spacing.iter().all(|s| (s - 20.0).abs() < 1e-3));
    }

    #[test]
    fn rotated_grid_gets_canonical_orientation() {
        // Upside down: columns run right-to-left, rows bottom-to-top.
        let pts = lattice_points(
            4,
            3,
            Point2::new(200.0, 200.0),
            Vector2::new(-18.0, 2.0),
            Vector2::new(-2.0, -18.0),
        );
        let board = assemble_board(&pts, BoardSize::new(4, 3), 0.35, 8).expect("board");
        let c = &board.corners;
        // Columns advance to the right, rows advance downwards.
        assert!(c[1].x > c[0].x);
        assert!(c[4].y > c[0].y);
    }

    #[test]
    fn transposed_board_is_found() {
        let pts = lattice_points(
            3,
            5,
            Point2::new(10.0, 10.0),
            Vector2::new(15.0, 0.0),
            Vector2::new(0.0, 15.0),
        );
        let board = assemble_board(&pts, BoardSize::new(5, 3), 0.35, 8).expect("board");
        assert_eq!(board.corners.len(), 15);
        let c = &board.corners;
        assert!(c[1].x > c[0].x || c[1].y > c[0].y);
    }

    #[test]
    fn larger_lattice_is_ambiguous() {
        let pts = lattice_points(
            6,
            4,
            Point2::new(0.0, 0.0),
            Vector2::new(10.0, 0.0),
            Vector2::new(0.0, 10.0),
        );
        assert!(assemble_board(&pts, BoardSize::new(5, 4), 0.35, 8).is_none());
    }

    #[test]
    fn too_few_candidates_fail_fast() {
        let pts = lattice_points(
            3,
            3,
            Point2::new(0.0, 0.0),
            Vector2::new(10.0, 0.0),
            Vector2::new(0.0, 10.0),
        );
        assert!(assemble_board(&pts, BoardSize::new(4, 4), 0.35, 8).is_none());
        assert!(assemble_board(&pts, BoardSize::new(1, 3), 0.35, 8).is_none());
    }
}
