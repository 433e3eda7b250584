//! A k-d tree over borrowed points, storing only their indices.

use std::{cmp::Ordering, collections::BinaryHeap};

use crate::metric::Metric;

/// Nodes holding this many points or fewer aren't split any further.
pub const LEAF_SIZE: usize = 8;

#[derive(Debug, Clone)]
enum Node {
    Leaf(Vec<usize>),
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

/// A found point: its index in the indexed slice and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub index: usize,
    pub distance: f64,
}

impl Eq for Hit {}

impl Ord for Hit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Hit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A k-d tree built by splitting on the median of the axis with the largest spread.
///
/// Points that can't be told apart along any axis end up together in a single leaf, so
/// duplicated or degenerate vectors never break the construction.
#[derive(Debug, Clone, Default)]
pub struct KdTree {
    nodes: Vec<Node>,
    metric: Metric,
}

impl KdTree {
    /// Builds the tree over `points`, which must all have the same length.
    ///
    /// # Arguments
    /// * `points` - The points to index, the tree refers to them by their index.
    /// * `metric` - The distance used when searching.
    pub fn build<P: AsRef<[f64]>>(points: &[P], metric: Metric) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            metric,
        };

        if !points.is_empty() {
            let mut indices: Vec<usize> = (0..points.len()).collect();
            tree.build_node(points, &mut indices);
        }

        tree
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// The amount of nodes of the tree, leaves included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Searches the `k` points closest to `query`.
    ///
    /// # Arguments
    /// * `points` - The same points the tree was built over.
    /// * `query` - A vector with the same length as the points.
    /// * `k` - The maximum amount of hits.
    ///
    /// # Returns
    /// The hits sorted by ascending distance, ties sorted by index.
    pub fn nearest<P: AsRef<[f64]>>(&self, points: &[P], query: &[f64], k: usize) -> Vec<Hit> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut best = BinaryHeap::with_capacity(k + 1);
        self.search(0, points, query, k, &mut best);
        best.into_sorted_vec()
    }

    fn build_node<P: AsRef<[f64]>>(&mut self, points: &[P], indices: &mut [usize]) -> usize {
        let id = self.nodes.len();

        let Some((axis, spread)) = widest_axis(points, indices) else {
            self.nodes.push(Node::Leaf(indices.to_vec()));
            return id;
        };

        if indices.len() <= LEAF_SIZE || spread <= 0. {
            self.nodes.push(Node::Leaf(indices.to_vec()));
            return id;
        }

        let mid = indices.len() / 2;
        indices.select_nth_unstable_by(mid, |&a, &b| {
            points[a].as_ref()[axis].total_cmp(&points[b].as_ref()[axis])
        });
        let value = points[indices[mid]].as_ref()[axis];

        // placeholder, patched once both children exist
        self.nodes.push(Node::Leaf(Vec::new()));

        let (lower, upper) = indices.split_at_mut(mid);
        let left = self.build_node(points, lower);
        let right = self.build_node(points, upper);

        self.nodes[id] = Node::Split {
            axis,
            value,
            left,
            right,
        };

        id
    }

    fn search<P: AsRef<[f64]>>(
        &self,
        node: usize,
        points: &[P],
        query: &[f64],
        k: usize,
        best: &mut BinaryHeap<Hit>,
    ) {
        match &self.nodes[node] {
            Node::Leaf(indices) => {
                for &index in indices {
                    let distance = self.metric.distance(points[index].as_ref(), query);
                    offer(best, k, Hit { index, distance });
                }
            }
            &Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[axis] - value;
                let (near, far) = if diff < 0. { (left, right) } else { (right, left) };

                self.search(near, points, query, k, best);

                let bound = self.metric.axis_bound(diff);
                let worst = best.peek().map_or(f64::INFINITY, |hit| hit.distance);

                if best.len() < k || bound <= worst {
                    self.search(far, points, query, k, best);
                }
            }
        }
    }
}

/// Keeps the `k` smallest hits in a max-heap.
fn offer(best: &mut BinaryHeap<Hit>, k: usize, hit: Hit) {
    if best.len() < k {
        best.push(hit);
    } else if best.peek().is_some_and(|worst| hit < *worst) {
        best.pop();
        best.push(hit);
    }
}

/// The axis along which `indices` spread the most, with its spread.
fn widest_axis<P: AsRef<[f64]>>(points: &[P], indices: &[usize]) -> Option<(usize, f64)> {
    let dims = points[*indices.first()?].as_ref().len();

    (0..dims)
        .map(|axis| {
            let (lo, hi) = indices
                .iter()
                .map(|&i| points[i].as_ref()[axis])
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
            (axis, hi - lo)
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
}
