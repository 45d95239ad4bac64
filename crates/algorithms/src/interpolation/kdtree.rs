//! 2D k-d tree for neighbor search
//!
//! Nearest, k-nearest and radius queries over the planar positions of a
//! survey point set. Results carry indices into the slice the tree was built
//! from, so callers look elevations up in their own borrowed points.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use std::cmp::Ordering;

use terrasurf_core::SurveyPoint;

/// A 2D k-d tree over planar point positions.
#[derive(Debug, Clone)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    /// Planar positions in input order
    coords: Vec<[f64; 2]>,
}

#[derive(Debug, Clone)]
struct KdNode {
    /// Index into `coords`
    point_idx: usize,
    /// Split dimension: 0 = x, 1 = y
    split_dim: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// A neighbor returned by a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index into the slice the tree was built from
    pub index: usize,
    pub distance_sq: f64,
}

impl Neighbor {
    pub fn distance(&self) -> f64 {
        self.distance_sq.sqrt()
    }
}

fn by_distance(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance_sq
        .partial_cmp(&b.distance_sq)
        .unwrap_or(Ordering::Equal)
        .then(a.index.cmp(&b.index))
}

impl KdTree {
    /// Build a k-d tree from survey points.
    ///
    /// Construction is O(n log n) using median-of-coordinate splitting.
    pub fn build(points: &[SurveyPoint]) -> Self {
        let coords: Vec<[f64; 2]> = points.iter().map(|p| [p.x, p.y]).collect();
        if coords.is_empty() {
            return Self {
                nodes: Vec::new(),
                coords,
            };
        }

        let mut indices: Vec<usize> = (0..coords.len()).collect();
        let mut nodes = Vec::with_capacity(coords.len());
        build_recursive(&coords, &mut indices, 0, &mut nodes);

        Self { nodes, coords }
    }

    /// Number of points in the tree.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Find the single nearest point to (qx, qy).
    pub fn nearest(&self, qx: f64, qy: f64) -> Option<Neighbor> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut best = Neighbor {
            index: 0,
            distance_sq: f64::MAX,
        };
        self.nearest_recursive(0, qx, qy, &mut best);
        Some(best)
    }

    /// Find the k nearest points to (qx, qy), sorted by ascending distance.
    pub fn k_nearest(&self, qx: f64, qy: f64, k: usize) -> Vec<Neighbor> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }

        // Sorted descending by distance; heap[0] is the farthest kept
        let mut heap: Vec<Neighbor> = Vec::with_capacity(k + 1);
        self.knn_recursive(0, qx, qy, k, &mut heap);

        heap.sort_by(by_distance);
        heap
    }

    /// Find all points within `radius` of (qx, qy), in no particular order.
    pub fn within_radius(&self, qx: f64, qy: f64, radius: f64) -> Vec<Neighbor> {
        if self.nodes.is_empty() || radius <= 0.0 {
            return Vec::new();
        }

        let mut results = Vec::new();
        self.radius_recursive(0, qx, qy, radius * radius, &mut results);
        results
    }

    /// Up to `max` nearest points, optionally limited to `radius`, nearest first.
    pub fn neighbors(&self, qx: f64, qy: f64, radius: Option<f64>, max: usize) -> Vec<Neighbor> {
        match radius {
            Some(r) => {
                let mut found = self.within_radius(qx, qy, r);
                found.sort_by(by_distance);
                found.truncate(max);
                found
            }
            None => self.k_nearest(qx, qy, max),
        }
    }

    fn dist_sq(&self, idx: usize, qx: f64, qy: f64) -> (f64, f64, f64) {
        let [px, py] = self.coords[idx];
        let dx = qx - px;
        let dy = qy - py;
        (dx, dy, dx * dx + dy * dy)
    }

    fn nearest_recursive(&self, node_idx: usize, qx: f64, qy: f64, best: &mut Neighbor) {
        let node = &self.nodes[node_idx];
        let (dx, dy, dist_sq) = self.dist_sq(node.point_idx, qx, qy);

        if dist_sq < best.distance_sq {
            *best = Neighbor {
                index: node.point_idx,
                distance_sq: dist_sq,
            };
        }

        let diff = if node.split_dim == 0 { dx } else { dy };
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.nearest_recursive(child, qx, qy, best);
        }
        if diff * diff < best.distance_sq {
            if let Some(child) = second {
                self.nearest_recursive(child, qx, qy, best);
            }
        }
    }

    fn knn_recursive(&self, node_idx: usize, qx: f64, qy: f64, k: usize, heap: &mut Vec<Neighbor>) {
        let node = &self.nodes[node_idx];
        let (dx, dy, dist_sq) = self.dist_sq(node.point_idx, qx, qy);

        if heap.len() < k || dist_sq < heap[0].distance_sq {
            if heap.len() >= k {
                heap.remove(0);
            }
            let candidate = Neighbor {
                index: node.point_idx,
                distance_sq: dist_sq,
            };
            let pos = heap
                .binary_search_by(|probe| by_distance(probe, &candidate).reverse())
                .unwrap_or_else(|e| e);
            heap.insert(pos, candidate);
        }

        let diff = if node.split_dim == 0 { dx } else { dy };
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.knn_recursive(child, qx, qy, k, heap);
        }

        let threshold = if heap.len() >= k { heap[0].distance_sq } else { f64::MAX };
        if diff * diff < threshold {
            if let Some(child) = second {
                self.knn_recursive(child, qx, qy, k, heap);
            }
        }
    }

    fn radius_recursive(
        &self,
        node_idx: usize,
        qx: f64,
        qy: f64,
        radius_sq: f64,
        results: &mut Vec<Neighbor>,
    ) {
        let node = &self.nodes[node_idx];
        let (dx, dy, dist_sq) = self.dist_sq(node.point_idx, qx, qy);

        if dist_sq <= radius_sq {
            results.push(Neighbor {
                index: node.point_idx,
                distance_sq: dist_sq,
            });
        }

        let diff = if node.split_dim == 0 { dx } else { dy };

        if let Some(left) = node.left {
            if diff <= 0.0 || diff * diff <= radius_sq {
                self.radius_recursive(left, qx, qy, radius_sq, results);
            }
        }
        if let Some(right) = node.right {
            if diff >= 0.0 || diff * diff <= radius_sq {
                self.radius_recursive(right, qx, qy, radius_sq, results);
            }
        }
    }
}

fn build_recursive(
    coords: &[[f64; 2]],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let n = indices.len();
    let split_dim = (depth % 2) as u8;
    let axis = split_dim as usize;

    indices.sort_by(|&a, &b| {
        coords[a][axis]
            .partial_cmp(&coords[b][axis])
            .unwrap_or(Ordering::Equal)
    });

    let median = n / 2;
    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx: indices[median],
        split_dim,
        left: None,
        right: None,
    });

    let (left, rest) = indices.split_at_mut(median);
    let right = &mut rest[1..];

    if !left.is_empty() {
        let left_idx = build_recursive(coords, left, depth + 1, nodes);
        nodes[node_idx].left = Some(left_idx);
    }
    if !right.is_empty() {
        let right_idx = build_recursive(coords, right, depth + 1, nodes);
        nodes[node_idx].right = Some(right_idx);
    }

    node_idx
}
