use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::debug;

use crate::core::error::{Error, Result};
use crate::kdtree::bounding_box::BoundingBox;
use crate::kdtree::node::KdNode;
use crate::kdtree::point::Point;

/// Slices longer than this recurse through rayon during bulk build.
const PARALLEL_BUILD_THRESHOLD: usize = 1024;

/// Heap entry for k-NN: max-heap keyed on distance, so the top is the
/// current worst of the k best.
struct HeapEntry {
    dist: f64,
    point: Point,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.dist.total_cmp(&other.dist) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist.total_cmp(&other.dist)
    }
}

/// In-memory k-d tree over fixed-dimension float points.
///
/// Built balanced via median splits; incremental inserts land as leaves
/// without rebalancing. Intended to be immutable after build.
#[derive(Debug)]
pub struct KdTree {
    root: Option<Box<KdNode>>,
    dimension: usize,
}

impl KdTree {
    /// An empty tree; queries return nothing until points arrive.
    pub fn new() -> Self {
        KdTree {
            root: None,
            dimension: 0,
        }
    }

    /// Build a balanced tree from a point set.
    ///
    /// Every point must share one dimension; an empty set yields an empty
    /// tree.
    pub fn build(points: &[Point]) -> Result<Self> {
        if points.is_empty() {
            return Ok(KdTree::new());
        }

        let dimension = points[0].dimension();
        for point in points {
            if point.dimension() != dimension {
                return Err(Error::invalid_input(format!(
                    "point dimension {} does not match tree dimension {}",
                    point.dimension(),
                    dimension
                )));
            }
        }

        let mut working = points.to_vec();
        let root = build_slice(&mut working, 0, dimension);
        debug!("built k-d tree over {} points, dimension {}", points.len(), dimension);

        Ok(KdTree { root, dimension })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Insert one point as a leaf. The first insert into an empty tree fixes
    /// the dimension.
    pub fn insert(&mut self, point: Point) -> Result<()> {
        if point.dimension() == 0 {
            return Err(Error::invalid_input("cannot insert a zero-dimension point"));
        }
        if self.dimension == 0 {
            self.dimension = point.dimension();
        } else if point.dimension() != self.dimension {
            return Err(Error::invalid_input(format!(
                "point dimension {} does not match tree dimension {}",
                point.dimension(),
                self.dimension
            )));
        }

        self.root = Some(insert_node(self.root.take(), point, 0, self.dimension));
        Ok(())
    }

    /// The k nearest points to `query`, ascending by Euclidean distance.
    pub fn nearest_neighbors(&self, query: &Point, k: usize) -> Result<Vec<Point>> {
        if k == 0 || self.root.is_none() {
            return Ok(Vec::new());
        }
        self.check_query_dimension(query)?;

        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(k + 1);
        knn_search(&self.root, query, k, &mut heap);

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|entry| entry.point)
            .collect())
    }

    /// The single nearest point, if the tree is non-empty.
    pub fn nearest_neighbor(&self, query: &Point) -> Result<Option<Point>> {
        Ok(self.nearest_neighbors(query, 1)?.into_iter().next())
    }

    /// Every point within `radius` of `query`, in tree-traversal order.
    pub fn range_search(&self, query: &Point, radius: f64) -> Result<Vec<Point>> {
        if self.root.is_none() {
            return Ok(Vec::new());
        }
        self.check_query_dimension(query)?;

        let mut results = Vec::new();
        range_collect(&self.root, query, radius, &mut results);
        Ok(results)
    }

    /// Every point inside an axis-aligned box, in tree-traversal order.
    pub fn range_search_box(&self, bounds: &BoundingBox) -> Result<Vec<Point>> {
        if self.root.is_none() {
            return Ok(Vec::new());
        }
        if bounds.dimension() != self.dimension {
            return Err(Error::invalid_input(format!(
                "bounds dimension {} does not match tree dimension {}",
                bounds.dimension(),
                self.dimension
            )));
        }

        let mut results = Vec::new();
        box_collect(&self.root, bounds, &mut results);
        Ok(results)
    }

    fn check_query_dimension(&self, query: &Point) -> Result<()> {
        if query.dimension() != self.dimension {
            return Err(Error::invalid_input(format!(
                "query dimension {} does not match tree dimension {}",
                query.dimension(),
                self.dimension
            )));
        }
        Ok(())
    }
}

impl Default for KdTree {
    fn default() -> Self {
        KdTree::new()
    }
}

fn build_slice(points: &mut [Point], depth: usize, dimension: usize) -> Option<Box<KdNode>> {
    if points.is_empty() {
        return None;
    }

    let len = points.len();
    let axis = depth % dimension;
    let mid = len / 2;
    points.select_nth_unstable_by(mid, |a, b| a[axis].total_cmp(&b[axis]));

    let (left_half, rest) = points.split_at_mut(mid);
    let (median, right_half) = rest.split_first_mut()?;
    let mut node = Box::new(KdNode::new(median.clone(), axis));

    if len > PARALLEL_BUILD_THRESHOLD {
        let (left, right) = rayon::join(
            || build_slice(left_half, depth + 1, dimension),
            || build_slice(right_half, depth + 1, dimension),
        );
        node.left = left;
        node.right = right;
    } else {
        node.left = build_slice(left_half, depth + 1, dimension);
        node.right = build_slice(right_half, depth + 1, dimension);
    }

    Some(node)
}

fn insert_node(
    node: Option<Box<KdNode>>,
    point: Point,
    depth: usize,
    dimension: usize,
) -> Box<KdNode> {
    match node {
        None => Box::new(KdNode::new(point, depth % dimension)),
        Some(mut current) => {
            let axis = current.axis;
            if point[axis] < current.point[axis] {
                current.left = Some(insert_node(current.left.take(), point, depth + 1, dimension));
            } else {
                current.right =
                    Some(insert_node(current.right.take(), point, depth + 1, dimension));
            }
            current
        }
    }
}

fn knn_search(
    node: &Option<Box<KdNode>>,
    query: &Point,
    k: usize,
    heap: &mut BinaryHeap<HeapEntry>,
) {
    let Some(node) = node else {
        return;
    };

    let dist = query.distance(&node.point);
    if heap.len() < k {
        heap.push(HeapEntry {
            dist,
            point: node.point.clone(),
        });
    } else if heap.peek().is_some_and(|worst| dist < worst.dist) {
        heap.pop();
        heap.push(HeapEntry {
            dist,
            point: node.point.clone(),
        });
    }

    let axis = node.axis;
    let go_left = query[axis] < node.point[axis];
    let (near, far) = if go_left {
        (&node.left, &node.right)
    } else {
        (&node.right, &node.left)
    };

    knn_search(near, query, k, heap);

    // The far half-space can only matter if the splitting plane is closer
    // than the current worst candidate, or the heap is not yet full.
    let axis_gap = (query[axis] as f64 - node.point[axis] as f64).abs();
    let visit_far = heap.len() < k || heap.peek().is_some_and(|worst| axis_gap < worst.dist);
    if visit_far {
        knn_search(far, query, k, heap);
    }
}

fn range_collect(node: &Option<Box<KdNode>>, query: &Point, radius: f64, results: &mut Vec<Point>) {
    let Some(node) = node else {
        return;
    };

    if query.distance(&node.point) <= radius {
        results.push(node.point.clone());
    }

    let axis = node.axis;
    if query[axis] as f64 - radius <= node.point[axis] as f64 {
        range_collect(&node.left, query, radius, results);
    }
    if query[axis] as f64 + radius >= node.point[axis] as f64 {
        range_collect(&node.right, query, radius, results);
    }
}

fn box_collect(node: &Option<Box<KdNode>>, bounds: &BoundingBox, results: &mut Vec<Point>) {
    let Some(node) = node else {
        return;
    };

    if bounds.contains(&node.point) {
        results.push(node.point.clone());
    }

    let axis = node.axis;
    if bounds.lower_bound()[axis] < node.point[axis] {
        box_collect(&node.left, bounds, results);
    }
    if bounds.upper_bound()[axis] >= node.point[axis] {
        box_collect(&node.right, bounds, results);
    }
}
