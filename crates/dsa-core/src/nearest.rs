//! Bounded k-nearest selection.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// An item index paired with its distance to the query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

// Max-heap order on distance so the farthest kept neighbor is on top.
#[derive(Debug)]
struct ByDistance(Neighbor);

impl PartialEq for ByDistance {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ByDistance {}

impl PartialOrd for ByDistance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByDistance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.distance.total_cmp(&other.0.distance)
    }
}

/// Keep the `k` closest of `candidates` (`(index, distance)` pairs).
///
/// A candidate replaces the current farthest only when strictly closer, so
/// on ties the earlier candidate wins. The result order is unspecified.
pub fn k_nearest<I>(candidates: I, k: usize) -> Vec<Neighbor>
where
    I: IntoIterator<Item = (usize, f64)>,
{
    if k == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<ByDistance> = BinaryHeap::with_capacity(k + 1);
    for (index, distance) in candidates {
        let candidate = Neighbor { index, distance };
        if heap.len() < k {
            heap.push(ByDistance(candidate));
        } else if let Some(top) = heap.peek() {
            if distance < top.0.distance {
                heap.pop();
                heap.push(ByDistance(candidate));
            }
        }
    }
    heap.into_iter().map(|n| n.0).collect()
}
