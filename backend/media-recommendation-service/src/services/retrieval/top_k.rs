use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A candidate row and its similarity to the profile
#[derive(Debug, Clone, Copy)]
pub struct ScoredRow {
    pub row: usize,
    pub score: f32,
}

impl ScoredRow {
    pub fn new(row: usize, score: f32) -> Self {
        Self { row, score }
    }
}

// Greater means ranked earlier: higher score, then lower row index.
impl Ord for ScoredRow {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.row.cmp(&self.row))
    }
}

impl PartialOrd for ScoredRow {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScoredRow {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredRow {}

/// Keeps the `capacity` best rows seen so far.
///
/// Backed by a min-heap so the current worst entry is evicted in O(log k).
/// Merging is associative and commutative: the result is the top `capacity`
/// of the union regardless of how batches were grouped.
#[derive(Debug, Clone)]
pub struct BoundedTopK {
    capacity: usize,
    heap: BinaryHeap<Reverse<ScoredRow>>,
}

impl BoundedTopK {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn push(&mut self, entry: ScoredRow) {
        if self.capacity == 0 {
            return;
        }

        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(entry));
            return;
        }

        if let Some(Reverse(worst)) = self.heap.peek() {
            if entry > *worst {
                self.heap.pop();
                self.heap.push(Reverse(entry));
            }
        }
    }

    pub fn merge(mut self, other: BoundedTopK) -> BoundedTopK {
        self.capacity = self.capacity.max(other.capacity);
        for Reverse(entry) in other.heap {
            self.push(entry);
        }
        self
    }

    /// Best first
    pub fn into_sorted_vec(self) -> Vec<ScoredRow> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(entry)| entry)
            .collect()
    }
}
