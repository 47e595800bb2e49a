//! Scheduling heap of live ranges waiting for a register.
//!
//! Live ranges are allocated in the order they start. The heap is a binary min-heap of live range
//! references keyed by `LiveRange::first_ref`, stored in a flat vector. The keys live in the live
//! range table, so every operation takes it as an argument.
//!
//! The key of a live range must not change while it is in the heap.

use crate::entity::PrimaryMap;
use crate::regalloc::liverange::{LiveRange, LiveRangeId, OrderNr};

type Ranges = PrimaryMap<LiveRangeId, LiveRange>;

/// Min-heap of live ranges by first reference.
#[derive(Default)]
pub struct Worklist {
    heap: Vec<LiveRangeId>,
}

impl Worklist {
    /// Create an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all entries, keeping the allocated memory.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Reserve room for `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        self.heap.reserve(additional);
    }

    /// Number of queued live ranges.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Is the heap empty?
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Append `id` without restoring the heap property. Call `heapify` before the next `pop`.
    pub fn push_unordered(&mut self, id: LiveRangeId) {
        self.heap.push(id);
    }

    /// Restore the heap property over all entries.
    pub fn heapify(&mut self, ranges: &Ranges) {
        for i in (0..self.heap.len() / 2).rev() {
            self.sift_down(ranges, i);
        }
    }

    /// Queue `id`.
    pub fn push(&mut self, ranges: &Ranges, id: LiveRangeId) {
        self.heap.push(id);
        self.sift_up(ranges, self.heap.len() - 1);
    }

    /// Remove and return the live range starting first.
    pub fn pop(&mut self, ranges: &Ranges) -> Option<LiveRangeId> {
        if self.heap.is_empty() {
            return None;
        }
        let top = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.sift_down(ranges, 0);
        }
        Some(top)
    }

    fn key(&self, ranges: &Ranges, i: usize) -> OrderNr {
        ranges[self.heap[i]].first_ref()
    }

    fn sift_up(&mut self, ranges: &Ranges, mut item: usize) {
        while item > 0 {
            let parent = (item - 1) / 2;
            if self.key(ranges, parent) <= self.key(ranges, item) {
                break;
            }
            self.heap.swap(parent, item);
            item = parent;
        }
    }

    fn sift_down(&mut self, ranges: &Ranges, mut item: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * item + 1;
            let right = left + 1;
            let smallest = if right < len && self.key(ranges, right) < self.key(ranges, left) {
                right
            } else if left < len {
                left
            } else {
                break;
            };
            if self.key(ranges, smallest) >= self.key(ranges, item) {
                break;
            }
            self.heap.swap(smallest, item);
            item = smallest;
        }
    }
}
