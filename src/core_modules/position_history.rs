// THEORY:
// `PositionHistory` is the sliding window of recent centers for one tracked object.
// It holds at most `capacity` entries; pushing onto a full window drops the oldest.
// The bound is enforced by the push itself rather than left to the container, so
// the length can never exceed the capacity no matter how the window is fed.

use crate::core_modules::geometry::Point2;
use std::collections::VecDeque;

/// A fixed-capacity, oldest-first window of positions.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionHistory {
    positions: VecDeque<Point2>,
    capacity: usize,
}

impl PositionHistory {
    /// Creates an empty window. A capacity of zero is raised to one so the most
    /// recent position is always available.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            positions: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, position: Point2) {
        while self.positions.len() >= self.capacity {
            self.positions.pop_front();
        }
        self.positions.push_back(position);
        debug_assert!(self.positions.len() <= self.capacity);
    }

    /// The most recently recorded position.
    pub fn latest(&self) -> Option<&Point2> {
        self.positions.back()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Positions from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Point2> {
        self.positions.iter()
    }
}
