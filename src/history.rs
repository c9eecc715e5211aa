//! Bounded history of normalized face observations.

use crate::geometry::NormalizedFeature;
use std::collections::VecDeque;

/// Ring buffer of the most recent observations, oldest first
#[derive(Debug, Clone)]
pub struct ObservationHistory {
    capacity: usize,
    entries: VecDeque<NormalizedFeature>,
}

impl ObservationHistory {
    /// Create a history holding at most `capacity` observations
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an observation, evicting the oldest when full
    pub fn push(&mut self, feature: NormalizedFeature) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(feature);
    }

    /// Observations ordered oldest to newest
    pub fn window(&self) -> Vec<NormalizedFeature> {
        self.entries.iter().copied().collect()
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.entries.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feature(i: usize) -> NormalizedFeature {
        let v = i as f64;
        NormalizedFeature::new(v, v, v, v)
    }

    #[test]
    fn test_fills_then_evicts_oldest() {
        let mut history = ObservationHistory::new(3);
        assert!(!history.is_full());

        for i in 0..3 {
            history.push(feature(i));
        }
        assert!(history.is_full());
        assert_eq!(history.window(), vec![feature(0), feature(1), feature(2)]);

        // Window is full, oldest value should be dropped
        history.push(feature(3));
        assert_eq!(history.len(), 3);
        assert_eq!(history.window(), vec![feature(1), feature(2), feature(3)]);
    }

    #[test]
    fn test_zero_capacity_never_full() {
        let mut history = ObservationHistory::new(0);
        history.push(feature(1));
        assert!(history.is_empty());
        assert!(!history.is_full());
    }

    #[test]
    fn test_clear() {
        let mut history = ObservationHistory::new(2);
        history.push(feature(1));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 2);
    }

    proptest! {
        #[test]
        fn window_keeps_last_capacity_items(capacity in 1usize..20, extra in 1usize..40) {
            let mut history = ObservationHistory::new(capacity);
            let total = capacity + extra;
            for i in 0..total {
                history.push(feature(i));
                prop_assert!(history.len() <= capacity);
            }
            let expected: Vec<_> = (total - capacity..total).map(feature).collect();
            prop_assert_eq!(history.window(), expected);
        }
    }
}
