//! Bounded history of recent results with recency-weighted selection.

use crate::constants::stabilize::MAX_AGE_PENALTY;
use crate::error::{Error, Result};
use crate::taxonomy::VisionResult;
use std::collections::VecDeque;

/// Multiplier applied to the result at `index` (oldest = 0).
///
/// The newest entry always gets 1.0 and the multiplier drops linearly by
/// `0.5 / (capacity - 1)` per step of age, so a result `capacity - 1` frames
/// old is weighted at 0.5. A single-slot buffer never penalizes.
#[allow(clippy::cast_precision_loss)]
pub fn age_penalty(capacity: usize, len: usize, index: usize) -> f64 {
    if capacity <= 1 {
        return 1.0;
    }
    let age = len.saturating_sub(1).saturating_sub(index);
    1.0 - (MAX_AGE_PENALTY / (capacity - 1) as f64) * age as f64
}

/// FIFO of the last `capacity` frame results.
#[derive(Debug, Clone)]
pub struct ResultBuffer {
    capacity: usize,
    results: VecDeque<VisionResult>,
}

impl ResultBuffer {
    /// Create an empty buffer. A capacity of zero is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidBufferSize { value: capacity });
        }
        Ok(Self {
            capacity,
            results: VecDeque::new(),
        })
    }

    /// Maximum number of results kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of results currently held.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the buffer holds no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Append a result, evicting the oldest once over capacity.
    pub fn push(&mut self, result: VisionResult) {
        self.results.push_back(result);
        while self.results.len() > self.capacity {
            self.results.pop_front();
        }
    }

    /// Drop every stored result.
    pub fn clear(&mut self) {
        self.results.clear();
    }

    /// Pick the result whose last prediction scores best after the age penalty.
    ///
    /// Scans newest to oldest and only replaces the running choice on a strict
    /// improvement, so the newest result wins ties. The running score is the
    /// penalized score of the chosen result. Returns `None` when empty.
    pub fn select_best(&self) -> Option<&VisionResult> {
        let len = self.results.len();
        let mut best = self.results.back()?;
        let mut best_score = best.last_score();

        for (index, result) in self.results.iter().enumerate().rev().skip(1) {
            let score = result.last_score() * age_penalty(self.capacity, len, index);
            if score > best_score {
                best = result;
                best_score = score;
            }
        }

        Some(best)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::taxonomy::Prediction;

    fn result(score: f64) -> VisionResult {
        VisionResult::new(vec![
            Prediction::new(1, "Animalia", 70.0, 0.99),
            Prediction::new(2, "Vulpes", 20.0, score),
        ])
    }

    fn last_scores(buffer: &ResultBuffer) -> Vec<f64> {
        buffer.results.iter().map(VisionResult::last_score).collect()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            ResultBuffer::new(0),
            Err(Error::InvalidBufferSize { value: 0 })
        ));
    }

    #[test]
    fn test_huge_capacity_allocates_lazily() {
        let mut buffer = ResultBuffer::new(usize::MAX).unwrap();
        assert_eq!(buffer.capacity(), usize::MAX);
        buffer.push(result(0.4));
        buffer.push(result(0.6));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.select_best().unwrap().last_score(), 0.6);

        let buffer = ResultBuffer::new(usize::MAX / 2).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut buffer = ResultBuffer::new(3).unwrap();
        for score in [0.1, 0.2, 0.3, 0.4, 0.5] {
            buffer.push(result(score));
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(last_scores(&buffer), vec![0.3, 0.4, 0.5]);
    }

    #[test]
    fn test_clear_empties_buffer() {
        let mut buffer = ResultBuffer::new(5).unwrap();
        buffer.push(result(0.5));
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.select_best().is_none());
    }

    #[test]
    fn test_penalty_endpoints() {
        assert_eq!(age_penalty(5, 5, 4), 1.0);
        assert_eq!(age_penalty(5, 5, 0), 0.5);
        assert_eq!(age_penalty(5, 5, 2), 0.75);
        assert_eq!(age_penalty(2, 2, 0), 0.5);
    }

    #[test]
    fn test_penalty_partial_buffer() {
        // Two of five slots filled: the older entry is one step old
        assert_eq!(age_penalty(5, 2, 0), 0.875);
        assert_eq!(age_penalty(5, 2, 1), 1.0);
    }

    #[test]
    fn test_penalty_single_slot() {
        assert_eq!(age_penalty(1, 1, 0), 1.0);
    }

    #[test]
    fn test_select_prefers_confident_middle_frame() {
        let mut buffer = ResultBuffer::new(3).unwrap();
        buffer.push(result(0.40));
        buffer.push(result(0.95));
        buffer.push(result(0.50));

        // 0.95 * 0.75 = 0.7125 beats 0.50; 0.40 * 0.5 = 0.2 does not
        let best = buffer.select_best().unwrap();
        assert_eq!(best.last_score(), 0.95);
    }

    #[test]
    fn test_select_newest_wins_ties() {
        let mut buffer = ResultBuffer::new(2).unwrap();
        buffer.push(result(1.0));
        buffer.push(result(0.5));

        // Older: 1.0 * 0.5 = 0.5, not strictly greater than 0.5
        let best = buffer.select_best().unwrap();
        assert!(std::ptr::eq(best, buffer.results.back().unwrap()));
    }

    #[test]
    fn test_select_single_slot_returns_latest() {
        let mut buffer = ResultBuffer::new(1).unwrap();
        buffer.push(result(0.9));
        buffer.push(result(0.1));
        assert_eq!(buffer.select_best().unwrap().last_score(), 0.1);
    }

    #[test]
    fn test_empty_predictions_score_zero() {
        let mut buffer = ResultBuffer::new(3).unwrap();
        buffer.push(result(0.2));
        buffer.push(VisionResult::new(Vec::new()));

        // 0.2 * 0.75 > 0
        assert_eq!(buffer.select_best().unwrap().last_score(), 0.2);
    }

    #[test]
    fn test_select_is_stable_without_new_frames() {
        let mut buffer = ResultBuffer::new(4).unwrap();
        for score in [0.3, 0.8, 0.6] {
            buffer.push(result(score));
        }
        let first = buffer.select_best().unwrap().clone();
        let second = buffer.select_best().unwrap();
        assert_eq!(&first, second);
    }
}
