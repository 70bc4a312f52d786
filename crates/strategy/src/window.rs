use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// One price sample held by a [`PriceWindow`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Fixed-capacity rolling buffer of recent prices, oldest first.
/// Pushing onto a full window evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl PriceWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample. Returns `false` (and keeps the window unchanged) when
    /// `timestamp` is not newer than the newest sample.
    pub fn push(&mut self, price: f64, timestamp: DateTime<Utc>) -> bool {
        if let Some(last) = self.samples.back() {
            if timestamp <= last.timestamp {
                return false;
            }
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample { price, timestamp });
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Prices oldest first.
    pub fn prices(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.price).collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut window = PriceWindow::new(3);
        for (i, price) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            assert!(window.push(price, at(i as i64)));
        }
        assert_eq!(window.len(), 3);
        assert!(window.is_full());
        assert_eq!(window.prices(), vec![2.0, 3.0, 4.0]);
        assert_eq!(window.latest().unwrap().price, 4.0);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut window = PriceWindow::new(5);
        for i in 0..100 {
            window.push(i as f64, at(i));
            assert!(window.len() <= window.capacity());
        }
    }

    #[test]
    fn rejects_stale_timestamps() {
        let mut window = PriceWindow::new(3);
        assert!(window.push(10.0, at(5)));
        assert!(!window.push(11.0, at(5)));
        assert!(!window.push(12.0, at(4)));
        assert_eq!(window.prices(), vec![10.0]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut window = PriceWindow::new(0);
        assert_eq!(window.capacity(), 1);
        window.push(1.0, at(0));
        window.push(2.0, at(1));
        assert_eq!(window.prices(), vec![2.0]);
    }

    #[test]
    fn clear_empties_the_window() {
        let mut window = PriceWindow::new(2);
        window.push(1.0, at(0));
        window.clear();
        assert!(window.is_empty());
        assert!(window.latest().is_none());
    }
}
