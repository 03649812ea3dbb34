//! Product identifier allocation.
//!
//! Listings are keyed by a four-digit number that also names the gallery
//! directory. [`RandomProductIds`] draws uniformly from
//! [`PRODUCT_ID_RANGE`] without checking for collisions; wrap it in
//! [`CheckedProductIds`] to probe for existing listings, or use
//! [`SequentialProductIds`] when identifiers must be unique per process.
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use tracing::warn;

use crate::IngestError;

/// Every identifier an allocator may hand out.
pub const PRODUCT_ID_RANGE: RangeInclusive<u32> = 1000..=9999;

/// Source of product identifiers.
pub trait ProductIdAllocator: Send + Sync {
    fn allocate(&self) -> Result<u32, IngestError>;
}

/// Uniform draw from [`PRODUCT_ID_RANGE`]. Duplicates across calls are possible.
#[derive(Debug)]
pub struct RandomProductIds {
    rng: Mutex<fastrand::Rng>,
}

impl RandomProductIds {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Deterministic sequence, for tests and reproducible fixtures.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    fn draw(&self) -> u32 {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.u32(PRODUCT_ID_RANGE)
    }
}

impl Default for RandomProductIds {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductIdAllocator for RandomProductIds {
    fn allocate(&self) -> Result<u32, IngestError> {
        Ok(self.draw())
    }
}

/// Random draws, retried while `taken` reports the candidate as in use.
pub struct CheckedProductIds<F> {
    random: RandomProductIds,
    taken: F,
    max_attempts: u32,
}

impl<F> CheckedProductIds<F>
where
    F: Fn(u32) -> bool + Send + Sync,
{
    pub fn new(taken: F) -> Self {
        Self::with_random(RandomProductIds::new(), taken)
    }

    pub fn with_random(random: RandomProductIds, taken: F) -> Self {
        Self {
            random,
            taken,
            max_attempts: 64,
        }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }
}

impl<F> ProductIdAllocator for CheckedProductIds<F>
where
    F: Fn(u32) -> bool + Send + Sync,
{
    fn allocate(&self) -> Result<u32, IngestError> {
        for _ in 0..self.max_attempts {
            let candidate = self.random.draw();
            if !(self.taken)(candidate) {
                return Ok(candidate);
            }
        }
        warn!(attempts = self.max_attempts, "product_id_space_exhausted");
        Err(IngestError::IdSpaceExhausted {
            attempts: self.max_attempts,
        })
    }
}

/// Monotonic identifiers starting at a given value, failing past `9999`.
#[derive(Debug)]
pub struct SequentialProductIds {
    next: AtomicU32,
}

impl SequentialProductIds {
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first.clamp(*PRODUCT_ID_RANGE.start(), *PRODUCT_ID_RANGE.end() + 1)),
        }
    }
}

impl Default for SequentialProductIds {
    fn default() -> Self {
        Self::starting_at(*PRODUCT_ID_RANGE.start())
    }
}

impl ProductIdAllocator for SequentialProductIds {
    fn allocate(&self) -> Result<u32, IngestError> {
        let end = *PRODUCT_ID_RANGE.end();
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n <= end).then_some(n + 1)
            })
            .map_err(|_| IngestError::IdSpaceExhausted {
                attempts: end - PRODUCT_ID_RANGE.start() + 1,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn random_ids_stay_in_range_and_spread_uniformly() {
        let alloc = RandomProductIds::with_seed(7);
        let samples: Vec<u32> = (0..10_000).map(|_| alloc.allocate().unwrap()).collect();
        assert!(samples.iter().all(|id| PRODUCT_ID_RANGE.contains(id)));

        // Nine buckets of 1000 ids each; chi-square with 8 degrees of freedom.
        let mut buckets = [0u32; 9];
        for id in &samples {
            buckets[((id - 1000) / 1000) as usize] += 1;
        }
        let expected = samples.len() as f64 / buckets.len() as f64;
        let chi_square: f64 = buckets
            .iter()
            .map(|&observed| {
                let diff = observed as f64 - expected;
                diff * diff / expected
            })
            .sum();
        // p = 0.001 critical value for 8 dof is 26.12.
        assert!(chi_square < 26.12, "chi-square {chi_square} too high: {buckets:?}");
    }

    #[test]
    fn random_ids_tolerate_duplicates() {
        let alloc = RandomProductIds::with_seed(42);
        let samples: Vec<u32> = (0..10_000).map(|_| alloc.allocate().unwrap()).collect();
        let unique: HashSet<_> = samples.iter().collect();
        // 10k draws over 9000 values must collide.
        assert!(unique.len() < samples.len());
    }

    #[test]
    fn checked_ids_skip_taken_values() {
        let checked = CheckedProductIds::with_random(RandomProductIds::with_seed(1), |id| id < 9000);
        for _ in 0..100 {
            let id = checked.allocate().unwrap();
            assert!((9000..=9999).contains(&id));
        }
    }

    #[test]
    fn checked_ids_give_up() {
        let checked = CheckedProductIds::new(|_| true).max_attempts(5);
        assert_eq!(
            checked.allocate(),
            Err(IngestError::IdSpaceExhausted { attempts: 5 })
        );
    }

    #[test]
    fn sequential_ids_exhaust_at_upper_bound() {
        let seq = SequentialProductIds::starting_at(9998);
        assert_eq!(seq.allocate(), Ok(9998));
        assert_eq!(seq.allocate(), Ok(9999));
        assert!(matches!(
            seq.allocate(),
            Err(IngestError::IdSpaceExhausted { .. })
        ));
    }

    #[test]
    fn sequential_ids_clamp_start() {
        let seq = SequentialProductIds::starting_at(3);
        assert_eq!(seq.allocate(), Ok(1000));
    }
}
