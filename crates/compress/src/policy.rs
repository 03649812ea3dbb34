//! Compression policy: the knobs of the size-budget loop.
//!
//! ```rust
//! use compress::CompressionPolicy;
//!
//! let policy = CompressionPolicy::default().with_target_size_kb(150);
//! assert_eq!(policy.initial_width, 1920);
//! policy.validate().expect("valid policy");
//! ```
use serde::{Deserialize, Serialize};

use crate::CompressError;

/// Parameters of the iterative JPEG re-encode.
///
/// # Serialization
///
/// Every field is optional when deserializing; missing ones take the
/// [`CompressionPolicy::DEFAULT`] value.
///
/// ```json
/// { "target_size_kb": 200, "initial_width": 1920, "initial_quality": 80,
///   "quality_floor": 10, "quality_step": 5 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionPolicy {
    /// Size budget in KB (1 KB = 1024 bytes). The loop stops once an
    /// encode is at or under it.
    pub target_size_kb: u32,
    /// Output width in pixels. Height follows the source aspect ratio.
    pub initial_width: u32,
    /// JPEG quality of the first attempt.
    pub initial_quality: u8,
    /// Exclusive lower bound: no attempt is made at or below this quality.
    pub quality_floor: u8,
    /// Quality decrement between attempts.
    pub quality_step: u8,
}

impl CompressionPolicy {
    /// 200 KB at 1920 px wide, starting at quality 80 and stepping down by 5
    /// while quality stays above 10.
    pub const DEFAULT: CompressionPolicy = CompressionPolicy {
        target_size_kb: 200,
        initial_width: 1920,
        initial_quality: 80,
        quality_floor: 10,
        quality_step: 5,
    };

    pub fn with_target_size_kb(mut self, kb: u32) -> Self {
        self.target_size_kb = kb;
        self
    }

    pub fn with_initial_width(mut self, width: u32) -> Self {
        self.initial_width = width;
        self
    }

    pub fn with_initial_quality(mut self, quality: u8) -> Self {
        self.initial_quality = quality;
        self
    }

    pub fn with_quality_floor(mut self, floor: u8) -> Self {
        self.quality_floor = floor;
        self
    }

    pub fn with_quality_step(mut self, step: u8) -> Self {
        self.quality_step = step;
        self
    }

    /// Qualities the loop may try, in order. The first is always tried; the
    /// rest only while the previous encode was over budget.
    ///
    /// ```rust
    /// use compress::CompressionPolicy;
    ///
    /// let schedule: Vec<u8> = CompressionPolicy::DEFAULT.quality_schedule().collect();
    /// assert_eq!(schedule.first(), Some(&80));
    /// assert_eq!(schedule.last(), Some(&15));
    /// assert_eq!(schedule.len(), 14);
    /// ```
    pub fn quality_schedule(&self) -> impl Iterator<Item = u8> {
        let floor = i32::from(self.quality_floor);
        let step = i32::from(self.quality_step.max(1));
        let first = i32::from(self.initial_quality);
        std::iter::successors(Some(first), move |q| Some(q - step))
            .enumerate()
            .take_while(move |(i, q)| *i == 0 || *q > floor)
            .map(|(_, q)| q.clamp(1, 100) as u8)
    }

    /// Checks the policy for internal consistency.
    pub fn validate(&self) -> Result<(), CompressError> {
        if self.initial_width == 0 {
            return Err(CompressError::InvalidPolicy(
                "initial_width must be >= 1".into(),
            ));
        }
        if self.quality_step == 0 {
            return Err(CompressError::InvalidPolicy(
                "quality_step must be >= 1".into(),
            ));
        }
        if self.initial_quality > 100 || self.initial_quality == 0 {
            return Err(CompressError::InvalidPolicy(format!(
                "initial_quality must be in 1..=100 (got {})",
                self.initial_quality
            )));
        }
        if self.quality_floor >= self.initial_quality {
            return Err(CompressError::InvalidPolicy(format!(
                "quality_floor ({}) must be below initial_quality ({})",
                self.quality_floor, self.initial_quality
            )));
        }
        Ok(())
    }
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}
