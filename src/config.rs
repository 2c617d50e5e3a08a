use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Pipeline constants
// ---------------------------------------------------------------------------

/// Relative path of the order snapshot.
pub const DEFAULT_DATASET_PATH: &str = "veridi_master_clean.csv";

/// Categories below this volume never enter the ranking.
pub const MIN_CATEGORY_ORDERS: usize = 20;

/// Months must have strictly more orders than this to be charted.
pub const MIN_MONTHLY_ORDERS: usize = 50;

/// Unit-width bins over `[-20, 20)` for the delivery timing spread.
pub const HISTOGRAM_BINS: DelayBins = DelayBins {
    start: -20,
    end: 20,
    width: 1,
};

/// How many sorted categories the category filter selects initially.
pub const DEFAULT_CATEGORY_SELECTION: usize = 20;

// ---------------------------------------------------------------------------
// DelayBins – bucketing of days_difference for the sentiment curve
// ---------------------------------------------------------------------------

/// Half-open bins `[start + k*width, start + (k+1)*width)` covering `[start, end)`.
///
/// The upper edge is exclusive: with the default `[-20, 20)` a delay of
/// exactly +20 days falls in no bin. Dashboards that kept `d <= 20` and cut
/// at `range(-20, 23, 2)` drew an extra `[20, 22)` point at midpoint 21.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayBins {
    pub start: i32,
    pub end: i32,
    pub width: i32,
}

impl Default for DelayBins {
    fn default() -> Self {
        Self {
            start: -20,
            end: 20,
            width: 2,
        }
    }
}

impl DelayBins {
    /// Index of the bin holding `days`, or `None` outside `[start, end)`.
    pub fn index_of(&self, days: f64) -> Option<usize> {
        if self.width <= 0 || !days.is_finite() {
            return None;
        }
        let (start, end) = (f64::from(self.start), f64::from(self.end));
        if days < start || days >= end {
            return None;
        }
        Some(((days - start) / f64::from(self.width)).floor() as usize)
    }

    /// Number of bins in `[start, end)`.
    pub fn len(&self) -> usize {
        if self.width <= 0 || self.end <= self.start {
            return 0;
        }
        ((self.end - self.start + self.width - 1) / self.width) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lower and upper bound of bin `index`.
    pub fn bounds(&self, index: usize) -> (i32, i32) {
        let lower = self.start + self.width * index as i32;
        (lower, lower + self.width)
    }
}

// ---------------------------------------------------------------------------
// TopN – the "scope size" control of the category ranking
// ---------------------------------------------------------------------------

/// Number of categories shown in the vulnerability ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TopN(u32);

impl TopN {
    pub const MIN: u32 = 5;
    pub const MAX: u32 = 50;
    pub const STEP: u32 = 5;
    pub const DEFAULT: u32 = 15;

    pub fn new(value: u32) -> Result<Self, PipelineError> {
        if (Self::MIN..=Self::MAX).contains(&value) && value % Self::STEP == 0 {
            Ok(TopN(value))
        } else {
            Err(PipelineError::InvalidTopN(value))
        }
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl Default for TopN {
    fn default() -> Self {
        TopN(Self::DEFAULT)
    }
}

impl TryFrom<u32> for TopN {
    type Error = PipelineError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        TopN::new(value)
    }
}

impl From<TopN> for u32 {
    fn from(value: TopN) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// AuditConfig
// ---------------------------------------------------------------------------

/// Thresholds used by the aggregates and the session defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Inclusive lower bound on category volume.
    pub min_category_orders: usize,
    /// Exclusive lower bound on monthly volume.
    pub min_monthly_orders: usize,
    pub delay_bins: DelayBins,
    pub histogram_bins: DelayBins,
    pub default_category_selection: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            min_category_orders: MIN_CATEGORY_ORDERS,
            min_monthly_orders: MIN_MONTHLY_ORDERS,
            delay_bins: DelayBins::default(),
            histogram_bins: HISTOGRAM_BINS,
            default_category_selection: DEFAULT_CATEGORY_SELECTION,
        }
    }
}
