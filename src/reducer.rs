//! Shrink policies deciding how many idle objects to destroy

/// Pool state handed to a [`Reducer`] on every shrink tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Successful takes since the previous tick
    pub taken_in_period: u64,

    /// Objects currently allocated, idle or on loan
    pub created_total: usize,

    /// Idle objects in the store
    pub remaining_created: usize,

    pub initial_size: usize,

    pub max_size: usize,
}

/// Computes how many idle objects the pool should destroy right now.
///
/// Implementations must be pure functions of the snapshot; the pool caps the
/// result at the idle count before applying it.
///
/// # Examples
///
/// ```
/// use concurrent_objectpool::{PoolSnapshot, Reducer};
///
/// // Drop every idle object above two
/// let keep_two = |s: &PoolSnapshot| s.remaining_created.saturating_sub(2);
///
/// let snapshot = PoolSnapshot {
///     taken_in_period: 0,
///     created_total: 5,
///     remaining_created: 5,
///     initial_size: 0,
///     max_size: 10,
/// };
/// assert_eq!(keep_two.reduce_by(&snapshot), 3);
/// ```
pub trait Reducer: Send + Sync {
    fn reduce_by(&self, snapshot: &PoolSnapshot) -> usize;
}

impl<F> Reducer for F
where
    F: Fn(&PoolSnapshot) -> usize + Send + Sync,
{
    fn reduce_by(&self, snapshot: &PoolSnapshot) -> usize {
        self(snapshot)
    }
}

/// Utilization based reducer.
///
/// Utilization is the number of takes in the last period relative to the
/// created objects. When it is at or below `low_watermark` the pool gives up
/// `reduction_ratio` of its idle objects, never going below `initial_size`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultReducer {
    low_watermark: f64,
    reduction_ratio: f64,
}

impl DefaultReducer {
    pub const DEFAULT_LOW_WATERMARK: f64 = 0.1;
    pub const DEFAULT_REDUCTION_RATIO: f64 = 0.1;

    pub fn new(low_watermark: f64, reduction_ratio: f64) -> Self {
        Self {
            low_watermark,
            reduction_ratio,
        }
    }

    pub fn low_watermark(&self) -> f64 {
        self.low_watermark
    }

    pub fn reduction_ratio(&self) -> f64 {
        self.reduction_ratio
    }
}

impl Default for DefaultReducer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LOW_WATERMARK, Self::DEFAULT_REDUCTION_RATIO)
    }
}

impl Reducer for DefaultReducer {
    fn reduce_by(&self, snapshot: &PoolSnapshot) -> usize {
        let excess = snapshot.created_total.saturating_sub(snapshot.initial_size);
        if excess == 0 || snapshot.remaining_created == 0 {
            return 0;
        }

        let utilization = snapshot.taken_in_period as f64 / snapshot.created_total as f64;
        if utilization > self.low_watermark {
            return 0;
        }

        let reduction = (snapshot.remaining_created as f64 * self.reduction_ratio) as usize;
        reduction.min(excess)
    }
}
