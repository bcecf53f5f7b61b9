//! Pool configuration options

use crate::errors::{PoolError, PoolResult};
use crate::reducer::{DefaultReducer, Reducer};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Order in which idle objects leave the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreOrder {
    /// Most recently restored object is taken first (warm reuse)
    #[default]
    Lifo,

    /// Oldest idle object is taken first
    Fifo,
}

/// Shrinking policy applied by the auto-shrink task
#[derive(Clone, Default)]
pub enum ReducerPolicy {
    /// Never shrink automatically
    #[default]
    None,

    /// Built-in utilization based policy
    Default {
        low_watermark: f64,
        reduction_ratio: f64,
    },

    /// Caller supplied policy
    Custom(Arc<dyn Reducer>),
}

impl ReducerPolicy {
    pub(crate) fn build(&self) -> Option<Arc<dyn Reducer>> {
        match self {
            ReducerPolicy::None => None,
            ReducerPolicy::Default {
                low_watermark,
                reduction_ratio,
            } => Some(Arc::new(DefaultReducer::new(*low_watermark, *reduction_ratio))),
            ReducerPolicy::Custom(reducer) => Some(Arc::clone(reducer)),
        }
    }
}

impl fmt::Debug for ReducerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReducerPolicy::None => f.write_str("None"),
            ReducerPolicy::Default {
                low_watermark,
                reduction_ratio,
            } => f
                .debug_struct("Default")
                .field("low_watermark", low_watermark)
                .field("reduction_ratio", reduction_ratio)
                .finish(),
            ReducerPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Configuration for object pool behavior
///
/// # Examples
///
/// ```
/// use concurrent_objectpool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_initial_size(2)
///     .with_max_size(20)
///     .with_fairness(true)
///     .with_default_reducer(Duration::from_secs(30));
///
/// assert_eq!(config.max_size, 20);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration {
    /// Objects created eagerly when the pool is built
    pub initial_size: usize,

    /// Hard ceiling on objects existing at the same time, idle or on loan
    pub max_size: usize,

    /// Serve blocked takers in arrival order
    pub fair: bool,

    /// Ordering of the idle object store
    pub store_order: StoreOrder,

    /// Policy used by the auto-shrink task
    pub reducer: ReducerPolicy,

    /// Auto-shrink period; the task only runs when a reducer is configured too
    pub shrink_period: Option<Duration>,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            initial_size: 0,
            max_size: 100,
            fair: false,
            store_order: StoreOrder::Lifo,
            reducer: ReducerPolicy::None,
            shrink_period: None,
        }
    }
}

impl PoolConfiguration {
    /// Largest accepted `max_size`, bounded by the permit count tokio can track
    pub const MAX_SIZE_LIMIT: usize = Semaphore::MAX_PERMITS;

    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of eagerly created objects
    pub fn with_initial_size(mut self, size: usize) -> Self {
        self.initial_size = size;
        self
    }

    /// Set the maximum pool size
    ///
    /// # Examples
    ///
    /// ```
    /// use concurrent_objectpool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new().with_max_size(50);
    ///
    /// assert_eq!(config.max_size, 50);
    /// ```
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Choose fair (FIFO) or unfair granting of waiting takers
    pub fn with_fairness(mut self, fair: bool) -> Self {
        self.fair = fair;
        self
    }

    /// Set the idle store ordering
    pub fn with_store_order(mut self, order: StoreOrder) -> Self {
        self.store_order = order;
        self
    }

    /// Shrink with the built-in reducer and its default thresholds
    pub fn with_default_reducer(self, period: Duration) -> Self {
        self.with_reducer(
            ReducerPolicy::Default {
                low_watermark: DefaultReducer::DEFAULT_LOW_WATERMARK,
                reduction_ratio: DefaultReducer::DEFAULT_REDUCTION_RATIO,
            },
            period,
        )
    }

    /// Shrink with the given policy every `period`
    pub fn with_reducer(mut self, policy: ReducerPolicy, period: Duration) -> Self {
        self.reducer = policy;
        self.shrink_period = Some(period);
        self
    }

    /// Check the configuration, failing on the first violation
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_size == 0 {
            return Err(PoolError::InvalidConfiguration(
                "max_size must be at least 1".to_string(),
            ));
        }
        if self.max_size > Self::MAX_SIZE_LIMIT {
            return Err(PoolError::InvalidConfiguration(format!(
                "max_size {} exceeds the limit of {}",
                self.max_size,
                Self::MAX_SIZE_LIMIT
            )));
        }
        if self.initial_size > self.max_size {
            return Err(PoolError::InvalidConfiguration(format!(
                "initial_size {} exceeds max_size {}",
                self.initial_size, self.max_size
            )));
        }
        if let ReducerPolicy::Default {
            low_watermark,
            reduction_ratio,
        } = self.reducer
        {
            if !(0.0..=1.0).contains(&low_watermark) {
                return Err(PoolError::InvalidConfiguration(format!(
                    "low_watermark {low_watermark} is outside [0, 1]"
                )));
            }
            if !(0.0..=1.0).contains(&reduction_ratio) {
                return Err(PoolError::InvalidConfiguration(format!(
                    "reduction_ratio {reduction_ratio} is outside [0, 1]"
                )));
            }
        }
        if self.shrink_period == Some(Duration::ZERO) {
            return Err(PoolError::InvalidConfiguration(
                "shrink_period must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
