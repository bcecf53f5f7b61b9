//! Validating pool handing out [`Holder`]s

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::factory::ObjectFactory;
use crate::holder::Holder;
use crate::loan::{Loan, LoanInfo};
use crate::metrics::PoolMetrics;
use crate::pool::ObjectPool;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Pool that checks objects with the factory's readiness hooks.
///
/// Objects failing `ready_to_take` are destroyed and replaced transparently
/// within the caller's time budget. Objects failing `ready_to_restore` are
/// destroyed and a fresh object takes their place, so validation failures
/// never shrink the pool.
///
/// # Examples
///
/// ```
/// use concurrent_objectpool::{FnFactory, PoolConfiguration, ValidatingPool};
///
/// let factory = FnFactory::new(|| Ok(vec![0u8; 16]))
///     .with_restore_check(|buf: &Vec<u8>| buf.len() == 16);
/// let pool = ValidatingPool::new(factory, PoolConfiguration::new().with_max_size(4)).unwrap();
///
/// let holder = pool.try_take_now().unwrap().unwrap();
/// assert_eq!(holder.len(), 16);
/// assert_eq!(pool.taken(), 1);
///
/// pool.restore(holder).unwrap();
/// assert_eq!(pool.taken(), 0);
/// ```
pub struct ValidatingPool<T: Send + 'static> {
    inner: Arc<ValidatingInner<T>>,
}

impl<T: Send + 'static> Clone for ValidatingPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct ValidatingInner<T: Send + 'static> {
    pool: ObjectPool<T>,
}

impl<T: Send + 'static> ValidatingPool<T> {
    /// Create a validating pool with its own engine
    pub fn new<F>(factory: F, config: PoolConfiguration) -> PoolResult<Self>
    where
        F: ObjectFactory<T> + 'static,
    {
        Ok(Self::from_pool(ObjectPool::new(factory, config)?))
    }

    /// Validate the objects of an existing pool
    pub fn from_pool(pool: ObjectPool<T>) -> Self {
        Self {
            inner: Arc::new(ValidatingInner { pool }),
        }
    }

    /// Take a ready object, waiting as long as needed
    pub async fn take(&self) -> PoolResult<Holder<T>> {
        loop {
            let loan = self.inner.pool.take().await?;
            if let Some(holder) = self.inner.lend(loan)? {
                return Ok(holder);
            }
            // Replacements may all be ready at once; let other tasks run
            tokio::task::yield_now().await;
        }
    }

    /// Take a ready object within `timeout`, including the time spent
    /// replacing objects that failed the readiness check
    pub async fn try_take(&self, timeout: Duration) -> PoolResult<Option<Holder<T>>> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let remaining = deadline.map_or(timeout, |d| d.saturating_duration_since(Instant::now()));
            let Some(loan) = self.inner.pool.try_take(remaining).await? else {
                return Ok(None);
            };
            if let Some(holder) = self.inner.lend(loan)? {
                return Ok(Some(holder));
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(None);
            }
            tokio::task::yield_now().await;
        }
    }

    /// Single non-blocking attempt
    pub fn try_take_now(&self) -> PoolResult<Option<Holder<T>>> {
        match self.inner.pool.try_take_now()? {
            Some(loan) => self.inner.lend(loan),
            None => Ok(None),
        }
    }

    /// Give back a holder taken from this pool.
    ///
    /// A holder from another pool is rejected with
    /// [`PoolError::InvalidRestore`] and returns to its own pool on drop.
    pub fn restore(&self, mut holder: Holder<T>) -> PoolResult<()> {
        if !holder.is_from(&self.inner) {
            warn!(loan_id = holder.loan_id(), "restore rejected: holder belongs to another pool");
            return Err(PoolError::InvalidRestore);
        }
        match holder.take_loan() {
            Some(loan) => self.inner.give_back(loan),
            None => Err(PoolError::InvalidRestore),
        }
    }

    /// Outstanding loans, oldest first
    pub fn taken_holders(&self) -> Vec<LoanInfo> {
        self.inner.pool.outstanding_loans()
    }

    pub fn drain_created(&self) -> usize {
        self.inner.pool.drain_created()
    }

    pub fn reduce_created(&self, reduction: usize) -> usize {
        self.inner.pool.reduce_created(reduction)
    }

    pub fn terminate(&self) {
        self.inner.pool.terminate();
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.pool.is_terminated()
    }

    pub fn is_fair(&self) -> bool {
        self.inner.pool.is_fair()
    }

    pub fn initial_size(&self) -> usize {
        self.inner.pool.initial_size()
    }

    pub fn max_size(&self) -> usize {
        self.inner.pool.max_size()
    }

    pub fn created_total(&self) -> usize {
        self.inner.pool.created_total()
    }

    pub fn remaining_created(&self) -> usize {
        self.inner.pool.remaining_created()
    }

    pub fn remaining_capacity(&self) -> usize {
        self.inner.pool.remaining_capacity()
    }

    pub fn taken(&self) -> usize {
        self.inner.pool.taken()
    }

    pub fn taken_count(&self) -> u64 {
        self.inner.pool.taken_count()
    }

    pub fn metrics(&self) -> PoolMetrics {
        self.inner.pool.metrics()
    }
}

impl<T: Send + 'static> ValidatingInner<T> {
    fn check_take(&self, obj: &T) -> PoolResult<()> {
        if self.pool.factory().ready_to_take(obj) {
            Ok(())
        } else {
            Err(PoolError::ValidationFailed)
        }
    }

    /// Wrap a freshly taken object, or discard it when it is not ready
    fn lend(self: &Arc<Self>, loan: Loan<T>) -> PoolResult<Option<Holder<T>>> {
        match self.check_take(&loan) {
            Ok(()) => Ok(Some(Holder::new(loan, Arc::clone(self)))),
            Err(PoolError::ValidationFailed) => {
                self.pool.record_validation_failure();
                debug!(loan_id = loan.id(), "object failed take check, destroying it");
                self.pool.discard(loan)?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) fn give_back(&self, loan: Loan<T>) -> PoolResult<()> {
        if self.pool.is_terminated() || self.pool.factory().ready_to_restore(&loan) {
            self.pool.restore(loan)
        } else {
            self.pool.record_validation_failure();
            debug!(loan_id = loan.id(), "object failed restore check, replacing it");
            self.pool.restore_replaced(loan)
        }
    }
}
