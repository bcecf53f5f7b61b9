//! Core object pool: capacity accounting and object lifecycle

use crate::config::{PoolConfiguration, StoreOrder};
use crate::errors::{PoolError, PoolResult};
use crate::factory::ObjectFactory;
use crate::loan::{Loan, LoanInfo};
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::permits::{AcquireError, Permit, PermitGate};
use crate::reducer::PoolSnapshot;
use crate::shrink::{AutoShrinker, ShrinkTarget};
use crate::store::{ConcurrentStore, DequeStore, QueueStore};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Bounded pool of objects created on demand by an [`ObjectFactory`].
///
/// At most `max_size` objects exist at any time. Takers wait for capacity,
/// either indefinitely ([`take`](Self::take)) or up to a timeout
/// ([`try_take`](Self::try_take)), and receive a [`Loan`] that must be handed
/// back with [`restore`](Self::restore). Cloning the pool yields another handle to the
/// same objects; the pool terminates when the last handle is dropped.
///
/// # Examples
///
/// ```
/// use concurrent_objectpool::{FnFactory, ObjectPool, PoolConfiguration};
/// use std::time::Duration;
///
/// # tokio_test();
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn tokio_test() {
/// let config = PoolConfiguration::new().with_initial_size(1).with_max_size(2);
/// let pool = ObjectPool::new(FnFactory::new(|| Ok(String::from("conn"))), config).unwrap();
///
/// let first = pool.take().await.unwrap();
/// let second = pool.try_take(Duration::from_millis(10)).await.unwrap().unwrap();
/// assert!(pool.try_take(Duration::ZERO).await.unwrap().is_none());
///
/// pool.restore(first).unwrap();
/// pool.restore(second).unwrap();
/// assert_eq!(pool.remaining_created(), 2);
/// # }
/// ```
pub struct ObjectPool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> Clone for ObjectPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct PoolInner<T> {
    factory: Arc<dyn ObjectFactory<T>>,
    store: Box<dyn ConcurrentStore<T>>,
    gate: PermitGate,
    // Read side: take/restore critical sections. Write side: terminate.
    lifecycle: RwLock<()>,
    terminated: AtomicBool,
    created_total: AtomicUsize,
    loans: DashMap<u64, Instant>,
    taken_count: AtomicU64,
    initial_size: usize,
    max_size: usize,
    metrics: MetricsTracker,
    shrinker: Mutex<Option<AutoShrinker>>,
}

impl<T: Send + 'static> ObjectPool<T> {
    /// Create a pool, eagerly creating `initial_size` objects
    pub fn new<F>(factory: F, config: PoolConfiguration) -> PoolResult<Self>
    where
        F: ObjectFactory<T> + 'static,
    {
        Self::with_factory(Arc::new(factory), config)
    }

    /// Create a pool around a shared factory
    pub fn with_factory(
        factory: Arc<dyn ObjectFactory<T>>,
        config: PoolConfiguration,
    ) -> PoolResult<Self> {
        let store: Box<dyn ConcurrentStore<T>> = match config.store_order {
            StoreOrder::Lifo => Box::new(DequeStore::with_capacity(config.initial_size)),
            StoreOrder::Fifo => Box::new(QueueStore::new()),
        };
        Self::with_store(factory, store, config)
    }

    /// Create a pool keeping its idle objects in a caller supplied store.
    ///
    /// The pool restores with `offer_first`, takes with `poll_first` and
    /// shrinks with `poll_last`; `config.store_order` is ignored.
    pub fn with_store(
        factory: Arc<dyn ObjectFactory<T>>,
        store: Box<dyn ConcurrentStore<T>>,
        config: PoolConfiguration,
    ) -> PoolResult<Self> {
        config.validate()?;

        let inner = Arc::new(PoolInner {
            factory,
            store,
            gate: PermitGate::new(config.max_size, config.fair),
            lifecycle: RwLock::new(()),
            terminated: AtomicBool::new(false),
            created_total: AtomicUsize::new(0),
            loans: DashMap::new(),
            taken_count: AtomicU64::new(0),
            initial_size: config.initial_size,
            max_size: config.max_size,
            metrics: MetricsTracker::new(),
            shrinker: Mutex::new(None),
        });

        for _ in 0..config.initial_size {
            match inner.factory.create() {
                Ok(obj) => {
                    inner.created_total.fetch_add(1, Ordering::AcqRel);
                    inner.store.offer_last(obj);
                }
                Err(e) => {
                    inner.terminate();
                    return Err(PoolError::CreationFailed(e.to_string()));
                }
            }
        }

        if let (Some(period), Some(reducer)) = (config.shrink_period, config.reducer.build()) {
            let weak: Weak<PoolInner<T>> = Arc::downgrade(&inner);
            let target: Weak<dyn ShrinkTarget> = weak;
            match AutoShrinker::start(target, reducer, period) {
                Ok(shrinker) => *inner.shrinker.lock() = Some(shrinker),
                Err(e) => {
                    inner.terminate();
                    return Err(PoolError::InvalidConfiguration(format!(
                        "cannot start auto-shrink task: {e}"
                    )));
                }
            }
        }

        info!(
            initial_size = config.initial_size,
            max_size = config.max_size,
            fair = config.fair,
            store_order = ?config.store_order,
            "object pool created"
        );
        Ok(Self { inner })
    }

    /// Take an object, waiting as long as needed for capacity.
    ///
    /// Fails with [`PoolError::Terminated`] once the pool is terminated, and
    /// with [`PoolError::CreationFailed`] when a new object was needed and the
    /// factory could not build it; the capacity slot is released either way.
    pub async fn take(&self) -> PoolResult<Loan<T>> {
        let permit = self
            .inner
            .gate
            .acquire()
            .await
            .map_err(|_| PoolError::Terminated)?;
        self.inner.settle(self.inner.checkout(permit))
    }

    /// Take an object, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when the timeout expires; `Duration::ZERO` only
    /// makes a single attempt. An abandoned wait consumes no capacity.
    pub async fn try_take(&self, timeout: Duration) -> PoolResult<Option<Loan<T>>> {
        if timeout.is_zero() {
            return self.try_take_now();
        }

        match tokio::time::timeout(timeout, self.inner.gate.acquire()).await {
            Err(_) => Ok(None),
            Ok(Err(_)) => Err(PoolError::Terminated),
            Ok(Ok(permit)) => self.inner.settle(self.inner.checkout(permit)).map(Some),
        }
    }

    /// Take an object only if one is available without waiting
    pub fn try_take_now(&self) -> PoolResult<Option<Loan<T>>> {
        match self.inner.gate.try_acquire() {
            Ok(permit) => self.inner.settle(self.inner.checkout(permit)).map(Some),
            Err(AcquireError::NoPermits) => Ok(None),
            Err(AcquireError::Closed) => Err(PoolError::Terminated),
        }
    }

    /// Give back an object obtained from this pool.
    ///
    /// A loan this pool did not grant is rejected with
    /// [`PoolError::InvalidRestore`] and its object is dropped without
    /// touching any gauge. On a terminated pool the object is destroyed.
    pub fn restore(&self, loan: Loan<T>) -> PoolResult<()> {
        self.inner.settle(self.inner.restore(loan))
    }

    /// Destroy every idle object, returning how many were destroyed
    pub fn drain_created(&self) -> usize {
        self.inner.reduce_created(usize::MAX)
    }

    /// Destroy up to `reduction` idle objects, returning how many were destroyed
    pub fn reduce_created(&self, reduction: usize) -> usize {
        self.inner.reduce_created(reduction)
    }

    /// Terminate the pool: stop auto-shrinking, fail all waiting and future
    /// takes, and destroy the idle objects. Objects still on loan are
    /// destroyed when restored. Calling it again has no effect.
    pub fn terminate(&self) {
        self.inner.terminate();
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }

    pub fn is_fair(&self) -> bool {
        self.inner.gate.is_fair()
    }

    pub fn initial_size(&self) -> usize {
        self.inner.initial_size
    }

    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    /// Objects currently allocated, idle or on loan
    pub fn created_total(&self) -> usize {
        self.inner.created_total.load(Ordering::Acquire)
    }

    /// Idle objects in the store
    pub fn remaining_created(&self) -> usize {
        self.inner.store.len()
    }

    /// Takes that could still be granted; zero once terminated
    pub fn remaining_capacity(&self) -> usize {
        if self.is_terminated() {
            0
        } else {
            self.inner.gate.available()
        }
    }

    /// Objects currently on loan
    pub fn taken(&self) -> usize {
        self.created_total().saturating_sub(self.remaining_created())
    }

    /// Successful takes since the pool was created
    pub fn taken_count(&self) -> u64 {
        self.inner.taken_count.load(Ordering::Acquire)
    }

    /// Outstanding loans, oldest first
    pub fn outstanding_loans(&self) -> Vec<LoanInfo> {
        let now = Instant::now();
        let mut loans: Vec<LoanInfo> = self
            .inner
            .loans
            .iter()
            .map(|entry| LoanInfo {
                loan_id: *entry.key(),
                held_for: now.saturating_duration_since(*entry.value()),
            })
            .collect();
        loans.sort_by_key(|loan| loan.loan_id);
        loans
    }

    /// Snapshot of all gauges and counters
    pub fn metrics(&self) -> PoolMetrics {
        let taken = self.taken();
        let tracker = &self.inner.metrics;
        PoolMetrics {
            initial_size: self.inner.initial_size,
            max_size: self.inner.max_size,
            created_total: self.created_total(),
            remaining_created: self.remaining_created(),
            remaining_capacity: self.remaining_capacity(),
            taken,
            taken_count: self.taken_count(),
            creation_failures: MetricsTracker::load(&tracker.creation_failures),
            destroyed_total: MetricsTracker::load(&tracker.destroyed_total),
            validation_failures: MetricsTracker::load(&tracker.validation_failures),
            invalid_restores: MetricsTracker::load(&tracker.invalid_restores),
            utilization: taken as f64 / self.inner.max_size as f64,
        }
    }

    pub(crate) fn factory(&self) -> &Arc<dyn ObjectFactory<T>> {
        &self.inner.factory
    }

    pub(crate) fn record_validation_failure(&self) {
        MetricsTracker::record(&self.inner.metrics.validation_failures);
    }

    /// Destroy a taken object and free its capacity slot
    pub(crate) fn discard(&self, loan: Loan<T>) -> PoolResult<()> {
        self.inner.settle(self.inner.discard(loan))
    }

    /// Destroy a taken object and put a freshly created one in its place
    pub(crate) fn restore_replaced(&self, loan: Loan<T>) -> PoolResult<()> {
        self.inner.settle(self.inner.restore_replaced(loan))
    }
}

impl<T: Send + 'static> PoolInner<T> {
    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Terminates the pool on an accounting mismatch. Must be called with no
    /// lifecycle guard held.
    fn settle<R>(&self, result: PoolResult<R>) -> PoolResult<R> {
        if let Err(PoolError::AccountingMismatch(ref reason)) = result {
            error!(reason = %reason, "pool accounting mismatch, terminating pool");
            self.terminate();
        }
        result
    }

    fn checkout(&self, permit: Permit<'_>) -> PoolResult<Loan<T>> {
        let _guard = self.lifecycle.read();
        if self.is_terminated() {
            return Err(PoolError::Terminated);
        }

        let loan = Loan::new(self.obtain()?);
        self.loans.insert(loan.id(), Instant::now());
        self.taken_count.fetch_add(1, Ordering::AcqRel);
        permit.forget();
        Ok(loan)
    }

    /// Reuse an idle object or create one in a free slot. A permit holder
    /// always finds one or the other: shrinking frees a slot before it
    /// removes the idle object.
    fn obtain(&self) -> PoolResult<T> {
        if let Some(obj) = self.store.poll_first() {
            return Ok(obj);
        }
        if self.reserve_slot() {
            return self.create_in_slot();
        }
        Err(PoolError::AccountingMismatch(
            "permit granted with no idle object and no free slot".to_string(),
        ))
    }

    fn reserve_slot(&self) -> bool {
        self.created_total
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |created| {
                (created < self.max_size).then_some(created + 1)
            })
            .is_ok()
    }

    fn release_slot(&self) -> PoolResult<()> {
        self.created_total
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |created| created.checked_sub(1))
            .map(|_| ())
            .map_err(|_| PoolError::AccountingMismatch("created_total underflow".to_string()))
    }

    fn create_in_slot(&self) -> PoolResult<T> {
        match self.factory.create() {
            Ok(obj) => Ok(obj),
            Err(e) => {
                self.release_slot()?;
                MetricsTracker::record(&self.metrics.creation_failures);
                warn!(error = %e, "object creation failed, capacity slot released");
                Err(PoolError::CreationFailed(e.to_string()))
            }
        }
    }

    fn destroy(&self, obj: T) {
        self.factory.destroy(obj);
        MetricsTracker::record(&self.metrics.destroyed_total);
    }

    fn end_loan(&self, loan_id: u64) -> bool {
        let ended = self.loans.remove(&loan_id).is_some();
        if !ended {
            MetricsTracker::record(&self.metrics.invalid_restores);
            warn!(loan_id, "restore rejected: loan is not outstanding in this pool");
        }
        ended
    }

    fn release_permit(&self) -> PoolResult<()> {
        if self.gate.available() >= self.max_size {
            return Err(PoolError::AccountingMismatch(
                "permit release would exceed max_size".to_string(),
            ));
        }
        self.gate.release(1);
        Ok(())
    }

    /// Close the loan; once terminated the object is destroyed instead of
    /// being handed back
    fn check_in(&self, loan: Loan<T>) -> PoolResult<Option<T>> {
        if !self.end_loan(loan.id()) {
            return Err(PoolError::InvalidRestore);
        }
        if self.is_terminated() {
            self.destroy(loan.into_inner());
            return Ok(None);
        }
        Ok(Some(loan.into_inner()))
    }

    fn restore(&self, loan: Loan<T>) -> PoolResult<()> {
        let _guard = self.lifecycle.read();
        let Some(obj) = self.check_in(loan)? else {
            return Ok(());
        };

        self.store.offer_first(obj);
        self.release_permit()
    }

    fn discard(&self, loan: Loan<T>) -> PoolResult<()> {
        let _guard = self.lifecycle.read();
        let Some(obj) = self.check_in(loan)? else {
            return Ok(());
        };

        self.destroy(obj);
        self.release_slot()?;
        self.release_permit()
    }

    fn restore_replaced(&self, loan: Loan<T>) -> PoolResult<()> {
        let _guard = self.lifecycle.read();
        let Some(obj) = self.check_in(loan)? else {
            return Ok(());
        };

        self.destroy(obj);
        match self.factory.create() {
            Ok(replacement) => self.store.offer_first(replacement),
            Err(e) => {
                self.release_slot()?;
                MetricsTracker::record(&self.metrics.creation_failures);
                warn!(error = %e, "replacement creation failed, pool shrinks by one");
            }
        }
        self.release_permit()
    }

    fn reduce_created(&self, reduction: usize) -> usize {
        let result = self.reduce_idle(reduction);
        self.settle(result).unwrap_or(0)
    }

    fn reduce_idle(&self, reduction: usize) -> PoolResult<usize> {
        let _guard = self.lifecycle.read();
        if self.is_terminated() {
            return Ok(0);
        }

        let mut reduced = 0;
        while reduced < reduction {
            // Slot before object, so a taker holding a permit always finds one of them
            if self.release_slot().is_err() {
                if self.store.poll_last().is_some() {
                    return Err(PoolError::AccountingMismatch(
                        "idle object found with no allocated slot".to_string(),
                    ));
                }
                break;
            }
            let Some(obj) = self.store.poll_last() else {
                self.created_total.fetch_add(1, Ordering::AcqRel);
                break;
            };
            self.destroy(obj);
            reduced += 1;
        }

        if reduced > 0 {
            debug!(requested = reduction, reduced, "idle objects destroyed");
        }
        Ok(reduced)
    }

    fn terminate(&self) {
        let shrinker = self.shrinker.lock().take();
        if let Some(shrinker) = shrinker {
            shrinker.stop();
        }

        let _guard = self.lifecycle.write();
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }

        self.gate.close();
        let mut destroyed = 0usize;
        while let Some(obj) = self.store.poll_last() {
            self.destroy(obj);
            destroyed += 1;
        }
        let dangling = self.created_total.swap(0, Ordering::AcqRel).saturating_sub(destroyed);

        info!(
            destroyed,
            dangling,
            taken_count = self.taken_count.load(Ordering::Acquire),
            "object pool terminated"
        );
    }
}

impl<T: Send + 'static> ShrinkTarget for PoolInner<T> {
    fn snapshot(&self, taken_in_period: u64) -> PoolSnapshot {
        PoolSnapshot {
            taken_in_period,
            created_total: self.created_total.load(Ordering::Acquire),
            remaining_created: self.store.len(),
            initial_size: self.initial_size,
            max_size: self.max_size,
        }
    }

    fn taken_count(&self) -> u64 {
        self.taken_count.load(Ordering::Acquire)
    }

    fn reduce_created(&self, reduction: usize) -> usize {
        PoolInner::reduce_created(self, reduction)
    }

    fn is_terminated(&self) -> bool {
        PoolInner::is_terminated(self)
    }
}

impl<T> Drop for PoolInner<T> {
    fn drop(&mut self) {
        if let Some(shrinker) = self.shrinker.get_mut().take() {
            shrinker.stop();
        }
        if !self.terminated.load(Ordering::Acquire) {
            self.gate.close();
            while let Some(obj) = self.store.poll_last() {
                self.factory.destroy(obj);
            }
        }
    }
}
