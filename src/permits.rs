//! Counting permits bounding the objects on loan

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Notify, Semaphore, TryAcquireError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AcquireError {
    Closed,
    NoPermits,
}

/// Permit gate in fair or unfair mode.
///
/// Fair mode hands permits to waiters strictly in arrival order. Unfair mode
/// lets a newly arriving taker grab a released permit before a woken waiter
/// gets to it; a waiter that loses the race goes back to waiting.
pub(crate) enum PermitGate {
    Fair(Semaphore),
    Unfair(UnfairGate),
}

impl PermitGate {
    pub fn new(permits: usize, fair: bool) -> Self {
        if fair {
            PermitGate::Fair(Semaphore::new(permits))
        } else {
            PermitGate::Unfair(UnfairGate::new(permits))
        }
    }

    pub fn is_fair(&self) -> bool {
        matches!(self, PermitGate::Fair(_))
    }

    /// Wait for a permit. Dropping the future before it resolves consumes nothing.
    pub async fn acquire(&self) -> Result<Permit<'_>, AcquireError> {
        match self {
            PermitGate::Fair(sem) => {
                sem.acquire().await.map_err(|_| AcquireError::Closed)?.forget();
            }
            PermitGate::Unfair(gate) => gate.acquire().await?,
        }
        Ok(Permit::new(self))
    }

    pub fn try_acquire(&self) -> Result<Permit<'_>, AcquireError> {
        match self {
            PermitGate::Fair(sem) => match sem.try_acquire() {
                Ok(permit) => permit.forget(),
                Err(TryAcquireError::Closed) => return Err(AcquireError::Closed),
                Err(TryAcquireError::NoPermits) => return Err(AcquireError::NoPermits),
            },
            PermitGate::Unfair(gate) => gate.try_acquire()?,
        }
        Ok(Permit::new(self))
    }

    pub fn release(&self, n: usize) {
        match self {
            PermitGate::Fair(sem) => sem.add_permits(n),
            PermitGate::Unfair(gate) => gate.release(n),
        }
    }

    pub fn available(&self) -> usize {
        match self {
            PermitGate::Fair(sem) => sem.available_permits(),
            PermitGate::Unfair(gate) => gate.permits.load(Ordering::Acquire),
        }
    }

    /// Fail every current and future acquisition
    pub fn close(&self) {
        match self {
            PermitGate::Fair(sem) => sem.close(),
            PermitGate::Unfair(gate) => gate.close(),
        }
    }
}

/// A held permit; released on drop unless handed over with `forget`
pub(crate) struct Permit<'a> {
    gate: &'a PermitGate,
    held: bool,
}

impl<'a> Permit<'a> {
    fn new(gate: &'a PermitGate) -> Self {
        Self { gate, held: true }
    }

    /// Keep the permit consumed; the matching restore releases it
    pub fn forget(mut self) {
        self.held = false;
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.held {
            self.gate.release(1);
        }
    }
}

pub(crate) struct UnfairGate {
    permits: AtomicUsize,
    closed: AtomicBool,
    notify: Notify,
}

impl UnfairGate {
    fn new(permits: usize) -> Self {
        Self {
            permits: AtomicUsize::new(permits),
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn try_acquire(&self) -> Result<(), AcquireError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AcquireError::Closed);
        }
        self.permits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| p.checked_sub(1))
            .map(|_| ())
            .map_err(|_| AcquireError::NoPermits)
    }

    async fn acquire(&self) -> Result<(), AcquireError> {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        loop {
            // Register before checking so a release in between is not missed
            notified.as_mut().enable();
            match self.try_acquire() {
                Err(AcquireError::NoPermits) => {}
                other => return other,
            }
            notified.as_mut().await;
            notified.set(self.notify.notified());
        }
    }

    fn release(&self, n: usize) {
        self.permits.fetch_add(n, Ordering::AcqRel);
        for _ in 0..n {
            self.notify.notify_one();
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}
