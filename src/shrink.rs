//! Periodic background shrinking of idle objects

use crate::reducer::{PoolSnapshot, Reducer};
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Surface of a pool the shrink task is allowed to touch
pub(crate) trait ShrinkTarget: Send + Sync {
    fn snapshot(&self, taken_in_period: u64) -> PoolSnapshot;

    fn taken_count(&self) -> u64;

    fn reduce_created(&self, reduction: usize) -> usize;

    fn is_terminated(&self) -> bool;
}

struct Signal {
    stopped: Mutex<bool>,
    wakeup: Condvar,
}

/// Handle to the shrink thread. Ticks run one at a time on that thread, so a
/// slow tick delays the next one instead of overlapping with it.
pub(crate) struct AutoShrinker {
    signal: Arc<Signal>,
    handle: Option<JoinHandle<()>>,
}

impl AutoShrinker {
    pub fn start(
        target: Weak<dyn ShrinkTarget>,
        reducer: Arc<dyn Reducer>,
        period: Duration,
    ) -> io::Result<Self> {
        let signal = Arc::new(Signal {
            stopped: Mutex::new(false),
            wakeup: Condvar::new(),
        });

        let thread_signal = Arc::clone(&signal);
        let handle = thread::Builder::new()
            .name("objectpool-shrinker".to_string())
            .spawn(move || run(target, reducer, period, thread_signal))?;

        debug!(?period, "auto-shrink task started");
        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Stop the task and wait for an in-flight tick to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        *self.signal.stopped.lock() = true;
        self.signal.wakeup.notify_all();

        if let Some(handle) = self.handle.take() {
            // The pool can be dropped from inside a tick; that thread cannot join itself
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for AutoShrinker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(target: Weak<dyn ShrinkTarget>, reducer: Arc<dyn Reducer>, period: Duration, signal: Arc<Signal>) {
    let mut last_taken_count = 0u64;
    loop {
        let deadline = Instant::now() + period;
        {
            let mut stopped = signal.stopped.lock();
            while !*stopped {
                if signal.wakeup.wait_until(&mut stopped, deadline).timed_out() {
                    break;
                }
            }
            if *stopped {
                break;
            }
        }

        let Some(pool) = target.upgrade() else {
            break;
        };
        if pool.is_terminated() {
            break;
        }

        let taken_count = pool.taken_count();
        let snapshot = pool.snapshot(taken_count.saturating_sub(last_taken_count));
        last_taken_count = taken_count;

        let wanted = reducer.reduce_by(&snapshot);
        if wanted > 0 {
            let reduced = pool.reduce_created(wanted);
            debug!(wanted, reduced, created_total = snapshot.created_total, "auto-shrink tick");
        } else {
            trace!(taken_in_period = snapshot.taken_in_period, "auto-shrink tick, nothing to reduce");
        }
    }
    debug!("auto-shrink task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    struct FakePool {
        idle: AtomicUsize,
        taken_count: AtomicU64,
        ticks: AtomicUsize,
    }

    impl ShrinkTarget for FakePool {
        fn snapshot(&self, taken_in_period: u64) -> PoolSnapshot {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            let idle = self.idle.load(Ordering::SeqCst);
            PoolSnapshot {
                taken_in_period,
                created_total: idle,
                remaining_created: idle,
                initial_size: 0,
                max_size: 100,
            }
        }

        fn taken_count(&self) -> u64 {
            self.taken_count.load(Ordering::SeqCst)
        }

        fn reduce_created(&self, reduction: usize) -> usize {
            let idle = self.idle.load(Ordering::SeqCst);
            let reduction = reduction.min(idle);
            self.idle.store(idle - reduction, Ordering::SeqCst);
            reduction
        }

        fn is_terminated(&self) -> bool {
            false
        }
    }

    fn fake(idle: usize) -> Arc<FakePool> {
        Arc::new(FakePool {
            idle: AtomicUsize::new(idle),
            taken_count: AtomicU64::new(0),
            ticks: AtomicUsize::new(0),
        })
    }

    fn weak_target(pool: &Arc<FakePool>) -> Weak<dyn ShrinkTarget> {
        let weak: Weak<FakePool> = Arc::downgrade(pool);
        weak
    }

    #[test]
    fn test_ticks_apply_reduction() {
        let pool = fake(10);
        let weak = weak_target(&pool);
        let shrinker = AutoShrinker::start(weak, Arc::new(|_: &PoolSnapshot| 1usize), Duration::from_millis(10)).unwrap();

        let started = Instant::now();
        while pool.idle.load(Ordering::SeqCst) > 5 && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        shrinker.stop();

        assert!(pool.idle.load(Ordering::SeqCst) <= 5);
    }

    #[test]
    fn test_stop_is_prompt_and_final() {
        let pool = fake(10);
        let weak = weak_target(&pool);
        let shrinker = AutoShrinker::start(weak, Arc::new(|_: &PoolSnapshot| 1usize), Duration::from_secs(60)).unwrap();

        let started = Instant::now();
        shrinker.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(pool.ticks.load(Ordering::SeqCst), 0);
        assert_eq!(pool.idle.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_exits_when_pool_is_gone() {
        let pool = fake(3);
        let weak = weak_target(&pool);
        drop(pool);

        let shrinker = AutoShrinker::start(weak, Arc::new(|_: &PoolSnapshot| 1usize), Duration::from_millis(5)).unwrap();
        let finished = || shrinker.handle.as_ref().is_some_and(|h| h.is_finished());
        let started = Instant::now();
        while !finished() && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(finished());
        shrinker.stop();
    }

    #[test]
    fn test_period_delta_of_taken_count() {
        let pool = fake(0);
        pool.taken_count.store(40, Ordering::SeqCst);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let reducer = move |s: &PoolSnapshot| {
            record.lock().push(s.taken_in_period);
            0usize
        };

        let weak = weak_target(&pool);
        let shrinker = AutoShrinker::start(weak, Arc::new(reducer), Duration::from_millis(10)).unwrap();
        let started = Instant::now();
        while seen.lock().len() < 2 && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        shrinker.stop();

        let seen = seen.lock();
        assert_eq!(seen[0], 40);
        assert_eq!(seen[1], 0);
    }
}
