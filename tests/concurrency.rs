//! Many tasks taking and restoring at once

use concurrent_objectpool::{FnFactory, ObjectPool, PoolConfiguration, StoreOrder, ValidatingPool};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

const TASKS: usize = 16;
const ROUNDS: usize = 200;

fn tracked_factory(live: Arc<AtomicUsize>) -> FnFactory<u64> {
    let next = AtomicU64::new(0);
    let created = Arc::clone(&live);
    FnFactory::new(move || {
        created.fetch_add(1, Ordering::SeqCst);
        Ok(next.fetch_add(1, Ordering::SeqCst))
    })
    .with_destroy(move |_| {
        live.fetch_sub(1, Ordering::SeqCst);
    })
}

async fn hammer(fair: bool, order: StoreOrder) {
    let live = Arc::new(AtomicUsize::new(0));
    let config = PoolConfiguration::new()
        .with_initial_size(2)
        .with_max_size(4)
        .with_fairness(fair)
        .with_store_order(order);
    let pool = ObjectPool::new(tracked_factory(Arc::clone(&live)), config).unwrap();
    let successes = Arc::new(AtomicU64::new(0));
    let over_limit = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::new();
    for _ in 0..TASKS {
        let pool = pool.clone();
        let successes = Arc::clone(&successes);
        let over_limit = Arc::clone(&over_limit);
        handles.push(tokio::spawn(async move {
            for _ in 0..ROUNDS {
                if let Some(obj) = pool.try_take(Duration::from_millis(50)).await.unwrap() {
                    successes.fetch_add(1, Ordering::SeqCst);
                    if pool.created_total() > pool.max_size() || pool.taken() > pool.max_size() {
                        over_limit.store(true, Ordering::SeqCst);
                    }
                    tokio::task::yield_now().await;
                    pool.restore(obj).unwrap();
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(!over_limit.load(Ordering::SeqCst));
    assert_eq!(pool.taken(), 0);
    assert!(pool.created_total() <= 4);
    assert_eq!(pool.remaining_created(), pool.created_total());
    assert_eq!(pool.remaining_capacity(), 4);
    assert_eq!(pool.taken_count(), successes.load(Ordering::SeqCst));
    assert_eq!(live.load(Ordering::SeqCst), pool.created_total());

    pool.terminate();
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unfair_lifo_under_contention() {
    hammer(false, StoreOrder::Lifo).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fair_fifo_under_contention() {
    hammer(true, StoreOrder::Fifo).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shrinking_while_busy_never_touches_loans() {
    let live = Arc::new(AtomicUsize::new(0));
    let config = PoolConfiguration::new().with_max_size(8);
    let pool = ObjectPool::new(tracked_factory(Arc::clone(&live)), config).unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..ROUNDS {
                let obj = pool.take().await.unwrap();
                tokio::task::yield_now().await;
                pool.restore(obj).unwrap();
            }
        }));
    }
    let reducer = {
        let pool = pool.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                pool.reduce_created(2);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    };
    for handle in handles {
        handle.await.unwrap();
    }
    reducer.await.unwrap();

    assert_eq!(pool.taken(), 0);
    assert_eq!(pool.remaining_created(), pool.created_total());
    assert_eq!(pool.remaining_capacity(), 8);
    assert_eq!(live.load(Ordering::SeqCst), pool.created_total());
    assert_eq!(pool.taken_count(), (8 * ROUNDS) as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_terminate_releases_every_waiter() {
    let config = PoolConfiguration::new().with_max_size(1).with_fairness(true);
    let pool = ObjectPool::new(FnFactory::new(|| Ok(0u8)), config).unwrap();
    let held = pool.take().await.unwrap();

    let waiters: Vec<_> = (0..6)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.take().await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(20)).await;
    pool.terminate();

    for waiter in waiters {
        let result = tokio::time::timeout(Duration::from_secs(5), waiter).await.unwrap().unwrap();
        assert!(result.is_err());
    }
    // A restore after terminate is accepted and the object destroyed
    pool.restore(held).unwrap();
    assert_eq!(pool.created_total(), 0);
}

#[tokio::test]
async fn test_fair_pool_serves_waiters_in_arrival_order() {
    let config = PoolConfiguration::new().with_max_size(1).with_fairness(true);
    let pool = ObjectPool::new(FnFactory::new(|| Ok(0u8)), config).unwrap();
    let held = pool.take().await.unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut waiters = Vec::new();
    for i in 0..8 {
        let pool = pool.clone();
        let order = Arc::clone(&order);
        waiters.push(tokio::spawn(async move {
            let loan = pool.take().await.unwrap();
            order.lock().push(i);
            pool.restore(loan).unwrap();
        }));
        // Queue this waiter before the next one arrives
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    pool.restore(held).unwrap();
    for waiter in waiters {
        waiter.await.unwrap();
    }

    assert_eq!(*order.lock(), (0..8).collect::<Vec<_>>());
    assert_eq!(pool.remaining_capacity(), 1);
}

#[tokio::test]
async fn test_fair_timed_out_head_passes_permit_to_next_waiter() {
    let config = PoolConfiguration::new().with_max_size(1).with_fairness(true);
    let pool = ObjectPool::new(FnFactory::new(|| Ok(0u8)), config).unwrap();
    let held = pool.take().await.unwrap();

    let head = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.try_take(Duration::from_millis(30)).await.unwrap().is_some() })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    let next = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let loan = pool.take().await.unwrap();
            pool.restore(loan).unwrap();
        })
    };

    assert!(!head.await.unwrap());
    pool.restore(held).unwrap();
    tokio::time::timeout(Duration::from_secs(5), next).await.unwrap().unwrap();

    assert_eq!(pool.remaining_capacity(), 1);
    assert_eq!(pool.taken_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_release_racing_head_timeout_loses_no_permit() {
    for fair in [true, false] {
        let config = PoolConfiguration::new().with_max_size(1).with_fairness(fair);
        let pool = ObjectPool::new(FnFactory::new(|| Ok(0u8)), config).unwrap();

        for _ in 0..20 {
            let held = pool.take().await.unwrap();
            let head = {
                let pool = pool.clone();
                tokio::spawn(async move {
                    match pool.try_take(Duration::from_millis(10)).await.unwrap() {
                        Some(loan) => {
                            pool.restore(loan).unwrap();
                            true
                        }
                        None => false,
                    }
                })
            };
            tokio::time::sleep(Duration::from_millis(2)).await;
            let next = {
                let pool = pool.clone();
                tokio::spawn(async move {
                    let loan = pool.take().await.unwrap();
                    pool.restore(loan).unwrap();
                })
            };

            // Released right around the moment the head gives up
            tokio::time::sleep(Duration::from_millis(10)).await;
            pool.restore(held).unwrap();

            head.await.unwrap();
            tokio::time::timeout(Duration::from_secs(5), next).await.unwrap().unwrap();
            assert_eq!(pool.remaining_capacity(), 1);
            assert_eq!(pool.taken(), 0);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_holders_moved_across_tasks() {
    let pool = ValidatingPool::new(FnFactory::new(|| Ok(vec![0u8; 64])), PoolConfiguration::new().with_max_size(3)).unwrap();

    let mut handles = Vec::new();
    for i in 0..12 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let holder = pool.take().await.unwrap();
            assert_eq!(holder.len(), 64);
            tokio::time::sleep(Duration::from_millis(1)).await;
            if i % 2 == 0 {
                pool.restore(holder).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(pool.taken_holders().is_empty());
    assert_eq!(pool.taken(), 0);
    assert_eq!(pool.taken_count(), 12);
    assert!(pool.created_total() <= 3);
}
