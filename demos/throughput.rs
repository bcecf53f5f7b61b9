//! Many tasks taking and immediately restoring holders.
//!
//! Run with `RUST_LOG=concurrent_objectpool=debug` to see pool lifecycle events.

use concurrent_objectpool::{FnFactory, PoolConfiguration, ValidatingPool};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

const INITIAL_SIZE: usize = 10;
const MAX_SIZE: usize = 100;
const ITERATIONS: usize = 50_000;
const TIMEOUT: Duration = Duration::from_secs(5);
const TASKS: usize = 100;
const FAIR: bool = true;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = PoolConfiguration::new()
        .with_initial_size(INITIAL_SIZE)
        .with_max_size(MAX_SIZE)
        .with_fairness(FAIR);
    let pool = ValidatingPool::new(FnFactory::new(|| Ok(Box::new([0u8; 64]))), config).unwrap();

    let unsuccessful = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let pool = pool.clone();
            let unsuccessful = Arc::clone(&unsuccessful);
            tokio::spawn(async move {
                for _ in 0..ITERATIONS {
                    match pool.try_take(TIMEOUT).await {
                        Ok(Some(holder)) => {
                            let _ = pool.restore(holder);
                        }
                        _ => {
                            unsuccessful.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    println!(
        "Total execution time {}ms, unsuccessful takes {}, objects created {}.",
        start.elapsed().as_millis(),
        unsuccessful.load(Ordering::Relaxed),
        pool.created_total()
    );

    pool.terminate();
}
