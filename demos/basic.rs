//! Basic usage examples for ObjectPool

use concurrent_objectpool::{FnFactory, ObjectPool, PoolConfiguration, ValidatingPool};
use std::sync::atomic::{AtomicUsize, Ordering};

fn main() {
    println!("=== concurrent_objectpool - Basic Examples ===\n");

    // Example 1: Holders return themselves
    simple_pool();

    // Example 2: Raw take and restore
    raw_engine();

    // Example 3: Validation on take and restore
    validated_objects();

    // Example 4: Shrinking and metrics
    shrink_and_metrics();
}

fn simple_pool() {
    println!("1. Simple Pool:");
    let factory = FnFactory::new(|| Ok(String::from("connection")));
    let pool = ValidatingPool::new(factory, PoolConfiguration::new().with_max_size(4)).unwrap();

    {
        let conn = pool.try_take_now().unwrap().unwrap();
        println!("   Got object: {} (loan {})", *conn, conn.loan_id());
        // Returned when dropped
    }

    println!("   Idle after return: {}\n", pool.remaining_created());
}

fn raw_engine() {
    println!("2. Raw Engine:");
    let next = AtomicUsize::new(0);
    let factory = FnFactory::new(move || Ok(next.fetch_add(1, Ordering::SeqCst)));
    let config = PoolConfiguration::new().with_initial_size(1).with_max_size(2);
    let pool = ObjectPool::new(factory, config).unwrap();

    let a = pool.try_take_now().unwrap().unwrap();
    let b = pool.try_take_now().unwrap().unwrap();
    println!("   Took {} and {}, created {}", *a, *b, pool.created_total());

    match pool.try_take_now().unwrap() {
        Some(_) => println!("   Unexpected third object"),
        None => println!("   Third try: None (max size reached)"),
    }

    pool.restore(a).unwrap();
    pool.restore(b).unwrap();

    let other = ObjectPool::new(FnFactory::new(|| Ok(99usize)), PoolConfiguration::new()).unwrap();
    let stranger = other.try_take_now().unwrap().unwrap();
    println!("   Restoring another pool's loan: {:?}\n", pool.restore(stranger));
}

fn validated_objects() {
    println!("3. Validation:");
    let next = AtomicUsize::new(0);
    let factory = FnFactory::new(move || Ok(next.fetch_add(1, Ordering::SeqCst)))
        .with_restore_check(|n| n % 2 == 0)
        .with_destroy(|n| println!("   Destroying {}", n));
    let pool = ValidatingPool::new(factory, PoolConfiguration::new().with_max_size(4)).unwrap();

    let even = pool.try_take_now().unwrap().unwrap();
    let odd = pool.try_take_now().unwrap().unwrap();
    pool.restore(even).unwrap();
    pool.restore(odd).unwrap();

    println!("   Idle: {}, created: {}\n", pool.remaining_created(), pool.created_total());
}

fn shrink_and_metrics() {
    println!("4. Shrinking and Metrics:");
    let factory = FnFactory::new(|| Ok(vec![0u8; 4096]));
    let config = PoolConfiguration::new().with_initial_size(2).with_max_size(10);
    let pool = ObjectPool::new(factory, config).unwrap();

    let buffers: Vec<_> = (0..8).map(|_| pool.try_take_now().unwrap().unwrap()).collect();
    println!("   Utilization while busy: {:.1}%", pool.metrics().utilization * 100.0);
    for buffer in buffers {
        pool.restore(buffer).unwrap();
    }

    println!("   Reduced by {}", pool.reduce_created(4));

    let metrics = pool.metrics().export();
    let mut keys: Vec<_> = metrics.keys().collect();
    keys.sort();
    println!("\n   Metrics:");
    for key in keys {
        println!("     {}: {}", key, metrics[key]);
    }
    pool.terminate();
}
