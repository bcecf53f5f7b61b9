//! Async usage examples

use concurrent_objectpool::{FnFactory, ObjectPool, PoolConfiguration, ValidatingPool};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== concurrent_objectpool - Async Examples ===\n");

    // Example 1: Async take
    async_take().await;

    // Example 2: Take with timeout
    take_with_timeout().await;

    // Example 3: Concurrent access
    concurrent_access().await;

    // Example 4: Auto-shrink and Prometheus export
    auto_shrink().await;
}

async fn async_take() {
    println!("1. Async Take:");
    let pool = ValidatingPool::new(FnFactory::new(|| Ok(42)), PoolConfiguration::default()).unwrap();

    {
        let obj = pool.take().await.unwrap();
        println!("   Got object asynchronously: {}", *obj);
    }

    println!();
}

async fn take_with_timeout() {
    println!("2. Take with Timeout:");
    let pool = ObjectPool::new(FnFactory::new(|| Ok(42)), PoolConfiguration::new().with_max_size(1)).unwrap();

    let obj = pool.take().await.unwrap();

    match pool.try_take(Duration::from_millis(100)).await {
        Ok(Some(_)) => println!("   Got object"),
        Ok(None) => println!("   Timed out after 100ms"),
        Err(e) => println!("   Error: {}", e),
    }

    pool.restore(obj).unwrap();
    println!();
}

async fn concurrent_access() {
    println!("3. Concurrent Access:");
    let config = PoolConfiguration::new().with_max_size(3).with_fairness(true);
    let pool = ValidatingPool::new(FnFactory::new(|| Ok(String::from("worker"))), config).unwrap();

    let mut handles = vec![];
    for i in 0..10 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let obj = pool.take().await.unwrap();
            sleep(Duration::from_millis(10)).await;
            println!("   Task {} used {} (loan {})", i, *obj, obj.loan_id());
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Created {} objects for 10 tasks\n", pool.created_total());
}

async fn auto_shrink() {
    println!("4. Auto-shrink:");
    let config = PoolConfiguration::new()
        .with_initial_size(2)
        .with_max_size(50)
        .with_default_reducer(Duration::from_millis(100));
    let pool = ObjectPool::new(FnFactory::new(|| Ok(vec![0u8; 1024])), config).unwrap();

    let mut buffers = vec![];
    for _ in 0..40 {
        buffers.push(pool.take().await.unwrap());
    }
    for buffer in buffers {
        pool.restore(buffer).unwrap();
    }

    for _ in 0..5 {
        sleep(Duration::from_millis(100)).await;
        println!("   Created: {}", pool.created_total());
    }

    let mut tags = HashMap::new();
    tags.insert("service".to_string(), "demo".to_string());
    match concurrent_objectpool::MetricsExporter::export_prometheus(&pool.metrics(), "buffers", Some(&tags)) {
        Ok(text) => println!("\n{}", text),
        Err(e) => println!("   Export failed: {}", e),
    }

    pool.terminate();
}
