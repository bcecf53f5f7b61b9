//! # concurrent_objectpool
//!
//! Bounded, thread-safe pool of expensive-to-create objects such as
//! connections, buffers or worker handles.
//!
//! ## Features
//!
//! - Hard `max_size` ceiling enforced by counting permits
//! - Objects created on demand, `initial_size` of them eagerly
//! - Async `take` and timeout-bounded `try_take`, plus a non-blocking attempt
//! - Fair (FIFO) or unfair granting of waiting takers
//! - LIFO or FIFO reuse of idle objects
//! - Readiness checks on take and restore with transparent replacement
//! - Move-only [`Loan`] tokens; a restore the pool did not lend is rejected
//! - [`Holder`] loans that return themselves on drop
//! - Automatic shrinking driven by a pluggable [`Reducer`]
//! - Metrics snapshots with Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use concurrent_objectpool::{FnFactory, PoolConfiguration, ValidatingPool};
//!
//! let factory = FnFactory::new(|| Ok(String::from("connection")));
//! let pool = ValidatingPool::new(factory, PoolConfiguration::new().with_max_size(8)).unwrap();
//! {
//!     let conn = pool.try_take_now().unwrap().unwrap();
//!     println!("Got: {}", *conn);
//!     // Object automatically returned when `conn` goes out of scope
//! }
//! assert_eq!(pool.remaining_created(), 1);
//! ```

mod config;
mod errors;
mod factory;
mod holder;
mod loan;
mod metrics;
mod permits;
mod pool;
mod reducer;
mod shrink;
mod store;
mod validating;

pub use config::{PoolConfiguration, ReducerPolicy, StoreOrder};
pub use errors::{PoolError, PoolResult};
pub use factory::{CreateError, FnFactory, ObjectFactory};
pub use holder::Holder;
pub use loan::{Loan, LoanInfo};
#[cfg(feature = "prometheus")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::ObjectPool;
pub use reducer::{DefaultReducer, PoolSnapshot, Reducer};
pub use store::{ConcurrentStore, DequeStore, QueueStore};
pub use validating::ValidatingPool;
