//! Object factory capability supplied by the pool owner

use std::error::Error;

/// Error returned by a factory that could not produce an object
pub type CreateError = Box<dyn Error + Send + Sync>;

/// Creates, destroys and validates the objects held by a pool.
///
/// The pool calls each hook at most once per take/restore cycle and never
/// assumes they are free of side effects. `destroy` is best-effort: it has no
/// way to report failure, so implementations log and move on.
pub trait ObjectFactory<T>: Send + Sync {
    /// Create a new object
    fn create(&self) -> Result<T, CreateError>;

    /// Release an object that leaves the pool for good
    fn destroy(&self, obj: T) {
        drop(obj);
    }

    /// Whether an object handed out by the pool is usable
    fn ready_to_take(&self, _obj: &T) -> bool {
        true
    }

    /// Whether an object given back to the pool may be reused
    fn ready_to_restore(&self, _obj: &T) -> bool {
        true
    }
}

type Check<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Factory built from closures
///
/// # Examples
///
/// ```
/// use concurrent_objectpool::{FnFactory, ObjectFactory};
///
/// let factory = FnFactory::new(|| Ok(Vec::<u8>::with_capacity(1024)))
///     .with_restore_check(|buf: &Vec<u8>| buf.capacity() >= 1024);
///
/// let buf = factory.create().unwrap();
/// assert!(factory.ready_to_restore(&buf));
/// ```
pub struct FnFactory<T> {
    create: Box<dyn Fn() -> Result<T, CreateError> + Send + Sync>,
    destroy: Option<Box<dyn Fn(T) + Send + Sync>>,
    take_check: Option<Check<T>>,
    restore_check: Option<Check<T>>,
}

impl<T> FnFactory<T> {
    /// Create a factory from a creation closure
    pub fn new<F>(create: F) -> Self
    where
        F: Fn() -> Result<T, CreateError> + Send + Sync + 'static,
    {
        Self {
            create: Box::new(create),
            destroy: None,
            take_check: None,
            restore_check: None,
        }
    }

    /// Run `destroy` when an object leaves the pool
    pub fn with_destroy<F>(mut self, destroy: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.destroy = Some(Box::new(destroy));
        self
    }

    /// Validate objects before they are handed out
    pub fn with_take_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.take_check = Some(Box::new(check));
        self
    }

    /// Validate objects when they come back
    pub fn with_restore_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.restore_check = Some(Box::new(check));
        self
    }
}

impl<T> ObjectFactory<T> for FnFactory<T> {
    fn create(&self) -> Result<T, CreateError> {
        (self.create)()
    }

    fn destroy(&self, obj: T) {
        match self.destroy {
            Some(ref destroy) => destroy(obj),
            None => drop(obj),
        }
    }

    fn ready_to_take(&self, obj: &T) -> bool {
        self.take_check.as_ref().is_none_or(|check| check(obj))
    }

    fn ready_to_restore(&self, obj: &T) -> bool {
        self.restore_check.as_ref().is_none_or(|check| check(obj))
    }
}
