//! Loan tokens for objects taken from the engine

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// Shared by every pool, so a loan can never match another pool's ledger
static NEXT_LOAN_ID: AtomicU64 = AtomicU64::new(1);

/// An object on loan from an [`ObjectPool`](crate::ObjectPool).
///
/// The loan derefs to the object and must be handed back with
/// [`ObjectPool::restore`](crate::ObjectPool::restore). It cannot be cloned,
/// and the pool only accepts loans it has on its books, so the same object
/// is never restored twice.
///
/// Dropping a loan without restoring it keeps its capacity slot taken until
/// the pool terminates.
#[derive(Debug, PartialEq, Eq)]
pub struct Loan<T> {
    id: u64,
    value: T,
}

impl<T> Loan<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            id: NEXT_LOAN_ID.fetch_add(1, Ordering::Relaxed),
            value,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_id(id: u64, value: T) -> Self {
        Self { id, value }
    }

    /// Identifier of this loan, unique across all pools in the process
    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for Loan<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> DerefMut for Loan<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.value
    }
}

/// An outstanding loan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanInfo {
    pub loan_id: u64,
    pub held_for: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = Loan::new("a");
        let b = Loan::new("b");
        assert_ne!(a.id(), b.id());
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_deref_mut_reaches_object() {
        let mut loan = Loan::new(vec![1, 2]);
        loan.push(3);
        assert_eq!(loan.len(), 3);
        assert_eq!(loan.into_inner(), vec![1, 2, 3]);
    }
}
