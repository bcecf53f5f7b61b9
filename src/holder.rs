//! Loan handle for objects taken from a validating pool

use crate::loan::Loan;
use crate::validating::ValidatingInner;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tracing::warn;

/// A pooled object on loan.
///
/// The holder gives read access to the object and goes back to its pool
/// either through [`ValidatingPool::restore`](crate::ValidatingPool::restore)
/// or when dropped. It cannot be cloned, so an object is never restored twice.
pub struct Holder<T: Send + 'static> {
    loan: Option<Loan<T>>,
    loan_id: u64,
    owner: Arc<ValidatingInner<T>>,
}

impl<T: Send + 'static> Holder<T> {
    pub(crate) fn new(loan: Loan<T>, owner: Arc<ValidatingInner<T>>) -> Self {
        Self {
            loan_id: loan.id(),
            loan: Some(loan),
            owner,
        }
    }

    /// Identifier of this loan, as listed by `taken_holders`
    pub fn loan_id(&self) -> u64 {
        self.loan_id
    }

    pub(crate) fn is_from(&self, owner: &Arc<ValidatingInner<T>>) -> bool {
        Arc::ptr_eq(&self.owner, owner)
    }

    pub(crate) fn take_loan(&mut self) -> Option<Loan<T>> {
        self.loan.take()
    }
}

impl<T: Send + 'static> Deref for Holder<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // Only emptied by restore, which consumes the holder
        self.loan.as_deref().expect("holder already restored")
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for Holder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Holder")
            .field("loan_id", &self.loan_id)
            .field("value", &self.loan.as_deref())
            .finish()
    }
}

impl<T: Send + 'static> Drop for Holder<T> {
    fn drop(&mut self) {
        if let Some(loan) = self.loan.take()
            && let Err(e) = self.owner.give_back(loan)
        {
            warn!(loan_id = self.loan_id, error = %e, "dropped holder could not be restored");
        }
    }
}
