use crate::options::CheckRetryable;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Holder of the fallback retry classifier.
///
/// A [`TxExecutor`](crate::TxExecutor) reads the classifier from its registry at the
/// start of every call that does not pick one with
/// [`TxOptions::check_retryable`](crate::TxOptions::check_retryable) or
/// [`TxOptions::never_retry`](crate::TxOptions::never_retry). Share one registry
/// through an `Arc` to give several executors the same policy.
///
/// Changing the classifier only affects calls started afterwards.
///
/// # Examples
///
/// ```rust
/// use sqlx_transaction_retry::{is_retryable, Error, RetryRegistry};
///
/// let registry = RetryRegistry::<Error>::new();
/// assert!(registry.default_check_retryable().is_none());
///
/// registry.set_default_check_retryable(is_retryable);
/// assert!(registry.default_check_retryable().is_some());
/// ```
pub struct RetryRegistry<E> {
    default_check: RwLock<Option<CheckRetryable<E>>>,
}

impl<E> RetryRegistry<E> {
    /// Creates a registry with no default classifier.
    pub fn new() -> Self {
        Self {
            default_check: RwLock::new(None),
        }
    }

    pub fn with_default<F>(check: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            default_check: RwLock::new(Some(Arc::new(check))),
        }
    }

    pub fn default_check_retryable(&self) -> Option<CheckRetryable<E>> {
        self.default_check.read().clone()
    }

    pub fn set_default_check_retryable<F>(&self, check: F)
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        *self.default_check.write() = Some(Arc::new(check));
    }

    pub fn clear_default_check_retryable(&self) {
        *self.default_check.write() = None;
    }
}

impl<E> Default for RetryRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for RetryRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryRegistry")
            .field("has_default", &self.default_check.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_until_set() {
        let registry = RetryRegistry::<i32>::new();
        assert!(registry.default_check_retryable().is_none());

        registry.set_default_check_retryable(|code: &i32| *code == 1213);
        let check = registry.default_check_retryable().unwrap();
        assert!(check(&1213));
        assert!(!check(&1064));
    }

    #[test]
    fn test_snapshot_survives_later_changes() {
        let registry = RetryRegistry::with_default(|_: &i32| true);
        let snapshot = registry.default_check_retryable().unwrap();

        registry.set_default_check_retryable(|_: &i32| false);
        assert!(snapshot(&0));
        assert!(!registry.default_check_retryable().unwrap()(&0));

        registry.clear_default_check_retryable();
        assert!(registry.default_check_retryable().is_none());
    }
}
