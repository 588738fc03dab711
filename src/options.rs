use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Retry budget used when the caller does not set one.
pub const DEFAULT_MAX_RETRY_TIMES: u32 = 3;

/// Predicate deciding whether an error warrants running the unit of work again.
pub type CheckRetryable<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Consistency guarantee requested when a transaction begins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    /// Whatever the server is configured to use.
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    WriteCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
    Linearizable,
}

impl IsolationLevel {
    /// SQL spelling of the level, `None` for [`IsolationLevel::Default`].
    pub fn as_sql(&self) -> Option<&'static str> {
        match self {
            IsolationLevel::Default => None,
            IsolationLevel::ReadUncommitted => Some("READ UNCOMMITTED"),
            IsolationLevel::ReadCommitted => Some("READ COMMITTED"),
            IsolationLevel::WriteCommitted => Some("WRITE COMMITTED"),
            IsolationLevel::RepeatableRead => Some("REPEATABLE READ"),
            IsolationLevel::Snapshot => Some("SNAPSHOT"),
            IsolationLevel::Serializable => Some("SERIALIZABLE"),
            IsolationLevel::Linearizable => Some("LINEARIZABLE"),
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql().unwrap_or("DEFAULT"))
    }
}

/// Settings handed to [`TxBeginner::begin_tx`](crate::TxBeginner::begin_tx).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BeginOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

enum RetryCheck<E> {
    Inherit,
    Explicit(Option<CheckRetryable<E>>),
}

impl<E> Clone for RetryCheck<E> {
    fn clone(&self) -> Self {
        match self {
            RetryCheck::Inherit => RetryCheck::Inherit,
            RetryCheck::Explicit(check) => RetryCheck::Explicit(check.clone()),
        }
    }
}

/// Per-call transaction and retry settings.
///
/// Every setter replaces the previous value of its field, so when the same setter is
/// called twice the last call wins.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use sqlx_transaction_retry::{Error, IsolationLevel, TxOptions};
///
/// let options = TxOptions::<Error>::new()
///     .isolation(IsolationLevel::Serializable)
///     .max_retry_times(5)
///     .retry_delay(Duration::from_millis(50))
///     .check_retryable(Error::is_retryable);
///
/// assert_eq!(options.get_max_retry_times(), 5);
/// ```
pub struct TxOptions<E> {
    isolation: IsolationLevel,
    read_only: bool,
    max_retry_times: u32,
    retry_delay: Duration,
    check: RetryCheck<E>,
}

impl<E> TxOptions<E> {
    /// Driver default isolation, read-write, 3 retries, no delay and the classifier
    /// inherited from the executor's registry.
    pub fn new() -> Self {
        Self {
            isolation: IsolationLevel::Default,
            read_only: false,
            max_retry_times: DEFAULT_MAX_RETRY_TIMES,
            retry_delay: Duration::ZERO,
            check: RetryCheck::Inherit,
        }
    }

    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = level;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn max_retry_times(mut self, times: u32) -> Self {
        self.max_retry_times = times;
        self
    }

    /// Pause between a failed attempt and the next one. Zero disables the pause.
    ///
    /// A non-zero delay is awaited with `tokio::time::sleep` and needs a Tokio runtime.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Overrides the default classifier for this call only.
    pub fn check_retryable<F>(mut self, check: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.check = RetryCheck::Explicit(Some(Arc::new(check)));
        self
    }

    /// Disables retries for this call, ignoring any default classifier.
    pub fn never_retry(mut self) -> Self {
        self.check = RetryCheck::Explicit(None);
        self
    }

    pub fn get_isolation(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn get_max_retry_times(&self) -> u32 {
        self.max_retry_times
    }

    pub fn get_retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Whether this call falls back to the registry's default classifier.
    pub fn inherits_check_retryable(&self) -> bool {
        matches!(self.check, RetryCheck::Inherit)
    }

    /// Fixes the settings for one execution, filling in `default_check` when no
    /// classifier was chosen explicitly.
    pub(crate) fn resolve(self, default_check: Option<CheckRetryable<E>>) -> RetryConfig<E> {
        let check_retryable = match self.check {
            RetryCheck::Inherit => default_check,
            RetryCheck::Explicit(check) => check,
        };

        RetryConfig {
            begin: BeginOptions {
                isolation: self.isolation,
                read_only: self.read_only,
            },
            max_retry_times: self.max_retry_times,
            retry_delay: self.retry_delay,
            check_retryable,
        }
    }
}

impl<E> Default for TxOptions<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for TxOptions<E> {
    fn clone(&self) -> Self {
        Self {
            isolation: self.isolation,
            read_only: self.read_only,
            max_retry_times: self.max_retry_times,
            retry_delay: self.retry_delay,
            check: self.check.clone(),
        }
    }
}

impl<E> fmt::Debug for TxOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let check = match &self.check {
            RetryCheck::Inherit => "inherit",
            RetryCheck::Explicit(Some(_)) => "explicit",
            RetryCheck::Explicit(None) => "never",
        };
        f.debug_struct("TxOptions")
            .field("isolation", &self.isolation)
            .field("read_only", &self.read_only)
            .field("max_retry_times", &self.max_retry_times)
            .field("retry_delay", &self.retry_delay)
            .field("check_retryable", &check)
            .finish()
    }
}

/// Settings of one execution call, fixed once the call starts.
pub(crate) struct RetryConfig<E> {
    pub(crate) begin: BeginOptions,
    pub(crate) max_retry_times: u32,
    pub(crate) retry_delay: Duration,
    pub(crate) check_retryable: Option<CheckRetryable<E>>,
}

impl<E> RetryConfig<E> {
    /// Loop guard: a classifier exists, budget remains and the error is retryable.
    pub(crate) fn should_retry(&self, retries: u32, err: &E) -> bool {
        match &self.check_retryable {
            Some(check) => retries < self.max_retry_times && check(err),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Deadlock,
        Syntax,
    }

    fn deadlock_only(err: &TestError) -> bool {
        *err == TestError::Deadlock
    }

    #[test]
    fn test_defaults() {
        let options = TxOptions::<TestError>::new();
        assert_eq!(options.get_isolation(), IsolationLevel::Default);
        assert!(!options.is_read_only());
        assert_eq!(options.get_max_retry_times(), 3);
        assert_eq!(options.get_retry_delay(), Duration::ZERO);
        assert!(options.inherits_check_retryable());
    }

    #[test]
    fn test_last_setter_wins() {
        let options = TxOptions::<TestError>::new()
            .max_retry_times(7)
            .isolation(IsolationLevel::ReadCommitted)
            .max_retry_times(1)
            .isolation(IsolationLevel::Serializable)
            .retry_delay(Duration::from_secs(1))
            .retry_delay(Duration::from_millis(5));

        assert_eq!(options.get_max_retry_times(), 1);
        assert_eq!(options.get_isolation(), IsolationLevel::Serializable);
        assert_eq!(options.get_retry_delay(), Duration::from_millis(5));
    }

    #[test]
    fn test_resolve_inherits_default_classifier() {
        let default: CheckRetryable<TestError> = Arc::new(deadlock_only);
        let config = TxOptions::new().resolve(Some(default));

        assert!(config.should_retry(0, &TestError::Deadlock));
        assert!(!config.should_retry(0, &TestError::Syntax));
        assert!(!config.should_retry(3, &TestError::Deadlock));
    }

    #[test]
    fn test_resolve_explicit_classifier_overrides_default() {
        let default: CheckRetryable<TestError> = Arc::new(|_: &TestError| false);
        let config = TxOptions::new()
            .check_retryable(|_: &TestError| true)
            .resolve(Some(default));

        assert!(config.should_retry(0, &TestError::Syntax));
    }

    #[test]
    fn test_never_retry_ignores_default() {
        let default: CheckRetryable<TestError> = Arc::new(|_: &TestError| true);
        let config = TxOptions::new().never_retry().resolve(Some(default));

        assert!(config.check_retryable.is_none());
        assert!(!config.should_retry(0, &TestError::Deadlock));
    }

    #[test]
    fn test_no_classifier_never_retries() {
        let config = TxOptions::<TestError>::new().max_retry_times(10).resolve(None);
        assert!(!config.should_retry(0, &TestError::Deadlock));
    }

    #[test]
    fn test_zero_budget_never_retries() {
        let config = TxOptions::new()
            .max_retry_times(0)
            .check_retryable(deadlock_only)
            .resolve(None);
        assert!(!config.should_retry(0, &TestError::Deadlock));
    }

    #[test]
    fn test_isolation_sql() {
        assert_eq!(IsolationLevel::Default.as_sql(), None);
        assert_eq!(IsolationLevel::ReadCommitted.as_sql(), Some("READ COMMITTED"));
        assert_eq!(IsolationLevel::Serializable.to_string(), "SERIALIZABLE");
        assert_eq!(IsolationLevel::Default.to_string(), "DEFAULT");
    }
}
