use crate::options::BeginOptions;
use futures::future::BoxFuture;

/// Something that can open transactions, such as a connection pool.
///
/// Implementations must be safe to share between concurrent callers; each call to
/// [`begin_tx`](TxBeginner::begin_tx) returns an independent transaction.
pub trait TxBeginner: Send + Sync {
    /// Transaction handle returned by [`begin_tx`](TxBeginner::begin_tx).
    type Tx: TxHandle<Error = Self::Error>;
    type Error;

    /// Starts a transaction with the requested isolation level and access mode.
    fn begin_tx(&self, options: BeginOptions) -> BoxFuture<'_, Result<Self::Tx, Self::Error>>;
}

/// An open transaction that can be finished exactly once.
///
/// Both methods take `&mut self` so a transaction whose commit failed can still be
/// rolled back.
pub trait TxHandle: Send {
    type Error;

    fn commit(&mut self) -> BoxFuture<'_, Result<(), Self::Error>>;

    fn rollback(&mut self) -> BoxFuture<'_, Result<(), Self::Error>>;
}
