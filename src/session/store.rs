use std::future::Future;

use super::{Payload, Session};
use crate::error::AuthError;
use crate::types::SessionToken;

/// Session persistence with a per-token concurrency contract.
///
/// - `mutate` calls on the same token are serialized; different tokens proceed
///   in parallel.
/// - `load` never observes a partially applied `mutate`.
/// - A token passed to `invalidate` never resolves again.
///
/// # Example
///
/// ```rust,ignore
/// let session = store.create().await?;
/// store
///     .mutate(&session.token, |payload| {
///         payload.insert("theme".into(), "dark".into());
///     })
///     .await?;
/// assert!(store.load(&session.token).await?.is_some());
/// store.invalidate(&session.token).await?;
/// assert!(store.load(&session.token).await?.is_none());
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Issue a fresh token with an empty payload. The token never collides
    /// with a live or invalidated one.
    fn create(&self) -> impl Future<Output = Result<Session, AuthError>> + Send;

    /// Look up a session. Unknown, expired and invalidated tokens give
    /// `Ok(None)`; `Err` is reserved for backend failures.
    fn load(
        &self,
        token: &SessionToken,
    ) -> impl Future<Output = Result<Option<Session>, AuthError>> + Send;

    /// Apply `f` to the payload atomically: either the whole update lands or
    /// none of it does.
    ///
    /// Never creates a session. Returns [`AuthError::UnknownToken`] when the
    /// token does not resolve.
    fn mutate<F, R>(
        &self,
        token: &SessionToken,
        f: F,
    ) -> impl Future<Output = Result<R, AuthError>> + Send
    where
        F: FnOnce(&mut Payload) -> R + Send,
        R: Send;

    /// Remove a session. Idempotent.
    fn invalidate(&self, token: &SessionToken) -> impl Future<Output = Result<(), AuthError>> + Send;
}
