use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use time::{Duration, OffsetDateTime};

use super::{Payload, Session, SessionStore};
use crate::error::AuthError;
use crate::types::SessionToken;

struct Entry {
    session: Session,
    retired: bool,
}

/// In-process [`SessionStore`].
///
/// The token map sits behind a read-write lock that is only held for lookups
/// and inserts; each session has its own mutex, so mutations of unrelated
/// sessions never wait on each other. A thread holding a session mutex never
/// takes the map lock.
///
/// Invalidated tokens are remembered until they are older than the idle
/// timeout, and `create` refuses to hand them out again. Stale tombstones are
/// dropped on every invalidation, so the store stays bounded without
/// [`purge_expired`](Self::purge_expired); that sweep is only needed to
/// reclaim sessions that went idle and were never touched again.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionToken, Arc<Mutex<Entry>>>>,
    retired: Mutex<HashMap<SessionToken, OffsetDateTime>>,
    idle_timeout: Duration,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    /// Empty store with a 30 day idle timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            retired: Mutex::new(HashMap::new()),
            idle_timeout: Duration::days(30),
        }
    }

    /// Sessions untouched for longer than `timeout` stop resolving.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Number of sessions currently held (expired ones included until swept).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every idle-expired session and stale tombstone. Returns the
    /// number of sessions removed.
    pub fn purge_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let candidates: Vec<(SessionToken, Arc<Mutex<Entry>>)> = self
            .sessions
            .read()
            .iter()
            .map(|(token, entry)| (token.clone(), Arc::clone(entry)))
            .collect();

        let mut removed = 0;
        for (token, entry) in candidates {
            let expired = {
                let mut guard = entry.lock();
                let expired = !guard.retired && self.is_expired(&guard.session, now);
                if expired {
                    guard.retired = true;
                }
                expired
            };
            if expired {
                self.forget(&token, now);
                removed += 1;
            }
        }

        let horizon = now - self.idle_timeout;
        self.retired.lock().retain(|_, retired_at| *retired_at > horizon);

        if removed > 0 {
            tracing::debug!(removed, "purged expired sessions");
        }
        removed
    }

    fn entry(&self, token: &SessionToken) -> Option<Arc<Mutex<Entry>>> {
        self.sessions.read().get(token).cloned()
    }

    fn is_expired(&self, session: &Session, now: OffsetDateTime) -> bool {
        now - session.last_accessed > self.idle_timeout
    }

    /// Tombstone first, then unlink, so `create` can never reissue the token
    /// in between. Tombstones older than the idle timeout are dropped here.
    fn forget(&self, token: &SessionToken, now: OffsetDateTime) {
        let horizon = now - self.idle_timeout;
        {
            let mut retired = self.retired.lock();
            retired.retain(|_, retired_at| *retired_at > horizon);
            retired.insert(token.clone(), now);
        }
        self.sessions.write().remove(token);
    }

    /// Locks the entry for `token` and runs `f` if the session is live.
    /// An idle-expired session is retired on the way.
    fn with_live<R>(
        &self,
        token: &SessionToken,
        f: impl FnOnce(&mut Session, OffsetDateTime) -> R,
    ) -> Option<R> {
        let entry = self.entry(token)?;
        let now = OffsetDateTime::now_utc();
        let mut guard = entry.lock();
        if guard.retired {
            return None;
        }
        if self.is_expired(&guard.session, now) {
            guard.retired = true;
            drop(guard);
            self.forget(token, now);
            tracing::debug!(session = %token.fingerprint(), "session expired");
            return None;
        }
        Some(f(&mut guard.session, now))
    }
}

impl SessionStore for MemorySessionStore {
    async fn create(&self) -> Result<Session, AuthError> {
        let mut sessions = self.sessions.write();
        let token = loop {
            let candidate = SessionToken::generate();
            if !sessions.contains_key(&candidate)
                && !self.retired.lock().contains_key(&candidate)
            {
                break candidate;
            }
        };
        let session = Session::new(token.clone());
        sessions.insert(
            token.clone(),
            Arc::new(Mutex::new(Entry {
                session: session.clone(),
                retired: false,
            })),
        );
        drop(sessions);

        tracing::debug!(session = %token.fingerprint(), "session created");
        Ok(session)
    }

    async fn load(&self, token: &SessionToken) -> Result<Option<Session>, AuthError> {
        Ok(self.with_live(token, |session, now| {
            session.last_accessed = now;
            session.clone()
        }))
    }

    async fn mutate<F, R>(&self, token: &SessionToken, f: F) -> Result<R, AuthError>
    where
        F: FnOnce(&mut Payload) -> R + Send,
        R: Send,
    {
        self.with_live(token, |session, now| {
            // Work on a copy so a panicking closure leaves the payload untouched.
            let mut draft = session.payload.clone();
            let out = f(&mut draft);
            session.payload = draft;
            session.last_accessed = now;
            out
        })
        .ok_or(AuthError::UnknownToken)
    }

    async fn invalidate(&self, token: &SessionToken) -> Result<(), AuthError> {
        let Some(entry) = self.entry(token) else {
            return Ok(());
        };
        let now = OffsetDateTime::now_utc();
        let was_live = {
            let mut guard = entry.lock();
            !std::mem::replace(&mut guard.retired, true)
        };
        self.forget(token, now);

        if was_live {
            tracing::debug!(session = %token.fingerprint(), "session invalidated");
        }
        Ok(())
    }
}
