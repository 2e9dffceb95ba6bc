//! Server-side sessions keyed by an opaque [`SessionToken`].
//!
//! Per-token lifecycle: `UNBORN -> ACTIVE -> INVALIDATED`. An invalidated
//! token never resolves again.

mod memory;
mod store;

use serde::de::DeserializeOwned;
use time::OffsetDateTime;

pub use memory::MemorySessionStore;
pub use store::SessionStore;

use crate::types::SessionToken;

/// Arbitrary key-value session data.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Snapshot of one session.
///
/// Returned by value from the store, so it never reflects a later write.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub created_at: OffsetDateTime,
    pub last_accessed: OffsetDateTime,
    pub payload: Payload,
}

impl Session {
    pub(crate) fn new(token: SessionToken) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            token,
            created_at: now,
            last_accessed: now,
            payload: Payload::new(),
        }
    }

    /// Typed read of a payload entry. `None` if absent or of another shape.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.payload
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
