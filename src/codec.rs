//! Minimal durable form of a [`Principal`] kept in a session payload.
//!
//! Only the fields needed to rebuild the principal are stored; the raw
//! provider profile never enters the session.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::AuthError;
use crate::principal::Principal;
use crate::types::ExternalId;

/// Payload key under which the stored principal lives.
pub const PRINCIPAL_KEY: &str = "principal";

const FORM_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoredPrincipal {
    pub v: u8,
    pub sub: String,
    pub name: String,
    pub emails: Vec<String>,
    pub provider: String,
}

#[must_use]
pub fn encode(principal: &Principal) -> StoredPrincipal {
    StoredPrincipal {
        v: FORM_VERSION,
        sub: principal.id().as_str().to_owned(),
        name: principal.display_name().to_owned(),
        emails: principal.emails().to_vec(),
        provider: principal.provider().to_owned(),
    }
}

/// # Errors
///
/// Returns [`AuthError::CorruptSession`] for an unknown version or when the
/// stored fields no longer satisfy the [`Principal`] invariants.
pub fn decode(form: &StoredPrincipal) -> Result<Principal, AuthError> {
    if form.v != FORM_VERSION {
        return Err(AuthError::CorruptSession(format!(
            "unsupported principal form version {}",
            form.v
        )));
    }
    let principal = Principal::new(
        form.provider.clone(),
        ExternalId(form.sub.clone()),
        form.name.clone(),
        form.emails.iter().cloned(),
    )
    .map_err(|e| AuthError::CorruptSession(e.to_string()))?;

    // Anything normalisation would change was not written by `encode`.
    if principal.id().as_str() != form.sub
        || principal.emails() != form.emails.as_slice()
        || principal.provider() != form.provider
    {
        return Err(AuthError::CorruptSession("non-canonical principal form".into()));
    }
    Ok(principal)
}

/// Serializes the stored form of `principal` for a session payload.
#[must_use]
pub fn encode_value(principal: &Principal) -> JsonValue {
    // Plain strings and integers cannot fail to serialize.
    serde_json::to_value(encode(principal)).unwrap_or(JsonValue::Null)
}

/// Reads a principal back from a session payload value.
///
/// # Errors
///
/// Returns [`AuthError::CorruptSession`] if the value does not have the
/// stored-principal shape.
pub fn decode_value(value: &JsonValue) -> Result<Principal, AuthError> {
    let form = StoredPrincipal::deserialize(value)
        .map_err(|e| AuthError::CorruptSession(e.to_string()))?;
    decode(&form)
}
