use crate::error::AuthError;
use crate::profile::ProviderProfile;
use crate::types::ExternalId;

/// The authenticated identity of a user.
///
/// Holding a `Principal` proves it has a non-empty identifier and at least one
/// verified email address. Fields are read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    id: ExternalId,
    display_name: String,
    emails: Vec<String>,
    provider: String,
}

impl Principal {
    /// Builds a principal, enforcing its invariants.
    ///
    /// Addresses are trimmed and de-duplicated in order; blank ones are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::IncompleteProfile`] if the identifier or provider is
    /// blank, or no address remains.
    pub fn new(
        provider: impl Into<String>,
        id: ExternalId,
        display_name: impl Into<String>,
        emails: impl IntoIterator<Item = String>,
    ) -> Result<Self, AuthError> {
        let provider = provider.into().trim().to_owned();
        if provider.is_empty() {
            return Err(AuthError::IncompleteProfile("missing provider name"));
        }
        if id.as_str().trim().is_empty() {
            return Err(AuthError::IncompleteProfile("missing stable identifier"));
        }

        let mut addresses: Vec<String> = Vec::new();
        for email in emails {
            let email = email.trim();
            if !email.is_empty() && !addresses.iter().any(|a| a == email) {
                addresses.push(email.to_owned());
            }
        }
        if addresses.is_empty() {
            return Err(AuthError::IncompleteProfile("no verified email address"));
        }

        Ok(Self {
            id,
            display_name: display_name.into(),
            emails: addresses,
            provider,
        })
    }

    #[must_use]
    pub fn id(&self) -> &ExternalId {
        &self.id
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Verified addresses, never empty.
    #[must_use]
    pub fn emails(&self) -> &[String] {
        &self.emails
    }

    #[must_use]
    pub fn primary_email(&self) -> &str {
        // Non-empty by construction.
        &self.emails[0]
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }
}

/// Maps a provider profile to a principal. Pure; no I/O.
///
/// Only addresses the provider marked verified are kept. A missing or blank
/// display name falls back to the primary address.
///
/// # Errors
///
/// Returns [`AuthError::IncompleteProfile`] when the profile has no stable
/// identifier or no verified address.
pub fn resolve(profile: &ProviderProfile) -> Result<Principal, AuthError> {
    let verified = profile
        .emails
        .iter()
        .filter(|e| e.verified)
        .map(|e| e.value.clone());

    let mut principal = Principal::new(
        profile.provider.clone(),
        ExternalId(profile.id.trim().to_owned()),
        String::new(),
        verified,
    )?;

    principal.display_name = match profile.display_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => principal.primary_email().to_owned(),
    };
    Ok(principal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ada() -> ProviderProfile {
        ProviderProfile::new("google", "g123")
            .with_display_name("Ada")
            .with_email("ada@x.com", true)
    }

    #[test]
    fn resolves_complete_profile() {
        let p = resolve(&ada()).unwrap();
        assert_eq!(p.id().as_str(), "g123");
        assert_eq!(p.display_name(), "Ada");
        assert_eq!(p.emails(), &["ada@x.com".to_string()]);
        assert_eq!(p.provider(), "google");
    }

    #[test]
    fn missing_identifier_is_incomplete() {
        let profile = ProviderProfile::new("google", "  ").with_email("ada@x.com", true);
        assert!(matches!(
            resolve(&profile),
            Err(AuthError::IncompleteProfile(_))
        ));
    }

    #[test]
    fn unverified_addresses_do_not_count() {
        let profile = ProviderProfile::new("google", "g123").with_email("ada@x.com", false);
        assert!(matches!(
            resolve(&profile),
            Err(AuthError::IncompleteProfile("no verified email address"))
        ));
    }

    #[test]
    fn keeps_only_verified_and_dedups() {
        let profile = ProviderProfile::new("google", "g123")
            .with_email("old@x.com", false)
            .with_email("ada@x.com", true)
            .with_email(" ada@x.com ", true)
            .with_email("ada@work.com", true);
        let p = resolve(&profile).unwrap();
        assert_eq!(p.emails(), &["ada@x.com".to_string(), "ada@work.com".to_string()]);
        assert_eq!(p.primary_email(), "ada@x.com");
    }

    #[test]
    fn blank_name_falls_back_to_primary_email() {
        let profile = ProviderProfile::new("google", "g123")
            .with_display_name("   ")
            .with_email("ada@x.com", true);
        assert_eq!(resolve(&profile).unwrap().display_name(), "ada@x.com");

        let profile = ProviderProfile::new("google", "g123").with_email("ada@x.com", true);
        assert_eq!(resolve(&profile).unwrap().display_name(), "ada@x.com");
    }

    #[test]
    fn resolve_is_deterministic() {
        assert_eq!(resolve(&ada()).unwrap(), resolve(&ada()).unwrap());
    }
}
