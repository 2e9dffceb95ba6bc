use serde::{Deserialize, Serialize};

/// Identity profile as returned by a provider after a successful handshake.
///
/// Untrusted: nothing here is validated until it passes through
/// [`resolve`](crate::principal::resolve).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ProviderProfile {
    pub provider: String,
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub emails: Vec<ProfileEmail>,
}

impl ProviderProfile {
    #[must_use]
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
            display_name: None,
            emails: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Add an address together with the provider's verification verdict.
    #[must_use]
    pub fn with_email(mut self, value: impl Into<String>, verified: bool) -> Self {
        self.emails.push(ProfileEmail {
            value: value.into(),
            verified,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEmail {
    pub value: String,
    pub verified: bool,
}

/// Google's OpenID Connect userinfo document.
///
/// Every field is optional on the wire; completeness is checked by the resolver.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleUserInfo {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
}

impl From<GoogleUserInfo> for ProviderProfile {
    fn from(info: GoogleUserInfo) -> Self {
        let verified = info.email_verified == Some(true);
        Self {
            provider: "google".into(),
            id: info.sub.unwrap_or_default(),
            display_name: info.name,
            emails: info
                .email
                .into_iter()
                .map(|value| ProfileEmail { value, verified })
                .collect(),
        }
    }
}
