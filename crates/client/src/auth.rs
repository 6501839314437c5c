//! Bearer credentials
//!
//! Session management lives outside the client. All the client needs is a source that hands out
//! the current bearer token, if any, to attach to outgoing requests.

use std::{fmt, sync::RwLock};

use zeroize::Zeroize;

/// An opaque bearer token, wiped from memory on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a raw token; blank tokens are treated as absent.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into().trim().to_string();

        (!token.is_empty()).then_some(Self(token))
    }

    /// The raw token, for the `Authorization` header only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(**redacted**)")
    }
}

impl Drop for BearerToken {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Supplies the bearer token for outgoing requests.
pub trait CredentialSource: Send + Sync + fmt::Debug {
    /// The current token; `None` for a guest session.
    fn bearer_token(&self) -> Option<BearerToken>;
}

/// Credentials set by the host application's session layer.
#[derive(Debug, Default)]
pub struct SessionCredentials {
    token: RwLock<Option<BearerToken>>,
}

impl SessionCredentials {
    /// Start with an optional token.
    pub fn new(token: Option<BearerToken>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }

    /// Replace the token after a sign-in or sign-out.
    pub fn set(&self, token: Option<BearerToken>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }
}

impl CredentialSource for SessionCredentials {
    fn bearer_token(&self) -> Option<BearerToken> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_tokens_are_absent() {
        assert!(BearerToken::new("   ").is_none());
        assert_eq!(
            BearerToken::new(" abc ").as_ref().map(BearerToken::expose),
            Some("abc")
        );
    }

    #[test]
    fn debug_output_is_redacted() {
        let token = BearerToken::new("secret-token");

        assert!(!format!("{token:?}").contains("secret-token"));
    }

    #[test]
    fn session_credentials_can_be_replaced() {
        let credentials = SessionCredentials::new(None);

        assert!(credentials.bearer_token().is_none());

        credentials.set(BearerToken::new("t1"));

        assert_eq!(
            credentials.bearer_token().as_ref().map(BearerToken::expose),
            Some("t1")
        );
    }
}
