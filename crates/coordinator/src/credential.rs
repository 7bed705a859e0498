//! Credential accessors.
//!
//! The coordinator only needs "the current bearer token, if any". Where
//! the token comes from (a login flow, a config file) is up to the caller.

/// Supplies the caller's current credential.
///
/// Queried once per request, so a refreshed token is picked up without
/// rebuilding the client.
pub trait CredentialSource: Send + Sync {
    fn current(&self) -> Option<String>;
}

/// Anonymous access.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredential;

impl CredentialSource for NoCredential {
    fn current(&self) -> Option<String> {
        None
    }
}

/// A fixed token.
#[derive(Clone)]
pub struct StaticCredential(String);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticCredential(<redacted>)")
    }
}

impl CredentialSource for StaticCredential {
    fn current(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.clone())
        }
    }
}

/// Reads the token from an environment variable on every request.
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialSource for EnvCredential {
    fn current(&self) -> Option<String> {
        std::env::var(&self.var).ok().filter(|t| !t.is_empty())
    }
}
