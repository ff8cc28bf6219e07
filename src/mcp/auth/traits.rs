//! Authentication strategy trait definitions.
//!
//! [`AuthStrategy`] is written against [`AuthHandle`] rather than a concrete
//! russh handle so that chains can be exercised against a scripted server.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

/// The authentication calls a connected-but-unauthenticated SSH client offers.
///
/// Implemented for `russh::client::Handle<SshClientHandler>` in
/// [`crate::mcp::session`].
#[async_trait]
pub trait AuthHandle: Send {
    /// Offer a password. `Ok(false)` means the server rejected it.
    async fn try_password(&mut self, username: &str, password: &str) -> Result<bool, String>;

    /// Load the private key at `key_path` and offer it.
    async fn try_key_file(&mut self, username: &str, key_path: &Path) -> Result<bool, String>;
}

/// Trait for SSH authentication strategies.
///
/// Implementations must be thread-safe (`Send + Sync`) for use across
/// async tasks.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Attempt to authenticate with the SSH server.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Authentication succeeded
    /// * `Ok(false)` - Authentication failed (credentials rejected)
    /// * `Err(message)` - Error during authentication attempt
    async fn authenticate(&self, handle: &mut dyn AuthHandle, username: &str)
    -> Result<bool, String>;

    /// Name of this strategy, used in logs and failure reports.
    fn name(&self) -> &'static str;
}

/// One rejected or failed authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure {
    pub strategy: &'static str,
    pub reason: String,
}

impl AuthFailure {
    pub fn new(strategy: &'static str, reason: impl Into<String>) -> Self {
        Self {
            strategy,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.reason)
    }
}
