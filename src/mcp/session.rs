//! russh client handler and its authentication surface.
//!
//! # Architecture
//!
//! - `SshClientHandler`: A russh client handler that accepts all host keys (similar to
//!   `StrictHostKeyChecking=no` in OpenSSH).
//! - `client::Handle<SshClientHandler>` implements [`AuthHandle`], which is what the
//!   authentication chain drives during connect.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use tracing::debug;

use crate::mcp::auth::AuthHandle;

/// Client handler for russh that accepts all host keys.
///
/// # Security Note
///
/// Host keys are not verified against known_hosts, so connections are open
/// to man-in-the-middle attacks on untrusted networks.
pub struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

#[async_trait]
impl AuthHandle for client::Handle<SshClientHandler> {
    async fn try_password(&mut self, username: &str, password: &str) -> Result<bool, String> {
        let result = self
            .authenticate_password(username, password)
            .await
            .map_err(|e| format!("Password authentication failed: {}", e))?;

        Ok(result.success())
    }

    async fn try_key_file(&mut self, username: &str, key_path: &Path) -> Result<bool, String> {
        // Passphrase-less keys only
        let key_pair = keys::load_secret_key(key_path, None).map_err(|e| {
            format!(
                "Failed to load private key from {}: {}",
                key_path.display(),
                e
            )
        })?;

        // For RSA keys, use the best supported hash algorithm
        let hash_alg = self
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        debug!("Using RSA hash algorithm for key auth: {:?}", hash_alg);

        let key_with_hash = keys::PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg);

        let result = self
            .authenticate_publickey(username, key_with_hash)
            .await
            .map_err(|e| format!("Key authentication failed: {}", e))?;

        Ok(result.success())
    }
}
