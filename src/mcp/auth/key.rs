//! Private key file SSH authentication.

use std::path::PathBuf;

use async_trait::async_trait;

use super::traits::{AuthHandle, AuthStrategy};

/// Private key file authentication strategy.
///
/// Only passphrase-less keys are supported.
pub struct KeyAuth {
    key_path: PathBuf,
}

impl KeyAuth {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
        }
    }
}

#[async_trait]
impl AuthStrategy for KeyAuth {
    async fn authenticate(
        &self,
        handle: &mut dyn AuthHandle,
        username: &str,
    ) -> Result<bool, String> {
        handle.try_key_file(username, &self.key_path).await
    }

    fn name(&self) -> &'static str {
        "key"
    }
}
