//! Password-based SSH authentication.

use async_trait::async_trait;

use super::traits::{AuthHandle, AuthStrategy};

/// Password authentication strategy.
pub struct PasswordAuth {
    password: String,
}

impl PasswordAuth {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

#[async_trait]
impl AuthStrategy for PasswordAuth {
    async fn authenticate(
        &self,
        handle: &mut dyn AuthHandle,
        username: &str,
    ) -> Result<bool, String> {
        handle.try_password(username, &self.password).await
    }

    fn name(&self) -> &'static str {
        "password"
    }
}
