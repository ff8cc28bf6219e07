//! Authentication chain for trying multiple strategies.

use std::path::PathBuf;

use tracing::debug;

use super::traits::{AuthFailure, AuthHandle, AuthStrategy};
use super::{KeyAuth, PasswordAuth};

/// Authentication chain that tries multiple strategies in order.
///
/// Strategies are tried in the order they were added. The first successful
/// authentication stops the chain. If none succeeds, every failure is
/// returned, in attempt order.
///
/// # Example
///
/// ```ignore
/// let chain = AuthChain::new()
///     .with_password("secret")
///     .with_key("/path/to/key");
///
/// match chain.authenticate(&mut handle, "root").await {
///     Ok(strategy) => println!("authenticated with {strategy}"),
///     Err(failures) => eprintln!("{} strategies failed", failures.len()),
/// }
/// ```
pub struct AuthChain {
    strategies: Vec<Box<dyn AuthStrategy>>,
}

impl AuthChain {
    /// Create a new empty authentication chain.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Add password authentication to the chain.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.strategies.push(Box::new(PasswordAuth::new(password)));
        self
    }

    /// Add key-based authentication to the chain.
    pub fn with_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.strategies.push(Box::new(KeyAuth::new(key_path)));
        self
    }

    /// Check if the chain has any authentication strategies.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Names of the configured strategies, in attempt order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the chain, returning the name of the strategy that succeeded.
    pub async fn authenticate(
        &self,
        handle: &mut dyn AuthHandle,
        username: &str,
    ) -> Result<&'static str, Vec<AuthFailure>> {
        if self.strategies.is_empty() {
            return Err(vec![AuthFailure::new(
                "chain",
                "No authentication strategies configured",
            )]);
        }

        let mut failures = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            debug!("Trying authentication strategy: {}", strategy.name());

            match strategy.authenticate(handle, username).await {
                Ok(true) => {
                    debug!(
                        "Authentication succeeded with strategy: {}",
                        strategy.name()
                    );
                    return Ok(strategy.name());
                }
                Ok(false) => {
                    debug!("Authentication failed with strategy: {}", strategy.name());
                    failures.push(AuthFailure::new(
                        strategy.name(),
                        format!("{} authentication rejected", strategy.name()),
                    ));
                }
                Err(e) => {
                    debug!(
                        "Authentication error with strategy {}: {}",
                        strategy.name(),
                        e
                    );
                    failures.push(AuthFailure::new(strategy.name(), e));
                }
            }
        }

        Err(failures)
    }
}

impl Default for AuthChain {
    fn default() -> Self {
        Self::new()
    }
}
