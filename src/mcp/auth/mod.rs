//! Authentication strategies for SSH connections.
//!
//! Strategies are tried in order by an [`AuthChain`]; the first one the
//! server accepts wins. When every strategy fails, the chain hands back one
//! [`AuthFailure`] per attempt so the caller can report all of them.
//!
//! # Available Strategies
//!
//! - [`PasswordAuth`]: Password-based authentication
//! - [`KeyAuth`]: Private key file authentication
//!
//! # Example
//!
//! ```ignore
//! use linux_mcp_toolkit::mcp::auth::AuthChain;
//!
//! let chain = AuthChain::new()
//!     .with_password("secret")
//!     .with_key("/root/.ssh/id_rsa");
//!
//! let strategy = chain.authenticate(&mut handle, "root").await?;
//! ```

mod chain;
mod key;
mod password;
mod traits;

pub use chain::AuthChain;
pub use key::KeyAuth;
pub use password::PasswordAuth;
pub use traits::{AuthFailure, AuthHandle, AuthStrategy};

#[cfg(test)]
pub(crate) use chain::tests::ScriptedHandle;
