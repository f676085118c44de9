//! Credential models: redacted secrets, the stored access/refresh pair, and refresh grants.

pub mod credential;
pub mod secret;

pub use credential::*;
pub use secret::*;
