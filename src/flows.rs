//! Credential lifecycle flows: validity checks, locked refreshes, exchanges, and issuance.
//!
//! Each flow is an `impl Backend` block. Flows that mutate a credential follow the same
//! shape: unlocked read, decide, lock, re-read, decide again, call the provider, write.

pub mod auth_code;
pub mod client_credentials;
pub mod common;
pub mod device_code;
pub mod exchange;
pub mod refresh;

pub use auth_code::*;
pub use device_code::*;
pub use exchange::*;
