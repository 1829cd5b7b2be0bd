//! Token-based authentication: session tokens, refresh credentials and
//! fingerprint binding.
//!
//! ## Session model
//!
//! A login mints three artifacts: a short-lived signed session token bound
//! to a browser fingerprint, the raw fingerprint in an `HttpOnly` cookie,
//! and an opaque refresh credential stored server-side. Refreshing rotates
//! the credential atomically; each user holds at most one active credential
//! at a time.
//!
//! ## Fail-closed authentication
//!
//! The request authenticator never errors: any rejected token leaves the
//! request anonymous and downstream handlers decide what that means.

pub mod fingerprint;
pub mod middleware;
mod password;
pub mod session;
mod state;
pub mod storage;
pub mod token;
pub(crate) mod types;

pub use middleware::CurrentUser;
pub use password::{Argon2Verifier, PasswordVerifier};
pub use state::{AuthConfig, AuthState, Environment};
pub use storage::{Principal, RefreshCredential};
pub use token::{TokenIssuer, TokenUse, Verification};
