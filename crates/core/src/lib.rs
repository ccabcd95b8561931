//! BidTun core session types and credential store

pub mod error;
pub mod session;
pub mod store;

pub use error::{CoreError, CoreResult};
pub use session::{
    AuthenticatedUser, GuestUser, SessionCredential, TokenPair, decode_expiry, decode_subject,
};
pub use store::{CredentialStore, SessionStore};
