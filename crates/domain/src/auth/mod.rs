//! Authentication domain types

mod claims;
mod types;
mod user;

pub use claims::jwt_expiry;
pub use types::{AuthState, Credentials, RegistrationData, StoredSession, TokenPair, token_preview};
pub use user::{Currency, CurrentUser, Language};
