//! CostsMap Domain - Core business types
//!
//! This crate defines the domain model for the CostsMap client.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod error;
pub mod finance;
pub mod id;
pub mod validation;

pub use auth::{
    AuthState, Credentials, Currency, CurrentUser, Language, RegistrationData, StoredSession,
    TokenPair, jwt_expiry, token_preview,
};
pub use error::{DomainError, DomainResult};
pub use finance::{
    Card, CardOperation, Category, Cost, DatedOperations, DayOperations, Income, MonthOverview,
    NewCard, NewCategory, NewCost, NewIncome, TotalCosts, TotalIncomes,
};
pub use id::EntityId;
