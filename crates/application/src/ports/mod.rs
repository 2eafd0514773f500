//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the application core and external systems.
//! Each port is a trait that can be implemented by adapters in the infrastructure layer.

mod api;
mod clock;
mod session_storage;

pub use api::{ApiError, AuthApi, FinanceApi};
pub use clock::Clock;
pub use session_storage::{SessionStorage, StorageError};
