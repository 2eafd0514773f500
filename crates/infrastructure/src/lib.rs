//! CostsMap Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer, plus configuration loading.

pub mod adapters;
pub mod persistence;
pub mod serialization;
pub mod settings;

pub use adapters::{
    DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, ManualClock, ReqwestApiClient, ReqwestApiClientBuilder,
    SystemClock,
};
pub use persistence::{FileSessionStorage, MemorySessionStorage};
pub use serialization::SerializationError;
pub use settings::{CONFIG_FILE_NAME, ClientConfig, ConfigError, ENV_PREFIX};
