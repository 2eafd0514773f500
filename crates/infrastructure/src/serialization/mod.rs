//! JSON encoding shared by file-backed storage.

mod json;

pub use json::{SerializationError, decode, encode_pretty};
