//! Error types for the game object model

use thiserror::Error;

/// Result type for game object operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the game object model
#[derive(Error, Debug)]
pub enum Error {
    /// A string field's stored offset points outside the payload
    #[error("string offset {offset} out of bounds in field '{field}' (payload {payload} bytes)")]
    StringOffsetOutOfBounds {
        field: String,
        offset: u32,
        payload: usize,
    },

    /// A string field's bytes are not NUL-terminated inside the payload
    #[error("unterminated string in field '{field}' at offset {offset}")]
    UnterminatedString { field: String, offset: u32 },

    /// Relocation was requested twice on the same buffer
    #[error("message buffer already relocated")]
    AlreadyRelocated,

    /// The buffer carries no descriptor, so there is nothing to relocate
    #[error("message buffer has no type descriptor")]
    NoDescriptor,
}
