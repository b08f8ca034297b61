//! Error types for the scripting bridge

use gameobject::NameHash;
use thiserror::Error;

/// Result type for scripting operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the scripting bridge
#[derive(Error, Debug)]
pub enum Error {
    /// Lua error
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    /// Game object model error (relocation, bounds)
    #[error(transparent)]
    GameObject(#[from] gameobject::Error),

    /// Script source failed to compile or its body failed to run
    #[error("error running script '{module}': {message}")]
    Compile { module: String, message: String },

    /// A well-known lifecycle global exists but is not callable
    #[error("the global name '{name}' in '{module}' must be a function")]
    NotAFunction { module: String, name: &'static str },

    /// A required field is missing from the source table
    #[error("field '{field}' not specified in table")]
    MissingField { field: String },

    /// The declared field kind is not marshalable
    #[error("unsupported kind in field '{field}'")]
    UnsupportedFieldKind { field: String },

    /// A field value has the wrong type
    #[error("field '{field}': expected {expected}, got {actual}")]
    FieldType {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Appended string data would exceed the payload capacity
    #[error("message data doesn't fit (payload max: {capacity})")]
    BufferFull { needed: usize, capacity: usize },

    /// The descriptor's fixed region alone exceeds the payload capacity
    #[error("sizeof({name}) = {size} > {capacity}")]
    PayloadTooLarge {
        name: String,
        size: u32,
        capacity: usize,
    },

    /// A payload table was supplied for an unregistered message type
    #[error("message type '{name}' has not been registered")]
    UnknownMessageType { name: String },

    /// A typed payload arrived without the relocation pass having run
    #[error("message buffer was not relocated before decoding")]
    NotRelocated,

    /// The target identity does not resolve to a live instance
    #[error("unknown instance: {0}")]
    UnknownInstance(NameHash),

    /// The named collection does not exist in the register
    #[error("collection {0} not found")]
    UnknownCollection(NameHash),

    /// The target object has no sub-component with that name
    #[error("unknown component: {0}")]
    UnknownComponent(NameHash),

    /// A script API call that needs the ambient context ran outside a
    /// dispatch
    #[error("no script context is bound")]
    NoContext,

    /// A dispatch tried to bind the ambient context while another dispatch
    /// was in flight
    #[error("script dispatch is not reentrant")]
    ReentrantDispatch,
}

impl From<Error> for mlua::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Lua(e) => e,
            other => mlua::Error::external(other),
        }
    }
}
