//! Game object model for the script component bridge
//!
//! This crate holds the pieces of the simulation the scripting bridge
//! collaborates with but does not own:
//!
//! - stable name hashing ([`NameHash`]) used for identities, message ids and
//!   action ids
//! - game object instances with local and world transforms, grouped into
//!   named [`Collection`]s under one [`Register`]
//! - the fixed-capacity [`MessageBuffer`] wire format with relocatable
//!   string offsets
//! - read-only message type descriptors ([`ddf::Descriptor`]) describing
//!   payload field layouts
//! - the per-tick [`UpdateContext`] and [`InputAction`] value types
//!
//! The register's message and spawn queues stand in for the external
//! transport: posting is fire-and-forget, delivery is the outer framework's
//! job.

pub mod ddf;
mod error;
mod ident;
mod input;
mod instance;
pub mod message;

pub use error::{Error, Result};
pub use ident::NameHash;
pub use input::InputAction;
pub use instance::{
    Collection, CollectionId, GameObject, InstanceRef, Register, SpawnRequest,
};
pub use message::{
    MessageBuffer, DEFAULT_COMPONENT, INSTANCE_MESSAGE_MAX, MESSAGE_HEADER_SIZE, PAYLOAD_MAX,
};

use glam::Mat4;

/// Per-tick context passed into the update dispatch.
#[derive(Debug, Clone, Copy)]
pub struct UpdateContext {
    /// Delta time for this tick, in seconds
    pub dt: f32,
    /// View-projection transform used by visibility queries
    pub view_proj: Mat4,
}

impl UpdateContext {
    /// Create an update context with an identity view-projection
    pub fn new(dt: f32) -> Self {
        Self {
            dt,
            view_proj: Mat4::IDENTITY,
        }
    }
}
