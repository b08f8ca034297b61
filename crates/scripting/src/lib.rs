//! Lua script component bridge
//!
//! Binds user-authored Lua script modules to individual game object
//! instances, drives their lifecycle callbacks each simulation tick, and
//! provides the typed inter-object messaging channel with binary-serialized
//! payloads.
//!
//! # Architecture
//!
//! - [`ScriptEnv`] — one shared Lua interpreter plus the register handle
//!   and the registry of message type descriptors
//! - [`Script`] — a loaded module: up to four captured lifecycle functions
//!   (`init`, `update`, `on_message`, `on_input`); missing ones are
//!   absent-but-valid
//! - [`ScriptComponent`] / [`ScriptWorld`] — per-object instances with an
//!   isolated data table, registered per world and updated in registration
//!   order
//! - ambient context — collection / calling instance / update context bound
//!   around every dispatch, resolved implicitly by the script API
//! - message marshaling — Lua tables ⇄ fixed-capacity buffers with
//!   relocatable string offsets
//!
//! Scripts look like:
//!
//! ```lua
//! function init(self)
//!     self.health = 100
//! end
//!
//! function update(self)
//!     self.t = (self.t or 0) + self.dt
//! end
//!
//! function on_message(self, message_id, message)
//!     if message.amount then
//!         self.health = self.health - message.amount
//!     end
//! end
//! ```

mod api;
mod context;
mod env;
mod error;
mod instance;
pub mod message;
mod script;
mod world;

pub use context::BoundContext;
pub use env::ScriptEnv;
pub use error::{Error, Result};
pub use instance::ScriptComponent;
pub use script::{LifecycleFn, Script, ScriptRef, MAX_SCRIPT_FUNCTION_COUNT};
pub use world::{DispatchResult, InputResult, ScriptWorld};

#[cfg(test)]
mod tests;
