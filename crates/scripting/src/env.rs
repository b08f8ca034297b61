//! The shared scripting environment
//!
//! One [`ScriptEnv`] owns the single Lua interpreter every script module
//! and instance runs in, the handle to the register, and the registry of
//! message type descriptors. It also carries the resource hooks for script
//! modules (create, in-place reload, destroy).

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use gameobject::ddf::{Descriptor, DescriptorRegistry};
use gameobject::{InstanceRef, Register};
use mlua::{Lua, Value};

use crate::api;
use crate::context;
use crate::error::Result;
use crate::script::{self, Script, ScriptRef};
use crate::world::ScriptWorld;

/// The scripting environment: one shared interpreter, the register handle
/// and the known message types.
pub struct ScriptEnv {
    lua: Lua,
    register: Rc<RefCell<Register>>,
    descriptors: Rc<RefCell<DescriptorRegistry>>,
}

impl ScriptEnv {
    /// Create the environment and install the script-exposed API globals.
    pub fn new(register: Rc<RefCell<Register>>) -> Result<Self> {
        let lua = Lua::new();
        context::install(&lua);
        let descriptors = Rc::new(RefCell::new(DescriptorRegistry::new()));
        api::register_api(&lua, &register, &descriptors)?;
        Ok(Self {
            lua,
            register,
            descriptors,
        })
    }

    /// The underlying Lua state
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// The register shared with the outer framework
    pub fn register(&self) -> &Rc<RefCell<Register>> {
        &self.register
    }

    /// Make a message type known to the bridge. Posting a payload table for
    /// a type that was never registered is a hard error.
    pub fn register_message_type(&self, descriptor: Arc<Descriptor>) {
        self.descriptors.borrow_mut().register(descriptor);
    }

    /// Whether a dispatch is currently in flight (ambient context bound)
    pub fn has_bound_context(&self) -> bool {
        context::current(&self.lua).is_some()
    }

    // ------------------------------------------------------------------
    // Resource hooks
    // ------------------------------------------------------------------

    /// Create hook: compile a module and capture its lifecycle functions.
    pub fn new_script(&self, source: &[u8], module_name: &str) -> Result<ScriptRef> {
        let mut script = Script::empty();
        script::load_into(&self.lua, &mut script, source, module_name)?;
        Ok(Rc::new(RefCell::new(script)))
    }

    /// Recreate hook: reload a module in place, for every instance sharing
    /// it. Destructive on failure: the previous function references are
    /// already released when the new source fails to load.
    pub fn reload_script(&self, script: &ScriptRef, source: &[u8], module_name: &str) -> Result<()> {
        script::load_into(&self.lua, &mut script.borrow_mut(), source, module_name)
    }

    /// Destroy hook: release the module's function references.
    pub fn delete_script(&self, script: ScriptRef) {
        script.borrow_mut().clear(&self.lua);
    }

    // ------------------------------------------------------------------
    // Property injection
    // ------------------------------------------------------------------

    /// Write an integer into an instance's data store, bypassing script
    /// execution. No-op if the object has no script component in `world`.
    pub fn set_script_int_property(
        &self,
        world: &ScriptWorld,
        instance: InstanceRef,
        key: &str,
        value: i64,
    ) {
        self.set_script_property(world, instance, key, Value::Integer(value));
    }

    /// Write a float into an instance's data store.
    pub fn set_script_float_property(
        &self,
        world: &ScriptWorld,
        instance: InstanceRef,
        key: &str,
        value: f64,
    ) {
        self.set_script_property(world, instance, key, Value::Number(value));
    }

    /// Write a string into an instance's data store.
    pub fn set_script_string_property(
        &self,
        world: &ScriptWorld,
        instance: InstanceRef,
        key: &str,
        value: &str,
    ) {
        if let Ok(s) = self.lua.create_string(value) {
            self.set_script_property(world, instance, key, Value::String(s));
        }
    }

    fn set_script_property(
        &self,
        world: &ScriptWorld,
        instance: InstanceRef,
        key: &str,
        value: Value,
    ) {
        let Some(component) = world.find(instance) else {
            return;
        };
        if let Ok(data) = component.data_table(&self.lua) {
            let _ = data.raw_set(key, value);
        }
    }
}
