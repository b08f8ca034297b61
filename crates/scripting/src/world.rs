//! Script worlds and the dispatch entry points
//!
//! A [`ScriptWorld`] is the per-simulation-world registry of live script
//! components, iterated in registration order every tick. Each dispatch
//! entry point binds the ambient context, invokes the lifecycle function
//! with the instance userdata as the implicit first argument, and unbinds
//! on every exit path. A failing instance is logged with its module name
//! and degrades the aggregate result without stopping its siblings.

use std::rc::Rc;

use gameobject::{InputAction, InstanceRef, MessageBuffer, UpdateContext};
use mlua::{Function, MultiValue, Table, Value};
use tracing::error;

use crate::context::{self, BoundContext};
use crate::env::ScriptEnv;
use crate::error::{Error, Result};
use crate::instance::{self, ScriptComponent};
use crate::message;
use crate::script::{LifecycleFn, ScriptRef};

/// Aggregate outcome of a dispatch over one or more instances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    /// Every invoked function completed
    Ok,
    /// At least one instance failed; the rest still ran
    Failed,
}

impl DispatchResult {
    pub fn is_ok(self) -> bool {
        self == DispatchResult::Ok
    }
}

/// Outcome of an input dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputResult {
    /// The script ignored the input (returned false or nothing)
    Ignored,
    /// The script consumed the input; propagation stops
    Consumed,
    /// The script raised, or returned a non-boolean value
    Error,
}

/// Per-world registry of live script components, in registration order.
///
/// Removal swap-removes, which breaks ordering but keeps destruction O(1);
/// the update pass snapshots the length at tick start and deletions are
/// deferred through the collection, so no slot is revisited mid-tick.
#[derive(Default)]
pub struct ScriptWorld {
    components: Vec<Rc<ScriptComponent>>,
}

impl ScriptWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// The component attached to the given object, if any
    pub fn find(&self, instance: InstanceRef) -> Option<Rc<ScriptComponent>> {
        self.components
            .iter()
            .find(|c| c.instance == instance)
            .cloned()
    }

    fn remove(&mut self, component: &Rc<ScriptComponent>) -> bool {
        match self
            .components
            .iter()
            .position(|c| Rc::ptr_eq(c, component))
        {
            Some(i) => {
                self.components.swap_remove(i);
                true
            }
            None => false,
        }
    }
}

impl ScriptEnv {
    /// New-world hook
    pub fn new_world(&self) -> ScriptWorld {
        ScriptWorld::new()
    }

    /// Delete-world hook: release every component still registered.
    pub fn delete_world(&self, mut world: ScriptWorld) -> Result<()> {
        for component in world.components.drain(..) {
            instance::delete_script_instance(self.lua(), component)?;
        }
        Ok(())
    }

    /// Create-component hook: attach a script instance to an object and
    /// register it in the world. No script code runs.
    pub fn create_component(
        &self,
        world: &mut ScriptWorld,
        script: ScriptRef,
        instance: InstanceRef,
    ) -> Result<Rc<ScriptComponent>> {
        let component = instance::new_script_instance(self.lua(), script, instance)?;
        world.components.push(component.clone());
        Ok(component)
    }

    /// Init-component hook: dispatch `init` once, no update context bound.
    pub fn init_component(&self, component: &ScriptComponent) -> DispatchResult {
        match self.run_script(component, LifecycleFn::Init, None) {
            Ok(()) => DispatchResult::Ok,
            Err(err) => {
                self.log_failure(component, LifecycleFn::Init, &err);
                DispatchResult::Failed
            }
        }
    }

    /// Update-component hook: dispatch `update` for every live instance in
    /// registration order. Components added during the tick run first on
    /// the next tick.
    pub fn update_component(&self, world: &ScriptWorld, update: &UpdateContext) -> DispatchResult {
        let mut result = DispatchResult::Ok;
        let count = world.components.len();
        for i in 0..count {
            let component = world.components[i].clone();
            if let Err(err) = self.run_script(&component, LifecycleFn::Update, Some(update)) {
                self.log_failure(&component, LifecycleFn::Update, &err);
                result = DispatchResult::Failed;
            }
        }
        result
    }

    /// Destroy-component hook: remove exactly one entry from the world and
    /// release the instance's references.
    pub fn destroy_component(
        &self,
        world: &mut ScriptWorld,
        component: Rc<ScriptComponent>,
    ) -> Result<()> {
        world.remove(&component);
        instance::delete_script_instance(self.lua(), component)
    }

    /// On-message hook: reconstruct the payload table (relocating a typed
    /// payload exactly once) and dispatch `on_message`.
    pub fn on_message_component(
        &self,
        component: &ScriptComponent,
        buffer: &mut MessageBuffer,
    ) -> DispatchResult {
        match self.dispatch_message(component, buffer) {
            Ok(()) => DispatchResult::Ok,
            Err(err) => {
                self.log_failure(component, LifecycleFn::OnMessage, &err);
                DispatchResult::Failed
            }
        }
    }

    fn dispatch_message(&self, component: &ScriptComponent, buffer: &mut MessageBuffer) -> Result<()> {
        let Some(func) = self.lifecycle_function(component, LifecycleFn::OnMessage)? else {
            return Ok(());
        };

        let payload: Table = if buffer.descriptor.is_some() {
            buffer.relocate()?;
            message::decode_message(self.lua(), buffer)?
        } else {
            // named message with no structured data
            self.lua().create_table()?
        };

        let ud = component.userdata(self.lua())?;
        let _guard = context::bind(self.lua(), self.bound_context(component, None))?;
        func.call::<()>((ud, buffer.message_id.as_i64(), payload))?;
        Ok(())
    }

    /// On-input hook: dispatch `on_input` with the action table. The
    /// return value must be a boolean or absent; anything else is the
    /// error outcome.
    pub fn on_input_component(
        &self,
        component: &ScriptComponent,
        action: &InputAction,
    ) -> InputResult {
        match self.dispatch_input(component, action) {
            Ok(result) => result,
            Err(err) => {
                self.log_failure(component, LifecycleFn::OnInput, &err);
                InputResult::Error
            }
        }
    }

    fn dispatch_input(&self, component: &ScriptComponent, action: &InputAction) -> Result<InputResult> {
        let Some(func) = self.lifecycle_function(component, LifecycleFn::OnInput)? else {
            return Ok(InputResult::Ignored);
        };

        let table = self.lua().create_table()?;
        table.raw_set("value", action.value as f64)?;
        table.raw_set("pressed", action.pressed)?;
        table.raw_set("released", action.released)?;
        table.raw_set("repeated", action.repeated)?;

        let ud = component.userdata(self.lua())?;
        let _guard = context::bind(self.lua(), self.bound_context(component, None))?;
        let returned: MultiValue =
            func.call((ud, action.action_id.as_i64(), table))?;

        match returned.front() {
            None | Some(Value::Nil) => Ok(InputResult::Ignored),
            Some(Value::Boolean(true)) => Ok(InputResult::Consumed),
            Some(Value::Boolean(false)) => Ok(InputResult::Ignored),
            Some(other) => {
                let script = component.script(self.lua())?;
                error!(
                    module = %script.borrow().name(),
                    "on_input must return a boolean value (true/false), or no value at all, got {}",
                    other.type_name()
                );
                Ok(InputResult::Error)
            }
        }
    }

    // ------------------------------------------------------------------

    /// Invoke one lifecycle function on one component; absent functions
    /// are a successful no-op.
    fn run_script(
        &self,
        component: &ScriptComponent,
        f: LifecycleFn,
        update: Option<&UpdateContext>,
    ) -> Result<()> {
        let Some(func) = self.lifecycle_function(component, f)? else {
            return Ok(());
        };
        let ud = component.userdata(self.lua())?;
        let _guard = context::bind(self.lua(), self.bound_context(component, update.copied()))?;
        func.call::<()>(ud)?;
        Ok(())
    }

    fn lifecycle_function(
        &self,
        component: &ScriptComponent,
        f: LifecycleFn,
    ) -> Result<Option<Function>> {
        let script = component.script(self.lua())?;
        let script = script.borrow();
        match script.function_key(f) {
            Some(key) => Ok(Some(self.lua().registry_value(key)?)),
            None => Ok(None),
        }
    }

    fn bound_context(
        &self,
        component: &ScriptComponent,
        update: Option<UpdateContext>,
    ) -> BoundContext {
        BoundContext {
            collection: component.instance.collection,
            instance: component.instance,
            update,
        }
    }

    fn log_failure(&self, component: &ScriptComponent, f: LifecycleFn, err: &Error) {
        let module = component
            .script(self.lua())
            .map(|s| s.borrow().name().to_string())
            .unwrap_or_default();
        error!(module = %module, function = f.name(), "error running script: {err}");
    }
}
