//! Script instances
//!
//! Each game object with a script component gets a [`ScriptInstance`]: a
//! Lua userdata passed as `self` to every lifecycle function. Field access
//! on `self` goes through an explicit lookup: a small set of read-only
//! built-ins first (`id`, and `dt` while an update context is bound), then
//! the instance's isolated data table. Writes always land in the data
//! table, so state never leaks between instances sharing one script module.

use std::rc::Rc;

use gameobject::InstanceRef;
use mlua::{AnyUserData, Lua, MetaMethod, RegistryKey, Table, UserData, UserDataMethods, Value};

use crate::context;
use crate::error::Result;
use crate::script::ScriptRef;

/// Userdata handed to script code as `self`
pub struct ScriptInstance {
    pub(crate) script: ScriptRef,
    pub(crate) instance: InstanceRef,
    /// Isolated per-instance data table
    pub(crate) data: RegistryKey,
}

impl UserData for ScriptInstance {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: Value| {
            if let Value::String(s) = &key {
                if let Ok(name) = s.to_str() {
                    match &*name {
                        "id" => return Ok(Value::Integer(this.instance.id.as_i64())),
                        "dt" => {
                            if let Some(update) =
                                context::current(lua).and_then(|ctx| ctx.update)
                            {
                                return Ok(Value::Number(update.dt as f64));
                            }
                        }
                        _ => {}
                    }
                }
            }
            let data: Table = lua.registry_value(&this.data)?;
            data.raw_get::<Value>(key)
        });

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |lua, this, (key, value): (Value, Value)| {
                let data: Table = lua.registry_value(&this.data)?;
                data.raw_set(key, value)
            },
        );

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!("GameObject: {}", this.instance.id))
        });
    }
}

/// Handle to one live script component.
///
/// The anchor registry reference keeps the userdata (and through it the
/// data table) alive for as long as the component exists.
pub struct ScriptComponent {
    pub(crate) anchor: RegistryKey,
    /// The owning game object
    pub instance: InstanceRef,
}

impl ScriptComponent {
    /// The script module this component runs
    pub(crate) fn script(&self, lua: &Lua) -> Result<ScriptRef> {
        let ud: AnyUserData = lua.registry_value(&self.anchor)?;
        let si = ud.borrow::<ScriptInstance>()?;
        Ok(si.script.clone())
    }

    /// The anchored `self` userdata
    pub(crate) fn userdata(&self, lua: &Lua) -> Result<AnyUserData> {
        Ok(lua.registry_value(&self.anchor)?)
    }

    /// The instance's isolated data table
    pub(crate) fn data_table(&self, lua: &Lua) -> Result<Table> {
        let ud: AnyUserData = lua.registry_value(&self.anchor)?;
        let si = ud.borrow::<ScriptInstance>()?;
        Ok(lua.registry_value(&si.data)?)
    }
}

/// Create a script instance for an object: fresh empty data table, anchored
/// userdata. No script code runs here.
pub(crate) fn new_script_instance(
    lua: &Lua,
    script: ScriptRef,
    instance: InstanceRef,
) -> Result<Rc<ScriptComponent>> {
    let data = lua.create_registry_value(lua.create_table()?)?;
    let ud = lua.create_userdata(ScriptInstance {
        script,
        instance,
        data,
    })?;
    let anchor = lua.create_registry_value(ud)?;
    Ok(Rc::new(ScriptComponent { anchor, instance }))
}

/// Release a script instance's registry references.
pub(crate) fn delete_script_instance(lua: &Lua, component: Rc<ScriptComponent>) -> Result<()> {
    let ud: AnyUserData = lua.registry_value(&component.anchor)?;
    let si = ud.take::<ScriptInstance>()?;
    lua.remove_registry_value(si.data)?;
    if let Ok(component) = Rc::try_unwrap(component) {
        lua.remove_registry_value(component.anchor)?;
    }
    Ok(())
}
