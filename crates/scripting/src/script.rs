//! Script module store
//!
//! A compiled script module populates up to four well-known global
//! functions; loading captures each one as a registry reference and then
//! resets the globals so the next load starts clean. A missing function is
//! not an error — the corresponding dispatch becomes a no-op.

use std::cell::RefCell;
use std::rc::Rc;

use mlua::{Lua, RegistryKey, Value};

use crate::error::{Error, Result};

/// Number of well-known lifecycle functions
pub const MAX_SCRIPT_FUNCTION_COUNT: usize = 4;

/// The lifecycle slots a script module can define
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleFn {
    Init = 0,
    Update = 1,
    OnMessage = 2,
    OnInput = 3,
}

impl LifecycleFn {
    /// The well-known global names, in slot order
    pub const NAMES: [&'static str; MAX_SCRIPT_FUNCTION_COUNT] =
        ["init", "update", "on_message", "on_input"];

    pub const ALL: [LifecycleFn; MAX_SCRIPT_FUNCTION_COUNT] = [
        LifecycleFn::Init,
        LifecycleFn::Update,
        LifecycleFn::OnMessage,
        LifecycleFn::OnInput,
    ];

    pub fn name(self) -> &'static str {
        Self::NAMES[self as usize]
    }
}

/// A loaded script module: its name plus one captured function reference
/// per lifecycle slot. Shared between every instance running it.
#[derive(Debug)]
pub struct Script {
    name: String,
    functions: [Option<RegistryKey>; MAX_SCRIPT_FUNCTION_COUNT],
}

/// Shared handle to a script module; reload mutates it in place
pub type ScriptRef = Rc<RefCell<Script>>;

impl Script {
    pub(crate) fn empty() -> Self {
        Self {
            name: String::new(),
            functions: [None, None, None, None],
        }
    }

    /// Module name the script was loaded under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the module defined the given lifecycle function
    pub fn has_function(&self, f: LifecycleFn) -> bool {
        self.functions[f as usize].is_some()
    }

    pub(crate) fn function_key(&self, f: LifecycleFn) -> Option<&RegistryKey> {
        self.functions[f as usize].as_ref()
    }

    pub(crate) fn clear(&mut self, lua: &Lua) {
        for slot in self.functions.iter_mut() {
            if let Some(key) = slot.take() {
                let _ = lua.remove_registry_value(key);
            }
        }
    }
}

/// Run the shared load procedure into an existing script.
///
/// Destructive by design: the previous function references are released
/// before the new source runs, so a failed load leaves every slot empty.
/// The four well-known globals are reset on every exit path so one load can
/// never leak definitions into the next.
pub(crate) fn load_into(
    lua: &Lua,
    script: &mut Script,
    source: &[u8],
    module_name: &str,
) -> Result<()> {
    script.clear(lua);
    script.name = module_name.to_string();

    let result = run_and_capture(lua, script, source, module_name);

    let globals = lua.globals();
    for name in LifecycleFn::NAMES {
        let _ = globals.raw_set(name, Value::Nil);
    }
    result
}

fn run_and_capture(
    lua: &Lua,
    script: &mut Script,
    source: &[u8],
    module_name: &str,
) -> Result<()> {
    lua.load(source)
        .set_name(module_name)
        .exec()
        .map_err(|e| Error::Compile {
            module: module_name.to_string(),
            message: e.to_string(),
        })?;

    let globals = lua.globals();
    for f in LifecycleFn::ALL {
        let value: Value = globals.raw_get(f.name())?;
        match value {
            Value::Nil => {}
            Value::Function(func) => {
                script.functions[f as usize] = Some(lua.create_registry_value(func)?);
            }
            _ => {
                return Err(Error::NotAFunction {
                    module: module_name.to_string(),
                    name: f.name(),
                });
            }
        }
    }
    Ok(())
}
