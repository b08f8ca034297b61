//! Ambient dispatch context
//!
//! Script API calls resolve "the calling collection/instance" implicitly
//! instead of taking them as arguments. The bridge keeps one context slot in
//! the Lua state's app data; every dispatch entry point binds the slot right
//! before invoking a lifecycle function and clears it right after, on every
//! exit path. Exactly one dispatch may be in flight at a time: the binder
//! refuses to nest, which is also why anything that would re-enter script
//! code (spawning, messaging) is deferred through queues instead.

use gameobject::{CollectionId, InstanceRef, UpdateContext};
use mlua::Lua;

use crate::error::{Error, Result};

/// The three ambient slots installed for the duration of one dispatch
#[derive(Debug, Clone, Copy)]
pub struct BoundContext {
    /// Collection owning the calling instance
    pub collection: CollectionId,
    /// The calling object instance
    pub instance: InstanceRef,
    /// Per-tick context; `None` outside the update dispatch
    pub update: Option<UpdateContext>,
}

/// App-data slot holding the currently bound context, if any
#[derive(Debug, Default)]
pub(crate) struct Ambient {
    bound: Option<BoundContext>,
}

/// Install the empty ambient slot. Called once at environment setup.
pub(crate) fn install(lua: &Lua) {
    lua.set_app_data(Ambient::default());
}

/// The currently bound context, if a dispatch is in flight
pub(crate) fn current(lua: &Lua) -> Option<BoundContext> {
    lua.app_data_ref::<Ambient>().and_then(|a| a.bound)
}

/// Bind the ambient context for one dispatch.
///
/// Fails with [`Error::ReentrantDispatch`] if a dispatch is already in
/// flight. The returned guard clears the slot on drop, so unbinding happens
/// even when the lifecycle invocation raises.
pub(crate) fn bind(lua: &Lua, ctx: BoundContext) -> Result<ContextGuard<'_>> {
    {
        let mut ambient = lua.app_data_mut::<Ambient>().ok_or(Error::NoContext)?;
        if ambient.bound.is_some() {
            return Err(Error::ReentrantDispatch);
        }
        ambient.bound = Some(ctx);
    }
    Ok(ContextGuard { lua })
}

/// Clears the ambient slot when the dispatch ends
pub(crate) struct ContextGuard<'l> {
    lua: &'l Lua,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        if let Some(mut ambient) = self.lua.app_data_mut::<Ambient>() {
            ambient.bound = None;
        }
    }
}
