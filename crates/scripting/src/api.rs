//! Script-exposed API
//!
//! Global functions installed into the shared interpreter at environment
//! setup. Transform accessors, `ident` and `delete` take the script
//! instance as their first argument; the posting, spawning and visibility
//! calls resolve the calling collection/instance from the ambient context
//! instead.
//!
//! Vectors and quaternions cross the boundary as plain array tables
//! (`{x, y, z}` / `{x, y, z, w}`).

use std::cell::RefCell;
use std::rc::Rc;

use gameobject::ddf::DescriptorRegistry;
use gameobject::{InstanceRef, MessageBuffer, NameHash, Register, SpawnRequest};
use glam::{Mat4, Quat, Vec3};
use mlua::{AnyUserData, Lua, Table, Value};
use mlua::prelude::*;

use crate::context::{self, BoundContext};
use crate::error::Error;
use crate::instance::ScriptInstance;
use crate::message;

/// Install every script-facing global
pub(crate) fn register_api(
    lua: &Lua,
    register: &Rc<RefCell<Register>>,
    descriptors: &Rc<RefCell<DescriptorRegistry>>,
) -> crate::error::Result<()> {
    let globals = lua.globals();

    // value constructors
    globals.set(
        "vec3",
        lua.create_function(|_, (x, y, z): (f64, f64, f64)| Ok(vec![x, y, z]))?,
    )?;
    globals.set(
        "quat",
        lua.create_function(|_, (x, y, z, w): (f64, f64, f64, f64)| Ok(vec![x, y, z, w]))?,
    )?;
    globals.set(
        "quat_identity",
        lua.create_function(|_, ()| Ok(vec![0.0f64, 0.0, 0.0, 1.0]))?,
    )?;

    // post(message_name [, payload])
    let reg = register.clone();
    let desc = descriptors.clone();
    globals.set(
        "post",
        lua.create_function(move |lua, (name, payload): (String, Option<Table>)| {
            let ctx = bound(lua)?;
            let buffer = build_message(&desc.borrow(), &name, payload, ctx.instance)?;
            reg.borrow_mut().post_message(buffer);
            Ok(())
        })?,
    )?;

    // post_named_to(target_id, component_name, message_name [, payload])
    let reg = register.clone();
    let desc = descriptors.clone();
    globals.set(
        "post_named_to",
        lua.create_function(
            move |lua,
                  (target_id, component_name, name, payload): (
                i64,
                String,
                String,
                Option<Table>,
            )| {
                let ctx = bound(lua)?;
                let target = InstanceRef {
                    collection: ctx.collection,
                    id: NameHash::from_i64(target_id),
                };
                post_resolved(&reg, &desc.borrow(), target, &component_name, &name, payload)
            },
        )?,
    )?;

    // post_to_collection(collection_name, target_id, component_name, message_name [, payload])
    let reg = register.clone();
    let desc = descriptors.clone();
    globals.set(
        "post_to_collection",
        lua.create_function(
            move |lua,
                  (collection_name, target_id, component_name, name, payload): (
                String,
                i64,
                String,
                String,
                Option<Table>,
            )| {
                let _ = bound(lua)?;
                let collection_hash = NameHash::of(&collection_name);
                let collection = reg
                    .borrow()
                    .find_collection(collection_hash)
                    .ok_or(Error::UnknownCollection(collection_hash))?;
                let target = InstanceRef {
                    collection,
                    id: NameHash::from_i64(target_id),
                };
                post_resolved(&reg, &desc.borrow(), target, &component_name, &name, payload)
            },
        )?,
    )?;

    // transform accessors, self passed explicitly
    let reg = register.clone();
    globals.set(
        "get_position",
        lua.create_function(move |lua, ud: AnyUserData| {
            let instance = instance_ref(&ud)?;
            let position = with_object(&reg, instance, |o| o.position)?;
            push_vec3(lua, position)
        })?,
    )?;

    let reg = register.clone();
    globals.set(
        "get_rotation",
        lua.create_function(move |lua, ud: AnyUserData| {
            let instance = instance_ref(&ud)?;
            let rotation = with_object(&reg, instance, |o| o.rotation)?;
            push_quat(lua, rotation)
        })?,
    )?;

    let reg = register.clone();
    globals.set(
        "get_world_position",
        lua.create_function(move |lua, ud: AnyUserData| {
            let instance = instance_ref(&ud)?;
            let position = with_object(&reg, instance, |o| o.world_position)?;
            push_vec3(lua, position)
        })?,
    )?;

    let reg = register.clone();
    globals.set(
        "get_world_rotation",
        lua.create_function(move |lua, ud: AnyUserData| {
            let instance = instance_ref(&ud)?;
            let rotation = with_object(&reg, instance, |o| o.world_rotation)?;
            push_quat(lua, rotation)
        })?,
    )?;

    let reg = register.clone();
    globals.set(
        "set_position",
        lua.create_function(move |_, (ud, v): (AnyUserData, Table)| {
            let instance = instance_ref(&ud)?;
            let position = parse_vec3(&v)?;
            let mut reg = reg.borrow_mut();
            let object = reg
                .instance_mut(instance)
                .ok_or(Error::UnknownInstance(instance.id))?;
            object.position = position;
            Ok(())
        })?,
    )?;

    let reg = register.clone();
    globals.set(
        "set_rotation",
        lua.create_function(move |_, (ud, q): (AnyUserData, Table)| {
            let instance = instance_ref(&ud)?;
            let rotation = parse_quat(&q)?;
            let mut reg = reg.borrow_mut();
            let object = reg
                .instance_mut(instance)
                .ok_or(Error::UnknownInstance(instance.id))?;
            object.rotation = rotation;
            Ok(())
        })?,
    )?;

    // ident(self, local_name) -> stable identity hash
    globals.set(
        "ident",
        lua.create_function(|_, (ud, name): (AnyUserData, String)| {
            let _ = instance_ref(&ud)?;
            Ok(NameHash::of(&name).as_i64())
        })?,
    )?;

    // is_visible(min, max [, margin])
    globals.set(
        "is_visible",
        lua.create_function(
            |lua, (min, max, margin): (Table, Table, Option<f64>)| {
                let ctx = bound(lua)?;
                let update = ctx.update.ok_or(Error::NoContext)?;
                let min = parse_vec3(&min)?;
                let max = parse_vec3(&max)?;
                let margin = margin.unwrap_or(1.0) as f32;
                Ok(box_visible(min, max, &update.view_proj, margin))
            },
        )?,
    )?;

    // delete(self): schedule removal at the next safe point
    let reg = register.clone();
    globals.set(
        "delete",
        lua.create_function(move |lua, ud: AnyUserData| {
            let ctx = bound(lua)?;
            let instance = instance_ref(&ud)?;
            reg.borrow_mut()
                .collection_mut(ctx.collection)
                .schedule_delete(instance.id);
            Ok(())
        })?,
    )?;

    // spawn(prototype, position, rotation): deferred via the spawn channel
    let reg = register.clone();
    globals.set(
        "spawn",
        lua.create_function(
            move |lua, (prototype, position, rotation): (String, Table, Table)| {
                let ctx = bound(lua)?;
                let request = SpawnRequest {
                    collection: ctx.collection,
                    prototype,
                    position: parse_vec3(&position)?,
                    rotation: parse_quat(&rotation)?,
                };
                reg.borrow_mut().post_spawn(request);
                Ok(())
            },
        )?,
    )?;

    Ok(())
}

/// The ambient context, or an error when called outside a dispatch
fn bound(lua: &Lua) -> LuaResult<BoundContext> {
    context::current(lua).ok_or_else(|| Error::NoContext.into())
}

fn instance_ref(ud: &AnyUserData) -> LuaResult<InstanceRef> {
    let si = ud.borrow::<ScriptInstance>()?;
    Ok(si.instance)
}

fn with_object<T>(
    register: &Rc<RefCell<Register>>,
    instance: InstanceRef,
    f: impl FnOnce(&gameobject::GameObject) -> T,
) -> LuaResult<T> {
    let reg = register.borrow();
    let object = reg
        .instance(instance)
        .ok_or(Error::UnknownInstance(instance.id))?;
    Ok(f(object))
}

fn build_message(
    descriptors: &DescriptorRegistry,
    message_name: &str,
    payload: Option<Table>,
    receiver: InstanceRef,
) -> LuaResult<MessageBuffer> {
    let buffer = match payload {
        Some(table) => {
            let descriptor = descriptors
                .get(NameHash::of(message_name))
                .ok_or_else(|| Error::UnknownMessageType {
                    name: message_name.to_string(),
                })?;
            message::encode_message(descriptor, &table, receiver)?
        }
        None => MessageBuffer::named(NameHash::of(message_name), receiver),
    };
    Ok(buffer)
}

fn post_resolved(
    register: &Rc<RefCell<Register>>,
    descriptors: &DescriptorRegistry,
    target: InstanceRef,
    component_name: &str,
    message_name: &str,
    payload: Option<Table>,
) -> LuaResult<()> {
    let component_hash = NameHash::of(component_name);
    let component_index = {
        let reg = register.borrow();
        let object = reg
            .instance(target)
            .ok_or(Error::UnknownInstance(target.id))?;
        object
            .component_index(component_hash)
            .ok_or(Error::UnknownComponent(component_hash))?
    };
    let mut buffer = build_message(descriptors, message_name, payload, target)?;
    buffer.component_index = component_index;
    register.borrow_mut().post_message(buffer);
    Ok(())
}

// ----------------------------------------------------------------------
// Lua value helpers
// ----------------------------------------------------------------------

fn extract_f32(table: &Table, index: i64) -> LuaResult<f32> {
    let value: Value = table.raw_get(index)?;
    match value {
        Value::Number(n) => Ok(n as f32),
        Value::Integer(i) => Ok(i as f32),
        other => Err(LuaError::FromLuaConversionError {
            from: other.type_name(),
            to: "f32".to_string(),
            message: Some(format!("expected number at index {index}")),
        }),
    }
}

/// Parse a Lua array table as Vec3 (expects 3 elements)
fn parse_vec3(table: &Table) -> LuaResult<Vec3> {
    Ok(Vec3::new(
        extract_f32(table, 1)?,
        extract_f32(table, 2)?,
        extract_f32(table, 3)?,
    ))
}

/// Parse a Lua array table as Quat (expects 4 elements)
fn parse_quat(table: &Table) -> LuaResult<Quat> {
    Ok(Quat::from_xyzw(
        extract_f32(table, 1)?,
        extract_f32(table, 2)?,
        extract_f32(table, 3)?,
        extract_f32(table, 4)?,
    ))
}

fn push_vec3(lua: &Lua, v: Vec3) -> LuaResult<Table> {
    let table = lua.create_table()?;
    table.raw_set(1, v.x as f64)?;
    table.raw_set(2, v.y as f64)?;
    table.raw_set(3, v.z as f64)?;
    Ok(table)
}

fn push_quat(lua: &Lua, q: Quat) -> LuaResult<Table> {
    let table = lua.create_table()?;
    table.raw_set(1, q.x as f64)?;
    table.raw_set(2, q.y as f64)?;
    table.raw_set(3, q.z as f64)?;
    table.raw_set(4, q.w as f64)?;
    Ok(table)
}

// ----------------------------------------------------------------------
// Visibility
// ----------------------------------------------------------------------

/// Conservative box visibility: the box counts as visible only when every
/// one of its 8 corners lands within `margin` on all three normalized
/// clip-space axes (inclusive).
fn box_visible(min: Vec3, max: Vec3, view_proj: &Mat4, margin: f32) -> bool {
    for &x in &[min.x, max.x] {
        for &y in &[min.y, max.y] {
            for &z in &[min.z, max.z] {
                if !point_visible(Vec3::new(x, y, z), view_proj, margin) {
                    return false;
                }
            }
        }
    }
    true
}

fn point_visible(p: Vec3, view_proj: &Mat4, margin: f32) -> bool {
    let clip = *view_proj * p.extend(1.0);
    if clip.w == 0.0 {
        return false;
    }
    let inv_w = 1.0 / clip.w;
    (clip.x * inv_w).abs() <= margin
        && (clip.y * inv_w).abs() <= margin
        && (clip.z * inv_w).abs() <= margin
}
