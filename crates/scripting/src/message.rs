//! Message marshaling: Lua tables ⇄ fixed-size binary payloads
//!
//! Encoding walks the type descriptor field by field, pulling each value
//! out of the source table into the payload's fixed region. Strings are
//! appended NUL-terminated at the payload tail and their slot stores the
//! offset relative to the payload base. Nested messages recurse into their
//! sub-region while sharing the same tail cursor, so nested strings consume
//! the same capacity budget.
//!
//! Decoding is the reverse, and refuses buffers whose relocation pass has
//! not run (see [`gameobject::MessageBuffer::relocate`]).

use std::sync::Arc;

use gameobject::ddf::{Descriptor, FieldDescriptor, FieldKind};
use gameobject::message::{read_f32, read_i32, read_str, read_u32, write_u32};
use gameobject::{InstanceRef, MessageBuffer, PAYLOAD_MAX};
use mlua::{Lua, Table, Value};

use crate::error::{Error, Result};

/// Marshal a source table into a fresh typed message buffer.
pub fn encode_message(
    descriptor: Arc<Descriptor>,
    source: &Table,
    receiver: InstanceRef,
) -> Result<MessageBuffer> {
    if descriptor.size as usize > PAYLOAD_MAX {
        return Err(Error::PayloadTooLarge {
            name: descriptor.name.clone(),
            size: descriptor.size,
            capacity: PAYLOAD_MAX,
        });
    }
    let mut buffer = MessageBuffer::typed(descriptor.clone(), receiver);
    let mut cursor = descriptor.size as usize;
    pull_table(&descriptor, source, buffer.payload_mut(), 0, &mut cursor)?;
    Ok(buffer)
}

/// Pull every declared field of `descriptor` out of the source table.
///
/// A field that is absent from the table and not declared optional is a
/// hard error; optional absent fields marshal to their zero/empty default.
pub fn pull_table(
    descriptor: &Descriptor,
    source: &Table,
    payload: &mut [u8],
    base: usize,
    cursor: &mut usize,
) -> Result<()> {
    for field in &descriptor.fields {
        let value: Value = source.raw_get(field.name.as_str())?;
        if value.is_nil() && !field.optional {
            return Err(Error::MissingField {
                field: field.name.clone(),
            });
        }
        pull_value(field, value, payload, base, cursor)?;
    }
    Ok(())
}

/// Pull one field value into its slot at `base + field.offset`.
///
/// `cursor` is the shared tail write position for variable-length data; the
/// capacity check runs before any byte is written, so a failed pull never
/// leaves a partial string past the limit.
pub fn pull_value(
    field: &FieldDescriptor,
    value: Value,
    payload: &mut [u8],
    base: usize,
    cursor: &mut usize,
) -> Result<()> {
    let slot = base + field.offset as usize;
    match &field.kind {
        FieldKind::Int32 => {
            let v = if value.is_nil() {
                0
            } else {
                integer_value(field, &value)? as i32
            };
            write_u32(payload, slot, v as u32);
        }
        FieldKind::Uint32 => {
            let v = if value.is_nil() {
                0
            } else {
                integer_value(field, &value)? as u32
            };
            write_u32(payload, slot, v);
        }
        FieldKind::Float => {
            let v = if value.is_nil() {
                0.0
            } else {
                number_value(field, &value)? as f32
            };
            write_u32(payload, slot, v.to_bits());
        }
        FieldKind::String => {
            let bytes = match &value {
                Value::Nil => Vec::new(),
                Value::String(s) => s.as_bytes().to_vec(),
                other => {
                    return Err(Error::FieldType {
                        field: field.name.clone(),
                        expected: "string",
                        actual: other.type_name(),
                    });
                }
            };
            let size = bytes.len() + 1;
            if *cursor + size > payload.len() {
                return Err(Error::BufferFull {
                    needed: *cursor + size,
                    capacity: payload.len(),
                });
            }
            payload[*cursor..*cursor + bytes.len()].copy_from_slice(&bytes);
            payload[*cursor + bytes.len()] = 0;
            // the slot stores an offset from the payload base, never an
            // absolute address, so the buffer survives being copied/queued
            write_u32(payload, slot, *cursor as u32);
            *cursor += size;
        }
        FieldKind::Message(nested) => match value {
            Value::Nil => {} // omitted sub-message stays all-zero
            Value::Table(table) => {
                pull_table(nested, &table, payload, slot, cursor)?;
            }
            other => {
                return Err(Error::FieldType {
                    field: field.name.clone(),
                    expected: "table",
                    actual: other.type_name(),
                });
            }
        },
        _ => {
            return Err(Error::UnsupportedFieldKind {
                field: field.name.clone(),
            });
        }
    }
    Ok(())
}

/// Reconstruct the script-facing table from a received typed message.
///
/// The buffer must have been relocated exactly once beforehand.
pub fn decode_message(lua: &Lua, buffer: &MessageBuffer) -> Result<Table> {
    let descriptor = buffer.descriptor.as_ref().ok_or(Error::NotRelocated)?;
    if !buffer.is_relocated() {
        return Err(Error::NotRelocated);
    }
    region_to_table(lua, descriptor, buffer.payload(), 0)
}

fn region_to_table(lua: &Lua, descriptor: &Descriptor, payload: &[u8], base: usize) -> Result<Table> {
    let table = lua.create_table()?;
    for field in &descriptor.fields {
        let slot = base + field.offset as usize;
        match &field.kind {
            FieldKind::Int32 => {
                table.raw_set(field.name.as_str(), read_i32(payload, slot) as i64)?;
            }
            FieldKind::Uint32 => {
                table.raw_set(field.name.as_str(), read_u32(payload, slot) as i64)?;
            }
            FieldKind::Float => {
                table.raw_set(field.name.as_str(), read_f32(payload, slot) as f64)?;
            }
            FieldKind::String => {
                let offset = read_u32(payload, slot) as usize;
                let s = lua.create_string(read_str(payload, offset))?;
                table.raw_set(field.name.as_str(), s)?;
            }
            FieldKind::Message(nested) => {
                let sub = region_to_table(lua, nested, payload, slot)?;
                table.raw_set(field.name.as_str(), sub)?;
            }
            _ => {
                return Err(Error::UnsupportedFieldKind {
                    field: field.name.clone(),
                });
            }
        }
    }
    Ok(table)
}

fn integer_value(field: &FieldDescriptor, value: &Value) -> Result<i64> {
    match value {
        Value::Integer(i) => Ok(*i),
        Value::Number(n) => Ok(*n as i64),
        other => Err(Error::FieldType {
            field: field.name.clone(),
            expected: "integer",
            actual: other.type_name(),
        }),
    }
}

fn number_value(field: &FieldDescriptor, value: &Value) -> Result<f64> {
    match value {
        Value::Integer(i) => Ok(*i as f64),
        Value::Number(n) => Ok(*n),
        other => Err(Error::FieldType {
            field: field.name.clone(),
            expected: "number",
            actual: other.type_name(),
        }),
    }
}
