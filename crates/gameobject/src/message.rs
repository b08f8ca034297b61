//! Fixed-capacity message buffers with relocatable string offsets
//!
//! A message is a header (message id, optional type descriptor, receiver,
//! sub-component index) followed by a payload of at most [`PAYLOAD_MAX`]
//! bytes. The payload starts with the descriptor's fixed region; string
//! fields store a `u32` offset relative to the payload base and their bytes
//! (NUL-terminated) live past the fixed region, at the payload tail. Because
//! only base-relative offsets are stored, the whole buffer stays valid when
//! copied or queued.
//!
//! Before a received payload is handed to script-facing conversion it must
//! be relocated exactly once: [`MessageBuffer::relocate`] walks the
//! descriptor (nested messages included), bounds-checks every string offset
//! and its terminator, and marks the buffer. Relocating twice is an error by
//! design, and decoding refuses unrelocated buffers.

use std::sync::Arc;

use crate::ddf::{Descriptor, FieldKind};
use crate::error::{Error, Result};
use crate::instance::InstanceRef;
use crate::NameHash;

/// Total capacity of an instance message, header included
pub const INSTANCE_MESSAGE_MAX: usize = 256;

/// Wire size of the message header: message id (8), descriptor type-name
/// hash or zero (8), receiver identity (4 + padding), collection index (2),
/// component index (1), flags (1)
pub const MESSAGE_HEADER_SIZE: usize = 24;

/// Payload capacity left after the header
pub const PAYLOAD_MAX: usize = INSTANCE_MESSAGE_MAX - MESSAGE_HEADER_SIZE;

/// Sub-component index addressing the object's default component
pub const DEFAULT_COMPONENT: u8 = 0xff;

/// One queued or delivered instance message
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    /// Hashed message name
    pub message_id: NameHash,
    /// Layout of the payload; `None` for named messages without data
    pub descriptor: Option<Arc<Descriptor>>,
    /// Destination object
    pub receiver: InstanceRef,
    /// Destination sub-component index ([`DEFAULT_COMPONENT`] for default)
    pub component_index: u8,
    relocated: bool,
    payload: [u8; PAYLOAD_MAX],
}

impl MessageBuffer {
    /// A named message without structured data
    pub fn named(message_id: NameHash, receiver: InstanceRef) -> Self {
        Self {
            message_id,
            descriptor: None,
            receiver,
            component_index: DEFAULT_COMPONENT,
            relocated: false,
            payload: [0u8; PAYLOAD_MAX],
        }
    }

    /// An empty typed message; the marshaler fills the payload in place
    pub fn typed(descriptor: Arc<Descriptor>, receiver: InstanceRef) -> Self {
        Self {
            message_id: descriptor.name_hash(),
            descriptor: Some(descriptor),
            receiver,
            component_index: DEFAULT_COMPONENT,
            relocated: false,
            payload: [0u8; PAYLOAD_MAX],
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    /// Whether the relocation pass has run on this buffer
    pub fn is_relocated(&self) -> bool {
        self.relocated
    }

    /// Validate every string offset in the payload and mark the buffer
    /// ready for decoding.
    ///
    /// Must be called exactly once, immediately before script-facing
    /// conversion; a second call returns [`Error::AlreadyRelocated`].
    pub fn relocate(&mut self) -> Result<()> {
        if self.relocated {
            return Err(Error::AlreadyRelocated);
        }
        let descriptor = self.descriptor.clone().ok_or(Error::NoDescriptor)?;
        relocate_region(&descriptor, &self.payload, 0)?;
        self.relocated = true;
        Ok(())
    }
}

/// Check all string fields of one fixed region, recursing into nested
/// messages. Offsets are relative to the payload base regardless of nesting
/// depth.
fn relocate_region(descriptor: &Descriptor, payload: &[u8], base: usize) -> Result<()> {
    for field in &descriptor.fields {
        let slot = base + field.offset as usize;
        match &field.kind {
            FieldKind::String => {
                let offset = read_u32(payload, slot);
                let start = offset as usize;
                if start >= payload.len() {
                    return Err(Error::StringOffsetOutOfBounds {
                        field: field.name.clone(),
                        offset,
                        payload: payload.len(),
                    });
                }
                if !payload[start..].contains(&0) {
                    return Err(Error::UnterminatedString {
                        field: field.name.clone(),
                        offset,
                    });
                }
            }
            FieldKind::Message(nested) => {
                relocate_region(nested, payload, slot)?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Read a little-endian u32 from the payload
pub fn read_u32(payload: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&payload[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

/// Read a little-endian i32 from the payload
pub fn read_i32(payload: &[u8], offset: usize) -> i32 {
    read_u32(payload, offset) as i32
}

/// Read a little-endian f32 from the payload
pub fn read_f32(payload: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32(payload, offset))
}

/// Read the NUL-terminated string starting at `offset`.
///
/// Callers must have relocated the buffer first; offsets are trusted here.
pub fn read_str(payload: &[u8], offset: usize) -> &str {
    let tail = &payload[offset..];
    let end = tail.iter().position(|b| *b == 0).unwrap_or(tail.len());
    std::str::from_utf8(&tail[..end]).unwrap_or("")
}

/// Write a little-endian u32 into the payload
pub fn write_u32(payload: &mut [u8], offset: usize, value: u32) {
    payload[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
