//! Read-only message type descriptors
//!
//! Descriptors come from the external schema system and describe the binary
//! layout of a typed message payload: one fixed-size region whose fields sit
//! at declared offsets, with variable-length string data appended past the
//! fixed region. The marshaling engine in the `scripting` crate consumes
//! these as read-only layout information.

use std::collections::HashMap;
use std::sync::Arc;

use crate::NameHash;

/// Declared primitive kind of a payload field.
///
/// The marshaler supports `Int32`, `Uint32`, `Float`, `String` and nested
/// `Message` fields. The remaining kinds can appear in descriptors produced
/// by the schema system but are rejected during marshaling.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Int32,
    Uint32,
    Float,
    String,
    Message(Arc<Descriptor>),
    Bool,
    Int64,
    Uint64,
    Bytes,
}

impl FieldKind {
    /// Size of the field's slot inside the fixed region, in bytes
    pub fn slot_size(&self) -> u32 {
        match self {
            FieldKind::Int32 | FieldKind::Uint32 | FieldKind::Float | FieldKind::String => 4,
            FieldKind::Message(d) => d.size,
            FieldKind::Bool => 1,
            FieldKind::Int64 | FieldKind::Uint64 => 8,
            FieldKind::Bytes => 8,
        }
    }
}

/// One field of a message type
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name as it appears in script tables
    pub name: String,
    /// Declared primitive kind
    pub kind: FieldKind,
    /// Byte offset of the field's slot, relative to the owning message's
    /// fixed region
    pub offset: u32,
    /// Optional fields may be absent from the source table
    pub optional: bool,
}

/// Layout of one message type
#[derive(Debug, Clone)]
pub struct Descriptor {
    /// Type name; its hash keys the registry and doubles as the message id
    pub name: String,
    /// Size of the fixed region in bytes
    pub size: u32,
    /// Field layout
    pub fields: Vec<FieldDescriptor>,
}

impl Descriptor {
    /// Hashed type name
    pub fn name_hash(&self) -> NameHash {
        NameHash::of(&self.name)
    }
}

/// Builder-style helper for declaring descriptors in tests and fixtures.
///
/// Offsets are assigned sequentially in declaration order, which matches how
/// the schema compiler lays out its structs.
#[derive(Debug, Default)]
pub struct DescriptorBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
    cursor: u32,
}

impl DescriptorBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
            cursor: 0,
        }
    }

    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        let offset = self.cursor;
        self.cursor += kind.slot_size();
        self.fields.push(FieldDescriptor {
            name: name.to_string(),
            kind,
            offset,
            optional: false,
        });
        self
    }

    pub fn optional_field(mut self, name: &str, kind: FieldKind) -> Self {
        let mut b = self.field(name, kind);
        b.fields.last_mut().unwrap().optional = true;
        b
    }

    pub fn build(self) -> Arc<Descriptor> {
        Arc::new(Descriptor {
            name: self.name,
            size: self.cursor,
            fields: self.fields,
        })
    }
}

/// Registry of message types known to the bridge, keyed by type-name hash
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    descriptors: HashMap<NameHash, Arc<Descriptor>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a message type; replaces any previous descriptor with the
    /// same name
    pub fn register(&mut self, descriptor: Arc<Descriptor>) {
        self.descriptors.insert(descriptor.name_hash(), descriptor);
    }

    /// Look a type up by name hash
    pub fn get(&self, name_hash: NameHash) -> Option<Arc<Descriptor>> {
        self.descriptors.get(&name_hash).cloned()
    }
}
