//! Game objects, collections and the register
//!
//! A [`Collection`] is one addressable namespace of game objects; the
//! [`Register`] owns all collections of a running simulation plus the
//! message and spawn queues that scripts post into. The scripting bridge
//! references objects through [`InstanceRef`] handles and never owns them.

use std::collections::{HashMap, VecDeque};

use glam::{Quat, Vec3};

use crate::message::MessageBuffer;
use crate::NameHash;

/// Index of a collection inside the register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionId(pub u32);

/// Handle to one game object: its collection plus its identity hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceRef {
    pub collection: CollectionId,
    pub id: NameHash,
}

/// One simulation object instance.
///
/// The world transform is maintained by the external transform pass; the
/// bridge only reads it.
#[derive(Debug, Clone)]
pub struct GameObject {
    /// Identity hash of the instance name
    pub id: NameHash,
    /// Local-space position
    pub position: Vec3,
    /// Local-space rotation
    pub rotation: Quat,
    /// World-space position
    pub world_position: Vec3,
    /// World-space rotation
    pub world_rotation: Quat,
    /// Hashed names of the instance's sub-components, in attachment order
    pub components: Vec<NameHash>,
}

impl GameObject {
    pub fn new(name: &str) -> Self {
        Self {
            id: NameHash::of(name),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            world_position: Vec3::ZERO,
            world_rotation: Quat::IDENTITY,
            components: Vec::new(),
        }
    }

    /// Attach a named sub-component; order defines the component index
    pub fn with_component(mut self, name: &str) -> Self {
        self.components.push(NameHash::of(name));
        self
    }

    /// Resolve a sub-component name to its index
    pub fn component_index(&self, name_hash: NameHash) -> Option<u8> {
        self.components
            .iter()
            .position(|c| *c == name_hash)
            .map(|i| i as u8)
    }
}

/// A named group of game objects
#[derive(Debug)]
pub struct Collection {
    pub name: String,
    pub name_hash: NameHash,
    instances: HashMap<NameHash, GameObject>,
    pending_deletes: Vec<NameHash>,
}

impl Collection {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            name_hash: NameHash::of(name),
            instances: HashMap::new(),
            pending_deletes: Vec::new(),
        }
    }

    /// Add an object; its identity is the hash of its name
    pub fn add(&mut self, object: GameObject) -> NameHash {
        let id = object.id;
        self.instances.insert(id, object);
        id
    }

    pub fn get(&self, id: NameHash) -> Option<&GameObject> {
        self.instances.get(&id)
    }

    pub fn get_mut(&mut self, id: NameHash) -> Option<&mut GameObject> {
        self.instances.get_mut(&id)
    }

    pub fn contains(&self, id: NameHash) -> bool {
        self.instances.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Schedule an object for removal at the next safe point.
    ///
    /// Deletion is deferred so scripts can call `delete()` while the update
    /// pass is iterating; the outer framework drains the list between ticks.
    pub fn schedule_delete(&mut self, id: NameHash) {
        if !self.pending_deletes.contains(&id) {
            self.pending_deletes.push(id);
        }
    }

    /// Drain scheduled deletions, removing the objects
    pub fn flush_deletes(&mut self) -> Vec<NameHash> {
        let pending = std::mem::take(&mut self.pending_deletes);
        for id in &pending {
            self.instances.remove(id);
        }
        pending
    }

    /// Scheduled-but-not-yet-removed deletions
    pub fn pending_deletes(&self) -> &[NameHash] {
        &self.pending_deletes
    }
}

/// A deferred spawn request, queued by the `spawn` script API.
///
/// Spawning is never performed inline; instantiation happens at a safe point
/// in the outer framework's tick.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub collection: CollectionId,
    pub prototype: String,
    pub position: Vec3,
    pub rotation: Quat,
}

/// The collection registry plus the default message and spawn channels
#[derive(Debug, Default)]
pub struct Register {
    collections: Vec<Collection>,
    messages: VecDeque<MessageBuffer>,
    spawns: VecDeque<SpawnRequest>,
}

impl Register {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_collection(&mut self, name: &str) -> CollectionId {
        let id = CollectionId(self.collections.len() as u32);
        self.collections.push(Collection::new(name));
        id
    }

    pub fn collection(&self, id: CollectionId) -> &Collection {
        &self.collections[id.0 as usize]
    }

    pub fn collection_mut(&mut self, id: CollectionId) -> &mut Collection {
        &mut self.collections[id.0 as usize]
    }

    /// Look a collection up by its hashed name
    pub fn find_collection(&self, name_hash: NameHash) -> Option<CollectionId> {
        self.collections
            .iter()
            .position(|c| c.name_hash == name_hash)
            .map(|i| CollectionId(i as u32))
    }

    /// Resolve an instance handle to the object, if it is still alive
    pub fn instance(&self, r: InstanceRef) -> Option<&GameObject> {
        self.collections
            .get(r.collection.0 as usize)
            .and_then(|c| c.get(r.id))
    }

    pub fn instance_mut(&mut self, r: InstanceRef) -> Option<&mut GameObject> {
        self.collections
            .get_mut(r.collection.0 as usize)
            .and_then(|c| c.get_mut(r.id))
    }

    /// Enqueue a message on the default channel (fire-and-forget)
    pub fn post_message(&mut self, buffer: MessageBuffer) {
        self.messages.push_back(buffer);
    }

    /// Enqueue a spawn request on the spawn channel
    pub fn post_spawn(&mut self, request: SpawnRequest) {
        self.spawns.push_back(request);
    }

    /// Dequeue the next posted message, if any
    pub fn poll_message(&mut self) -> Option<MessageBuffer> {
        self.messages.pop_front()
    }

    /// Dequeue the next spawn request, if any
    pub fn poll_spawn(&mut self) -> Option<SpawnRequest> {
        self.spawns.pop_front()
    }

    /// Number of queued messages
    pub fn queued_messages(&self) -> usize {
        self.messages.len()
    }
}
