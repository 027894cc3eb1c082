//! In-memory object store.

use crate::{parse_object, ObjectDatabase, ObjectId, ObjectType, Result, StorageError};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Content-addressed object store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    /// Objects indexed by their SHA-1 hash.
    objects: RwLock<HashMap<ObjectId, (ObjectType, Bytes)>>,
}

impl MemoryObjectStore {
    /// Creates a new empty object store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of objects in the store.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Lists all object IDs.
    pub fn list_objects(&self) -> Vec<ObjectId> {
        self.objects.read().keys().copied().collect()
    }
}

impl ObjectDatabase for MemoryObjectStore {
    fn write_raw(&self, formatted: &[u8]) -> Result<ObjectId> {
        let id = ObjectId::hash(formatted);
        if self.objects.read().contains_key(&id) {
            return Ok(id);
        }
        let (object_type, content) = parse_object(formatted)?;
        self.objects
            .write()
            .entry(id)
            .or_insert_with(|| (object_type, Bytes::copy_from_slice(content)));
        Ok(id)
    }

    fn read(&self, id: &ObjectId) -> Result<(ObjectType, Bytes)> {
        self.objects
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NoSuchObject(id.to_hex()))
    }

    fn contains(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.objects.read().contains_key(id))
    }
}
