//! Object database trait.
//!
//! The pack writer and the checkout code only need to put and get whole
//! objects by id; both the loose-object store and the in-memory store
//! implement this interface.

use crate::{format_object, ObjectId, ObjectType, Result};
use bytes::Bytes;
use std::sync::Arc;

/// A content-addressed object database.
pub trait ObjectDatabase: Send + Sync {
    /// Stores already-formatted object bytes (`"{type} {len}\0{content}"`)
    /// and returns their id. Storing an existing id is a no-op.
    fn write_raw(&self, formatted: &[u8]) -> Result<ObjectId>;

    /// Reads an object back as its type and content.
    fn read(&self, id: &ObjectId) -> Result<(ObjectType, Bytes)>;

    /// Checks if an object exists.
    fn contains(&self, id: &ObjectId) -> Result<bool>;

    /// Formats and stores an object.
    fn write(&self, object_type: ObjectType, content: &[u8]) -> Result<ObjectId> {
        self.write_raw(&format_object(object_type, content))
    }
}

impl<T: ObjectDatabase + ?Sized> ObjectDatabase for &T {
    fn write_raw(&self, formatted: &[u8]) -> Result<ObjectId> {
        (**self).write_raw(formatted)
    }

    fn read(&self, id: &ObjectId) -> Result<(ObjectType, Bytes)> {
        (**self).read(id)
    }

    fn contains(&self, id: &ObjectId) -> Result<bool> {
        (**self).contains(id)
    }
}

impl<T: ObjectDatabase + ?Sized> ObjectDatabase for Arc<T> {
    fn write_raw(&self, formatted: &[u8]) -> Result<ObjectId> {
        (**self).write_raw(formatted)
    }

    fn read(&self, id: &ObjectId) -> Result<(ObjectType, Bytes)> {
        (**self).read(id)
    }

    fn contains(&self, id: &ObjectId) -> Result<bool> {
        (**self).contains(id)
    }
}
