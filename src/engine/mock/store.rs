use std::collections::HashMap;

use crate::engine::{EngineError, EngineErrorKind, EngineHandle, EngineResult};
use crate::types::SemanticTag;

/// Content of an engine-side object
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Field(Vec<f64>),
    FieldsContainer(Vec<EngineHandle>),
    Scoping(Vec<i32>),
    IntCollection(Vec<i32>),
    DoubleCollection(Vec<f64>),
    DataSources(String),
    MeshedRegion { source: String },
    /// Objects the in-process engine only tracks by identity
    Opaque,
}

impl Payload {
    fn children(&self) -> &[EngineHandle] {
        match self {
            Payload::FieldsContainer(fields) => fields,
            _ => &[],
        }
    }
}

#[derive(Debug)]
pub struct StoredObject {
    pub tag: SemanticTag,
    pub payload: Payload,
    refs: usize,
}

/// Reference-counted object table
#[derive(Debug, Default)]
pub struct ObjectStore {
    objects: HashMap<EngineHandle, StoredObject>,
}

impl ObjectStore {
    /// Store a new object holding one reference; containers retain their children
    pub fn insert(&mut self, handle: EngineHandle, tag: SemanticTag, payload: Payload) -> EngineHandle {
        for child in payload.children() {
            self.retain(*child);
        }
        self.objects.insert(
            handle,
            StoredObject {
                tag,
                payload,
                refs: 1,
            },
        );
        handle
    }

    pub fn get(&self, handle: EngineHandle) -> EngineResult<&StoredObject> {
        self.objects.get(&handle).ok_or_else(|| {
            EngineError::new(
                EngineErrorKind::InvalidHandle,
                format!("object {:#x} does not exist", handle.0),
            )
        })
    }

    /// Object of exactly `tag`
    pub fn get_tagged(&self, handle: EngineHandle, tag: SemanticTag) -> EngineResult<&StoredObject> {
        let object = self.get(handle)?;
        if object.tag != tag {
            return Err(EngineError::type_mismatch(format!(
                "object {:#x} is a {}, not a {}",
                handle.0, object.tag, tag
            )));
        }
        Ok(object)
    }

    pub fn retain(&mut self, handle: EngineHandle) {
        if let Some(object) = self.objects.get_mut(&handle) {
            object.refs += 1;
        }
    }

    pub fn release(&mut self, handle: EngineHandle) {
        let Some(object) = self.objects.get_mut(&handle) else {
            return;
        };
        object.refs -= 1;
        if object.refs > 0 {
            return;
        }
        if let Some(removed) = self.objects.remove(&handle) {
            for child in removed.payload.children() {
                self.release(*child);
            }
        }
    }

    pub fn contains(&self, handle: EngineHandle) -> bool {
        self.objects.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn field_data(&self, handle: EngineHandle) -> EngineResult<&[f64]> {
        match &self.get_tagged(handle, SemanticTag::Field)?.payload {
            Payload::Field(data) => Ok(data),
            other => Err(EngineError::evaluation(format!(
                "field {:#x} has no data ({:?})",
                handle.0, other
            ))),
        }
    }

    pub fn container_fields(&self, handle: EngineHandle) -> EngineResult<&[EngineHandle]> {
        match &self.get_tagged(handle, SemanticTag::FieldsContainer)?.payload {
            Payload::FieldsContainer(fields) => Ok(fields),
            other => Err(EngineError::evaluation(format!(
                "fields container {:#x} is malformed ({:?})",
                handle.0, other
            ))),
        }
    }

    /// Integer ids of a scoping or an int collection
    pub fn ids(&self, handle: EngineHandle) -> EngineResult<&[i32]> {
        match &self.get(handle)?.payload {
            Payload::Scoping(ids) | Payload::IntCollection(ids) => Ok(ids),
            _ => Err(EngineError::type_mismatch(format!(
                "object {:#x} does not hold integers",
                handle.0
            ))),
        }
    }

    pub fn doubles(&self, handle: EngineHandle) -> EngineResult<&[f64]> {
        match &self.get(handle)?.payload {
            Payload::DoubleCollection(values) | Payload::Field(values) => Ok(values),
            _ => Err(EngineError::type_mismatch(format!(
                "object {:#x} does not hold doubles",
                handle.0
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_frees_at_zero() {
        let mut store = ObjectStore::default();
        let h = store.insert(EngineHandle(1), SemanticTag::Field, Payload::Field(vec![1.0]));
        store.retain(h);
        store.release(h);
        assert!(store.contains(h));
        store.release(h);
        assert!(!store.contains(h));
    }

    #[test]
    fn test_container_keeps_children_alive() {
        let mut store = ObjectStore::default();
        let f = store.insert(EngineHandle(1), SemanticTag::Field, Payload::Field(vec![1.0]));
        let fc = store.insert(
            EngineHandle(2),
            SemanticTag::FieldsContainer,
            Payload::FieldsContainer(vec![f]),
        );
        store.release(f);
        assert!(store.contains(f));
        store.release(fc);
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_tagged_reports_mismatch() {
        let mut store = ObjectStore::default();
        let h = store.insert(EngineHandle(1), SemanticTag::Scoping, Payload::Scoping(vec![1]));
        let err = store.get_tagged(h, SemanticTag::Field).unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::TypeMismatch);
    }
}
