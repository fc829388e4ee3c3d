use std::fmt;
use std::ops::{Range, RangeInclusive};
use std::sync::Arc;

use crate::engine::{Engine, EngineHandle};
use crate::error::{DpfError, Result};

use super::SemanticTag;

/// A value that can be bound to an operator pin or read back from one
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Double(f64),
    String(String),
    /// Marshalled as an engine-side collection
    IntVec(Vec<i32>),
    DoubleVec(Vec<f64>),
    Object(ObjectRef),
}

impl Value {
    /// Semantic tag of this value, see [`super::host_value_to_tag`]
    pub fn tag(&self) -> SemanticTag {
        super::host_value_to_tag(self)
    }

    /// Short description of the host kind, for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::IntVec(_) => "list of int",
            Value::DoubleVec(_) => "list of double",
            Value::Object(obj) => obj.tag().name(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Doubles, and ints widened to double
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Int(i) => Some(f64::from(*i)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int_vec(&self) -> Option<&[i32]> {
        match self {
            Value::IntVec(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double_vec(&self) -> Option<&[f64]> {
        match self {
            Value::DoubleVec(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Consume into an object handle, failing with a type mismatch otherwise
    pub fn into_object(self) -> Result<ObjectRef> {
        match self {
            Value::Object(obj) => Ok(obj),
            other => Err(DpfError::TypeMismatch(format!(
                "expected an engine object, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Consume into an object handle of exactly `tag`
    pub fn into_object_of(self, tag: SemanticTag) -> Result<ObjectRef> {
        let obj = self.into_object()?;
        if obj.tag() != tag {
            return Err(DpfError::TypeMismatch(format!(
                "expected {}, got {}",
                tag,
                obj.tag()
            )));
        }
        Ok(obj)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{:?}", s),
            Value::IntVec(v) => write!(f, "{:?}", v),
            Value::DoubleVec(v) => write!(f, "{:?}", v),
            Value::Object(obj) => write!(f, "{}", obj),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::IntVec(v)
    }
}

impl From<&[i32]> for Value {
    fn from(v: &[i32]) -> Self {
        Value::IntVec(v.to_vec())
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::DoubleVec(v)
    }
}

impl From<&[f64]> for Value {
    fn from(v: &[f64]) -> Self {
        Value::DoubleVec(v.to_vec())
    }
}

// Ranges are materialised into concrete ordered sequences
impl From<Range<i32>> for Value {
    fn from(v: Range<i32>) -> Self {
        Value::IntVec(v.collect())
    }
}

impl From<RangeInclusive<i32>> for Value {
    fn from(v: RangeInclusive<i32>) -> Self {
        Value::IntVec(v.collect())
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl From<&ObjectRef> for Value {
    fn from(v: &ObjectRef) -> Self {
        Value::Object(v.clone())
    }
}

/// Counted reference to an engine-side object (field, scoping, data sources...)
///
/// Cloning shares the same engine reference; the engine reference is
/// released when the last clone drops. Equality is identity.
#[derive(Clone)]
pub struct ObjectRef {
    inner: Arc<ObjectInner>,
}

struct ObjectInner {
    tag: SemanticTag,
    handle: EngineHandle,
    engine: Arc<dyn Engine>,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        self.engine.object_release(self.handle);
    }
}

impl ObjectRef {
    /// Adopt one engine reference to `handle`; it is released on drop
    pub(crate) fn adopt(engine: Arc<dyn Engine>, tag: SemanticTag, handle: EngineHandle) -> Self {
        Self {
            inner: Arc::new(ObjectInner { tag, handle, engine }),
        }
    }

    pub fn tag(&self) -> SemanticTag {
        self.inner.tag
    }

    pub fn handle(&self) -> EngineHandle {
        self.inner.handle
    }

    pub fn is(&self, tag: SemanticTag) -> bool {
        self.inner.tag == tag
    }

    /// True when the object lives in `engine`
    pub fn belongs_to(&self, engine: &Arc<dyn Engine>) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.inner.engine) as *const (),
            Arc::as_ptr(engine) as *const (),
        )
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.inner.tag == other.inner.tag && self.inner.handle == other.inner.handle
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("tag", &self.inner.tag)
            .field("handle", &self.inner.handle)
            .finish()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} #{}>", self.inner.tag, self.inner.handle.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_become_sequences() {
        assert_eq!(Value::from(1..4), Value::IntVec(vec![1, 2, 3]));
        assert_eq!(Value::from(1..=3), Value::IntVec(vec![1, 2, 3]));
    }

    #[test]
    fn test_int_widens_to_double_but_not_back() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Double(3.0).as_int(), None);
    }

    #[test]
    fn test_into_object_rejects_scalars() {
        let err = Value::Bool(true).into_object().unwrap_err();
        assert!(matches!(err, DpfError::TypeMismatch(_)));
    }
}
