//! The engine ABI consumed by the client
//!
//! [`Engine`] mirrors the C surface of the native library: an operator API
//! (`new`, `connect_<kind>`, `get_output_<kind>`, `run`, `delete`), an
//! external-operator API used while a recorded operator is being evaluated,
//! and the handful of object entry points the core needs. Two
//! implementations exist: [`mock::MockEngine`] runs in process, and
//! `native::NativeEngine` (feature `native`) calls the shared library.

pub mod mock;
#[cfg(feature = "native")]
pub mod native;

use std::ffi::c_void;
use thiserror::Error;

use crate::spec::OperatorSpecification;
use crate::types::SemanticTag;

/// Opaque engine pointer to an operator or an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineHandle(pub usize);

/// Opaque per-invocation pointer handed to a recorded operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    UnknownOperator,
    TypeMismatch,
    Evaluation,
    InvalidHandle,
    Unsupported,
    ConnectionLost,
}

/// Error reported by the engine; `message` is kept verbatim
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Evaluation, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::TypeMismatch, message)
    }

    /// Reclassify an error raised while an operator computes; only a lost
    /// connection keeps its kind
    pub fn during_evaluation(self) -> Self {
        match self.kind {
            EngineErrorKind::ConnectionLost | EngineErrorKind::Evaluation => self,
            _ => Self::evaluation(self.message),
        }
    }

    pub fn connection_lost() -> Self {
        Self::new(EngineErrorKind::ConnectionLost, "the engine is no longer running")
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Status a recorded operator reports at the end of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum OperatorStatus {
    Succeeded = 0,
    Failed = 1,
}

/// Severity code passed with `put_exception`
pub const SEVERITY_ERROR: i32 = 2;

/// Signature of the fixed dispatcher the engine calls for recorded operators:
/// `(callback_data, per_invocation_operator)`
pub type MainCallback = extern "C" fn(*mut c_void, *mut c_void);

/// Function pointer pair handed to the engine when recording an operator
#[derive(Debug, Clone, Copy)]
pub struct RawCallback {
    pub dispatcher: MainCallback,
    pub data: *const c_void,
}

// SAFETY: `data` points into a slot of the process-wide recorded-operator
// list, which is never pruned and whose contents are Send + Sync.
unsafe impl Send for RawCallback {}
unsafe impl Sync for RawCallback {}

impl RawCallback {
    /// Invoke the dispatcher for one evaluation
    pub fn call(&self, call: CallHandle) {
        (self.dispatcher)(self.data as *mut c_void, call.0 as *mut c_void);
    }
}

/// Everything the engine needs to host a user operator
#[derive(Debug, Clone)]
pub struct ExternalOperatorRecord {
    pub name: String,
    pub specification: OperatorSpecification,
    pub callback: RawCallback,
}

/// C ABI surface of the DPF engine
pub trait Engine: Send + Sync {
    /// Human readable description (version, location)
    fn description(&self) -> String;

    /// False once the engine has been shut down or lost
    fn is_alive(&self) -> bool;

    /// Invalidate every handle; later calls fail with `ConnectionLost`
    fn shutdown(&self);

    /// Internal names of every operator the engine can instantiate
    fn available_operators(&self) -> Vec<String>;

    // Operator API

    fn operator_new(&self, internal_name: &str) -> EngineResult<EngineHandle>;
    fn operator_delete(&self, op: EngineHandle);
    fn operator_connect_bool(&self, op: EngineHandle, pin: i32, value: bool) -> EngineResult<()>;
    fn operator_connect_int(&self, op: EngineHandle, pin: i32, value: i32) -> EngineResult<()>;
    fn operator_connect_double(&self, op: EngineHandle, pin: i32, value: f64) -> EngineResult<()>;
    fn operator_connect_string(&self, op: EngineHandle, pin: i32, value: &str) -> EngineResult<()>;
    fn operator_connect_object(
        &self,
        op: EngineHandle,
        pin: i32,
        tag: SemanticTag,
        object: EngineHandle,
    ) -> EngineResult<()>;
    fn operator_connect_operator_output(
        &self,
        op: EngineHandle,
        pin: i32,
        producer: EngineHandle,
        producer_pin: i32,
    ) -> EngineResult<()>;

    fn operator_get_output_bool(&self, op: EngineHandle, pin: i32) -> EngineResult<bool>;
    fn operator_get_output_int(&self, op: EngineHandle, pin: i32) -> EngineResult<i32>;
    fn operator_get_output_double(&self, op: EngineHandle, pin: i32) -> EngineResult<f64>;
    fn operator_get_output_string(&self, op: EngineHandle, pin: i32) -> EngineResult<String>;
    fn operator_get_output_int_vector(&self, op: EngineHandle, pin: i32) -> EngineResult<Vec<i32>>;
    fn operator_get_output_double_vector(&self, op: EngineHandle, pin: i32)
        -> EngineResult<Vec<f64>>;
    /// Read an object output; `SemanticTag::Any` returns whatever is there.
    /// The returned handle carries one reference owned by the caller.
    fn operator_get_output_object(
        &self,
        op: EngineHandle,
        pin: i32,
        tag: SemanticTag,
    ) -> EngineResult<(SemanticTag, EngineHandle)>;

    /// Evaluate the operator and everything upstream of it
    fn operator_run(&self, op: EngineHandle) -> EngineResult<()>;
    fn operator_set_config_option(
        &self,
        op: EngineHandle,
        option: &str,
        value: &str,
    ) -> EngineResult<()>;

    // Objects

    fn object_release(&self, object: EngineHandle);
    fn collection_of_ints(&self, values: &[i32]) -> EngineResult<EngineHandle>;
    fn collection_of_doubles(&self, values: &[f64]) -> EngineResult<EngineHandle>;
    fn data_sources_new(&self, result_path: &str) -> EngineResult<EngineHandle>;
    fn data_sources_result_path(&self, data_sources: EngineHandle) -> EngineResult<String>;
    fn field_new(&self, data: &[f64]) -> EngineResult<EngineHandle>;
    fn field_data(&self, field: EngineHandle) -> EngineResult<Vec<f64>>;
    fn fields_container_new(&self, fields: &[EngineHandle]) -> EngineResult<EngineHandle>;
    /// Fields of a container; every returned handle carries one reference
    fn fields_container_fields(&self, container: EngineHandle) -> EngineResult<Vec<EngineHandle>>;
    fn scoping_new(&self, ids: &[i32]) -> EngineResult<EngineHandle>;
    fn scoping_ids(&self, scoping: EngineHandle) -> EngineResult<Vec<i32>>;

    // External-operator API

    fn external_operator_record(&self, record: ExternalOperatorRecord) -> EngineResult<()>;
    fn external_get_in_bool(&self, call: CallHandle, pin: i32) -> EngineResult<bool>;
    fn external_get_in_int(&self, call: CallHandle, pin: i32) -> EngineResult<i32>;
    fn external_get_in_double(&self, call: CallHandle, pin: i32) -> EngineResult<f64>;
    fn external_get_in_string(&self, call: CallHandle, pin: i32) -> EngineResult<String>;
    fn external_get_in_int_vector(&self, call: CallHandle, pin: i32) -> EngineResult<Vec<i32>>;
    fn external_get_in_double_vector(&self, call: CallHandle, pin: i32) -> EngineResult<Vec<f64>>;
    fn external_get_in_object(
        &self,
        call: CallHandle,
        pin: i32,
        tag: SemanticTag,
    ) -> EngineResult<(SemanticTag, EngineHandle)>;
    fn external_put_out_bool(&self, call: CallHandle, pin: i32, value: bool) -> EngineResult<()>;
    fn external_put_out_int(&self, call: CallHandle, pin: i32, value: i32) -> EngineResult<()>;
    fn external_put_out_double(&self, call: CallHandle, pin: i32, value: f64) -> EngineResult<()>;
    fn external_put_out_string(&self, call: CallHandle, pin: i32, value: &str)
        -> EngineResult<()>;
    fn external_put_out_object(
        &self,
        call: CallHandle,
        pin: i32,
        tag: SemanticTag,
        object: EngineHandle,
    ) -> EngineResult<()>;
    fn external_put_status(&self, call: CallHandle, status: OperatorStatus);
    fn external_put_exception(&self, call: CallHandle, severity: i32, message: &str);
}
