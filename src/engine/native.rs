//! Binding to the native engine library (`DPFClientAPI`)
//!
//! Every fallible entry point reports through two out-parameters: a status
//! code (0 on success) and an engine-allocated message that is copied and
//! released here.

use std::ffi::{c_char, c_void, CStr, CString};
use std::path::PathBuf;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use super::{
    CallHandle, Engine, EngineError, EngineErrorKind, EngineHandle, EngineResult,
    ExternalOperatorRecord, MainCallback, OperatorStatus,
};
use crate::config::ServerContext;
use crate::types::SemanticTag;

type Code = *mut i32;
type Message = *mut *mut c_char;

#[link(name = "DPFClientAPI")]
extern "C" {
    fn DataProcessing_initialize_with_context(context: i32, code: Code, message: Message);
    fn DataProcessing_description() -> *mut c_char;
    fn DataProcessing_shutdown();
    fn DataProcessing_delete_string(s: *mut c_char);
    fn DataProcessing_free_buffer(buffer: *mut c_void);
    fn DataProcessing_release(object: *mut c_void);
    fn DataProcessing_available_operators(count: *mut i32) -> *mut *mut c_char;

    fn Operator_new(name: *const c_char, code: Code, message: Message) -> *mut c_void;
    fn Operator_delete(op: *mut c_void);
    fn Operator_connect_bool(op: *mut c_void, pin: i32, value: bool, code: Code, message: Message);
    fn Operator_connect_int(op: *mut c_void, pin: i32, value: i32, code: Code, message: Message);
    fn Operator_connect_double(op: *mut c_void, pin: i32, value: f64, code: Code, message: Message);
    fn Operator_connect_string(
        op: *mut c_void,
        pin: i32,
        value: *const c_char,
        code: Code,
        message: Message,
    );
    fn Operator_connect_object(
        op: *mut c_void,
        pin: i32,
        tag: *const c_char,
        object: *mut c_void,
        code: Code,
        message: Message,
    );
    fn Operator_connect_operator_output(
        op: *mut c_void,
        pin: i32,
        producer: *mut c_void,
        producer_pin: i32,
        code: Code,
        message: Message,
    );
    fn Operator_getoutput_bool(op: *mut c_void, pin: i32, code: Code, message: Message) -> bool;
    fn Operator_getoutput_int(op: *mut c_void, pin: i32, code: Code, message: Message) -> i32;
    fn Operator_getoutput_double(op: *mut c_void, pin: i32, code: Code, message: Message) -> f64;
    fn Operator_getoutput_string(
        op: *mut c_void,
        pin: i32,
        code: Code,
        message: Message,
    ) -> *mut c_char;
    fn Operator_getoutput_int_collection(
        op: *mut c_void,
        pin: i32,
        len: *mut i32,
        code: Code,
        message: Message,
    ) -> *mut i32;
    fn Operator_getoutput_double_collection(
        op: *mut c_void,
        pin: i32,
        len: *mut i32,
        code: Code,
        message: Message,
    ) -> *mut f64;
    fn Operator_getoutput_object(
        op: *mut c_void,
        pin: i32,
        tag: *const c_char,
        actual_tag: *mut *mut c_char,
        code: Code,
        message: Message,
    ) -> *mut c_void;
    fn Operator_run(op: *mut c_void, code: Code, message: Message);
    fn Operator_set_config_option(
        op: *mut c_void,
        option: *const c_char,
        value: *const c_char,
        code: Code,
        message: Message,
    );

    fn Collection_OfInt_new(values: *const i32, len: i32, code: Code, message: Message)
        -> *mut c_void;
    fn Collection_OfDouble_new(
        values: *const f64,
        len: i32,
        code: Code,
        message: Message,
    ) -> *mut c_void;
    fn DataSources_new_with_result(path: *const c_char, code: Code, message: Message)
        -> *mut c_void;
    fn DataSources_get_result_file_path(
        ds: *mut c_void,
        code: Code,
        message: Message,
    ) -> *mut c_char;
    fn Field_new_with_data(data: *const f64, len: i32, code: Code, message: Message)
        -> *mut c_void;
    fn Field_get_data(field: *mut c_void, len: *mut i32, code: Code, message: Message)
        -> *mut f64;
    fn FieldsContainer_new(
        fields: *const *mut c_void,
        len: i32,
        code: Code,
        message: Message,
    ) -> *mut c_void;
    fn FieldsContainer_get_fields(
        fc: *mut c_void,
        len: *mut i32,
        code: Code,
        message: Message,
    ) -> *mut *mut c_void;
    fn Scoping_new_with_ids(ids: *const i32, len: i32, code: Code, message: Message)
        -> *mut c_void;
    fn Scoping_get_ids(scoping: *mut c_void, len: *mut i32, code: Code, message: Message)
        -> *mut i32;

    fn ExternalOperator_record(
        data: *mut c_void,
        dispatcher: MainCallback,
        name: *const c_char,
        specification: *const c_char,
        code: Code,
        message: Message,
    );
    fn ExternalOperator_getInBool(call: *mut c_void, pin: i32, code: Code, message: Message)
        -> bool;
    fn ExternalOperator_getInInt(call: *mut c_void, pin: i32, code: Code, message: Message)
        -> i32;
    fn ExternalOperator_getInDouble(call: *mut c_void, pin: i32, code: Code, message: Message)
        -> f64;
    fn ExternalOperator_getInString(
        call: *mut c_void,
        pin: i32,
        code: Code,
        message: Message,
    ) -> *mut c_char;
    fn ExternalOperator_getInIntVector(
        call: *mut c_void,
        pin: i32,
        len: *mut i32,
        code: Code,
        message: Message,
    ) -> *mut i32;
    fn ExternalOperator_getInDoubleVector(
        call: *mut c_void,
        pin: i32,
        len: *mut i32,
        code: Code,
        message: Message,
    ) -> *mut f64;
    fn ExternalOperator_getInObject(
        call: *mut c_void,
        pin: i32,
        tag: *const c_char,
        actual_tag: *mut *mut c_char,
        code: Code,
        message: Message,
    ) -> *mut c_void;
    fn ExternalOperator_putOutBool(call: *mut c_void, pin: i32, value: bool, code: Code, message: Message);
    fn ExternalOperator_putOutInt(call: *mut c_void, pin: i32, value: i32, code: Code, message: Message);
    fn ExternalOperator_putOutDouble(call: *mut c_void, pin: i32, value: f64, code: Code, message: Message);
    fn ExternalOperator_putOutString(
        call: *mut c_void,
        pin: i32,
        value: *const c_char,
        code: Code,
        message: Message,
    );
    fn ExternalOperator_putOutObject(
        call: *mut c_void,
        pin: i32,
        tag: *const c_char,
        object: *mut c_void,
        code: Code,
        message: Message,
    );
    fn ExternalOperator_putStatus(call: *mut c_void, status: i32);
    fn ExternalOperator_putException(call: *mut c_void, severity: i32, message: *const c_char);
}

fn kind_of(code: i32) -> EngineErrorKind {
    match code {
        2 => EngineErrorKind::TypeMismatch,
        3 => EngineErrorKind::UnknownOperator,
        4 => EngineErrorKind::InvalidHandle,
        5 => EngineErrorKind::ConnectionLost,
        6 => EngineErrorKind::Unsupported,
        _ => EngineErrorKind::Evaluation,
    }
}

/// Copy and free an engine-allocated string
fn take_string(s: *mut c_char) -> String {
    if s.is_null() {
        return String::new();
    }
    // SAFETY: non-null strings returned by the engine are NUL terminated and
    // owned by the caller until `DataProcessing_delete_string`.
    let owned = unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned();
    unsafe { DataProcessing_delete_string(s) };
    owned
}

/// Copy and free an engine-allocated buffer of `len` elements
fn take_buffer<T: Copy>(buffer: *mut T, len: i32) -> Vec<T> {
    if buffer.is_null() || len <= 0 {
        return Vec::new();
    }
    // SAFETY: the engine returned `len` initialised elements at `buffer`.
    let values = unsafe { std::slice::from_raw_parts(buffer, len as usize) }.to_vec();
    unsafe { DataProcessing_free_buffer(buffer.cast()) };
    values
}

fn c_string(s: &str) -> EngineResult<CString> {
    CString::new(s).map_err(|_| {
        EngineError::evaluation(format!("string contains an interior NUL byte: {:?}", s))
    })
}

fn ptr_of(handle: EngineHandle) -> *mut c_void {
    handle.0 as *mut c_void
}

fn call_ptr(call: CallHandle) -> *mut c_void {
    call.0 as *mut c_void
}

fn handle_of(ptr: *mut c_void) -> EngineResult<EngineHandle> {
    if ptr.is_null() {
        Err(EngineError::evaluation("the engine returned a null object"))
    } else {
        Ok(EngineHandle(ptr as usize))
    }
}

fn tag_from_engine(actual: *mut c_char, requested: SemanticTag) -> SemanticTag {
    let name = take_string(actual);
    name.parse().unwrap_or(requested)
}

/// Engine backed by the shared library
pub struct NativeEngine {
    alive: AtomicBool,
    engine_path: Option<PathBuf>,
}

impl NativeEngine {
    pub fn start(engine_path: Option<PathBuf>, context: ServerContext) -> EngineResult<Self> {
        let engine = Self {
            alive: AtomicBool::new(true),
            engine_path,
        };
        let context = match context {
            ServerContext::Entry => 0,
            ServerContext::Premium => 1,
        };
        engine.call(|code, message| unsafe {
            DataProcessing_initialize_with_context(context, code, message)
        })?;
        info!(path = ?engine.engine_path, "native engine initialised");
        Ok(engine)
    }

    /// Run one fallible entry point, converting its status out-parameters
    fn call<T>(&self, f: impl FnOnce(Code, Message) -> T) -> EngineResult<T> {
        if !self.alive.load(Ordering::Acquire) {
            return Err(EngineError::connection_lost());
        }
        let mut code = 0i32;
        let mut message: *mut c_char = ptr::null_mut();
        let out = f(&mut code, &mut message);
        if code == 0 {
            return Ok(out);
        }
        let kind = kind_of(code);
        if kind == EngineErrorKind::ConnectionLost {
            self.alive.store(false, Ordering::Release);
        }
        Err(EngineError::new(kind, take_string(message)))
    }
}

impl Engine for NativeEngine {
    fn description(&self) -> String {
        // SAFETY: returns an owned string or null
        take_string(unsafe { DataProcessing_description() })
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn shutdown(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            unsafe { DataProcessing_shutdown() };
        }
    }

    fn available_operators(&self) -> Vec<String> {
        let mut count = 0i32;
        // SAFETY: returns `count` owned strings in an owned buffer
        let names = unsafe { DataProcessing_available_operators(&mut count) };
        take_buffer(names, count).into_iter().map(take_string).collect()
    }

    fn operator_new(&self, internal_name: &str) -> EngineResult<EngineHandle> {
        let name = c_string(internal_name)?;
        let op = self.call(|code, message| unsafe { Operator_new(name.as_ptr(), code, message) })?;
        debug!(operator = internal_name, "native operator created");
        handle_of(op)
    }

    fn operator_delete(&self, op: EngineHandle) {
        if self.is_alive() {
            unsafe { Operator_delete(ptr_of(op)) };
        }
    }

    fn operator_connect_bool(&self, op: EngineHandle, pin: i32, value: bool) -> EngineResult<()> {
        self.call(|code, message| unsafe {
            Operator_connect_bool(ptr_of(op), pin, value, code, message)
        })
    }

    fn operator_connect_int(&self, op: EngineHandle, pin: i32, value: i32) -> EngineResult<()> {
        self.call(|code, message| unsafe {
            Operator_connect_int(ptr_of(op), pin, value, code, message)
        })
    }

    fn operator_connect_double(&self, op: EngineHandle, pin: i32, value: f64) -> EngineResult<()> {
        self.call(|code, message| unsafe {
            Operator_connect_double(ptr_of(op), pin, value, code, message)
        })
    }

    fn operator_connect_string(&self, op: EngineHandle, pin: i32, value: &str) -> EngineResult<()> {
        let value = c_string(value)?;
        self.call(|code, message| unsafe {
            Operator_connect_string(ptr_of(op), pin, value.as_ptr(), code, message)
        })
    }

    fn operator_connect_object(
        &self,
        op: EngineHandle,
        pin: i32,
        tag: SemanticTag,
        object: EngineHandle,
    ) -> EngineResult<()> {
        let tag = c_string(tag.name())?;
        self.call(|code, message| unsafe {
            Operator_connect_object(ptr_of(op), pin, tag.as_ptr(), ptr_of(object), code, message)
        })
    }

    fn operator_connect_operator_output(
        &self,
        op: EngineHandle,
        pin: i32,
        producer: EngineHandle,
        producer_pin: i32,
    ) -> EngineResult<()> {
        self.call(|code, message| unsafe {
            Operator_connect_operator_output(
                ptr_of(op),
                pin,
                ptr_of(producer),
                producer_pin,
                code,
                message,
            )
        })
    }

    fn operator_get_output_bool(&self, op: EngineHandle, pin: i32) -> EngineResult<bool> {
        self.call(|code, message| unsafe { Operator_getoutput_bool(ptr_of(op), pin, code, message) })
    }

    fn operator_get_output_int(&self, op: EngineHandle, pin: i32) -> EngineResult<i32> {
        self.call(|code, message| unsafe { Operator_getoutput_int(ptr_of(op), pin, code, message) })
    }

    fn operator_get_output_double(&self, op: EngineHandle, pin: i32) -> EngineResult<f64> {
        self.call(|code, message| unsafe {
            Operator_getoutput_double(ptr_of(op), pin, code, message)
        })
    }

    fn operator_get_output_string(&self, op: EngineHandle, pin: i32) -> EngineResult<String> {
        let s = self.call(|code, message| unsafe {
            Operator_getoutput_string(ptr_of(op), pin, code, message)
        })?;
        Ok(take_string(s))
    }

    fn operator_get_output_int_vector(&self, op: EngineHandle, pin: i32) -> EngineResult<Vec<i32>> {
        let mut len = 0i32;
        let buffer = self.call(|code, message| unsafe {
            Operator_getoutput_int_collection(ptr_of(op), pin, &mut len, code, message)
        })?;
        Ok(take_buffer(buffer, len))
    }

    fn operator_get_output_double_vector(
        &self,
        op: EngineHandle,
        pin: i32,
    ) -> EngineResult<Vec<f64>> {
        let mut len = 0i32;
        let buffer = self.call(|code, message| unsafe {
            Operator_getoutput_double_collection(ptr_of(op), pin, &mut len, code, message)
        })?;
        Ok(take_buffer(buffer, len))
    }

    fn operator_get_output_object(
        &self,
        op: EngineHandle,
        pin: i32,
        tag: SemanticTag,
    ) -> EngineResult<(SemanticTag, EngineHandle)> {
        let requested = c_string(tag.name())?;
        let mut actual: *mut c_char = ptr::null_mut();
        let object = self.call(|code, message| unsafe {
            Operator_getoutput_object(
                ptr_of(op),
                pin,
                requested.as_ptr(),
                &mut actual,
                code,
                message,
            )
        })?;
        Ok((tag_from_engine(actual, tag), handle_of(object)?))
    }

    fn operator_run(&self, op: EngineHandle) -> EngineResult<()> {
        self.call(|code, message| unsafe { Operator_run(ptr_of(op), code, message) })
    }

    fn operator_set_config_option(
        &self,
        op: EngineHandle,
        option: &str,
        value: &str,
    ) -> EngineResult<()> {
        let option = c_string(option)?;
        let value = c_string(value)?;
        self.call(|code, message| unsafe {
            Operator_set_config_option(ptr_of(op), option.as_ptr(), value.as_ptr(), code, message)
        })
    }

    fn object_release(&self, object: EngineHandle) {
        if self.is_alive() {
            unsafe { DataProcessing_release(ptr_of(object)) };
        }
    }

    fn collection_of_ints(&self, values: &[i32]) -> EngineResult<EngineHandle> {
        let object = self.call(|code, message| unsafe {
            Collection_OfInt_new(values.as_ptr(), values.len() as i32, code, message)
        })?;
        handle_of(object)
    }

    fn collection_of_doubles(&self, values: &[f64]) -> EngineResult<EngineHandle> {
        let object = self.call(|code, message| unsafe {
            Collection_OfDouble_new(values.as_ptr(), values.len() as i32, code, message)
        })?;
        handle_of(object)
    }

    fn data_sources_new(&self, result_path: &str) -> EngineResult<EngineHandle> {
        let path = c_string(result_path)?;
        let object = self.call(|code, message| unsafe {
            DataSources_new_with_result(path.as_ptr(), code, message)
        })?;
        handle_of(object)
    }

    fn data_sources_result_path(&self, data_sources: EngineHandle) -> EngineResult<String> {
        let s = self.call(|code, message| unsafe {
            DataSources_get_result_file_path(ptr_of(data_sources), code, message)
        })?;
        Ok(take_string(s))
    }

    fn field_new(&self, data: &[f64]) -> EngineResult<EngineHandle> {
        let object = self.call(|code, message| unsafe {
            Field_new_with_data(data.as_ptr(), data.len() as i32, code, message)
        })?;
        handle_of(object)
    }

    fn field_data(&self, field: EngineHandle) -> EngineResult<Vec<f64>> {
        let mut len = 0i32;
        let buffer = self.call(|code, message| unsafe {
            Field_get_data(ptr_of(field), &mut len, code, message)
        })?;
        Ok(take_buffer(buffer, len))
    }

    fn fields_container_new(&self, fields: &[EngineHandle]) -> EngineResult<EngineHandle> {
        let pointers: Vec<*mut c_void> = fields.iter().map(|f| ptr_of(*f)).collect();
        let object = self.call(|code, message| unsafe {
            FieldsContainer_new(pointers.as_ptr(), pointers.len() as i32, code, message)
        })?;
        handle_of(object)
    }

    fn fields_container_fields(&self, container: EngineHandle) -> EngineResult<Vec<EngineHandle>> {
        let mut len = 0i32;
        let buffer = self.call(|code, message| unsafe {
            FieldsContainer_get_fields(ptr_of(container), &mut len, code, message)
        })?;
        take_buffer(buffer, len).into_iter().map(handle_of).collect()
    }

    fn scoping_new(&self, ids: &[i32]) -> EngineResult<EngineHandle> {
        let object = self.call(|code, message| unsafe {
            Scoping_new_with_ids(ids.as_ptr(), ids.len() as i32, code, message)
        })?;
        handle_of(object)
    }

    fn scoping_ids(&self, scoping: EngineHandle) -> EngineResult<Vec<i32>> {
        let mut len = 0i32;
        let buffer = self.call(|code, message| unsafe {
            Scoping_get_ids(ptr_of(scoping), &mut len, code, message)
        })?;
        Ok(take_buffer(buffer, len))
    }

    fn external_operator_record(&self, record: ExternalOperatorRecord) -> EngineResult<()> {
        let name = c_string(&record.name)?;
        let json = record
            .specification
            .to_json()
            .map_err(|e| EngineError::evaluation(e.to_string()))?;
        let specification = c_string(&json)?;
        self.call(|code, message| unsafe {
            ExternalOperator_record(
                record.callback.data as *mut c_void,
                record.callback.dispatcher,
                name.as_ptr(),
                specification.as_ptr(),
                code,
                message,
            )
        })
    }

    fn external_get_in_bool(&self, call: CallHandle, pin: i32) -> EngineResult<bool> {
        self.call(|code, message| unsafe {
            ExternalOperator_getInBool(call_ptr(call), pin, code, message)
        })
    }

    fn external_get_in_int(&self, call: CallHandle, pin: i32) -> EngineResult<i32> {
        self.call(|code, message| unsafe {
            ExternalOperator_getInInt(call_ptr(call), pin, code, message)
        })
    }

    fn external_get_in_double(&self, call: CallHandle, pin: i32) -> EngineResult<f64> {
        self.call(|code, message| unsafe {
            ExternalOperator_getInDouble(call_ptr(call), pin, code, message)
        })
    }

    fn external_get_in_string(&self, call: CallHandle, pin: i32) -> EngineResult<String> {
        let s = self.call(|code, message| unsafe {
            ExternalOperator_getInString(call_ptr(call), pin, code, message)
        })?;
        Ok(take_string(s))
    }

    fn external_get_in_int_vector(&self, call: CallHandle, pin: i32) -> EngineResult<Vec<i32>> {
        let mut len = 0i32;
        let buffer = self.call(|code, message| unsafe {
            ExternalOperator_getInIntVector(call_ptr(call), pin, &mut len, code, message)
        })?;
        Ok(take_buffer(buffer, len))
    }

    fn external_get_in_double_vector(&self, call: CallHandle, pin: i32) -> EngineResult<Vec<f64>> {
        let mut len = 0i32;
        let buffer = self.call(|code, message| unsafe {
            ExternalOperator_getInDoubleVector(call_ptr(call), pin, &mut len, code, message)
        })?;
        Ok(take_buffer(buffer, len))
    }

    fn external_get_in_object(
        &self,
        call: CallHandle,
        pin: i32,
        tag: SemanticTag,
    ) -> EngineResult<(SemanticTag, EngineHandle)> {
        let requested = c_string(tag.name())?;
        let mut actual: *mut c_char = ptr::null_mut();
        let object = self.call(|code, message| unsafe {
            ExternalOperator_getInObject(
                call_ptr(call),
                pin,
                requested.as_ptr(),
                &mut actual,
                code,
                message,
            )
        })?;
        Ok((tag_from_engine(actual, tag), handle_of(object)?))
    }

    fn external_put_out_bool(&self, call: CallHandle, pin: i32, value: bool) -> EngineResult<()> {
        self.call(|code, message| unsafe {
            ExternalOperator_putOutBool(call_ptr(call), pin, value, code, message)
        })
    }

    fn external_put_out_int(&self, call: CallHandle, pin: i32, value: i32) -> EngineResult<()> {
        self.call(|code, message| unsafe {
            ExternalOperator_putOutInt(call_ptr(call), pin, value, code, message)
        })
    }

    fn external_put_out_double(&self, call: CallHandle, pin: i32, value: f64) -> EngineResult<()> {
        self.call(|code, message| unsafe {
            ExternalOperator_putOutDouble(call_ptr(call), pin, value, code, message)
        })
    }

    fn external_put_out_string(
        &self,
        call: CallHandle,
        pin: i32,
        value: &str,
    ) -> EngineResult<()> {
        let value = c_string(value)?;
        self.call(|code, message| unsafe {
            ExternalOperator_putOutString(call_ptr(call), pin, value.as_ptr(), code, message)
        })
    }

    fn external_put_out_object(
        &self,
        call: CallHandle,
        pin: i32,
        tag: SemanticTag,
        object: EngineHandle,
    ) -> EngineResult<()> {
        let tag = c_string(tag.name())?;
        self.call(|code, message| unsafe {
            ExternalOperator_putOutObject(
                call_ptr(call),
                pin,
                tag.as_ptr(),
                ptr_of(object),
                code,
                message,
            )
        })
    }

    fn external_put_status(&self, call: CallHandle, status: OperatorStatus) {
        unsafe { ExternalOperator_putStatus(call_ptr(call), status as i32) };
    }

    fn external_put_exception(&self, call: CallHandle, severity: i32, message: &str) {
        // Interior NULs cannot cross the ABI; keep the text readable
        let text = CString::new(message.replace('\0', " ")).unwrap_or_default();
        unsafe { ExternalOperator_putException(call_ptr(call), severity, text.as_ptr()) };
    }
}
