//! Marshalling gateway
//!
//! A process-wide table maps every semantic tag to the engine entry points
//! that move a value of that tag across the ABI, per direction:
//!
//! - `connect`: bind a host value to an operator input pin
//! - `get_output`: read an operator output pin (evaluates the operator)
//! - `get_in`: read an input of a recorded operator during its invocation
//! - `put_out`: write an output of a recorded operator during its invocation
//!
//! A missing entry means the engine exposes no entry point for that
//! combination; the gateway then fails with
//! [`DpfError::UnsupportedMarshalling`] without calling the engine.

use std::sync::Arc;
use tracing::trace;

use crate::engine::{CallHandle, Engine, EngineHandle};
use crate::error::{DpfError, Result};
use crate::types::{Direction, ObjectRef, SemanticTag, Value};

type ConnectFn = fn(&Arc<dyn Engine>, EngineHandle, i32, SemanticTag, &Value) -> Result<()>;
type GetOutputFn = fn(&Arc<dyn Engine>, EngineHandle, i32, SemanticTag) -> Result<Value>;
type GetInFn = fn(&Arc<dyn Engine>, CallHandle, i32, SemanticTag) -> Result<Value>;
type PutOutFn = fn(&Arc<dyn Engine>, CallHandle, i32, SemanticTag, &Value) -> Result<()>;

/// Engine entry points for one semantic tag
pub struct TypeEntry {
    pub tag: SemanticTag,
    connect: Option<ConnectFn>,
    get_output: Option<GetOutputFn>,
    get_in: Option<GetInFn>,
    put_out: Option<PutOutFn>,
}

impl TypeEntry {
    const fn scalar(tag: SemanticTag) -> Self {
        Self {
            tag,
            connect: Some(connect_scalar),
            get_output: Some(get_output_scalar),
            get_in: Some(get_in_scalar),
            put_out: Some(put_out_scalar),
        }
    }

    const fn object(tag: SemanticTag) -> Self {
        Self {
            tag,
            connect: Some(connect_object),
            get_output: Some(get_output_object),
            get_in: Some(get_in_object),
            put_out: Some(put_out_object),
        }
    }

    /// Objects the engine can produce but not receive
    const fn output_only(tag: SemanticTag) -> Self {
        Self {
            tag,
            connect: None,
            get_output: Some(get_output_object),
            get_in: None,
            put_out: Some(put_out_object),
        }
    }

    /// Whether the entry can move a value in `direction`
    ///
    /// Inputs are `connect` on an operator; outputs are `get_output`.
    pub fn supports(&self, direction: Direction) -> bool {
        match direction {
            Direction::Input => self.connect.is_some(),
            Direction::Output => self.get_output.is_some(),
        }
    }
}

static TYPE_TABLE: [TypeEntry; 22] = [
    TypeEntry::scalar(SemanticTag::Bool),
    TypeEntry::scalar(SemanticTag::Int32),
    TypeEntry::scalar(SemanticTag::Double),
    TypeEntry::scalar(SemanticTag::String),
    TypeEntry::object(SemanticTag::FieldsContainer),
    TypeEntry::object(SemanticTag::ScopingsContainer),
    TypeEntry::object(SemanticTag::MeshesContainer),
    TypeEntry::object(SemanticTag::StreamsContainer),
    TypeEntry::object(SemanticTag::Field),
    TypeEntry::object(SemanticTag::PropertyField),
    TypeEntry::object(SemanticTag::StringField),
    TypeEntry::object(SemanticTag::Scoping),
    TypeEntry::object(SemanticTag::Collection),
    TypeEntry::object(SemanticTag::DataSources),
    TypeEntry::object(SemanticTag::MeshedRegion),
    TypeEntry::output_only(SemanticTag::ResultInfo),
    TypeEntry::object(SemanticTag::TimeFreqSupport),
    TypeEntry::object(SemanticTag::Workflow),
    TypeEntry::object(SemanticTag::DataTree),
    TypeEntry::output_only(SemanticTag::Operator),
    TypeEntry::output_only(SemanticTag::CyclicSupport),
    TypeEntry {
        tag: SemanticTag::Any,
        connect: Some(connect_any),
        get_output: Some(get_output_any),
        get_in: Some(get_in_any),
        put_out: Some(put_out_any),
    },
];

/// Table entry for `tag`
pub fn entry(tag: SemanticTag) -> &'static TypeEntry {
    TYPE_TABLE
        .iter()
        .find(|entry| entry.tag == tag)
        .unwrap_or(&TYPE_TABLE[TYPE_TABLE.len() - 1])
}

fn unsupported(tag: SemanticTag, direction: Direction) -> DpfError {
    DpfError::UnsupportedMarshalling { tag, direction }
}

fn kind_mismatch(tag: SemanticTag, value: &Value) -> DpfError {
    DpfError::TypeMismatch(format!("cannot marshal a {} as {}", value.kind_name(), tag))
}

/// Engine handle of an object value, checking it lives in `engine`
fn object_handle(engine: &Arc<dyn Engine>, tag: SemanticTag, value: &Value) -> Result<EngineHandle> {
    match value {
        Value::Object(obj) if obj.belongs_to(engine) => Ok(obj.handle()),
        Value::Object(obj) => Err(DpfError::Engine(format!(
            "{} belongs to another server",
            obj
        ))),
        other => Err(kind_mismatch(tag, other)),
    }
}

/// Build an engine-side collection from a host sequence
fn make_collection(engine: &Arc<dyn Engine>, value: &Value) -> Result<Option<ObjectRef>> {
    let handle = match value {
        Value::IntVec(values) => engine.collection_of_ints(values)?,
        Value::DoubleVec(values) => engine.collection_of_doubles(values)?,
        _ => return Ok(None),
    };
    Ok(Some(ObjectRef::adopt(
        engine.clone(),
        SemanticTag::Collection,
        handle,
    )))
}

fn connect_scalar(
    engine: &Arc<dyn Engine>,
    op: EngineHandle,
    pin: i32,
    tag: SemanticTag,
    value: &Value,
) -> Result<()> {
    match (tag, value) {
        (SemanticTag::Bool, Value::Bool(v)) => engine.operator_connect_bool(op, pin, *v)?,
        (SemanticTag::Int32, Value::Int(v)) => engine.operator_connect_int(op, pin, *v)?,
        (SemanticTag::Double, Value::Double(v)) => engine.operator_connect_double(op, pin, *v)?,
        (SemanticTag::String, Value::String(v)) => engine.operator_connect_string(op, pin, v)?,
        (tag, other) => return Err(kind_mismatch(tag, other)),
    }
    Ok(())
}

fn connect_object(
    engine: &Arc<dyn Engine>,
    op: EngineHandle,
    pin: i32,
    tag: SemanticTag,
    value: &Value,
) -> Result<()> {
    // The temporary collection is retained by the engine on connect
    if let Some(collection) = make_collection(engine, value)? {
        engine.operator_connect_object(op, pin, SemanticTag::Collection, collection.handle())?;
        return Ok(());
    }
    let handle = object_handle(engine, tag, value)?;
    engine.operator_connect_object(op, pin, tag, handle)?;
    Ok(())
}

fn connect_any(
    engine: &Arc<dyn Engine>,
    op: EngineHandle,
    pin: i32,
    _tag: SemanticTag,
    value: &Value,
) -> Result<()> {
    connect(engine, op, pin, value)
}

fn get_output_scalar(
    engine: &Arc<dyn Engine>,
    op: EngineHandle,
    pin: i32,
    tag: SemanticTag,
) -> Result<Value> {
    Ok(match tag {
        SemanticTag::Bool => Value::Bool(engine.operator_get_output_bool(op, pin)?),
        SemanticTag::Int32 => Value::Int(engine.operator_get_output_int(op, pin)?),
        SemanticTag::Double => Value::Double(engine.operator_get_output_double(op, pin)?),
        _ => Value::String(engine.operator_get_output_string(op, pin)?),
    })
}

fn get_output_object(
    engine: &Arc<dyn Engine>,
    op: EngineHandle,
    pin: i32,
    tag: SemanticTag,
) -> Result<Value> {
    let (actual, handle) = engine.operator_get_output_object(op, pin, tag)?;
    Ok(Value::Object(ObjectRef::adopt(engine.clone(), actual, handle)))
}

/// Objects first, then scalars in probe order
fn get_output_any(
    engine: &Arc<dyn Engine>,
    op: EngineHandle,
    pin: i32,
    _tag: SemanticTag,
) -> Result<Value> {
    match get_output_object(engine, op, pin, SemanticTag::Any) {
        Err(DpfError::TypeMismatch(_)) => {}
        other => return other,
    }
    for tag in [
        SemanticTag::Bool,
        SemanticTag::Int32,
        SemanticTag::Double,
        SemanticTag::String,
    ] {
        match get_output_scalar(engine, op, pin, tag) {
            Err(DpfError::TypeMismatch(_)) => continue,
            other => return other,
        }
    }
    Err(DpfError::TypeMismatch(format!(
        "output pin {} holds no value of a known kind",
        pin
    )))
}

fn get_in_scalar(
    engine: &Arc<dyn Engine>,
    call: CallHandle,
    pin: i32,
    tag: SemanticTag,
) -> Result<Value> {
    Ok(match tag {
        SemanticTag::Bool => Value::Bool(engine.external_get_in_bool(call, pin)?),
        SemanticTag::Int32 => Value::Int(engine.external_get_in_int(call, pin)?),
        SemanticTag::Double => Value::Double(engine.external_get_in_double(call, pin)?),
        _ => Value::String(engine.external_get_in_string(call, pin)?),
    })
}

fn get_in_object(
    engine: &Arc<dyn Engine>,
    call: CallHandle,
    pin: i32,
    tag: SemanticTag,
) -> Result<Value> {
    let (actual, handle) = engine.external_get_in_object(call, pin, tag)?;
    Ok(Value::Object(ObjectRef::adopt(engine.clone(), actual, handle)))
}

fn get_in_any(
    engine: &Arc<dyn Engine>,
    call: CallHandle,
    pin: i32,
    _tag: SemanticTag,
) -> Result<Value> {
    match get_in_object(engine, call, pin, SemanticTag::Any) {
        Err(DpfError::TypeMismatch(_)) => {}
        other => return other,
    }
    for tag in [
        SemanticTag::Bool,
        SemanticTag::Int32,
        SemanticTag::Double,
        SemanticTag::String,
    ] {
        match get_in_scalar(engine, call, pin, tag) {
            Err(DpfError::TypeMismatch(_)) => continue,
            other => return other,
        }
    }
    Err(DpfError::TypeMismatch(format!(
        "input pin {} holds no value of a known kind",
        pin
    )))
}

fn put_out_scalar(
    engine: &Arc<dyn Engine>,
    call: CallHandle,
    pin: i32,
    tag: SemanticTag,
    value: &Value,
) -> Result<()> {
    match (tag, value) {
        (SemanticTag::Bool, Value::Bool(v)) => engine.external_put_out_bool(call, pin, *v)?,
        (SemanticTag::Int32, Value::Int(v)) => engine.external_put_out_int(call, pin, *v)?,
        (SemanticTag::Double, Value::Double(v)) => engine.external_put_out_double(call, pin, *v)?,
        (SemanticTag::String, Value::String(v)) => engine.external_put_out_string(call, pin, v)?,
        (tag, other) => return Err(kind_mismatch(tag, other)),
    }
    Ok(())
}

fn put_out_object(
    engine: &Arc<dyn Engine>,
    call: CallHandle,
    pin: i32,
    tag: SemanticTag,
    value: &Value,
) -> Result<()> {
    if let Some(collection) = make_collection(engine, value)? {
        engine.external_put_out_object(call, pin, SemanticTag::Collection, collection.handle())?;
        return Ok(());
    }
    let handle = object_handle(engine, tag, value)?;
    engine.external_put_out_object(call, pin, tag, handle)?;
    Ok(())
}

fn put_out_any(
    engine: &Arc<dyn Engine>,
    call: CallHandle,
    pin: i32,
    _tag: SemanticTag,
    value: &Value,
) -> Result<()> {
    let tag = value.tag();
    if tag == SemanticTag::Any {
        return Err(kind_mismatch(tag, value));
    }
    tag_to_output(engine, call, pin, tag, value)
}

/// Bind `value` to input `pin` of operator `op`, choosing the entry by the
/// value's kind
pub fn connect(engine: &Arc<dyn Engine>, op: EngineHandle, pin: i32, value: &Value) -> Result<()> {
    let tag = value.tag();
    if tag == SemanticTag::Any {
        return Err(kind_mismatch(tag, value));
    }
    trace!(pin, %tag, "connect");
    let connect = entry(tag)
        .connect
        .ok_or_else(|| unsupported(tag, Direction::Input))?;
    connect(engine, op, pin, tag, value)
}

/// Read output `pin` of operator `op` as `tag`
pub fn get_output(
    engine: &Arc<dyn Engine>,
    op: EngineHandle,
    pin: i32,
    tag: SemanticTag,
) -> Result<Value> {
    trace!(pin, %tag, "get_output");
    let get_output = entry(tag)
        .get_output
        .ok_or_else(|| unsupported(tag, Direction::Output))?;
    get_output(engine, op, pin, tag)
}

/// Read an integer collection output straight into a host vector
pub fn get_output_ints(engine: &Arc<dyn Engine>, op: EngineHandle, pin: i32) -> Result<Vec<i32>> {
    Ok(engine.operator_get_output_int_vector(op, pin)?)
}

pub fn get_output_doubles(engine: &Arc<dyn Engine>, op: EngineHandle, pin: i32) -> Result<Vec<f64>> {
    Ok(engine.operator_get_output_double_vector(op, pin)?)
}

/// Read input `pin` of the recorded operator invocation `call` as `tag`
pub fn tag_to_input(
    engine: &Arc<dyn Engine>,
    call: CallHandle,
    pin: i32,
    tag: SemanticTag,
) -> Result<Value> {
    trace!(pin, %tag, "get_in");
    let get_in = entry(tag)
        .get_in
        .ok_or_else(|| unsupported(tag, Direction::Input))?;
    get_in(engine, call, pin, tag)
}

/// Write `value` to output `pin` of the recorded operator invocation `call`
pub fn tag_to_output(
    engine: &Arc<dyn Engine>,
    call: CallHandle,
    pin: i32,
    tag: SemanticTag,
    value: &Value,
) -> Result<()> {
    trace!(pin, %tag, "put_out");
    let put_out = entry(tag)
        .put_out
        .ok_or_else(|| unsupported(tag, Direction::Output))?;
    put_out(engine, call, pin, tag, value)
}

/// Integer and double sequences read from a recorded operator input
pub fn get_in_ints(engine: &Arc<dyn Engine>, call: CallHandle, pin: i32) -> Result<Vec<i32>> {
    Ok(engine.external_get_in_int_vector(call, pin)?)
}

pub fn get_in_doubles(engine: &Arc<dyn Engine>, call: CallHandle, pin: i32) -> Result<Vec<f64>> {
    Ok(engine.external_get_in_double_vector(call, pin)?)
}
