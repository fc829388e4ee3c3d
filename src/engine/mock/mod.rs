//! In-process engine
//!
//! Implements the whole engine ABI in Rust: an object store, lazy pull
//! evaluation with per-operator result caching, built-in kernels for the
//! operators of the static table, user kernels, and recorded external
//! operators dispatched through the same function pointers a native engine
//! would receive.

pub mod kernels;
pub mod store;

pub use kernels::{builtin_kernels, KernelContext, KernelFn, Slot};
pub use store::{ObjectStore, Payload};

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::{
    CallHandle, Engine, EngineError, EngineErrorKind, EngineHandle, EngineResult,
    ExternalOperatorRecord, OperatorStatus, RawCallback,
};
use crate::types::SemanticTag;

#[derive(Debug, Clone)]
enum Binding {
    Value(Slot),
    Output { producer: EngineHandle, pin: i32 },
}

#[derive(Clone)]
enum Kernel {
    Builtin(KernelFn),
    External(RawCallback),
}

struct OperatorNode {
    name: String,
    kernel: Kernel,
    inputs: BTreeMap<i32, Binding>,
    config: HashMap<String, String>,
    outputs: BTreeMap<i32, Slot>,
    dirty: bool,
    /// Bumped on every recomputation
    generation: u64,
    /// Producer generations the cached outputs were computed from
    upstream_seen: BTreeMap<EngineHandle, u64>,
}

/// State of one recorded-operator invocation
#[derive(Default)]
struct CallFrame {
    inputs: BTreeMap<i32, Slot>,
    outputs: BTreeMap<i32, Slot>,
    status: Option<OperatorStatus>,
    exception: Option<String>,
}

struct EngineState {
    alive: bool,
    objects: ObjectStore,
    operators: HashMap<EngineHandle, OperatorNode>,
    kernels: HashMap<String, KernelFn>,
    external: HashMap<String, ExternalOperatorRecord>,
}

impl EngineState {
    fn check_alive(&self) -> EngineResult<()> {
        if self.alive {
            Ok(())
        } else {
            Err(EngineError::connection_lost())
        }
    }

    fn node(&self, op: EngineHandle) -> EngineResult<&OperatorNode> {
        self.check_alive()?;
        self.operators.get(&op).ok_or_else(|| invalid_operator(op))
    }

    fn node_mut(&mut self, op: EngineHandle) -> EngineResult<&mut OperatorNode> {
        self.check_alive()?;
        self.operators.get_mut(&op).ok_or_else(|| invalid_operator(op))
    }

    fn release_slot(&mut self, slot: &Slot) {
        if let Slot::Object(_, handle) = slot {
            self.objects.release(*handle);
        }
    }

    /// Replace the binding of `pin`, releasing what it held
    fn bind(&mut self, op: EngineHandle, pin: i32, binding: Binding) -> EngineResult<()> {
        let node = self.node_mut(op)?;
        node.dirty = true;
        let previous = node.inputs.insert(pin, binding);
        if let Some(Binding::Value(slot)) = previous {
            self.release_slot(&slot);
        }
        Ok(())
    }
}

fn invalid_operator(op: EngineHandle) -> EngineError {
    EngineError::new(
        EngineErrorKind::InvalidHandle,
        format!("operator {:#x} does not exist", op.0),
    )
}

fn invalid_call(call: CallHandle) -> EngineError {
    EngineError::new(
        EngineErrorKind::InvalidHandle,
        format!("no operator invocation {:#x} is in progress", call.0),
    )
}

/// Engine running inside the client process
pub struct MockEngine {
    state: Mutex<EngineState>,
    calls: Mutex<HashMap<CallHandle, CallFrame>>,
    handles: AtomicUsize,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState {
                alive: true,
                objects: ObjectStore::default(),
                operators: HashMap::new(),
                kernels: builtin_kernels(),
                external: HashMap::new(),
            }),
            calls: Mutex::new(HashMap::new()),
            handles: AtomicUsize::new(0x1000),
        }
    }

    /// Make an extra operator available to `operator_new`
    pub fn register_kernel<F>(&self, internal_name: &str, kernel: F)
    where
        F: Fn(&mut KernelContext<'_>) -> EngineResult<()> + Send + Sync + 'static,
    {
        self.state
            .lock()
            .kernels
            .insert(internal_name.to_string(), Arc::new(kernel));
    }

    /// Number of live engine objects (operators excluded)
    pub fn live_objects(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Number of live operators
    pub fn live_operators(&self) -> usize {
        self.state.lock().operators.len()
    }

    /// How many times the operator has been computed
    pub fn generation(&self, op: EngineHandle) -> Option<u64> {
        let state = self.state.lock();
        state.operators.get(&op).map(|node| node.generation)
    }

    fn next_handle(&self) -> EngineHandle {
        EngineHandle(self.handles.fetch_add(1, Ordering::Relaxed))
    }

    fn new_object(&self, tag: SemanticTag, payload: Payload) -> EngineResult<EngineHandle> {
        let handle = self.next_handle();
        let mut state = self.state.lock();
        state.check_alive()?;
        Ok(state.objects.insert(handle, tag, payload))
    }

    fn connect_slot(&self, op: EngineHandle, pin: i32, slot: Slot) -> EngineResult<()> {
        self.state.lock().bind(op, pin, Binding::Value(slot))
    }

    /// Pull-evaluate `op` and its producers; returns the operator generation
    fn evaluate(&self, op: EngineHandle, visiting: &mut Vec<EngineHandle>) -> EngineResult<u64> {
        if visiting.contains(&op) {
            let state = self.state.lock();
            let name = state.node(op).map(|n| n.name.clone()).unwrap_or_default();
            return Err(EngineError::evaluation(format!(
                "cycle detected: operator '{}' depends on its own output",
                name
            )));
        }

        let producers: Vec<EngineHandle> = {
            let state = self.state.lock();
            state
                .node(op)?
                .inputs
                .values()
                .filter_map(|binding| match binding {
                    Binding::Output { producer, .. } => Some(*producer),
                    Binding::Value(_) => None,
                })
                .collect()
        };

        visiting.push(op);
        let mut seen = BTreeMap::new();
        for producer in producers {
            let generation = self.evaluate(producer, visiting)?;
            seen.insert(producer, generation);
        }
        visiting.pop();

        let mut state = self.state.lock();
        let node = state.node(op)?;
        if !node.dirty && node.generation > 0 && node.upstream_seen == seen {
            trace!(operator = %node.name, generation = node.generation, "cached");
            return Ok(node.generation);
        }

        // Resolve every binding to the value it currently designates
        let mut inputs = BTreeMap::new();
        for (pin, binding) in &node.inputs {
            let slot = match binding {
                Binding::Value(slot) => slot.clone(),
                Binding::Output {
                    producer,
                    pin: producer_pin,
                } => {
                    let upstream = state.node(*producer)?;
                    upstream.outputs.get(producer_pin).cloned().ok_or_else(|| {
                        EngineError::evaluation(format!(
                            "operator '{}' produced nothing on output pin {}",
                            upstream.name, producer_pin
                        ))
                    })?
                }
            };
            inputs.insert(*pin, slot);
        }
        let name = node.name.clone();
        let kernel = node.kernel.clone();
        let config = node.config.clone();
        debug!(operator = %name, "evaluating");

        let outputs = match kernel {
            Kernel::Builtin(kernel) => {
                let EngineState { objects, .. } = &mut *state;
                let mut ctx = KernelContext::new(&name, objects, &self.handles, &inputs, &config);
                match kernel(&mut ctx) {
                    Ok(()) => ctx.into_outputs(),
                    Err(err) => {
                        ctx.discard();
                        return Err(err.during_evaluation());
                    }
                }
            }
            Kernel::External(callback) => {
                // Inputs stay alive while the lock is released
                for slot in inputs.values() {
                    if let Slot::Object(_, handle) = slot {
                        state.objects.retain(*handle);
                    }
                }
                drop(state);
                let result = self.invoke_external(&name, callback, inputs.clone());
                state = self.state.lock();
                for slot in inputs.values() {
                    state.release_slot(slot);
                }
                result?
            }
        };

        let node = state.node_mut(op)?;
        let previous = std::mem::replace(&mut node.outputs, outputs);
        node.dirty = false;
        node.generation += 1;
        node.upstream_seen = seen;
        let generation = node.generation;
        for slot in previous.values() {
            state.release_slot(slot);
        }
        Ok(generation)
    }

    fn invoke_external(
        &self,
        name: &str,
        callback: RawCallback,
        inputs: BTreeMap<i32, Slot>,
    ) -> EngineResult<BTreeMap<i32, Slot>> {
        let call = CallHandle(self.next_handle().0);
        self.calls.lock().insert(
            call,
            CallFrame {
                inputs,
                ..CallFrame::default()
            },
        );

        callback.call(call);

        let frame = self.calls.lock().remove(&call).ok_or_else(|| invalid_call(call))?;
        match frame.status {
            Some(OperatorStatus::Succeeded) => Ok(frame.outputs),
            status => {
                let mut state = self.state.lock();
                for slot in frame.outputs.values() {
                    state.release_slot(slot);
                }
                let message = match (status, frame.exception) {
                    (_, Some(message)) => message,
                    (Some(OperatorStatus::Failed), None) => {
                        format!("custom operator '{}' failed", name)
                    }
                    _ => format!("custom operator '{}' exited without reporting a status", name),
                };
                Err(EngineError::evaluation(message))
            }
        }
    }

    /// Evaluate then read an output slot
    fn output(&self, op: EngineHandle, pin: i32) -> EngineResult<Slot> {
        self.evaluate(op, &mut Vec::new())?;
        let state = self.state.lock();
        let node = state.node(op)?;
        node.outputs.get(&pin).cloned().ok_or_else(|| {
            EngineError::evaluation(format!(
                "operator '{}' produced nothing on output pin {}",
                node.name, pin
            ))
        })
    }

    fn frame_input(&self, call: CallHandle, pin: i32) -> EngineResult<Slot> {
        let calls = self.calls.lock();
        let frame = calls.get(&call).ok_or_else(|| invalid_call(call))?;
        frame.inputs.get(&pin).cloned().ok_or_else(|| {
            EngineError::evaluation(format!("input pin {} is not connected", pin))
        })
    }

    fn frame_output(&self, call: CallHandle, pin: i32, slot: Slot) -> EngineResult<()> {
        let previous = {
            let mut calls = self.calls.lock();
            let frame = calls.get_mut(&call).ok_or_else(|| invalid_call(call))?;
            frame.outputs.insert(pin, slot)
        };
        if let Some(previous) = previous {
            self.state.lock().release_slot(&previous);
        }
        Ok(())
    }

    /// Retain an object slot on behalf of a caller adopting it
    fn hand_out(&self, slot: &Slot, tag: SemanticTag, what: &str) -> EngineResult<(SemanticTag, EngineHandle)> {
        match slot {
            Slot::Object(actual, handle) if tag == SemanticTag::Any || *actual == tag => {
                self.state.lock().objects.retain(*handle);
                Ok((*actual, *handle))
            }
            other => Err(EngineError::type_mismatch(format!(
                "{} holds a {}, not a {}",
                what,
                other.describe(),
                tag
            ))),
        }
    }
}

fn scalar_mismatch(what: &str, expected: &str, slot: &Slot) -> EngineError {
    EngineError::type_mismatch(format!(
        "{} holds a {}, not a {}",
        what,
        slot.describe(),
        expected
    ))
}

fn read_bool(slot: Slot, what: &str) -> EngineResult<bool> {
    match slot {
        Slot::Bool(b) => Ok(b),
        other => Err(scalar_mismatch(what, "bool", &other)),
    }
}

fn read_int(slot: Slot, what: &str) -> EngineResult<i32> {
    match slot {
        Slot::Int(i) => Ok(i),
        other => Err(scalar_mismatch(what, "int32", &other)),
    }
}

fn read_double(slot: Slot, what: &str) -> EngineResult<f64> {
    match slot {
        Slot::Double(d) => Ok(d),
        Slot::Int(i) => Ok(f64::from(i)),
        other => Err(scalar_mismatch(what, "double", &other)),
    }
}

fn read_string(slot: Slot, what: &str) -> EngineResult<String> {
    match slot {
        Slot::String(s) => Ok(s),
        other => Err(scalar_mismatch(what, "string", &other)),
    }
}

impl MockEngine {
    fn read_ints(&self, slot: Slot, what: &str) -> EngineResult<Vec<i32>> {
        match slot {
            Slot::Object(_, handle) => Ok(self.state.lock().objects.ids(handle)?.to_vec()),
            other => Err(scalar_mismatch(what, "collection", &other)),
        }
    }

    fn read_doubles(&self, slot: Slot, what: &str) -> EngineResult<Vec<f64>> {
        match slot {
            Slot::Object(_, handle) => Ok(self.state.lock().objects.doubles(handle)?.to_vec()),
            other => Err(scalar_mismatch(what, "collection", &other)),
        }
    }
}

impl Engine for MockEngine {
    fn description(&self) -> String {
        "in-process DPF engine".to_string()
    }

    fn is_alive(&self) -> bool {
        self.state.lock().alive
    }

    fn shutdown(&self) {
        let mut state = self.state.lock();
        state.alive = false;
        state.operators.clear();
        state.objects.clear();
        self.calls.lock().clear();
    }

    fn available_operators(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut names: Vec<String> = state
            .kernels
            .keys()
            .chain(state.external.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn operator_new(&self, internal_name: &str) -> EngineResult<EngineHandle> {
        let handle = self.next_handle();
        let mut state = self.state.lock();
        state.check_alive()?;
        let kernel = if let Some(record) = state.external.get(internal_name) {
            Kernel::External(record.callback)
        } else if let Some(kernel) = state.kernels.get(internal_name) {
            Kernel::Builtin(kernel.clone())
        } else {
            return Err(EngineError::new(
                EngineErrorKind::UnknownOperator,
                format!("operator '{}' is not available in this engine", internal_name),
            ));
        };
        state.operators.insert(
            handle,
            OperatorNode {
                name: internal_name.to_string(),
                kernel,
                inputs: BTreeMap::new(),
                config: HashMap::new(),
                outputs: BTreeMap::new(),
                dirty: true,
                generation: 0,
                upstream_seen: BTreeMap::new(),
            },
        );
        Ok(handle)
    }

    fn operator_delete(&self, op: EngineHandle) {
        let mut state = self.state.lock();
        if let Some(node) = state.operators.remove(&op) {
            for binding in node.inputs.values() {
                if let Binding::Value(slot) = binding {
                    state.release_slot(slot);
                }
            }
            for slot in node.outputs.values() {
                state.release_slot(slot);
            }
        }
    }

    fn operator_connect_bool(&self, op: EngineHandle, pin: i32, value: bool) -> EngineResult<()> {
        self.connect_slot(op, pin, Slot::Bool(value))
    }

    fn operator_connect_int(&self, op: EngineHandle, pin: i32, value: i32) -> EngineResult<()> {
        self.connect_slot(op, pin, Slot::Int(value))
    }

    fn operator_connect_double(&self, op: EngineHandle, pin: i32, value: f64) -> EngineResult<()> {
        self.connect_slot(op, pin, Slot::Double(value))
    }

    fn operator_connect_string(&self, op: EngineHandle, pin: i32, value: &str) -> EngineResult<()> {
        self.connect_slot(op, pin, Slot::String(value.to_string()))
    }

    fn operator_connect_object(
        &self,
        op: EngineHandle,
        pin: i32,
        tag: SemanticTag,
        object: EngineHandle,
    ) -> EngineResult<()> {
        let mut state = self.state.lock();
        let actual = state.objects.get(object)?.tag;
        if tag != SemanticTag::Any && actual != tag {
            return Err(EngineError::type_mismatch(format!(
                "object {:#x} is a {}, not a {}",
                object.0, actual, tag
            )));
        }
        state.node(op)?;
        state.objects.retain(object);
        state.bind(op, pin, Binding::Value(Slot::Object(actual, object)))
    }

    fn operator_connect_operator_output(
        &self,
        op: EngineHandle,
        pin: i32,
        producer: EngineHandle,
        producer_pin: i32,
    ) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.node(producer)?;
        state.bind(
            op,
            pin,
            Binding::Output {
                producer,
                pin: producer_pin,
            },
        )
    }

    fn operator_get_output_bool(&self, op: EngineHandle, pin: i32) -> EngineResult<bool> {
        read_bool(self.output(op, pin)?, &format!("output pin {}", pin))
    }

    fn operator_get_output_int(&self, op: EngineHandle, pin: i32) -> EngineResult<i32> {
        read_int(self.output(op, pin)?, &format!("output pin {}", pin))
    }

    fn operator_get_output_double(&self, op: EngineHandle, pin: i32) -> EngineResult<f64> {
        read_double(self.output(op, pin)?, &format!("output pin {}", pin))
    }

    fn operator_get_output_string(&self, op: EngineHandle, pin: i32) -> EngineResult<String> {
        read_string(self.output(op, pin)?, &format!("output pin {}", pin))
    }

    fn operator_get_output_int_vector(&self, op: EngineHandle, pin: i32) -> EngineResult<Vec<i32>> {
        let slot = self.output(op, pin)?;
        self.read_ints(slot, &format!("output pin {}", pin))
    }

    fn operator_get_output_double_vector(
        &self,
        op: EngineHandle,
        pin: i32,
    ) -> EngineResult<Vec<f64>> {
        let slot = self.output(op, pin)?;
        self.read_doubles(slot, &format!("output pin {}", pin))
    }

    fn operator_get_output_object(
        &self,
        op: EngineHandle,
        pin: i32,
        tag: SemanticTag,
    ) -> EngineResult<(SemanticTag, EngineHandle)> {
        let slot = self.output(op, pin)?;
        self.hand_out(&slot, tag, &format!("output pin {}", pin))
    }

    fn operator_run(&self, op: EngineHandle) -> EngineResult<()> {
        self.evaluate(op, &mut Vec::new()).map(|_| ())
    }

    fn operator_set_config_option(
        &self,
        op: EngineHandle,
        option: &str,
        value: &str,
    ) -> EngineResult<()> {
        let mut state = self.state.lock();
        let node = state.node_mut(op)?;
        node.config.insert(option.to_string(), value.to_string());
        node.dirty = true;
        Ok(())
    }

    fn object_release(&self, object: EngineHandle) {
        let mut state = self.state.lock();
        if state.alive {
            state.objects.release(object);
        }
    }

    fn collection_of_ints(&self, values: &[i32]) -> EngineResult<EngineHandle> {
        self.new_object(SemanticTag::Collection, Payload::IntCollection(values.to_vec()))
    }

    fn collection_of_doubles(&self, values: &[f64]) -> EngineResult<EngineHandle> {
        self.new_object(SemanticTag::Collection, Payload::DoubleCollection(values.to_vec()))
    }

    fn data_sources_new(&self, result_path: &str) -> EngineResult<EngineHandle> {
        self.new_object(
            SemanticTag::DataSources,
            Payload::DataSources(result_path.to_string()),
        )
    }

    fn data_sources_result_path(&self, data_sources: EngineHandle) -> EngineResult<String> {
        let state = self.state.lock();
        state.check_alive()?;
        match &state.objects.get_tagged(data_sources, SemanticTag::DataSources)?.payload {
            Payload::DataSources(path) => Ok(path.clone()),
            _ => Ok(String::new()),
        }
    }

    fn field_new(&self, data: &[f64]) -> EngineResult<EngineHandle> {
        self.new_object(SemanticTag::Field, Payload::Field(data.to_vec()))
    }

    fn field_data(&self, field: EngineHandle) -> EngineResult<Vec<f64>> {
        let state = self.state.lock();
        state.check_alive()?;
        Ok(state.objects.field_data(field)?.to_vec())
    }

    fn fields_container_new(&self, fields: &[EngineHandle]) -> EngineResult<EngineHandle> {
        let handle = self.next_handle();
        let mut state = self.state.lock();
        state.check_alive()?;
        for field in fields {
            state.objects.get_tagged(*field, SemanticTag::Field)?;
        }
        Ok(state.objects.insert(
            handle,
            SemanticTag::FieldsContainer,
            Payload::FieldsContainer(fields.to_vec()),
        ))
    }

    fn fields_container_fields(&self, container: EngineHandle) -> EngineResult<Vec<EngineHandle>> {
        let mut state = self.state.lock();
        state.check_alive()?;
        let fields = state.objects.container_fields(container)?.to_vec();
        for field in &fields {
            state.objects.retain(*field);
        }
        Ok(fields)
    }

    fn scoping_new(&self, ids: &[i32]) -> EngineResult<EngineHandle> {
        self.new_object(SemanticTag::Scoping, Payload::Scoping(ids.to_vec()))
    }

    fn scoping_ids(&self, scoping: EngineHandle) -> EngineResult<Vec<i32>> {
        let state = self.state.lock();
        state.check_alive()?;
        state.objects.get_tagged(scoping, SemanticTag::Scoping)?;
        Ok(state.objects.ids(scoping)?.to_vec())
    }

    fn external_operator_record(&self, record: ExternalOperatorRecord) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.check_alive()?;
        if state.kernels.contains_key(&record.name) {
            return Err(EngineError::new(
                EngineErrorKind::Unsupported,
                format!("'{}' is a builtin operator and cannot be recorded", record.name),
            ));
        }
        debug!(operator = %record.name, "recording external operator");
        state.external.insert(record.name.clone(), record);
        Ok(())
    }

    fn external_get_in_bool(&self, call: CallHandle, pin: i32) -> EngineResult<bool> {
        read_bool(self.frame_input(call, pin)?, &format!("input pin {}", pin))
    }

    fn external_get_in_int(&self, call: CallHandle, pin: i32) -> EngineResult<i32> {
        read_int(self.frame_input(call, pin)?, &format!("input pin {}", pin))
    }

    fn external_get_in_double(&self, call: CallHandle, pin: i32) -> EngineResult<f64> {
        read_double(self.frame_input(call, pin)?, &format!("input pin {}", pin))
    }

    fn external_get_in_string(&self, call: CallHandle, pin: i32) -> EngineResult<String> {
        read_string(self.frame_input(call, pin)?, &format!("input pin {}", pin))
    }

    fn external_get_in_int_vector(&self, call: CallHandle, pin: i32) -> EngineResult<Vec<i32>> {
        let slot = self.frame_input(call, pin)?;
        self.read_ints(slot, &format!("input pin {}", pin))
    }

    fn external_get_in_double_vector(&self, call: CallHandle, pin: i32) -> EngineResult<Vec<f64>> {
        let slot = self.frame_input(call, pin)?;
        self.read_doubles(slot, &format!("input pin {}", pin))
    }

    fn external_get_in_object(
        &self,
        call: CallHandle,
        pin: i32,
        tag: SemanticTag,
    ) -> EngineResult<(SemanticTag, EngineHandle)> {
        let slot = self.frame_input(call, pin)?;
        self.hand_out(&slot, tag, &format!("input pin {}", pin))
    }

    fn external_put_out_bool(&self, call: CallHandle, pin: i32, value: bool) -> EngineResult<()> {
        self.frame_output(call, pin, Slot::Bool(value))
    }

    fn external_put_out_int(&self, call: CallHandle, pin: i32, value: i32) -> EngineResult<()> {
        self.frame_output(call, pin, Slot::Int(value))
    }

    fn external_put_out_double(&self, call: CallHandle, pin: i32, value: f64) -> EngineResult<()> {
        self.frame_output(call, pin, Slot::Double(value))
    }

    fn external_put_out_string(
        &self,
        call: CallHandle,
        pin: i32,
        value: &str,
    ) -> EngineResult<()> {
        self.frame_output(call, pin, Slot::String(value.to_string()))
    }

    fn external_put_out_object(
        &self,
        call: CallHandle,
        pin: i32,
        tag: SemanticTag,
        object: EngineHandle,
    ) -> EngineResult<()> {
        let actual = {
            let mut state = self.state.lock();
            let actual = state.objects.get(object)?.tag;
            if tag != SemanticTag::Any && actual != tag {
                return Err(EngineError::type_mismatch(format!(
                    "object {:#x} is a {}, not a {}",
                    object.0, actual, tag
                )));
            }
            // The output keeps its own reference
            state.objects.retain(object);
            actual
        };
        self.frame_output(call, pin, Slot::Object(actual, object))
    }

    fn external_put_status(&self, call: CallHandle, status: OperatorStatus) {
        if let Some(frame) = self.calls.lock().get_mut(&call) {
            frame.status = Some(status);
        }
    }

    fn external_put_exception(&self, call: CallHandle, _severity: i32, message: &str) {
        if let Some(frame) = self.calls.lock().get_mut(&call) {
            frame.exception = Some(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_operator() {
        let engine = MockEngine::new();
        let err = engine.operator_new("does_not_exist").unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::UnknownOperator);
    }

    #[test]
    fn test_forward_caches_until_reconnected() {
        let engine = MockEngine::new();
        let op = engine.operator_new("forward_double").unwrap();
        engine.operator_connect_double(op, 0, 1.5).unwrap();
        assert_eq!(engine.operator_get_output_double(op, 0).unwrap(), 1.5);
        assert_eq!(engine.operator_get_output_double(op, 0).unwrap(), 1.5);
        assert_eq!(engine.generation(op), Some(1));

        engine.operator_connect_double(op, 0, 2.5).unwrap();
        assert_eq!(engine.operator_get_output_double(op, 0).unwrap(), 2.5);
        assert_eq!(engine.generation(op), Some(2));
    }

    #[test]
    fn test_upstream_change_invalidates_downstream() {
        let engine = MockEngine::new();
        let a = engine.operator_new("forward_double").unwrap();
        let b = engine.operator_new("forward_double").unwrap();
        engine.operator_connect_double(a, 0, 1.0).unwrap();
        engine.operator_connect_operator_output(b, 0, a, 0).unwrap();
        assert_eq!(engine.operator_get_output_double(b, 0).unwrap(), 1.0);
        engine.operator_connect_double(a, 0, 4.0).unwrap();
        assert_eq!(engine.operator_get_output_double(b, 0).unwrap(), 4.0);
    }

    #[test]
    fn test_cycles_are_rejected_at_evaluation() {
        let engine = MockEngine::new();
        let a = engine.operator_new("forward").unwrap();
        let b = engine.operator_new("forward").unwrap();
        engine.operator_connect_operator_output(a, 0, b, 0).unwrap();
        engine.operator_connect_operator_output(b, 0, a, 0).unwrap();
        let err = engine.operator_run(a).unwrap_err();
        assert!(err.message.contains("cycle detected"));
    }

    #[test]
    fn test_deleting_operators_releases_objects() {
        let engine = MockEngine::new();
        let field = engine.field_new(&[1.0, 2.0]).unwrap();
        let op = engine.operator_new("forward_field").unwrap();
        engine
            .operator_connect_object(op, 0, SemanticTag::Field, field)
            .unwrap();
        engine.operator_run(op).unwrap();
        engine.object_release(field);
        assert_eq!(engine.live_objects(), 1);
        engine.operator_delete(op);
        assert_eq!(engine.live_objects(), 0);
    }

    #[test]
    fn test_shutdown_invalidates_everything() {
        let engine = MockEngine::new();
        let op = engine.operator_new("forward_int32").unwrap();
        engine.shutdown();
        assert!(!engine.is_alive());
        let err = engine.operator_connect_int(op, 0, 1).unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::ConnectionLost);
        let err = engine.operator_new("forward_int32").unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::ConnectionLost);
    }
}
