//! Operator instances and their typed pin bindings
//!
//! An [`Operator`] owns one engine-side operator. Its [`Inputs`] and
//! [`Outputs`] façades borrow the instance and expose every pin of the
//! specification by name; consumers keep their producers alive through the
//! recorded connections, so instances are released bottom-up.

pub mod arith;
pub mod config;
pub mod inputs;
pub mod outputs;
pub mod resolve;
pub mod state;

pub use config::OperatorConfig;
pub use inputs::{ConnectArg, Input, Inputs};
pub use outputs::{Output, Outputs};
pub use state::OperatorState;

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::engine::EngineHandle;
use crate::error::{DpfError, Result};
use crate::marshal;
use crate::server::{self, Server};
use crate::spec::OperatorSpecification;
use crate::types::{SemanticTag, Value};

/// What is bound to an input pin
#[derive(Debug, Clone)]
pub enum Connection {
    Value(Value),
    /// Output `pin` of `producer`
    Output { producer: Operator, pin: i32 },
}

impl Connection {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Connection::Value(value) => Some(value),
            Connection::Output { .. } => None,
        }
    }

    pub fn producer(&self) -> Option<(&Operator, i32)> {
        match self {
            Connection::Output { producer, pin } => Some((producer, *pin)),
            Connection::Value(_) => None,
        }
    }
}

#[derive(Default)]
struct InstanceState {
    connected: BTreeMap<i32, Connection>,
    /// Connections made on each ellipsis family, keyed by base pin
    ellipsis: BTreeMap<i32, usize>,
    lifecycle: OperatorState,
    config: OperatorConfig,
}

struct OperatorInner {
    handle: EngineHandle,
    server: Arc<Server>,
    spec: Arc<OperatorSpecification>,
    state: Mutex<InstanceState>,
}

impl Drop for OperatorInner {
    fn drop(&mut self) {
        self.server.engine().operator_delete(self.handle);
    }
}

/// Live operator bound to one engine-side handle
///
/// Clones share the instance.
#[derive(Clone)]
pub struct Operator {
    inner: Arc<OperatorInner>,
}

impl Operator {
    /// Instantiate a registered operator on the process-wide server
    pub fn new(internal_name: &str) -> Result<Self> {
        Self::with_server(internal_name, &server::global()?)
    }

    /// Instantiate a registered operator, or one recorded on `server`
    pub fn with_server(internal_name: &str, server: &Arc<Server>) -> Result<Self> {
        let spec = server.specification(internal_name)?;
        Self::from_specification(spec, server)
    }

    /// Instantiate from an explicit specification
    pub fn from_specification(spec: Arc<OperatorSpecification>, server: &Arc<Server>) -> Result<Self> {
        server.check_alive()?;
        let handle = server.engine().operator_new(&spec.internal_name)?;
        debug!(operator = %spec.internal_name, handle = handle.0, "instantiated");

        let ellipsis = spec
            .inputs
            .iter()
            .filter(|(_, pin)| pin.ellipsis)
            .map(|(index, _)| (*index, 0))
            .collect();
        Ok(Self {
            inner: Arc::new(OperatorInner {
                handle,
                server: server.clone(),
                spec,
                state: Mutex::new(InstanceState {
                    ellipsis,
                    ..InstanceState::default()
                }),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.spec.internal_name
    }

    pub fn specification(&self) -> &OperatorSpecification {
        &self.inner.spec
    }

    pub fn server(&self) -> &Arc<Server> {
        &self.inner.server
    }

    pub fn handle(&self) -> EngineHandle {
        self.inner.handle
    }

    pub fn state(&self) -> OperatorState {
        self.inner.state.lock().lifecycle
    }

    /// True when both values designate the same instance
    pub fn same_instance(&self, other: &Operator) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn inputs(&self) -> Inputs<'_> {
        Inputs::new(self)
    }

    pub fn outputs(&self) -> Outputs<'_> {
        Outputs::new(self)
    }

    /// Connect `value` to input `pin`
    pub fn connect<'b>(&self, pin: i32, value: impl Into<ConnectArg<'b>>) -> Result<()> {
        self.inputs().by_index(pin)?.connect(value)
    }

    /// Read output `pin` as `tag`, evaluating the operator
    pub fn get_output(&self, pin: i32, tag: SemanticTag) -> Result<Value> {
        self.outputs().by_index(pin)?.get_as(tag)
    }

    /// Evaluate the operator and its producers without reading an output
    pub fn run(&self) -> Result<()> {
        self.inner.server.engine().operator_run(self.inner.handle)?;
        self.inner.state.lock().lifecycle.advance(OperatorState::Evaluated);
        Ok(())
    }

    /// Snapshot of every bound input pin
    pub fn connected_inputs(&self) -> BTreeMap<i32, Connection> {
        self.inner.state.lock().connected.clone()
    }

    pub fn connection(&self, pin: i32) -> Option<Connection> {
        self.inner.state.lock().connected.get(&pin).cloned()
    }

    /// Push `config` to the engine; options already set are kept
    pub fn set_config(&self, config: &OperatorConfig) -> Result<()> {
        let engine = self.inner.server.engine();
        for (name, value) in &config.options {
            engine.operator_set_config_option(self.inner.handle, name, value)?;
        }
        let mut state = self.inner.state.lock();
        for (name, value) in &config.options {
            state.config.set(name.clone(), value);
        }
        state.lifecycle.advance(OperatorState::Connecting);
        Ok(())
    }

    pub fn config(&self) -> OperatorConfig {
        self.inner.state.lock().config.clone()
    }

    /// Connections made so far on the ellipsis family starting at `base`
    pub(crate) fn ellipsis_count(&self, base: i32) -> Option<usize> {
        self.inner.state.lock().ellipsis.get(&base).copied()
    }

    pub(crate) fn ellipsis_families(&self) -> BTreeMap<i32, usize> {
        self.inner.state.lock().ellipsis.clone()
    }

    /// Pin a connection aimed at `pin` lands on: a bound member of an
    /// ellipsis family forwards to the family's next free slot
    pub(crate) fn target_pin(&self, pin: i32, base: i32) -> i32 {
        let state = self.inner.state.lock();
        match state.ellipsis.get(&base) {
            Some(count) if state.connected.contains_key(&pin) => base + *count as i32,
            _ => pin,
        }
    }

    /// Marshal `value` onto `pin` and record the edge
    pub(crate) fn bind_value(&self, pin: i32, base: i32, value: Value) -> Result<()> {
        marshal::connect(self.inner.server.engine(), self.inner.handle, pin, &value)?;
        debug!(operator = %self.name(), pin, value = %value, "connected value");
        self.record(pin, base, Connection::Value(value));
        Ok(())
    }

    /// Wire output `producer_pin` of `producer` onto `pin` and record the edge
    pub(crate) fn bind_output(
        &self,
        pin: i32,
        base: i32,
        producer: &Operator,
        producer_pin: i32,
    ) -> Result<()> {
        if !Arc::ptr_eq(&self.inner.server, &producer.inner.server) {
            return Err(DpfError::Engine(format!(
                "'{}' and '{}' live on different servers",
                self.name(),
                producer.name()
            )));
        }
        self.inner.server.engine().operator_connect_operator_output(
            self.inner.handle,
            pin,
            producer.inner.handle,
            producer_pin,
        )?;
        debug!(
            operator = %self.name(),
            pin,
            producer = %producer.name(),
            producer_pin,
            "connected output"
        );
        self.record(
            pin,
            base,
            Connection::Output {
                producer: producer.clone(),
                pin: producer_pin,
            },
        );
        Ok(())
    }

    fn record(&self, pin: i32, base: i32, connection: Connection) {
        let mut state = self.inner.state.lock();
        state.connected.insert(pin, connection);
        if let Some(count) = state.ellipsis.get_mut(&base) {
            if pin == base + *count as i32 {
                *count += 1;
            }
        }
        state.lifecycle.advance(OperatorState::Connecting);
    }

    /// Read output `pin` through the gateway
    pub(crate) fn read_output(&self, pin: i32, tag: SemanticTag) -> Result<Value> {
        let value = marshal::get_output(self.inner.server.engine(), self.inner.handle, pin, tag)?;
        debug!(operator = %self.name(), pin, %tag, "read output");
        self.inner.state.lock().lifecycle.advance(OperatorState::Evaluated);
        Ok(value)
    }

    pub(crate) fn read_ints(&self, pin: i32) -> Result<Vec<i32>> {
        let values = marshal::get_output_ints(self.inner.server.engine(), self.inner.handle, pin)?;
        self.inner.state.lock().lifecycle.advance(OperatorState::Evaluated);
        Ok(values)
    }

    pub(crate) fn read_doubles(&self, pin: i32) -> Result<Vec<f64>> {
        let values = marshal::get_output_doubles(self.inner.server.engine(), self.inner.handle, pin)?;
        self.inner.state.lock().lifecycle.advance(OperatorState::Evaluated);
        Ok(values)
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("name", &self.inner.spec.internal_name)
            .field("handle", &self.inner.handle)
            .finish()
    }
}

/// The specification help page
impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_operator_is_rejected_before_the_engine() {
        let server = Server::in_process();
        let err = Operator::with_server("not_an_operator", &server).unwrap_err();
        assert!(matches!(err, DpfError::UnknownOperator(_)));
    }

    #[test]
    fn test_lifecycle_follows_connections() {
        let server = Server::in_process();
        let op = Operator::with_server("forward_double", &server).unwrap();
        assert_eq!(op.state(), OperatorState::Constructed);
        op.connect(0, 1.5).unwrap();
        assert_eq!(op.state(), OperatorState::Connecting);
        assert_eq!(op.get_output(0, SemanticTag::Double).unwrap(), Value::Double(1.5));
        assert_eq!(op.state(), OperatorState::Evaluated);
        op.connect(0, 2.5).unwrap();
        assert_eq!(op.state(), OperatorState::Connecting);
    }

    #[test]
    fn test_config_is_pushed_and_kept() {
        let server = Server::in_process();
        let op = Operator::with_server("forward_int32", &server).unwrap();
        op.set_config(&OperatorConfig::new().num_threads(2)).unwrap();
        assert_eq!(op.config().get("num_threads"), Some("2"));
    }

    #[test]
    fn test_instances_are_deleted_on_drop() {
        let engine = Arc::new(crate::engine::mock::MockEngine::new());
        let server = Server::with_engine(engine.clone(), Default::default());
        let producer = Operator::with_server("forward_double", &server).unwrap();
        let consumer = Operator::with_server("forward_double", &server).unwrap();
        consumer.connect(0, producer.outputs()).unwrap();
        assert_eq!(engine.live_operators(), 2);
        drop(producer);
        assert_eq!(engine.live_operators(), 2);
        drop(consumer);
        assert_eq!(engine.live_operators(), 0);
    }
}
