use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::any::Any;
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{CustomOperator, OperatorContext};
use crate::engine::{CallHandle, ExternalOperatorRecord, OperatorStatus, RawCallback, SEVERITY_ERROR};
use crate::error::{DpfError, Result};
use crate::server::{self, Server};
use crate::spec::OperatorSpecification;

/// Factory submitted by `#[derive(CustomOperator)]`
pub struct RegisteredOperator(pub fn() -> Box<dyn CustomOperator>);

inventory::collect!(RegisteredOperator);

/// Everything the dispatcher needs for one recorded operator
struct RecordedSlot {
    name: String,
    specification: OperatorSpecification,
    server: Arc<Server>,
    instance: Mutex<Box<dyn CustomOperator>>,
}

/// Slots handed to engines; the engine keeps raw pointers into them, so the
/// list only ever grows
static RECORDED: Lazy<Mutex<Vec<Arc<RecordedSlot>>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Record `operator` on the process-wide server, starting it if needed
pub fn record_operator<T: CustomOperator>(operator: T) -> Result<()> {
    record_operator_on(&server::global()?, operator)
}

/// Record `operator` on `server`
///
/// The operator becomes instantiable on `server` only, once its engine has
/// accepted it.
pub fn record_operator_on<T: CustomOperator>(server: &Arc<Server>, operator: T) -> Result<()> {
    record_boxed(server, Box::new(operator))
}

/// Record every operator submitted through `#[derive(CustomOperator)]`
pub fn record_registered_operators(server: &Arc<Server>) -> Result<()> {
    for registered in inventory::iter::<RegisteredOperator> {
        record_boxed(server, (registered.0)())?;
    }
    Ok(())
}

/// Names of every operator recorded so far, on any server
pub fn recorded_operators() -> Vec<String> {
    RECORDED.lock().iter().map(|slot| slot.name.clone()).collect()
}

fn record_boxed(server: &Arc<Server>, operator: Box<dyn CustomOperator>) -> Result<()> {
    server.check_alive()?;
    let name = operator.name().to_string();
    if name.is_empty() {
        return Err(DpfError::Config("custom operator name is empty".to_string()));
    }
    let mut specification = operator.specification();
    specification.internal_name = name.clone();

    let slot = Arc::new(RecordedSlot {
        name: name.clone(),
        specification: specification.clone(),
        server: server.clone(),
        instance: Mutex::new(operator),
    });
    let callback = RawCallback {
        dispatcher: operator_main_callback,
        data: Arc::as_ptr(&slot) as *const c_void,
    };
    server.engine().external_operator_record(ExternalOperatorRecord {
        name: name.clone(),
        specification: specification.clone(),
        callback,
    })?;
    // From here on the engine holds a pointer into the slot
    RECORDED.lock().push(slot);
    server.add_recorded(specification);
    info!(operator = %name, "recorded custom operator");
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Dispatcher the engine calls for every evaluation of a recorded operator
///
/// `data` is the slot pointer handed over at recording, `call` the
/// per-invocation handle.
pub extern "C" fn operator_main_callback(data: *mut c_void, call: *mut c_void) {
    if data.is_null() {
        return;
    }
    // SAFETY: `data` was produced by `Arc::as_ptr` on a slot kept alive in
    // `RECORDED` for the rest of the process.
    let slot = unsafe { &*(data as *const RecordedSlot) };
    let call = CallHandle(call as usize);
    let engine = slot.server.engine();
    debug!(operator = %slot.name, call = call.0, "custom operator entered");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut instance = slot.instance.lock();
        let mut ctx = OperatorContext::new(&slot.server, &slot.specification, call);
        instance.run(&mut ctx)
    }));

    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(format!("{:?}", err)),
        Err(payload) => Some(format!(
            "custom operator '{}' panicked: {}",
            slot.name,
            panic_message(payload.as_ref())
        )),
    };
    match failure {
        None => engine.external_put_status(call, OperatorStatus::Succeeded),
        Some(text) => {
            warn!(operator = %slot.name, error = %text, "custom operator failed");
            engine.external_put_exception(call, SEVERITY_ERROR, &text);
            engine.external_put_status(call, OperatorStatus::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custom::OperatorDefinition;
    use crate::operator::Operator;
    use crate::spec::PinSpecification;
    use crate::types::{SemanticTag, Value};

    struct Doubler;

    impl OperatorDefinition for Doubler {
        fn name(&self) -> &str {
            "test_doubler"
        }

        fn specification(&self) -> OperatorSpecification {
            OperatorSpecification::new("test_doubler", "doubler", "test")
                .with_input(0, PinSpecification::new("value", [SemanticTag::Double], ""))
                .with_output(0, PinSpecification::new("value", [SemanticTag::Double], ""))
        }
    }

    impl CustomOperator for Doubler {
        fn run(&mut self, ctx: &mut OperatorContext<'_>) -> anyhow::Result<()> {
            let value = ctx.get_input(0, SemanticTag::Double)?.as_f64().unwrap_or_default();
            ctx.set_output(0, value * 2.0)?;
            Ok(())
        }
    }

    struct Panicker;

    impl OperatorDefinition for Panicker {
        fn name(&self) -> &str {
            "test_panicker"
        }

        fn specification(&self) -> OperatorSpecification {
            OperatorSpecification::new("test_panicker", "panicker", "test")
                .with_output(0, PinSpecification::new("value", [SemanticTag::Double], ""))
        }
    }

    impl CustomOperator for Panicker {
        fn run(&mut self, _ctx: &mut OperatorContext<'_>) -> anyhow::Result<()> {
            panic!("kaboom");
        }
    }

    #[test]
    fn test_recorded_operator_runs_through_the_dispatcher() {
        let server = Server::in_process();
        record_operator_on(&server, Doubler).unwrap();
        assert!(recorded_operators().contains(&"test_doubler".to_string()));

        let op = Operator::with_server("test_doubler", &server).unwrap();
        op.connect(0, 21.0).unwrap();
        assert_eq!(op.get_output(0, SemanticTag::Double).unwrap(), Value::Double(42.0));
    }

    #[test]
    fn test_panics_become_engine_errors() {
        let server = Server::in_process();
        record_operator_on(&server, Panicker).unwrap();
        let op = Operator::with_server("test_panicker", &server).unwrap();
        let err = op.get_output(0, SemanticTag::Double).unwrap_err();
        assert!(matches!(err, DpfError::Engine(_)));
        assert!(err.to_string().contains("kaboom"));
    }

    struct ShadowsBuiltin;

    impl OperatorDefinition for ShadowsBuiltin {
        fn name(&self) -> &str {
            "forward_double"
        }

        fn specification(&self) -> OperatorSpecification {
            OperatorSpecification::new("forward_double", "shadow", "test")
                .with_output(0, PinSpecification::new("value", [SemanticTag::Int32], ""))
        }
    }

    impl CustomOperator for ShadowsBuiltin {
        fn run(&mut self, _ctx: &mut OperatorContext<'_>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_recorded_operators_belong_to_their_server() {
        let server = Server::in_process();
        let other = Server::in_process();
        record_operator_on(&server, Doubler).unwrap();

        assert_eq!(server.recorded_operators(), vec!["test_doubler".to_string()]);
        assert!(other.recorded_operators().is_empty());
        assert!(!crate::registry::contains("test_doubler"));
        let err = Operator::with_server("test_doubler", &other).unwrap_err();
        assert!(matches!(err, DpfError::UnknownOperator(_)));
    }

    #[test]
    fn test_rejected_record_leaves_nothing_behind() {
        let server = Server::in_process();
        let err = record_operator_on(&server, ShadowsBuiltin).unwrap_err();
        assert!(matches!(err, DpfError::Engine(_)), "{err:?}");
        assert!(server.recorded_operators().is_empty());
        assert!(!recorded_operators().contains(&"forward_double".to_string()));

        // The builtin is still the one instantiated
        let op = Operator::with_server("forward_double", &server).unwrap();
        assert_eq!(op.specification().scripting_name, "forward_double");
    }

    #[test]
    fn test_recording_on_a_stopped_server_fails() {
        let server = Server::in_process();
        server.shutdown();
        let err = record_operator_on(&server, Doubler).unwrap_err();
        assert!(matches!(err, DpfError::ConnectionLost(_)));
    }
}
