//! User operators recorded into the engine
//!
//! A type implementing [`CustomOperator`] is handed to [`record_operator`];
//! from then on the engine can instantiate it by name like any built-in
//! operator and calls back into [`CustomOperator::run`] on evaluation.
//!
//! ```ignore
//! #[derive(Default, CustomOperator)]
//! #[operator(name = "custom_add_to_field", category = "math")]
//! #[input(pin = 0, name = "field", types = "field")]
//! #[input(pin = 1, name = "scalar", types = "double")]
//! #[output(pin = 0, name = "field", types = "field")]
//! struct AddFloatToFieldData;
//!
//! impl CustomOperator for AddFloatToFieldData {
//!     fn run(&mut self, ctx: &mut OperatorContext<'_>) -> anyhow::Result<()> {
//!         let field = ctx.get_input(0, SemanticTag::Field)?.into_object()?;
//!         let scalar = ctx.get_input(1, SemanticTag::Double)?.as_f64().unwrap_or(0.0);
//!         let data: Vec<f64> = ctx.field_data(&field)?.iter().map(|v| v + scalar).collect();
//!         let out = ctx.new_field(&data)?;
//!         ctx.set_output(0, out)?;
//!         Ok(())
//!     }
//! }
//! ```

pub mod context;
pub mod record;

pub use context::OperatorContext;
pub use record::{
    operator_main_callback, record_operator, record_operator_on, record_registered_operators,
    recorded_operators, RegisteredOperator,
};

use crate::spec::OperatorSpecification;

/// Name and pins of a user operator
///
/// Usually derived with `#[derive(CustomOperator)]`.
pub trait OperatorDefinition {
    /// Internal name the engine instantiates the operator by
    fn name(&self) -> &str;

    fn specification(&self) -> OperatorSpecification;
}

/// Body of a user operator
///
/// The engine may call `run` from any thread; invocations of one recorded
/// instance are serialised.
pub trait CustomOperator: OperatorDefinition + Send + 'static {
    fn run(&mut self, ctx: &mut OperatorContext<'_>) -> anyhow::Result<()>;
}
