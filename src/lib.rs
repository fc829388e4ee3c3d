//! Typed operator dataflow client for the DPF data processing engine
//!
//! Operators are instantiated from the registry, wired through their typed
//! [`Inputs`](operator::Inputs) and [`Outputs`](operator::Outputs) façades,
//! and evaluated lazily when an output is read. User types implementing
//! [`CustomOperator`](custom::CustomOperator) can be recorded into the engine
//! and then take part in a workflow like any built-in operator.

extern crate self as dpf_core;

pub mod config;
pub mod custom;
pub mod engine;
pub mod error;
pub mod marshal;
pub mod operator;
pub mod operators;
pub mod registry;
pub mod server;
pub mod spec;
pub mod types;

pub use config::ServerConfig;
pub use custom::{record_operator, record_operator_on, CustomOperator, OperatorContext, OperatorDefinition};
pub use dpf_core_macros::CustomOperator;
pub use error::{DpfError, Result};
pub use operator::{Connection, Input, Inputs, Operator, OperatorConfig, Output, Outputs};
pub use server::Server;
pub use spec::{OperatorSpecification, PinSpecification};
pub use types::{ObjectRef, SemanticTag, Value};

#[doc(hidden)]
pub use inventory;
