//! Pin and operator descriptors

pub mod operator;
pub mod pin;

pub use operator::OperatorSpecification;
pub use pin::PinSpecification;
