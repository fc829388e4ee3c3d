use std::sync::Arc;

use crate::engine::CallHandle;
use crate::error::{DpfError, Result};
use crate::marshal;
use crate::server::Server;
use crate::spec::{OperatorSpecification, PinSpecification};
use crate::types::{Direction, ObjectRef, SemanticTag, Value};

/// Pins of one custom operator invocation
pub struct OperatorContext<'a> {
    server: &'a Arc<Server>,
    spec: &'a OperatorSpecification,
    call: CallHandle,
}

impl<'a> OperatorContext<'a> {
    pub(crate) fn new(server: &'a Arc<Server>, spec: &'a OperatorSpecification, call: CallHandle) -> Self {
        Self { server, spec, call }
    }

    pub fn server(&self) -> &Arc<Server> {
        self.server
    }

    pub fn specification(&self) -> &OperatorSpecification {
        self.spec
    }

    fn pin(&self, direction: Direction, pin: i32) -> Result<&'a PinSpecification> {
        let spec: &'a OperatorSpecification = self.spec;
        let found = match direction {
            Direction::Input => spec.input(pin),
            Direction::Output => spec.output(pin),
        };
        found.ok_or_else(|| DpfError::UnknownPin {
            operator: spec.internal_name.clone(),
            direction,
            pin: pin.to_string(),
        })
    }

    /// Read input `pin` as `tag`
    pub fn get_input(&self, pin: i32, tag: SemanticTag) -> Result<Value> {
        let spec = self.pin(Direction::Input, pin)?;
        if !spec.accepts(tag) {
            return Err(DpfError::TypeMismatch(format!(
                "{} input '{}' is declared [{}], cannot be read as {}",
                self.spec.internal_name,
                spec.name,
                spec.type_names_display(),
                tag
            )));
        }
        marshal::tag_to_input(self.server.engine(), self.call, pin, tag)
    }

    /// Read input `pin`, trying its declared tags in order
    pub fn input(&self, pin: i32) -> Result<Value> {
        let spec = self.pin(Direction::Input, pin)?;
        if spec.accepts_any() {
            return marshal::tag_to_input(self.server.engine(), self.call, pin, SemanticTag::Any);
        }
        let mut last = None;
        for tag in &spec.type_names {
            match marshal::tag_to_input(self.server.engine(), self.call, pin, *tag) {
                Err(DpfError::TypeMismatch(message)) => last = Some(message),
                other => return other,
            }
        }
        Err(DpfError::TypeMismatch(last.unwrap_or_else(|| {
            format!("input pin {} has no declared type", pin)
        })))
    }

    pub fn get_ints(&self, pin: i32) -> Result<Vec<i32>> {
        self.pin(Direction::Input, pin)?;
        marshal::get_in_ints(self.server.engine(), self.call, pin)
    }

    pub fn get_doubles(&self, pin: i32) -> Result<Vec<f64>> {
        self.pin(Direction::Input, pin)?;
        marshal::get_in_doubles(self.server.engine(), self.call, pin)
    }

    /// Write `value` to output `pin`
    pub fn set_output(&mut self, pin: i32, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let spec = self.pin(Direction::Output, pin)?;
        let tag = value.tag();
        if !spec.accepts(tag) {
            return Err(DpfError::TypeMismatch(format!(
                "{} output '{}' is declared [{}], got {}",
                self.spec.internal_name,
                spec.name,
                spec.type_names_display(),
                value.kind_name()
            )));
        }
        marshal::tag_to_output(self.server.engine(), self.call, pin, tag, &value)
    }

    pub fn field_data(&self, field: &ObjectRef) -> Result<Vec<f64>> {
        self.server.field_data(field)
    }

    pub fn new_field(&self, data: &[f64]) -> Result<ObjectRef> {
        self.server.new_field(data)
    }
}
