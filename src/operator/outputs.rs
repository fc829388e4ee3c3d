use std::collections::HashSet;

use super::Operator;
use crate::error::{DpfError, Result};
use crate::spec::PinSpecification;
use crate::types::{Direction, ObjectRef, SemanticTag, Value};

/// Typed reader for one output pin
#[derive(Clone)]
pub struct Output<'a> {
    owner: &'a Operator,
    pin: i32,
    name: String,
    spec: PinSpecification,
}

impl<'a> Output<'a> {
    /// Output for a pin declared in the owner's specification
    pub fn declared(owner: &'a Operator, pin: i32, spec: PinSpecification) -> Self {
        Self {
            owner,
            pin,
            name: spec.name.clone(),
            spec,
        }
    }

    pub fn owner(&self) -> &'a Operator {
        self.owner
    }

    pub fn pin(&self) -> i32 {
        self.pin
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn specification(&self) -> &PinSpecification {
        &self.spec
    }

    /// Evaluate and read the pin
    ///
    /// Declared tags are tried in order; the first one the engine's actual
    /// value matches wins. Unconstrained pins return whatever is there.
    pub fn get(&self) -> Result<Value> {
        if self.spec.accepts_any() {
            return self.owner.read_output(self.pin, SemanticTag::Any);
        }
        let mut last = None;
        for tag in &self.spec.type_names {
            match self.owner.read_output(self.pin, *tag) {
                Err(DpfError::TypeMismatch(message)) => last = Some(message),
                other => return other,
            }
        }
        Err(DpfError::TypeMismatch(last.unwrap_or_else(|| {
            format!("{}.outputs.{} has no declared type", self.owner.name(), self.name)
        })))
    }

    /// Evaluate and read the pin as `tag`
    pub fn get_as(&self, tag: SemanticTag) -> Result<Value> {
        if !self.spec.accepts(tag) {
            return Err(DpfError::TypeMismatch(format!(
                "{}.outputs.{} is declared [{}], cannot be read as {}",
                self.owner.specification().display_name(),
                self.name,
                self.spec.type_names_display(),
                tag
            )));
        }
        self.owner.read_output(self.pin, tag)
    }

    /// Evaluate and read an object output
    pub fn get_object(&self) -> Result<ObjectRef> {
        self.get()?.into_object()
    }

    /// Evaluate and read an integer collection straight into a vector
    pub fn get_ints(&self) -> Result<Vec<i32>> {
        self.check_collection()?;
        self.owner.read_ints(self.pin)
    }

    pub fn get_doubles(&self) -> Result<Vec<f64>> {
        self.check_collection()?;
        self.owner.read_doubles(self.pin)
    }

    fn check_collection(&self) -> Result<()> {
        if self.spec.accepts(SemanticTag::Collection) {
            Ok(())
        } else {
            Err(DpfError::TypeMismatch(format!(
                "{}.outputs.{} is declared [{}], not a collection",
                self.owner.specification().display_name(),
                self.name,
                self.spec.type_names_display()
            )))
        }
    }
}

impl std::fmt::Debug for Output<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output")
            .field("operator", &self.owner.name())
            .field("pin", &self.pin)
            .field("name", &self.name)
            .finish()
    }
}

/// Outputs façade of an operator instance
#[derive(Clone, Copy)]
pub struct Outputs<'a> {
    owner: &'a Operator,
}

impl<'a> Outputs<'a> {
    pub(crate) fn new(owner: &'a Operator) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> &'a Operator {
        self.owner
    }

    /// Every output in pin order, colliding names prefixed with `_`
    pub fn list(&self) -> Vec<Output<'a>> {
        let mut taken = HashSet::new();
        let mut outputs = Vec::new();
        for (index, spec) in &self.owner.specification().outputs {
            let mut name = spec.name.clone();
            while taken.contains(&name) {
                name = format!("_{}", name);
            }
            taken.insert(name.clone());
            outputs.push(Output {
                owner: self.owner,
                pin: *index,
                name,
                spec: spec.clone(),
            });
        }
        outputs
    }

    fn unknown(&self, pin: String) -> DpfError {
        DpfError::UnknownPin {
            operator: self.owner.specification().display_name().to_string(),
            direction: Direction::Output,
            pin,
        }
    }

    pub fn get(&self, name: &str) -> Result<Output<'a>> {
        self.list()
            .into_iter()
            .find(|output| output.name == name)
            .ok_or_else(|| self.unknown(name.to_string()))
    }

    pub fn by_index(&self, pin: i32) -> Result<Output<'a>> {
        self.list()
            .into_iter()
            .find(|output| output.pin == pin)
            .ok_or_else(|| self.unknown(pin.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.list().into_iter().map(|output| output.name).collect()
    }

    pub fn len(&self) -> usize {
        self.owner.specification().outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Server;

    #[test]
    fn test_reading_with_an_undeclared_tag_fails_early() {
        let server = Server::in_process();
        let op = Operator::with_server("forward_double", &server).unwrap();
        let output = op.outputs().by_index(0).unwrap();
        let err = output.get_as(SemanticTag::Field).unwrap_err();
        assert!(matches!(err, DpfError::TypeMismatch(_)));
        // Nothing was evaluated
        assert_eq!(op.state(), crate::operator::OperatorState::Constructed);
    }

    #[test]
    fn test_collection_output_reads_into_vectors() {
        let server = Server::in_process();
        let op = Operator::with_server("forward_collection", &server).unwrap();
        op.connect(0, 1..=3).unwrap();
        let output = op.outputs().by_index(0).unwrap();
        assert_eq!(output.get_ints().unwrap(), vec![1, 2, 3]);
    }
}
