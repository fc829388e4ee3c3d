use std::collections::{BTreeMap, HashSet};
use std::ops::{Range, RangeInclusive};

use super::outputs::{Output, Outputs};
use super::{resolve, Connection, Operator};
use crate::error::{DpfError, Result};
use crate::spec::PinSpecification;
use crate::types::{Direction, ObjectRef, Value};

/// Anything that can be bound to an input pin
pub enum ConnectArg<'a> {
    /// A host value; its semantic tag decides the marshalling entry
    Value(Value),
    /// One output pin of a producer
    Output(Output<'a>),
    /// A producer as a whole; the output pin is resolved by type
    Outputs(Outputs<'a>),
}

macro_rules! connect_arg_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<'a> From<$ty> for ConnectArg<'a> {
                fn from(v: $ty) -> Self {
                    ConnectArg::Value(Value::from(v))
                }
            }
        )*
    };
}

connect_arg_from_value!(
    bool,
    i32,
    f64,
    &str,
    String,
    Vec<i32>,
    &[i32],
    Vec<f64>,
    &[f64],
    Range<i32>,
    RangeInclusive<i32>,
    ObjectRef,
    &ObjectRef,
);

impl<'a> From<Value> for ConnectArg<'a> {
    fn from(v: Value) -> Self {
        ConnectArg::Value(v)
    }
}

impl<'a> From<Output<'a>> for ConnectArg<'a> {
    fn from(output: Output<'a>) -> Self {
        ConnectArg::Output(output)
    }
}

impl<'a> From<&Output<'a>> for ConnectArg<'a> {
    fn from(output: &Output<'a>) -> Self {
        ConnectArg::Output(output.clone())
    }
}

impl<'a> From<Outputs<'a>> for ConnectArg<'a> {
    fn from(outputs: Outputs<'a>) -> Self {
        ConnectArg::Outputs(outputs)
    }
}

impl<'a> From<&'a Operator> for ConnectArg<'a> {
    fn from(producer: &'a Operator) -> Self {
        ConnectArg::Outputs(producer.outputs())
    }
}

/// Typed connector for one input pin
#[derive(Clone)]
pub struct Input<'a> {
    owner: &'a Operator,
    pin: i32,
    /// First pin of the ellipsis family, or `pin`
    base: i32,
    name: String,
    spec: PinSpecification,
}

impl<'a> Input<'a> {
    /// Input for a pin declared in the owner's specification
    pub fn declared(owner: &'a Operator, pin: i32, spec: PinSpecification) -> Self {
        Self {
            owner,
            pin,
            base: pin,
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

    /// Name on the façade (`field2` for the second member of a family)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn specification(&self) -> &PinSpecification {
        &self.spec
    }

    pub fn is_ellipsis(&self) -> bool {
        self.spec.ellipsis
    }

    /// Connections made on the family, `-1` for a regular pin
    pub fn ellipsis_count(&self) -> i32 {
        if !self.spec.ellipsis {
            return -1;
        }
        self.owner.ellipsis_count(self.base).unwrap_or(0) as i32
    }

    /// Current binding of the pin
    pub fn connection(&self) -> Option<Connection> {
        self.owner.connection(self.pin)
    }

    /// Bind a value or a producer to this pin
    ///
    /// On an ellipsis family a bound member is not rebound: the connection
    /// goes to the next free slot. Type checks and producer-pin resolution
    /// run before the engine is called; a failed connect leaves the previous
    /// binding untouched.
    pub fn connect<'b>(&self, value: impl Into<ConnectArg<'b>>) -> Result<()> {
        let pin = self.owner.target_pin(self.pin, self.base);
        match value.into() {
            ConnectArg::Value(value) => {
                let tag = value.tag();
                if !self.spec.accepts(tag) {
                    return Err(DpfError::TypeMismatch(format!(
                        "{}.inputs.{} accepts [{}], got {}",
                        self.owner.specification().display_name(),
                        self.name,
                        self.spec.type_names_display(),
                        value.kind_name()
                    )));
                }
                self.owner.bind_value(pin, self.base, value)
            }
            ConnectArg::Output(output) => {
                resolve::check_output(self, &output)?;
                self.owner
                    .bind_output(pin, self.base, output.owner(), output.pin())
            }
            ConnectArg::Outputs(outputs) => {
                let producer_pin = resolve::output_for_input(self, &outputs)?;
                self.owner
                    .bind_output(pin, self.base, outputs.owner(), producer_pin)
            }
        }
    }

    pub(crate) fn base(&self) -> i32 {
        self.base
    }
}

impl std::fmt::Debug for Input<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Input")
            .field("operator", &self.owner.name())
            .field("pin", &self.pin)
            .field("name", &self.name)
            .finish()
    }
}

/// One addressable slot of the inputs façade
struct Slot {
    name: String,
    pin: i32,
    base: i32,
    /// Listed on the façade (pending ellipsis slots are reachable by name only)
    listed: bool,
}

fn unique_name(name: String, taken: &mut HashSet<String>) -> String {
    let mut name = name;
    while taken.contains(&name) {
        name = format!("_{}", name);
    }
    taken.insert(name.clone());
    name
}

/// Inputs façade of an operator instance
#[derive(Clone, Copy)]
pub struct Inputs<'a> {
    owner: &'a Operator,
}

impl<'a> Inputs<'a> {
    pub(crate) fn new(owner: &'a Operator) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> &'a Operator {
        self.owner
    }

    /// Slots in pin order: ellipsis families expand to their members plus the
    /// next free slot
    fn slots(&self) -> Vec<Slot> {
        let families = self.owner.ellipsis_families();
        let mut taken = HashSet::new();
        let mut slots = Vec::new();
        for (index, spec) in &self.owner.specification().inputs {
            if !spec.ellipsis {
                slots.push(Slot {
                    name: unique_name(spec.name.clone(), &mut taken),
                    pin: *index,
                    base: *index,
                    listed: true,
                });
                continue;
            }
            let count = families.get(index).copied().unwrap_or(0);
            for k in 0..=count {
                let name = if k == 0 {
                    spec.name.clone()
                } else {
                    format!("{}{}", spec.name, k + 1)
                };
                slots.push(Slot {
                    name: unique_name(name, &mut taken),
                    pin: index + k as i32,
                    base: *index,
                    listed: k == 0 || k < count,
                });
            }
        }
        slots
    }

    fn input(&self, slot: &Slot) -> Result<Input<'a>> {
        let spec = self
            .owner
            .specification()
            .input(slot.base)
            .cloned()
            .ok_or_else(|| self.unknown(slot.base.to_string()))?;
        Ok(Input {
            owner: self.owner,
            pin: slot.pin,
            base: slot.base,
            name: slot.name.clone(),
            spec,
        })
    }

    fn unknown(&self, pin: String) -> DpfError {
        DpfError::UnknownPin {
            operator: self.owner.specification().display_name().to_string(),
            direction: Direction::Input,
            pin,
        }
    }

    /// Input by façade name
    pub fn get(&self, name: &str) -> Result<Input<'a>> {
        let slots = self.slots();
        let slot = slots
            .iter()
            .find(|slot| slot.name == name)
            .ok_or_else(|| self.unknown(name.to_string()))?;
        self.input(slot)
    }

    /// Input by pin index, including bound and pending ellipsis slots
    pub fn by_index(&self, pin: i32) -> Result<Input<'a>> {
        let slots = self.slots();
        let slot = slots
            .iter()
            .find(|slot| slot.pin == pin)
            .ok_or_else(|| self.unknown(pin.to_string()))?;
        self.input(slot)
    }

    /// Names exposed on the façade, in pin order
    pub fn names(&self) -> Vec<String> {
        self.slots()
            .into_iter()
            .filter(|slot| slot.listed)
            .map(|slot| slot.name)
            .collect()
    }

    pub fn list(&self) -> Vec<Input<'a>> {
        self.slots()
            .iter()
            .filter(|slot| slot.listed)
            .filter_map(|slot| self.input(slot).ok())
            .collect()
    }

    /// Inputs a whole-façade connect may target: regular pins and the next
    /// free slot of each ellipsis family
    pub(crate) fn connectable(&self) -> Vec<Input<'a>> {
        let families = self.owner.ellipsis_families();
        self.slots()
            .iter()
            .filter(|slot| match families.get(&slot.base) {
                Some(count) => slot.pin == slot.base + *count as i32,
                None => true,
            })
            .filter_map(|slot| self.input(slot).ok())
            .collect()
    }

    /// Bind `value` to whichever input it fits
    pub fn connect<'b>(&self, value: impl Into<ConnectArg<'b>>) -> Result<()> {
        match value.into() {
            ConnectArg::Value(value) => {
                let input = resolve::input_for_value(self, &value)?;
                input.connect(value)
            }
            ConnectArg::Output(output) => {
                let input = resolve::input_for_output(self, &output)?;
                input.connect(output)
            }
            ConnectArg::Outputs(outputs) => {
                let (input, producer_pin) = resolve::pair_for_outputs(self, &outputs)?;
                self.owner
                    .bind_output(input.pin(), input.base(), outputs.owner(), producer_pin)
            }
        }
    }

    pub fn connected_inputs(&self) -> BTreeMap<i32, Connection> {
        self.owner.connected_inputs()
    }

    pub fn len(&self) -> usize {
        self.names().len()
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
    fn test_ellipsis_family_grows_on_connection() {
        let server = Server::in_process();
        let merge = Operator::with_server("merge::fields", &server).unwrap();
        assert_eq!(merge.inputs().names(), vec!["sum_merge", "field"]);
        assert_eq!(merge.inputs().get("field").unwrap().ellipsis_count(), 0);

        let f = server.new_field(&[1.0]).unwrap();
        merge.inputs().get("field").unwrap().connect(&f).unwrap();
        assert_eq!(merge.inputs().names(), vec!["sum_merge", "field"]);
        let pending = merge.inputs().get("field2").unwrap();
        assert_eq!(pending.pin(), 2);
        pending.connect(&f).unwrap();
        assert_eq!(merge.inputs().names(), vec!["sum_merge", "field", "field2"]);
        assert_eq!(merge.inputs().get("field").unwrap().ellipsis_count(), 2);
    }

    #[test]
    fn test_connecting_a_bound_member_opens_the_next_slot() {
        let server = Server::in_process();
        let merge = Operator::with_server("merge::fields", &server).unwrap();
        let f = server.new_field(&[1.0]).unwrap();
        let field = merge.inputs().get("field").unwrap();
        for _ in 0..3 {
            field.connect(&f).unwrap();
        }
        assert_eq!(field.ellipsis_count(), 3);
        assert_eq!(
            merge.connected_inputs().keys().copied().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(merge.inputs().names(), vec!["sum_merge", "field", "field2", "field3"]);
    }

    #[test]
    fn test_failed_connect_does_not_grow_the_family() {
        let server = Server::in_process();
        let merge = Operator::with_server("merge::fields", &server).unwrap();
        let field = merge.inputs().get("field").unwrap();
        field.connect(server.new_field(&[1.0]).unwrap()).unwrap();
        assert!(field.connect(2.0).is_err());
        assert_eq!(field.ellipsis_count(), 1);
        assert_eq!(merge.inputs().names(), vec!["sum_merge", "field"]);
    }

    #[test]
    fn test_type_mismatch_leaves_pin_unbound() {
        let server = Server::in_process();
        let op = Operator::with_server("forward_double", &server).unwrap();
        let err = op.inputs().by_index(0).unwrap().connect(true).unwrap_err();
        assert!(matches!(err, DpfError::TypeMismatch(_)));
        assert!(op.connected_inputs().is_empty());
    }

    #[test]
    fn test_unknown_pin_name() {
        let server = Server::in_process();
        let op = Operator::with_server("forward_double", &server).unwrap();
        let err = op.inputs().get("nope").unwrap_err();
        assert!(matches!(
            err,
            DpfError::UnknownPin { direction: Direction::Input, .. }
        ));
    }

    #[test]
    fn test_colliding_names_get_a_prefix() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name("field".into(), &mut taken), "field");
        assert_eq!(unique_name("field".into(), &mut taken), "_field");
        assert_eq!(unique_name("field".into(), &mut taken), "__field");
    }
}
