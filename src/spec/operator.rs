use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::PinSpecification;
use crate::error::Result;
use crate::types::Direction;

/// Complete description of one operator kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorSpecification {
    /// Name the engine knows the operator by (e.g. "S")
    pub internal_name: String,
    /// User-facing name (e.g. "stress")
    pub scripting_name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Sparse, stable pin indices
    pub inputs: BTreeMap<i32, PinSpecification>,
    pub outputs: BTreeMap<i32, PinSpecification>,
}

impl OperatorSpecification {
    pub fn new(
        internal_name: impl Into<String>,
        scripting_name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            internal_name: internal_name.into(),
            scripting_name: scripting_name.into(),
            category: category.into(),
            description: String::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, pin: i32, spec: PinSpecification) -> Self {
        self.inputs.insert(pin, spec);
        self
    }

    pub fn with_output(mut self, pin: i32, spec: PinSpecification) -> Self {
        self.outputs.insert(pin, spec);
        self
    }

    pub fn input(&self, pin: i32) -> Option<&PinSpecification> {
        self.inputs.get(&pin)
    }

    pub fn output(&self, pin: i32) -> Option<&PinSpecification> {
        self.outputs.get(&pin)
    }

    pub fn pins(&self, direction: Direction) -> &BTreeMap<i32, PinSpecification> {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }

    /// Name shown to users, falling back to the internal name
    pub fn display_name(&self) -> &str {
        if self.scripting_name.is_empty() {
            &self.internal_name
        } else {
            &self.scripting_name
        }
    }

    /// Serialized form handed to the engine when recording an operator
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn write_pins(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    pins: &BTreeMap<i32, PinSpecification>,
) -> fmt::Result {
    writeln!(f, "{}:", title)?;
    if pins.is_empty() {
        return writeln!(f, "    (none)");
    }
    for (index, pin) in pins {
        let mut flags = Vec::new();
        if pin.optional {
            flags.push("optional");
        }
        if pin.ellipsis {
            flags.push("ellipsis");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" ({})", flags.join(", "))
        };
        writeln!(
            f,
            "    {:>3} {}: [{}]{}",
            index,
            pin.name,
            pin.type_names_display(),
            flags
        )?;
        if !pin.document.is_empty() {
            writeln!(f, "        {}", pin.document)?;
        }
    }
    Ok(())
}

/// Help page listing every pin
impl fmt::Display for OperatorSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}) [{}]",
            self.display_name(),
            self.internal_name,
            self.category
        )?;
        if !self.description.is_empty() {
            writeln!(f, "{}", self.description)?;
        }
        write_pins(f, "inputs", &self.inputs)?;
        write_pins(f, "outputs", &self.outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SemanticTag;

    fn sample() -> OperatorSpecification {
        OperatorSpecification::new("min_max_fc", "min_max_fc", "min_max")
            .with_description("Compute min and max over a fields container.")
            .with_input(
                0,
                PinSpecification::new("fields_container", [SemanticTag::FieldsContainer], ""),
            )
            .with_output(0, PinSpecification::new("field_min", [SemanticTag::Field], ""))
            .with_output(1, PinSpecification::new("field_max", [SemanticTag::Field], ""))
    }

    #[test]
    fn test_json_round_trip_keeps_sparse_pins() {
        let spec = sample().with_input(
            17,
            PinSpecification::new("domain_id", [SemanticTag::Int32], "").optional(),
        );
        let json = spec.to_json().unwrap();
        let back = OperatorSpecification::from_json(&json).unwrap();
        assert_eq!(back, spec);
        assert!(back.input(17).unwrap().optional);
    }

    #[test]
    fn test_help_lists_pins() {
        let help = sample().to_string();
        assert!(help.contains("min_max_fc (min_max_fc) [min_max]"));
        assert!(help.contains("0 fields_container: [fields_container]"));
        assert!(help.contains("1 field_max: [field]"));
    }

    #[test]
    fn test_empty_documents_are_kept_empty() {
        let spec = sample();
        assert_eq!(spec.output(0).unwrap().document, "");
    }
}
