use super::define_operators;

define_operators! {
    category: "min_max";

    /// Compute the component-wise minimum and maximum of every field of a
    /// fields container.
    MinMaxFc(MinMaxFcInputs, MinMaxFcOutputs), min_max_fc => "min_max_fc" as "min_max_fc" {
        inputs {
            0 => fields_container: [FieldsContainer] [] = "",
        }
        outputs {
            0 => field_min: [Field] = "minimum of each field",
            1 => field_max: [Field] = "maximum of each field",
        }
    }

    /// Compute the minimum and maximum of a field.
    MinMax(MinMaxInputs, MinMaxOutputs), min_max => "min_max" as "min_max" {
        inputs {
            0 => field: [Field, FieldsContainer] [] = "field or fields container with only one field",
        }
        outputs {
            0 => field_min: [Field] = "",
            1 => field_max: [Field] = "",
        }
    }
}
