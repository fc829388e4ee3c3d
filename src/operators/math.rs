use super::define_operators;

define_operators! {
    category: "math";

    /// Add two fields containers, fields or scalars element-wise.
    AddFc(AddFcInputs, AddFcOutputs), add_fc => "add_fc" as "add_fc" {
        inputs {
            0 => fields_container1: [FieldsContainer, Field, Double] [] = "",
            1 => fields_container2: [FieldsContainer, Field, Double] [] = "",
        }
        outputs {
            0 => fields_container: [FieldsContainer] = "",
        }
    }

    /// Subtract the second operand from the first, element-wise.
    MinusFc(MinusFcInputs, MinusFcOutputs), minus_fc => "minus_fc" as "minus_fc" {
        inputs {
            0 => field_or_fields_container_a: [FieldsContainer, Field, Double] [] = "",
            1 => field_or_fields_container_b: [FieldsContainer, Field, Double] [] = "",
        }
        outputs {
            0 => fields_container: [FieldsContainer] = "",
        }
    }

    /// Scale a field or fields container by a constant or by a field.
    ScaleFc(ScaleFcInputs, ScaleFcOutputs), scale_fc => "scale_fc" as "scale_fc" {
        inputs {
            0 => field: [Field, FieldsContainer] [] = "",
            1 => ponderation: [Double, Field] [] = "scalar or field of the same size",
        }
        outputs {
            0 => fields_container: [FieldsContainer] = "",
        }
    }
}
