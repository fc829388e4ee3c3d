//! Identity and merge operators

use super::define_operators;
use crate::spec::PinSpecification;
use crate::types::SemanticTag;

define_operators! {
    category: "utility";

    /// Return the input unchanged, whatever its type.
    Forward(ForwardInputs, ForwardOutputs), forward => "forward" as "forward" {
        inputs {
            0 => any: [] [] = "any value",
        }
        outputs {
            0 => any: [] = "the value connected on pin 0",
        }
    }

    /// Merge fields into one, either by concatenating their data or by
    /// summing them.
    MergeFields(MergeFieldsInputs, MergeFieldsOutputs), merge_fields => "merge::fields" as "merge_fields" {
        inputs {
            0 => sum_merge: [Bool] [optional] = "sum the fields instead of concatenating them, false by default",
            1 => field: [Field] [ellipsis] = "fields to merge, one per pin from pin 1",
        }
        outputs {
            0 => merged_field: [Field] = "",
        }
    }
}

/// Internal name of the identity operator typed for `tag`
pub fn forward_name(tag: SemanticTag) -> String {
    format!("forward_{}", tag.name())
}

/// One identity operator per concrete tag: `forward_bool`, `forward_field`...
pub fn forward_specifications() -> Vec<OperatorSpecification> {
    SemanticTag::ALL
        .into_iter()
        .filter(|tag| *tag != SemanticTag::Any)
        .map(|tag| {
            OperatorSpecification::new(forward_name(tag), forward_name(tag), "utility")
                .with_description(format!("Return a {} unchanged.", tag))
                .with_input(0, PinSpecification::new(tag.name(), [tag], ""))
                .with_output(0, PinSpecification::new(tag.name(), [tag], ""))
        })
        .collect()
}

/// Identity operator typed for `tag` on `server`
pub fn forward_of(tag: SemanticTag, server: &Arc<Server>) -> Result<Operator> {
    if tag == SemanticTag::Any {
        return Operator::with_server(Forward::INTERNAL_NAME, server);
    }
    Operator::with_server(&forward_name(tag), server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn test_merge_sums_when_asked() {
        let server = Server::in_process();
        let merge = MergeFields::with_server(&server).unwrap();
        merge.inputs().sum_merge().connect(true).unwrap();
        for data in [[1.0, 2.0], [10.0, 20.0], [100.0, 200.0]] {
            let field = server.new_field(&data).unwrap();
            merge.inputs().connect(field).unwrap();
        }
        let merged = merge.outputs().merged_field().get_object().unwrap();
        assert_eq!(server.field_data(&merged).unwrap(), vec![111.0, 222.0]);
    }

    #[test]
    fn test_forward_of_any_uses_the_untyped_operator() {
        let server = Server::in_process();
        let op = forward_of(SemanticTag::Any, &server).unwrap();
        op.connect(0, "text").unwrap();
        assert_eq!(op.outputs().by_index(0).unwrap().get().unwrap(), Value::from("text"));
    }

    #[test]
    fn test_forward_specifications_skip_any() {
        let specs = forward_specifications();
        assert_eq!(specs.len(), SemanticTag::ALL.len() - 1);
        assert!(specs.iter().all(|s| s.internal_name != "forward_any"));
    }
}
