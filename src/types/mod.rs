//! Semantic type tags and host values
//!
//! The probe order below is part of the contract: `bool` is tried before
//! `int32`, and container tags are tried before their element tags.

pub mod tag;
pub mod value;

pub use tag::{Direction, HostKind, SemanticTag};
pub use value::{ObjectRef, Value};

/// Order in which a host value is matched against tags
pub const PROBE_ORDER: [SemanticTag; 21] = [
    SemanticTag::Bool,
    SemanticTag::Int32,
    SemanticTag::Double,
    SemanticTag::String,
    SemanticTag::FieldsContainer,
    SemanticTag::ScopingsContainer,
    SemanticTag::MeshesContainer,
    SemanticTag::StreamsContainer,
    SemanticTag::Field,
    SemanticTag::PropertyField,
    SemanticTag::StringField,
    SemanticTag::Scoping,
    SemanticTag::Collection,
    SemanticTag::DataSources,
    SemanticTag::MeshedRegion,
    SemanticTag::ResultInfo,
    SemanticTag::TimeFreqSupport,
    SemanticTag::Workflow,
    SemanticTag::DataTree,
    SemanticTag::Operator,
    SemanticTag::CyclicSupport,
];

fn probe(tag: SemanticTag, value: &Value) -> bool {
    match (tag, value) {
        (SemanticTag::Bool, Value::Bool(_)) => true,
        (SemanticTag::Int32, Value::Int(_)) => true,
        (SemanticTag::Double, Value::Double(_)) => true,
        (SemanticTag::String, Value::String(_)) => true,
        (SemanticTag::Collection, Value::IntVec(_) | Value::DoubleVec(_)) => true,
        (tag, Value::Object(obj)) => obj.tag() == tag,
        _ => false,
    }
}

/// Semantic tag for a raw host value
pub fn host_value_to_tag(value: &Value) -> SemanticTag {
    PROBE_ORDER
        .into_iter()
        .find(|tag| probe(*tag, value))
        .unwrap_or(SemanticTag::Any)
}

/// Role label used by ambiguity resolution
pub fn tag_to_role_label(tag: SemanticTag) -> Option<&'static str> {
    tag.role_label()
}

/// Whether a value of tag `tag` may be bound to a pin accepting `accepted`
///
/// An empty acceptance set, or one containing `any`, accepts everything.
pub fn accepts(accepted: &[SemanticTag], tag: SemanticTag) -> bool {
    accepted.is_empty()
        || accepted.contains(&SemanticTag::Any)
        || tag == SemanticTag::Any
        || accepted.contains(&tag)
}

/// Whether two acceptance sets share a tag (empty sets match anything)
pub fn intersects(a: &[SemanticTag], b: &[SemanticTag]) -> bool {
    a.is_empty()
        || b.is_empty()
        || a.contains(&SemanticTag::Any)
        || b.contains(&SemanticTag::Any)
        || a.iter().any(|tag| b.contains(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(tag: SemanticTag) -> usize {
        PROBE_ORDER.iter().position(|t| *t == tag).unwrap()
    }

    #[test]
    fn test_bool_is_probed_before_int() {
        assert!(position(SemanticTag::Bool) < position(SemanticTag::Int32));
        assert_eq!(host_value_to_tag(&Value::Bool(true)), SemanticTag::Bool);
        assert_eq!(host_value_to_tag(&Value::Bool(false)), SemanticTag::Bool);
        assert_eq!(host_value_to_tag(&Value::Int(1)), SemanticTag::Int32);
    }

    #[test]
    fn test_containers_precede_elements() {
        assert!(position(SemanticTag::FieldsContainer) < position(SemanticTag::Field));
        assert!(position(SemanticTag::ScopingsContainer) < position(SemanticTag::Scoping));
        assert!(position(SemanticTag::MeshesContainer) < position(SemanticTag::MeshedRegion));
    }

    #[test]
    fn test_probe_order_covers_every_concrete_tag() {
        for tag in SemanticTag::ALL {
            if tag != SemanticTag::Any {
                assert!(PROBE_ORDER.contains(&tag), "{} missing", tag);
            }
        }
    }

    #[test]
    fn test_sequences_are_collections() {
        assert_eq!(host_value_to_tag(&Value::IntVec(vec![1])), SemanticTag::Collection);
        assert_eq!(host_value_to_tag(&Value::DoubleVec(vec![])), SemanticTag::Collection);
    }

    #[test]
    fn test_empty_acceptance_means_any() {
        assert!(accepts(&[], SemanticTag::Field));
        assert!(!accepts(&[SemanticTag::Double], SemanticTag::Int32));
        assert!(intersects(&[], &[SemanticTag::Field]));
        assert!(!intersects(&[SemanticTag::Field], &[SemanticTag::FieldsContainer]));
    }
}
