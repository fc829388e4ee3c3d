//! Choosing pins when a connection does not name them
//!
//! Candidates are first matched by semantic tag. When more than one
//! survives, candidates whose role labels agree (a producer pin named
//! `fields_container` for a consumer pin named `fields_container`) win; if
//! that still leaves several, the connection is ambiguous and every
//! candidate is listed so the caller can pick one explicitly.

use super::inputs::{Input, Inputs};
use super::outputs::{Output, Outputs};
use crate::error::{DpfError, Result};
use crate::spec::PinSpecification;
use crate::types::{self, Value};

struct Candidate<T> {
    item: T,
    role_match: bool,
    label: String,
}

fn choose<T>(
    candidates: Vec<Candidate<T>>,
    context: &str,
    none: impl FnOnce() -> DpfError,
) -> Result<T> {
    if candidates.len() <= 1 {
        return candidates.into_iter().next().map(|c| c.item).ok_or_else(none);
    }
    let (mut matched, rest): (Vec<_>, Vec<_>) =
        candidates.into_iter().partition(|c| c.role_match);
    if matched.len() == 1 {
        return Ok(matched.remove(0).item);
    }
    let pool = if matched.is_empty() { rest } else { matched };
    let labels: Vec<String> = pool.into_iter().map(|c| c.label).collect();
    Err(DpfError::AmbiguousConnection {
        message: format!(
            "{} matches several pins: {}; connect one of them explicitly",
            context,
            labels.join(", ")
        ),
        candidates: labels,
    })
}

fn roles_agree(a: &PinSpecification, b: &PinSpecification) -> bool {
    match (a.role_label(), b.role_label()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn edge_label(input: &Input<'_>, output: &Output<'_>) -> String {
    format!(
        "{}.inputs.{}({}.outputs.{})",
        input.owner().specification().display_name(),
        input.name(),
        output.owner().specification().display_name(),
        output.name()
    )
}

fn compatible(input: &PinSpecification, output: &PinSpecification) -> bool {
    types::intersects(&input.type_names, &output.type_names)
}

/// An explicitly chosen producer pin must share a tag with the consumer pin
pub(crate) fn check_output(input: &Input<'_>, output: &Output<'_>) -> Result<()> {
    if compatible(input.specification(), output.specification()) {
        Ok(())
    } else {
        Err(DpfError::NoCompatibleOutput(format!(
            "{}.outputs.{} provides [{}] but {}.inputs.{} accepts [{}]",
            output.owner().specification().display_name(),
            output.name(),
            output.specification().type_names_display(),
            input.owner().specification().display_name(),
            input.name(),
            input.specification().type_names_display()
        )))
    }
}

/// Producer output pin feeding `input`
pub(crate) fn output_for_input(input: &Input<'_>, producer: &Outputs<'_>) -> Result<i32> {
    let candidates = producer
        .list()
        .into_iter()
        .filter(|output| compatible(input.specification(), output.specification()))
        .map(|output| Candidate {
            role_match: roles_agree(input.specification(), output.specification()),
            label: edge_label(input, &output),
            item: output.pin(),
        })
        .collect();
    let context = format!(
        "connecting {} to {}.inputs.{}",
        producer.owner().specification().display_name(),
        input.owner().specification().display_name(),
        input.name()
    );
    choose(candidates, &context, || {
        DpfError::NoCompatibleOutput(format!(
            "{} has no output of an accepted type [{}] for {}.inputs.{}",
            producer.owner().specification().display_name(),
            input.specification().type_names_display(),
            input.owner().specification().display_name(),
            input.name()
        ))
    })
}

/// Consumer input accepting a raw value
pub(crate) fn input_for_value<'a>(inputs: &Inputs<'a>, value: &Value) -> Result<Input<'a>> {
    let tag = value.tag();
    let connectable = inputs.connectable();
    // Pins naming the tag explicitly beat unconstrained pins
    let explicit: Vec<Input<'a>> = connectable
        .iter()
        .filter(|input| input.specification().type_names.contains(&tag))
        .cloned()
        .collect();
    let pool = if explicit.is_empty() {
        connectable
            .into_iter()
            .filter(|input| input.specification().accepts(tag))
            .collect()
    } else {
        explicit
    };
    let role = types::tag_to_role_label(tag);
    let consumer = inputs.owner().specification().display_name().to_string();
    let candidates = pool
        .into_iter()
        .map(|input| Candidate {
            role_match: role.is_some() && input.specification().role_label() == role,
            label: format!("{}.inputs.{}", consumer, input.name()),
            item: input,
        })
        .collect();
    choose(candidates, &format!("a {} value", tag), || {
        DpfError::TypeMismatch(format!("no input of {} accepts a {}", consumer, value.kind_name()))
    })
}

/// Consumer input fed by one producer pin
pub(crate) fn input_for_output<'a>(inputs: &Inputs<'a>, output: &Output<'_>) -> Result<Input<'a>> {
    let candidates = inputs
        .connectable()
        .into_iter()
        .filter(|input| compatible(input.specification(), output.specification()))
        .map(|input| Candidate {
            role_match: roles_agree(input.specification(), output.specification()),
            label: edge_label(&input, output),
            item: input,
        })
        .collect();
    let context = format!(
        "{}.outputs.{}",
        output.owner().specification().display_name(),
        output.name()
    );
    choose(candidates, &context, || {
        DpfError::NoCompatibleOutput(format!(
            "no input of {} accepts {}.outputs.{} [{}]",
            inputs.owner().specification().display_name(),
            output.owner().specification().display_name(),
            output.name(),
            output.specification().type_names_display()
        ))
    })
}

/// Consumer input and producer output pair for a whole-façade connection
pub(crate) fn pair_for_outputs<'a>(
    inputs: &Inputs<'a>,
    producer: &Outputs<'_>,
) -> Result<(Input<'a>, i32)> {
    let outputs = producer.list();
    let mut candidates = Vec::new();
    for input in inputs.connectable() {
        for output in &outputs {
            if compatible(input.specification(), output.specification()) {
                candidates.push(Candidate {
                    role_match: roles_agree(input.specification(), output.specification()),
                    label: edge_label(&input, output),
                    item: (input.clone(), output.pin()),
                });
            }
        }
    }
    let context = format!(
        "connecting {} to {}",
        producer.owner().specification().display_name(),
        inputs.owner().specification().display_name()
    );
    choose(candidates, &context, || {
        DpfError::NoCompatibleOutput(format!(
            "no output of {} matches an input of {}",
            producer.owner().specification().display_name(),
            inputs.owner().specification().display_name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, role_match: bool) -> Candidate<String> {
        Candidate {
            item: name.to_string(),
            role_match,
            label: name.to_string(),
        }
    }

    #[test]
    fn test_single_candidate_wins() {
        let chosen = choose(vec![candidate("a", false)], "ctx", || {
            DpfError::NoCompatibleOutput("none".into())
        });
        assert_eq!(chosen.unwrap(), "a");
    }

    #[test]
    fn test_role_label_breaks_ties() {
        let chosen = choose(
            vec![candidate("a", false), candidate("b", true)],
            "ctx",
            || DpfError::NoCompatibleOutput("none".into()),
        );
        assert_eq!(chosen.unwrap(), "b");
    }

    #[test]
    fn test_ambiguity_lists_every_candidate() {
        let err = choose(
            vec![candidate("a", false), candidate("b", false)],
            "ctx",
            || DpfError::NoCompatibleOutput("none".into()),
        )
        .unwrap_err();
        match err {
            DpfError::AmbiguousConnection { candidates, message } => {
                assert_eq!(candidates, vec!["a", "b"]);
                assert!(message.contains("a, b"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_no_candidate() {
        let err = choose(Vec::<Candidate<String>>::new(), "ctx", || {
            DpfError::NoCompatibleOutput("none".into())
        })
        .unwrap_err();
        assert!(matches!(err, DpfError::NoCompatibleOutput(_)));
    }
}
