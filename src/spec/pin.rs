use serde::{Deserialize, Serialize};

use crate::types::{self, SemanticTag};

/// Immutable description of one operator pin
///
/// Equality only looks at `name` and the set of accepted tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinSpecification {
    pub name: String,
    /// Accepted tags in declared order; empty means any
    pub type_names: Vec<SemanticTag>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub ellipsis: bool,
    #[serde(default)]
    pub document: String,
}

impl PinSpecification {
    pub fn new(
        name: impl Into<String>,
        type_names: impl IntoIterator<Item = SemanticTag>,
        document: impl Into<String>,
    ) -> Self {
        let mut tags: Vec<SemanticTag> = Vec::new();
        for tag in type_names {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        Self {
            name: name.into(),
            type_names: tags,
            optional: false,
            ellipsis: false,
            document: document.into(),
        }
    }

    /// Pin accepting any value
    pub fn any(name: impl Into<String>, document: impl Into<String>) -> Self {
        Self::new(name, [], document)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Mark the pin variadic: each connection opens the next index
    pub fn ellipsis(mut self) -> Self {
        self.ellipsis = true;
        self
    }

    pub fn accepts(&self, tag: SemanticTag) -> bool {
        types::accepts(&self.type_names, tag)
    }

    pub fn accepts_any(&self) -> bool {
        self.type_names.is_empty() || self.type_names.contains(&SemanticTag::Any)
    }

    /// Canonical tag read back from an output pin
    pub fn primary_tag(&self) -> SemanticTag {
        self.type_names.first().copied().unwrap_or(SemanticTag::Any)
    }

    /// Role label carried by the pin name (`"mesh"`, `"fields_container"`...)
    pub fn role_label(&self) -> Option<&str> {
        SemanticTag::from_role_label(&self.name).map(|_| self.name.as_str())
    }

    /// Accepted tag names joined for messages, `any` when unconstrained
    pub fn type_names_display(&self) -> String {
        if self.accepts_any() {
            return "any".to_string();
        }
        self.type_names
            .iter()
            .map(|tag| tag.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl PartialEq for PinSpecification {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.type_names.len() == other.type_names.len()
            && self.type_names.iter().all(|tag| other.type_names.contains(tag))
    }
}

impl Eq for PinSpecification {}
