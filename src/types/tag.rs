use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Value kinds crossing the engine ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticTag {
    Bool,
    Int32,
    Double,
    String,
    Field,
    PropertyField,
    StringField,
    Scoping,
    Collection,
    DataSources,
    MeshedRegion,
    ResultInfo,
    TimeFreqSupport,
    Workflow,
    DataTree,
    Operator,
    FieldsContainer,
    ScopingsContainer,
    MeshesContainer,
    StreamsContainer,
    CyclicSupport,
    Any,
}

/// Host-side representation of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    Bool,
    Int,
    Double,
    String,
    /// Opaque engine object
    Object,
}

impl SemanticTag {
    pub const ALL: [SemanticTag; 22] = [
        SemanticTag::Bool,
        SemanticTag::Int32,
        SemanticTag::Double,
        SemanticTag::String,
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
        SemanticTag::FieldsContainer,
        SemanticTag::ScopingsContainer,
        SemanticTag::MeshesContainer,
        SemanticTag::StreamsContainer,
        SemanticTag::CyclicSupport,
        SemanticTag::Any,
    ];

    /// Name used in specifications and error messages
    pub fn name(self) -> &'static str {
        match self {
            SemanticTag::Bool => "bool",
            SemanticTag::Int32 => "int32",
            SemanticTag::Double => "double",
            SemanticTag::String => "string",
            SemanticTag::Field => "field",
            SemanticTag::PropertyField => "property_field",
            SemanticTag::StringField => "string_field",
            SemanticTag::Scoping => "scoping",
            SemanticTag::Collection => "collection",
            SemanticTag::DataSources => "data_sources",
            SemanticTag::MeshedRegion => "meshed_region",
            SemanticTag::ResultInfo => "result_info",
            SemanticTag::TimeFreqSupport => "time_freq_support",
            SemanticTag::Workflow => "workflow",
            SemanticTag::DataTree => "data_tree",
            SemanticTag::Operator => "operator",
            SemanticTag::FieldsContainer => "fields_container",
            SemanticTag::ScopingsContainer => "scopings_container",
            SemanticTag::MeshesContainer => "meshes_container",
            SemanticTag::StreamsContainer => "streams_container",
            SemanticTag::CyclicSupport => "cyclic_support",
            SemanticTag::Any => "any",
        }
    }

    /// Pin-role label used to break ties between compatible producer pins
    pub fn role_label(self) -> Option<&'static str> {
        match self {
            SemanticTag::Field => Some("field"),
            SemanticTag::FieldsContainer => Some("fields_container"),
            SemanticTag::MeshedRegion => Some("mesh"),
            SemanticTag::MeshesContainer => Some("meshes_container"),
            SemanticTag::Scoping => Some("scoping"),
            SemanticTag::ScopingsContainer => Some("scopings_container"),
            SemanticTag::DataSources => Some("data_sources"),
            SemanticTag::TimeFreqSupport => Some("time_freq_support"),
            SemanticTag::StreamsContainer => Some("streams_container"),
            SemanticTag::CyclicSupport => Some("cyclic_support"),
            _ => None,
        }
    }

    /// Tag whose role label is `label`, if any
    pub fn from_role_label(label: &str) -> Option<SemanticTag> {
        SemanticTag::ALL
            .into_iter()
            .find(|tag| tag.role_label() == Some(label))
    }

    pub fn host_kind(self) -> HostKind {
        match self {
            SemanticTag::Bool => HostKind::Bool,
            SemanticTag::Int32 => HostKind::Int,
            SemanticTag::Double => HostKind::Double,
            SemanticTag::String => HostKind::String,
            _ => HostKind::Object,
        }
    }

    pub fn is_object(self) -> bool {
        self.host_kind() == HostKind::Object
    }
}

impl fmt::Display for SemanticTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SemanticTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        // Engine specifications spell a few tags differently; the derive
        // macro accepts the same spellings
        let name = match name {
            "int" | "int32_t" => "int32",
            "float" | "f64" => "double",
            "abstract_meshed_region" | "mesh" => "meshed_region",
            "vector<int32>" | "vector<double>" => "collection",
            other => other,
        };
        SemanticTag::ALL
            .into_iter()
            .find(|tag| tag.name() == name)
            .ok_or_else(|| format!("unknown semantic tag '{}'", s))
    }
}

/// Side of a pin, used for lookups and gateway entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}
