use darling::{FromAttributes, FromMeta};
use syn::{Attribute, DeriveInput};

/// Parsed attributes from #[operator(...)]
#[derive(Debug, FromAttributes)]
#[darling(attributes(operator))]
pub struct OperatorArgs {
    pub name: String,

    #[darling(default)]
    pub scripting_name: Option<String>,

    #[darling(default)]
    pub category: Option<String>,

    #[darling(default)]
    pub description: Option<String>,
}

/// Parsed attributes from #[input(...)] and #[output(...)]
#[derive(Debug, FromMeta)]
pub struct PinArgs {
    pub pin: i32,
    pub name: String,

    /// Comma separated tag names, empty for any
    #[darling(default)]
    pub types: Option<String>,

    #[darling(default)]
    pub doc: Option<String>,

    #[darling(default)]
    pub optional: bool,

    #[darling(default)]
    pub ellipsis: bool,
}

/// Tag names the engine understands, as spelled in specifications
const TAG_NAMES: [&str; 22] = [
    "bool",
    "int32",
    "double",
    "string",
    "field",
    "property_field",
    "string_field",
    "scoping",
    "collection",
    "data_sources",
    "meshed_region",
    "result_info",
    "time_freq_support",
    "workflow",
    "data_tree",
    "operator",
    "fields_container",
    "scopings_container",
    "meshes_container",
    "streams_container",
    "cyclic_support",
    "any",
];

/// Alternative spellings accepted for a tag, mirroring
/// `SemanticTag::from_str` in `dpf-core`
const TAG_ALIASES: [(&str, &str); 8] = [
    ("int", "int32"),
    ("int32_t", "int32"),
    ("float", "double"),
    ("f64", "double"),
    ("abstract_meshed_region", "meshed_region"),
    ("mesh", "meshed_region"),
    ("vector<int32>", "collection"),
    ("vector<double>", "collection"),
];

/// Canonical tag name for `name`, if it designates a known tag
fn canonical_tag(name: &str) -> Option<&'static str> {
    let name = TAG_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, canonical)| *canonical);
    TAG_NAMES.iter().copied().find(|tag| *tag == name)
}

pub fn parse_operator_info(input: &DeriveInput) -> darling::Result<OperatorArgs> {
    OperatorArgs::from_attributes(&input.attrs)
}

fn parse_pins(attrs: &[Attribute], ident: &str) -> darling::Result<Vec<PinArgs>> {
    let mut errors = darling::Error::accumulator();
    let pins = attrs
        .iter()
        .filter(|attr| attr.path().is_ident(ident))
        .filter_map(|attr| errors.handle(PinArgs::from_meta(&attr.meta)))
        .collect();
    errors.finish_with(pins)
}

pub fn parse_pin_lists(input: &DeriveInput) -> darling::Result<(Vec<PinArgs>, Vec<PinArgs>)> {
    let inputs = parse_pins(&input.attrs, "input")?;
    let outputs = parse_pins(&input.attrs, "output")?;
    Ok((inputs, outputs))
}

/// `fields_container` -> `FieldsContainer`
fn variant_name(tag: &str) -> String {
    tag.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}

/// Resolve `types = "field, double"` into `SemanticTag` variant identifiers
pub fn tag_variants(pin: &PinArgs, owner: &syn::Ident) -> darling::Result<Vec<syn::Ident>> {
    let Some(types) = &pin.types else {
        return Ok(Vec::new());
    };
    let mut variants = Vec::new();
    for tag in types.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let Some(canonical) = canonical_tag(tag) else {
            return Err(darling::Error::custom(format!(
                "unknown type '{}' on pin '{}'",
                tag, pin.name
            ))
            .with_span(owner));
        };
        variants.push(syn::Ident::new(&variant_name(canonical), owner.span()));
    }
    Ok(variants)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_names() {
        assert_eq!(variant_name("fields_container"), "FieldsContainer");
        assert_eq!(variant_name("int32"), "Int32");
        assert_eq!(variant_name("bool"), "Bool");
    }

    #[test]
    fn test_aliases_resolve_to_canonical_tags() {
        assert_eq!(canonical_tag("int"), Some("int32"));
        assert_eq!(canonical_tag("float"), Some("double"));
        assert_eq!(canonical_tag("mesh"), Some("meshed_region"));
        assert_eq!(canonical_tag("vector<double>"), Some("collection"));
        assert_eq!(canonical_tag("fields_container"), Some("fields_container"));
        assert_eq!(canonical_tag("tensor"), None);
    }
}
