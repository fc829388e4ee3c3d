use dpf_core::operators::{math, min_max, result};
use dpf_core::{registry, server, OperatorSpecification, SemanticTag};

#[test]
fn test_generated_constructors_use_the_global_server() {
    let stress = result::stress().unwrap();
    let displacement = result::displacement().unwrap();
    assert!(std::sync::Arc::ptr_eq(stress.server(), displacement.server()));
    assert!(std::sync::Arc::ptr_eq(stress.server(), &server::global().unwrap()));

    let data_sources = stress.server().new_data_sources("file.rst").unwrap();
    stress.inputs().data_sources().connect(&data_sources).unwrap();
    displacement.inputs().data_sources().connect(&data_sources).unwrap();

    let total = (&*stress + &*displacement).unwrap();
    let scaled = (&total * 0.5).unwrap();
    let min_max = min_max::min_max_fc().unwrap();
    min_max.inputs().fields_container().connect(&scaled).unwrap();
    let field_max = min_max.outputs().field_max().get_object().unwrap();
    assert_eq!(field_max.tag(), SemanticTag::Field);
}

#[test]
fn test_categories() {
    let names: Vec<String> = registry::by_category("result")
        .iter()
        .map(|spec| spec.internal_name.clone())
        .collect();
    assert_eq!(names, vec!["S", "U"]);
    assert_eq!(registry::by_category("math").len(), 3);
}

#[test]
fn test_help_text_lists_pins() {
    let help = math::ScaleFc::descriptor().to_string();
    assert!(help.starts_with("scale_fc (scale_fc) [math]"));
    assert!(help.contains("ponderation: [double, field]"));
}

#[test]
fn test_specification_json_round_trip() {
    let spec = result::Stress::descriptor();
    let back = OperatorSpecification::from_json(&spec.to_json().unwrap()).unwrap();
    assert_eq!(back, spec);
    assert_eq!(back.input(0).unwrap().type_names[1], SemanticTag::Int32);
}
