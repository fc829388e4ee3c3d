use dpf_core::custom::recorded_operators;
use dpf_core::{
    CustomOperator, DpfError, Operator, OperatorContext, OperatorDefinition, SemanticTag, Server,
    ServerConfig, Value,
};

#[derive(Default, CustomOperator)]
#[operator(name = "custom_add_to_field", category = "math", description = "Add a scalar to a field.")]
#[input(pin = 0, name = "field", types = "field", doc = "field to offset")]
#[input(pin = 1, name = "scalar", types = "double")]
#[output(pin = 0, name = "field", types = "field")]
struct AddFloatToFieldData;

impl CustomOperator for AddFloatToFieldData {
    fn run(&mut self, ctx: &mut OperatorContext<'_>) -> anyhow::Result<()> {
        let field = ctx.get_input(0, SemanticTag::Field)?.into_object()?;
        let scalar = ctx.input(1)?.as_f64().unwrap_or_default();
        let data: Vec<f64> = ctx.field_data(&field)?.iter().map(|v| v + scalar).collect();
        let out = ctx.new_field(&data)?;
        ctx.set_output(0, out)?;
        Ok(())
    }
}

#[derive(Default, CustomOperator)]
#[operator(name = "custom_count_calls", scripting_name = "count_calls")]
#[input(pin = 0, name = "values", types = "field, collection", optional)]
#[output(pin = 0, name = "calls", types = "int32")]
struct CountCalls {
    calls: i32,
}

impl CustomOperator for CountCalls {
    fn run(&mut self, ctx: &mut OperatorContext<'_>) -> anyhow::Result<()> {
        self.calls += 1;
        ctx.set_output(0, self.calls)?;
        Ok(())
    }
}

#[derive(Default, CustomOperator)]
#[operator(name = "custom_alias_spellings")]
#[input(pin = 0, name = "count", types = "int")]
#[input(pin = 1, name = "factor", types = "float, f64")]
#[input(pin = 2, name = "mesh", types = "mesh")]
#[output(pin = 0, name = "values", types = "vector<double>")]
struct AliasSpellings;

impl CustomOperator for AliasSpellings {
    fn run(&mut self, ctx: &mut OperatorContext<'_>) -> anyhow::Result<()> {
        let count = ctx.input(0)?.as_int().unwrap_or_default();
        ctx.set_output(0, vec![0.0; count.max(0) as usize])?;
        Ok(())
    }
}

#[test]
fn test_derive_accepts_the_same_tag_spellings_as_from_str() {
    let spec = AliasSpellings.specification();
    let tags = |pin: i32| spec.input(pin).unwrap().type_names.clone();
    assert_eq!(tags(0), vec!["int".parse::<SemanticTag>().unwrap()]);
    assert_eq!(tags(0), vec![SemanticTag::Int32]);
    // Both spellings name the same tag
    assert_eq!(tags(1), vec![SemanticTag::Double]);
    assert_eq!(tags(2), vec!["mesh".parse::<SemanticTag>().unwrap()]);
    assert_eq!(
        spec.output(0).unwrap().type_names,
        vec!["vector<double>".parse::<SemanticTag>().unwrap()]
    );
}

#[test]
fn test_derived_definition() {
    let spec = AddFloatToFieldData.specification();
    assert_eq!(AddFloatToFieldData.name(), "custom_add_to_field");
    assert_eq!(spec.category, "math");
    assert_eq!(spec.description, "Add a scalar to a field.");
    assert_eq!(spec.input(0).unwrap().document, "field to offset");
    assert_eq!(spec.input(1).unwrap().type_names, vec![SemanticTag::Double]);

    let spec = CountCalls::default().specification();
    assert_eq!(spec.scripting_name, "count_calls");
    assert_eq!(spec.category, "custom");
    let values = spec.input(0).unwrap();
    assert!(values.optional);
    assert_eq!(values.type_names, vec![SemanticTag::Field, SemanticTag::Collection]);
}

#[test]
fn test_server_start_records_derived_operators() {
    let server = Server::start(ServerConfig::default()).unwrap();
    let recorded = recorded_operators();
    assert!(recorded.contains(&"custom_add_to_field".to_string()));
    assert!(recorded.contains(&"custom_count_calls".to_string()));

    let op = Operator::with_server("custom_add_to_field", &server).unwrap();
    let field = server.new_field(&[0.0, -1.0]).unwrap();
    op.inputs().connect(&field).unwrap();
    op.inputs().connect(2.5).unwrap();
    let out = op.outputs().get("field").unwrap().get_object().unwrap();
    assert_eq!(server.field_data(&out).unwrap(), vec![2.5, 1.5]);
}

#[test]
fn test_derived_operator_keeps_state_between_evaluations() {
    let server = Server::start(ServerConfig::default()).unwrap();
    let op = Operator::with_server("custom_count_calls", &server).unwrap();
    let first = op.get_output(0, SemanticTag::Int32).unwrap().as_int().unwrap();
    // Cached until an input changes
    assert_eq!(op.get_output(0, SemanticTag::Int32).unwrap(), Value::Int(first));
    op.connect(0, vec![1, 2]).unwrap();
    assert_eq!(op.get_output(0, SemanticTag::Int32).unwrap(), Value::Int(first + 1));
}

#[test]
fn test_servers_without_autoload_do_not_know_derived_operators() {
    let config = ServerConfig {
        load_registered_operators: false,
        ..ServerConfig::default()
    };
    let server = Server::start(config).unwrap();
    let err = Operator::with_server("custom_count_calls", &server).unwrap_err();
    assert!(matches!(err, DpfError::UnknownOperator(_)));
}
