use anyhow::{anyhow, Result};
use dpf_core::operators::utility::MergeFields;
use dpf_core::{
    record_operator, server, CustomOperator, Operator, OperatorContext, SemanticTag,
};
use tracing_subscriber::EnvFilter;

#[derive(Default, CustomOperator)]
#[operator(name = "custom_add_to_field", category = "math", description = "Add a scalar to every value of a field.")]
#[input(pin = 0, name = "field", types = "field")]
#[input(pin = 1, name = "scalar", types = "double")]
#[output(pin = 0, name = "field", types = "field")]
struct AddFloatToFieldData;

impl CustomOperator for AddFloatToFieldData {
    fn run(&mut self, ctx: &mut OperatorContext<'_>) -> Result<()> {
        let field = ctx.get_input(0, SemanticTag::Field)?.into_object()?;
        let scalar = ctx
            .get_input(1, SemanticTag::Double)?
            .as_f64()
            .ok_or_else(|| anyhow!("scalar is not a number"))?;
        let data: Vec<f64> = ctx.field_data(&field)?.iter().map(|v| v + scalar).collect();
        let out = ctx.new_field(&data)?;
        ctx.set_output(0, out)?;
        Ok(())
    }
}

#[derive(Default, CustomOperator)]
#[operator(name = "custom_reject_negative", category = "demo")]
#[input(pin = 0, name = "field", types = "field")]
#[output(pin = 0, name = "field", types = "field")]
struct RejectNegative;

impl CustomOperator for RejectNegative {
    fn run(&mut self, ctx: &mut OperatorContext<'_>) -> Result<()> {
        let field = ctx.get_input(0, SemanticTag::Field)?.into_object()?;
        let data = ctx.field_data(&field)?;
        if let Some(v) = data.iter().find(|v| **v < 0.0) {
            return Err(anyhow!("negative value {} in field", v));
        }
        ctx.set_output(0, field)?;
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("DPF Core - Custom Operator Demo");
    println!("===============================\n");

    // Derived operators are recorded when the server starts; this one is
    // recorded again explicitly to show the manual path
    let server = server::global()?;
    record_operator(AddFloatToFieldData)?;

    let merge = MergeFields::with_server(&server)?;
    for data in [[1.0, 2.0], [3.0, 4.0]] {
        merge.inputs().connect(server.new_field(&data)?)?;
    }
    println!("merge inputs: {:?}", merge.inputs().names());

    let add = Operator::new("custom_add_to_field")?;
    add.inputs().connect(merge.outputs().merged_field())?;
    add.inputs().get("scalar")?.connect(2.5)?;
    let out = add.outputs().get("field")?.get_object()?;
    println!("custom_add_to_field: {:?}", server.field_data(&out)?);

    let reject = Operator::new("custom_reject_negative")?;
    reject.connect(0, server.new_field(&[1.0, -2.0])?)?;
    match reject.outputs().by_index(0)?.get() {
        Ok(value) => println!("unexpected success: {}", value),
        Err(err) => println!("custom_reject_negative failed as expected:\n{}", err),
    }

    server::shutdown_global();
    Ok(())
}
