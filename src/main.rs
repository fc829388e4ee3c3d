use anyhow::Result;
use dpf_core::operators::{min_max, result};
use dpf_core::server;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("DPF Core - Stress Pipeline Demo");
    println!("===============================\n");

    let server = server::global()?;
    println!("Engine: {}\n", server.description());

    let stress = result::stress()?;
    let data_sources = server.new_data_sources("file.rst")?;
    stress.inputs().data_sources().connect(&data_sources)?;
    stress.inputs().time_scoping().connect(vec![1, 2, 3])?;
    println!("{}", stress.specification());

    let min_max = min_max::min_max_fc()?;
    min_max
        .inputs()
        .fields_container()
        .connect(stress.outputs().fields_container())?;

    let field_min = min_max.outputs().field_min().get_object()?;
    let field_max = min_max.outputs().field_max().get_object()?;
    let mins = server.field_data(&field_min)?;
    let maxs = server.field_data(&field_max)?;
    for (set, (lo, hi)) in mins.iter().zip(&maxs).enumerate() {
        println!("time set {}: min = {:.3e}, max = {:.3e}", set + 1, lo, hi);
    }

    server::shutdown_global();
    Ok(())
}
