use dpf_core::engine::mock::MockEngine;
use dpf_core::operators::mesh::MeshProvider;
use dpf_core::operators::result::Stress;
use dpf_core::operators::utility::forward_of;
use dpf_core::{registry, DpfError, Operator, SemanticTag, Server, ServerConfig, Value};
use std::sync::Arc;

fn mock_server() -> (Arc<MockEngine>, Arc<Server>) {
    let engine = Arc::new(MockEngine::new());
    let server = Server::with_engine(engine.clone(), ServerConfig::default());
    (engine, server)
}

#[test]
fn test_every_pin_name_is_on_the_facades() {
    let server = Server::in_process();
    for name in registry::available_operator_names() {
        let spec = registry::get(&name).unwrap();
        let op = Operator::with_server(&name, &server).unwrap_or_else(|err| panic!("{name}: {err}"));
        let inputs = op.inputs().names();
        for pin in spec.inputs.values() {
            assert!(inputs.contains(&pin.name), "{name}: missing input {}", pin.name);
        }
        let outputs = op.outputs().names();
        for pin in spec.outputs.values() {
            assert!(outputs.contains(&pin.name), "{name}: missing output {}", pin.name);
        }
    }
}

#[test]
fn test_scalar_round_trip_through_forward() {
    let server = Server::in_process();
    let cases = [
        (SemanticTag::Bool, Value::Bool(true)),
        (SemanticTag::Bool, Value::Bool(false)),
        (SemanticTag::Int32, Value::Int(-42)),
        (SemanticTag::Double, Value::Double(0.125)),
        (SemanticTag::String, Value::from("file.rst")),
    ];
    for (tag, value) in cases {
        let op = forward_of(tag, &server).unwrap();
        op.connect(0, value.clone()).unwrap();
        assert_eq!(op.outputs().by_index(0).unwrap().get().unwrap(), value, "{tag}");
    }
}

#[test]
fn test_collection_round_trip_through_forward() {
    let server = Server::in_process();
    let op = forward_of(SemanticTag::Collection, &server).unwrap();
    let output = op.outputs().by_index(0).unwrap();

    op.connect(0, vec![3, 1, 2]).unwrap();
    assert_eq!(output.get_ints().unwrap(), vec![3, 1, 2]);

    op.connect(0, vec![0.5, 1.5]).unwrap();
    assert_eq!(output.get_doubles().unwrap(), vec![0.5, 1.5]);
}

#[test]
fn test_object_round_trip_through_forward() {
    let server = Server::in_process();
    let field = server.new_field(&[1.0, 2.0]).unwrap();
    let objects = [
        (SemanticTag::Field, field.clone()),
        (SemanticTag::Scoping, server.new_scoping(&[1, 2, 3]).unwrap()),
        (SemanticTag::DataSources, server.new_data_sources("model.rst").unwrap()),
        (SemanticTag::FieldsContainer, server.new_fields_container(&[field]).unwrap()),
    ];
    for (tag, object) in objects {
        let op = forward_of(tag, &server).unwrap();
        op.connect(0, &object).unwrap();
        let back = op.outputs().by_index(0).unwrap().get_object().unwrap();
        assert_eq!(back, object, "{tag}");
    }

    let mesh_provider = MeshProvider::with_server(&server).unwrap();
    mesh_provider
        .inputs()
        .data_sources()
        .connect(server.new_data_sources("model.rst").unwrap())
        .unwrap();
    let mesh = mesh_provider.outputs().mesh().get_object().unwrap();
    let op = forward_of(SemanticTag::MeshedRegion, &server).unwrap();
    op.connect(0, &mesh).unwrap();
    assert_eq!(op.outputs().by_index(0).unwrap().get_object().unwrap(), mesh);
}

#[test]
fn test_repeated_reads_are_idempotent() {
    let (engine, server) = mock_server();
    let stress = Stress::with_server(&server).unwrap();
    stress
        .inputs()
        .data_sources()
        .connect(server.new_data_sources("file.rst").unwrap())
        .unwrap();

    let first = stress.outputs().fields_container().get().unwrap();
    let second = stress.outputs().fields_container().get().unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.generation(stress.handle()), Some(1));
}

#[test]
fn test_reconnection_replaces_the_edge() {
    let server = Server::in_process();
    let op = forward_of(SemanticTag::Double, &server).unwrap();
    op.connect(0, 1.0).unwrap();
    assert_eq!(op.get_output(0, SemanticTag::Double).unwrap(), Value::Double(1.0));

    op.connect(0, 2.0).unwrap();
    assert_eq!(
        op.connected_inputs().get(&0).and_then(|c| c.as_value().cloned()),
        Some(Value::Double(2.0))
    );
    assert_eq!(op.get_output(0, SemanticTag::Double).unwrap(), Value::Double(2.0));

    let producer = forward_of(SemanticTag::Double, &server).unwrap();
    producer.connect(0, 3.0).unwrap();
    op.connect(0, producer.outputs()).unwrap();
    assert!(op.connection(0).unwrap().producer().unwrap().0.same_instance(&producer));
    assert_eq!(op.get_output(0, SemanticTag::Double).unwrap(), Value::Double(3.0));

    // Upstream changes are seen through the edge
    producer.connect(0, 4.0).unwrap();
    assert_eq!(op.get_output(0, SemanticTag::Double).unwrap(), Value::Double(4.0));
}

#[test]
fn test_bool_never_resolves_to_int32() {
    assert_eq!(Value::from(true).tag(), SemanticTag::Bool);
    assert_eq!(Value::from(false).tag(), SemanticTag::Bool);

    let server = Server::in_process();
    let ints = forward_of(SemanticTag::Int32, &server).unwrap();
    let err = ints.connect(0, true).unwrap_err();
    assert!(matches!(err, DpfError::TypeMismatch(_)));

    let stress = Stress::with_server(&server).unwrap();
    stress.inputs().connect(true).unwrap();
    assert_eq!(
        stress.connection(5).and_then(|c| c.as_value().cloned()),
        Some(Value::Bool(true))
    );

    // Several int32 pins: the value alone cannot pick one
    let err = stress.inputs().connect(3).unwrap_err();
    match err {
        DpfError::AmbiguousConnection { candidates, .. } => {
            assert!(candidates.contains(&"stress.inputs.read_cyclic".to_string()));
            assert!(candidates.contains(&"stress.inputs.domain_id".to_string()));
        }
        other => panic!("expected an ambiguous connection, got {other:?}"),
    }
}

#[test]
fn test_whole_facade_connect_prefers_role_labels() {
    let server = Server::in_process();
    let stress = Stress::with_server(&server).unwrap();
    let data_sources = server.new_data_sources("file.rst").unwrap();
    stress.inputs().connect(&data_sources).unwrap();
    assert!(stress.connection(4).is_some());

    // add_fc has two fields container inputs and neither carries the role label
    let add = Operator::with_server("add_fc", &server).unwrap();
    let err = add.inputs().connect(stress.outputs()).unwrap_err();
    assert!(matches!(err, DpfError::AmbiguousConnection { .. }));

    // scale_fc's `field` input is the only match
    let scale = Operator::with_server("scale_fc", &server).unwrap();
    scale.inputs().connect(&stress).unwrap();
    assert!(scale.connection(0).is_some());
}

#[test]
fn test_no_compatible_output() {
    let server = Server::in_process();
    let strings = forward_of(SemanticTag::String, &server).unwrap();
    let doubles = forward_of(SemanticTag::Double, &server).unwrap();
    let err = doubles.connect(0, strings.outputs()).unwrap_err();
    assert!(matches!(err, DpfError::NoCompatibleOutput(_)));
    assert!(err.to_string().contains("double"));
    assert!(doubles.connected_inputs().is_empty());
}

#[test]
fn test_everything_is_released() {
    let (engine, server) = mock_server();
    {
        let stress = Stress::with_server(&server).unwrap();
        stress.connect(4, server.new_data_sources("file.rst").unwrap()).unwrap();
        let min_max = Operator::with_server("min_max_fc", &server).unwrap();
        min_max.connect(0, &*stress).unwrap();
        drop(stress);
        let field_max = min_max.outputs().get("field_max").unwrap().get_object().unwrap();
        assert_eq!(field_max.tag(), SemanticTag::Field);
    }
    assert_eq!(engine.live_operators(), 0);
    assert_eq!(engine.live_objects(), 0);
}

#[test]
fn test_shutdown_invalidates_operators() {
    let server = Server::in_process();
    let op = forward_of(SemanticTag::Int32, &server).unwrap();
    op.connect(0, 1).unwrap();
    server.shutdown();
    assert!(matches!(op.run(), Err(DpfError::ConnectionLost(_))));
    assert!(matches!(op.connect(0, 2), Err(DpfError::ConnectionLost(_))));
    assert!(matches!(
        Operator::with_server("forward_int32", &server),
        Err(DpfError::ConnectionLost(_))
    ));
}

#[test]
fn test_evaluation_failures_are_engine_errors() {
    let server = Server::in_process();
    let forward = Operator::with_server("forward", &server).unwrap();
    forward.connect(0, 1.5).unwrap();
    let min_max = Operator::with_server("min_max_fc", &server).unwrap();
    min_max.connect(0, forward.outputs().by_index(0).unwrap()).unwrap();

    let err = min_max.get_output(0, SemanticTag::Field).unwrap_err();
    assert!(matches!(err, DpfError::Engine(_)), "{err:?}");
    assert!(err.to_string().contains("cannot compute min/max of a double"));

    // The untyped read reports the same failure instead of trying other tags
    let err = min_max.outputs().get("field_min").unwrap().get().unwrap_err();
    assert!(matches!(err, DpfError::Engine(_)), "{err:?}");
}
