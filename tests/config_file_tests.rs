use dpf_core::config::{Backend, ServerContext};
use dpf_core::operator::OperatorConfig;
use dpf_core::{DpfError, ServerConfig};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_missing_file_is_created_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("server.json");

    let config = ServerConfig::from_json_file(&path).unwrap();
    assert_eq!(config, ServerConfig::default());
    assert!(path.exists());

    let written: ServerConfig = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, config);
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("server.json");

    let config = ServerConfig {
        backend: Backend::Native,
        engine_path: Some(dir.path().join("engine")),
        context: ServerContext::Premium,
        load_registered_operators: false,
        ..ServerConfig::default()
    };
    config.save(&path).unwrap();
    assert!(!path.with_extension("tmp").exists());

    let loaded = ServerConfig::from_json_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_fields_take_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("server.json");
    fs::write(&path, r#"{ "version": "1.0" }"#).unwrap();

    let config = ServerConfig::from_json_file(&path).unwrap();
    assert_eq!(config.backend, Backend::InProcess);
    assert!(config.load_registered_operators);
}

#[test]
fn test_malformed_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("server.json");
    fs::write(&path, "{ not json").unwrap();

    let err = ServerConfig::from_json_file(&path).unwrap_err();
    assert!(matches!(err, DpfError::Config(_)));
    assert!(err.to_string().contains("server.json"));
}

#[test]
fn test_operator_config_json() {
    let config = OperatorConfig::from_json(r#"{ "options": { "num_threads": "4" } }"#).unwrap();
    assert_eq!(config.get("num_threads"), Some("4"));
    assert!(OperatorConfig::from_json("[]").is_err());
}
