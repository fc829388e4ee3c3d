//! Server lifecycle and the collaborator object API
//!
//! A [`Server`] owns one engine. Operators, objects and recorded custom
//! operators all hold an `Arc<Server>`; shutting the server down invalidates
//! every handle and later calls fail with [`DpfError::ConnectionLost`].

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Backend, ServerConfig};
use crate::engine::mock::MockEngine;
use crate::engine::Engine;
use crate::error::{DpfError, Result};
use crate::registry;
use crate::spec::OperatorSpecification;
use crate::types::{ObjectRef, SemanticTag, Value};

pub struct Server {
    engine: Arc<dyn Engine>,
    config: ServerConfig,
    /// Custom operators recorded on this server's engine
    recorded: RwLock<HashMap<String, Arc<OperatorSpecification>>>,
}

impl Server {
    /// Start a server for `config`
    pub fn start(config: ServerConfig) -> Result<Arc<Self>> {
        let engine: Arc<dyn Engine> = match config.backend {
            Backend::InProcess => Arc::new(MockEngine::new()),
            Backend::Native => native_engine(&config)?,
        };
        let server = Self::with_engine(engine, config);
        info!(engine = %server.engine.description(), "server started");
        if server.config.load_registered_operators {
            crate::custom::record_registered_operators(&server)?;
        }
        Ok(server)
    }

    /// In-process server with default configuration
    pub fn in_process() -> Arc<Self> {
        Self::with_engine(Arc::new(MockEngine::new()), ServerConfig::default())
    }

    /// Wrap an already running engine
    pub fn with_engine(engine: Arc<dyn Engine>, config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            engine,
            config,
            recorded: RwLock::new(HashMap::new()),
        })
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn is_alive(&self) -> bool {
        self.engine.is_alive()
    }

    /// Error out early when the engine is gone
    pub fn check_alive(&self) -> Result<()> {
        if self.engine.is_alive() {
            Ok(())
        } else {
            Err(DpfError::ConnectionLost(
                "the engine is no longer running".to_string(),
            ))
        }
    }

    pub fn description(&self) -> String {
        self.engine.description()
    }

    /// Internal names the engine can instantiate
    pub fn available_operators(&self) -> Vec<String> {
        self.engine.available_operators()
    }

    /// Specification of an operator this server can instantiate: custom
    /// operators recorded here first, then the process-wide registry
    pub fn specification(&self, internal_name: &str) -> Result<Arc<OperatorSpecification>> {
        if let Some(spec) = self.recorded.read().get(internal_name) {
            return Ok(spec.clone());
        }
        registry::get(internal_name)
    }

    /// Names of the custom operators recorded on this server, sorted
    pub fn recorded_operators(&self) -> Vec<String> {
        let mut names: Vec<String> = self.recorded.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn add_recorded(&self, spec: OperatorSpecification) -> Arc<OperatorSpecification> {
        let spec = Arc::new(spec);
        self.recorded
            .write()
            .insert(spec.internal_name.clone(), spec.clone());
        spec
    }

    pub fn shutdown(&self) {
        if self.engine.is_alive() {
            info!("shutting down server");
            self.engine.shutdown();
        }
    }

    fn adopt(&self, tag: SemanticTag, handle: crate::engine::EngineHandle) -> ObjectRef {
        ObjectRef::adopt(self.engine.clone(), tag, handle)
    }

    fn own(&self, object: &ObjectRef, tag: SemanticTag) -> Result<crate::engine::EngineHandle> {
        if !object.belongs_to(&self.engine) {
            return Err(DpfError::Engine(format!("{} belongs to another server", object)));
        }
        if !object.is(tag) {
            return Err(DpfError::TypeMismatch(format!(
                "expected {}, got {}",
                tag,
                object.tag()
            )));
        }
        Ok(object.handle())
    }

    /// Data sources referencing a result file
    pub fn new_data_sources(&self, result_path: &str) -> Result<ObjectRef> {
        let handle = self.engine.data_sources_new(result_path)?;
        Ok(self.adopt(SemanticTag::DataSources, handle))
    }

    pub fn data_sources_result_path(&self, data_sources: &ObjectRef) -> Result<String> {
        let handle = self.own(data_sources, SemanticTag::DataSources)?;
        Ok(self.engine.data_sources_result_path(handle)?)
    }

    pub fn new_field(&self, data: &[f64]) -> Result<ObjectRef> {
        let handle = self.engine.field_new(data)?;
        Ok(self.adopt(SemanticTag::Field, handle))
    }

    pub fn field_data(&self, field: &ObjectRef) -> Result<Vec<f64>> {
        let handle = self.own(field, SemanticTag::Field)?;
        Ok(self.engine.field_data(handle)?)
    }

    pub fn new_fields_container(&self, fields: &[ObjectRef]) -> Result<ObjectRef> {
        let handles = fields
            .iter()
            .map(|field| self.own(field, SemanticTag::Field))
            .collect::<Result<Vec<_>>>()?;
        let handle = self.engine.fields_container_new(&handles)?;
        Ok(self.adopt(SemanticTag::FieldsContainer, handle))
    }

    pub fn fields_container_fields(&self, container: &ObjectRef) -> Result<Vec<ObjectRef>> {
        let handle = self.own(container, SemanticTag::FieldsContainer)?;
        Ok(self
            .engine
            .fields_container_fields(handle)?
            .into_iter()
            .map(|field| self.adopt(SemanticTag::Field, field))
            .collect())
    }

    pub fn new_scoping(&self, ids: &[i32]) -> Result<ObjectRef> {
        let handle = self.engine.scoping_new(ids)?;
        Ok(self.adopt(SemanticTag::Scoping, handle))
    }

    pub fn scoping_ids(&self, scoping: &ObjectRef) -> Result<Vec<i32>> {
        let handle = self.own(scoping, SemanticTag::Scoping)?;
        Ok(self.engine.scoping_ids(handle)?)
    }

    /// Data of a field value, for reading operator outputs
    pub fn field_values(&self, value: &Value) -> Result<Vec<f64>> {
        match value {
            Value::Object(obj) => self.field_data(obj),
            other => Err(DpfError::TypeMismatch(format!(
                "expected field, got {}",
                other.kind_name()
            ))),
        }
    }
}

#[cfg(feature = "native")]
fn native_engine(config: &ServerConfig) -> Result<Arc<dyn Engine>> {
    let engine = crate::engine::native::NativeEngine::start(config.engine_path.clone(), config.context)?;
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "native"))]
fn native_engine(_config: &ServerConfig) -> Result<Arc<dyn Engine>> {
    Err(DpfError::Config(
        "the native backend requires the `native` feature".to_string(),
    ))
}

static GLOBAL: Lazy<Mutex<Option<Arc<Server>>>> = Lazy::new(|| Mutex::new(None));

/// The process-wide server, started from the environment on first use
///
/// A server that was shut down is not restarted.
pub fn global() -> Result<Arc<Server>> {
    let mut global = GLOBAL.lock();
    if let Some(server) = global.as_ref() {
        return Ok(server.clone());
    }
    let server = Server::start(ServerConfig::from_env()?)?;
    *global = Some(server.clone());
    Ok(server)
}

/// Replace the process-wide server
pub fn set_global(server: Arc<Server>) {
    let previous = GLOBAL.lock().replace(server);
    if previous.is_some() {
        warn!("replacing the process-wide server");
    }
}

/// Shut down the process-wide server, if one was started
pub fn shutdown_global() {
    if let Some(server) = GLOBAL.lock().as_ref() {
        server.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_api_round_trip() {
        let server = Server::in_process();
        let field = server.new_field(&[1.0, 2.0]).unwrap();
        let fc = server.new_fields_container(&[field.clone()]).unwrap();
        let fields = server.fields_container_fields(&fc).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(server.field_data(&fields[0]).unwrap(), vec![1.0, 2.0]);
        let ds = server.new_data_sources("file.rst").unwrap();
        assert_eq!(server.data_sources_result_path(&ds).unwrap(), "file.rst");
    }

    #[test]
    fn test_wrong_object_kind() {
        let server = Server::in_process();
        let scoping = server.new_scoping(&[1, 2]).unwrap();
        let err = server.field_data(&scoping).unwrap_err();
        assert!(matches!(err, DpfError::TypeMismatch(_)));
    }

    #[test]
    fn test_shutdown_loses_connection() {
        let server = Server::in_process();
        server.shutdown();
        assert!(!server.is_alive());
        let err = server.new_field(&[1.0]).unwrap_err();
        assert!(matches!(err, DpfError::ConnectionLost(_)));
    }

    #[cfg(not(feature = "native"))]
    #[test]
    fn test_native_backend_needs_feature() {
        let config = ServerConfig {
            backend: Backend::Native,
            ..ServerConfig::default()
        };
        assert!(matches!(Server::start(config), Err(DpfError::Config(_))));
    }
}
