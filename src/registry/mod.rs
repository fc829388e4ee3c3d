//! Process-wide operator registry
//!
//! Maps `internal_name` to the operator specification. Populated once from
//! the static operator table. Custom operators are not listed here: each
//! [`Server`](crate::server::Server) keeps the ones recorded on it.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{DpfError, Result};
use crate::spec::OperatorSpecification;

/// Registry of available operator kinds
pub struct OperatorRegistry {
    specs: HashMap<String, Arc<OperatorSpecification>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self {
            specs: HashMap::new(),
        }
    }

    /// Registry holding every row of the static operator table
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for spec in crate::operators::builtin_specifications() {
            registry.register(spec);
        }
        registry
    }

    /// Add or replace the specification of `spec.internal_name`
    pub fn register(&mut self, spec: OperatorSpecification) -> Arc<OperatorSpecification> {
        let spec = Arc::new(spec);
        self.specs.insert(spec.internal_name.clone(), spec.clone());
        spec
    }

    pub fn get(&self, internal_name: &str) -> Result<Arc<OperatorSpecification>> {
        self.specs
            .get(internal_name)
            .cloned()
            .ok_or_else(|| DpfError::UnknownOperator(internal_name.to_string()))
    }

    pub fn contains(&self, internal_name: &str) -> bool {
        self.specs.contains_key(internal_name)
    }

    /// Sorted internal names
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.specs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn by_category(&self, category: &str) -> Vec<Arc<OperatorSpecification>> {
        let mut specs: Vec<_> = self
            .specs
            .values()
            .filter(|spec| spec.category == category)
            .cloned()
            .collect();
        specs.sort_by(|a, b| a.internal_name.cmp(&b.internal_name));
        specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static REGISTRY: Lazy<RwLock<OperatorRegistry>> =
    Lazy::new(|| RwLock::new(OperatorRegistry::with_builtins()));

/// Specification of a registered operator
pub fn get(internal_name: &str) -> Result<Arc<OperatorSpecification>> {
    REGISTRY.read().get(internal_name)
}

/// Register (or replace) an operator kind in the process-wide registry
pub fn register(spec: OperatorSpecification) -> Arc<OperatorSpecification> {
    debug!(operator = %spec.internal_name, "registering specification");
    REGISTRY.write().register(spec)
}

pub fn contains(internal_name: &str) -> bool {
    REGISTRY.read().contains(internal_name)
}

pub fn available_operator_names() -> Vec<String> {
    REGISTRY.read().list()
}

pub fn by_category(category: &str) -> Vec<Arc<OperatorSpecification>> {
    REGISTRY.read().by_category(category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registry = OperatorRegistry::with_builtins();
        assert!(registry.contains("S"));
        assert!(registry.contains("min_max_fc"));
        assert!(registry.contains("forward_fields_container"));
        assert_eq!(registry.get("S").unwrap().scripting_name, "stress");
    }

    #[test]
    fn test_unknown_operator() {
        let registry = OperatorRegistry::new();
        let err = registry.get("nope").unwrap_err();
        assert!(matches!(err, DpfError::UnknownOperator(name) if name == "nope"));
    }

    #[test]
    fn test_category_listing_is_sorted() {
        let registry = OperatorRegistry::with_builtins();
        let names: Vec<_> = registry
            .by_category("result")
            .iter()
            .map(|spec| spec.internal_name.clone())
            .collect();
        assert_eq!(names, vec!["S".to_string(), "U".to_string()]);
    }
}
