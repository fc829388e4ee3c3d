use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

/// Engine-side options of one operator instance
///
/// Values are passed to the engine as strings; the typed setters cover the
/// options every operator understands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConfig {
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl OperatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl ToString) {
        self.options.insert(name.into(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    pub fn num_threads(self, threads: u32) -> Self {
        self.with_option("num_threads", threads)
    }

    pub fn run_in_parallel(self, enabled: bool) -> Self {
        self.with_option("run_in_parallel", enabled)
    }

    /// Serialise engine access for this operator
    pub fn mutex(self, enabled: bool) -> Self {
        self.with_option("mutex", enabled)
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_setters() {
        let config = OperatorConfig::new().num_threads(4).mutex(false);
        assert_eq!(config.get("num_threads"), Some("4"));
        assert_eq!(config.get("mutex"), Some("false"));
        assert_eq!(config.get("run_in_parallel"), None);
    }

    #[test]
    fn test_json_keeps_options() {
        let config = OperatorConfig::new().with_option("sectors", 6);
        let back = OperatorConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
