use crate::core::{CollectionError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings a unit of work hands to the collections attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    /// Allow a detached collection to load itself through a temporary session
    /// opened from the factory of the session it was detached from.
    pub initialize_lazy_state_outside_transactions: bool,

    /// Initial capacity of a collection's operation queue
    pub operation_queue_capacity: usize,

    /// Include collection contents in dual-association diagnostics
    pub include_contents_in_diagnostics: bool,
}

impl CollectionSettings {
    pub fn new() -> Self {
        Self {
            initialize_lazy_state_outside_transactions: false,
            operation_queue_capacity: 10,
            include_contents_in_diagnostics: false,
        }
    }

    /// Enable or disable loading through a temporary session
    pub fn initialize_lazy_state_outside_transactions(mut self, enabled: bool) -> Self {
        self.initialize_lazy_state_outside_transactions = enabled;
        self
    }

    /// Set the initial operation queue capacity
    pub fn operation_queue_capacity(mut self, capacity: usize) -> Self {
        self.operation_queue_capacity = capacity;
        self
    }

    /// Include collection contents in diagnostics
    pub fn include_contents_in_diagnostics(mut self, enabled: bool) -> Self {
        self.include_contents_in_diagnostics = enabled;
        self
    }

    /// Parse settings from a JSON document; missing fields keep their defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use rustmemodb_collections::CollectionSettings;
    ///
    /// let settings = CollectionSettings::from_json_str(
    ///     r#"{ "initialize_lazy_state_outside_transactions": true }"#,
    /// ).unwrap();
    /// assert!(settings.initialize_lazy_state_outside_transactions);
    /// assert_eq!(settings.operation_queue_capacity, 10);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.operation_queue_capacity == 0 {
            return Err(CollectionError::ConfigError(
                "operation_queue_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self::new()
    }
}
