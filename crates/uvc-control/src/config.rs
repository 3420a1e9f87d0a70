//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::blacklist::BlacklistRule;
use crate::entity::EntityKind;
use crate::error::{ControlError, ControlResult};

/// Behaviour switches for a [`ControlDevice`](crate::ControlDevice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Snap integer writes to the device step and clamp them to `[min, max]`.
    pub clamp_to_range: bool,
    /// Resolve extension-unit controls on first access instead of right after
    /// discovery.
    pub lazy_extension_units: bool,
    /// After a failed commit, write the backup value back to controls the
    /// device already accepted.
    pub compensate_on_commit_failure: bool,
    /// Rules applied on top of the built-in blacklist.
    pub extra_blacklist: Vec<BlacklistRule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clamp_to_range: true,
            lazy_extension_units: true,
            compensate_on_commit_failure: true,
            extra_blacklist: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a blacklist rule targets an entity without controls
    /// or appears twice.
    pub fn validate(&self) -> ControlResult<()> {
        let mut seen = HashSet::new();
        for rule in &self.extra_blacklist {
            if let EntityKind::Other(subtype) = rule.entity {
                return Err(ControlError::invalid_configuration(format!(
                    "blacklist rule for {:04x}:{:04x} targets entity type {subtype:#06x}, which has no controls",
                    rule.vendor_id, rule.product_id
                )));
            }
            if !seen.insert(*rule) {
                return Err(ControlError::invalid_configuration(format!(
                    "duplicate blacklist rule for {:04x}:{:04x} index {}",
                    rule.vendor_id, rule.product_id, rule.index
                )));
            }
        }
        Ok(())
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for `EngineConfig`.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    #[must_use]
    pub fn clamp_to_range(mut self, enabled: bool) -> Self {
        self.config.clamp_to_range = enabled;
        self
    }

    #[must_use]
    pub fn lazy_extension_units(mut self, enabled: bool) -> Self {
        self.config.lazy_extension_units = enabled;
        self
    }

    #[must_use]
    pub fn compensate_on_commit_failure(mut self, enabled: bool) -> Self {
        self.config.compensate_on_commit_failure = enabled;
        self
    }

    /// Append a blacklist rule.
    #[must_use]
    pub fn blacklist(mut self, rule: BlacklistRule) -> Self {
        self.config.extra_blacklist.push(rule);
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> ControlResult<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
