//! Configuration for helpdesk
//!
//! Stored in .helpdesk/config.toml

use crate::Priority;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// helpdesk configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ticket ID prefix (e.g., "TKT")
    pub id_prefix: String,

    /// Zero-padded width of the ticket sequence number
    pub id_width: usize,

    /// Priority for new tickets when the requester does not pick one
    pub default_priority: Priority,

    /// Lowest rating (1-5) counted as a satisfied customer
    pub satisfaction_threshold: u8,

    /// Display settings
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id_prefix: "TKT".to_string(),
            id_width: 3,
            default_priority: Priority::Medium,
            satisfaction_threshold: 4,
            display: DisplayConfig::default(),
        }
    }
}

/// Display configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Use colors in output
    pub colors: bool,

    /// Date format for display
    pub date_format: String,

    /// Maximum subject length before truncation
    pub max_subject_length: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            colors: true,
            date_format: "%Y-%m-%d %H:%M".to_string(),
            max_subject_length: 60,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a TOML file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        self.validate()?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(format!("failed to serialize: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the store cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.id_prefix.is_empty() || self.id_prefix.contains('-') {
            return Err(crate::Error::Config(format!(
                "id_prefix must be non-empty and contain no '-': {:?}",
                self.id_prefix
            )));
        }
        if !(1..=5).contains(&self.satisfaction_threshold) {
            return Err(crate::Error::Config(format!(
                "satisfaction_threshold must be between 1 and 5, got {}",
                self.satisfaction_threshold
            )));
        }
        Ok(())
    }

    /// Generate a default config file with comments
    pub fn default_with_comments(prefix: &str) -> String {
        format!(
            r#"# helpdesk configuration

# Ticket ID prefix, tickets are numbered PREFIX-001, PREFIX-002, ...
id_prefix = "{prefix}"

# Zero-padded width of the ticket number
id_width = 3

# Priority for new tickets (low, medium, high, urgent)
default_priority = "medium"

# Lowest rating (1-5) that counts as a satisfied customer
satisfaction_threshold = 4

[display]
# Use colors in output
colors = true

# Date format for display (strftime format)
date_format = "%Y-%m-%d %H:%M"

# Maximum subject length before truncation
max_subject_length = 60
"#
        )
    }
}
