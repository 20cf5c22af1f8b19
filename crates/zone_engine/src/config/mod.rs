//! Configuration system

use crate::geometry::CellLimits;
use crate::tiers::{Accuracy, Detection};
pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// # Zone Configuration
///
/// Engine-wide settings shared by every zone in a registry, plus the
/// defaults applied to newly constructed zones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Largest extent the scene allows for a single body; larger regions
    /// are decomposed into cells of at most this size
    pub max_part_size: f32,
    /// Most cells a single box may be decomposed into; construction fails
    /// beyond this
    pub max_region_cells: usize,
    /// Minimum seconds between two structural recomputations of a zone
    /// when it respects the update queue
    pub update_queue_interval: f64,
    /// Player count at which `Automatic` detection switches to `Centre`
    pub automatic_detection_threshold: usize,
    /// Accuracy given to new zones
    pub default_accuracy: Accuracy,
    /// Enter detection given to new zones
    pub default_enter_detection: Detection,
    /// Exit detection given to new zones
    pub default_exit_detection: Detection,
    /// Whether new zones recompute when their bodies change
    pub auto_update: bool,
    /// Whether new zones debounce structural recomputation
    pub respect_update_queue: bool,
    /// Rejection-sampling attempts when picking random points in ball parts
    pub random_point_attempts: u32,
}

impl ZoneConfig {
    /// Create a configuration with engine defaults
    pub fn new() -> Self {
        Self {
            max_part_size: 2048.0,
            max_region_cells: 4096,
            update_queue_interval: 0.1,
            automatic_detection_threshold: 100,
            default_accuracy: Accuracy::High,
            default_enter_detection: Detection::Automatic,
            default_exit_detection: Detection::Automatic,
            auto_update: true,
            respect_update_queue: true,
            random_point_attempts: 20,
        }
    }

    /// Set the maximum body extent
    pub fn with_max_part_size(mut self, size: f32) -> Self {
        self.max_part_size = size;
        self
    }

    /// Set the cell cap for decomposed boxes
    pub fn with_max_region_cells(mut self, cells: usize) -> Self {
        self.max_region_cells = cells;
        self
    }

    /// Decomposition limits derived from this configuration
    pub fn cell_limits(&self) -> CellLimits {
        CellLimits::new(self.max_part_size, self.max_region_cells)
    }

    /// Set the `Automatic` detection switch threshold
    pub fn with_automatic_threshold(mut self, players: usize) -> Self {
        self.automatic_detection_threshold = players;
        self
    }

    /// Set the default accuracy for new zones
    pub fn with_default_accuracy(mut self, accuracy: Accuracy) -> Self {
        self.default_accuracy = accuracy;
        self
    }

    /// Set the default enter and exit detection for new zones
    pub fn with_default_detection(mut self, detection: Detection) -> Self {
        self.default_enter_detection = detection;
        self.default_exit_detection = detection;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_part_size.is_finite() && self.max_part_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_part_size must be positive, got {}",
                self.max_part_size
            )));
        }

        if self.max_region_cells == 0 {
            return Err(ConfigError::Invalid(
                "max_region_cells must be at least 1".to_string(),
            ));
        }

        if !(self.update_queue_interval.is_finite() && self.update_queue_interval >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "update_queue_interval must be non-negative, got {}",
                self.update_queue_interval
            )));
        }

        if self.random_point_attempts == 0 {
            return Err(ConfigError::Invalid(
                "random_point_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for ZoneConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ZoneConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_accuracy, Accuracy::High);
        assert_eq!(config.automatic_detection_threshold, 100);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ZoneConfig = toml::from_str(
            "default_accuracy = \"Precise\"\nautomatic_detection_threshold = 8\n",
        )
        .unwrap();

        assert_eq!(config.default_accuracy, Accuracy::Precise);
        assert_eq!(config.automatic_detection_threshold, 8);
        assert_eq!(config.max_part_size, 2048.0);
        assert_eq!(config.max_region_cells, 4096);
    }

    #[test]
    fn test_ron_round_trip() {
        let config = ZoneConfig::new().with_default_detection(Detection::Centre);
        let text = ron::ser::to_string_pretty(&config, Default::default()).unwrap();
        let back: ZoneConfig = ron::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = ZoneConfig::new().with_max_part_size(0.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = ZoneConfig::new().with_max_region_cells(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = ZoneConfig::load_from_file("zones.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_) | ConfigError::UnsupportedFormat(_)));
    }
}
