//! Configuration management for the training session
//!
//! This module provides runtime configuration loading from JSON files so
//! stream shape, label count, debounce timing, and persistence locations
//! can be adjusted without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Input stream shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Number of values per row (N); fixed for the process lifetime
    pub dimensions: usize,
    /// Optional per-dimension names shown by presentation layers
    #[serde(default)]
    pub labels: Vec<String>,
    /// Rows of live history retained for range extraction
    #[serde(default = "default_history_rows")]
    pub history_rows: usize,
}

fn default_history_rows() -> usize {
    1024
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            dimensions: 3,
            labels: Vec::new(),
            history_rows: default_history_rows(),
        }
    }
}

/// Training data and scheduler parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of class labels (labels are 1..=max_labels)
    pub max_labels: u32,
    /// Minimum selection width accepted by trim and range views
    pub min_trim_rows: usize,
    /// Delay between a training request and the run, so status can render first
    pub training_delay_ms: u64,
    /// Feature vectors at or above this width are presented as one aggregate vector
    pub too_many_features_threshold: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_labels: 9,
            min_trim_rows: 10,
            training_delay_ms: 50,
            too_many_features_threshold: 32,
        }
    }
}

/// Calibration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Minimum rows a calibration recording must contain before fitting
    pub min_samples: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self { min_samples: 10 }
    }
}

/// Default persistence locations used by shutdown auto-save
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub data_dir: PathBuf,
    pub calibration_file: String,
    pub training_file: String,
    pub test_file: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            calibration_file: "CalibrationData.json".to_string(),
            training_file: "TrainingData.json".to_string(),
            test_file: "TestData.json".to_string(),
        }
    }
}

impl PersistenceConfig {
    pub fn calibration_path(&self) -> PathBuf {
        self.data_dir.join(&self.calibration_file)
    }

    pub fn training_path(&self) -> PathBuf {
        self.data_dir.join(&self.training_file)
    }

    pub fn test_path(&self) -> PathBuf {
        self.data_dir.join(&self.test_file)
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/esp_config.json")
    }

    /// Builder-style override of the stream dimensionality
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.stream.dimensions = dimensions;
        self
    }
}
