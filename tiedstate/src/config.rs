//! Acoustic model loading options.

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default feature vector length
const DEFAULT_VECTOR_LENGTH: usize = 39;

/// Default model definition file name
const DEFAULT_MODEL_DEFINITION: &str = "models.mdef";

/// Default pool subdirectory
const DEFAULT_DATA_LOCATION: &str = "data";

/// Default mixture component score floor (linear domain)
const DEFAULT_MC_FLOOR: f32 = 0.0;

/// Default variance floor
const DEFAULT_VARIANCE_FLOOR: f32 = 1e-4;

/// Default mixture weight floor
const DEFAULT_MW_FLOOR: f32 = 1e-7;

/// Default log-math base
const DEFAULT_LOG_BASE: f32 = 1.0001;

/// Configuration for loading and querying a tied-state acoustic model.
///
/// Usable as flattened CLI arguments, as a JSON config document, or through
/// [`Default`].
#[derive(clap::Args, Clone, Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelConfig {
    /// Synthesize composite HMMs for partially specified contexts
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub use_composites: bool,

    /// Pool files are in binary (true) or ASCII (false) format
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub is_binary: bool,

    /// ASCII transition matrices store only the diagonal and super-diagonal
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sparse_form: bool,

    /// Feature vector length
    #[arg(long, default_value_t = DEFAULT_VECTOR_LENGTH)]
    pub vector_length: usize,

    /// Model definition file, relative to the model directory
    #[arg(long, default_value = DEFAULT_MODEL_DEFINITION)]
    pub model_definition: String,

    /// Pool directory, relative to the model directory
    #[arg(long, default_value = DEFAULT_DATA_LOCATION)]
    pub data_location: PathBuf,

    /// Lowest mixture component score, in the linear domain
    #[arg(long, default_value_t = DEFAULT_MC_FLOOR)]
    #[serde(rename = "MixtureComponentScoreFloor")]
    pub mixture_component_score_floor: f32,

    /// Lowest allowed variance
    #[arg(long, default_value_t = DEFAULT_VARIANCE_FLOOR)]
    pub variance_floor: f32,

    /// Lowest allowed mixture weight
    #[arg(long, default_value_t = DEFAULT_MW_FLOOR)]
    pub mixture_weight_floor: f32,

    /// Load context-dependent (triphone) units
    #[arg(long = "use-cd-units", default_value_t = true, action = clap::ArgAction::Set)]
    #[serde(rename = "useCDUnits")]
    pub use_cd_units: bool,

    /// Base of the log domain used by every pool and score
    #[arg(long, default_value_t = DEFAULT_LOG_BASE)]
    pub log_base: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            use_composites: true,
            is_binary: true,
            sparse_form: true,
            vector_length: DEFAULT_VECTOR_LENGTH,
            model_definition: DEFAULT_MODEL_DEFINITION.to_string(),
            data_location: PathBuf::from(DEFAULT_DATA_LOCATION),
            mixture_component_score_floor: DEFAULT_MC_FLOOR,
            variance_floor: DEFAULT_VARIANCE_FLOOR,
            mixture_weight_floor: DEFAULT_MW_FLOOR,
            use_cd_units: true,
            log_base: DEFAULT_LOG_BASE,
        }
    }
}

impl ModelConfig {
    /// Load configuration overrides from a JSON file.
    ///
    /// Keys missing from the document keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse configuration overrides from a JSON string.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that the loaders cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.log_base.is_finite() && self.log_base > 1.0) {
            return Err(ConfigError::InvalidLogBase(self.log_base).into());
        }
        Ok(())
    }

    /// File name suffix for pool files in the configured format.
    pub fn pool_suffix(&self) -> &'static str {
        if self.is_binary { "" } else { ".ascii" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ModelConfig,
    }

    #[test]
    fn cli_defaults_match_default_impl() {
        let cli = TestCli::parse_from(["test"]);

        assert_eq!(cli.config, ModelConfig::default());
    }

    #[test]
    fn parses_cli_overrides() {
        let cli = TestCli::parse_from([
            "test",
            "--is-binary",
            "false",
            "--use-cd-units",
            "false",
            "--vector-length",
            "13",
            "--data-location",
            "pools",
        ]);

        assert!(!cli.config.is_binary);
        assert!(!cli.config.use_cd_units);
        assert_eq!(cli.config.vector_length, 13);
        assert_eq!(cli.config.data_location, PathBuf::from("pools"));
        assert!(cli.config.use_composites);
    }

    #[test]
    fn json_overrides_keep_other_defaults() {
        let json = r#"{"isBinary": false, "sparseForm": false, "useCDUnits": false}"#;
        let config = ModelConfig::from_json(json).unwrap();

        assert!(!config.is_binary);
        assert!(!config.sparse_form);
        assert!(!config.use_cd_units);
        assert_eq!(config.vector_length, 39);
        assert_eq!(config.model_definition, "models.mdef");
        assert_eq!(config.pool_suffix(), ".ascii");
    }

    #[test]
    fn log_base_must_exceed_one() {
        for json in [r#"{"logBase": 1.0}"#, r#"{"logBase": 0.5}"#, r#"{"logBase": -2.0}"#] {
            assert!(matches!(
                ModelConfig::from_json(json),
                Err(crate::error::Error::Config(ConfigError::InvalidLogBase(_)))
            ));
        }
        assert!(ModelConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_malformed_json() {
        let result = ModelConfig::from_json("{not json");

        assert!(matches!(
            result,
            Err(crate::error::Error::Config(ConfigError::Json(_)))
        ));
    }
}
