//! Solver and evaluation settings, loadable from TOML.
//!
//! ```toml
//! chop_tolerance = 1e-10
//!
//! [ik]
//! tolerance = 1e-6
//! max_iter = 200
//! pinv_eps = 1e-10
//! ```
//!
//! Missing keys take their default values.

use std::fs::read_to_string;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::kinematics::{IkSolveParam, CHOP_TOLERANCE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read the config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse the config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct KinematicsConfig {
    /// Numeric pose entries below this magnitude are reported as zero.
    pub chop_tolerance: f64,
    pub ik: IkSolveParam,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            chop_tolerance: CHOP_TOLERANCE,
            ik: IkSolveParam::default(),
        }
    }
}

impl KinematicsConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = read_to_string(path)?;
        Self::from_toml_str(&s)
    }
}
