//! Configuration file parser for APML

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::{
    error::{ReconError, Result},
    penalty::Penalty,
    system_matrix::SystemMatrixKind,
    types::{Lengthf32, Ratiof32},
};

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {

    /// Number of APML iterations to perform
    pub iterations: usize,

    /// Number of pixels along each side of the reconstructed slices
    pub grid: usize,

    /// Strength of the neighbourhood penalty: 0 gives plain MLEM
    #[serde(default)]
    pub beta: Ratiof32,

    /// Detector pixel coordinate of the rotation axis. Defaults to the middle
    /// of the detector.
    #[serde(default)]
    pub center: Option<Lengthf32>,

    #[serde(default)]
    pub penalty: Penalty,

    #[serde(default)]
    pub projector: SystemMatrixKind,

    /// Size of a dedicated thread pool. Defaults to rayon's global pool.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Config {

    /// Unpenalized reconstruction with the default projector
    pub fn new(iterations: usize, grid: usize) -> Self {
        Self {
            iterations, grid,
            beta     : 0.0,
            center   : None,
            penalty  : Penalty::default(),
            projector: SystemMatrixKind::default(),
            threads  : None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(ReconError::InvalidParameter(message));
        if self.grid == 0 {
            return invalid("grid size must be positive, got 0".into());
        }
        if !(self.beta.is_finite() && self.beta >= 0.0) {
            return invalid(format!("beta must be finite and non-negative, got {}", self.beta));
        }
        if let Some(center) = self.center {
            if !center.is_finite() {
                return invalid(format!("centre of rotation must be finite, got {center}"));
            }
        }
        if self.threads == Some(0) {
            return invalid("thread pool needs at least one thread".into());
        }
        self.penalty.validate()
    }
}

impl FromStr for Config {
    type Err = ReconError;
    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

pub fn read_config_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|source| ReconError::ConfigIo { path: path.to_owned(), source })?;
    text.parse()
}
