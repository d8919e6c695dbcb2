//! Configuration for the density model.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cts::{SymbolPrior, MAX_ALPHABET_SIZE};
use crate::error::{Error, Result};

/// Every cell is predicted from its left, up, up-left and up-right neighbours.
pub const NEIGHBOURHOOD_CONTEXT_LENGTH: usize = 4;

/// Parameters of a [`DensityModel`](crate::DensityModel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Rows of the downsampled frame.
    pub height: usize,
    /// Columns of the downsampled frame.
    pub width: usize,
    /// Number of intensity levels a pixel is quantized to.
    pub num_bins: usize,
    /// Scale of the exploration bonus.
    pub beta: f64,
    /// Context length of every tree. Only the four-neighbour context is supported.
    pub context_length: usize,
    /// Dirichlet prior of every estimator.
    pub symbol_prior: SymbolPrior,
    /// Update the cells on the rayon thread pool.
    pub parallel: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            height: 42,
            width: 42,
            num_bins: 8,
            beta: 0.05,
            context_length: NEIGHBOURHOOD_CONTEXT_LENGTH,
            symbol_prior: SymbolPrior::Laplace,
            parallel: true,
        }
    }
}

impl ModelConfig {
    pub fn with_grid(mut self, height: usize, width: usize) -> Self {
        self.height = height;
        self.width = width;
        self
    }

    pub fn with_bins(mut self, num_bins: usize) -> Self {
        self.num_bins = num_bins;
        self
    }

    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    pub fn with_symbol_prior(mut self, symbol_prior: SymbolPrior) -> Self {
        self.symbol_prior = symbol_prior;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Number of grid cells, i.e. of context trees.
    pub fn cells(&self) -> usize {
        self.height * self.width
    }

    /// Fails on any parameter the model cannot be built with.
    pub fn validate(&self) -> Result<()> {
        if self.height == 0 || self.width == 0 {
            return Err(Error::InvalidArgument(format!(
                "grid must be non-empty, got {}x{}",
                self.height, self.width
            )));
        }
        if self.num_bins == 0 || self.num_bins > MAX_ALPHABET_SIZE {
            return Err(Error::InvalidArgument(format!(
                "num_bins must be in 1..={MAX_ALPHABET_SIZE}, got {}",
                self.num_bins
            )));
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "beta must be finite and non-negative, got {}",
                self.beta
            )));
        }
        if self.context_length != NEIGHBOURHOOD_CONTEXT_LENGTH {
            return Err(Error::InvalidArgument(format!(
                "context length must be {NEIGHBOURHOOD_CONTEXT_LENGTH}, got {}",
                self.context_length
            )));
        }
        Ok(())
    }

    /// Reads and validates a JSON config. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: ModelConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}
