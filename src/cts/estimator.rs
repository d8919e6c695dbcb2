use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A symbol predicted by the model. Quantized pixel bins fit comfortably.
pub type Symbol = u8;

/// Largest alphabet a [`Symbol`] can index.
pub const MAX_ALPHABET_SIZE: usize = Symbol::MAX as usize + 1;

/// Dirichlet prior placed on every symbol count of a fresh estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolPrior {
    /// `1 / alphabet_size` per symbol.
    Perks,
    /// `0.5` per symbol.
    Jeffreys,
    /// `1.0` per symbol.
    #[default]
    Laplace,
}

impl SymbolPrior {
    /// Initial pseudo-count of each symbol.
    pub fn magnitude(self, alphabet_size: usize) -> f64 {
        match self {
            SymbolPrior::Perks => 1.0 / alphabet_size as f64,
            SymbolPrior::Jeffreys => 0.5,
            SymbolPrior::Laplace => 1.0,
        }
    }
}

impl fmt::Display for SymbolPrior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SymbolPrior::Perks => "perks",
            SymbolPrior::Jeffreys => "jeffreys",
            SymbolPrior::Laplace => "laplace",
        };
        f.write_str(name)
    }
}

impl FromStr for SymbolPrior {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "perks" => Ok(SymbolPrior::Perks),
            "jeffreys" => Ok(SymbolPrior::Jeffreys),
            "laplace" => Ok(SymbolPrior::Laplace),
            other => Err(Error::InvalidArgument(format!(
                "unknown symbol prior '{other}'"
            ))),
        }
    }
}

/// Dirichlet-multinomial count model over a small alphabet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimator {
    counts: Vec<f64>,
    count_total: f64,
}

impl Estimator {
    pub fn new(alphabet_size: usize, prior: f64) -> Self {
        let counts = vec![prior; alphabet_size];
        let count_total = counts.iter().sum();
        Estimator {
            counts,
            count_total,
        }
    }

    /// Predictive probability of `symbol`. The symbol must lie in the alphabet.
    #[inline]
    pub fn probability(&self, symbol: Symbol) -> f64 {
        debug_assert!((symbol as usize) < self.counts.len());
        self.counts[symbol as usize] / self.count_total
    }

    /// Records one occurrence of `symbol` and returns its log-probability as
    /// predicted before the count was incremented.
    #[inline]
    pub fn observe(&mut self, symbol: Symbol) -> f64 {
        let log_prob = self.probability(symbol).ln();
        self.counts[symbol as usize] += 1.0;
        self.count_total += 1.0;
        log_prob
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn count_total(&self) -> f64 {
        self.count_total
    }

    pub fn alphabet_size(&self) -> usize {
        self.counts.len()
    }
}
