use serde::{Deserialize, Serialize};

use super::estimator::{Symbol, SymbolPrior, MAX_ALPHABET_SIZE};
use super::node::{ContextNode, EstimatorParams, MixingRate};
use crate::error::{Error, Result};

/// A Context Tree Switching predictor over a fixed-length context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextTree {
    time: u64,
    context_length: usize,
    alphabet_size: usize,
    symbol_prior: SymbolPrior,
    symbols_seen: Vec<bool>,
    root: ContextNode,
}

impl ContextTree {
    pub fn new(
        alphabet_size: usize,
        context_length: usize,
        symbol_prior: SymbolPrior,
    ) -> Result<Self> {
        if alphabet_size == 0 || alphabet_size > MAX_ALPHABET_SIZE {
            return Err(Error::InvalidArgument(format!(
                "alphabet size must be in 1..={MAX_ALPHABET_SIZE}, got {alphabet_size}"
            )));
        }
        if context_length == 0 {
            return Err(Error::InvalidArgument(
                "context length must be positive".to_string(),
            ));
        }

        let params = EstimatorParams {
            alphabet_size,
            prior: symbol_prior.magnitude(alphabet_size),
        };
        Ok(ContextTree {
            time: 0,
            context_length,
            alphabet_size,
            symbol_prior,
            symbols_seen: vec![false; alphabet_size],
            root: ContextNode::new(&params),
        })
    }

    fn params(&self) -> EstimatorParams {
        EstimatorParams {
            alphabet_size: self.alphabet_size,
            prior: self.symbol_prior.magnitude(self.alphabet_size),
        }
    }

    /// Updates the tree with `symbol` seen in `context` and returns the
    /// log-probability predicted for it beforehand.
    ///
    /// `context` must hold exactly `context_length` symbols and every symbol
    /// must lie in the alphabet; neither is checked in release builds.
    pub fn observe(&mut self, context: &[Symbol], symbol: Symbol) -> f64 {
        debug_assert_eq!(context.len(), self.context_length);
        debug_assert!((symbol as usize) < self.alphabet_size);

        self.time += 1;
        self.symbols_seen[symbol as usize] = true;
        let rate = MixingRate::at_time(self.time);
        let params = self.params();
        self.root.observe(&params, rate, context, symbol)
    }

    /// Log-probability of `symbol` in `context` under the current tree.
    pub fn query(&self, context: &[Symbol], symbol: Symbol) -> f64 {
        debug_assert_eq!(context.len(), self.context_length);
        self.root.query(context, symbol)
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn context_length(&self) -> usize {
        self.context_length
    }

    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    pub fn symbol_prior(&self) -> SymbolPrior {
        self.symbol_prior
    }

    pub fn root(&self) -> &ContextNode {
        &self.root
    }

    /// Distinct symbols observed so far, ascending.
    pub fn symbols_seen(&self) -> Vec<Symbol> {
        self.symbols_seen
            .iter()
            .enumerate()
            .filter(|&(_, &seen)| seen)
            .map(|(symbol, _)| symbol as Symbol)
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// Checks the internal shape of a tree that was not built by [`new`](Self::new),
    /// such as one decoded from a checkpoint.
    pub fn validate(&self) -> Result<()> {
        if self.alphabet_size == 0 || self.alphabet_size > MAX_ALPHABET_SIZE {
            return Err(Error::IncompatibleCheckpoint(format!(
                "alphabet size {} outside 1..={MAX_ALPHABET_SIZE}",
                self.alphabet_size
            )));
        }
        if self.symbols_seen.len() != self.alphabet_size {
            return Err(Error::IncompatibleCheckpoint(format!(
                "symbol set covers {} symbols, expected {}",
                self.symbols_seen.len(),
                self.alphabet_size
            )));
        }
        self.root.validate(self.alphabet_size)
    }
}
