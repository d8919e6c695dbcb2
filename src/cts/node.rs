use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::estimator::{Estimator, Symbol};
use crate::error::{Error, Result};

/// Below this difference the smaller term no longer affects `log_add_exp`.
const LOG_ADD_EXP_CUTOFF: f64 = -50.0;

/// `ln(exp(a) + exp(b))` without overflow.
#[inline]
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    let (a, b) = if a > b { (b, a) } else { (a, b) };
    if b == f64::NEG_INFINITY {
        return b;
    }
    let diff = a - b;
    if diff < LOG_ADD_EXP_CUTOFF {
        b
    } else {
        b + diff.exp().ln_1p()
    }
}

/// Log-domain switching rate for one tree update.
///
/// At time `t` the tree switches between "stay" and "split" with
/// probability `alpha = 1 / (t + 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixingRate {
    pub log_alpha: f64,
    pub log_1_minus_alpha: f64,
}

impl MixingRate {
    pub fn at_time(time: u64) -> Self {
        let t = time as f64;
        MixingRate {
            log_alpha: (1.0 / (t + 1.0)).ln(),
            log_1_minus_alpha: (t / (t + 1.0)).ln(),
        }
    }
}

/// Estimator shape shared by every node of one tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorParams {
    pub alphabet_size: usize,
    pub prior: f64,
}

impl EstimatorParams {
    fn estimator(&self) -> Estimator {
        Estimator::new(self.alphabet_size, self.prior)
    }
}

/// One node of a context tree.
///
/// The node mixes its own estimator with the prediction of the child selected
/// by the next context symbol. Children are allocated on first visit and never
/// removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextNode {
    log_stay_weight: f64,
    log_split_weight: f64,
    estimator: Estimator,
    children: HashMap<Symbol, ContextNode>,
}

impl ContextNode {
    pub fn new(params: &EstimatorParams) -> Self {
        ContextNode {
            log_stay_weight: 0.5f64.ln(),
            log_split_weight: 0.5f64.ln(),
            estimator: params.estimator(),
            children: HashMap::new(),
        }
    }

    /// Updates this node and the path selected by `context` (consumed from its
    /// last element) with `symbol`. Returns the mixed log-probability the node
    /// assigned to `symbol` before the update.
    pub fn observe(
        &mut self,
        params: &EstimatorParams,
        rate: MixingRate,
        context: &[Symbol],
        symbol: Symbol,
    ) -> f64 {
        let lp_self = self.estimator.observe(symbol);

        let Some((&branch, rest)) = context.split_last() else {
            // Nothing deeper to defer to.
            self.log_stay_weight = 0.0;
            return lp_self;
        };

        let lp_child = self
            .children
            .entry(branch)
            .or_insert_with(|| ContextNode::new(params))
            .observe(params, rate, rest, symbol);

        let lp_mixed = self.mix(lp_self, lp_child);
        self.update_switching_weights(lp_self, lp_child, rate);
        lp_mixed
    }

    /// Read-only counterpart of [`observe`](Self::observe).
    ///
    /// A context path that was never visited predicts what a freshly allocated
    /// subtree would, i.e. the uniform prior.
    pub fn query(&self, context: &[Symbol], symbol: Symbol) -> f64 {
        let lp_self = self.estimator.probability(symbol).ln();

        let Some((branch, rest)) = context.split_last() else {
            return lp_self;
        };

        let lp_child = match self.children.get(branch) {
            Some(child) => child.query(rest, symbol),
            None => -(self.estimator.alphabet_size() as f64).ln(),
        };
        self.mix(lp_self, lp_child)
    }

    /// Weighted log-domain mixture of the node's own prediction and its child's.
    #[inline]
    pub fn mix(&self, lp_self: f64, lp_child: f64) -> f64 {
        let numerator = log_add_exp(
            lp_self + self.log_stay_weight,
            lp_child + self.log_split_weight,
        );
        let denominator = log_add_exp(self.log_stay_weight, self.log_split_weight);
        numerator - denominator
    }

    fn update_switching_weights(&mut self, lp_self: f64, lp_child: f64, rate: MixingRate) {
        if rate.log_1_minus_alpha == 0.0 {
            self.log_stay_weight += lp_self;
            self.log_split_weight += lp_child;
            return;
        }

        let new_stay = log_add_exp(
            rate.log_1_minus_alpha + lp_self + self.log_stay_weight,
            rate.log_alpha + lp_child + self.log_split_weight,
        );
        // The split update reads the stay weight already written above.
        let new_split = log_add_exp(
            rate.log_1_minus_alpha + lp_child + self.log_split_weight,
            rate.log_alpha + lp_self + new_stay,
        );
        self.log_stay_weight = new_stay;
        self.log_split_weight = new_split;
    }

    pub fn log_stay_weight(&self) -> f64 {
        self.log_stay_weight
    }

    pub fn log_split_weight(&self) -> f64 {
        self.log_split_weight
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    pub fn child(&self, branch: Symbol) -> Option<&ContextNode> {
        self.children.get(&branch)
    }

    /// Checks that every estimator in the subtree covers `alphabet_size`
    /// symbols with a consistent total, and that every branch is in the alphabet.
    pub fn validate(&self, alphabet_size: usize) -> Result<()> {
        let counts = self.estimator.counts();
        if counts.len() != alphabet_size {
            return Err(Error::IncompatibleCheckpoint(format!(
                "estimator has {} counts, expected {alphabet_size}",
                counts.len()
            )));
        }
        let sum: f64 = counts.iter().sum();
        let total = self.estimator.count_total();
        if !(sum.is_finite() && (sum - total).abs() <= 1e-9 * sum.abs().max(1.0)) {
            return Err(Error::IncompatibleCheckpoint(format!(
                "estimator total {total} does not match its counts ({sum})"
            )));
        }
        for (&branch, child) in &self.children {
            if branch as usize >= alphabet_size {
                return Err(Error::IncompatibleCheckpoint(format!(
                    "branch {branch} outside an alphabet of {alphabet_size}"
                )));
            }
            child.validate(alphabet_size)?;
        }
        Ok(())
    }

    /// Number of nodes in the subtree rooted here, this node included.
    pub fn node_count(&self) -> usize {
        1 + self.children.values().map(ContextNode::node_count).sum::<usize>()
    }
}
