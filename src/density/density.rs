use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::ModelConfig;
use crate::cts::{ContextTree, Symbol};
use crate::error::{Error, Result};
use crate::preprocess::{quantize, resize, to_grayscale, Frame};

/// Floor on `ratio - 1` in the pseudocount denominator.
const MIN_PROB_RATIO_GAIN: f64 = 1e-10;
/// Added to the pseudocount before the square root of the bonus.
const PSEUDOCOUNT_OFFSET: f64 = 0.01;

/// Everything the model derived from one frame update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameScore {
    /// Log-probability of the frame before the update.
    pub log_prob: f64,
    /// Log-probability of the same frame right after the update.
    pub log_recoding_prob: f64,
    pub pseudocount: f64,
    pub bonus: f64,
}

/// Pseudocount from the frame's log-probability before and after an update.
///
/// This is the usual first-order approximation. It is not guaranteed to be
/// non-negative: a recoding gain below the floor yields a large or negative
/// value.
pub fn pseudocount(log_prob: f64, log_recoding_prob: f64) -> f64 {
    let recoding_prob = log_recoding_prob.exp();
    let prob_ratio = (log_recoding_prob - log_prob).exp();
    (1.0 - recoding_prob) / (prob_ratio - 1.0).max(MIN_PROB_RATIO_GAIN)
}

pub fn exploration_bonus(pseudocount: f64, beta: f64) -> f64 {
    beta / (pseudocount + PSEUDOCOUNT_OFFSET).sqrt()
}

/// Context symbols of cell `(row, col)`: up-right, up-left, up, left.
///
/// Trees consume the context from its end, so the left neighbour is the first
/// split. Neighbours outside the grid read as symbol 0.
#[inline]
fn neighbourhood(symbols: &[Symbol], width: usize, row: usize, col: usize) -> [Symbol; 4] {
    let at = |r: usize, c: usize| symbols[r * width + c];
    let left = if col > 0 { at(row, col - 1) } else { 0 };
    let (up, up_left, up_right) = if row > 0 {
        (
            at(row - 1, col),
            if col > 0 { at(row - 1, col - 1) } else { 0 },
            if col + 1 < width { at(row - 1, col + 1) } else { 0 },
        )
    } else {
        (0, 0, 0)
    };
    [up_right, up_left, up, left]
}

/// A grid of independent context trees, one per cell of the downsampled,
/// quantized frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityModel {
    config: ModelConfig,
    frames_seen: u64,
    trees: Vec<ContextTree>,
}

impl DensityModel {
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        let trees = (0..config.cells())
            .map(|_| {
                ContextTree::new(config.num_bins, config.context_length, config.symbol_prior)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            height = config.height,
            width = config.width,
            num_bins = config.num_bins,
            beta = config.beta,
            prior = %config.symbol_prior,
            "density model created"
        );
        Ok(DensityModel {
            config,
            frames_seen: 0,
            trees,
        })
    }

    pub fn with_default_config() -> Result<Self> {
        DensityModel::new(ModelConfig::default())
    }

    /// Checks a model assembled outside [`new`](Self::new), e.g. a decoded checkpoint.
    pub(crate) fn validate_restored(&self) -> Result<()> {
        self.config.validate()?;
        if self.trees.len() != self.config.cells() {
            return Err(Error::IncompatibleCheckpoint(format!(
                "{} trees for a {}x{} grid",
                self.trees.len(),
                self.config.height,
                self.config.width
            )));
        }
        for (cell, tree) in self.trees.iter().enumerate() {
            if tree.alphabet_size() != self.config.num_bins
                || tree.context_length() != self.config.context_length
            {
                return Err(Error::IncompatibleCheckpoint(format!(
                    "tree {cell} has alphabet {} and context length {}, expected {} and {}",
                    tree.alphabet_size(),
                    tree.context_length(),
                    self.config.num_bins,
                    self.config.context_length
                )));
            }
            tree.validate().map_err(|e| match e {
                Error::IncompatibleCheckpoint(msg) => {
                    Error::IncompatibleCheckpoint(format!("tree {cell}: {msg}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Grayscale, resize and quantize an observation to one symbol per cell.
    pub fn quantize_frame(&self, observation: &Frame) -> Vec<Symbol> {
        let gray = to_grayscale(observation);
        let resized = resize(&gray, self.config.height, self.config.width);
        resized
            .data()
            .iter()
            .map(|&value| quantize(value, self.config.num_bins))
            .collect()
    }

    /// Updates every cell with `observation` and returns the exploration bonus.
    pub fn update(&mut self, observation: &Frame) -> f64 {
        self.update_scored(observation).bonus
    }

    /// Updates every cell with `observation` and returns the full score.
    pub fn update_scored(&mut self, observation: &Frame) -> FrameScore {
        let symbols = self.quantize_frame(observation);
        let width = self.config.width;

        let update_cell = |(cell, tree): (usize, &mut ContextTree)| {
            let context = neighbourhood(&symbols, width, cell / width, cell % width);
            let symbol = symbols[cell];
            let log_prob = tree.observe(&context, symbol);
            let log_recoding_prob = tree.query(&context, symbol);
            (log_prob, log_recoding_prob)
        };
        let per_cell: Vec<(f64, f64)> = if self.config.parallel {
            self.trees.par_iter_mut().enumerate().map(update_cell).collect()
        } else {
            self.trees.iter_mut().enumerate().map(update_cell).collect()
        };

        // Summed in cell order so parallel and sequential runs agree bit for bit.
        let (log_prob, log_recoding_prob) = per_cell
            .iter()
            .fold((0.0, 0.0), |(lp, lrp), &(cell_lp, cell_lrp)| {
                (lp + cell_lp, lrp + cell_lrp)
            });

        self.frames_seen += 1;
        let pseudocount = pseudocount(log_prob, log_recoding_prob);
        let bonus = exploration_bonus(pseudocount, self.config.beta);
        if pseudocount < 0.0 {
            warn!(
                frame = self.frames_seen,
                pseudocount, "negative pseudocount, bonus is not meaningful"
            );
        }
        trace!(
            frame = self.frames_seen,
            log_prob,
            log_recoding_prob,
            pseudocount,
            bonus,
            "frame scored"
        );

        FrameScore {
            log_prob,
            log_recoding_prob,
            pseudocount,
            bonus,
        }
    }

    /// Per-cell log-probabilities of `observation`, row-major, without updating.
    pub fn log_prob_map(&self, observation: &Frame) -> Vec<f64> {
        let symbols = self.quantize_frame(observation);
        let width = self.config.width;

        let query_cell = |(cell, tree): (usize, &ContextTree)| {
            let context = neighbourhood(&symbols, width, cell / width, cell % width);
            tree.query(&context, symbols[cell])
        };
        if self.config.parallel {
            self.trees.par_iter().enumerate().map(query_cell).collect()
        } else {
            self.trees.iter().enumerate().map(query_cell).collect()
        }
    }

    /// Log-probability of `observation` under the current model, without updating.
    pub fn query(&self, observation: &Frame) -> f64 {
        self.log_prob_map(observation).iter().sum()
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn trees(&self) -> &[ContextTree] {
        &self.trees
    }

    /// Total nodes allocated across all trees.
    pub fn node_count(&self) -> usize {
        self.trees.iter().map(ContextTree::node_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ModelConfig {
        ModelConfig::default()
            .with_grid(2, 2)
            .with_bins(2)
            .with_beta(0.05)
            .with_parallel(false)
    }

    #[test]
    fn test_new_builds_one_tree_per_cell() {
        let model = DensityModel::new(ModelConfig::default().with_grid(3, 5)).unwrap();
        assert_eq!(model.trees().len(), 15);
        assert!(model.trees().iter().all(|t| t.alphabet_size() == 8));
        assert_eq!(model.node_count(), 15);
    }

    #[test]
    fn test_new_rejects_bad_config() {
        assert!(matches!(
            DensityModel::new(ModelConfig::default().with_bins(0)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_neighbourhood() {
        // 0 1 2
        // 3 4 5
        let symbols = [0, 1, 2, 3, 4, 5];
        assert_eq!(neighbourhood(&symbols, 3, 0, 0), [0, 0, 0, 0]);
        assert_eq!(neighbourhood(&symbols, 3, 0, 2), [0, 0, 0, 1]);
        assert_eq!(neighbourhood(&symbols, 3, 1, 0), [1, 0, 0, 0]);
        assert_eq!(neighbourhood(&symbols, 3, 1, 1), [2, 0, 1, 3]);
        assert_eq!(neighbourhood(&symbols, 3, 1, 2), [0, 1, 2, 4]);
    }

    #[test]
    fn test_quantize_frame_clamps_top_value() {
        let model = DensityModel::new(small_config()).unwrap();
        let frame = Frame::gray(2, 2, vec![0.0, 0.49, 0.5, 1.0]).unwrap();
        assert_eq!(model.quantize_frame(&frame), vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_pseudocount_and_bonus() {
        let lp = (0.5f64).ln() * 4.0;
        let lrp = (2.0f64 / 3.0).ln() * 4.0;
        let expected =
            (1.0 - (2.0f64 / 3.0).powi(4)) / ((4.0f64 / 3.0).powi(4) - 1.0);
        assert!((pseudocount(lp, lrp) - expected).abs() < 1e-9);
        assert!((exploration_bonus(0.99, 0.1) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_pseudocount_floor() {
        // No recoding gain: the floor keeps the division finite.
        let pc = pseudocount(-3.0, -3.0);
        assert!(pc.is_finite() && pc > 1e9);
        // A recoding loss is floored too; the result stays positive here.
        assert!(pseudocount(-3.0, -3.5) > 0.0);
        // Recoding probability above 1 is not corrected.
        assert!(pseudocount(0.0, 0.1) < 0.0);
    }

    #[test]
    fn test_bonus_decays_on_repeated_frame() {
        let mut model = DensityModel::new(small_config()).unwrap();
        let frame = Frame::gray(2, 2, vec![0.0; 4]).unwrap();
        let bonuses: Vec<f64> = (0..5).map(|_| model.update(&frame)).collect();
        assert!(bonuses[4] < bonuses[0]);
        assert_eq!(model.frames_seen(), 5);
    }

    #[test]
    fn test_first_frame_score() {
        let mut model = DensityModel::new(small_config()).unwrap();
        let frame = Frame::gray(2, 2, vec![0.0, 1.0, 1.0, 0.0]).unwrap();
        let score = model.update_scored(&frame);
        assert!((score.log_prob - 4.0 * 0.5f64.ln()).abs() < 1e-12);
        assert!(score.log_recoding_prob > score.log_prob);
        assert!(score.pseudocount > 0.0);
        assert!(score.bonus > 0.0);
    }

    #[test]
    fn test_query_is_read_only() {
        let mut model = DensityModel::new(small_config()).unwrap();
        let frame = Frame::gray(2, 2, vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        model.update(&frame);
        let snapshot = model.clone();

        let map = model.log_prob_map(&frame);
        assert_eq!(map.len(), 4);
        let total = model.query(&frame);
        assert!((total - map.iter().sum::<f64>()).abs() < 1e-12);
        assert_eq!(model, snapshot);

        let score = model.update_scored(&frame);
        assert!((score.log_prob - total).abs() < 1e-12);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let frames: Vec<Frame> = (0..6)
            .map(|k| {
                let data = (0..64).map(|i| ((i * 7 + k * 3) % 11) as f32 / 10.0).collect();
                Frame::gray(8, 8, data).unwrap()
            })
            .collect();
        let config = ModelConfig::default().with_grid(6, 6).with_bins(4);
        let mut parallel = DensityModel::new(config.clone().with_parallel(true)).unwrap();
        let mut sequential = DensityModel::new(config.with_parallel(false)).unwrap();
        for frame in &frames {
            assert_eq!(
                parallel.update_scored(frame),
                sequential.update_scored(frame)
            );
        }
    }
}
