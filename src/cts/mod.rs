//! Context Tree Switching: per-context estimators mixed along a context path,
//! with a learned preference between short and long contexts at every node.

pub mod estimator;
pub mod node;
pub mod tree;

pub use estimator::{Estimator, Symbol, SymbolPrior, MAX_ALPHABET_SIZE};
pub use node::{log_add_exp, ContextNode, EstimatorParams, MixingRate};
pub use tree::ContextTree;
