//! Pixel density model for count-based exploration.
//!
//! Every cell of a downsampled, quantized frame owns a Context Tree Switching
//! predictor conditioned on the cell's already-seen neighbours (left, up,
//! up-left, up-right). Updating the grid on a frame yields the frame's
//! probability before and after the update, which are turned into a
//! pseudocount and an exploration bonus `beta / sqrt(pseudocount + 0.01)`.
//!
//! ```no_run
//! use cts_density::{DensityModel, Frame, ModelConfig};
//!
//! let mut model = DensityModel::new(ModelConfig::default())?;
//! let frame = Frame::gray(84, 84, vec![0.0; 84 * 84])?;
//! let bonus = model.update(&frame);
//! assert!(bonus > 0.0);
//! # Ok::<(), cts_density::Error>(())
//! ```

pub mod checkpoint;
pub mod config;
pub mod cts;
pub mod density;
pub mod error;
pub mod preprocess;
pub mod scorer;

pub use checkpoint::CheckpointFormat;
pub use config::ModelConfig;
pub use cts::{ContextTree, Symbol, SymbolPrior};
pub use density::{DensityModel, FrameScore};
pub use error::{Error, Result};
pub use preprocess::Frame;
