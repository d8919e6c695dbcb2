pub mod density;

pub use density::{exploration_bonus, pseudocount, DensityModel, FrameScore};
