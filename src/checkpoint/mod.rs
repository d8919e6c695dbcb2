pub mod checkpoint;

pub use checkpoint::CheckpointFormat;
