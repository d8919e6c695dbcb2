pub mod preprocess;

pub use preprocess::{quantize, resize, to_grayscale, Frame};
