pub mod scorer;

pub use scorer::{score_file, score_reader, FrameLayout, PixelFormat};
