pub mod filters;
pub mod pipeline;

pub use pipeline::{ImagePreprocessor, PreprocessError, Preprocessed};
