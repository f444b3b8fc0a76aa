pub mod config;
pub mod image_processor;
pub mod manifest;
pub mod pipeline;
pub mod scanner;

// Re-export commonly used types
pub use config::{Config, ConvertConfig, Layout};
pub use image_processor::{ConversionReport, ConvertedImage, FailedImage};
pub use manifest::{DanglingReference, Manifest, Record};
pub use pipeline::Summary;
