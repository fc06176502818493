pub mod capture;
pub mod color;
pub mod composite;
pub mod config;
pub mod error;
pub mod frame;
pub mod output;
pub mod pipeline;
pub mod segmentation;

pub use color::ColorSpec;
pub use config::{ModelConfig, ProcessingConfig};
pub use error::{PipelineError, Result};
