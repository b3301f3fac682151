//! Orchestration: the pipeline runner and the service facade over it.

pub mod config;
pub mod runner;
pub mod service;

pub use config::PipelineConfig;
pub use runner::Pipeline;
pub use service::{JobSettings, StudioService};
