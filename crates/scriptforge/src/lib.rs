pub mod admission;
pub mod db;
pub mod error;
pub mod export;
pub mod generate;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod subscription;
pub mod transcribe;
pub mod trend;
pub mod validate;
pub mod variation;

pub use admission::{AdmissionController, MemoryLevel, MemoryProbe, StaticMemoryProbe};
pub use db::{database_path, Database, DatabaseError};
pub use error::{Result, ScriptforgeError};
pub use export::ExportFormat;
pub use generate::{CompletionClient, HttpCompletionClient};
pub use model::{Granularity, InputKind, Job, JobStatus, Platform, TargetDuration};
pub use pipeline::{JobSettings, Pipeline, PipelineConfig, StudioService};
pub use subscription::{StaticTierLookup, Tier, TierLimits, TierLookup};
pub use transcribe::{HttpSpeechClient, SpeechToText};
pub use trend::{CuratedTrendSource, TrendSource};
