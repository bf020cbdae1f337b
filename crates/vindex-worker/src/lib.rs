//! Video ingestion worker.
//!
//! Drains the shared job queue and drives each claimed video through the
//! six-stage pipeline: normalize, transcribe, scenes, frames, vision,
//! embeddings. Every stage is idempotent, so a crashed job re-queued by an
//! operator converges to the same database state as a clean run.

pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod paths;
pub mod pipeline;
pub mod retry;

pub use config::WorkerConfig;
pub use controller::JobController;
pub use error::{WorkerError, WorkerResult};
pub use paths::DataLayout;
pub use pipeline::{run_pipeline, PipelineContext, PipelineSettings};
