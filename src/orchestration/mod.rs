//! # Orchestration
//!
//! Hosting for the stages: [`Pipeline`] builds the stages and routes topics to
//! them, [`PipelineHost`] feeds deliveries from a subscriber into the pipeline
//! and settles each one according to its outcome.

pub mod bootstrap;
pub mod host;

pub use bootstrap::{Pipeline, StageKind, StageOutcome};
pub use host::{DeliveryDisposition, HostStats, PipelineHost, PipelineHostHandle};
