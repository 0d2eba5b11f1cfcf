//! Convert Core - job lifecycle for the docforge conversion service
//!
//! A job stages its uploads, routes and runs them through converter
//! capabilities, packages the outputs into one downloadable artifact and
//! schedules everything it created for deletion.

pub mod batch;
pub mod capability;
pub mod config;
pub mod error;
pub mod job;
pub mod packager;
pub mod registry;
pub mod retention;
pub mod router;
pub mod service;
pub mod sniff;
pub mod stager;

pub use capability::{
    Capability, CapabilityError, CapabilityId, CapabilityOptions, CapabilityRegistry,
    CommandCapability, CommandSpec,
};
pub use config::{ConverterConfig, ServiceConfig};
pub use error::JobError;
pub use job::{Job, JobKind, JobStatus};
pub use registry::{ArtifactRecord, ArtifactRegistry};
pub use retention::RetentionScheduler;
pub use service::{JobOutcome, JobService, PreviewOutcome};
pub use sniff::{MagicSniffer, MimeSniffer};
pub use stager::Upload;
