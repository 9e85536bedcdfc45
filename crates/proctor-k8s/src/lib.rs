//! Kubernetes integration for proctor
//!
//! This crate builds the cluster client (in-cluster or out-of-cluster),
//! submits single-container batch jobs, reduces a job's watch stream to a
//! terminal status, and opens pod log streams.

mod client;
mod error;
mod job;
mod status;

pub use client::{ClusterClient, LogStream};
pub use error::Error;

// Re-export types that are used in our public API
pub use proctor_types::{CredentialMode, JobStatus};
