//! Shared types for proctor
//!
//! This crate contains data structures used across multiple proctor crates.

use std::fmt;

use serde::Serialize;

/// How credentials for the cluster API are resolved.
///
/// Selected once when configuration is loaded; the client factory is the
/// only place that dispatches on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialMode {
    /// Resolve from the execution environment inside the cluster
    /// (service-account token, mounted CA, API host from the environment).
    InCluster,
    /// Resolve from the user-level kubeconfig file, applying a context
    /// override when one is set.
    OutOfCluster {
        /// Context to select instead of the kubeconfig's current one
        context: Option<String>,
    },
}

impl CredentialMode {
    /// `kube.config` value selecting the out-of-cluster path
    pub const OUT_OF_CLUSTER: &'static str = "out-of-cluster";

    /// Context name treated as "no override"
    pub const DEFAULT_CONTEXT: &'static str = "default";

    /// Derive the mode from the raw `kube.config` and `kube.context`
    /// configuration values.
    pub fn from_config_values(kube_config: &str, kube_context: &str) -> Self {
        if kube_config == Self::OUT_OF_CLUSTER {
            let context = if kube_context.is_empty() || kube_context == Self::DEFAULT_CONTEXT {
                None
            } else {
                Some(kube_context.to_string())
            };
            Self::OutOfCluster { context }
        } else {
            Self::InCluster
        }
    }
}

/// Terminal status of a submitted batch job.
///
/// Derived fresh from the job's event stream on each query, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// At least one pod of the job completed successfully
    Succeeded,
    /// At least one pod of the job failed
    Failed,
    /// The status could not be fetched from the event stream
    FetchError,
    /// The event stream ended without a definitive signal
    Unknown,
}

impl JobStatus {
    /// Status as its wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::FetchError => "FETCH_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
