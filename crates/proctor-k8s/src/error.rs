use proctor_types::JobStatus;
use thiserror::Error;

/// Errors surfaced by cluster operations.
///
/// Configuration problems never appear here: the loader degrades to
/// defaults instead of failing. Watch-stream failures are errors too;
/// callers that want a status sentinel instead can map any error to
/// [`JobStatus::FetchError`] via `From`.
#[derive(Debug, Error)]
pub enum Error {
    /// Credential resolution failed for the selected mode
    #[error("could not resolve {mode} cluster credentials")]
    CredentialResolution {
        mode: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Resolved credentials could not produce a working client
    #[error("could not construct cluster client")]
    ClientConstruction(#[source] kube::Error),

    /// The cluster rejected the submitted job spec
    #[error("job {job} was rejected by the cluster: {source}")]
    Submission {
        job: String,
        #[source]
        source: kube::Error,
    },

    /// The status watch could not be opened or failed mid-stream
    #[error("status watch for job {job} failed")]
    StatusWatch {
        job: String,
        #[source]
        source: kube::Error,
    },

    /// The job's pods could not be listed
    #[error("could not list pods of job {job}")]
    PodLookup {
        job: String,
        #[source]
        source: kube::Error,
    },

    /// No pod of the job became ready within the poll budget
    #[error("timed out waiting for a ready pod of job {job}")]
    PodWaitTimeout { job: String },

    /// Pod logs could not be attached
    #[error("could not attach to logs of pod {pod}: {source}")]
    LogStream {
        pod: String,
        #[source]
        source: kube::Error,
    },
}

impl From<&Error> for JobStatus {
    /// Collapse any cluster error into the fetch-error status sentinel.
    fn from(_: &Error) -> Self {
        JobStatus::FetchError
    }
}
