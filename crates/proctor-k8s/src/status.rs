use futures::{Stream, StreamExt};
use k8s_openapi::api::batch::v1::Job;
use kube::api::WatchEvent;
use tokio_util::sync::CancellationToken;

use proctor_types::JobStatus;

use crate::error::Error;

/// Reduce a job's watch stream to a terminal status.
///
/// The first event carrying `succeeded >= 1` or `failed >= 1` decides the
/// status. An in-band error event or a transport failure aborts with
/// [`Error::StatusWatch`]. A stream that ends without a definitive signal,
/// or a cancelled token, yields [`JobStatus::Unknown`]. The stream is
/// dropped on every exit path, which releases the subscription.
pub(crate) async fn resolve_status<S>(
    job_name: &str,
    mut events: S,
    cancel: &CancellationToken,
) -> Result<JobStatus, Error>
where
    S: Stream<Item = kube::Result<WatchEvent<Job>>> + Unpin,
{
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => return Ok(JobStatus::Unknown),

            event = events.next() => match event {
                None => return Ok(JobStatus::Unknown),
                Some(Err(source)) => {
                    return Err(Error::StatusWatch {
                        job: job_name.to_string(),
                        source,
                    });
                }
                Some(Ok(WatchEvent::Error(response))) => {
                    return Err(Error::StatusWatch {
                        job: job_name.to_string(),
                        source: kube::Error::Api(response),
                    });
                }
                Some(Ok(WatchEvent::Added(job) | WatchEvent::Modified(job))) => {
                    if let Some(status) = terminal_status(&job) {
                        return Ok(status);
                    }
                }
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Succeeded/failed pod counts decide the terminal status.
fn terminal_status(job: &Job) -> Option<JobStatus> {
    let status = job.status.as_ref()?;
    if status.succeeded.unwrap_or(0) >= 1 {
        Some(JobStatus::Succeeded)
    } else if status.failed.unwrap_or(0) >= 1 {
        Some(JobStatus::Failed)
    } else {
        None
    }
}
