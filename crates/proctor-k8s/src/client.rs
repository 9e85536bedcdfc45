use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use futures::{AsyncBufRead, StreamExt};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ListParams, LogParams, PostParams, WatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use proctor_config::Settings;
use proctor_types::{CredentialMode, JobStatus};

use crate::error::Error;
use crate::job::{build_job, job_label_selector, unique_name};
use crate::status::resolve_status;

/// Owned handle to a following pod log stream; dropping it releases the
/// underlying connection.
pub type LogStream = Pin<Box<dyn AsyncBufRead + Send>>;

/// Pod phases that carry readable logs
const READY_POD_PHASES: [&str; 2] = ["Running", "Succeeded"];

/// Credentialed connection to the cluster API, paired with the settings
/// snapshot it was built with.
///
/// Cheap to clone and safe for concurrent use; no pooling or credential
/// refresh beyond what `kube::Client` provides.
#[derive(Clone)]
pub struct ClusterClient {
    client: Client,
    settings: Arc<Settings>,
}

impl ClusterClient {
    /// Build a client for the credential mode selected in `settings`.
    ///
    /// One attempt, no retry: resolution failures surface as
    /// [`Error::CredentialResolution`], a resolved config that cannot
    /// produce a handle as [`Error::ClientConstruction`].
    pub async fn new(settings: Arc<Settings>) -> Result<Self, Error> {
        let config = resolve_config(&settings.credential_mode).await?;
        let client = Client::try_from(config).map_err(Error::ClientConstruction)?;
        Ok(Self { client, settings })
    }

    /// Wrap an already-constructed `kube::Client`.
    pub fn from_client(client: Client, settings: Arc<Settings>) -> Self {
        Self { client, settings }
    }

    /// Settings snapshot this client was built with
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Submit a single-container batch job running `image` with `env`,
    /// using the image's own entrypoint.
    pub async fn submit_job(
        &self,
        image: &str,
        env: &HashMap<String, String>,
    ) -> Result<String, Error> {
        self.submit_job_with_command(image, env, &[]).await
    }

    /// Submit a single-container batch job, overriding the image
    /// entrypoint with `command` when it is non-empty.
    ///
    /// Returns the generated job name. A rejection by the cluster surfaces
    /// verbatim as [`Error::Submission`]; there is no retry.
    pub async fn submit_job_with_command(
        &self,
        image: &str,
        env: &HashMap<String, String>,
        command: &[String],
    ) -> Result<String, Error> {
        let job_name = unique_name();
        let job = build_job(&job_name, image, env, command, &self.settings);

        let jobs: Api<Job> =
            Api::namespaced(self.client.clone(), &self.settings.default_namespace);
        jobs.create(&PostParams::default(), &job)
            .await
            .map_err(|source| Error::Submission {
                job: job_name.clone(),
                source,
            })?;

        debug!(job = %job_name, %image, "submitted job");
        Ok(job_name)
    }

    /// Watch the job's event stream until a terminal status is reached.
    ///
    /// Blocks for the whole job duration unless `cancel` fires, in which
    /// case it returns [`JobStatus::Unknown`]. The watch subscription is
    /// released on every exit path. Stream-level failures propagate as
    /// [`Error::StatusWatch`].
    pub async fn await_status(
        &self,
        job_name: &str,
        cancel: &CancellationToken,
    ) -> Result<JobStatus, Error> {
        let jobs: Api<Job> =
            Api::namespaced(self.client.clone(), &self.settings.default_namespace);
        let params = WatchParams::default().labels(&job_label_selector(job_name));

        let events = jobs
            .watch(&params, "0")
            .await
            .map_err(|source| Error::StatusWatch {
                job: job_name.to_string(),
                source,
            })?
            .boxed();

        resolve_status(job_name, events, cancel).await
    }

    /// Poll for a pod of the job whose logs can be read.
    ///
    /// Lists pods labeled `job=<name>` up to the configured poll count,
    /// sleeping the configured wait time between attempts, and returns the
    /// first pod in a running or completed phase. Exhausting the budget
    /// yields [`Error::PodWaitTimeout`].
    pub async fn await_ready_pod(&self, job_name: &str) -> Result<String, Error> {
        let pods: Api<Pod> =
            Api::namespaced(self.client.clone(), &self.settings.default_namespace);
        let params = ListParams::default().labels(&job_label_selector(job_name));

        for attempt in 0..self.settings.wait_for_resource_poll_count {
            if attempt > 0 {
                tokio::time::sleep(self.settings.log_process_wait_time).await;
            }

            let list = pods.list(&params).await.map_err(|source| Error::PodLookup {
                job: job_name.to_string(),
                source,
            })?;

            for pod in list.items {
                let phase = pod.status.as_ref().and_then(|status| status.phase.as_deref());
                if phase.is_some_and(|phase| READY_POD_PHASES.contains(&phase)) {
                    if let Some(name) = pod.metadata.name {
                        return Ok(name);
                    }
                }
            }

            debug!(job = %job_name, attempt, "no ready pod yet");
        }

        Err(Error::PodWaitTimeout {
            job: job_name.to_string(),
        })
    }

    /// Open a following log stream for the named pod.
    ///
    /// The returned handle owns the connection; the caller closes it by
    /// dropping the stream. Fails with [`Error::LogStream`] when the pod
    /// does not exist or its logs cannot be attached.
    pub async fn open_logs(&self, namespace: &str, pod_name: &str) -> Result<LogStream, Error> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            follow: true,
            ..Default::default()
        };

        let stream = pods
            .log_stream(pod_name, &params)
            .await
            .map_err(|source| Error::LogStream {
                pod: pod_name.to_string(),
                source,
            })?;

        Ok(Box::pin(stream))
    }
}

/// Resolve a `kube::Config` for the selected credential mode; the single
/// dispatch point for in-cluster vs out-of-cluster resolution.
async fn resolve_config(mode: &CredentialMode) -> Result<Config, Error> {
    match mode {
        CredentialMode::InCluster => {
            info!("service is running inside the cluster");
            Config::incluster().map_err(|source| Error::CredentialResolution {
                mode: "in-cluster",
                source: Box::new(source),
            })
        }
        CredentialMode::OutOfCluster { context } => {
            info!(
                context = context.as_deref().unwrap_or(CredentialMode::DEFAULT_CONTEXT),
                "service is running outside the cluster"
            );

            let kubeconfig = Kubeconfig::read_from(user_kubeconfig_path()).map_err(|source| {
                Error::CredentialResolution {
                    mode: "out-of-cluster",
                    source: Box::new(source),
                }
            })?;

            let options = KubeConfigOptions {
                context: context.clone(),
                ..Default::default()
            };
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|source| Error::CredentialResolution {
                    mode: "out-of-cluster",
                    source: Box::new(source),
                })
        }
    }
}

/// `~/.kube/config`, with the home directory taken from `HOME` (or
/// `USERPROFILE` on Windows).
fn user_kubeconfig_path() -> PathBuf {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .unwrap_or_default();
    PathBuf::from(home).join(".kube").join("config")
}
