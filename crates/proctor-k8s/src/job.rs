use std::collections::{BTreeMap, HashMap};

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use uuid::Uuid;

use proctor_config::Settings;

/// Prefix of generated job names
const JOB_NAME_PREFIX: &str = "proctor";

/// Label key tying a job and its pods to one execution
const JOB_LABEL_KEY: &str = "job";

/// Generate a job name unique within the process lifetime.
///
/// The random suffix keeps `job=<name>` selectors from colliding between
/// concurrent submissions in the same namespace.
pub(crate) fn unique_name() -> String {
    format!("{JOB_NAME_PREFIX}-{}", Uuid::new_v4())
}

/// `job=<name>` selector scoping watches and pod lookups to one execution
pub(crate) fn job_label_selector(job_name: &str) -> String {
    format!("{JOB_LABEL_KEY}={job_name}")
}

fn job_labels(job_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(JOB_LABEL_KEY.to_string(), job_name.to_string())])
}

fn env_vars(env: &HashMap<String, String>) -> Vec<EnvVar> {
    env.iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            value_from: None,
        })
        .collect()
}

/// Build the typed batch job for one execution.
///
/// One container named after the job itself, restart policy `Never`;
/// deadline, retry limit, service account and pod annotations come from
/// settings. A non-empty `command` overrides the image entrypoint.
pub(crate) fn build_job(
    job_name: &str,
    image: &str,
    env: &HashMap<String, String>,
    command: &[String],
    settings: &Settings,
) -> Job {
    let mut container = Container {
        name: job_name.to_string(),
        image: Some(image.to_string()),
        env: Some(env_vars(env)),
        ..Default::default()
    };
    if !command.is_empty() {
        container.command = Some(command.to_vec());
    }

    let metadata = ObjectMeta {
        name: Some(job_name.to_string()),
        labels: Some(job_labels(job_name)),
        annotations: if settings.job_pod_annotations.is_empty() {
            None
        } else {
            Some(settings.job_pod_annotations.clone())
        },
        ..Default::default()
    };

    let template = PodTemplateSpec {
        metadata: Some(metadata.clone()),
        spec: Some(PodSpec {
            containers: vec![container],
            restart_policy: Some("Never".to_string()),
            service_account_name: settings.service_account_name.clone(),
            ..Default::default()
        }),
    };

    Job {
        metadata,
        spec: Some(JobSpec {
            template,
            active_deadline_seconds: settings.job_active_deadline_seconds,
            backoff_limit: settings.job_retry_limit,
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proctor_types::CredentialMode;
    use std::time::Duration;

    fn settings() -> Settings {
        Settings {
            credential_mode: CredentialMode::InCluster,
            log_level: "info".to_string(),
            app_port: 5000,
            default_namespace: "default".to_string(),
            wait_for_resource_poll_count: 5,
            job_active_deadline_seconds: Some(900),
            job_retry_limit: Some(2),
            log_process_wait_time: Duration::from_secs(60),
            service_account_name: Some("runner".to_string()),
            job_pod_annotations: BTreeMap::from([(
                "team".to_string(),
                "core".to_string(),
            )]),
        }
    }

    #[test]
    fn test_unique_names_are_prefixed_and_distinct() {
        let first = unique_name();
        let second = unique_name();
        assert!(first.starts_with("proctor-"));
        assert!(second.starts_with("proctor-"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_job_label_selector_shape() {
        assert_eq!(job_label_selector("proctor-abc"), "job=proctor-abc");
    }

    #[test]
    fn test_build_job_single_container() {
        let env = HashMap::from([("FOO".to_string(), "bar".to_string())]);
        let job = build_job("proctor-abc", "nginx:latest", &env, &[], &settings());

        let spec = job.spec.expect("job spec");
        let pod_spec = spec.template.spec.expect("pod spec");
        assert_eq!(pod_spec.containers.len(), 1);

        let container = &pod_spec.containers[0];
        assert_eq!(container.name, "proctor-abc");
        assert_eq!(container.image.as_deref(), Some("nginx:latest"));
        assert_eq!(container.env.as_ref().map(Vec::len), Some(1));
        assert!(container.command.is_none());
        assert_eq!(pod_spec.restart_policy.as_deref(), Some("Never"));
    }

    #[test]
    fn test_build_job_applies_settings() {
        let job = build_job("proctor-abc", "alpine:3", &HashMap::new(), &[], &settings());

        let spec = job.spec.expect("job spec");
        assert_eq!(spec.active_deadline_seconds, Some(900));
        assert_eq!(spec.backoff_limit, Some(2));

        let template_meta = spec.template.metadata.expect("template metadata");
        assert_eq!(
            template_meta
                .labels
                .as_ref()
                .and_then(|labels| labels.get("job"))
                .map(String::as_str),
            Some("proctor-abc")
        );
        assert_eq!(
            template_meta
                .annotations
                .as_ref()
                .and_then(|annotations| annotations.get("team"))
                .map(String::as_str),
            Some("core")
        );

        let pod_spec = spec.template.spec.expect("pod spec");
        assert_eq!(pod_spec.service_account_name.as_deref(), Some("runner"));
    }

    #[test]
    fn test_build_job_command_override() {
        let command = vec!["sh".to_string(), "-c".to_string(), "true".to_string()];
        let job = build_job("proctor-abc", "alpine:3", &HashMap::new(), &command, &settings());

        let container = &job.spec.unwrap().template.spec.unwrap().containers[0];
        assert_eq!(container.command.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn test_build_job_omits_empty_annotations() {
        let mut bare = settings();
        bare.job_pod_annotations.clear();
        bare.service_account_name = None;

        let job = build_job("proctor-abc", "alpine:3", &HashMap::new(), &[], &bare);
        assert!(job.metadata.annotations.is_none());
        assert!(
            job.spec
                .unwrap()
                .template
                .spec
                .unwrap()
                .service_account_name
                .is_none()
        );
    }
}
