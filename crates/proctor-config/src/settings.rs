use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use tracing::warn;

use proctor_types::CredentialMode;

/// Prefix for environment variable overrides; dots in configuration keys
/// map to underscores (`kube.config` → `PROCTOR_KUBE_CONFIG`)
const ENV_PREFIX: &str = "PROCTOR";

/// Environment variable naming an extra directory to search for `config.*`
const CONFIG_LOCATION_ENV: &str = "CONFIG_LOCATION";

/// Base name of the optional configuration file, any supported extension
const CONFIG_FILE_NAME: &str = "config";

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_APP_PORT: u16 = 5000;
const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_POLL_COUNT: u32 = 5;
const DEFAULT_LOG_WAIT_SECS: u64 = 60;

/// Immutable snapshot of the process configuration.
///
/// Loading never fails: a missing file or an unparseable value degrades to
/// the field's default, so callers cannot distinguish "used default" from
/// "explicit value".
#[derive(Clone, Debug)]
pub struct Settings {
    /// How cluster credentials are resolved (`kube.config` / `kube.context`)
    pub credential_mode: CredentialMode,
    /// Log filter directive (`log.level`)
    pub log_level: String,
    /// Listen port for an embedding service (`app.port`)
    pub app_port: u16,
    /// Namespace jobs are submitted into (`default.namespace`)
    pub default_namespace: String,
    /// Attempts when polling for a job's pod
    /// (`kube.wait.for.resource.poll.count`)
    pub wait_for_resource_poll_count: u32,
    /// Wall-clock deadline applied to submitted jobs, in seconds
    /// (`kube.job.active.deadline.seconds`); absent or non-positive values
    /// leave the job without a deadline
    pub job_active_deadline_seconds: Option<i64>,
    /// Pod-level retry budget for submitted jobs (`kube.job.retries`)
    pub job_retry_limit: Option<i32>,
    /// Pause between pod polls (`kube.log.process.wait.time`, seconds)
    pub log_process_wait_time: Duration,
    /// Service account assigned to job pods (`kube.service.account.name`)
    pub service_account_name: Option<String>,
    /// Annotations applied to job pod templates (`job.pod.annotations`,
    /// a JSON object serialized as a string)
    pub job_pod_annotations: BTreeMap<String, String>,
}

impl Settings {
    /// Load a snapshot from the working-directory config file, an optional
    /// `CONFIG_LOCATION` config file, and `PROCTOR_*` environment
    /// variables, in increasing order of precedence.
    pub fn load() -> Self {
        let mut builder =
            Config::builder().add_source(File::with_name(CONFIG_FILE_NAME).required(false));

        if let Ok(dir) = std::env::var(CONFIG_LOCATION_ENV) {
            builder = builder
                .add_source(File::from(Path::new(&dir).join(CONFIG_FILE_NAME)).required(false));
        }

        let sources = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("_"),
            )
            .build();

        match sources {
            Ok(merged) => Self::from_config(&merged),
            Err(err) => {
                warn!(error = %err, "configuration sources failed to merge, using defaults");
                Self::from_config(&Config::default())
            }
        }
    }

    /// Build a snapshot from already-merged configuration sources.
    pub(crate) fn from_config(merged: &Config) -> Self {
        let kube_config = string_or(merged, "kube.config", "");
        let kube_context = string_or(merged, "kube.context", "");

        Self {
            credential_mode: CredentialMode::from_config_values(&kube_config, &kube_context),
            log_level: string_or(merged, "log.level", DEFAULT_LOG_LEVEL),
            app_port: merged
                .get_int("app.port")
                .ok()
                .and_then(|port| u16::try_from(port).ok())
                .unwrap_or(DEFAULT_APP_PORT),
            default_namespace: string_or(merged, "default.namespace", DEFAULT_NAMESPACE),
            wait_for_resource_poll_count: merged
                .get_int("kube.wait.for.resource.poll.count")
                .ok()
                .and_then(|count| u32::try_from(count).ok())
                .unwrap_or(DEFAULT_POLL_COUNT),
            job_active_deadline_seconds: merged
                .get_int("kube.job.active.deadline.seconds")
                .ok()
                .filter(|deadline| *deadline > 0),
            job_retry_limit: merged
                .get_int("kube.job.retries")
                .ok()
                .and_then(|retries| i32::try_from(retries).ok())
                .filter(|retries| *retries >= 0),
            log_process_wait_time: Duration::from_secs(
                merged
                    .get_int("kube.log.process.wait.time")
                    .ok()
                    .and_then(|secs| u64::try_from(secs).ok())
                    .unwrap_or(DEFAULT_LOG_WAIT_SECS),
            ),
            service_account_name: merged
                .get_string("kube.service.account.name")
                .ok()
                .filter(|name| !name.is_empty()),
            job_pod_annotations: annotations_from_json(merged, "job.pod.annotations"),
        }
    }
}

fn string_or(merged: &Config, key: &str, default: &str) -> String {
    merged
        .get_string(key)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Parse a JSON-object-in-a-string value into a map.
///
/// Malformed JSON logs a warning and yields an empty map; an absent or
/// empty value yields an empty map silently.
fn annotations_from_json(merged: &Config, key: &str) -> BTreeMap<String, String> {
    let raw = merged.get_string(key).unwrap_or_default();
    if raw.is_empty() {
        return BTreeMap::new();
    }

    match serde_json::from_str(&raw) {
        Ok(map) => map,
        Err(err) => {
            warn!(key, error = %err, "invalid JSON in configuration value, using empty map");
            BTreeMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(values: &[(&str, &str)]) -> Config {
        let mut builder = Config::builder();
        for (key, value) in values {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_empty_sources_yield_defaults() {
        let settings = Settings::from_config(&Config::default());

        assert_eq!(settings.credential_mode, CredentialMode::InCluster);
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.app_port, 5000);
        assert_eq!(settings.default_namespace, "default");
        assert_eq!(settings.wait_for_resource_poll_count, 5);
        assert_eq!(settings.job_active_deadline_seconds, None);
        assert_eq!(settings.job_retry_limit, None);
        assert_eq!(settings.log_process_wait_time, Duration::from_secs(60));
        assert_eq!(settings.service_account_name, None);
        assert!(settings.job_pod_annotations.is_empty());
    }

    #[test]
    fn test_out_of_cluster_with_default_context() {
        let settings = Settings::from_config(&config_with(&[
            ("kube.config", "out-of-cluster"),
            ("kube.context", "default"),
        ]));

        assert_eq!(
            settings.credential_mode,
            CredentialMode::OutOfCluster { context: None }
        );
    }

    #[test]
    fn test_out_of_cluster_with_context_override() {
        let settings = Settings::from_config(&config_with(&[
            ("kube.config", "out-of-cluster"),
            ("kube.context", "staging"),
        ]));

        assert_eq!(
            settings.credential_mode,
            CredentialMode::OutOfCluster {
                context: Some("staging".to_string())
            }
        );
    }

    #[test]
    fn test_job_knobs_parsed() {
        let settings = Settings::from_config(&config_with(&[
            ("kube.job.active.deadline.seconds", "900"),
            ("kube.job.retries", "2"),
            ("kube.wait.for.resource.poll.count", "10"),
            ("kube.log.process.wait.time", "5"),
            ("kube.service.account.name", "runner"),
            ("default.namespace", "batch"),
            ("app.port", "8080"),
        ]));

        assert_eq!(settings.job_active_deadline_seconds, Some(900));
        assert_eq!(settings.job_retry_limit, Some(2));
        assert_eq!(settings.wait_for_resource_poll_count, 10);
        assert_eq!(settings.log_process_wait_time, Duration::from_secs(5));
        assert_eq!(settings.service_account_name.as_deref(), Some("runner"));
        assert_eq!(settings.default_namespace, "batch");
        assert_eq!(settings.app_port, 8080);
    }

    #[test]
    fn test_non_positive_deadline_is_dropped() {
        let settings =
            Settings::from_config(&config_with(&[("kube.job.active.deadline.seconds", "0")]));
        assert_eq!(settings.job_active_deadline_seconds, None);
    }

    #[test]
    fn test_zero_retries_is_kept() {
        let settings = Settings::from_config(&config_with(&[("kube.job.retries", "0")]));
        assert_eq!(settings.job_retry_limit, Some(0));
    }

    #[test]
    fn test_annotations_parsed_from_json() {
        let settings = Settings::from_config(&config_with(&[(
            "job.pod.annotations",
            r#"{"team":"core","tier":"batch"}"#,
        )]));

        assert_eq!(settings.job_pod_annotations.len(), 2);
        assert_eq!(
            settings.job_pod_annotations.get("team").map(String::as_str),
            Some("core")
        );
    }

    #[test]
    fn test_malformed_annotations_yield_empty_map() {
        let settings =
            Settings::from_config(&config_with(&[("job.pod.annotations", "{not json")]));
        assert!(settings.job_pod_annotations.is_empty());
    }

    #[test]
    fn test_load_never_fails() {
        // Exercises the real file + environment merge; whatever the ambient
        // environment holds, a snapshot comes back.
        let settings = Settings::load();
        assert!(!settings.log_level.is_empty());
        assert!(!settings.default_namespace.is_empty());
    }
}
