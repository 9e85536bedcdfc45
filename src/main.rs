use std::sync::Arc;

use anyhow::Result;

use proctor_config::{ConfigHandle, Settings};
use proctor_k8s::ClusterClient;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigHandle::new();
    let settings = config.current();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&settings.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(settings).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

/// Build a cluster client for the configured credential mode and report.
async fn run(settings: Arc<Settings>) -> Result<()> {
    let client = ClusterClient::new(settings).await?;
    tracing::info!(
        namespace = %client.settings().default_namespace,
        "cluster client ready"
    );
    Ok(())
}
