use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use verifyflow_core::JobId;
use verifyflow_watcher::{ConnectionHost, StartOutcome, WatchExit, Watcher, WatcherConfig};

/// Prints the resolved job identifier for downstream tooling.
struct StdoutHost;

impl ConnectionHost for StdoutHost {
    fn set_job_id(&self, job_id: &JobId) {
        println!("{job_id}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "verifyflow_watcher=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = WatcherConfig::from_env()?;
    tracing::info!(
        http_base = %config.http_base,
        transport = ?config.transport,
        "Loaded watcher configuration",
    );

    // The redirect's query string, e.g. `?jobIds=<uuid>`, or a full URL.
    let query = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("JOB_QUERY").ok())
        .unwrap_or_default();
    let job_id = if query.contains("://") {
        JobId::from_url(&query)
    } else {
        JobId::from_query(&query)
    };

    let mut watcher = Watcher::new(config, Arc::new(StdoutHost))?;
    if watcher.start(job_id)? == StartOutcome::MissingJobId {
        anyhow::bail!("no jobIds parameter in '{query}'");
    }

    // Dropping the in-flight wait cancels the subscription on Ctrl-C.
    let exit = tokio::select! {
        exit = watcher.wait() => exit,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, subscription released");
            Some(WatchExit::Cancelled)
        }
    };

    match exit {
        Some(WatchExit::Completed(_)) => Ok(()),
        other => anyhow::bail!("watch ended without completion: {other:?}"),
    }
}
