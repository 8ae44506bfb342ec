use anyhow::{Context, Result};
use parley_application::ConversationRelay;
use parley_core::config::ParleyConfig;
use parley_infrastructure::{
    JsonlInboxFeed, ParleyPaths, PollingEventSource, TomlHistoryStore,
    TomlProcessingStateRepository,
};
use parley_interaction::HttpAiBackend;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn execute(config: ParleyConfig, paths: ParleyPaths, inbox: Option<PathBuf>) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let ai = Arc::new(HttpAiBackend::from_config(&config.ai)?);
    let history = Arc::new(TomlHistoryStore::new(paths.history_dir()));
    let sink = super::build_sink(&config.sink);
    let state = Arc::new(
        TomlProcessingStateRepository::open(paths.state_file())
            .await
            .context("Failed to open processing state")?,
    );

    let inbox_path = inbox
        .or_else(|| config.source.inbox_path.clone())
        .unwrap_or_else(|| paths.data_dir().join("inbox.jsonl"));
    tracing::info!(
        inbox = %inbox_path.display(),
        data_dir = %paths.data_dir().display(),
        sink = ?config.sink.kind,
        max_concurrent_calls = config.dispatch.max_concurrent_calls,
        "Starting relay"
    );

    let source = PollingEventSource::new(
        JsonlInboxFeed::new(inbox_path),
        state,
        config.source.poll_interval(),
    );
    let events = source
        .into_stream()
        .await
        .context("Failed to resolve resume cursor")?;

    let relay = ConversationRelay::new(config.dispatch.clone(), ai, history, sink);
    let shutdown = CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_token.cancel();
    });

    relay.run(events, shutdown).await;
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received SIGINT"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received SIGTERM");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
