use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shadowview::config::Settings;
use shadowview::engine::SecureEngine;
use shadowview::propose::DisabledProposer;
use shadowview::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shadowview=info")),
        )
        .init();

    let settings = Settings::load()?;
    let dataset = settings.resolve_dataset_path()?;
    info!(
        dataset = %dataset.display(),
        group_column = %settings.group_column,
        "starting shadowview"
    );

    let engine = Arc::new(SecureEngine::new(
        dataset,
        settings.group_column.clone(),
        settings.memory_limit.clone(),
    ));
    // Early read of the dataset so a bad path or schema shows up at startup
    // rather than on the first request.
    match engine.distinct_groups() {
        Ok(groups) => info!(groups = groups.len(), "dataset registered"),
        Err(e) => warn!(error = %e, "could not enumerate groups at startup"),
    }

    let app = server::router(AppState {
        engine,
        proposer: Arc::new(DisabledProposer),
        max_retries: settings.max_retries,
    });
    let listener = tokio::net::TcpListener::bind(&settings.listen).await?;
    info!(addr = %settings.listen, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
