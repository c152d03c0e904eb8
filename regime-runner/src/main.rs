use anyhow::{bail, Result};
use regime_runner::config::{Config, LogFormat};
use regime_runner::services::strategy_engine::MultiStrategyRunner;
use regime_runner::AppState;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        git_branch = env!("GIT_BRANCH"),
        build_time = env!("BUILD_TIME"),
        "Starting regime runner..."
    );

    let app_state = Arc::new(AppState::from_config(&config).await?);
    let runner = MultiStrategyRunner::new(app_state);

    let Some(report) = runner.trigger().await else {
        return Ok(());
    };

    for result in &report.results {
        tracing::info!(
            strategy_id = %result.strategy_id,
            status = ?result.status,
            cell_id = ?result.cell_id,
            rebalanced = result.rebalanced,
            error = result.error.as_deref().unwrap_or(""),
            "strategy result"
        );
    }

    if report.aborted {
        bail!("run {} aborted: primary strategy failed", report.run_id);
    }
    Ok(())
}
