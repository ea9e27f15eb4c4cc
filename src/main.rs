use anyhow::Context;
use scoreline::clock::SystemClock;
use scoreline::engine::MatchLifecycle;
use scoreline::{api, config::Config, db::init_db, Orchestrator, Repository};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;

    let pool = init_db(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let repo = Arc::new(Repository::new(pool));
    let drifted = repo
        .reconcile_all_users()
        .await
        .context("Failed to reconcile user totals")?
        .iter()
        .filter(|c| c.previous_total != c.total_points)
        .count();
    if drifted > 0 {
        tracing::warn!(users = drifted, "Repaired drifted user totals at startup");
    }

    let orchestrator = Arc::new(Orchestrator::new(
        repo.clone(),
        Arc::new(SystemClock),
        MatchLifecycle::new(config.visibility_lookahead_ms),
    ));

    let app = api::create_router(api::AppState::new(repo, orchestrator));

    let addr = SocketAddr::new(config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
