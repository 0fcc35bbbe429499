use anyhow::{Context, Result};
use console::style;
use hookgate_config::{Config, ConfigManager};
use hookgate_core::Timestamp;
use hookgate_database::{
    applied_version, connect, connection::close, queries, run_migrations, DatabaseConfig, DbPool,
};
use hookgate_server::{router, Metrics, Services};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Opens the configured store and brings its schema up to date
async fn connect_db(config: &Config) -> Result<DbPool> {
    let path = config.storage.database_path.to_string_lossy().into_owned();
    let db_config = DatabaseConfig::new(path)
        .with_max_connections(config.storage.max_connections)
        .with_wal(config.storage.enable_wal);

    let pool = connect(db_config)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to apply database migrations")?;
    Ok(pool)
}

/// Run the HTTP server until Ctrl-C
pub async fn serve(config: Config) -> Result<()> {
    let pool = connect_db(&config).await?;
    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
    metrics.set_db_connected(true);

    let services = Services::build(&config, pool.clone(), metrics)?;
    let sweeper = services.sweeper.spawn(config.storage.sweep_interval());
    let app = router(services.state, config.server.body_limit_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;
    log::info!(
        "hookgate {} listening on {}",
        env!("CARGO_PKG_VERSION"),
        config.server.bind_address
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    sweeper.abort();
    close(pool).await;
    log::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received, draining connections");
}

/// Apply pending migrations
pub async fn migrate(config: &Config) -> Result<()> {
    let pool = connect_db(config).await?;
    let version = applied_version(&pool)
        .await
        .context("Failed to read schema version")?;
    close(pool).await;

    println!(
        "{} Database at {} is at schema version {}",
        style("✓").green().bold(),
        config.storage.database_path.display(),
        version
    );
    Ok(())
}

/// Delete records older than `hours`
pub async fn purge(config: &Config, hours: u64) -> Result<()> {
    let pool = connect_db(config).await?;
    let purged = purge_older_than(&pool, hours).await?;
    close(pool).await;

    println!(
        "{} Purged {} idempotency records older than {}h",
        style("✓").green().bold(),
        style(purged).bold().cyan(),
        hours
    );
    Ok(())
}

async fn purge_older_than(pool: &DbPool, hours: u64) -> Result<u64> {
    let cutoff = Timestamp::now().saturating_sub(Duration::from_secs(hours.saturating_mul(3600)));
    queries::purge_expired(pool, cutoff)
        .await
        .context("Failed to purge idempotency records")
}

/// Write a commented default config file
pub fn init_config(manager: &ConfigManager) -> Result<()> {
    let created = manager
        .initialize()
        .context("Failed to write default config")?;

    if created {
        println!(
            "{} Wrote default config to {}",
            style("✓").green().bold(),
            manager.config_path().display()
        );
        println!("  Add a [ingest.sources.<name>] secret before serving.");
    } else {
        println!(
            "Config already exists at {}",
            manager.config_path().display()
        );
    }
    Ok(())
}

/// Validate the config file plus environment overrides
pub fn check_config(manager: &ConfigManager, quiet: bool) -> Result<()> {
    let problems = manager.validate().context("Failed to load config")?;

    if problems.is_empty() {
        if !quiet {
            println!(
                "{} {} is valid",
                style("✓").green().bold(),
                manager.config_path().display()
            );
        }
        return Ok(());
    }

    println!(
        "{} {} problem(s) in {}",
        style("✗").red().bold(),
        problems.len(),
        manager.config_path().display()
    );
    for problem in &problems {
        println!("  - {}", problem);
    }
    anyhow::bail!("Configuration is invalid")
}

#[cfg(test)]
mod tests;
