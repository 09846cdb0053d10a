use anyhow::Result;
use tokio::sync::watch;

use coursebell::config::Config;
use coursebell::metrics;

use super::build_service;

/// Run both timers until Ctrl-C
pub async fn run(config: Config) -> Result<()> {
    if let Err(e) = metrics::init_metrics() {
        tracing::warn!("Metrics initialization failed: {}", e);
    }

    let service = build_service(&config)?;
    let (stop_tx, _) = watch::channel(false);

    if let Some(addr) = config.metrics.listen {
        let mut stop = stop_tx.subscribe();
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = stop.changed().await;
            };
            if let Err(e) = metrics::serve(addr, shutdown).await {
                tracing::error!(%addr, error = %e, "Metrics listener failed");
            }
        });
    }

    println!("coursebell running (Ctrl-C to stop)");
    println!("  Scan interval: {}s", config.scheduler.scan_interval_secs);
    println!(
        "  Lookahead: ({}, {}] minutes",
        config.scheduler.min_lead_minutes, config.scheduler.max_lead_minutes
    );
    if config.scheduler.digest_enabled {
        println!("  Digest: {} {}", config.scheduler.digest_time, config.scheduler.timezone);
    }

    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
        let _ = stop_tx.send(true);
    };

    service.run(shutdown).await?;
    Ok(())
}
