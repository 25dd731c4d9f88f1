use std::sync::Arc;

use egress::{
    alloc::Allocator,
    config::Config,
    health::HealthMonitor,
    migrate::Migrator,
    probe::HttpProbe,
    store::{PgProxyStore, PgShopStore, ProxyStore},
    worker::{spawn_workers, HealthJob},
};
use egress_core::new_pool;
use tracing::{error, info, warn};

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    let db_pool = new_pool().await.expect("Error creating db pool");
    let db = Arc::new(db_pool);

    let proxies = Arc::new(PgProxyStore::new(Arc::clone(&db), None));
    let shops = Arc::new(PgShopStore::new(Arc::clone(&db)));
    let allocator = Allocator::new(Arc::clone(&proxies));
    let probe = HttpProbe::new(
        config.probe_target.clone(),
        config.probe_expected,
        config.probe_timeout,
    );
    let migrator = Migrator::new(allocator, Arc::clone(&shops));
    let monitor = Arc::new(HealthMonitor::new(
        Arc::clone(&proxies),
        probe,
        migrator,
        config.max_fail_count,
    ));

    let (health_tx, _workers) = spawn_workers(
        Arc::clone(&proxies),
        monitor,
        config.workers,
        config.queue_depth,
        config.job_timeout,
    );

    info!(
        workers = config.workers,
        interval_secs = config.sweep_interval.as_secs(),
        "starting periodic health sweep"
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(config.sweep_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match proxies.active().await {
                    Ok(pool) => {
                        info!(count = pool.len(), "enqueueing health sweep");
                        for proxy in pool {
                            if health_tx
                                .send(HealthJob::Verify { proxy_id: proxy.id })
                                .await
                                .is_err()
                            {
                                error!("health workers are gone, exiting");
                                return;
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to list proxies for sweep"),
                }
            }
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
        }
    }
}
