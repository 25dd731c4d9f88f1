use std::sync::Arc;

use egress_core::models::proxies::Proxy;
use tracing::{error, info};

use crate::{
    alloc::Allocator,
    error::Error,
    store::{ProxyStore, ShopStore},
};

/// Aggregate outcome of one migration pass. Stranded tenants kept
/// their old binding and were reported at error severity; they are
/// retried by whichever path next finds the proxy dead.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: usize,
    pub stranded: usize,
}

pub struct Migrator<P, S> {
    allocator: Allocator<P>,
    shops: Arc<S>,
}

impl<P, S> Clone for Migrator<P, S> {
    fn clone(&self) -> Self {
        Self {
            allocator: self.allocator.clone(),
            shops: Arc::clone(&self.shops),
        }
    }
}

impl<P, S> Migrator<P, S>
where
    P: ProxyStore,
    S: ShopStore,
{
    pub fn new(allocator: Allocator<P>, shops: Arc<S>) -> Self {
        Self { allocator, shops }
    }

    /// Rebinds every tenant currently routed through `dead`. Tenants
    /// are handled independently: one tenant failing to find a spare
    /// or to persist never blocks the rest. A second pass over the
    /// same proxy sees no bound tenants and is a no-op.
    pub async fn migrate_shops(&self, dead: &Proxy) -> Result<MigrationReport, Error> {
        let bound = self.shops.by_proxy(dead.id).await?;
        if bound.is_empty() {
            return Ok(MigrationReport::default());
        }

        let mut report = MigrationReport::default();
        for shop in bound {
            match self.allocator.find_spare(&dead.region).await {
                Ok(replacement) => match self.shops.bind(shop.id, Some(replacement.id)).await {
                    Ok(()) => {
                        info!(
                            shop = shop.id,
                            from = dead.id,
                            to = replacement.id,
                            "migrated shop off dead proxy"
                        );
                        report.migrated += 1;
                    }
                    Err(e) => {
                        error!(shop = shop.id, error = %e, "failed to rebind shop during migration");
                        report.stranded += 1;
                    }
                },
                Err(e) => {
                    error!(
                        shop = shop.id,
                        proxy = dead.id,
                        region = %dead.region,
                        error = %e,
                        "no spare proxy for shop, tenant left without egress"
                    );
                    report.stranded += 1;
                }
            }
        }

        Ok(report)
    }
}
