use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    alloc::Allocator,
    error::Error,
    store::{ProxyStore, ShopStore},
    worker::HealthJob,
};

/// Reserved tenant id for anonymous traffic with no shop behind it.
pub const ANONYMOUS_SHOP: i32 = 0;

/// Per-request entry point resolving "tenant -> usable egress URL".
/// Binding happens lazily on first use; a reported failure unbinds the
/// tenant right away and hands the suspect proxy to the health queue,
/// so the verdict is computed off the request path.
pub struct NetworkProvider<P, S> {
    proxies: Arc<P>,
    shops: Arc<S>,
    allocator: Allocator<P>,
    health_tx: mpsc::Sender<HealthJob>,
}

impl<P, S> NetworkProvider<P, S>
where
    P: ProxyStore,
    S: ShopStore,
{
    pub fn new(
        proxies: Arc<P>,
        shops: Arc<S>,
        allocator: Allocator<P>,
        health_tx: mpsc::Sender<HealthJob>,
    ) -> Self {
        Self {
            proxies,
            shops,
            allocator,
            health_tx,
        }
    }

    pub async fn resolve_proxy(&self, shop_id: i32) -> Result<String, Error> {
        if shop_id == ANONYMOUS_SHOP {
            return Ok(self.allocator.pick_random().await?.connection_url());
        }

        let shop = self.shops.get(shop_id).await?;
        if let Some(proxy_id) = shop.proxy_id {
            // No re-validation on the hot path; health is the
            // monitor's job. A binding to a vanished row falls
            // through to re-allocation.
            match self.proxies.get(proxy_id).await {
                Ok(proxy) => return Ok(proxy.connection_url()),
                Err(Error::NotFound { .. }) => {
                    debug!(shop = shop.id, proxy = proxy_id, "stale binding, reallocating");
                }
                Err(e) => return Err(e),
            }
        }

        let spare = self.allocator.find_spare(&shop.region).await?;
        self.shops.bind(shop.id, Some(spare.id)).await?;
        debug!(shop = shop.id, proxy = spare.id, "lazily bound shop to proxy");

        Ok(spare.connection_url())
    }

    /// Called after a transport-level failure on the shop's traffic.
    /// Unbinds immediately so the next request rebinds elsewhere, then
    /// queues an async verification of the suspect proxy.
    pub async fn report_error(&self, shop_id: i32) -> Result<(), Error> {
        let shop = self.shops.get(shop_id).await?;
        let Some(proxy_id) = shop.proxy_id else {
            return Ok(());
        };

        self.shops.bind(shop.id, None).await?;

        if let Err(e) = self.health_tx.try_send(HealthJob::Verify { proxy_id }) {
            // The periodic sweep is the retry path; the tenant is
            // already unbound either way.
            warn!(proxy = proxy_id, error = %e, "health queue full, dropping verification job");
        }

        Ok(())
    }
}
