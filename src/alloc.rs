use std::sync::Arc;

use egress_core::models::proxies::{Proxy, ProxyCandidate};
use rand::seq::SliceRandom;
use tracing::debug;

use crate::{error::Error, store::ProxyStore};

pub struct Allocator<P> {
    proxies: Arc<P>,
}

impl<P> Clone for Allocator<P> {
    fn clone(&self) -> Self {
        Self {
            proxies: Arc::clone(&self.proxies),
        }
    }
}

impl<P> Allocator<P>
where
    P: ProxyStore,
{
    pub fn new(proxies: Arc<P>) -> Self {
        Self { proxies }
    }

    /// Selects a spare proxy for a region. Exact region match first,
    /// widening to any region when none exists there. Tie-break:
    /// under-capacity proxies before saturated ones, then fewest bound
    /// shops, then lowest failure count, then lowest id.
    pub async fn find_spare(&self, region: &str) -> Result<Proxy, Error> {
        let mut candidates = self.proxies.candidates(Some(region)).await?;
        if candidates.is_empty() {
            debug!(region, "no regional spare, widening to any region");
            candidates = self.proxies.candidates(None).await?;
        }

        pick_least_loaded(candidates).ok_or_else(|| Error::NoSpareProxy {
            region: region.into(),
        })
    }

    /// Any enabled proxy irrespective of health or region, for ad-hoc
    /// connectivity probes with no tenant involved.
    pub async fn pick_random(&self) -> Result<Proxy, Error> {
        let pool = self.proxies.active().await?;
        pool.choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(Error::NoProxyAvailable)
    }
}

fn pick_least_loaded(mut candidates: Vec<ProxyCandidate>) -> Option<Proxy> {
    candidates.sort_by_key(|c| {
        (
            c.bound_shops >= i64::from(c.proxy.capacity),
            c.bound_shops,
            c.proxy.failure_count,
            c.proxy.id,
        )
    });
    candidates.into_iter().next().map(|c| c.proxy)
}
