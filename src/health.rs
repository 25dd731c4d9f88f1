use std::sync::Arc;

use egress_core::models::proxies::{Proxy, ProxyStatus};
use tracing::{debug, info, warn};

use crate::{
    error::Error,
    migrate::Migrator,
    probe::Probe,
    store::{ProxyStore, ShopStore},
};

pub const DEFAULT_MAX_FAIL_COUNT: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthVerdict {
    pub healthy: bool,
    pub status: ProxyStatus,
}

/// Drives the per-proxy health state machine: consecutive probe
/// failures degrade Active to Unstable and, at the threshold, to Dead,
/// which kicks off migration of every bound tenant. A single success
/// resets the slate.
pub struct HealthMonitor<P, S, B> {
    proxies: Arc<P>,
    probe: B,
    migrator: Migrator<P, S>,
    max_fail_count: i32,
}

impl<P, S, B> HealthMonitor<P, S, B>
where
    P: ProxyStore,
    S: ShopStore,
    B: Probe,
{
    pub fn new(proxies: Arc<P>, probe: B, migrator: Migrator<P, S>, max_fail_count: i32) -> Self {
        Self {
            proxies,
            probe,
            migrator,
            max_fail_count,
        }
    }

    /// Probes `proxy` and persists the resulting transition. All health
    /// writes are conditional on the failure count the caller observed;
    /// losing that race means another probe already ruled, and this
    /// verdict is discarded without side effects.
    pub async fn verify_and_heal(&self, proxy: &Proxy) -> Result<HealthVerdict, Error> {
        match self.probe.check(proxy).await {
            Ok(()) => {
                if proxy.failure_count > 0 || proxy.status != ProxyStatus::Active {
                    let applied = self
                        .proxies
                        .record_health(proxy.id, proxy.failure_count, ProxyStatus::Active, 0)
                        .await?;
                    if applied {
                        info!(proxy = proxy.id, "proxy recovered");
                    } else {
                        debug!(proxy = proxy.id, "stale recovery verdict discarded");
                    }
                } else {
                    self.proxies.touch_checked(proxy.id).await?;
                }
                Ok(HealthVerdict {
                    healthy: true,
                    status: ProxyStatus::Active,
                })
            }
            Err(probe_err) => {
                let failures = proxy.failure_count + 1;
                let status = if failures >= self.max_fail_count {
                    ProxyStatus::Dead
                } else {
                    ProxyStatus::Unstable
                };

                let applied = self
                    .proxies
                    .record_health(proxy.id, proxy.failure_count, status, failures)
                    .await?;
                if !applied {
                    debug!(proxy = proxy.id, "concurrent probe already recorded a verdict");
                    return Ok(HealthVerdict {
                        healthy: false,
                        status: proxy.status,
                    });
                }

                warn!(
                    proxy = proxy.id,
                    failures,
                    error = %probe_err,
                    "proxy probe failed"
                );

                if status == ProxyStatus::Dead {
                    let report = self.migrator.migrate_shops(proxy).await?;
                    if report.migrated > 0 || report.stranded > 0 {
                        info!(
                            proxy = proxy.id,
                            migrated = report.migrated,
                            stranded = report.stranded,
                            "migration pass finished for dead proxy"
                        );
                    }
                }

                Ok(HealthVerdict {
                    healthy: false,
                    status,
                })
            }
        }
    }
}
