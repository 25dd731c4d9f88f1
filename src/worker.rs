use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::timeout,
};
use tracing::warn;

use crate::{
    error::Error,
    health::HealthMonitor,
    probe::Probe,
    store::{ProxyStore, ShopStore},
};

pub enum HealthJob {
    Verify { proxy_id: i32 },
}

/// Consumes health jobs from a shared bounded queue. Each job runs
/// under its own deadline so a stuck probe or migration cannot pin a
/// worker forever; failures are logged, never propagated.
pub struct HealthWorker<P, S, B> {
    proxies: Arc<P>,
    monitor: Arc<HealthMonitor<P, S, B>>,
    channel: Arc<Mutex<mpsc::Receiver<HealthJob>>>,
    job_timeout: Duration,
}

impl<P, S, B> Clone for HealthWorker<P, S, B> {
    fn clone(&self) -> Self {
        Self {
            proxies: Arc::clone(&self.proxies),
            monitor: Arc::clone(&self.monitor),
            channel: Arc::clone(&self.channel),
            job_timeout: self.job_timeout,
        }
    }
}

impl<P, S, B> HealthWorker<P, S, B>
where
    P: ProxyStore,
    S: ShopStore,
    B: Probe,
{
    pub async fn start(self) {
        loop {
            let job = { self.channel.lock().await.recv().await };
            match job {
                Some(job) => self.process_job(job).await,
                None => break,
            }
        }

        warn!("health job channel closed, worker exiting");
    }

    async fn process_job(&self, job: HealthJob) {
        match job {
            HealthJob::Verify { proxy_id } => {
                let work = async {
                    let proxy = self.proxies.get(proxy_id).await?;
                    self.monitor.verify_and_heal(&proxy).await?;
                    Ok::<_, Error>(())
                };
                match timeout(self.job_timeout, work).await {
                    Err(_) => warn!(proxy = proxy_id, "health verification timed out"),
                    Ok(Err(e)) => {
                        warn!(proxy = proxy_id, error = %e, "error processing health job")
                    }
                    Ok(Ok(())) => {}
                }
            }
        }
    }
}

/// Spawns a fixed pool of health workers over one bounded queue and
/// hands back the sender side.
pub fn spawn_workers<P, S, B>(
    proxies: Arc<P>,
    monitor: Arc<HealthMonitor<P, S, B>>,
    workers: usize,
    queue_depth: usize,
    job_timeout: Duration,
) -> (mpsc::Sender<HealthJob>, Vec<JoinHandle<()>>)
where
    P: ProxyStore,
    S: ShopStore,
    B: Probe,
{
    let (tx, rx) = mpsc::channel(queue_depth);
    let worker = HealthWorker {
        proxies,
        monitor,
        channel: Arc::new(Mutex::new(rx)),
        job_timeout,
    };

    let handles = (0..workers.max(1))
        .map(|_| tokio::spawn(worker.clone().start()))
        .collect();

    (tx, handles)
}

#[cfg(test)]
mod tests {
    use egress_core::models::proxies::ProxyStatus;

    use super::*;
    use crate::{
        alloc::Allocator,
        health::DEFAULT_MAX_FAIL_COUNT,
        migrate::Migrator,
        probe::testutil::FakeProbe,
        store::testutil::{proxy_fixture, MemStore},
    };

    fn monitor(
        store: &Arc<MemStore>,
        probe: FakeProbe,
    ) -> Arc<HealthMonitor<MemStore, MemStore, FakeProbe>> {
        let migrator = Migrator::new(Allocator::new(Arc::clone(store)), Arc::clone(store));
        Arc::new(HealthMonitor::new(
            Arc::clone(store),
            probe,
            migrator,
            DEFAULT_MAX_FAIL_COUNT,
        ))
    }

    #[tokio::test]
    async fn jobs_are_processed_off_the_queue() {
        let store = Arc::new(MemStore::default());
        store.insert_proxy(proxy_fixture(1, "US"));

        let (tx, handles) = spawn_workers(
            Arc::clone(&store),
            monitor(&store, FakeProbe::scripted([false])),
            2,
            16,
            Duration::from_secs(5),
        );

        tx.send(HealthJob::Verify { proxy_id: 1 }).await.unwrap();
        drop(tx);
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = store.proxy(1).unwrap();
        assert_eq!(stored.status, ProxyStatus::Unstable);
        assert_eq!(stored.failure_count, 1);
    }

    #[tokio::test]
    async fn missing_proxy_job_is_absorbed() {
        let store = Arc::new(MemStore::default());
        let (tx, handles) = spawn_workers(
            Arc::clone(&store),
            monitor(&store, FakeProbe::default()),
            1,
            16,
            Duration::from_secs(5),
        );

        tx.send(HealthJob::Verify { proxy_id: 404 }).await.unwrap();
        drop(tx);
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
