use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Throttled { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

#[derive(Default)]
struct CooldownEntry {
    last_execution: Option<Instant>,
}

/// Per-key cooldown gate guarding repeated invocations of the same
/// keyed operation (e.g. a manual sync trigger). Keys are independent
/// resources: each entry carries its own lock, created atomically on
/// first access, and checks for different keys never contend.
#[derive(Default)]
pub struct CooldownLimiter {
    entries: DashMap<String, Arc<Mutex<CooldownEntry>>>,
}

impl CooldownLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Arc<Mutex<CooldownEntry>> {
        if let Some(entry) = self.entries.get(key) {
            return Arc::clone(entry.value());
        }
        Arc::clone(self.entries.entry(key.to_owned()).or_default().value())
    }

    /// Checks and commits in one atomic step: when allowed, the
    /// execution time is set before the lock is released.
    pub fn check(&self, key: &str, interval: Duration) -> Decision {
        let entry = self.entry(key);
        let mut entry = entry.lock().unwrap();
        let now = Instant::now();
        if let Some(last) = entry.last_execution {
            let elapsed = now.duration_since(last);
            if elapsed < interval {
                return Decision::Throttled {
                    retry_after: interval - elapsed,
                };
            }
        }
        entry.last_execution = Some(now);

        Decision::Allowed
    }

    /// Same computation as `check` but never commits. An unseen key is
    /// allowed and stays unseen.
    pub fn check_only(&self, key: &str, interval: Duration) -> Decision {
        let Some(entry) = self.entries.get(key).map(|e| Arc::clone(e.value())) else {
            return Decision::Allowed;
        };
        let entry = entry.lock().unwrap();
        match entry.last_execution {
            Some(last) => {
                let elapsed = last.elapsed();
                if elapsed < interval {
                    Decision::Throttled {
                        retry_after: interval - elapsed,
                    }
                } else {
                    Decision::Allowed
                }
            }
            None => Decision::Allowed,
        }
    }

    /// Starts the key's cooldown now, outside of `check`. Used when an
    /// async operation completes and should open its own window.
    pub fn mark_executed(&self, key: &str) {
        let entry = self.entry(key);
        entry.lock().unwrap().last_execution = Some(Instant::now());
    }

    /// Drops the entry; the next `check` is unconditionally allowed.
    pub fn reset(&self, key: &str) {
        self.entries.remove(key);
    }
}

pub fn shop_key(shop_id: i32, kind: &str) -> String {
    format!("shop:{shop_id}:{kind}")
}

pub fn global_key(kind: &str) -> String {
    format!("global:{kind}")
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    const INTERVAL: Duration = Duration::from_millis(60);

    #[test]
    fn immediate_recheck_is_throttled_with_remaining_time() {
        let limiter = CooldownLimiter::new();
        assert!(limiter.check("shop:7:order", INTERVAL).is_allowed());

        match limiter.check("shop:7:order", INTERVAL) {
            Decision::Throttled { retry_after } => {
                assert!(retry_after <= INTERVAL);
                assert!(retry_after > INTERVAL / 2);
            }
            Decision::Allowed => panic!("second check within interval must be throttled"),
        }
    }

    #[test]
    fn allowed_again_after_the_interval() {
        let limiter = CooldownLimiter::new();
        assert!(limiter.check("k", INTERVAL).is_allowed());
        thread::sleep(INTERVAL + Duration::from_millis(10));
        assert!(limiter.check("k", INTERVAL).is_allowed());
    }

    #[test]
    fn check_only_never_commits() {
        let limiter = CooldownLimiter::new();
        assert!(limiter.check_only("k", INTERVAL).is_allowed());
        assert!(limiter.check_only("k", INTERVAL).is_allowed());
        // A real check still passes afterwards.
        assert!(limiter.check("k", INTERVAL).is_allowed());
        assert!(!limiter.check_only("k", INTERVAL).is_allowed());
    }

    #[test]
    fn mark_executed_opens_a_cooldown() {
        let limiter = CooldownLimiter::new();
        limiter.mark_executed("k");
        assert!(!limiter.check("k", INTERVAL).is_allowed());
    }

    #[test]
    fn reset_clears_the_window() {
        let limiter = CooldownLimiter::new();
        assert!(limiter.check("k", INTERVAL).is_allowed());
        limiter.reset("k");
        assert!(limiter.check("k", INTERVAL).is_allowed());
    }

    #[test]
    fn keys_do_not_interfere() {
        let limiter = CooldownLimiter::new();
        assert!(limiter.check(&shop_key(7, "order"), INTERVAL).is_allowed());
        assert!(limiter.check(&shop_key(8, "order"), INTERVAL).is_allowed());
        assert!(limiter.check(&global_key("order"), INTERVAL).is_allowed());
        assert!(!limiter.check(&shop_key(7, "order"), INTERVAL).is_allowed());
    }

    #[test]
    fn concurrent_checks_admit_exactly_one() {
        let limiter = Arc::new(CooldownLimiter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || limiter.check("k", Duration::from_secs(60)).is_allowed())
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(admitted, 1);
    }
}
