//! Outbound proxy pool for multi-tenant storefront traffic: lazy
//! tenant-to-proxy binding, live health verification with automatic
//! migration off dead proxies, and a per-key cooldown rate limiter.
//!
//! The request dispatcher embeds [`provider::NetworkProvider`] to
//! resolve an egress URL per tenant and to report transport failures;
//! a periodic scheduler (see the `egress` binary) drives
//! [`health::HealthMonitor`] across the whole pool.

pub mod alloc;
pub mod config;
pub mod error;
pub mod health;
pub mod limiter;
pub mod migrate;
pub mod probe;
pub mod provider;
pub mod store;
pub mod worker;
