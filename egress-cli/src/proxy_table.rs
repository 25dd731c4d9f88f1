use std::fmt::Display;

use egress_core::models::{
    proxies::{Proxy, ProxyStatus},
    shops::Shop,
};
use tabled::builder;

fn status_str(status: ProxyStatus) -> &'static str {
    match status {
        ProxyStatus::Active => "active",
        ProxyStatus::Unstable => "unstable",
        ProxyStatus::Dead => "dead",
    }
}

pub struct ProxyTable(pub Vec<Proxy>);

impl Display for ProxyTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut builder = builder::Builder::new();
        builder.push_record([
            "id", "protocol", "host", "port", "region", "capacity", "status", "failures",
            "enabled",
        ]);
        for proxy in &self.0 {
            builder.push_record([
                &proxy.id.to_string(),
                &proxy.protocol,
                &proxy.host,
                &proxy.port.to_string(),
                &proxy.region,
                &proxy.capacity.to_string(),
                &status_str(proxy.status).to_string(),
                &proxy.failure_count.to_string(),
                &proxy.is_active.to_string(),
            ]);
        }

        let table = builder.build().to_string();
        write!(f, "{}", table)
    }
}

pub struct ShopTable(pub Vec<Shop>);

impl Display for ShopTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut builder = builder::Builder::new();
        builder.push_record(["id", "name", "region", "proxy"]);
        for shop in &self.0 {
            builder.push_record([
                &shop.id.to_string(),
                &shop.name,
                &shop.region,
                &shop
                    .proxy_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".into()),
            ]);
        }

        let table = builder.build().to_string();
        write!(f, "{}", table)
    }
}
