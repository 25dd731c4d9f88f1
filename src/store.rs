use std::sync::Arc;

use async_trait::async_trait;
use egress_core::{
    crud,
    models::{
        proxies::{NewProxy, Proxy, ProxyCandidate, ProxyFilter, ProxyPatch, ProxyStatus},
        shops::Shop,
        Auditable,
    },
};
use sqlx::PgPool;

use crate::error::Error;

/// Registry surface over the proxy table. Health writes go through the
/// conditional `record_health` so racing probes cannot clobber each
/// other's counts.
#[async_trait]
pub trait ProxyStore: Send + Sync + 'static {
    async fn create(&self, proxy: NewProxy) -> Result<Proxy, Error>;
    async fn update(&self, id: i32, patch: ProxyPatch) -> Result<Proxy, Error>;
    async fn get(&self, id: i32) -> Result<Proxy, Error>;
    async fn list(&self, filter: &ProxyFilter) -> Result<Vec<Proxy>, Error>;
    async fn candidates(&self, region: Option<&str>) -> Result<Vec<ProxyCandidate>, Error>;
    async fn active(&self) -> Result<Vec<Proxy>, Error>;
    /// Returns false when `expected_failures` no longer matches, i.e. a
    /// concurrent probe already recorded a verdict.
    async fn record_health(
        &self,
        id: i32,
        expected_failures: i32,
        status: ProxyStatus,
        failures: i32,
    ) -> Result<bool, Error>;
    async fn touch_checked(&self, id: i32) -> Result<(), Error>;
}

#[async_trait]
pub trait ShopStore: Send + Sync + 'static {
    async fn get(&self, id: i32) -> Result<Shop, Error>;
    async fn by_proxy(&self, proxy_id: i32) -> Result<Vec<Shop>, Error>;
    async fn bind(&self, shop_id: i32, proxy_id: Option<i32>) -> Result<(), Error>;
}

pub struct PgProxyStore {
    pool: Arc<PgPool>,
    actor: Option<i32>,
}

impl PgProxyStore {
    pub fn new(pool: Arc<PgPool>, actor: Option<i32>) -> Self {
        Self { pool, actor }
    }
}

fn map_missing(e: sqlx::Error, entity: &'static str, id: i32) -> Error {
    match e {
        sqlx::Error::RowNotFound => Error::not_found(entity, id),
        other => other.into(),
    }
}

#[async_trait]
impl ProxyStore for PgProxyStore {
    async fn create(&self, mut proxy: NewProxy) -> Result<Proxy, Error> {
        if let Some(operator) = self.actor {
            proxy.set_created_by(operator);
        }
        crud::proxies::add_proxy(&self.pool, &proxy)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => Error::Conflict {
                    host: proxy.host.clone(),
                    port: proxy.port,
                },
                _ => e.into(),
            })
    }

    async fn update(&self, id: i32, mut patch: ProxyPatch) -> Result<Proxy, Error> {
        if let Some(operator) = self.actor {
            patch.set_updated_by(operator);
        }
        crud::proxies::update_proxy(&self.pool, id, &patch)
            .await
            .map_err(|e| map_missing(e, "proxy", id))
    }

    async fn get(&self, id: i32) -> Result<Proxy, Error> {
        crud::proxies::get_proxy_by_id(&self.pool, id)
            .await
            .map_err(|e| map_missing(e, "proxy", id))
    }

    async fn list(&self, filter: &ProxyFilter) -> Result<Vec<Proxy>, Error> {
        Ok(crud::proxies::get_proxies(&self.pool, filter).await?)
    }

    async fn candidates(&self, region: Option<&str>) -> Result<Vec<ProxyCandidate>, Error> {
        Ok(crud::proxies::get_spare_candidates(&self.pool, region).await?)
    }

    async fn active(&self) -> Result<Vec<Proxy>, Error> {
        Ok(crud::proxies::get_active_proxies(&self.pool).await?)
    }

    async fn record_health(
        &self,
        id: i32,
        expected_failures: i32,
        status: ProxyStatus,
        failures: i32,
    ) -> Result<bool, Error> {
        Ok(crud::proxies::set_proxy_health(&self.pool, id, expected_failures, status, failures)
            .await?)
    }

    async fn touch_checked(&self, id: i32) -> Result<(), Error> {
        Ok(crud::proxies::touch_proxy_checked(&self.pool, id).await?)
    }
}

pub struct PgShopStore {
    pool: Arc<PgPool>,
}

impl PgShopStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShopStore for PgShopStore {
    async fn get(&self, id: i32) -> Result<Shop, Error> {
        crud::shops::get_shop_by_id(&self.pool, id)
            .await
            .map_err(|e| map_missing(e, "shop", id))
    }

    async fn by_proxy(&self, proxy_id: i32) -> Result<Vec<Shop>, Error> {
        Ok(crud::shops::get_shops_by_proxy(&self.pool, proxy_id).await?)
    }

    async fn bind(&self, shop_id: i32, proxy_id: Option<i32>) -> Result<(), Error> {
        Ok(crud::shops::set_shop_proxy(&self.pool, shop_id, proxy_id).await?)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Mutex;

    use super::*;

    /// In-memory stand-in for both stores, shared by the component
    /// tests so pool logic runs without Postgres.
    #[derive(Default)]
    pub struct MemStore {
        pub proxies: Mutex<Vec<Proxy>>,
        pub shops: Mutex<Vec<Shop>>,
    }

    impl MemStore {
        pub fn insert_proxy(&self, proxy: Proxy) {
            self.proxies.lock().unwrap().push(proxy);
        }

        pub fn insert_shop(&self, shop: Shop) {
            self.shops.lock().unwrap().push(shop);
        }

        pub fn proxy(&self, id: i32) -> Option<Proxy> {
            self.proxies.lock().unwrap().iter().find(|p| p.id == id).cloned()
        }

        pub fn shop(&self, id: i32) -> Option<Shop> {
            self.shops.lock().unwrap().iter().find(|s| s.id == id).cloned()
        }
    }

    #[async_trait]
    impl ProxyStore for MemStore {
        async fn create(&self, proxy: NewProxy) -> Result<Proxy, Error> {
            let mut proxies = self.proxies.lock().unwrap();
            if proxies
                .iter()
                .any(|p| p.is_active && p.host == proxy.host && p.port == proxy.port)
            {
                return Err(Error::Conflict {
                    host: proxy.host,
                    port: proxy.port,
                });
            }
            let id = proxies.iter().map(|p| p.id).max().unwrap_or(0) + 1;
            let created = Proxy {
                id,
                protocol: proxy.protocol,
                host: proxy.host,
                port: proxy.port,
                username: proxy.username,
                password: proxy.password,
                region: proxy.region,
                capacity: proxy.capacity,
                status: ProxyStatus::Active,
                failure_count: 0,
                is_active: true,
            };
            proxies.push(created.clone());
            Ok(created)
        }

        async fn update(&self, id: i32, patch: ProxyPatch) -> Result<Proxy, Error> {
            let mut proxies = self.proxies.lock().unwrap();
            let proxy = proxies
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| Error::not_found("proxy", id))?;
            if let Some(protocol) = patch.protocol {
                proxy.protocol = protocol;
            }
            if let Some(username) = patch.username {
                proxy.username = Some(username);
            }
            if let Some(password) = patch.password {
                proxy.password = Some(password);
            }
            if let Some(region) = patch.region {
                proxy.region = region;
            }
            if let Some(capacity) = patch.capacity {
                proxy.capacity = capacity;
            }
            if let Some(is_active) = patch.is_active {
                proxy.is_active = is_active;
            }
            Ok(proxy.clone())
        }

        async fn get(&self, id: i32) -> Result<Proxy, Error> {
            self.proxy(id).ok_or_else(|| Error::not_found("proxy", id))
        }

        async fn list(&self, filter: &ProxyFilter) -> Result<Vec<Proxy>, Error> {
            Ok(self
                .proxies
                .lock()
                .unwrap()
                .iter()
                .filter(|p| filter.region.as_deref().map_or(true, |r| p.region == r))
                .filter(|p| filter.status.map_or(true, |s| p.status == s))
                .filter(|p| filter.is_active.map_or(true, |a| p.is_active == a))
                .cloned()
                .collect())
        }

        async fn candidates(&self, region: Option<&str>) -> Result<Vec<ProxyCandidate>, Error> {
            let shops = self.shops.lock().unwrap();
            Ok(self
                .proxies
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.is_active && p.status == ProxyStatus::Active)
                .filter(|p| region.map_or(true, |r| p.region == r))
                .map(|p| ProxyCandidate {
                    proxy: p.clone(),
                    bound_shops: shops.iter().filter(|s| s.proxy_id == Some(p.id)).count()
                        as i64,
                })
                .collect())
        }

        async fn active(&self) -> Result<Vec<Proxy>, Error> {
            Ok(self
                .proxies
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.is_active)
                .cloned()
                .collect())
        }

        async fn record_health(
            &self,
            id: i32,
            expected_failures: i32,
            status: ProxyStatus,
            failures: i32,
        ) -> Result<bool, Error> {
            let mut proxies = self.proxies.lock().unwrap();
            match proxies.iter_mut().find(|p| p.id == id) {
                Some(p) if p.failure_count == expected_failures => {
                    p.status = status;
                    p.failure_count = failures;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn touch_checked(&self, _id: i32) -> Result<(), Error> {
            Ok(())
        }
    }

    #[async_trait]
    impl ShopStore for MemStore {
        async fn get(&self, id: i32) -> Result<Shop, Error> {
            self.shop(id).ok_or_else(|| Error::not_found("shop", id))
        }

        async fn by_proxy(&self, proxy_id: i32) -> Result<Vec<Shop>, Error> {
            Ok(self
                .shops
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.proxy_id == Some(proxy_id))
                .cloned()
                .collect())
        }

        async fn bind(&self, shop_id: i32, proxy_id: Option<i32>) -> Result<(), Error> {
            let mut shops = self.shops.lock().unwrap();
            let shop = shops
                .iter_mut()
                .find(|s| s.id == shop_id)
                .ok_or_else(|| Error::not_found("shop", shop_id))?;
            shop.proxy_id = proxy_id;
            Ok(())
        }
    }

    pub fn proxy_fixture(id: i32, region: &str) -> Proxy {
        Proxy {
            id,
            protocol: "http".into(),
            host: format!("10.0.0.{id}"),
            port: 8080,
            username: None,
            password: None,
            region: region.into(),
            capacity: 100,
            status: ProxyStatus::Active,
            failure_count: 0,
            is_active: true,
        }
    }

    pub fn shop_fixture(id: i32, region: &str, proxy_id: Option<i32>) -> Shop {
        Shop {
            id,
            name: format!("shop-{id}"),
            region: region.into(),
            proxy_id,
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_active_endpoint() {
        let store = MemStore::default();
        let new = NewProxy {
            protocol: "http".into(),
            host: "10.0.0.1".into(),
            port: 8080,
            username: None,
            password: None,
            region: "US".into(),
            capacity: 10,
            created_by: None,
        };
        store.create(new.clone()).await.unwrap();
        let err = store.create(new).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }

    #[tokio::test]
    async fn update_merges_partial_fields_only() {
        let store = MemStore::default();
        store.insert_proxy(proxy_fixture(1, "US"));
        let updated = store
            .update(
                1,
                ProxyPatch {
                    capacity: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.capacity, 5);
        assert_eq!(updated.region, "US");
        assert_eq!(updated.status, ProxyStatus::Active);
    }
}
