use sqlx::{postgres::PgPool, Error};

use crate::models::proxies::{
    NewProxy, Proxy, ProxyCandidate, ProxyFilter, ProxyPatch, ProxyStatus,
};

/// Inserts a proxy. New rows start Active with a zero failure count.
/// A duplicate active (host, port) pair violates the partial unique
/// index and surfaces as a database error for the caller to map.
pub async fn add_proxy(pool: &PgPool, proxy: &NewProxy) -> Result<Proxy, Error> {
    sqlx::query_as::<_, Proxy>(
        r#"
            INSERT INTO
            egress_proxies (protocol, host, port, username, password, region, capacity, created_by)
            values ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                id, protocol, host, port, username, password,
                region, capacity, status, failure_count, is_active
        "#,
    )
    .bind(&proxy.protocol)
    .bind(&proxy.host)
    .bind(proxy.port)
    .bind(&proxy.username)
    .bind(&proxy.password)
    .bind(&proxy.region)
    .bind(proxy.capacity)
    .bind(proxy.created_by)
    .fetch_one(pool)
    .await
}

/// Partial-field merge. Health state is owned by the monitor and is
/// deliberately absent from the SET list.
pub async fn update_proxy(pool: &PgPool, id: i32, patch: &ProxyPatch) -> Result<Proxy, Error> {
    sqlx::query_as::<_, Proxy>(
        r#"
            UPDATE egress_proxies
            SET protocol = COALESCE($1, protocol),
                username = COALESCE($2, username),
                password = COALESCE($3, password),
                region = COALESCE($4, region),
                capacity = COALESCE($5, capacity),
                is_active = COALESCE($6, is_active),
                updated_by = COALESCE($7, updated_by)
            WHERE id = $8
            RETURNING
                id, protocol, host, port, username, password,
                region, capacity, status, failure_count, is_active
        "#,
    )
    .bind(&patch.protocol)
    .bind(&patch.username)
    .bind(&patch.password)
    .bind(&patch.region)
    .bind(patch.capacity)
    .bind(patch.is_active)
    .bind(patch.updated_by)
    .bind(id)
    .fetch_one(pool)
    .await
}

pub async fn get_proxy_by_id(pool: &PgPool, id: i32) -> Result<Proxy, Error> {
    sqlx::query_as::<_, Proxy>(
        r#"
            SELECT
                id, protocol, host, port, username, password,
                region, capacity, status, failure_count, is_active
            FROM egress_proxies
            WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await
}

pub async fn get_proxies(pool: &PgPool, filter: &ProxyFilter) -> Result<Vec<Proxy>, Error> {
    sqlx::query_as::<_, Proxy>(
        r#"
            SELECT
                id, protocol, host, port, username, password,
                region, capacity, status, failure_count, is_active
            FROM egress_proxies
            WHERE ($1::text IS NULL OR region = $1)
            AND ($2::int2 IS NULL OR status = $2)
            AND ($3::bool IS NULL OR is_active = $3)
            ORDER BY id
        "#,
    )
    .bind(&filter.region)
    .bind(filter.status.map(|s| s as i16))
    .bind(filter.is_active)
    .fetch_all(pool)
    .await
}

/// Spare-eligible proxies (enabled, Active) with their current bound
/// tenant counts, optionally narrowed to a region.
pub async fn get_spare_candidates(
    pool: &PgPool,
    region: Option<&str>,
) -> Result<Vec<ProxyCandidate>, Error> {
    sqlx::query_as::<_, ProxyCandidate>(
        r#"
            SELECT
                p.id, p.protocol, p.host, p.port, p.username, p.password,
                p.region, p.capacity, p.status, p.failure_count, p.is_active,
                count(s.id) AS bound_shops
            FROM egress_proxies as p
            LEFT JOIN egress_shops as s ON s.proxy_id = p.id
            WHERE p.is_active AND p.status = $1
            AND ($2::text IS NULL OR p.region = $2)
            GROUP BY p.id
        "#,
    )
    .bind(ProxyStatus::Active as i16)
    .bind(region)
    .fetch_all(pool)
    .await
}

/// Every enabled proxy regardless of health, for random probe picks
/// and the periodic sweep.
pub async fn get_active_proxies(pool: &PgPool) -> Result<Vec<Proxy>, Error> {
    sqlx::query_as::<_, Proxy>(
        r#"
            SELECT
                id, protocol, host, port, username, password,
                region, capacity, status, failure_count, is_active
            FROM egress_proxies
            WHERE is_active
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Conditional health write: applies only if failure_count still holds
/// the value the caller observed. Returns false when a concurrent probe
/// got there first, in which case the caller's verdict is stale.
pub async fn set_proxy_health(
    pool: &PgPool,
    id: i32,
    expected_failures: i32,
    status: ProxyStatus,
    failures: i32,
) -> Result<bool, Error> {
    let result = sqlx::query(
        r#"
            UPDATE egress_proxies
            SET status = $1, failure_count = $2, last_check = now()
            WHERE id = $3 AND failure_count = $4
        "#,
    )
    .bind(status as i16)
    .bind(failures)
    .bind(id)
    .bind(expected_failures)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn touch_proxy_checked(pool: &PgPool, id: i32) -> Result<(), Error> {
    sqlx::query(
        r#"
            UPDATE egress_proxies
            SET last_check = now()
            WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}
