use sqlx::{postgres::PgPool, Error};

use crate::models::shops::{NewShop, Shop};

pub async fn add_shop(pool: &PgPool, shop: &NewShop) -> Result<Shop, Error> {
    sqlx::query_as::<_, Shop>(
        r#"
            INSERT INTO
            egress_shops (name, region, created_by)
            values ($1, $2, $3)
            RETURNING id, name, region, proxy_id
        "#,
    )
    .bind(&shop.name)
    .bind(&shop.region)
    .bind(shop.created_by)
    .fetch_one(pool)
    .await
}

pub async fn get_shop_by_id(pool: &PgPool, id: i32) -> Result<Shop, Error> {
    sqlx::query_as::<_, Shop>(
        r#"
            SELECT id, name, region, proxy_id
            FROM egress_shops
            WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await
}

pub async fn get_shops(pool: &PgPool) -> Result<Vec<Shop>, Error> {
    sqlx::query_as::<_, Shop>(
        r#"
            SELECT id, name, region, proxy_id
            FROM egress_shops
            ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Tenants currently routed through the given proxy. Empty once a
/// migration pass has moved them, which is what makes re-migration a
/// no-op.
pub async fn get_shops_by_proxy(pool: &PgPool, proxy_id: i32) -> Result<Vec<Shop>, Error> {
    sqlx::query_as::<_, Shop>(
        r#"
            SELECT id, name, region, proxy_id
            FROM egress_shops
            WHERE proxy_id = $1
        "#,
    )
    .bind(proxy_id)
    .fetch_all(pool)
    .await
}

/// Binds or unbinds a shop. Last writer wins; both the lazy-bind path
/// and migration converge on assigning a currently healthy proxy.
pub async fn set_shop_proxy(
    pool: &PgPool,
    shop_id: i32,
    proxy_id: Option<i32>,
) -> Result<(), Error> {
    sqlx::query(
        r#"
            UPDATE egress_shops
            SET proxy_id = $1
            WHERE id = $2
        "#,
    )
    .bind(proxy_id)
    .bind(shop_id)
    .execute(pool)
    .await?;

    Ok(())
}
