use sqlx::FromRow;

use super::Auditable;

/// A tenant storefront. `proxy_id` is the weak binding to the proxy
/// currently routing its traffic; NULL means unbound.
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct Shop {
    pub id: i32,
    pub name: String,
    pub region: String,
    pub proxy_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShop {
    pub name: String,
    pub region: String,
    pub created_by: Option<i32>,
}

impl Auditable for NewShop {
    fn set_created_by(&mut self, operator: i32) {
        self.created_by = Some(operator);
    }
}
