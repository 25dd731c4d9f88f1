pub mod proxies;
pub mod shops;
