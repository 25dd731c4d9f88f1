use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("proxy endpoint {host}:{port} already registered")]
    Conflict { host: String, port: i32 },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },
    #[error("no spare proxy available for region {region}")]
    NoSpareProxy { region: String },
    #[error("proxy pool is empty")]
    NoProxyAvailable,
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: i32) -> Self {
        Self::NotFound { entity, id }
    }
}
