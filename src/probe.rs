use std::time::Duration;

use async_trait::async_trait;
use egress_core::models::proxies::Proxy;
use http::StatusCode;
use hyper::{client::HttpConnector, Body, Client, Request, Uri};
use hyper_proxy::{Intercept, Proxy as UpstreamProxy, ProxyConnector};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use thiserror::Error;
use tokio::time::timeout;

/// Probe failure is routine input to the health state machine, never
/// surfaced to request-path callers.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out")]
    Timeout,
    #[error("probe transport error: {0}")]
    Transport(String),
    #[error("unexpected probe status {0}")]
    Status(StatusCode),
    #[error("invalid proxy endpoint: {0}")]
    BadEndpoint(String),
}

#[async_trait]
pub trait Probe: Send + Sync + 'static {
    async fn check(&self, proxy: &Proxy) -> Result<(), ProbeError>;
}

/// Live connectivity check: a GET through the proxy against a known
/// stable endpoint, bounded by a timeout. Anything other than the
/// expected status within the deadline counts as failure.
pub struct HttpProbe {
    target: Uri,
    expected: StatusCode,
    deadline: Duration,
}

impl HttpProbe {
    pub fn new(target: Uri, expected: StatusCode, deadline: Duration) -> Self {
        Self {
            target,
            expected,
            deadline,
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, proxy: &Proxy) -> Result<(), ProbeError> {
        let client = build_probe_client(proxy)?;
        let req = Request::get(self.target.clone())
            .body(Body::empty())
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        match timeout(self.deadline, client.request(req)).await {
            Err(_) => Err(ProbeError::Timeout),
            Ok(Err(e)) => Err(ProbeError::Transport(e.to_string())),
            Ok(Ok(res)) if res.status() == self.expected => Ok(()),
            Ok(Ok(res)) => Err(ProbeError::Status(res.status())),
        }
    }
}

fn build_probe_client(
    upstream: &Proxy,
) -> Result<Client<ProxyConnector<HttpsConnector<HttpConnector>>>, ProbeError> {
    let https = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();

    let uri: Uri = format!("{}://{}:{}", upstream.protocol, upstream.host, upstream.port)
        .parse()
        .map_err(|e: http::uri::InvalidUri| ProbeError::BadEndpoint(e.to_string()))?;
    let mut proxy = UpstreamProxy::new(Intercept::All, uri);
    if let (Some(usr), Some(pwd)) = (&upstream.username, &upstream.password) {
        let auth = headers::Authorization::basic(usr, pwd);
        proxy.set_authorization(auth);
    }
    let connector =
        ProxyConnector::from_proxy(https, proxy).map_err(|e| ProbeError::Transport(e.to_string()))?;

    Ok(Client::builder().build(connector))
}
