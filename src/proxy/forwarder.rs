//! Single-downstream streaming relay.

use std::net::IpAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderValue, Uri, Version, header};
use axum::response::Response;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use url::Url;

use super::ProxyError;
use super::headers;
use crate::error::DomainError;

/// Relays requests to one fixed `http://` origin.
///
/// The request and response bodies are streamed through untouched; only
/// the URI and the hop-specific headers are rewritten.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    authority: String,
    base_path: String,
    host: HeaderValue,
}

impl Forwarder {
    /// Validates `downstream` and builds the outbound client.
    ///
    /// `downstream` may carry a base path, which is prefixed to every
    /// forwarded path.
    ///
    /// # Errors
    ///
    /// [`ProxyError::InvalidDownstream`] if the URL does not parse, is not
    /// `http`, has no host, or carries credentials, a query or a fragment.
    pub fn new(downstream: &str, connect_timeout: Option<Duration>) -> Result<Self, ProxyError> {
        let invalid = |reason: &str| ProxyError::InvalidDownstream {
            url: downstream.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(downstream).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "http" {
            return Err(invalid("only http:// downstreams are supported"));
        }
        let Some(host) = url.host_str() else {
            return Err(invalid("missing host"));
        };
        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid("credentials are not allowed"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("query and fragment are not allowed"));
        }

        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let host = HeaderValue::from_str(&authority).map_err(|e| invalid(&e.to_string()))?;
        let base_path = url.path().trim_end_matches('/').to_string();

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(connect_timeout);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            authority,
            base_path,
            host,
        })
    }

    /// Downstream `host[:port]`.
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Maps an inbound URI onto the downstream origin, keeping path and query.
    ///
    /// # Errors
    ///
    /// [`DomainError::BadRequest`] if the combined URI is not valid.
    pub fn target_uri(&self, inbound: &Uri) -> Result<Uri, DomainError> {
        let path = inbound.path();
        let target = match inbound.query() {
            Some(query) => format!("http://{}{}{path}?{query}", self.authority, self.base_path),
            None => format!("http://{}{}{path}", self.authority, self.base_path),
        };
        target
            .parse()
            .map_err(|e| DomainError::bad_request(format!("invalid forward target: {e}")))
    }

    /// Sends `req` downstream once and relays the response.
    ///
    /// Dropping the returned future drops the outbound request and its
    /// connection.
    ///
    /// # Errors
    ///
    /// [`DomainError::Internal`] if the downstream cannot be reached or the
    /// exchange fails before a response head arrives.
    pub async fn forward(
        &self,
        req: Request,
        client: Option<IpAddr>,
    ) -> Result<Response, DomainError> {
        let (mut parts, body) = req.into_parts();
        let target = self.target_uri(&parts.uri)?;

        headers::strip_hop_by_hop(&mut parts.headers);
        headers::add_forwarded(&mut parts.headers, client, "http");
        parts.headers.insert(header::HOST, self.host.clone());
        parts.uri = target;
        parts.version = Version::HTTP_11;

        tracing::debug!(method = %parts.method, uri = %parts.uri, "forwarding request");
        let method = parts.method.clone();
        let outbound = Request::from_parts(parts, body);

        let response = self.client.request(outbound).await.map_err(|e| {
            tracing::error!(%method, downstream = %self.authority, error = %e, "upstream request failed");
            DomainError::internal(format!("failed to forward request to {}: {e}", self.authority))
        })?;

        let (mut parts, body) = response.into_parts();
        headers::strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unusable_downstreams() {
        for bad in [
            "not a url",
            "https://secure.local",
            "http://user:pw@host.local",
            "http://host.local/?q=1",
            "http://host.local/#frag",
            "ftp://host.local",
        ] {
            assert!(
                matches!(
                    Forwarder::new(bad, None),
                    Err(ProxyError::InvalidDownstream { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn target_keeps_path_and_query() {
        let Ok(fwd) = Forwarder::new("http://faker:12003/base/", None) else {
            panic!("valid downstream");
        };
        assert_eq!(fwd.authority(), "faker:12003");

        let Ok(inbound) = "/v1/items?limit=5&sort=asc".parse::<Uri>() else {
            panic!("valid uri");
        };
        let Ok(target) = fwd.target_uri(&inbound) else {
            panic!("target builds");
        };
        assert_eq!(
            target.to_string(),
            "http://faker:12003/base/v1/items?limit=5&sort=asc"
        );
    }

    #[tokio::test]
    async fn default_port_is_omitted() {
        let Ok(fwd) = Forwarder::new("http://faker", None) else {
            panic!("valid downstream");
        };
        let Ok(target) = fwd.target_uri(&Uri::from_static("/")) else {
            panic!("target builds");
        };
        assert_eq!(target.to_string(), "http://faker/");
    }
}
