//! Header rewriting for the forwarding hop.
//!
//! - Strip hop-by-hop headers, including those named in `Connection`
//! - Append the client to `X-Forwarded-For`
//! - Record the inbound `Host` and scheme in `X-Forwarded-Host`/`-Proto`

use std::net::IpAddr;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

/// `X-Forwarded-For`.
pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
/// `X-Forwarded-Host`.
pub static X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
/// `X-Forwarded-Proto`.
pub static X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Returns `true` for headers that only apply to a single connection.
#[must_use]
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "proxy-connection"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Removes hop-by-hop headers and every header listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }

    let hop: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop(name))
        .cloned()
        .collect();
    for name in hop {
        headers.remove(name);
    }
}

/// Adds the `X-Forwarded-*` headers for a request received over `proto`.
///
/// `client` is appended to any existing `X-Forwarded-For` chain.
/// `X-Forwarded-Host` keeps the first proxy's value if already present.
pub fn add_forwarded(headers: &mut HeaderMap, client: Option<IpAddr>, proto: &'static str) {
    if let Some(ip) = client {
        let chain = match headers
            .get(&X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
        {
            Some(prior) => format!("{prior}, {ip}"),
            None => ip.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR.clone(), value);
        }
    }

    if !headers.contains_key(&X_FORWARDED_HOST)
        && let Some(host) = headers.get(header::HOST).cloned()
    {
        headers.insert(X_FORWARDED_HOST.clone(), host);
    }

    headers.insert(X_FORWARDED_PROTO.clone(), HeaderValue::from_static(proto));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn map(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for &(name, value) in pairs {
            headers.append(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        headers
    }

    #[test]
    fn strips_standard_and_listed_headers() {
        let mut headers = map(&[
            ("connection", "keep-alive, x-session-hint"),
            ("keep-alive", "timeout=5"),
            ("transfer-encoding", "chunked"),
            ("upgrade", "websocket"),
            ("x-session-hint", "abc"),
            ("x-request-id", "r-1"),
            ("content-type", "application/json"),
        ]);
        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 2);
        assert!(headers.contains_key("x-request-id"));
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn forwarded_for_is_appended() {
        let mut headers = map(&[("x-forwarded-for", "10.0.0.1"), ("host", "api.local")]);
        add_forwarded(&mut headers, Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 7))), "http");
        assert_eq!(
            headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()),
            Some("10.0.0.1, 192.168.1.7")
        );
        assert_eq!(
            headers.get(&X_FORWARDED_HOST).and_then(|v| v.to_str().ok()),
            Some("api.local")
        );
        assert_eq!(
            headers.get(&X_FORWARDED_PROTO).and_then(|v| v.to_str().ok()),
            Some("http")
        );
    }

    #[test]
    fn unknown_client_leaves_chain_alone() {
        let mut headers = HeaderMap::new();
        add_forwarded(&mut headers, None, "http");
        assert!(!headers.contains_key(&X_FORWARDED_FOR));
        assert!(!headers.contains_key(&X_FORWARDED_HOST));
        assert!(headers.contains_key(&X_FORWARDED_PROTO));
    }
}
