use axum::http::HeaderMap;
use std::net::IpAddr;

/// Derives the client address used as the rate-limit key.
///
/// Proxy headers are only honoured when `trust_proxy_headers` is set; otherwise any client
/// could pick its own key by sending `X-Forwarded-For`.
pub fn extract_client_ip(headers: &HeaderMap, remote: Option<IpAddr>, trust_proxy_headers: bool) -> IpAddr {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(headers) {
            return ip;
        }
    }
    remote.unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(h) = headers.get("x-forwarded-for").and_then(|hv| hv.to_str().ok()) {
        if let Some(first) = h.split(',').next() {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|hv| hv.to_str().ok())
        .and_then(|h| h.trim().parse::<IpAddr>().ok())
}
