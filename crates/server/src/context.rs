use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};
use http::header::{REFERER, USER_AGENT};
use http::HeaderMap;
use shortlink_rate_limit::ClientHints;
use shortlink_recorder::ClickMetadata;

/// Everything the admission gate and the click recorder need from a request,
/// copied out by value.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub hints: ClientHints,
    pub user_agent: String,
    pub referer: String,
}

impl RequestContext {
    /// Build from raw request parts. Forwarding headers are ignored unless
    /// `trust_proxy_headers` is set.
    pub fn from_parts(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy_headers: bool) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };

        let (forwarded_for, real_ip) = if trust_proxy_headers {
            (header("x-forwarded-for"), header("x-real-ip"))
        } else {
            (None, None)
        };

        Self {
            hints: ClientHints {
                forwarded_for,
                real_ip,
                peer: peer.map(|addr| addr.ip()),
            },
            user_agent: header(USER_AGENT.as_str()).unwrap_or_default(),
            referer: header(REFERER.as_str()).unwrap_or_default(),
        }
    }

    /// Build from an axum request; the peer comes from `ConnectInfo` when the
    /// server was started with it.
    pub fn from_request(request: &Request, trust_proxy_headers: bool) -> Self {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        Self::from_parts(request.headers(), peer, trust_proxy_headers)
    }

    pub fn identity(&self) -> String {
        self.hints.identity()
    }

    pub fn click_metadata(&self) -> ClickMetadata {
        ClickMetadata {
            source_address: self.identity(),
            user_agent: self.user_agent.clone(),
            referer: self.referer.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.77, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.8"));
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.5.0"));
        headers.insert(REFERER, HeaderValue::from_static("https://chat.example/"));
        headers
    }

    #[test]
    fn trusted_headers_take_precedence() {
        let peer: SocketAddr = "10.0.0.1:51234".parse().unwrap();
        let ctx = RequestContext::from_parts(&headers(), Some(peer), true);

        assert_eq!(ctx.identity(), "203.0.113.77");
        let metadata = ctx.click_metadata();
        assert_eq!(metadata.source_address, "203.0.113.77");
        assert_eq!(metadata.user_agent, "curl/8.5.0");
        assert_eq!(metadata.referer, "https://chat.example/");
    }

    #[test]
    fn untrusted_headers_use_peer_without_port() {
        let peer: SocketAddr = "[2001:db8::5]:443".parse().unwrap();
        let ctx = RequestContext::from_parts(&headers(), Some(peer), false);
        assert_eq!(ctx.identity(), "2001:db8::5");
    }

    #[test]
    fn missing_metadata_is_empty() {
        let ctx = RequestContext::from_parts(&HeaderMap::new(), None, true);
        assert_eq!(ctx.identity(), "unknown");
        assert_eq!(ctx.user_agent, "");
        assert_eq!(ctx.referer, "");
    }
}
