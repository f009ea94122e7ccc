use std::net::IpAddr;

/// Identity used when a request carries no usable address at all.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// The address candidates a request offers for identifying its client.
///
/// Forwarding headers are trusted as given. Deployments that are reachable
/// without a proxy overwriting them should leave the header fields empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientHints {
    /// Raw `X-Forwarded-For` header value.
    pub forwarded_for: Option<String>,
    /// Raw `X-Real-IP` header value.
    pub real_ip: Option<String>,
    /// Transport-level peer address.
    pub peer: Option<IpAddr>,
}

impl ClientHints {
    /// Derive the ledger key for this client.
    ///
    /// Precedence: first hop of `X-Forwarded-For`, then `X-Real-IP`, then the
    /// peer address. Blank header values are skipped.
    pub fn identity(&self) -> String {
        if let Some(first_hop) = self
            .forwarded_for
            .as_deref()
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return first_hop.to_string();
        }

        if let Some(real_ip) = self
            .real_ip
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return real_ip.to_string();
        }

        self.peer
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
    }
}
