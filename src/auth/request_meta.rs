//! Request metadata: the IP/agent pair request-binding checks compare
//! against.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// `{ip, user_agent}` captured from an inbound HTTP-like request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub ip: IpAddr,
    pub user_agent: String,
}

impl RequestMeta {
    pub fn new(ip: IpAddr, user_agent: impl Into<String>) -> Self {
        Self { ip, user_agent: user_agent.into() }
    }

    /// Sentinel used when no request is available (e.g. in tests or
    /// background jobs): `(0.0.0.0, "")`.
    pub fn absent() -> Self {
        Self { ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED), user_agent: String::new() }
    }
}

impl fmt::Display for RequestMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ip, self.user_agent)
    }
}

impl Default for RequestMeta {
    fn default() -> Self {
        Self::absent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_is_the_zero_sentinel() {
        let m = RequestMeta::absent();
        assert_eq!(m.ip, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert!(m.user_agent.is_empty());
    }
}
