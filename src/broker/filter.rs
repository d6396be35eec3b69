//! Peer authorization filters

use std::collections::HashSet;
use std::net::IpAddr;

use crate::transport::Peer;

/// Decides whether a freshly accepted peer may join
pub trait PeerFilter: Send + Sync {
    fn authorize(&self, peer: &dyn Peer) -> bool;
}

impl<F> PeerFilter for F
where
    F: Fn(&dyn Peer) -> bool + Send + Sync,
{
    fn authorize(&self, peer: &dyn Peer) -> bool {
        self(peer)
    }
}

/// Handle returned by `Broker::add_filter`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterId(pub(crate) u64);

/// Accepts only peers connecting from a known address
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    hosts: HashSet<IpAddr>,
}

impl AllowList {
    pub fn new(hosts: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            hosts: hosts.into_iter().collect(),
        }
    }

    /// Build from configured host strings, skipping ones that are not IPs
    pub fn from_config(hosts: &[String]) -> Self {
        Self::new(hosts.iter().filter_map(|host| match host.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!("Ignoring allowed host '{}': not an IP address", host);
                None
            }
        }))
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl PeerFilter for AllowList {
    fn authorize(&self, peer: &dyn Peer) -> bool {
        peer.remote_addr()
            .map(|addr| self.hosts.contains(&addr.ip()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::testing::RecordingPeer;

    #[test]
    fn test_allow_list() {
        let filter = AllowList::from_config(&["127.0.0.1".into(), "not-an-ip".into()]);

        let local = RecordingPeer::with_addr("127.0.0.1:5000".parse().unwrap());
        let remote = RecordingPeer::with_addr("10.1.2.3:5000".parse().unwrap());
        let unknown = RecordingPeer::new();

        assert!(filter.authorize(&local));
        assert!(!filter.authorize(&remote));
        assert!(!filter.authorize(&unknown));
    }

    #[test]
    fn test_closure_filter() {
        let filter = |peer: &dyn Peer| peer.remote_addr().is_some();
        assert!(!filter.authorize(&RecordingPeer::new()));
    }
}
