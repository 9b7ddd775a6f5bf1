//! Platform-reported connectivity flag set.

use serde::{Deserialize, Serialize};

/// Reachability flags as reported by the platform's connectivity source.
///
/// Mirrors the granularity the platform exposes: per address family, whether
/// traffic can reach the subnet, the local network, or the internet. The
/// `disconnected` flag stands alone; when it is set all other flags are
/// false by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityFlags {
    pub ipv4_no_traffic: bool,
    pub ipv4_subnet: bool,
    pub ipv4_local_network: bool,
    pub ipv4_internet: bool,
    pub ipv6_no_traffic: bool,
    pub ipv6_subnet: bool,
    pub ipv6_local_network: bool,
    pub ipv6_internet: bool,
    pub disconnected: bool,
}

impl ConnectivityFlags {
    /// Fully disconnected: no reachability at any granularity.
    pub const DISCONNECTED: Self = Self {
        ipv4_no_traffic: false,
        ipv4_subnet: false,
        ipv4_local_network: false,
        ipv4_internet: false,
        ipv6_no_traffic: false,
        ipv6_subnet: false,
        ipv6_local_network: false,
        ipv6_internet: false,
        disconnected: true,
    };

    /// IPv4 internet reachability only.
    pub fn ipv4_internet() -> Self {
        Self {
            ipv4_internet: true,
            ..Self::default()
        }
    }

    /// IPv6 internet reachability only.
    pub fn ipv6_internet() -> Self {
        Self {
            ipv6_internet: true,
            ..Self::default()
        }
    }

    /// Local-network reachability without internet access (captive portal,
    /// LAN-only links).
    pub fn local_only() -> Self {
        Self {
            ipv4_subnet: true,
            ipv4_local_network: true,
            ..Self::default()
        }
    }

    /// Simplified reachability: internet access via either address family.
    pub fn has_internet(&self) -> bool {
        self.ipv4_internet || self.ipv6_internet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_internet_iff_v4_or_v6() {
        // Exhaustive over the two internet bits; the remaining flags never
        // contribute to the derived value.
        for v4 in [false, true] {
            for v6 in [false, true] {
                let flags = ConnectivityFlags {
                    ipv4_internet: v4,
                    ipv6_internet: v6,
                    ipv4_subnet: true,
                    ipv6_local_network: true,
                    ..Default::default()
                };
                assert_eq!(flags.has_internet(), v4 || v6);
            }
        }
    }

    #[test]
    fn test_disconnected_implies_nothing_else() {
        let flags = ConnectivityFlags::DISCONNECTED;
        assert!(flags.disconnected);
        assert!(!flags.has_internet());
        assert!(!flags.ipv4_subnet);
        assert!(!flags.ipv6_subnet);
        assert!(!flags.ipv4_local_network);
        assert!(!flags.ipv6_local_network);
    }

    #[test]
    fn test_local_only_has_no_internet() {
        assert!(!ConnectivityFlags::local_only().has_internet());
    }
}
