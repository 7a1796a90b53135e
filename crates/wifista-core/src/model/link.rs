// ── L3 configuration snapshot ──
//
// Merged from IP-coordinator callbacks, owned by the state machine,
// and only ever handed out as clones.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// An address with its prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkAddress {
    pub address: IpAddr,
    pub prefix_len: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub destination: LinkAddress,
    #[serde(default)]
    pub gateway: Option<IpAddr>,
}

/// Last-known L3 configuration of the station interface.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkPropertiesSnapshot {
    #[serde(default)]
    pub interface_name: Option<String>,
    #[serde(default)]
    pub addresses: Vec<LinkAddress>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub dns_servers: Vec<IpAddr>,
    #[serde(default)]
    pub domains: Option<String>,
    #[serde(default)]
    pub mtu: Option<u32>,
}

impl LinkPropertiesSnapshot {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.routes.is_empty() && self.dns_servers.is_empty()
    }

    pub fn has_ipv4_address(&self) -> bool {
        self.addresses.iter().any(|a| a.address.is_ipv4())
    }

    pub fn has_ipv6_address(&self) -> bool {
        self.addresses.iter().any(|a| a.address.is_ipv6())
    }

    /// Provisioned means at least one address and a way off-link.
    pub fn is_provisioned(&self) -> bool {
        !self.addresses.is_empty() && (!self.routes.is_empty() || !self.dns_servers.is_empty())
    }

    /// Fold an update from the coordinator into this snapshot.
    ///
    /// The coordinator always reports its complete view, so list fields
    /// are replaced wholesale; scalar fields keep their previous value
    /// when the update leaves them unset.
    pub fn merge(&mut self, update: LinkPropertiesSnapshot) {
        self.addresses = update.addresses;
        self.routes = update.routes;
        self.dns_servers = update.dns_servers;
        if update.interface_name.is_some() {
            self.interface_name = update.interface_name;
        }
        if update.domains.is_some() {
            self.domains = update.domains;
        }
        if update.mtu.is_some() {
            self.mtu = update.mtu;
        }
    }

    pub fn clear(&mut self) {
        *self = Self {
            interface_name: self.interface_name.take(),
            ..Self::default()
        };
    }
}

/// Static L3 configuration applied instead of DHCP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticIpConfig {
    pub address: LinkAddress,
    #[serde(default)]
    pub gateway: Option<IpAddr>,
    #[serde(default)]
    pub dns_servers: Vec<IpAddr>,
    #[serde(default)]
    pub domains: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn addr(s: &str, prefix_len: u8) -> LinkAddress {
        LinkAddress {
            address: s.parse().unwrap(),
            prefix_len,
        }
    }

    #[test]
    fn merge_replaces_lists_and_keeps_scalars() {
        let mut lp = LinkPropertiesSnapshot {
            interface_name: Some("wlan0".into()),
            addresses: vec![addr("192.168.1.20", 24)],
            mtu: Some(1500),
            ..Default::default()
        };
        lp.merge(LinkPropertiesSnapshot {
            addresses: vec![addr("192.168.1.21", 24), addr("fe80::1", 64)],
            dns_servers: vec!["192.168.1.1".parse().unwrap()],
            ..Default::default()
        });

        assert_eq!(lp.addresses.len(), 2);
        assert_eq!(lp.interface_name.as_deref(), Some("wlan0"));
        assert_eq!(lp.mtu, Some(1500));
        assert!(lp.has_ipv4_address() && lp.has_ipv6_address());
        assert!(lp.is_provisioned());
    }

    #[test]
    fn clear_keeps_interface_name() {
        let mut lp = LinkPropertiesSnapshot {
            interface_name: Some("wlan0".into()),
            addresses: vec![addr("10.0.0.2", 8)],
            ..Default::default()
        };
        lp.clear();
        assert!(lp.is_empty());
        assert_eq!(lp.interface_name.as_deref(), Some("wlan0"));
    }
}
