use inetnum::asn::Asn;

use crate::bgp::nlri::{AddpathDirection, AfiSafiSet, AfiSafiType};

/// Configuration parameters for an established BGP session.
///
/// The `SessionConfig` holds the parameters needed to parse and compose
/// messages for one particular session. Some information crucial to
/// correctly parsing BGP UPDATE messages is not available in the UPDATE
/// messages themselves, but is only exchanged in the BGP OPEN messages when
/// the session was established. The session layer fills this in once and
/// passes it along with every decode and encode call.
///
/// ```
/// use routewire::bgp::message::SessionConfig;
/// use routewire::bgp::nlri::{AddpathDirection, AfiSafiType};
///
/// let config = SessionConfig::modern()
///     .with_addpath(AfiSafiType::Ipv4Unicast, AddpathDirection::Receive)
///     .with_max_message_size(65535);
///
/// assert!(config.rx_addpath(AfiSafiType::Ipv4Unicast));
/// assert!(!config.tx_addpath(AfiSafiType::Ipv4Unicast));
/// ```
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    four_octet_asn: bool,
    families: AfiSafiSet,
    addpath_rx: AfiSafiSet,
    addpath_tx: AfiSafiSet,
    max_message_size: u16,
    local_asn: Option<Asn>,
    peer_asn: Option<Asn>,
}

impl SessionConfig {
    /// The message size of RFC 4271.
    pub const DEFAULT_MESSAGE_SIZE: u16 = 4096;

    /// The message size with Extended Messages, RFC 8654.
    pub const EXTENDED_MESSAGE_SIZE: u16 = 65535;

    /// The smallest valid BGP message, a KEEPALIVE.
    const MIN_MESSAGE_SIZE: u16 = 19;

    /// A session with four octet ASNs and all supported families.
    pub fn modern() -> Self {
        Self {
            four_octet_asn: true,
            families: AfiSafiSet::all(),
            addpath_rx: AfiSafiSet::empty(),
            addpath_tx: AfiSafiSet::empty(),
            max_message_size: Self::DEFAULT_MESSAGE_SIZE,
            local_asn: None,
            peer_asn: None,
        }
    }

    /// A session with two octet ASNs and all supported families.
    pub fn legacy() -> Self {
        Self { four_octet_asn: false, ..Self::modern() }
    }

    pub fn with_four_octet_asn(mut self, enabled: bool) -> Self {
        self.four_octet_asn = enabled;
        self
    }

    /// Enables AddPath for `afisafi` in the given direction(s).
    pub fn with_addpath(
        mut self,
        afisafi: AfiSafiType,
        dir: AddpathDirection
    ) -> Self {
        if dir.receives() {
            self.addpath_rx.insert(afisafi);
        }
        if dir.sends() {
            self.addpath_tx.insert(afisafi);
        }
        self
    }

    /// Sets the negotiated maximum message size.
    ///
    /// Values below the size of the smallest BGP message are raised to it.
    pub fn with_max_message_size(mut self, size: u16) -> Self {
        self.max_message_size = size.max(Self::MIN_MESSAGE_SIZE);
        self
    }

    /// Restricts the session to the given families.
    pub fn with_families(mut self, families: AfiSafiSet) -> Self {
        self.families = families;
        self
    }

    pub fn with_asns(mut self, local: Asn, peer: Asn) -> Self {
        self.local_asn = Some(local);
        self.peer_asn = Some(peer);
        self
    }

    pub fn four_octet_asn(&self) -> bool {
        self.four_octet_asn
    }

    pub fn families(&self) -> AfiSafiSet {
        self.families
    }

    pub fn has_family(&self, afisafi: AfiSafiType) -> bool {
        self.families.contains(afisafi)
    }

    /// Returns whether received NLRI of `afisafi` carry a Path Identifier.
    pub fn rx_addpath(&self, afisafi: AfiSafiType) -> bool {
        self.addpath_rx.contains(afisafi)
    }

    /// Returns whether sent NLRI of `afisafi` must carry a Path Identifier.
    pub fn tx_addpath(&self, afisafi: AfiSafiType) -> bool {
        self.addpath_tx.contains(afisafi)
    }

    pub fn addpath_rx(&self) -> AfiSafiSet {
        self.addpath_rx
    }

    pub fn addpath_tx(&self) -> AfiSafiSet {
        self.addpath_tx
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size.into()
    }

    pub fn local_asn(&self) -> Option<Asn> {
        self.local_asn
    }

    pub fn peer_asn(&self) -> Option<Asn> {
        self.peer_asn
    }

    /// Returns whether the session is between different ASes.
    ///
    /// Unknown if either ASN is not set.
    pub fn is_ebgp(&self) -> Option<bool> {
        Some(self.local_asn? != self.peer_asn?)
    }

    /// Returns the configuration of the same session seen from the peer.
    ///
    /// Receive and send directions as well as the ASNs are swapped. This
    /// is what is needed to parse messages composed with `self`.
    pub fn as_peer(&self) -> Self {
        Self {
            addpath_rx: self.addpath_tx,
            addpath_tx: self.addpath_rx,
            local_asn: self.peer_asn,
            peer_asn: self.local_asn,
            ..*self
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::modern()
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders() {
        let config = SessionConfig::legacy()
            .with_addpath(AfiSafiType::L2VpnEvpn, AddpathDirection::SendReceive)
            .with_max_message_size(12)
            .with_asns(Asn::from_u32(65000), Asn::from_u32(65001));

        assert!(!config.four_octet_asn());
        assert!(config.rx_addpath(AfiSafiType::L2VpnEvpn));
        assert!(config.tx_addpath(AfiSafiType::L2VpnEvpn));
        assert!(!config.rx_addpath(AfiSafiType::Ipv4Unicast));
        assert_eq!(config.max_message_size(), 19);
        assert_eq!(config.is_ebgp(), Some(true));
        assert_eq!(SessionConfig::modern().is_ebgp(), None);

        let families: AfiSafiSet = [AfiSafiType::Ipv6Unicast].into_iter()
            .collect();
        let config = config.with_families(families);
        assert!(config.has_family(AfiSafiType::Ipv6Unicast));
        assert!(!config.has_family(AfiSafiType::Ipv4Unicast));

        let config = SessionConfig::modern()
            .with_addpath(AfiSafiType::Ipv6Unicast, AddpathDirection::Send)
            .with_asns(Asn::from_u32(65000), Asn::from_u32(65001));
        let peer = config.as_peer();
        assert!(peer.rx_addpath(AfiSafiType::Ipv6Unicast));
        assert!(!peer.tx_addpath(AfiSafiType::Ipv6Unicast));
        assert_eq!(peer.local_asn(), Some(Asn::from_u32(65001)));
        assert_eq!(peer.as_peer(), config);
    }
}
