//! Value types of the typed path attributes.
//!
//! The wire handling of these lives with the attribute registry in
//! [`path_attributes`][crate::bgp::path_attributes].

use std::fmt;
use std::net::Ipv4Addr;

use bytes::Bytes;
use inetnum::asn::Asn;

use crate::bgp::aspath::AsPath;
use crate::bgp::communities::{
    ExtendedCommunity, LargeCommunity, StandardCommunity
};
use crate::bgp::nlri::Label;
use crate::typeenum; // from util::macros

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

typeenum!(
/// BGP Origin types as used in BGP UPDATE messages.
    OriginType, u8,
    {
        0 => Igp,
        1 => Egp,
        2 => Incomplete,
    });

/// Wrapper for the 4 byte Multi-Exit Discriminator in path attributes.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MultiExitDisc(pub u32);

impl fmt::Display for MultiExitDisc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wrapper for the 4 byte Local Preference value in path attributes.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalPref(pub u32);

impl fmt::Display for LocalPref {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The ATOMIC_AGGREGATE marker, it has no value.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AtomicAggregate;

/// The NEXT_HOP attribute, used for IPv4 unicast NLRI only.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConventionalNextHop(pub Ipv4Addr);

impl fmt::Display for ConventionalNextHop {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ORIGINATOR_ID, RFC 4456.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OriginatorId(pub Ipv4Addr);

/// CLUSTER_LIST, RFC 4456.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterList(pub Vec<Ipv4Addr>);

/// AGGREGATOR and AS4_AGGREGATOR.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aggregator {
    pub asn: Asn,
    pub address: Ipv4Addr,
}

impl Aggregator {
    pub fn new(asn: Asn, address: Ipv4Addr) -> Self {
        Self { asn, address }
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.asn, self.address)
    }
}

/// AS4_AGGREGATOR, always with a four octet ASN.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct As4Aggregator(pub Aggregator);

/// AS4_PATH, always with four octet ASNs.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct As4Path(pub AsPath);

/// COMMUNITIES, RFC 1997.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StandardCommunities(pub Vec<StandardCommunity>);

/// EXTENDED_COMMUNITIES, RFC 4360.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtendedCommunities(pub Vec<ExtendedCommunity>);

impl ExtendedCommunities {
    pub fn route_targets(&self) -> impl Iterator<Item = ExtendedCommunity> + '_ {
        self.0.iter().copied().filter(|c| c.is_route_target())
    }
}

/// LARGE_COMMUNITY, RFC 8092.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LargeCommunities(pub Vec<LargeCommunity>);

/// Only To Customer, RFC 9234.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Otc(pub Asn);

//------------ PmsiTunnel ----------------------------------------------------

typeenum!(
/// PMSI tunnel types, RFC 6514 section 5.
    PmsiTunnelType, u8,
    {
        0 => NoTunnelInfo,
        1 => RsvpTeP2mp,
        2 => MldpP2mp,
        3 => PimSsm,
        4 => PimSm,
        5 => BidirPim,
        6 => IngressReplication,
        7 => MldpMp2mp,
    });

/// PMSI_TUNNEL, RFC 6514.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PmsiTunnel {
    pub flags: u8,
    pub tunnel_type: PmsiTunnelType,
    pub label: Label,
    pub tunnel_id: Bytes,
}

impl PmsiTunnel {
    /// Returns whether the Leaf Information Required flag is set.
    pub fn leaf_info_required(&self) -> bool {
        self.flags & 0x01 != 0
    }

    /// Returns the tunnel endpoint for ingress replication.
    pub fn endpoint(&self) -> Option<Ipv4Addr> {
        if self.tunnel_type != PmsiTunnelType::IngressReplication {
            return None;
        }
        let raw: [u8; 4] = self.tunnel_id.as_ref().try_into().ok()?;
        Some(raw.into())
    }
}

//------------ BgpLsAttribute ------------------------------------------------

/// One TLV of the BGP-LS attribute.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct LsAttributeTlv {
    pub typ: u16,
    pub value: Bytes,
}

/// BGP-LS attribute, RFC 7752 section 3.3.
///
/// TLVs are stored one by one, in received order. A type may appear more
/// than once; use [`grouped`][Self::grouped] for a view keyed on type.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct BgpLsAttribute {
    pub tlvs: Vec<LsAttributeTlv>,
}

impl BgpLsAttribute {
    /// Returns the values per TLV type, types in order of first appearance.
    pub fn grouped(&self) -> Vec<(u16, Vec<&[u8]>)> {
        let mut res: Vec<(u16, Vec<&[u8]>)> = Vec::new();
        for tlv in &self.tlvs {
            match res.iter_mut().find(|(t, _)| *t == tlv.typ) {
                Some((_, v)) => v.push(tlv.value.as_ref()),
                None => res.push((tlv.typ, vec![tlv.value.as_ref()])),
            }
        }
        res
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_type() {
        assert_eq!(OriginType::from(2), OriginType::Incomplete);
        assert_eq!(OriginType::from(3), OriginType::Unimplemented(3));
        assert_eq!(OriginType::Igp.to_string(), "Igp");
    }

    #[test]
    fn ls_grouping() {
        let attr = BgpLsAttribute { tlvs: vec![
            LsAttributeTlv { typ: 1095, value: Bytes::from_static(&[1]) },
            LsAttributeTlv { typ: 1026, value: Bytes::from_static(b"r1") },
            LsAttributeTlv { typ: 1095, value: Bytes::from_static(&[2]) },
        ]};
        let grouped = attr.grouped();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0], (1095, vec![&[1u8][..], &[2u8][..]]));
        assert_eq!(grouped[1].0, 1026);
    }

    #[test]
    fn pmsi_endpoint() {
        let pmsi = PmsiTunnel {
            flags: 0,
            tunnel_type: PmsiTunnelType::IngressReplication,
            label: Label::new(100, false),
            tunnel_id: Bytes::from_static(&[192, 0, 2, 1]),
        };
        assert_eq!(pmsi.endpoint(), Some(Ipv4Addr::new(192, 0, 2, 1)));
        assert!(!pmsi.leaf_info_required());
    }
}
