use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use inetnum::addr::Prefix;
use octseq::Parser;

use crate::bgp::message::update_builder::ComposeError;
use crate::typeenum;
use crate::util::parser::ParseError;

use super::afisafi::{Afi, AfiSafiParse, AfiSafiType, NlriCompose, Safi};
use super::common::parse_prefix;
use super::qualifier::RouteDistinguisher;

typeenum!(
/// BGP-LS NLRI types, RFC 7752 section 3.2.
    BgpLsNlriType, u16,
    {
        1 => Node,
        2 => Link,
        3 => Ipv4TopologyPrefix,
        4 => Ipv6TopologyPrefix,
    });

typeenum!(
/// The protocol a BGP-LS object was learned from.
    ProtocolId, u8,
    {
        1 => IsIsLevel1,
        2 => IsIsLevel2,
        3 => Ospfv2,
        4 => Direct,
        5 => Static,
        6 => Ospfv3,
        7 => Bgp,
    });

pub const LOCAL_NODE_DESCRIPTORS: u16 = 256;
pub const REMOTE_NODE_DESCRIPTORS: u16 = 257;
pub const AUTONOMOUS_SYSTEM: u16 = 512;
pub const BGP_LS_IDENTIFIER: u16 = 513;
pub const OSPF_AREA_ID: u16 = 514;
pub const IGP_ROUTER_ID: u16 = 515;
pub const MULTI_TOPOLOGY_ID: u16 = 263;
pub const IP_REACHABILITY: u16 = 265;

//------------ Tlv -----------------------------------------------------------

/// A BGP-LS type-length-value triple.
///
/// TLVs with codes not known to this crate are kept as they are, so they
/// can be passed on unchanged.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Tlv {
    typ: u16,
    value: Bytes,
}

impl Tlv {
    pub fn new(typ: u16, value: Bytes) -> Self {
        Self { typ, value }
    }

    pub fn typ(&self) -> u16 {
        self.typ
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn parse(parser: &mut Parser<'_, Bytes>) -> Result<Self, ParseError> {
        let typ = parser.parse_u16_be()?;
        let len = parser.parse_u16_be()?;
        let value = parser.parse_octets(len.into())?;
        Ok(Self { typ, value })
    }

    pub fn compose_len(&self) -> usize {
        4 + self.value.len()
    }

    pub fn compose(&self, target: &mut Vec<u8>) -> Result<(), ComposeError> {
        let len = u16::try_from(self.value.len()).map_err(|_|
            ComposeError::InvalidNlri("BGP-LS TLV too long")
        )?;
        target.extend_from_slice(&self.typ.to_be_bytes());
        target.extend_from_slice(&len.to_be_bytes());
        target.extend_from_slice(&self.value);
        Ok(())
    }
}

/// Parses a sequence of TLVs filling all of `bytes`.
pub fn parse_tlvs(bytes: &Bytes) -> Result<Vec<Tlv>, ParseError> {
    let mut parser = Parser::from_ref(bytes);
    let mut res = Vec::new();
    while parser.remaining() > 0 {
        res.push(Tlv::parse(&mut parser)?);
    }
    Ok(res)
}

/// Groups TLVs by their code, keeping the order of each group.
///
/// The TLVs themselves are stored one by one; grouping only happens here,
/// when they are presented.
pub fn group_tlvs(tlvs: &[Tlv]) -> BTreeMap<u16, Vec<&Tlv>> {
    let mut res: BTreeMap<u16, Vec<&Tlv>> = BTreeMap::new();
    for tlv in tlvs {
        res.entry(tlv.typ).or_default().push(tlv);
    }
    res
}

fn find(tlvs: &[Tlv], typ: u16) -> Option<&Tlv> {
    tlvs.iter().find(|t| t.typ == typ)
}

//------------ NodeDescriptor ------------------------------------------------

/// Local or remote node descriptors, RFC 7752 section 3.2.1.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct NodeDescriptor {
    tlvs: Vec<Tlv>,
}

impl NodeDescriptor {
    pub fn new(tlvs: Vec<Tlv>) -> Self {
        Self { tlvs }
    }

    pub fn tlvs(&self) -> &[Tlv] {
        &self.tlvs
    }

    fn u32_tlv(&self, typ: u16) -> Option<u32> {
        find(&self.tlvs, typ).and_then(|t| {
            let b: [u8; 4] = t.value.as_ref().try_into().ok()?;
            Some(u32::from_be_bytes(b))
        })
    }

    pub fn autonomous_system(&self) -> Option<u32> {
        self.u32_tlv(AUTONOMOUS_SYSTEM)
    }

    pub fn bgp_ls_identifier(&self) -> Option<u32> {
        self.u32_tlv(BGP_LS_IDENTIFIER)
    }

    pub fn ospf_area_id(&self) -> Option<u32> {
        self.u32_tlv(OSPF_AREA_ID)
    }

    pub fn igp_router_id(&self) -> Option<&Bytes> {
        find(&self.tlvs, IGP_ROUTER_ID).map(Tlv::value)
    }

    fn compose(&self, typ: u16, target: &mut Vec<u8>)
        -> Result<(), ComposeError>
    {
        let mut value = Vec::new();
        for tlv in &self.tlvs {
            tlv.compose(&mut value)?;
        }
        Tlv::new(typ, Bytes::from(value)).compose(target)
    }
}

//------------ BgpLsRoute ----------------------------------------------------

/// The decoded contents of a BGP-LS NLRI.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct BgpLsRoute {
    pub nlri_type: BgpLsNlriType,
    pub rd: Option<RouteDistinguisher>,
    pub protocol: ProtocolId,
    pub identifier: u64,
    pub local_node: NodeDescriptor,
    pub remote_node: Option<NodeDescriptor>,
    /// Link or prefix descriptor TLVs.
    pub descriptors: Vec<Tlv>,
}

impl BgpLsRoute {
    /// Returns the prefix of the IP Reachability Information TLV.
    pub fn ip_reachability(&self) -> Option<Prefix> {
        let afi = match self.nlri_type {
            BgpLsNlriType::Ipv4TopologyPrefix => Afi::Ipv4,
            BgpLsNlriType::Ipv6TopologyPrefix => Afi::Ipv6,
            _ => return None,
        };
        let tlv = find(&self.descriptors, IP_REACHABILITY)?;
        let mut parser = Parser::from_ref(tlv.value.as_ref());
        parse_prefix(&mut parser, afi).ok()
    }

    pub fn multi_topology_id(&self) -> Option<&Bytes> {
        find(&self.descriptors, MULTI_TOPOLOGY_ID).map(Tlv::value)
    }

    fn parse_payload(
        nlri_type: BgpLsNlriType,
        payload: &Bytes,
        vpn: bool
    ) -> Result<Self, ParseError> {
        if let BgpLsNlriType::Unimplemented(_) = nlri_type {
            return Err(ParseError::Unsupported);
        }
        let mut parser = Parser::from_ref(payload);
        let rd = if vpn {
            Some(RouteDistinguisher::parse(&mut parser)?)
        } else {
            None
        };
        let protocol = ProtocolId::from(parser.parse_u8()?);
        let identifier = parser.parse_u64_be()?;

        let local = Tlv::parse(&mut parser)?;
        if local.typ != LOCAL_NODE_DESCRIPTORS {
            return Err(ParseError::form_error(
                "BGP-LS NLRI without local node descriptors"
            ));
        }
        let local_node = NodeDescriptor::new(parse_tlvs(&local.value)?);

        let remote_node = if nlri_type == BgpLsNlriType::Link {
            let remote = Tlv::parse(&mut parser)?;
            if remote.typ != REMOTE_NODE_DESCRIPTORS {
                return Err(ParseError::form_error(
                    "BGP-LS link NLRI without remote node descriptors"
                ));
            }
            Some(NodeDescriptor::new(parse_tlvs(&remote.value)?))
        } else {
            None
        };

        let mut descriptors = Vec::new();
        while parser.remaining() > 0 {
            descriptors.push(Tlv::parse(&mut parser)?);
        }
        if nlri_type == BgpLsNlriType::Node && !descriptors.is_empty() {
            return Err(ParseError::form_error(
                "descriptors after BGP-LS node descriptors"
            ));
        }

        Ok(Self {
            nlri_type, rd, protocol, identifier, local_node, remote_node,
            descriptors
        })
    }
}

//------------ BgpLsNlri -----------------------------------------------------

/// NLRI describing a BGP-LS node, link or prefix, RFC 7752.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BgpLsNlri {
    afisafi: AfiSafiType,
    raw: Bytes,
}

impl BgpLsNlri {
    pub fn from_route(route: &BgpLsRoute) -> Result<Self, ComposeError> {
        let afisafi = if route.rd.is_some() {
            AfiSafiType::LinkStateBgpLsVpn
        } else {
            AfiSafiType::LinkStateBgpLs
        };
        if route.remote_node.is_some() != (route.nlri_type == BgpLsNlriType::Link) {
            return Err(ComposeError::InvalidNlri(
                "remote node descriptors are for link NLRI only"
            ));
        }
        let mut payload = Vec::new();
        if let Some(rd) = route.rd {
            payload.extend_from_slice(rd.as_ref());
        }
        payload.push(route.protocol.into());
        payload.extend_from_slice(&route.identifier.to_be_bytes());
        route.local_node.compose(LOCAL_NODE_DESCRIPTORS, &mut payload)?;
        if let Some(remote) = &route.remote_node {
            remote.compose(REMOTE_NODE_DESCRIPTORS, &mut payload)?;
        }
        for tlv in &route.descriptors {
            tlv.compose(&mut payload)?;
        }
        let len = u16::try_from(payload.len()).map_err(|_|
            ComposeError::InvalidNlri("BGP-LS NLRI too long")
        )?;
        let mut raw = Vec::with_capacity(4 + payload.len());
        raw.extend_from_slice(&u16::from(route.nlri_type).to_be_bytes());
        raw.extend_from_slice(&len.to_be_bytes());
        raw.extend_from_slice(&payload);
        Ok(Self { afisafi, raw: Bytes::from(raw) })
    }

    pub fn afisafi(&self) -> AfiSafiType {
        self.afisafi
    }

    pub fn nlri_type(&self) -> BgpLsNlriType {
        match self.raw.get(..2) {
            Some(b) => u16::from_be_bytes([b[0], b[1]]).into(),
            None => BgpLsNlriType::Unimplemented(0),
        }
    }

    pub fn route(&self) -> Result<BgpLsRoute, ParseError> {
        BgpLsRoute::parse_payload(
            self.nlri_type(),
            &self.raw.slice(4.min(self.raw.len())..),
            self.afisafi.safi() == Safi::BgpLsVpn
        )
    }
}

impl AfiSafiParse for BgpLsNlri {
    fn parse(parser: &mut Parser<'_, Bytes>, afisafi: AfiSafiType)
        -> Result<Self, ParseError>
    {
        let start = parser.pos();
        let nlri_type = BgpLsNlriType::from(parser.parse_u16_be()?);
        let len = parser.parse_u16_be()?;
        let payload = parser.parse_octets(len.into())?;
        BgpLsRoute::parse_payload(
            nlri_type, &payload, afisafi.safi() == Safi::BgpLsVpn
        )?;
        parser.seek(start)?;
        let raw = parser.parse_octets(4 + usize::from(len))?;
        Ok(Self { afisafi, raw })
    }
}

impl NlriCompose for BgpLsNlri {
    fn raw(&self) -> &Bytes {
        &self.raw
    }
}

impl fmt::Display for BgpLsNlri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.route() {
            Ok(route) => {
                write!(f, "BGP-LS {} {} id {}",
                    route.nlri_type, route.protocol, route.identifier
                )?;
                if let Some(rd) = route.rd {
                    write!(f, " rd {}", rd)?;
                }
                if let Some(asn) = route.local_node.autonomous_system() {
                    write!(f, " local-as {}", asn)?;
                }
                if let Some(prefix) = route.ip_reachability() {
                    write!(f, " {}", prefix)?;
                }
                Ok(())
            }
            Err(_) => write!(f, "BGP-LS {} <invalid>", self.nlri_type())
        }
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // IPv4 topology prefix, OSPFv2, local node AS 65000 with router id
    // 10.0.0.1, prefix 192.0.2.0/24
    const PREFIX_NLRI: &[u8] = &[
        0x00, 0x03, 0x00, 0x25,
        0x03,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        // local node descriptors
        0x01, 0x00, 0x00, 0x10,
        0x02, 0x00, 0x00, 0x04, 0x00, 0x00, 0xfd, 0xe8,
        0x02, 0x03, 0x00, 0x04, 0x0a, 0x00, 0x00, 0x01,
        // IP reachability
        0x01, 0x09, 0x00, 0x04, 0x18, 0xc0, 0x00, 0x02,
    ];

    #[test]
    fn parse_prefix_nlri() {
        let raw = Bytes::from_static(PREFIX_NLRI);
        let mut parser = Parser::from_ref(&raw);
        let nlri = BgpLsNlri::parse(&mut parser, AfiSafiType::LinkStateBgpLs)
            .unwrap();
        assert_eq!(parser.remaining(), 0);
        assert_eq!(nlri.nlri_type(), BgpLsNlriType::Ipv4TopologyPrefix);

        let route = nlri.route().unwrap();
        assert_eq!(route.protocol, ProtocolId::Ospfv2);
        assert_eq!(route.local_node.autonomous_system(), Some(65000));
        assert_eq!(
            route.local_node.igp_router_id().map(|b| b.as_ref()),
            Some(&[0x0a, 0x00, 0x00, 0x01][..])
        );
        assert_eq!(
            route.ip_reachability(),
            Some(Prefix::from_str("192.0.2.0/24").unwrap())
        );
        assert_eq!(
            nlri.to_string(),
            "BGP-LS Ipv4TopologyPrefix Ospfv2 id 0 local-as 65000 192.0.2.0/24"
        );

        let rebuilt = BgpLsNlri::from_route(&route).unwrap();
        assert_eq!(rebuilt.raw().as_ref(), PREFIX_NLRI);
    }

    #[test]
    fn unknown_tlvs_are_kept() {
        let route = BgpLsRoute {
            nlri_type: BgpLsNlriType::Link,
            rd: Some(RouteDistinguisher::from_asn2(1, 1)),
            protocol: ProtocolId::IsIsLevel2,
            identifier: 7,
            local_node: NodeDescriptor::new(vec![
                Tlv::new(AUTONOMOUS_SYSTEM, Bytes::from_static(&[0, 0, 0, 1])),
            ]),
            remote_node: Some(NodeDescriptor::new(vec![
                Tlv::new(AUTONOMOUS_SYSTEM, Bytes::from_static(&[0, 0, 0, 2])),
            ])),
            descriptors: vec![
                Tlv::new(0x4242, Bytes::from_static(&[1, 2, 3])),
                Tlv::new(0x4242, Bytes::from_static(&[4])),
            ],
        };
        let nlri = BgpLsNlri::from_route(&route).unwrap();
        assert_eq!(nlri.afisafi(), AfiSafiType::LinkStateBgpLsVpn);
        let parsed = nlri.route().unwrap();
        assert_eq!(parsed, route);
        let groups = group_tlvs(&parsed.descriptors);
        assert_eq!(groups[&0x4242].len(), 2);
    }

    #[test]
    fn missing_local_node() {
        let raw = Bytes::from_static(&[
            0x00, 0x01, 0x00, 0x0d,
            0x03,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x01, 0x01, 0x00, 0x00,
        ]);
        let mut parser = Parser::from_ref(&raw);
        assert!(
            BgpLsNlri::parse(&mut parser, AfiSafiType::LinkStateBgpLs).is_err()
        );
    }

    #[test]
    fn truncated() {
        for i in 0..PREFIX_NLRI.len() {
            let part = Bytes::copy_from_slice(&PREFIX_NLRI[..i]);
            let mut parser = Parser::from_ref(&part);
            assert!(
                BgpLsNlri::parse(&mut parser, AfiSafiType::LinkStateBgpLs)
                    .is_err()
            );
        }
    }
}
