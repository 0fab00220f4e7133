use std::fmt;
use std::net::IpAddr;

use bytes::Bytes;
use inetnum::addr::Prefix;
use octseq::Parser;

use crate::bgp::message::update_builder::ComposeError;
use crate::typeenum;
use crate::util::parser::{check_exhausted, ParseError};

use super::afisafi::{Afi, AfiSafiParse, AfiSafiType, NlriCompose};
use super::common::{
    compose_prefix_without_len, compose_sized_addr, parse_prefix_for_len,
    parse_sized_addr,
};
use super::qualifier::{Esi, EthernetTag, Label, RouteDistinguisher};

typeenum!(
    EvpnRouteType, u8,
    {
      1 => EthernetAutoDiscovery,
      2 => MacIpAdvertisement,
      3 => InclusiveMulticastEthernetTag,
      4 => EthernetSegment,
      5 => IpPrefix,
    }
);

/// A 48 bit MAC address.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let m = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

//------------ EvpnRoute -----------------------------------------------------

/// The decoded contents of an EVPN NLRI, RFC 7432 and RFC 9136.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum EvpnRoute {
    EthernetAutoDiscovery {
        rd: RouteDistinguisher,
        esi: Esi,
        tag: EthernetTag,
        label: Label,
    },
    MacIpAdvertisement {
        rd: RouteDistinguisher,
        esi: Esi,
        tag: EthernetTag,
        mac: MacAddress,
        ip: Option<IpAddr>,
        label1: Label,
        label2: Option<Label>,
    },
    InclusiveMulticastEthernetTag {
        rd: RouteDistinguisher,
        tag: EthernetTag,
        originator: IpAddr,
    },
    EthernetSegment {
        rd: RouteDistinguisher,
        esi: Esi,
        originator: IpAddr,
    },
    IpPrefix {
        rd: RouteDistinguisher,
        esi: Esi,
        tag: EthernetTag,
        prefix: Prefix,
        gateway: IpAddr,
        label: Label,
    },
    /// A route type without typed support, kept as is.
    Generic {
        route_type: u8,
        payload: Bytes,
    },
}

impl EvpnRoute {
    pub fn route_type(&self) -> EvpnRouteType {
        match self {
            Self::EthernetAutoDiscovery { .. } => {
                EvpnRouteType::EthernetAutoDiscovery
            }
            Self::MacIpAdvertisement { .. } => {
                EvpnRouteType::MacIpAdvertisement
            }
            Self::InclusiveMulticastEthernetTag { .. } => {
                EvpnRouteType::InclusiveMulticastEthernetTag
            }
            Self::EthernetSegment { .. } => EvpnRouteType::EthernetSegment,
            Self::IpPrefix { .. } => EvpnRouteType::IpPrefix,
            Self::Generic { route_type, .. } => (*route_type).into(),
        }
    }

    pub fn rd(&self) -> Option<RouteDistinguisher> {
        match self {
            Self::EthernetAutoDiscovery { rd, .. } |
            Self::MacIpAdvertisement { rd, .. } |
            Self::InclusiveMulticastEthernetTag { rd, .. } |
            Self::EthernetSegment { rd, .. } |
            Self::IpPrefix { rd, .. } => Some(*rd),
            Self::Generic { .. } => None,
        }
    }

    fn parse_payload(route_type: EvpnRouteType, payload: &Bytes)
        -> Result<Self, ParseError>
    {
        let mut parser = Parser::from_ref(payload);
        let parser = &mut parser;
        let res = match route_type {
            EvpnRouteType::EthernetAutoDiscovery => {
                Self::EthernetAutoDiscovery {
                    rd: RouteDistinguisher::parse(parser)?,
                    esi: Esi::parse(parser)?,
                    tag: EthernetTag::parse(parser)?,
                    label: parse_label(parser)?,
                }
            }
            EvpnRouteType::MacIpAdvertisement => {
                let rd = RouteDistinguisher::parse(parser)?;
                let esi = Esi::parse(parser)?;
                let tag = EthernetTag::parse(parser)?;
                if parser.parse_u8()? != 48 {
                    return Err(ParseError::form_error(
                        "invalid MAC address length in EVPN route"
                    ));
                }
                let mut mac = [0u8; 6];
                parser.parse_buf(&mut mac)?;
                let ip = parse_sized_addr(parser)?;
                let label1 = parse_label(parser)?;
                let label2 = if parser.remaining() > 0 {
                    Some(parse_label(parser)?)
                } else {
                    None
                };
                Self::MacIpAdvertisement {
                    rd, esi, tag, mac: MacAddress(mac), ip, label1, label2
                }
            }
            EvpnRouteType::InclusiveMulticastEthernetTag => {
                let rd = RouteDistinguisher::parse(parser)?;
                let tag = EthernetTag::parse(parser)?;
                let originator = parse_sized_addr(parser)?.ok_or(
                    ParseError::form_error("missing EVPN originator address")
                )?;
                Self::InclusiveMulticastEthernetTag { rd, tag, originator }
            }
            EvpnRouteType::EthernetSegment => {
                let rd = RouteDistinguisher::parse(parser)?;
                let esi = Esi::parse(parser)?;
                let originator = parse_sized_addr(parser)?.ok_or(
                    ParseError::form_error("missing EVPN originator address")
                )?;
                Self::EthernetSegment { rd, esi, originator }
            }
            EvpnRouteType::IpPrefix => {
                // The address family follows from the payload length only:
                // 34 bytes for IPv4, 58 for IPv6.
                let afi = match payload.len() {
                    34 => Afi::Ipv4,
                    58 => Afi::Ipv6,
                    _ => return Err(ParseError::form_error(
                        "invalid EVPN IP prefix route length"
                    )),
                };
                let rd = RouteDistinguisher::parse(parser)?;
                let esi = Esi::parse(parser)?;
                let tag = EthernetTag::parse(parser)?;
                let bits = parser.parse_u8()?;
                let addr_len = if afi == Afi::Ipv4 { 4 } else { 16 };
                let mut buf = [0u8; 16];
                parser.parse_buf(&mut buf[..addr_len])?;
                let significant = super::common::prefix_bits_to_bytes(bits)
                    .min(addr_len);
                let mut pp = Parser::from_ref(&buf[..significant]);
                let prefix = parse_prefix_for_len(&mut pp, bits, afi)?;
                let gateway = if afi == Afi::Ipv4 {
                    IpAddr::V4(crate::util::parser::parse_ipv4addr(parser)?)
                } else {
                    IpAddr::V6(crate::util::parser::parse_ipv6addr(parser)?)
                };
                Self::IpPrefix {
                    rd, esi, tag, prefix, gateway,
                    label: parse_label(parser)?
                }
            }
            EvpnRouteType::Unimplemented(route_type) => {
                return Ok(Self::Generic {
                    route_type,
                    payload: payload.clone()
                })
            }
        };
        check_exhausted(parser, "trailing bytes in EVPN route")?;
        Ok(res)
    }

    fn compose_payload(&self, target: &mut Vec<u8>)
        -> Result<(), ComposeError>
    {
        match self {
            Self::EthernetAutoDiscovery { rd, esi, tag, label } => {
                target.extend_from_slice(rd.as_ref());
                target.extend_from_slice(esi.as_ref());
                target.extend_from_slice(&tag.0.to_be_bytes());
                target.extend_from_slice(&label.to_raw());
            }
            Self::MacIpAdvertisement {
                rd, esi, tag, mac, ip, label1, label2
            } => {
                target.extend_from_slice(rd.as_ref());
                target.extend_from_slice(esi.as_ref());
                target.extend_from_slice(&tag.0.to_be_bytes());
                target.push(48);
                target.extend_from_slice(&mac.0);
                compose_sized_addr(*ip, target);
                target.extend_from_slice(&label1.to_raw());
                if let Some(label2) = label2 {
                    target.extend_from_slice(&label2.to_raw());
                }
            }
            Self::InclusiveMulticastEthernetTag { rd, tag, originator } => {
                target.extend_from_slice(rd.as_ref());
                target.extend_from_slice(&tag.0.to_be_bytes());
                compose_sized_addr(Some(*originator), target);
            }
            Self::EthernetSegment { rd, esi, originator } => {
                target.extend_from_slice(rd.as_ref());
                target.extend_from_slice(esi.as_ref());
                compose_sized_addr(Some(*originator), target);
            }
            Self::IpPrefix { rd, esi, tag, prefix, gateway, label } => {
                if prefix.is_v4() != gateway.is_ipv4() {
                    return Err(ComposeError::WrongAddressType);
                }
                target.extend_from_slice(rd.as_ref());
                target.extend_from_slice(esi.as_ref());
                target.extend_from_slice(&tag.0.to_be_bytes());
                target.push(prefix.len());
                let start = target.len();
                let _ = compose_prefix_without_len(*prefix, target);
                let addr_len = if prefix.is_v4() { 4 } else { 16 };
                target.resize(start + addr_len, 0);
                match gateway {
                    IpAddr::V4(a) => target.extend_from_slice(&a.octets()),
                    IpAddr::V6(a) => target.extend_from_slice(&a.octets()),
                }
                target.extend_from_slice(&label.to_raw());
            }
            Self::Generic { payload, .. } => {
                target.extend_from_slice(payload);
            }
        }
        Ok(())
    }
}

fn parse_label(parser: &mut Parser<'_, Bytes>) -> Result<Label, ParseError> {
    let mut buf = [0u8; 3];
    parser.parse_buf(&mut buf)?;
    Ok(Label::from_raw(buf))
}

//------------ EvpnNlri ------------------------------------------------------

/// NLRI containing an EVPN route as defined in RFC 7432.
///
/// The raw form is the route type, the length, and the route payload.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EvpnNlri {
    raw: Bytes,
}

impl EvpnNlri {
    pub fn from_route(route: &EvpnRoute) -> Result<Self, ComposeError> {
        let mut buf = vec![u8::from(route.route_type()), 0];
        route.compose_payload(&mut buf)?;
        buf[1] = u8::try_from(buf.len() - 2).map_err(|_|
            ComposeError::InvalidNlri("EVPN route too long")
        )?;
        Ok(Self { raw: Bytes::from(buf) })
    }

    pub fn route_type(&self) -> EvpnRouteType {
        self.raw.first().copied().unwrap_or(0).into()
    }

    /// Decodes the route from the raw bytes.
    pub fn route(&self) -> Result<EvpnRoute, ParseError> {
        EvpnRoute::parse_payload(
            self.route_type(),
            &self.raw.slice(2.min(self.raw.len())..)
        )
    }
}

impl AfiSafiParse for EvpnNlri {
    fn parse(parser: &mut Parser<'_, Bytes>, _afisafi: AfiSafiType)
        -> Result<Self, ParseError>
    {
        let start = parser.pos();
        let route_type = EvpnRouteType::from(parser.parse_u8()?);
        let route_len = parser.parse_u8()?;
        let payload = parser.parse_octets(route_len.into())?;
        EvpnRoute::parse_payload(route_type, &payload)?;
        parser.seek(start)?;
        let raw = parser.parse_octets(2 + usize::from(route_len))?;
        Ok(Self { raw })
    }
}

impl NlriCompose for EvpnNlri {
    fn raw(&self) -> &Bytes {
        &self.raw
    }
}

impl fmt::Display for EvpnNlri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.route() {
            Ok(EvpnRoute::MacIpAdvertisement { rd, mac, ip, .. }) => {
                write!(f, "EVPN-{} rd {} mac {}",
                    self.route_type(), rd, mac
                )?;
                if let Some(ip) = ip {
                    write!(f, " ip {}", ip)?;
                }
                Ok(())
            }
            Ok(EvpnRoute::IpPrefix { rd, prefix, .. }) => {
                write!(f, "EVPN-{} rd {} {}", self.route_type(), rd, prefix)
            }
            Ok(route) => match route.rd() {
                Some(rd) => write!(f, "EVPN-{} rd {}", self.route_type(), rd),
                None => write!(f, "EVPN-{}", self.route_type()),
            }
            Err(_) => write!(f, "EVPN-{} <invalid>", self.route_type()),
        }
    }
}
