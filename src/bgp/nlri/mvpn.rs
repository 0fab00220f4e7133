use std::fmt;
use std::net::IpAddr;

use bytes::Bytes;
use octseq::Parser;

use crate::bgp::message::update_builder::ComposeError;
use crate::typeenum;
use crate::util::parser::{check_exhausted, ParseError};

use super::afisafi::{Afi, AfiSafiParse, AfiSafiType, NlriCompose};
use super::common::{compose_sized_addr, parse_sized_addr};
use super::qualifier::RouteDistinguisher;

typeenum!(
/// MCAST-VPN route types, RFC 6514 section 4.
    MvpnRouteType, u8,
    {
        1 => IntraAsIPmsiAd,
        2 => InterAsIPmsiAd,
        3 => SPmsiAd,
        4 => LeafAd,
        5 => SourceActiveAd,
        6 => SharedTreeJoin,
        7 => SourceTreeJoin,
    });

/// The decoded contents of an MCAST-VPN NLRI.
///
/// Only the source active and C-multicast routes are decoded. A missing
/// source or group address is a wildcard as per RFC 6625.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum MvpnRoute {
    SourceActiveAd {
        rd: RouteDistinguisher,
        source: Option<IpAddr>,
        group: Option<IpAddr>,
    },
    SharedTreeJoin {
        rd: RouteDistinguisher,
        source_as: u32,
        rp: Option<IpAddr>,
        group: Option<IpAddr>,
    },
    SourceTreeJoin {
        rd: RouteDistinguisher,
        source_as: u32,
        source: Option<IpAddr>,
        group: Option<IpAddr>,
    },
    Generic {
        route_type: u8,
        payload: Bytes,
    },
}

impl MvpnRoute {
    pub fn route_type(&self) -> MvpnRouteType {
        match self {
            Self::SourceActiveAd { .. } => MvpnRouteType::SourceActiveAd,
            Self::SharedTreeJoin { .. } => MvpnRouteType::SharedTreeJoin,
            Self::SourceTreeJoin { .. } => MvpnRouteType::SourceTreeJoin,
            Self::Generic { route_type, .. } => (*route_type).into(),
        }
    }

    pub fn rd(&self) -> Option<RouteDistinguisher> {
        match self {
            Self::SourceActiveAd { rd, .. } |
            Self::SharedTreeJoin { rd, .. } |
            Self::SourceTreeJoin { rd, .. } => Some(*rd),
            Self::Generic { .. } => None,
        }
    }

    /// Returns the C-multicast (source or RP, group) pair.
    pub fn c_multicast(&self) -> Option<(Option<IpAddr>, Option<IpAddr>)> {
        match self {
            Self::SharedTreeJoin { rp, group, .. } => Some((*rp, *group)),
            Self::SourceTreeJoin { source, group, .. } => {
                Some((*source, *group))
            }
            _ => None,
        }
    }

    fn addresses(&self) -> [Option<IpAddr>; 2] {
        match self {
            Self::SourceActiveAd { source, group, .. } |
            Self::SourceTreeJoin { source, group, .. } => [*source, *group],
            Self::SharedTreeJoin { rp, group, .. } => [*rp, *group],
            Self::Generic { .. } => [None, None],
        }
    }

    fn parse_payload(route_type: MvpnRouteType, payload: &Bytes, afi: Afi)
        -> Result<Self, ParseError>
    {
        let mut parser = Parser::from_ref(payload);
        let parser = &mut parser;
        let res = match route_type {
            MvpnRouteType::SourceActiveAd => Self::SourceActiveAd {
                rd: RouteDistinguisher::parse(parser)?,
                source: parse_sized_addr(parser)?,
                group: parse_sized_addr(parser)?,
            },
            MvpnRouteType::SharedTreeJoin => Self::SharedTreeJoin {
                rd: RouteDistinguisher::parse(parser)?,
                source_as: parser.parse_u32_be()?,
                rp: parse_sized_addr(parser)?,
                group: parse_sized_addr(parser)?,
            },
            MvpnRouteType::SourceTreeJoin => Self::SourceTreeJoin {
                rd: RouteDistinguisher::parse(parser)?,
                source_as: parser.parse_u32_be()?,
                source: parse_sized_addr(parser)?,
                group: parse_sized_addr(parser)?,
            },
            _ => return Ok(Self::Generic {
                route_type: route_type.into(),
                payload: payload.clone()
            }),
        };
        check_exhausted(parser, "trailing bytes in MCAST-VPN route")?;
        let v4 = afi == Afi::Ipv4;
        if res.addresses().iter().flatten().any(|a| a.is_ipv4() != v4) {
            return Err(ParseError::form_error(
                "MCAST-VPN address of wrong family"
            ));
        }
        Ok(res)
    }

    fn compose_payload(&self, target: &mut Vec<u8>) {
        match self {
            Self::SourceActiveAd { rd, source, group } => {
                target.extend_from_slice(rd.as_ref());
                compose_sized_addr(*source, target);
                compose_sized_addr(*group, target);
            }
            Self::SharedTreeJoin { rd, source_as, rp: source, group } |
            Self::SourceTreeJoin { rd, source_as, source, group } => {
                target.extend_from_slice(rd.as_ref());
                target.extend_from_slice(&source_as.to_be_bytes());
                compose_sized_addr(*source, target);
                compose_sized_addr(*group, target);
            }
            Self::Generic { payload, .. } => {
                target.extend_from_slice(payload);
            }
        }
    }
}

//------------ MvpnNlri ------------------------------------------------------

/// NLRI of the MCAST-VPN SAFI, RFC 6514.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MvpnNlri {
    afisafi: AfiSafiType,
    raw: Bytes,
}

impl MvpnNlri {
    pub fn from_route(route: &MvpnRoute, afi: Afi)
        -> Result<Self, ComposeError>
    {
        let afisafi = match afi {
            Afi::Ipv4 => AfiSafiType::Ipv4Mvpn,
            Afi::Ipv6 => AfiSafiType::Ipv6Mvpn,
            _ => return Err(ComposeError::WrongAddressType),
        };
        let v4 = afi == Afi::Ipv4;
        if route.addresses().iter().flatten().any(|a| a.is_ipv4() != v4) {
            return Err(ComposeError::WrongAddressType);
        }
        let mut raw = vec![u8::from(route.route_type()), 0];
        route.compose_payload(&mut raw);
        raw[1] = u8::try_from(raw.len() - 2).map_err(|_|
            ComposeError::InvalidNlri("MCAST-VPN route too long")
        )?;
        Ok(Self { afisafi, raw: Bytes::from(raw) })
    }

    pub fn afisafi(&self) -> AfiSafiType {
        self.afisafi
    }

    pub fn route_type(&self) -> MvpnRouteType {
        self.raw.first().copied().unwrap_or(0).into()
    }

    pub fn route(&self) -> Result<MvpnRoute, ParseError> {
        MvpnRoute::parse_payload(
            self.route_type(),
            &self.raw.slice(2.min(self.raw.len())..),
            self.afisafi.afi()
        )
    }
}

impl AfiSafiParse for MvpnNlri {
    fn parse(parser: &mut Parser<'_, Bytes>, afisafi: AfiSafiType)
        -> Result<Self, ParseError>
    {
        let start = parser.pos();
        let route_type = MvpnRouteType::from(parser.parse_u8()?);
        let len = parser.parse_u8()?;
        let payload = parser.parse_octets(len.into())?;
        MvpnRoute::parse_payload(route_type, &payload, afisafi.afi())?;
        parser.seek(start)?;
        let raw = parser.parse_octets(2 + usize::from(len))?;
        Ok(Self { afisafi, raw })
    }
}

impl NlriCompose for MvpnNlri {
    fn raw(&self) -> &Bytes {
        &self.raw
    }
}

impl fmt::Display for MvpnNlri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn addr(a: Option<IpAddr>) -> String {
            a.map(|a| a.to_string()).unwrap_or_else(|| "*".into())
        }
        write!(f, "MVPN-{}", self.route_type())?;
        match self.route() {
            Ok(MvpnRoute::SourceActiveAd { rd, source, group }) => {
                write!(f, " rd {} ({}, {})", rd, addr(source), addr(group))
            }
            Ok(MvpnRoute::SharedTreeJoin { rd, source_as, rp, group }) => {
                write!(f, " rd {} as {} ({}, {})",
                    rd, source_as, addr(rp), addr(group)
                )
            }
            Ok(MvpnRoute::SourceTreeJoin { rd, source_as, source, group }) => {
                write!(f, " rd {} as {} ({}, {})",
                    rd, source_as, addr(source), addr(group)
                )
            }
            Ok(MvpnRoute::Generic { .. }) => Ok(()),
            Err(_) => write!(f, " <invalid>"),
        }
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE_TREE_JOIN: &[u8] = &[
        0x07, 0x16,
        0x00, 0x00, 0xfd, 0xe8, 0x00, 0x00, 0x00, 0x01,
        0x00, 0x00, 0xfd, 0xe8,
        0x20, 0xc0, 0x00, 0x02, 0x01,
        0x20, 0xe8, 0x01, 0x01, 0x01,
    ];

    #[test]
    fn source_tree_join() {
        let raw = Bytes::from_static(SOURCE_TREE_JOIN);
        let mut parser = Parser::from_ref(&raw);
        let nlri = MvpnNlri::parse(&mut parser, AfiSafiType::Ipv4Mvpn)
            .unwrap();
        assert_eq!(parser.remaining(), 0);
        let route = nlri.route().unwrap();
        assert_eq!(
            route.c_multicast(),
            Some((
                Some(IpAddr::from([192, 0, 2, 1])),
                Some(IpAddr::from([232, 1, 1, 1]))
            ))
        );
        assert_eq!(
            nlri.to_string(),
            "MVPN-SourceTreeJoin rd 65000:1 as 65000 (192.0.2.1, 232.1.1.1)"
        );
        assert_eq!(
            MvpnNlri::from_route(&route, Afi::Ipv4).unwrap().raw().as_ref(),
            SOURCE_TREE_JOIN
        );

        // IPv4 addresses in an IPv6 route
        let mut parser = Parser::from_ref(&raw);
        assert!(MvpnNlri::parse(&mut parser, AfiSafiType::Ipv6Mvpn).is_err());
    }

    #[test]
    fn wildcard_source_active() {
        let route = MvpnRoute::SourceActiveAd {
            rd: RouteDistinguisher::from_asn2(1, 2),
            source: None,
            group: Some(IpAddr::from([239, 0, 0, 1])),
        };
        let nlri = MvpnNlri::from_route(&route, Afi::Ipv4).unwrap();
        assert_eq!(nlri.raw().len(), 2 + 8 + 1 + 5);
        assert_eq!(nlri.route().unwrap(), route);
    }

    #[test]
    fn other_route_types_are_kept() {
        let raw = Bytes::from_static(&[0x01, 0x02, 0xaa, 0xbb]);
        let mut parser = Parser::from_ref(&raw);
        let nlri = MvpnNlri::parse(&mut parser, AfiSafiType::Ipv4Mvpn)
            .unwrap();
        assert_eq!(nlri.route_type(), MvpnRouteType::IntraAsIPmsiAd);
        assert!(matches!(nlri.route(), Ok(MvpnRoute::Generic { .. })));
    }

    #[test]
    fn truncated() {
        for i in 0..SOURCE_TREE_JOIN.len() {
            let part = Bytes::copy_from_slice(&SOURCE_TREE_JOIN[..i]);
            let mut parser = Parser::from_ref(&part);
            assert!(MvpnNlri::parse(&mut parser, AfiSafiType::Ipv4Mvpn).is_err());
        }
    }
}
