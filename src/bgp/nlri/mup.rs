use std::fmt;
use std::net::IpAddr;

use bytes::Bytes;
use inetnum::addr::Prefix;
use octseq::Parser;

use crate::bgp::message::update_builder::ComposeError;
use crate::typeenum;
use crate::util::parser::{
    check_exhausted, parse_ipv4addr, parse_ipv6addr, ParseError
};

use super::afisafi::{Afi, AfiSafiParse, AfiSafiType, NlriCompose};
use super::common::{
    compose_prefix, compose_sized_addr, parse_prefix, parse_sized_addr,
    prefix_bits_to_bytes,
};
use super::qualifier::RouteDistinguisher;

/// The only architecture type defined so far: 3GPP 5G.
pub const ARCH_3GPP_5G: u8 = 1;

typeenum!(
/// MUP route types.
    MupRouteType, u16,
    {
        1 => InterworkSegmentDiscovery,
        2 => DirectSegmentDiscovery,
        3 => Type1SessionTransformed,
        4 => Type2SessionTransformed,
    });

/// The decoded contents of a BGP MUP NLRI.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum MupRoute {
    InterworkSegmentDiscovery {
        rd: RouteDistinguisher,
        prefix: Prefix,
    },
    DirectSegmentDiscovery {
        rd: RouteDistinguisher,
        address: IpAddr,
    },
    Type1SessionTransformed {
        rd: RouteDistinguisher,
        prefix: Prefix,
        teid: u32,
        qfi: u8,
        endpoint: IpAddr,
        source: Option<IpAddr>,
    },
    Type2SessionTransformed {
        rd: RouteDistinguisher,
        endpoint: IpAddr,
        /// Number of significant TEID bits.
        teid_bits: u8,
        teid: u32,
    },
    Generic {
        route_type: u16,
        payload: Bytes,
    },
}

impl MupRoute {
    pub fn route_type(&self) -> MupRouteType {
        match self {
            Self::InterworkSegmentDiscovery { .. } => {
                MupRouteType::InterworkSegmentDiscovery
            }
            Self::DirectSegmentDiscovery { .. } => {
                MupRouteType::DirectSegmentDiscovery
            }
            Self::Type1SessionTransformed { .. } => {
                MupRouteType::Type1SessionTransformed
            }
            Self::Type2SessionTransformed { .. } => {
                MupRouteType::Type2SessionTransformed
            }
            Self::Generic { route_type, .. } => (*route_type).into(),
        }
    }

    pub fn rd(&self) -> Option<RouteDistinguisher> {
        match self {
            Self::InterworkSegmentDiscovery { rd, .. } |
            Self::DirectSegmentDiscovery { rd, .. } |
            Self::Type1SessionTransformed { rd, .. } |
            Self::Type2SessionTransformed { rd, .. } => Some(*rd),
            Self::Generic { .. } => None,
        }
    }

    /// The address family of the route, if it can be told.
    fn afi(&self) -> Option<Afi> {
        let v4 = match self {
            Self::InterworkSegmentDiscovery { prefix, .. } |
            Self::Type1SessionTransformed { prefix, .. } => prefix.is_v4(),
            Self::DirectSegmentDiscovery { address, .. } => address.is_ipv4(),
            Self::Type2SessionTransformed { endpoint, .. } => {
                endpoint.is_ipv4()
            }
            Self::Generic { .. } => return None,
        };
        Some(if v4 { Afi::Ipv4 } else { Afi::Ipv6 })
    }

    fn parse_payload(route_type: MupRouteType, payload: &Bytes, afi: Afi)
        -> Result<Self, ParseError>
    {
        fn addr(parser: &mut Parser<'_, Bytes>, afi: Afi)
            -> Result<IpAddr, ParseError>
        {
            match afi {
                Afi::Ipv4 => Ok(IpAddr::V4(parse_ipv4addr(parser)?)),
                Afi::Ipv6 => Ok(IpAddr::V6(parse_ipv6addr(parser)?)),
                _ => Err(ParseError::Unsupported)
            }
        }

        let mut parser = Parser::from_ref(payload);
        let parser = &mut parser;
        let res = match route_type {
            MupRouteType::InterworkSegmentDiscovery => {
                Self::InterworkSegmentDiscovery {
                    rd: RouteDistinguisher::parse(parser)?,
                    prefix: parse_prefix(parser, afi)?,
                }
            }
            MupRouteType::DirectSegmentDiscovery => {
                Self::DirectSegmentDiscovery {
                    rd: RouteDistinguisher::parse(parser)?,
                    address: addr(parser, afi)?,
                }
            }
            MupRouteType::Type1SessionTransformed => {
                let rd = RouteDistinguisher::parse(parser)?;
                let prefix = parse_prefix(parser, afi)?;
                let teid = parser.parse_u32_be()?;
                let qfi = parser.parse_u8()?;
                let endpoint = parse_sized_addr(parser)?.ok_or(
                    ParseError::form_error("missing MUP endpoint address")
                )?;
                let source = if parser.remaining() > 0 {
                    parse_sized_addr(parser)?
                } else {
                    None
                };
                Self::Type1SessionTransformed {
                    rd, prefix, teid, qfi, endpoint, source
                }
            }
            MupRouteType::Type2SessionTransformed => {
                let rd = RouteDistinguisher::parse(parser)?;
                let bits = parser.parse_u8()?;
                let addr_bits = if afi == Afi::Ipv4 { 32 } else { 128 };
                let teid_bits = bits.checked_sub(addr_bits)
                    .filter(|b| *b <= 32)
                    .ok_or(ParseError::form_error(
                        "invalid MUP endpoint length"
                    ))?;
                let endpoint = addr(parser, afi)?;
                let mut buf = [0u8; 4];
                let n = prefix_bits_to_bytes(teid_bits);
                parser.parse_buf(&mut buf[4 - n..])?;
                Self::Type2SessionTransformed {
                    rd, endpoint, teid_bits, teid: u32::from_be_bytes(buf)
                }
            }
            MupRouteType::Unimplemented(route_type) => {
                return Ok(Self::Generic {
                    route_type,
                    payload: payload.clone()
                })
            }
        };
        check_exhausted(parser, "trailing bytes in MUP route")?;
        Ok(res)
    }

    fn compose_payload(&self, target: &mut Vec<u8>)
        -> Result<(), ComposeError>
    {
        match self {
            Self::InterworkSegmentDiscovery { rd, prefix } => {
                target.extend_from_slice(rd.as_ref());
                let _ = compose_prefix(*prefix, target);
            }
            Self::DirectSegmentDiscovery { rd, address } => {
                target.extend_from_slice(rd.as_ref());
                match address {
                    IpAddr::V4(a) => target.extend_from_slice(&a.octets()),
                    IpAddr::V6(a) => target.extend_from_slice(&a.octets()),
                }
            }
            Self::Type1SessionTransformed {
                rd, prefix, teid, qfi, endpoint, source
            } => {
                target.extend_from_slice(rd.as_ref());
                let _ = compose_prefix(*prefix, target);
                target.extend_from_slice(&teid.to_be_bytes());
                target.push(*qfi);
                compose_sized_addr(Some(*endpoint), target);
                if source.is_some() {
                    compose_sized_addr(*source, target);
                }
            }
            Self::Type2SessionTransformed {
                rd, endpoint, teid_bits, teid
            } => {
                if *teid_bits > 32 {
                    return Err(ComposeError::InvalidNlri(
                        "MUP TEID longer than 32 bits"
                    ));
                }
                target.extend_from_slice(rd.as_ref());
                let addr_bits = if endpoint.is_ipv4() { 32 } else { 128 };
                target.push(addr_bits + teid_bits);
                match endpoint {
                    IpAddr::V4(a) => target.extend_from_slice(&a.octets()),
                    IpAddr::V6(a) => target.extend_from_slice(&a.octets()),
                }
                let n = prefix_bits_to_bytes(*teid_bits);
                target.extend_from_slice(&teid.to_be_bytes()[4 - n..]);
            }
            Self::Generic { payload, .. } => {
                target.extend_from_slice(payload);
            }
        }
        Ok(())
    }
}

//------------ MupNlri -------------------------------------------------------

/// NLRI of the BGP Mobile User Plane SAFI.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MupNlri {
    afisafi: AfiSafiType,
    raw: Bytes,
}

impl MupNlri {
    /// Creates a 3GPP 5G MUP NLRI.
    ///
    /// Generic routes can not tell their address family, they end up in
    /// the IPv4 family unless `afi` says otherwise.
    pub fn from_route(route: &MupRoute, afi: Option<Afi>)
        -> Result<Self, ComposeError>
    {
        let afi = match (route.afi(), afi) {
            (Some(a), Some(b)) if a != b => {
                return Err(ComposeError::WrongAddressType)
            }
            (Some(a), _) | (None, Some(a)) => a,
            (None, None) => Afi::Ipv4,
        };
        let afisafi = match afi {
            Afi::Ipv4 => AfiSafiType::Ipv4Mup,
            Afi::Ipv6 => AfiSafiType::Ipv6Mup,
            _ => return Err(ComposeError::WrongAddressType),
        };
        let mut raw = vec![ARCH_3GPP_5G];
        raw.extend_from_slice(&u16::from(route.route_type()).to_be_bytes());
        raw.push(0);
        route.compose_payload(&mut raw)?;
        raw[3] = u8::try_from(raw.len() - 4).map_err(|_|
            ComposeError::InvalidNlri("MUP route too long")
        )?;
        Ok(Self { afisafi, raw: Bytes::from(raw) })
    }

    pub fn afisafi(&self) -> AfiSafiType {
        self.afisafi
    }

    pub fn architecture_type(&self) -> u8 {
        self.raw.first().copied().unwrap_or(0)
    }

    pub fn route_type(&self) -> MupRouteType {
        match self.raw.get(1..3) {
            Some(b) => u16::from_be_bytes([b[0], b[1]]).into(),
            None => MupRouteType::Unimplemented(0),
        }
    }

    pub fn route(&self) -> Result<MupRoute, ParseError> {
        MupRoute::parse_payload(
            self.route_type(),
            &self.raw.slice(4.min(self.raw.len())..),
            self.afisafi.afi()
        )
    }
}

impl AfiSafiParse for MupNlri {
    fn parse(parser: &mut Parser<'_, Bytes>, afisafi: AfiSafiType)
        -> Result<Self, ParseError>
    {
        let start = parser.pos();
        let arch = parser.parse_u8()?;
        let route_type = MupRouteType::from(parser.parse_u16_be()?);
        let len = parser.parse_u8()?;
        let payload = parser.parse_octets(len.into())?;
        if arch == ARCH_3GPP_5G {
            MupRoute::parse_payload(route_type, &payload, afisafi.afi())?;
        }
        parser.seek(start)?;
        let raw = parser.parse_octets(4 + usize::from(len))?;
        Ok(Self { afisafi, raw })
    }
}

impl NlriCompose for MupNlri {
    fn raw(&self) -> &Bytes {
        &self.raw
    }
}

impl fmt::Display for MupNlri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MUP-{}", self.route_type())?;
        match self.route() {
            Ok(MupRoute::InterworkSegmentDiscovery { rd, prefix }) => {
                write!(f, " rd {} {}", rd, prefix)
            }
            Ok(MupRoute::DirectSegmentDiscovery { rd, address }) => {
                write!(f, " rd {} {}", rd, address)
            }
            Ok(MupRoute::Type1SessionTransformed {
                rd, prefix, teid, endpoint, ..
            }) => {
                write!(f, " rd {} {} teid {} endpoint {}",
                    rd, prefix, teid, endpoint
                )
            }
            Ok(MupRoute::Type2SessionTransformed {
                rd, endpoint, teid, ..
            }) => {
                write!(f, " rd {} endpoint {} teid {}", rd, endpoint, teid)
            }
            Ok(MupRoute::Generic { .. }) => Ok(()),
            Err(_) => write!(f, " <invalid>"),
        }
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn interwork_segment_discovery() {
        let raw = Bytes::from_static(&[
            0x01, 0x00, 0x01, 0x0c,
            0x00, 0x00, 0xfd, 0xe8, 0x00, 0x00, 0x00, 0x01,
            0x18, 0x0a, 0x00, 0x00,
        ]);
        let mut parser = Parser::from_ref(&raw);
        let nlri = MupNlri::parse(&mut parser, AfiSafiType::Ipv4Mup).unwrap();
        assert_eq!(parser.remaining(), 0);
        assert_eq!(nlri.architecture_type(), ARCH_3GPP_5G);
        let route = nlri.route().unwrap();
        assert_eq!(route, MupRoute::InterworkSegmentDiscovery {
            rd: RouteDistinguisher::from_asn2(65000, 1),
            prefix: Prefix::from_str("10.0.0.0/24").unwrap(),
        });
        assert_eq!(
            nlri.to_string(),
            "MUP-InterworkSegmentDiscovery rd 65000:1 10.0.0.0/24"
        );
        assert_eq!(MupNlri::from_route(&route, None).unwrap(), nlri);
    }

    #[test]
    fn type1_session_transformed() {
        let route = MupRoute::Type1SessionTransformed {
            rd: RouteDistinguisher::from_asn2(65000, 1),
            prefix: Prefix::from_str("2001:db8:1::/48").unwrap(),
            teid: 0x12345678,
            qfi: 9,
            endpoint: IpAddr::from_str("2001:db8::1").unwrap(),
            source: Some(IpAddr::from_str("2001:db8::2").unwrap()),
        };
        let nlri = MupNlri::from_route(&route, None).unwrap();
        assert_eq!(nlri.afisafi(), AfiSafiType::Ipv6Mup);
        assert_eq!(nlri.route().unwrap(), route);

        let raw = nlri.raw().clone();
        let mut parser = Parser::from_ref(&raw);
        assert_eq!(
            MupNlri::parse(&mut parser, AfiSafiType::Ipv6Mup).unwrap(),
            nlri
        );
    }

    #[test]
    fn type2_session_transformed() {
        let route = MupRoute::Type2SessionTransformed {
            rd: RouteDistinguisher::from_asn2(65000, 2),
            endpoint: IpAddr::from_str("192.0.2.1").unwrap(),
            teid_bits: 16,
            teid: 0xbeef,
        };
        let nlri = MupNlri::from_route(&route, None).unwrap();
        assert_eq!(&nlri.raw()[12..], &[48, 192, 0, 2, 1, 0xbe, 0xef]);
        assert_eq!(nlri.route().unwrap(), route);

        assert!(MupNlri::from_route(&route, Some(Afi::Ipv6)).is_err());
    }

    #[test]
    fn truncated() {
        let raw: &[u8] = &[
            0x01, 0x00, 0x02, 0x0c,
            0x00, 0x00, 0xfd, 0xe8, 0x00, 0x00, 0x00, 0x01,
            0xc0, 0x00, 0x02, 0x01,
        ];
        let full = Bytes::copy_from_slice(raw);
        let mut parser = Parser::from_ref(&full);
        assert!(MupNlri::parse(&mut parser, AfiSafiType::Ipv4Mup).is_ok());
        for i in 0..raw.len() {
            let part = Bytes::copy_from_slice(&raw[..i]);
            let mut parser = Parser::from_ref(&part);
            assert!(MupNlri::parse(&mut parser, AfiSafiType::Ipv4Mup).is_err());
        }
    }
}
