use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use octseq::Parser;
#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use crate::bgp::message::update_builder::ComposeError;
use crate::util::parser::{parse_ipv4addr, parse_ipv6addr, ParseError};

use super::afisafi::AfiSafiType as AfiSafi;
use super::qualifier::RouteDistinguisher;

/// Conventional and BGP-MP Next Hop variants.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum NextHop {
    Unicast(IpAddr),
    Multicast(IpAddr),
    #[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
    Ipv6LL { global: Ipv6Addr, link_local: Ipv6Addr },
    MplsVpnUnicast(RouteDistinguisher, IpAddr),
    #[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
    MplsVpnIpv6LL { global: Ipv6Addr, link_local: Ipv6Addr },
    /// No next hop, as used by FlowSpec.
    Empty,
    Unimplemented(AfiSafi),
}

impl NextHop {
    /// Returns the next hop used when composing for `afisafi` while no
    /// better address is known.
    pub fn empty_for(afisafi: AfiSafi) -> Self {
        use AfiSafi::*;
        match afisafi {
            Ipv4FlowSpec | Ipv6FlowSpec | Ipv4FlowSpecVpn | Ipv6FlowSpecVpn
                => Self::Empty,
            Ipv4MplsVpnUnicast => Self::MplsVpnUnicast(
                RouteDistinguisher::zeroes(),
                Ipv4Addr::from(0).into()
            ),
            Ipv6MplsVpnUnicast => Self::MplsVpnUnicast(
                RouteDistinguisher::zeroes(),
                Ipv6Addr::from(0).into()
            ),
            Ipv6Unicast | Ipv6Multicast | Ipv6MplsUnicast | Ipv6Mvpn |
            Ipv6Mup => Self::Unicast(Ipv6Addr::from(0).into()),
            _ => Self::Unicast(Ipv4Addr::from(0).into()),
        }
    }

    /// Creates a VPN next hop, with the all-zeroes RD of RFC 4364.
    pub fn vpn(addr: IpAddr) -> Self {
        Self::MplsVpnUnicast(RouteDistinguisher::zeroes(), addr)
    }

    /// Returns the (global) address of the next hop.
    pub fn addr(&self) -> Option<IpAddr> {
        match self {
            Self::Unicast(a) | Self::Multicast(a) |
            Self::MplsVpnUnicast(_, a) => Some(*a),
            Self::Ipv6LL { global, .. } |
            Self::MplsVpnIpv6LL { global, .. } => Some((*global).into()),
            Self::Empty | Self::Unimplemented(_) => None,
        }
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unicast(ip) | Self::Multicast(ip)  => write!(f, "{}", ip),
            Self::Ipv6LL { global, link_local } => {
                write!(f, "{} {}", global, link_local)
            }
            Self::MplsVpnUnicast(rd, ip) => write!(f, "rd {} {}", rd, ip),
            Self::MplsVpnIpv6LL { global, link_local } => {
                write!(f, "rd 0:0 {} {}", global, link_local)
            }
            Self::Empty => write!(f, "empty"),
            Self::Unimplemented(afisafi) => {
                write!(f, "unimplemented for AfiSafi {}", afisafi)
            }
        }
    }
}

//--- NextHop in MP_REACH_NLRI -----------------------------------------------

impl NextHop {
    /// Parses the length and next hop field of an MP_REACH_NLRI.
    ///
    /// IPv4 NLRI may come with an IPv6 next hop, RFC 8950.
    pub fn parse<R: AsRef<[u8]> + ?Sized>(
        parser: &mut Parser<'_, R>,
        afisafi: AfiSafi
    ) -> Result<Self, ParseError> {
        use AfiSafi::*;
        let len = parser.parse_u8()?;

        macro_rules! error {
            () => { return Err(ParseError::form_error(
                "invalid next hop length for address family"
            )) }
        }

        let res = match afisafi {
            Ipv4Unicast | Ipv6Unicast |
            Ipv4MplsUnicast | Ipv6MplsUnicast => {
                match len {
                    4 => NextHop::Unicast(parse_ipv4addr(parser)?.into()),
                    16 => NextHop::Unicast(parse_ipv6addr(parser)?.into()),
                    32 => NextHop::Ipv6LL {
                        global: parse_ipv6addr(parser)?,
                        link_local: parse_ipv6addr(parser)?,
                    },
                    _ => error!()
                }
            }
            Ipv4Multicast | Ipv6Multicast => {
                match len {
                    4 => NextHop::Multicast(parse_ipv4addr(parser)?.into()),
                    16 => NextHop::Multicast(parse_ipv6addr(parser)?.into()),
                    32 => NextHop::Ipv6LL {
                        global: parse_ipv6addr(parser)?,
                        link_local: parse_ipv6addr(parser)?,
                    },
                    _ => error!()
                }
            }
            Ipv4MplsVpnUnicast | Ipv6MplsVpnUnicast => {
                match len {
                    12 => NextHop::MplsVpnUnicast(
                        RouteDistinguisher::parse(parser)?,
                        parse_ipv4addr(parser)?.into()
                    ),
                    24 => NextHop::MplsVpnUnicast(
                        RouteDistinguisher::parse(parser)?,
                        parse_ipv6addr(parser)?.into()
                    ),
                    48 => {
                        RouteDistinguisher::skip(parser)?;
                        let global = parse_ipv6addr(parser)?;
                        RouteDistinguisher::skip(parser)?;
                        NextHop::MplsVpnIpv6LL {
                            global,
                            link_local: parse_ipv6addr(parser)?,
                        }
                    }
                    _ => error!()
                }
            }
            Ipv4FlowSpec | Ipv6FlowSpec | Ipv4FlowSpecVpn | Ipv6FlowSpecVpn |
            LinkStateBgpLs | LinkStateBgpLsVpn => {
                match len {
                    0 => NextHop::Empty,
                    4 => NextHop::Unicast(parse_ipv4addr(parser)?.into()),
                    16 => NextHop::Unicast(parse_ipv6addr(parser)?.into()),
                    _ => error!()
                }
            }
            Ipv4RouteTarget | L2VpnVpls | L2VpnEvpn |
            Ipv4Mvpn | Ipv6Mvpn | Ipv4Mup | Ipv6Mup => {
                match len {
                    4 => NextHop::Unicast(parse_ipv4addr(parser)?.into()),
                    16 => NextHop::Unicast(parse_ipv6addr(parser)?.into()),
                    _ => error!()
                }
            }
            AfiSafi::Unsupported(_, _) => {
                parser.advance(len.into())?;
                NextHop::Unimplemented(afisafi)
            }
        };

        Ok(res)
    }

    pub fn skip<R: AsRef<[u8]> + ?Sized>(parser: &mut Parser<'_, R>)
        -> Result<(), ParseError>
    {
        let len = parser.parse_u8()?;
        parser.advance(len.into())?;
        Ok(())
    }

    /// Returns the length of the next hop field, excluding its length byte.
    pub fn compose_len(&self) -> usize {
        match self {
            Self::Unicast(IpAddr::V4(_)) | Self::Multicast(IpAddr::V4(_))
                => 4,
            Self::Unicast(IpAddr::V6(_)) | Self::Multicast(IpAddr::V6(_))
                => 16,
            Self::Ipv6LL { .. } => 32,
            Self::MplsVpnUnicast(_, IpAddr::V4(_)) => 12,
            Self::MplsVpnUnicast(_, IpAddr::V6(_)) => 24,
            Self::MplsVpnIpv6LL { .. } => 48,
            Self::Empty | Self::Unimplemented(_) => 0,
        }
    }

    /// Composes the length byte and the next hop.
    pub fn compose(&self, target: &mut Vec<u8>) -> Result<(), ComposeError> {
        if let Self::Unimplemented(_) = self {
            return Err(ComposeError::IllegalCombination);
        }
        target.push(self.compose_len() as u8);
        match self {
            Self::Unicast(a) | Self::Multicast(a) => match a {
                IpAddr::V4(a) => target.extend_from_slice(&a.octets()),
                IpAddr::V6(a) => target.extend_from_slice(&a.octets()),
            },
            Self::Ipv6LL { global, link_local } => {
                target.extend_from_slice(&global.octets());
                target.extend_from_slice(&link_local.octets());
            }
            Self::MplsVpnUnicast(rd, a) => {
                target.extend_from_slice(rd.as_ref());
                match a {
                    IpAddr::V4(a) => target.extend_from_slice(&a.octets()),
                    IpAddr::V6(a) => target.extend_from_slice(&a.octets()),
                }
            }
            Self::MplsVpnIpv6LL { global, link_local } => {
                let rd = RouteDistinguisher::zeroes();
                target.extend_from_slice(rd.as_ref());
                target.extend_from_slice(&global.octets());
                target.extend_from_slice(rd.as_ref());
                target.extend_from_slice(&link_local.octets());
            }
            Self::Empty | Self::Unimplemented(_) => { }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn roundtrip(raw: &[u8], afisafi: AfiSafi) -> NextHop {
        let mut parser = Parser::from_ref(raw);
        let nh = NextHop::parse(&mut parser, afisafi).unwrap();
        assert_eq!(parser.remaining(), 0);
        let mut target = Vec::new();
        nh.compose(&mut target).unwrap();
        assert_eq!(target, raw);
        nh
    }

    #[test]
    fn nexthops() {
        assert_eq!(
            roundtrip(&[4, 192, 0, 2, 1], AfiSafi::Ipv4Unicast),
            NextHop::Unicast(IpAddr::from_str("192.0.2.1").unwrap())
        );

        let mut raw = vec![32];
        raw.extend_from_slice(
            &Ipv6Addr::from_str("2001:db8::1").unwrap().octets()
        );
        raw.extend_from_slice(
            &Ipv6Addr::from_str("fe80::1").unwrap().octets()
        );
        assert!(matches!(
            roundtrip(&raw, AfiSafi::Ipv6Unicast),
            NextHop::Ipv6LL { .. }
        ));

        // RFC 8950, IPv6 next hop for IPv4 NLRI
        let mut raw = vec![16];
        raw.extend_from_slice(
            &Ipv6Addr::from_str("2001:db8::1").unwrap().octets()
        );
        assert_eq!(
            roundtrip(&raw, AfiSafi::Ipv4Unicast).addr(),
            Some(IpAddr::from_str("2001:db8::1").unwrap())
        );

        assert_eq!(
            roundtrip(&[12, 0, 0, 0, 0, 0, 0, 0, 0, 10, 0, 0, 1],
                AfiSafi::Ipv4MplsVpnUnicast),
            NextHop::vpn(IpAddr::from_str("10.0.0.1").unwrap())
        );

        assert_eq!(roundtrip(&[0], AfiSafi::Ipv4FlowSpec), NextHop::Empty);
    }

    #[test]
    fn invalid_lengths() {
        for (raw, afisafi) in [
            (&[4u8, 10, 0, 0, 1][..], AfiSafi::Ipv4MplsVpnUnicast),
            (&[0][..], AfiSafi::Ipv4Unicast),
            (&[5, 1, 2, 3, 4, 5][..], AfiSafi::L2VpnEvpn),
            (&[16, 1, 2, 3][..], AfiSafi::Ipv6Unicast),
        ] {
            let mut parser = Parser::from_ref(raw);
            assert!(NextHop::parse(&mut parser, afisafi).is_err());
        }
    }
}
