use std::fmt;

use bytes::Bytes;
use inetnum::addr::Prefix;
use octseq::Parser;

use crate::bgp::message::update_builder::ComposeError;
use crate::util::parser::ParseError;

use super::afisafi::{AfiSafiParse, AfiSafiType, NlriCompose};
use super::common::{compose_prefix, parse_prefix};

/// NLRI comprised of a [`Prefix`], for unicast and multicast SAFIs.
///
/// The wire form is the prefix length in bits followed by the significant
/// octets of the address.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct UnicastNlri {
    afisafi: AfiSafiType,
    raw: Bytes,
    prefix: Prefix,
}

impl UnicastNlri {
    /// Creates a unicast NLRI for the IPv4 or IPv6 unicast family,
    /// depending on the address of `prefix`.
    pub fn make(prefix: Prefix) -> Self {
        let afisafi = if prefix.is_v4() {
            AfiSafiType::Ipv4Unicast
        } else {
            AfiSafiType::Ipv6Unicast
        };
        Self::from_parts(afisafi, prefix)
    }

    /// Creates an NLRI for `prefix` in the given unicast or multicast
    /// family.
    pub fn new(afisafi: AfiSafiType, prefix: Prefix)
        -> Result<Self, ComposeError>
    {
        use AfiSafiType::*;
        match (afisafi, prefix.is_v4()) {
            (Ipv4Unicast | Ipv4Multicast, true) |
            (Ipv6Unicast | Ipv6Multicast, false) => {
                Ok(Self::from_parts(afisafi, prefix))
            }
            _ => Err(ComposeError::WrongAddressType)
        }
    }

    fn from_parts(afisafi: AfiSafiType, prefix: Prefix) -> Self {
        let mut buf = Vec::with_capacity(17);
        let _ = compose_prefix(prefix, &mut buf);
        Self { afisafi, raw: Bytes::from(buf), prefix }
    }

    pub fn afisafi(&self) -> AfiSafiType {
        self.afisafi
    }

    pub fn prefix(&self) -> Prefix {
        self.prefix
    }

    pub fn is_multicast(&self) -> bool {
        self.afisafi.safi() == super::afisafi::Safi::Multicast
    }
}

impl AfiSafiParse for UnicastNlri {
    fn parse(parser: &mut Parser<'_, Bytes>, afisafi: AfiSafiType)
        -> Result<Self, ParseError>
    {
        let start = parser.pos();
        let prefix = parse_prefix(parser, afisafi.afi())?;
        let len = parser.pos() - start;
        parser.seek(start)?;
        let raw = parser.parse_octets(len)?;
        Ok(Self { afisafi, raw, prefix })
    }
}

impl NlriCompose for UnicastNlri {
    fn raw(&self) -> &Bytes {
        &self.raw
    }
}

impl From<Prefix> for UnicastNlri {
    fn from(prefix: Prefix) -> Self {
        Self::make(prefix)
    }
}

impl fmt::Display for UnicastNlri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.prefix)
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parse_and_compose() {
        let raw = Bytes::from_static(&[0x18, 0x0a, 0x00, 0x00, 0x20]);
        let mut parser = Parser::from_ref(&raw);
        let nlri = UnicastNlri::parse(
            &mut parser, AfiSafiType::Ipv4Unicast
        ).unwrap();
        assert_eq!(parser.remaining(), 1);
        assert_eq!(nlri.prefix(), Prefix::from_str("10.0.0.0/24").unwrap());
        assert_eq!(nlri.raw().as_ref(), &[0x18, 0x0a, 0x00, 0x00]);

        let made = UnicastNlri::make(Prefix::from_str("10.0.0.0/24").unwrap());
        assert_eq!(made, nlri);
        let mut target = Vec::new();
        made.compose(&mut target).unwrap();
        assert_eq!(target, vec![0x18, 0x0a, 0x00, 0x00]);
    }

    #[test]
    fn wrong_address_type() {
        assert!(matches!(
            UnicastNlri::new(
                AfiSafiType::Ipv6Unicast,
                Prefix::from_str("10.0.0.0/8").unwrap()
            ),
            Err(ComposeError::WrongAddressType)
        ));
        let m = UnicastNlri::new(
            AfiSafiType::Ipv4Multicast,
            Prefix::from_str("224.0.0.0/4").unwrap()
        ).unwrap();
        assert!(m.is_multicast());
    }

    #[test]
    fn truncated() {
        let raw = Bytes::from_static(&[0x20, 0xc0, 0x00, 0x02, 0x01]);
        for i in 0..raw.len() {
            let part = raw.slice(..i);
            let mut parser = Parser::from_ref(&part);
            assert!(
                UnicastNlri::parse(&mut parser, AfiSafiType::Ipv4Unicast)
                    .is_err()
            );
        }
    }

    #[test]
    fn oversized_mask() {
        let raw = Bytes::from_static(&[0x81, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let mut parser = Parser::from_ref(&raw);
        assert!(
            UnicastNlri::parse(&mut parser, AfiSafiType::Ipv6Unicast).is_err()
        );
    }
}
