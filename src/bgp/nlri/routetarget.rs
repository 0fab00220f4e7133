use std::fmt;

use bytes::Bytes;
use inetnum::asn::Asn;
use octseq::Parser;

use crate::bgp::communities::ExtendedCommunity;
use crate::bgp::message::update_builder::ComposeError;
use crate::util::parser::ParseError;

use super::afisafi::{AfiSafiParse, AfiSafiType, NlriCompose};
use super::common::prefix_bits_to_bytes;

/// NLRI containing a Route Target membership as defined in RFC 4684.
///
/// The raw form starts with the length in bits. A length of zero is the
/// default route target, matching everything.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RouteTargetNlri {
    raw: Bytes,
}

impl RouteTargetNlri {
    /// The default route target membership.
    pub fn default_route() -> Self {
        Self { raw: Bytes::from_static(&[0]) }
    }

    /// Membership for a full route target.
    pub fn new(origin_as: Asn, route_target: ExtendedCommunity) -> Self {
        let mut raw = Vec::with_capacity(13);
        raw.push(96);
        raw.extend_from_slice(&origin_as.into_u32().to_be_bytes());
        raw.extend_from_slice(&route_target.to_raw());
        Self { raw: Bytes::from(raw) }
    }

    /// Membership for the first `bits` bits of a route target.
    pub fn with_prefix(
        origin_as: Asn,
        route_target: ExtendedCommunity,
        bits: u8
    ) -> Result<Self, ComposeError> {
        if bits > 64 {
            return Err(ComposeError::InvalidNlri(
                "route target prefix longer than 64 bits"
            ));
        }
        let n = prefix_bits_to_bytes(bits);
        let mut rt = route_target.to_raw();
        if bits % 8 != 0 {
            rt[n - 1] &= 0xff << (8 - bits % 8);
        }
        let mut raw = Vec::with_capacity(5 + n);
        raw.push(32 + bits);
        raw.extend_from_slice(&origin_as.into_u32().to_be_bytes());
        raw.extend_from_slice(&rt[..n]);
        Ok(Self { raw: Bytes::from(raw) })
    }

    /// Returns true if this represents the default route target.
    pub fn is_default(&self) -> bool {
        self.raw.len() == 1
    }

    /// Returns the length of the NLRI in bits.
    pub fn bits(&self) -> u8 {
        self.raw.first().copied().unwrap_or(0)
    }

    /// Returns the origin AS, if any.
    pub fn origin_as(&self) -> Option<Asn> {
        let b: [u8; 4] = self.raw.get(1..5)?.try_into().ok()?;
        Some(Asn::from_u32(u32::from_be_bytes(b)))
    }

    /// Returns the Route Target described as [`ExtendedCommunity`], if the
    /// NLRI carries all of it.
    pub fn route_target(&self) -> Option<ExtendedCommunity> {
        let b: [u8; 8] = self.raw.get(5..13)?.try_into().ok()?;
        Some(ExtendedCommunity::from_raw(b))
    }
}

impl AfiSafiParse for RouteTargetNlri {
    fn parse(parser: &mut Parser<'_, Bytes>, _afisafi: AfiSafiType)
        -> Result<Self, ParseError>
    {
        let start = parser.pos();
        let prefix_bits = parser.parse_u8()?;
        if prefix_bits != 0 && !(32..=96).contains(&prefix_bits) {
            return Err(ParseError::form_error(
                "invalid Route Target membership length"
            ));
        }
        parser.advance(prefix_bits_to_bytes(prefix_bits))?;
        let len = parser.pos() - start;
        parser.seek(start)?;
        let raw = parser.parse_octets(len)?;
        Ok(Self { raw })
    }
}

impl NlriCompose for RouteTargetNlri {
    fn raw(&self) -> &Bytes {
        &self.raw
    }
}

impl fmt::Display for RouteTargetNlri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            return write!(f, "rtc default");
        }
        write!(f, "rtc")?;
        if let Some(asn) = self.origin_as() {
            write!(f, " origin {}", asn)?;
        }
        match self.route_target() {
            Some(rt) => write!(f, " {}", rt),
            None => write!(f, " /{}", self.bits()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::communities::{
        ExtendedCommunityType,
        ExtendedCommunitySubType
    };

    #[test]
    fn parse() {
        let raw = Bytes::from(vec![
            0x60, 0x00, 0x00, 0x00, 0x64, 0x00, 0x02, 0x00,
            0x64, 0x00, 0x00, 0x00, 0x01, 0x60, 0x00, 0x00,
            0x00, 0x64, 0x01, 0x02, 0x0a, 0x00, 0x00, 0x02,
            0x00, 0x00, 0x60, 0x00, 0x00, 0x00, 0x64, 0x01,
            0x02, 0x0a, 0x00, 0x00, 0x02, 0x00, 0x01
        ]);
        let mut parser = Parser::from_ref(&raw);
        let mut res = vec![];

        while parser.remaining() > 0 {
            res.push(
                RouteTargetNlri::parse(&mut parser, AfiSafiType::Ipv4RouteTarget)
                    .unwrap()
            );
        }
        assert_eq!(res.len(), 3);
        let nlri1 = &res[0];
        assert_eq!(nlri1.origin_as(), Some(Asn::from_u32(100)));
        let ec1 = nlri1.route_target().unwrap();
        assert_eq!(ec1.types(), (
            ExtendedCommunityType::TransitiveTwoOctetSpecific,
            ExtendedCommunitySubType::RouteTarget
        ));
        assert_eq!(
            RouteTargetNlri::new(Asn::from_u32(100), ec1),
            *nlri1
        );
    }

    #[test]
    fn default_and_prefix() {
        let raw = Bytes::from_static(&[0x00, 0x28, 0x00, 0x00, 0x00, 0x64,
            0x00]);
        let mut parser = Parser::from_ref(&raw);
        let default = RouteTargetNlri::parse(
            &mut parser, AfiSafiType::Ipv4RouteTarget
        ).unwrap();
        assert!(default.is_default());
        assert_eq!(default, RouteTargetNlri::default_route());
        assert_eq!(default.origin_as(), None);
        assert_eq!(default.to_string(), "rtc default");

        let partial = RouteTargetNlri::parse(
            &mut parser, AfiSafiType::Ipv4RouteTarget
        ).unwrap();
        assert_eq!(parser.remaining(), 0);
        assert_eq!(partial.bits(), 40);
        assert_eq!(partial.route_target(), None);
        assert_eq!(partial.to_string(), "rtc origin AS100 /40");

        let bad = Bytes::from_static(&[0x10, 0x00, 0x00]);
        let mut parser = Parser::from_ref(&bad);
        assert!(
            RouteTargetNlri::parse(&mut parser, AfiSafiType::Ipv4RouteTarget)
                .is_err()
        );
    }

    #[test]
    fn truncated() {
        let rt = ExtendedCommunity::transitive_as2_route_target(65000, 100);
        let full = RouteTargetNlri::new(Asn::from_u32(65001), rt);
        let sample = full.raw().clone();
        assert_eq!(sample.len(), 13);
        assert_eq!(sample[0], 96);
        assert_eq!(full.route_target(), Some(rt));
        assert_eq!(full.to_string(), "rtc origin AS65001 rt:65000:100");

        for i in 0..sample.len() {
            let part = sample.slice(..i);
            let mut parser = Parser::from_ref(&part);
            assert!(
                RouteTargetNlri::parse(&mut parser, AfiSafiType::Ipv4RouteTarget)
                    .is_err(),
                "cut at {}", i
            );
        }

        let with_prefix = RouteTargetNlri::with_prefix(
            Asn::from_u32(65001), rt, 20
        ).unwrap();
        let sample = with_prefix.raw().clone();
        assert_eq!(sample.as_ref(), &[52, 0, 0, 0xfd, 0xe9, 0x00, 0x02, 0xf0]);
        for i in 0..sample.len() {
            let part = sample.slice(..i);
            let mut parser = Parser::from_ref(&part);
            assert!(
                RouteTargetNlri::parse(&mut parser, AfiSafiType::Ipv4RouteTarget)
                    .is_err()
            );
        }
    }
}
