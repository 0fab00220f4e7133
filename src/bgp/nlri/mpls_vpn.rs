use std::fmt;

use bytes::Bytes;
use inetnum::addr::Prefix;
use octseq::Parser;

use crate::bgp::message::update_builder::ComposeError;
use crate::util::parser::ParseError;

use super::afisafi::{AfiSafiParse, AfiSafiType, NlriCompose};
use super::common::{compose_prefix_without_len, parse_prefix_for_len};
use super::mpls::MplsNlri;
use super::qualifier::{Labels, RouteDistinguisher};

/// NLRI comprised of a [`Prefix`], MPLS [`Labels`] and a VPN
/// [`RouteDistinguisher`], RFC 4364.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MplsVpnNlri {
    afisafi: AfiSafiType,
    raw: Bytes,
    prefix: Prefix,
    labels: Labels,
    rd: RouteDistinguisher,
}

impl MplsVpnNlri {
    pub fn new(
        prefix: Prefix,
        labels: Labels,
        rd: RouteDistinguisher
    ) -> Result<Self, ComposeError> {
        let afisafi = if prefix.is_v4() {
            AfiSafiType::Ipv4MplsVpnUnicast
        } else {
            AfiSafiType::Ipv6MplsVpnUnicast
        };
        let bits = labels.bit_len()
            + 8 * RouteDistinguisher::LEN
            + usize::from(prefix.len());
        let len = u8::try_from(bits).map_err(|_|
            ComposeError::InvalidNlri("label stack too long")
        )?;
        let mut buf = Vec::with_capacity(1 + labels.len() + 8 + 16);
        buf.push(len);
        let _ = labels.compose(&mut buf);
        buf.extend_from_slice(rd.as_ref());
        let _ = compose_prefix_without_len(prefix, &mut buf);
        Ok(Self { afisafi, raw: Bytes::from(buf), prefix, labels, rd })
    }

    pub fn afisafi(&self) -> AfiSafiType {
        self.afisafi
    }

    pub fn prefix(&self) -> Prefix {
        self.prefix
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn rd(&self) -> RouteDistinguisher {
        self.rd
    }
}

impl AfiSafiParse for MplsVpnNlri {
    fn parse(parser: &mut Parser<'_, Bytes>, afisafi: AfiSafiType)
        -> Result<Self, ParseError>
    {
        let start = parser.pos();
        let (labels, bits) = MplsNlri::parse_labels(parser)?;
        let prefix_bits = bits.checked_sub(8 * RouteDistinguisher::LEN as u8)
            .ok_or(ParseError::form_error(
                "prefix length shorter than labels and RD"
            ))?;
        let rd = RouteDistinguisher::parse(parser)?;
        let prefix = parse_prefix_for_len(parser, prefix_bits, afisafi.afi())?;
        let len = parser.pos() - start;
        parser.seek(start)?;
        let raw = parser.parse_octets(len)?;
        Ok(Self { afisafi, raw, prefix, labels, rd })
    }
}

impl NlriCompose for MplsVpnNlri {
    fn raw(&self) -> &Bytes {
        &self.raw
    }
}

impl fmt::Display for MplsVpnNlri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "rd {} {} label {}", self.rd, self.prefix, self.labels)
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // 10.0.0.0/24 with label 100 and RD 65000:1
    const VPNV4: &[u8] = &[
        0x70,
        0x00, 0x06, 0x41,
        0x00, 0x00, 0xfd, 0xe8, 0x00, 0x00, 0x00, 0x01,
        0x0a, 0x00, 0x00,
    ];

    #[test]
    fn parse_vpnv4() {
        let raw = Bytes::from_static(VPNV4);
        let mut parser = Parser::from_ref(&raw);
        let nlri = MplsVpnNlri::parse(
            &mut parser, AfiSafiType::Ipv4MplsVpnUnicast
        ).unwrap();
        assert_eq!(parser.remaining(), 0);
        assert_eq!(nlri.prefix(), Prefix::from_str("10.0.0.0/24").unwrap());
        assert_eq!(nlri.labels().values(), vec![100]);
        assert_eq!(nlri.rd(), RouteDistinguisher::from_asn2(65000, 1));
        assert_eq!(nlri.to_string(), "rd 65000:1 10.0.0.0/24 label 100");

        let made = MplsVpnNlri::new(
            Prefix::from_str("10.0.0.0/24").unwrap(),
            Labels::from_values(&[100]).unwrap(),
            RouteDistinguisher::from_asn2(65000, 1),
        ).unwrap();
        assert_eq!(made.raw().as_ref(), VPNV4);
        assert_eq!(made, nlri);
    }

    #[test]
    fn length_too_short_for_rd() {
        // 24 label bits + 32 bits, RD does not fit
        let raw = Bytes::from_static(&[
            0x38, 0x00, 0x06, 0x41, 0x00, 0x00, 0xfd, 0xe8,
            0x00, 0x00, 0x00, 0x01,
        ]);
        let mut parser = Parser::from_ref(&raw);
        assert!(
            MplsVpnNlri::parse(&mut parser, AfiSafiType::Ipv4MplsVpnUnicast)
                .is_err()
        );
    }

    #[test]
    fn truncated() {
        let raw = Bytes::from_static(VPNV4);
        for i in 0..raw.len() {
            let part = raw.slice(..i);
            let mut parser = Parser::from_ref(&part);
            assert!(
                MplsVpnNlri::parse(
                    &mut parser, AfiSafiType::Ipv4MplsVpnUnicast
                ).is_err()
            );
        }
    }
}
