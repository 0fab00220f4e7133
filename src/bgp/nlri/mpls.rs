use std::fmt;

use bytes::Bytes;
use inetnum::addr::Prefix;
use octseq::Parser;

use crate::bgp::message::update_builder::ComposeError;
use crate::util::parser::ParseError;

use super::afisafi::{AfiSafiParse, AfiSafiType, NlriCompose};
use super::common::{compose_prefix_without_len, parse_prefix_for_len};
use super::qualifier::Labels;

/// NLRI comprised of a [`Prefix`] and MPLS [`Labels`], RFC 8277.
///
/// On the wire, the length byte counts the bits of the label stack as well
/// as the prefix bits.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MplsNlri {
    afisafi: AfiSafiType,
    raw: Bytes,
    prefix: Prefix,
    labels: Labels,
}

impl MplsNlri {
    pub fn new(prefix: Prefix, labels: Labels) -> Result<Self, ComposeError> {
        let afisafi = if prefix.is_v4() {
            AfiSafiType::Ipv4MplsUnicast
        } else {
            AfiSafiType::Ipv6MplsUnicast
        };
        let bits = labels.bit_len() + usize::from(prefix.len());
        let len = u8::try_from(bits).map_err(|_|
            ComposeError::InvalidNlri("label stack too long")
        )?;
        let mut buf = Vec::with_capacity(1 + labels.len() + 16);
        buf.push(len);
        let _ = labels.compose(&mut buf);
        let _ = compose_prefix_without_len(prefix, &mut buf);
        Ok(Self { afisafi, raw: Bytes::from(buf), prefix, labels })
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

    /// Parses the length byte and the label stack, returning the stack
    /// and the number of bits left for whatever follows it.
    pub(super) fn parse_labels(parser: &mut Parser<'_, Bytes>)
        -> Result<(Labels, u8), ParseError>
    {
        let prefix_bits = parser.parse_u8()?;
        let labels = Labels::parse(parser)?;

        // With an unexpected path id in front, the label stack could be
        // longer than the prefix length claims. Never wrap around.
        let label_bits = u8::try_from(labels.bit_len())
            .map_err(|_| ParseError::form_error("MplsNlri labels too long"))?;
        let remaining = prefix_bits.checked_sub(label_bits).ok_or(
            ParseError::form_error("prefix length shorter than label stack")
        )?;
        Ok((labels, remaining))
    }
}

impl AfiSafiParse for MplsNlri {
    fn parse(parser: &mut Parser<'_, Bytes>, afisafi: AfiSafiType)
        -> Result<Self, ParseError>
    {
        let start = parser.pos();
        let (labels, prefix_bits) = Self::parse_labels(parser)?;
        let prefix = parse_prefix_for_len(parser, prefix_bits, afisafi.afi())?;
        let len = parser.pos() - start;
        parser.seek(start)?;
        let raw = parser.parse_octets(len)?;
        Ok(Self { afisafi, raw, prefix, labels })
    }
}

impl NlriCompose for MplsNlri {
    fn raw(&self) -> &Bytes {
        &self.raw
    }
}

impl fmt::Display for MplsNlri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} label {}", self.prefix, self.labels)
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn two_label_stack() {
        let raw = Bytes::from_static(&[
            // 48 label bits + 24 prefix bits
            0x48,
            // label 16, no BoS
            0x00, 0x01, 0x00,
            // label 17, BoS
            0x00, 0x01, 0x11,
            // 10.1.2.0/24
            0x0a, 0x01, 0x02,
        ]);
        let mut parser = Parser::from_ref(&raw);
        let nlri = MplsNlri::parse(
            &mut parser, AfiSafiType::Ipv4MplsUnicast
        ).unwrap();
        assert_eq!(parser.remaining(), 0);
        assert_eq!(nlri.labels().values(), vec![16, 17]);
        assert_eq!(nlri.labels().len(), 2 * 3);
        assert_eq!(nlri.prefix(), Prefix::from_str("10.1.2.0/24").unwrap());
        assert_eq!(nlri.to_string(), "10.1.2.0/24 label 16,17");

        let made = MplsNlri::new(
            Prefix::from_str("10.1.2.0/24").unwrap(),
            Labels::from_values(&[16, 17]).unwrap()
        ).unwrap();
        assert_eq!(made, nlri);
    }

    #[test]
    fn label_bits_exceed_length() {
        // length says 16 bits, the stack alone is 24
        let raw = Bytes::from_static(&[0x10, 0x00, 0x01, 0x01, 0x0a]);
        let mut parser = Parser::from_ref(&raw);
        assert!(
            MplsNlri::parse(&mut parser, AfiSafiType::Ipv4MplsUnicast).is_err()
        );
    }

    #[test]
    fn truncated() {
        let raw = Bytes::from_static(&[
            0x30, 0x00, 0x01, 0x01, 0x0a, 0x01, 0x02
        ]);
        for i in 0..raw.len() {
            let part = raw.slice(..i);
            let mut parser = Parser::from_ref(&part);
            assert!(
                MplsNlri::parse(&mut parser, AfiSafiType::Ipv4MplsUnicast)
                    .is_err()
            );
        }
    }
}
