use std::fmt;

use bytes::Bytes;
use octseq::Parser;

use crate::util::parser::ParseError;

use super::afisafi::{AfiSafiParse, AfiSafiType, NlriCompose};
use super::qualifier::RouteDistinguisher;

/// VPLS Information as defined in RFC 4761.
///
/// The wire form has a fixed length of 19 bytes, the first two of which
/// are the length field itself, always 17.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct VplsNlri {
    raw: Bytes,
}

impl VplsNlri {
    const BODY_LEN: u16 = 17;

    pub fn new(
        rd: RouteDistinguisher,
        ve_id: u16,
        ve_block_offset: u16,
        ve_block_size: u16,
        label_base: u32,
    ) -> Self {
        let mut raw = Vec::with_capacity(19);
        raw.extend_from_slice(&Self::BODY_LEN.to_be_bytes());
        raw.extend_from_slice(rd.as_ref());
        raw.extend_from_slice(&ve_id.to_be_bytes());
        raw.extend_from_slice(&ve_block_offset.to_be_bytes());
        raw.extend_from_slice(&ve_block_size.to_be_bytes());
        // 20 bit label base, reserved bits and the BoS bit
        raw.extend_from_slice(&((label_base & 0x000f_ffff) << 4 | 1)
            .to_be_bytes()[1..]
        );
        Self { raw: Bytes::from(raw) }
    }

    fn field(&self, at: usize) -> u16 {
        // Length checked on construction.
        u16::from_be_bytes([self.raw[at], self.raw[at + 1]])
    }

    pub fn rd(&self) -> RouteDistinguisher {
        let mut rd = [0u8; 8];
        rd.copy_from_slice(&self.raw[2..10]);
        RouteDistinguisher::new(rd)
    }

    pub fn ve_id(&self) -> u16 {
        self.field(10)
    }

    pub fn ve_block_offset(&self) -> u16 {
        self.field(12)
    }

    pub fn ve_block_size(&self) -> u16 {
        self.field(14)
    }

    /// The raw 24 bits of the label base field.
    pub fn raw_label_base(&self) -> u32 {
        u32::from(self.raw[16]) << 16 | u32::from(self.field(17))
    }

    pub fn label_base(&self) -> u32 {
        self.raw_label_base() >> 4
    }
}

impl AfiSafiParse for VplsNlri {
    fn parse(parser: &mut Parser<'_, Bytes>, _afisafi: AfiSafiType)
        -> Result<Self, ParseError>
    {
        let start = parser.pos();
        let len = parser.parse_u16_be()?;
        if len != Self::BODY_LEN {
            return Err(ParseError::form_error("invalid VPLS NLRI length"));
        }
        parser.advance(len.into())?;
        parser.seek(start)?;
        let raw = parser.parse_octets(2 + usize::from(len))?;
        Ok(Self { raw })
    }
}

impl NlriCompose for VplsNlri {
    fn raw(&self) -> &Bytes {
        &self.raw
    }
}

impl fmt::Display for VplsNlri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "VPLS rd {} ve-id {} offset {} size {} label {}",
            self.rd(), self.ve_id(), self.ve_block_offset(),
            self.ve_block_size(), self.label_base()
        )
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VPLS: &[u8] = &[
        0x00, 0x11,
        0x00, 0x00, 0xfd, 0xe8, 0x00, 0x00, 0x00, 0x01,
        0x00, 0x03, 0x00, 0x01, 0x00, 0x08,
        0x01, 0x86, 0xa1,
    ];

    #[test]
    fn parse_and_make() {
        let raw = Bytes::from_static(VPLS);
        let mut parser = Parser::from_ref(&raw);
        let nlri = VplsNlri::parse(&mut parser, AfiSafiType::L2VpnVpls)
            .unwrap();
        assert_eq!(nlri.rd(), RouteDistinguisher::from_asn2(65000, 1));
        assert_eq!(nlri.ve_id(), 3);
        assert_eq!(nlri.ve_block_offset(), 1);
        assert_eq!(nlri.ve_block_size(), 8);
        assert_eq!(nlri.label_base(), 0x186a);
        assert_eq!(
            nlri,
            VplsNlri::new(RouteDistinguisher::from_asn2(65000, 1), 3, 1, 8,
                0x186a)
        );
    }

    #[test]
    fn bad_length() {
        let mut raw = VPLS.to_vec();
        raw[1] = 0x10;
        let raw = Bytes::from(raw);
        let mut parser = Parser::from_ref(&raw);
        assert!(VplsNlri::parse(&mut parser, AfiSafiType::L2VpnVpls).is_err());

        for i in 0..VPLS.len() {
            let part = Bytes::copy_from_slice(&VPLS[..i]);
            let mut parser = Parser::from_ref(&part);
            assert!(
                VplsNlri::parse(&mut parser, AfiSafiType::L2VpnVpls).is_err()
            );
        }
    }
}
