//! Small wire primitives shared by several NLRI families.
//!
//! Route Distinguishers, MPLS label stacks, Ethernet Segment Identifiers,
//! Ethernet Tags and AddPath Path Identifiers all show up in more than one
//! address family, and in the MP_REACH_NLRI next hop.

use std::fmt;
use std::net::Ipv4Addr;

use bytes::Bytes;
use octseq::{OctetsBuilder, Parser};

use crate::typeenum; // from util::macros
use crate::util::parser::ParseError;

//------------ PathId --------------------------------------------------------

/// Path Identifier for BGP Multiple Paths (RFC7911).
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathId(pub u32);

impl PathId {
    pub fn parse<R: AsRef<[u8]> + ?Sized>(parser: &mut Parser<'_, R>)
        -> Result<Self, ParseError>
    {
        Ok(PathId(parser.parse_u32_be()?))
    }

    pub fn compose<Target: OctetsBuilder>(&self, target: &mut Target)
        -> Result<(), Target::AppendError>
    {
        target.append_slice(&self.0.to_be_bytes())
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//------------ RouteDistinguisher --------------------------------------------

typeenum!(
/// Route Distinguisher types as defined in RFC4364.
    RouteDistinguisherType, u16,
    {
        0 => Type0,
        1 => Type1,
        2 => Type2,
    });

/// Route Distinguisher (RD) as defined in RFC4364.
///
/// Used in VPN, FlowSpec-VPN, VPLS, EVPN, MUP and MVPN NLRI and in the
/// MP_REACH_NLRI next hop of VPN families.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteDistinguisher {
    bytes: [u8; 8]
}

impl RouteDistinguisher {
    pub const LEN: usize = 8;

    pub fn new(bytes: [u8; 8]) -> Self {
        RouteDistinguisher { bytes }
    }

    pub fn zeroes() -> Self {
        RouteDistinguisher::new([0u8; 8])
    }

    /// Creates a Type 0 RD, a 2-octet ASN plus a 4-octet number.
    pub fn from_asn2(asn: u16, number: u32) -> Self {
        let mut bytes = [0u8; 8];
        bytes[2..4].copy_from_slice(&asn.to_be_bytes());
        bytes[4..8].copy_from_slice(&number.to_be_bytes());
        Self { bytes }
    }

    /// Creates a Type 1 RD, an IPv4 address plus a 2-octet number.
    pub fn from_ipv4(addr: Ipv4Addr, number: u16) -> Self {
        let mut bytes = [0u8; 8];
        bytes[1] = 1;
        bytes[2..6].copy_from_slice(&addr.octets());
        bytes[6..8].copy_from_slice(&number.to_be_bytes());
        Self { bytes }
    }

    /// Creates a Type 2 RD, a 4-octet ASN plus a 2-octet number.
    pub fn from_asn4(asn: u32, number: u16) -> Self {
        let mut bytes = [0u8; 8];
        bytes[1] = 2;
        bytes[2..6].copy_from_slice(&asn.to_be_bytes());
        bytes[6..8].copy_from_slice(&number.to_be_bytes());
        Self { bytes }
    }

    pub fn parse<R: AsRef<[u8]> + ?Sized>(parser: &mut Parser<'_, R>)
        -> Result<Self, ParseError>
    {
        let mut bytes = [0u8; 8];
        parser.parse_buf(&mut bytes)?;
        Ok(RouteDistinguisher { bytes })
    }

    pub fn skip<R: AsRef<[u8]> + ?Sized>(parser: &mut Parser<'_, R>)
        -> Result<(), ParseError>
    {
        Ok(parser.advance(Self::LEN)?)
    }

    /// Returns the type of this RouteDistinguisher.
    pub fn typ(&self) -> RouteDistinguisherType {
        u16::from_be_bytes([self.bytes[0], self.bytes[1]]).into()
    }

    /// Returns the raw value of this RouteDistinguisher.
    pub fn value(&self) -> [u8; 6] {
        let mut res = [0u8; 6];
        res.copy_from_slice(&self.bytes[2..8]);
        res
    }

    pub fn to_raw(self) -> [u8; 8] {
        self.bytes
    }
}

impl AsRef<[u8]> for RouteDistinguisher {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for RouteDistinguisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.bytes;
        match self.typ() {
            RouteDistinguisherType::Type0 => write!(f, "{}:{}",
                u16::from_be_bytes([b[2], b[3]]),
                u32::from_be_bytes([b[4], b[5], b[6], b[7]])
            ),
            RouteDistinguisherType::Type1 => write!(f, "{}:{}",
                Ipv4Addr::new(b[2], b[3], b[4], b[5]),
                u16::from_be_bytes([b[6], b[7]])
            ),
            RouteDistinguisherType::Type2 => write!(f, "{}L:{}",
                u32::from_be_bytes([b[2], b[3], b[4], b[5]]),
                u16::from_be_bytes([b[6], b[7]])
            ),
            RouteDistinguisherType::Unimplemented(_) => {
                write!(f, "0x")?;
                for o in b {
                    write!(f, "{:02x}", o)?;
                }
                Ok(())
            }
        }
    }
}

//------------ Labels --------------------------------------------------------

/// A single MPLS label stack entry as carried in NLRI.
///
/// Only the 20 bit label value and the bottom-of-stack bit are meaningful
/// in BGP, the 3 bits in between are carried as-is.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Label([u8; 3]);

impl Label {
    pub const MAX: u32 = 0x000f_ffff;

    /// Creates a label entry, truncating `value` to 20 bits.
    pub fn new(value: u32, bottom_of_stack: bool) -> Self {
        let v = (value & Self::MAX) << 4;
        let b = v.to_be_bytes();
        Label([b[1], b[2], b[3] | u8::from(bottom_of_stack)])
    }

    pub fn from_raw(raw: [u8; 3]) -> Self {
        Label(raw)
    }

    pub fn value(self) -> u32 {
        u32::from(self.0[0]) << 12
            | u32::from(self.0[1]) << 4
            | u32::from(self.0[2]) >> 4
    }

    pub fn is_bottom_of_stack(self) -> bool {
        self.0[2] & 0x01 == 0x01
    }

    /// Returns true for the values that end a stack without a BoS bit.
    ///
    /// 0x800000 is the withdraw compatibility value of RFC 3107 and
    /// 0x000000 the one of RFC 8277 section 2.4.
    pub fn is_compat_value(self) -> bool {
        self.0 == [0x80, 0x00, 0x00] || self.0 == [0x00, 0x00, 0x00]
    }

    pub fn ends_stack(self) -> bool {
        self.is_bottom_of_stack() || self.is_compat_value()
    }

    pub fn to_raw(self) -> [u8; 3] {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// MPLS label stack, part of labeled-unicast, VPN and EVPN NLRI.
///
/// The stack is kept in its wire form. It ends at the first entry with the
/// bottom-of-stack bit set, or at one of the compatibility values used in
/// withdrawals.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Labels {
    octets: Bytes
}

impl Labels {
    /// The label 'stack' used in withdrawals, RFC 3107 section 3.
    pub fn withdraw_compat() -> Self {
        Labels { octets: Bytes::from_static(&[0x80, 0x00, 0x00]) }
    }

    /// Builds a stack from label values, setting the BoS bit on the last.
    pub fn from_values(values: &[u32]) -> Result<Self, ParseError> {
        if values.is_empty() {
            return Err(ParseError::form_error("empty label stack"));
        }
        let mut buf = Vec::with_capacity(3 * values.len());
        for (i, v) in values.iter().enumerate() {
            if *v > Label::MAX {
                return Err(ParseError::form_error("label exceeds 20 bits"));
            }
            buf.extend_from_slice(
                &Label::new(*v, i + 1 == values.len()).to_raw()
            );
        }
        Ok(Labels { octets: Bytes::from(buf) })
    }

    pub fn parse(parser: &mut Parser<'_, Bytes>) -> Result<Self, ParseError> {
        let pos = parser.pos();
        let len = Self::skip(parser)?;
        parser.seek(pos)?;
        Ok(Labels { octets: parser.parse_octets(len)? })
    }

    /// Moves the parser past a label stack, returning its length in bytes.
    pub fn skip<R: AsRef<[u8]> + ?Sized>(parser: &mut Parser<'_, R>)
        -> Result<usize, ParseError>
    {
        let mut res = 0;
        let mut buf = [0u8; 3];
        loop {
            //20bits label + 3bits rsvd + S bit
            parser.parse_buf(&mut buf)?;
            res += 3;
            if Label::from_raw(buf).ends_stack() {
                break;
            }
        }
        Ok(res)
    }

    /// Length of the stack in bytes.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.octets.len()
    }

    /// Length of the stack in bits, as counted in the NLRI length field.
    pub fn bit_len(&self) -> usize {
        8 * self.octets.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Label> + '_ {
        self.octets.chunks_exact(3).map(|c| Label([c[0], c[1], c[2]]))
    }

    pub fn values(&self) -> Vec<u32> {
        self.iter().map(Label::value).collect()
    }

    pub fn is_withdraw_compat(&self) -> bool {
        self.octets.len() == 3 && self.iter().all(Label::is_compat_value)
    }

    pub fn compose<Target: OctetsBuilder>(&self, target: &mut Target)
        -> Result<(), Target::AppendError>
    {
        target.append_slice(&self.octets)
    }
}

impl AsRef<[u8]> for Labels {
    fn as_ref(&self) -> &[u8] {
        self.octets.as_ref()
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for l in self.iter() {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}", l)?;
            first = false;
        }
        Ok(())
    }
}

//------------ Esi -----------------------------------------------------------

/// Ethernet Segment Identifier, RFC 7432 section 5.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Esi([u8; 10]);

impl Esi {
    pub const LEN: usize = 10;

    pub fn new(raw: [u8; 10]) -> Self {
        Esi(raw)
    }

    pub fn parse<R: AsRef<[u8]> + ?Sized>(parser: &mut Parser<'_, R>)
        -> Result<Self, ParseError>
    {
        let mut raw = [0u8; 10];
        parser.parse_buf(&mut raw)?;
        Ok(Esi(raw))
    }

    /// The ESI type, first octet.
    pub fn typ(&self) -> u8 {
        self.0[0]
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 10]
    }

    pub fn to_raw(self) -> [u8; 10] {
        self.0
    }
}

impl AsRef<[u8]> for Esi {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Esi {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, o) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}", o)?;
        }
        Ok(())
    }
}

//------------ EthernetTag ---------------------------------------------------

/// Ethernet Tag ID, RFC 7432 section 7.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EthernetTag(pub u32);

impl EthernetTag {
    /// The tag used for route types that are not VLAN aware.
    pub const MAX_ET: EthernetTag = EthernetTag(u32::MAX);

    pub fn parse<R: AsRef<[u8]> + ?Sized>(parser: &mut Parser<'_, R>)
        -> Result<Self, ParseError>
    {
        Ok(EthernetTag(parser.parse_u32_be()?))
    }
}

impl fmt::Display for EthernetTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_stack_with_bos_on_second() {
        // label 16 (no BoS), label 17 (BoS), then a prefix byte
        let raw = Bytes::from_static(&[
            0x00, 0x01, 0x00,
            0x00, 0x01, 0x11,
            0x0a
        ]);
        let mut parser = Parser::from_ref(&raw);
        let labels = Labels::parse(&mut parser).unwrap();
        assert_eq!(labels.len(), 6);
        assert_eq!(labels.values(), vec![16, 17]);
        assert_eq!(parser.pos(), 6);
        assert_eq!(labels.to_string(), "16,17");
    }

    #[test]
    fn label_stack_compat_values() {
        let raw = Bytes::from_static(&[0x80, 0x00, 0x00, 0x18]);
        let mut parser = Parser::from_ref(&raw);
        let labels = Labels::parse(&mut parser).unwrap();
        assert!(labels.is_withdraw_compat());
        assert_eq!(labels, Labels::withdraw_compat());

        let raw = Bytes::from_static(&[0x00, 0x00, 0x00]);
        let mut parser = Parser::from_ref(&raw);
        assert_eq!(Labels::parse(&mut parser).unwrap().len(), 3);
    }

    #[test]
    fn label_stack_without_end_is_short() {
        let raw = Bytes::from_static(&[0x00, 0x01, 0x00, 0x00, 0x02]);
        let mut parser = Parser::from_ref(&raw);
        assert_eq!(Labels::parse(&mut parser), Err(ParseError::ShortInput));
    }

    #[test]
    fn labels_from_values() {
        let labels = Labels::from_values(&[8000, 3]).unwrap();
        assert_eq!(labels.as_ref(), &[0x01, 0xf4, 0x00, 0x00, 0x00, 0x31]);
        assert_eq!(labels.values(), vec![8000, 3]);
        assert!(Labels::from_values(&[]).is_err());
        assert!(Labels::from_values(&[0x10_0000]).is_err());
    }

    #[test]
    fn route_distinguisher_notation() {
        let rd = RouteDistinguisher::from_asn2(65000, 100);
        assert_eq!(rd.typ(), RouteDistinguisherType::Type0);
        assert_eq!(rd.to_raw(), [0, 0, 0xfd, 0xe8, 0, 0, 0, 100]);
        assert_eq!(rd.to_string(), "65000:100");

        let rd = RouteDistinguisher::from_ipv4(Ipv4Addr::new(192, 0, 2, 1), 7);
        assert_eq!(rd.typ(), RouteDistinguisherType::Type1);
        assert_eq!(rd.to_raw(), [0, 1, 192, 0, 2, 1, 0, 7]);
        assert_eq!(rd.to_string(), "192.0.2.1:7");

        let rd = RouteDistinguisher::from_asn4(4200000000, 1);
        assert_eq!(rd.typ(), RouteDistinguisherType::Type2);
        assert_eq!(rd.to_string(), "4200000000L:1");
    }

    #[test]
    fn esi_display() {
        let esi = Esi::new([0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(esi.to_string(), "00:01:02:03:04:05:06:07:08:09");
        assert!(!esi.is_zero());
    }
}
