use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use inetnum::addr::Prefix;
use octseq::{OctetsBuilder, Parser};

use crate::util::parser::ParseError;
use super::afisafi::Afi;

//------------ Helper functions ----------------------------------------------

pub(crate) fn prefix_bits_to_bytes(bits: u8) -> usize {
    if bits != 0 {
        (bits as usize - 1) / 8 + 1
    } else {
        0
    }
}

/// Maximum prefix length in bits for an address family.
pub(crate) fn afi_max_bits(afi: Afi) -> Result<u8, ParseError> {
    match afi {
        Afi::Ipv4 => Ok(32),
        Afi::Ipv6 => Ok(128),
        _ => Err(ParseError::form_error("unknown prefix format")),
    }
}

/// Builds a prefix from its length and the significant address bytes.
///
/// `bytes` must hold exactly as many octets as `bits` requires. Host bits
/// set in the last octet are rejected, as are lengths exceeding the address
/// width of `afi`.
pub(crate) fn prefix_from_bytes(afi: Afi, bits: u8, bytes: &[u8])
    -> Result<Prefix, ParseError>
{
    if bits > afi_max_bits(afi)? {
        return Err(ParseError::form_error(
            "prefix length exceeds address width"
        ));
    }
    if bytes.len() != prefix_bits_to_bytes(bits) {
        return Err(ParseError::ShortInput);
    }
    let res = match afi {
        Afi::Ipv4 => {
            let mut b = [0u8; 4];
            b[..bytes.len()].copy_from_slice(bytes);
            Prefix::new_v4(Ipv4Addr::from(b), bits)
        }
        _ => {
            let mut b = [0u8; 16];
            b[..bytes.len()].copy_from_slice(bytes);
            Prefix::new_v6(Ipv6Addr::from(b), bits)
        }
    };
    res.map_err(|e| ParseError::form_error(e.static_description()))
}

/// Parses the address bytes of a prefix whose length was already read.
pub(crate) fn parse_prefix_for_len<R: AsRef<[u8]> + ?Sized>(
    parser: &mut Parser<'_, R>,
    prefix_bits: u8,
    afi: Afi
)
    -> Result<Prefix, ParseError>
{
    let max = afi_max_bits(afi)?;
    if prefix_bits > max {
        return Err(ParseError::form_error(
            "prefix length exceeds address width"
        ));
    }
    let prefix_bytes = prefix_bits_to_bytes(prefix_bits);
    let mut b = [0u8; 16];
    parser.parse_buf(&mut b[..prefix_bytes])?;
    prefix_from_bytes(afi, prefix_bits, &b[..prefix_bytes])
}

pub(crate) fn parse_prefix<R: AsRef<[u8]> + ?Sized>(
    parser: &mut Parser<'_, R>,
    afi: Afi
) -> Result<Prefix, ParseError> {
    let prefix_bits = parser.parse_u8()?;
    parse_prefix_for_len(parser, prefix_bits, afi)
}

pub(crate) fn compose_prefix<Target: OctetsBuilder>(
    prefix: Prefix,
    target: &mut Target
) -> Result<(), Target::AppendError> {
    let len = prefix.len();
    target.append_slice(&[len])?;
    compose_prefix_without_len(prefix, target)
}

pub(crate) fn compose_prefix_without_len<Target: OctetsBuilder>(
    prefix: Prefix,
    target: &mut Target
) -> Result<(), Target::AppendError> {
    let prefix_bytes = prefix_bits_to_bytes(prefix.len());
    match prefix.addr() {
        IpAddr::V4(a) => {
            target.append_slice(&a.octets()[..prefix_bytes])
        }
        IpAddr::V6(a) => {
            target.append_slice(&a.octets()[..prefix_bytes])
        }
    }
}

/// Reads a length-prefixed (in bits) IP address as used in EVPN, MVPN and
/// MUP routes, where the length is either 0, 32 or 128.
pub(crate) fn parse_sized_addr<R: AsRef<[u8]> + ?Sized>(
    parser: &mut Parser<'_, R>
) -> Result<Option<IpAddr>, ParseError> {
    match parser.parse_u8()? {
        0 => Ok(None),
        32 => Ok(Some(IpAddr::V4(
            crate::util::parser::parse_ipv4addr(parser)?
        ))),
        128 => Ok(Some(IpAddr::V6(
            crate::util::parser::parse_ipv6addr(parser)?
        ))),
        _ => Err(ParseError::form_error("invalid IP address length")),
    }
}

pub(crate) fn compose_sized_addr(addr: Option<IpAddr>, target: &mut Vec<u8>) {
    match addr {
        None => target.push(0),
        Some(IpAddr::V4(a)) => {
            target.push(32);
            target.extend_from_slice(&a.octets());
        }
        Some(IpAddr::V6(a)) => {
            target.push(128);
            target.extend_from_slice(&a.octets());
        }
    }
}

//------------ Tests ---------------------------------------------------------
