//! FlowSpec NLRI, RFC 8955 and RFC 8956.
//!
//! A FlowSpec NLRI is a list of match components, ordered by component
//! type. [`FlowSpecNlri`] keeps the wire form; the typed [`Component`]s are
//! recomputed from it on request. New rules are put together with a
//! [`FlowSpecBuilder`], which computes the end-of-list bits and value
//! widths every time it composes, so building is free of side effects and
//! can be repeated.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};

use bytes::Bytes;
use inetnum::addr::Prefix;
use octseq::Parser;

use crate::bgp::message::update_builder::ComposeError;
use crate::typeenum; // from util::macros
use crate::util::parser::ParseError;

use super::afisafi::{Afi, AfiSafiParse, AfiSafiType, NlriCompose, Safi};
use super::common::{prefix_bits_to_bytes, parse_prefix_for_len};
use super::qualifier::RouteDistinguisher;

/// Largest value the 12 bit NLRI length field can carry.
const MAX_LEN: usize = 0x0fff;

typeenum!(
/// FlowSpec component types.
    ComponentType, u8,
    {
        1 => DestinationPrefix,
        2 => SourcePrefix,
        3 => IpProtocol,
        4 => Port,
        5 => DestinationPort,
        6 => SourcePort,
        7 => IcmpType,
        8 => IcmpCode,
        9 => TcpFlags,
        10 => PacketLength,
        11 => Dscp,
        12 => Fragment,
        13 => FlowLabel,
    });

//------------ Operators -----------------------------------------------------

const OP_EOL: u8 = 0x80;
const OP_AND: u8 = 0x40;
const OP_LEN: u8 = 0x30;

fn op_value_len(op: u8) -> usize {
    1 << ((op & OP_LEN) >> 4)
}

fn parse_op_value(parser: &mut Parser<'_, Bytes>, op: u8)
    -> Result<u64, ParseError>
{
    Ok(match op_value_len(op) {
        1 => u64::from(parser.parse_u8()?),
        2 => u64::from(parser.parse_u16_be()?),
        4 => u64::from(parser.parse_u32_be()?),
        _ => parser.parse_u64_be()?,
    })
}

fn compose_op(
    op: u8,
    value: u64,
    last: bool,
    target: &mut Vec<u8>
) {
    let (len_code, bytes): (u8, &[u8]) = match value {
        v if v <= 0xff => (0x00, &value.to_be_bytes()[7..]),
        v if v <= 0xffff => (0x10, &value.to_be_bytes()[6..]),
        v if v <= 0xffff_ffff => (0x20, &value.to_be_bytes()[4..]),
        _ => (0x30, &value.to_be_bytes()[..]),
    };
    let eol = if last { OP_EOL } else { 0 };
    target.push(eol | len_code | op);
    target.extend_from_slice(bytes);
}

/// Numeric operator and value, RFC 8955 section 4.2.1.1.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NumericOp {
    and: bool,
    lt: bool,
    gt: bool,
    eq: bool,
    value: u64,
}

impl NumericOp {
    pub fn new(lt: bool, gt: bool, eq: bool, value: u64) -> Self {
        Self { and: false, lt, gt, eq, value }
    }

    pub fn equal(value: u64) -> Self {
        Self::new(false, false, true, value)
    }

    pub fn not_equal(value: u64) -> Self {
        Self::new(true, true, false, value)
    }

    pub fn greater(value: u64) -> Self {
        Self::new(false, true, false, value)
    }

    pub fn greater_equal(value: u64) -> Self {
        Self::new(false, true, true, value)
    }

    pub fn less(value: u64) -> Self {
        Self::new(true, false, false, value)
    }

    pub fn less_equal(value: u64) -> Self {
        Self::new(true, false, true, value)
    }

    /// Binds this operator to the previous one with a logical AND.
    pub fn and(self) -> Self {
        Self { and: true, ..self }
    }

    pub fn is_and(&self) -> bool {
        self.and
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    fn bits(&self) -> u8 {
        u8::from(self.and) << 6
            | u8::from(self.lt) << 2
            | u8::from(self.gt) << 1
            | u8::from(self.eq)
    }

    fn parse(parser: &mut Parser<'_, Bytes>) -> Result<(Self, bool), ParseError> {
        let op = parser.parse_u8()?;
        if op & 0x08 != 0 {
            return Err(ParseError::form_error(
                "reserved bit set in FlowSpec numeric operator"
            ));
        }
        let value = parse_op_value(parser, op)?;
        Ok((
            Self {
                and: op & OP_AND != 0,
                lt: op & 0x04 != 0,
                gt: op & 0x02 != 0,
                eq: op & 0x01 != 0,
                value
            },
            op & OP_EOL != 0
        ))
    }
}

impl fmt::Display for NumericOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let op = match (self.lt, self.gt, self.eq) {
            (false, false, false) => "false",
            (false, false, true) => "=",
            (false, true, false) => ">",
            (false, true, true) => ">=",
            (true, false, false) => "<",
            (true, false, true) => "<=",
            (true, true, false) => "!=",
            (true, true, true) => "true",
        };
        write!(f, "{}{}", op, self.value)
    }
}

/// Bitmask operator and value, RFC 8955 section 4.2.1.2.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitmaskOp {
    and: bool,
    not: bool,
    matches: bool,
    value: u64,
}

impl BitmaskOp {
    pub fn new(not: bool, matches: bool, value: u64) -> Self {
        Self { and: false, not, matches, value }
    }

    /// Any of the bits in `value` are set.
    pub fn any(value: u64) -> Self {
        Self::new(false, false, value)
    }

    /// All of the bits in `value` are set.
    pub fn all(value: u64) -> Self {
        Self::new(false, true, value)
    }

    pub fn and(self) -> Self {
        Self { and: true, ..self }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    fn bits(&self) -> u8 {
        u8::from(self.and) << 6
            | u8::from(self.not) << 1
            | u8::from(self.matches)
    }

    fn parse(parser: &mut Parser<'_, Bytes>) -> Result<(Self, bool), ParseError> {
        let op = parser.parse_u8()?;
        if op & 0x0c != 0 {
            return Err(ParseError::form_error(
                "reserved bits set in FlowSpec bitmask operator"
            ));
        }
        let value = parse_op_value(parser, op)?;
        Ok((
            Self {
                and: op & OP_AND != 0,
                not: op & 0x02 != 0,
                matches: op & 0x01 != 0,
                value
            },
            op & OP_EOL != 0
        ))
    }
}

impl fmt::Display for BitmaskOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.not {
            write!(f, "!")?;
        }
        if self.matches {
            write!(f, "=")?;
        }
        write!(f, "0x{:02x}", self.value)
    }
}

fn fmt_ops<T: fmt::Display>(
    f: &mut fmt::Formatter,
    ops: &[T],
    is_and: impl Fn(&T) -> bool
) -> fmt::Result {
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            if is_and(op) {
                write!(f, "&")?;
            } else {
                write!(f, " ")?;
            }
        }
        write!(f, "{}", op)?;
    }
    Ok(())
}

//------------ FlowPrefix ----------------------------------------------------

/// Prefix component value.
///
/// For IPv6, RFC 8956 allows to match on the bits from `offset` up to the
/// prefix length only. The bits before the offset are always zero here.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlowPrefix {
    prefix: Prefix,
    offset: u8,
}

impl FlowPrefix {
    pub fn new(prefix: Prefix) -> Self {
        Self { prefix, offset: 0 }
    }

    /// Creates an IPv6 prefix match starting at bit `offset`.
    pub fn with_offset(prefix: Prefix, offset: u8)
        -> Result<Self, ComposeError>
    {
        if offset == 0 {
            return Ok(Self::new(prefix));
        }
        let addr = match prefix.addr() {
            IpAddr::V6(addr) => u128::from(addr),
            IpAddr::V4(_) => return Err(ComposeError::WrongAddressType),
        };
        if offset > prefix.len() {
            return Err(ComposeError::InvalidNlri(
                "prefix offset exceeds prefix length"
            ));
        }
        let mask = u128::MAX.checked_shr(offset.into()).unwrap_or(0);
        let prefix = Prefix::new_v6(Ipv6Addr::from(addr & mask), prefix.len())
            .map_err(|_| ComposeError::InvalidNlri("invalid prefix"))?;
        Ok(Self { prefix, offset })
    }

    pub fn prefix(&self) -> Prefix {
        self.prefix
    }

    pub fn offset(&self) -> u8 {
        self.offset
    }

    fn parse(parser: &mut Parser<'_, Bytes>, afi: Afi)
        -> Result<Self, ParseError>
    {
        let len = parser.parse_u8()?;
        match afi {
            Afi::Ipv4 => Ok(Self {
                prefix: parse_prefix_for_len(parser, len, afi)?,
                offset: 0,
            }),
            Afi::Ipv6 => {
                let offset = parser.parse_u8()?;
                if len > 128 || offset > len {
                    return Err(ParseError::form_error(
                        "invalid FlowSpec IPv6 prefix length or offset"
                    ));
                }
                let mut buf = [0u8; 16];
                let n = prefix_bits_to_bytes(len - offset);
                parser.parse_buf(&mut buf[..n])?;
                let addr = u128::from_be_bytes(buf)
                    .checked_shr(offset.into()).unwrap_or(0);
                let prefix = Prefix::new_v6(Ipv6Addr::from(addr), len)
                    .map_err(|e| ParseError::form_error(
                        e.static_description()
                    ))?;
                Ok(Self { prefix, offset })
            }
            _ => Err(ParseError::Unsupported)
        }
    }

    fn compose(&self, target: &mut Vec<u8>) {
        let len = self.prefix.len();
        target.push(len);
        match self.prefix.addr() {
            IpAddr::V4(addr) => {
                target.extend_from_slice(
                    &addr.octets()[..prefix_bits_to_bytes(len)]
                );
            }
            IpAddr::V6(addr) => {
                target.push(self.offset);
                let bits = u128::from(addr)
                    .checked_shl(self.offset.into()).unwrap_or(0);
                let n = prefix_bits_to_bytes(len - self.offset);
                target.extend_from_slice(&bits.to_be_bytes()[..n]);
            }
        }
    }
}

impl fmt::Display for FlowPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.prefix)?;
        if self.offset > 0 {
            write!(f, " offset {}", self.offset)?;
        }
        Ok(())
    }
}

//------------ Component -----------------------------------------------------

/// A single match component of a FlowSpec rule.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Component {
    DestinationPrefix(FlowPrefix),
    SourcePrefix(FlowPrefix),
    IpProtocol(Vec<NumericOp>),
    Port(Vec<NumericOp>),
    DestinationPort(Vec<NumericOp>),
    SourcePort(Vec<NumericOp>),
    IcmpType(Vec<NumericOp>),
    IcmpCode(Vec<NumericOp>),
    TcpFlags(Vec<BitmaskOp>),
    PacketLength(Vec<NumericOp>),
    Dscp(Vec<NumericOp>),
    Fragment(Vec<BitmaskOp>),
    FlowLabel(Vec<NumericOp>),
}

impl Component {
    pub fn typ(&self) -> ComponentType {
        match self {
            Self::DestinationPrefix(_) => ComponentType::DestinationPrefix,
            Self::SourcePrefix(_) => ComponentType::SourcePrefix,
            Self::IpProtocol(_) => ComponentType::IpProtocol,
            Self::Port(_) => ComponentType::Port,
            Self::DestinationPort(_) => ComponentType::DestinationPort,
            Self::SourcePort(_) => ComponentType::SourcePort,
            Self::IcmpType(_) => ComponentType::IcmpType,
            Self::IcmpCode(_) => ComponentType::IcmpCode,
            Self::TcpFlags(_) => ComponentType::TcpFlags,
            Self::PacketLength(_) => ComponentType::PacketLength,
            Self::Dscp(_) => ComponentType::Dscp,
            Self::Fragment(_) => ComponentType::Fragment,
            Self::FlowLabel(_) => ComponentType::FlowLabel,
        }
    }

    fn parse(parser: &mut Parser<'_, Bytes>, afi: Afi)
        -> Result<Self, ParseError>
    {
        fn numeric(parser: &mut Parser<'_, Bytes>)
            -> Result<Vec<NumericOp>, ParseError>
        {
            let mut res = Vec::new();
            loop {
                let (op, eol) = NumericOp::parse(parser)?;
                res.push(op);
                if eol {
                    return Ok(res);
                }
            }
        }

        fn bitmask(parser: &mut Parser<'_, Bytes>)
            -> Result<Vec<BitmaskOp>, ParseError>
        {
            let mut res = Vec::new();
            loop {
                let (op, eol) = BitmaskOp::parse(parser)?;
                res.push(op);
                if eol {
                    return Ok(res);
                }
            }
        }

        let typ = ComponentType::from(parser.parse_u8()?);
        let res = match typ {
            ComponentType::DestinationPrefix => {
                Self::DestinationPrefix(FlowPrefix::parse(parser, afi)?)
            }
            ComponentType::SourcePrefix => {
                Self::SourcePrefix(FlowPrefix::parse(parser, afi)?)
            }
            ComponentType::IpProtocol => Self::IpProtocol(numeric(parser)?),
            ComponentType::Port => Self::Port(numeric(parser)?),
            ComponentType::DestinationPort => {
                Self::DestinationPort(numeric(parser)?)
            }
            ComponentType::SourcePort => Self::SourcePort(numeric(parser)?),
            ComponentType::IcmpType => Self::IcmpType(numeric(parser)?),
            ComponentType::IcmpCode => Self::IcmpCode(numeric(parser)?),
            ComponentType::TcpFlags => Self::TcpFlags(bitmask(parser)?),
            ComponentType::PacketLength => {
                Self::PacketLength(numeric(parser)?)
            }
            ComponentType::Dscp => Self::Dscp(numeric(parser)?),
            ComponentType::Fragment => Self::Fragment(bitmask(parser)?),
            ComponentType::FlowLabel => {
                if afi != Afi::Ipv6 {
                    return Err(ParseError::form_error(
                        "FlowSpec flow label component in IPv4 rule"
                    ));
                }
                Self::FlowLabel(numeric(parser)?)
            }
            ComponentType::Unimplemented(_) => {
                return Err(ParseError::form_error(
                    "unknown FlowSpec component type"
                ))
            }
        };
        Ok(res)
    }

    fn compose(&self, target: &mut Vec<u8>) -> Result<(), ComposeError> {
        fn numeric(ops: &[NumericOp], target: &mut Vec<u8>) {
            for (i, op) in ops.iter().enumerate() {
                compose_op(op.bits(), op.value, i + 1 == ops.len(), target);
            }
        }
        fn bitmask(ops: &[BitmaskOp], target: &mut Vec<u8>) {
            for (i, op) in ops.iter().enumerate() {
                compose_op(op.bits(), op.value, i + 1 == ops.len(), target);
            }
        }

        let empty = match self {
            Self::DestinationPrefix(_) | Self::SourcePrefix(_) => false,
            Self::TcpFlags(ops) | Self::Fragment(ops) => ops.is_empty(),
            Self::IpProtocol(ops) | Self::Port(ops) |
            Self::DestinationPort(ops) | Self::SourcePort(ops) |
            Self::IcmpType(ops) | Self::IcmpCode(ops) |
            Self::PacketLength(ops) | Self::Dscp(ops) |
            Self::FlowLabel(ops) => ops.is_empty(),
        };
        if empty {
            return Err(ComposeError::InvalidNlri(
                "FlowSpec component without operators"
            ));
        }

        target.push(self.typ().into());
        match self {
            Self::DestinationPrefix(p) | Self::SourcePrefix(p) => {
                p.compose(target)
            }
            Self::TcpFlags(ops) | Self::Fragment(ops) => bitmask(ops, target),
            Self::IpProtocol(ops) | Self::Port(ops) |
            Self::DestinationPort(ops) | Self::SourcePort(ops) |
            Self::IcmpType(ops) | Self::IcmpCode(ops) |
            Self::PacketLength(ops) | Self::Dscp(ops) |
            Self::FlowLabel(ops) => numeric(ops, target),
        }
        Ok(())
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::DestinationPrefix(p) => return write!(f, "dst {}", p),
            Self::SourcePrefix(p) => return write!(f, "src {}", p),
            Self::TcpFlags(ops) => {
                write!(f, "tcp-flags ")?;
                return fmt_ops(f, ops, |op| op.and);
            }
            Self::Fragment(ops) => {
                write!(f, "fragment ")?;
                return fmt_ops(f, ops, |op| op.and);
            }
            Self::IpProtocol(_) => "proto",
            Self::Port(_) => "port",
            Self::DestinationPort(_) => "dport",
            Self::SourcePort(_) => "sport",
            Self::IcmpType(_) => "icmp-type",
            Self::IcmpCode(_) => "icmp-code",
            Self::PacketLength(_) => "len",
            Self::Dscp(_) => "dscp",
            Self::FlowLabel(_) => "flow-label",
        };
        match self {
            Self::IpProtocol(ops) | Self::Port(ops) |
            Self::DestinationPort(ops) | Self::SourcePort(ops) |
            Self::IcmpType(ops) | Self::IcmpCode(ops) |
            Self::PacketLength(ops) | Self::Dscp(ops) |
            Self::FlowLabel(ops) => {
                write!(f, "{} ", name)?;
                fmt_ops(f, ops, |op| op.and)
            }
            _ => Ok(())
        }
    }
}

//------------ FlowSpecNlri --------------------------------------------------

/// NLRI containing a FlowSpec rule, optionally preceded by an RD.
///
/// The raw form includes the one or two byte length field.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FlowSpecNlri {
    afisafi: AfiSafiType,
    raw: Bytes,
}

impl FlowSpecNlri {
    pub fn afisafi(&self) -> AfiSafiType {
        self.afisafi
    }

    fn is_vpn(afisafi: AfiSafiType) -> bool {
        afisafi.safi() == Safi::FlowSpecVpn
    }

    /// Returns the part after the length field.
    fn body(&self) -> Bytes {
        let hdr = if self.raw.first().is_some_and(|b| *b >= 0xf0) {
            2
        } else {
            1
        };
        self.raw.slice(hdr.min(self.raw.len())..)
    }

    /// Returns the Route Distinguisher of a FlowSpec VPN rule.
    pub fn rd(&self) -> Option<RouteDistinguisher> {
        if !Self::is_vpn(self.afisafi) {
            return None;
        }
        let body = self.body();
        let mut parser = Parser::from_ref(&body);
        RouteDistinguisher::parse(&mut parser).ok()
    }

    /// Decodes the match components.
    pub fn components(&self) -> Result<Vec<Component>, ParseError> {
        Self::decode_body(&self.body(), self.afisafi).map(|(_, c)| c)
    }

    fn decode_body(body: &Bytes, afisafi: AfiSafiType)
        -> Result<(Option<RouteDistinguisher>, Vec<Component>), ParseError>
    {
        let mut parser = Parser::from_ref(body);
        let rd = if Self::is_vpn(afisafi) {
            Some(RouteDistinguisher::parse(&mut parser)?)
        } else {
            None
        };
        let afi = afisafi.afi();
        let mut res: Vec<Component> = Vec::new();
        while parser.remaining() > 0 {
            let c = Component::parse(&mut parser, afi)?;
            if let Some(prev) = res.last() {
                if u8::from(prev.typ()) >= u8::from(c.typ()) {
                    return Err(ParseError::form_error(
                        "FlowSpec components not in increasing type order"
                    ));
                }
            }
            res.push(c);
        }
        Ok((rd, res))
    }

    fn compose_len_field(len: usize, target: &mut Vec<u8>) {
        if len < 0xf0 {
            target.push(len as u8);
        } else {
            target.extend_from_slice(&(0xf000 | len as u16).to_be_bytes());
        }
    }
}

impl AfiSafiParse for FlowSpecNlri {
    fn parse(parser: &mut Parser<'_, Bytes>, afisafi: AfiSafiType)
        -> Result<Self, ParseError>
    {
        let start = parser.pos();
        let len1 = parser.parse_u8()?;
        let len = if len1 >= 0xf0 {
            let len2 = parser.parse_u8()?;
            (usize::from(len1 & 0x0f) << 8) | usize::from(len2)
        } else {
            usize::from(len1)
        };
        let body = parser.parse_octets(len)?;
        Self::decode_body(&body, afisafi)?;
        let total = parser.pos() - start;
        parser.seek(start)?;
        let raw = parser.parse_octets(total)?;
        Ok(Self { afisafi, raw })
    }
}

impl NlriCompose for FlowSpecNlri {
    fn raw(&self) -> &Bytes {
        &self.raw
    }
}

impl fmt::Display for FlowSpecNlri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "flow")?;
        if let Some(rd) = self.rd() {
            write!(f, " rd {}", rd)?;
        }
        match self.components() {
            Ok(components) => {
                for c in components {
                    write!(f, " {}", c)?;
                }
                Ok(())
            }
            Err(_) => write!(f, " <invalid>")
        }
    }
}

//------------ FlowSpecBuilder -----------------------------------------------

/// Collects the components of a FlowSpec rule.
///
/// Components can be added in any order. They are put in type order when
/// composing, which happens into a fresh buffer on every call to
/// [`build`][Self::build].
#[derive(Clone, Debug)]
pub struct FlowSpecBuilder {
    afisafi: AfiSafiType,
    rd: Option<RouteDistinguisher>,
    components: Vec<Component>,
}

impl FlowSpecBuilder {
    pub fn new(afisafi: AfiSafiType) -> Result<Self, ComposeError> {
        match afisafi.safi() {
            Safi::FlowSpec | Safi::FlowSpecVpn => {
                Ok(Self { afisafi, rd: None, components: Vec::new() })
            }
            _ => Err(ComposeError::IllegalCombination)
        }
    }

    pub fn rd(&mut self, rd: RouteDistinguisher) -> &mut Self {
        self.rd = Some(rd);
        self
    }

    pub fn add(&mut self, component: Component) -> &mut Self {
        self.components.push(component);
        self
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn build(&self) -> Result<FlowSpecNlri, ComposeError> {
        let vpn = FlowSpecNlri::is_vpn(self.afisafi);
        let mut body = Vec::new();
        match (vpn, self.rd) {
            (true, Some(rd)) => body.extend_from_slice(rd.as_ref()),
            (false, None) => { }
            _ => return Err(ComposeError::IllegalCombination)
        }

        let mut sorted: Vec<&Component> = self.components.iter().collect();
        sorted.sort_by_key(|c| u8::from(c.typ()));
        for pair in sorted.windows(2) {
            if pair[0].typ() == pair[1].typ() {
                return Err(ComposeError::InvalidNlri(
                    "duplicate FlowSpec component type"
                ));
            }
        }
        for c in sorted {
            match c {
                Component::DestinationPrefix(p) |
                Component::SourcePrefix(p) => {
                    let v4 = self.afisafi.afi() == Afi::Ipv4;
                    if p.prefix().is_v4() != v4 {
                        return Err(ComposeError::WrongAddressType);
                    }
                }
                Component::FlowLabel(_) if self.afisafi.afi() != Afi::Ipv6 => {
                    return Err(ComposeError::IllegalCombination);
                }
                _ => { }
            }
            c.compose(&mut body)?;
        }

        if body.len() > MAX_LEN {
            return Err(ComposeError::InvalidNlri("FlowSpec rule too long"));
        }
        let mut raw = Vec::with_capacity(2 + body.len());
        FlowSpecNlri::compose_len_field(body.len(), &mut raw);
        raw.extend_from_slice(&body);
        Ok(FlowSpecNlri { afisafi: self.afisafi, raw: Bytes::from(raw) })
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn parse(raw: &'static [u8], afisafi: AfiSafiType)
        -> Result<FlowSpecNlri, ParseError>
    {
        let raw = Bytes::from_static(raw);
        let mut parser = Parser::from_ref(&raw);
        FlowSpecNlri::parse(&mut parser, afisafi)
    }

    #[test]
    fn parse_ipv4() {
        let nlri = parse(&[
            0x0c,
            // destination 10.0.0.0/24
            0x01, 0x18, 0x0a, 0x00, 0x00,
            // protocol =6
            0x03, 0x81, 0x06,
            // destination port =80, as two byte value
            0x05, 0x91, 0x00, 0x50,
        ], AfiSafiType::Ipv4FlowSpec).unwrap();

        let components = nlri.components().unwrap();
        assert_eq!(components, vec![
            Component::DestinationPrefix(
                FlowPrefix::new(Prefix::from_str("10.0.0.0/24").unwrap())
            ),
            Component::IpProtocol(vec![NumericOp::equal(6)]),
            Component::DestinationPort(vec![NumericOp::equal(80)]),
        ]);
        assert_eq!(nlri.rd(), None);
        assert_eq!(nlri.to_string(), "flow dst 10.0.0.0/24 proto =6 dport =80");
    }

    #[test]
    fn build_ipv4() {
        let mut builder = FlowSpecBuilder::new(AfiSafiType::Ipv4FlowSpec)
            .unwrap();
        builder
            .add(Component::DestinationPort(vec![
                NumericOp::greater_equal(80),
                NumericOp::less_equal(90).and(),
            ]))
            .add(Component::DestinationPrefix(
                FlowPrefix::new(Prefix::from_str("10.0.0.0/24").unwrap())
            ))
            .add(Component::IpProtocol(vec![NumericOp::equal(6)]));

        let nlri = builder.build().unwrap();
        assert_eq!(nlri.raw().as_ref(), &[
            0x0d,
            0x01, 0x18, 0x0a, 0x00, 0x00,
            0x03, 0x81, 0x06,
            0x05, 0x03, 0x50, 0xc5, 0x5a,
        ]);
        // composing again gives the very same bytes
        assert_eq!(builder.build().unwrap(), nlri);
        assert_eq!(
            nlri.to_string(),
            "flow dst 10.0.0.0/24 proto =6 dport >=80&<=90"
        );

        let raw = nlri.raw().clone();
        let mut parser = Parser::from_ref(&raw);
        let parsed = FlowSpecNlri::parse(
            &mut parser, AfiSafiType::Ipv4FlowSpec
        ).unwrap();
        assert_eq!(parsed, nlri);
    }

    #[test]
    fn build_rejects() {
        let mut builder = FlowSpecBuilder::new(AfiSafiType::Ipv4FlowSpec)
            .unwrap();
        builder.add(Component::Port(vec![NumericOp::equal(1)]));
        builder.add(Component::Port(vec![NumericOp::equal(2)]));
        assert!(builder.build().is_err());

        let mut builder = FlowSpecBuilder::new(AfiSafiType::Ipv4FlowSpec)
            .unwrap();
        builder.add(Component::DestinationPrefix(
            FlowPrefix::new(Prefix::from_str("2001:db8::/32").unwrap())
        ));
        assert!(matches!(
            builder.build(),
            Err(ComposeError::WrongAddressType)
        ));

        let mut builder = FlowSpecBuilder::new(AfiSafiType::Ipv4FlowSpecVpn)
            .unwrap();
        builder.add(Component::IpProtocol(vec![NumericOp::equal(17)]));
        // VPN rules need an RD
        assert!(builder.build().is_err());

        assert!(FlowSpecBuilder::new(AfiSafiType::Ipv4Unicast).is_err());
    }

    #[test]
    fn two_byte_length() {
        let mut builder = FlowSpecBuilder::new(AfiSafiType::Ipv4FlowSpec)
            .unwrap();
        builder.add(Component::Port(
            (0..130).map(NumericOp::equal).collect()
        ));
        let nlri = builder.build().unwrap();
        // 1 type byte and 130 two byte operators
        assert_eq!(&nlri.raw()[..2], &[0xf1, 0x05]);
        assert_eq!(nlri.raw().len(), 2 + 261);

        let raw = nlri.raw().clone();
        let mut parser = Parser::from_ref(&raw);
        let parsed = FlowSpecNlri::parse(
            &mut parser, AfiSafiType::Ipv4FlowSpec
        ).unwrap();
        assert_eq!(parser.remaining(), 0);
        assert_eq!(parsed.components().unwrap(), builder.components());
    }

    #[test]
    fn vpn_rule() {
        let nlri = parse(&[
            0x0b,
            0x00, 0x00, 0xfd, 0xe8, 0x00, 0x00, 0x00, 0x07,
            0x03, 0x81, 0x11,
        ], AfiSafiType::Ipv4FlowSpecVpn).unwrap();
        assert_eq!(nlri.rd(), Some(RouteDistinguisher::from_asn2(65000, 7)));
        assert_eq!(
            nlri.components().unwrap(),
            vec![Component::IpProtocol(vec![NumericOp::equal(17)])]
        );

        let mut builder = FlowSpecBuilder::new(AfiSafiType::Ipv4FlowSpecVpn)
            .unwrap();
        builder
            .rd(RouteDistinguisher::from_asn2(65000, 7))
            .add(Component::IpProtocol(vec![NumericOp::equal(17)]));
        assert_eq!(builder.build().unwrap(), nlri);
    }

    #[test]
    fn ipv6_offset() {
        let fp = FlowPrefix::with_offset(
            Prefix::from_str("2001:db8::/32").unwrap(), 16
        ).unwrap();
        assert_eq!(fp.prefix(), Prefix::from_str("0:db8::/32").unwrap());

        let mut builder = FlowSpecBuilder::new(AfiSafiType::Ipv6FlowSpec)
            .unwrap();
        builder.add(Component::DestinationPrefix(fp));
        let nlri = builder.build().unwrap();
        assert_eq!(
            nlri.raw().as_ref(),
            &[0x05, 0x01, 0x20, 0x10, 0x0d, 0xb8]
        );
        assert_eq!(
            nlri.components().unwrap(),
            vec![Component::DestinationPrefix(fp)]
        );

        let nlri = parse(
            &[0x07, 0x01, 0x20, 0x00, 0x20, 0x01, 0x0d, 0xb8],
            AfiSafiType::Ipv6FlowSpec
        ).unwrap();
        assert_eq!(
            nlri.components().unwrap(),
            vec![Component::DestinationPrefix(FlowPrefix::new(
                Prefix::from_str("2001:db8::/32").unwrap()
            ))]
        );
    }

    #[test]
    fn invalid_rules() {
        // out of order
        assert!(parse(
            &[0x06, 0x05, 0x81, 0x50, 0x03, 0x81, 0x06],
            AfiSafiType::Ipv4FlowSpec
        ).is_err());
        // unknown component type
        assert!(parse(&[0x03, 0x20, 0x81, 0x06], AfiSafiType::Ipv4FlowSpec)
            .is_err());
        // flow label in IPv4
        assert!(parse(&[0x03, 0x0d, 0x81, 0x06], AfiSafiType::Ipv4FlowSpec)
            .is_err());
        // operator list without end-of-list
        assert!(parse(&[0x03, 0x03, 0x01, 0x06], AfiSafiType::Ipv4FlowSpec)
            .is_err());
    }

    #[test]
    fn truncated() {
        let raw: &[u8] = &[
            0x0c,
            0x01, 0x18, 0x0a, 0x00, 0x00,
            0x03, 0x81, 0x06,
            0x05, 0x91, 0x00, 0x50,
        ];
        for i in 0..raw.len() {
            let part = Bytes::copy_from_slice(&raw[..i]);
            let mut parser = Parser::from_ref(&part);
            assert!(
                FlowSpecNlri::parse(&mut parser, AfiSafiType::Ipv4FlowSpec)
                    .is_err()
            );
        }
    }
}
