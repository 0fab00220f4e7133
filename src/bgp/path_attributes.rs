//! BGP path attributes.
//!
//! A [`PathAttribute`] is kept in its wire form: flags, type code and the
//! packed value. The typed value is decoded on demand via
//! [`PathAttribute::decode`] or [`PathAttribute::get`] and never cached, so
//! it can not disagree with the packed bytes.
//!
//! The registry at the bottom of this module ties every supported type code
//! to its value type, its expected flags and the action RFC 7606 prescribes
//! when it turns out to be malformed. Anything not in the registry is kept
//! as an opaque attribute and re-encoded unchanged.
//!
//! [`PaMap`] is the path attribute section of one UPDATE message.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use bytes::Bytes;
use inetnum::asn::Asn;
use log::debug;
use octseq::Parser;

use crate::bgp::aspath::{AsPath, AS_TRANS};
use crate::bgp::attribute_cache;
use crate::bgp::communities::{
    ExtendedCommunity, LargeCommunity, StandardCommunity
};
use crate::bgp::message::nlri_collection::{MpReachNlri, MpUnreachNlri};
use crate::bgp::message::notification::UpdateMessageError;
use crate::bgp::message::update_builder::ComposeError;
use crate::bgp::message::SessionConfig;
use crate::bgp::nlri::Label;
use crate::bgp::types::{
    Aggregator, As4Aggregator, As4Path, AtomicAggregate, BgpLsAttribute,
    ClusterList, ConventionalNextHop, ExtendedCommunities, LargeCommunities,
    LocalPref, LsAttributeTlv, MultiExitDisc, OriginType, OriginatorId, Otc,
    PmsiTunnel, StandardCommunities,
};
use crate::util::parser::{check_exhausted, parse_ipv4addr, ParseError};

//------------ Flags ---------------------------------------------------------

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Flags(u8);

impl Flags {
    // 0 1 2 3 4 5 6 7
    //
    // 0: optional (1 == optional)
    // 1: transitive (1 == transitive) (well-known attr are transitive)
    // 2: partial
    // 3: extended length (0 -> 1 byte length, 1 -> 2 byte length)
    // 4-7: MUST be 0 when sent, ignored when received
    pub const OPT_NON_TRANS: Flags = Flags(0b1000_0000);
    pub const OPT_TRANS: Flags     = Flags(0b1100_0000);
    pub const WELLKNOWN: Flags     = Flags(0b0100_0000);

    const EXTENDED_LEN: u8  = 0b0001_0000;
    const PARTIAL: u8       = 0b0010_0000;

    /// Returns true if the optional flag is set.
    pub fn is_optional(self) -> bool {
        self.0 & 0x80 == 0x80
    }

    /// Returns true if the transitive bit is set.
    pub fn is_transitive(self) -> bool {
        self.0 & 0x40 == 0x40
    }

    /// Returns true if the partial flag is set.
    pub fn is_partial(self) -> bool {
        self.0 & Self::PARTIAL == Self::PARTIAL
    }

    /// Returns true if the extended length flag is set.
    pub fn is_extended_length(self) -> bool {
        self.0 & Self::EXTENDED_LEN == Self::EXTENDED_LEN
    }

    pub fn with_partial(self) -> Self {
        Flags(self.0 | Self::PARTIAL)
    }

    // Returns the flags with the extended length bit matching `len`.
    fn for_len(self, len: usize) -> Self {
        if len > 255 {
            Flags(self.0 | Self::EXTENDED_LEN)
        } else {
            Flags(self.0 & !Self::EXTENDED_LEN)
        }
    }

    // Optional and transitive bits, the ones RFC 7606 section 3 (c) checks.
    fn category(self) -> u8 {
        self.0 & 0xc0
    }
}

impl From<u8> for Flags {
    fn from(u: u8) -> Flags {
        Flags(u)
    }
}

impl From<Flags> for u8 {
    fn from(f: Flags) -> u8 {
        f.0
    }
}

//------------ ErrorAction ---------------------------------------------------

/// What to do with an UPDATE carrying a malformed attribute, RFC 7606.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorAction {
    /// Keep the session, withdraw every NLRI the message announces.
    TreatAsWithdraw,

    /// Keep the session and the routes, drop the attribute.
    AttributeDiscard,

    /// The message can not be interpreted at all.
    SessionReset,
}

//------------ Attribute -----------------------------------------------------

/// A typed path attribute value.
///
/// `parse_value` is handed a parser over exactly the attribute value and
/// does not need to check for trailing bytes, the caller does that.
pub trait Attribute: Sized {
    const TYPE: PathAttributeType;

    fn parse_value(
        parser: &mut Parser<'_, Bytes>,
        config: &SessionConfig,
    ) -> Result<Self, ParseError>;

    fn compose_value(
        &self,
        target: &mut Vec<u8>,
        config: &SessionConfig,
    ) -> Result<(), ComposeError>;
}

//------------ PathAttribute -------------------------------------------------

/// A single path attribute in wire format.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PathAttribute {
    flags: Flags,
    type_code: u8,
    value: Bytes,
}

impl PathAttribute {
    /// Packs a typed value into a new attribute with the default flags.
    pub fn new<A: Attribute>(value: &A, config: &SessionConfig)
        -> Result<Self, ComposeError>
    {
        let mut buf = Vec::new();
        value.compose_value(&mut buf, config)?;
        Self::from_parts(A::TYPE.flags(), A::TYPE.into(), buf.into())
    }

    /// Creates an attribute from its parts.
    ///
    /// The extended length flag is set according to the length of `value`.
    pub fn from_parts(flags: Flags, type_code: u8, value: Bytes)
        -> Result<Self, ComposeError>
    {
        if value.len() > usize::from(u16::MAX) {
            return Err(ComposeError::AttributeTooLarge(
                type_code.into(), value.len()
            ));
        }
        Ok(Self {
            flags: flags.for_len(value.len()),
            type_code,
            value: attribute_cache::intern(type_code, value),
        })
    }

    /// Parses one attribute TLV.
    ///
    /// Only the framing is checked here. A TLV claiming more bytes than
    /// are left is an Attribute Length Error.
    pub fn parse(parser: &mut Parser<'_, Bytes>) -> Result<Self, ParseError> {
        let overrun = || ParseError::update_error(
            UpdateMessageError::AttributeLengthError,
            "attribute length exceeds remaining bytes"
        );
        if parser.remaining() < 3 {
            return Err(overrun());
        }
        let flags = Flags(parser.parse_u8()?);
        let type_code = parser.parse_u8()?;
        let len: usize = if flags.is_extended_length() {
            if parser.remaining() < 2 {
                return Err(overrun());
            }
            parser.parse_u16_be()?.into()
        } else {
            parser.parse_u8()?.into()
        };
        if parser.remaining() < len {
            return Err(overrun());
        }
        let value = parser.parse_octets(len)?;
        Ok(Self {
            flags,
            type_code,
            value: attribute_cache::intern(type_code, value),
        })
    }

    pub fn typ(&self) -> PathAttributeType {
        self.type_code.into()
    }

    pub fn type_code(&self) -> u8 {
        self.type_code
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Returns a copy with the partial bit set.
    pub fn into_partial(self) -> Self {
        Self { flags: self.flags.with_partial(), ..self }
    }

    /// Decodes the attribute into its typed value.
    ///
    /// Unknown type codes decode into an opaque
    /// [`AttributeValue::Unimplemented`].
    pub fn decode(&self, config: &SessionConfig)
        -> Result<AttributeValue, ParseError>
    {
        let mut parser = Parser::from_ref(&self.value);
        match AttributeValue::parse_known(self.typ(), &mut parser, config) {
            Some(Ok(value)) => {
                self.check_trailing(&parser)?;
                Ok(value)
            }
            Some(Err(e)) => Err(self.classify(e)),
            None => Ok(AttributeValue::Unimplemented(UnimplementedAttribute {
                flags: self.flags,
                type_code: self.type_code,
                value: self.value.clone(),
            })),
        }
    }

    /// Decodes the attribute as `A`.
    pub fn get<A: Attribute>(&self, config: &SessionConfig)
        -> Result<A, ParseError>
    {
        if self.typ() != A::TYPE {
            return Err(ParseError::form_error("attribute type mismatch"));
        }
        let mut parser = Parser::from_ref(&self.value);
        let res = A::parse_value(&mut parser, config)
            .map_err(|e| self.classify(e))?;
        self.check_trailing(&parser)?;
        Ok(res)
    }

    /// Checks the flags of a recognized attribute, RFC 7606 section 3 (c).
    pub fn check_flags(&self) -> Result<(), ParseError> {
        let typ = self.typ();
        if typ.is_known() && typ.flags().category() != self.flags.category() {
            return Err(ParseError::update_error(
                UpdateMessageError::AttributeFlagsError,
                "unexpected attribute flags"
            ));
        }
        Ok(())
    }

    /// Checks flags and value of this attribute.
    ///
    /// An unknown attribute marked well-known is an error, an unknown
    /// optional one is fine.
    pub fn validate(&self, config: &SessionConfig) -> Result<(), ParseError> {
        if !self.typ().is_known() {
            if !self.flags.is_optional() {
                return Err(ParseError::update_error(
                    UpdateMessageError::UnrecognizedWellknownAttribute,
                    "unrecognized well-known attribute"
                ));
            }
            return Ok(());
        }
        self.check_flags()?;
        self.decode(config).map(|_| ())
    }

    fn check_trailing(&self, parser: &Parser<'_, Bytes>)
        -> Result<(), ParseError>
    {
        check_exhausted(parser, "trailing bytes in attribute").map_err(|_|
            ParseError::update_error(
                UpdateMessageError::AttributeLengthError,
                "trailing bytes in attribute"
            )
        )
    }

    fn classify(&self, err: ParseError) -> ParseError {
        match err {
            ParseError::ShortInput => ParseError::update_error(
                UpdateMessageError::AttributeLengthError,
                "attribute value too short"
            ),
            e => e.in_update(self.typ().error_subcode(self.flags)),
        }
    }

    fn header_len(&self) -> usize {
        if self.flags.is_extended_length() { 4 } else { 3 }
    }

    pub fn compose_len(&self) -> usize {
        self.header_len() + self.value.len()
    }

    pub fn compose(&self, target: &mut Vec<u8>) {
        target.push(self.flags.0);
        target.push(self.type_code);
        if self.flags.is_extended_length() {
            // from_parts and parse keep the length within u16
            target.extend_from_slice(&(self.value.len() as u16).to_be_bytes());
        } else {
            target.push(self.value.len() as u8);
        }
        target.extend_from_slice(&self.value);
    }

    /// Returns the whole TLV.
    pub fn packed(&self) -> Bytes {
        let mut buf = Vec::with_capacity(self.compose_len());
        self.compose(&mut buf);
        buf.into()
    }
}

//------------ UnimplementedAttribute ----------------------------------------

/// An attribute of a type code not in the registry.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct UnimplementedAttribute {
    flags: Flags,
    type_code: u8,
    value: Bytes,
}

impl UnimplementedAttribute {
    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn type_code(&self) -> u8 {
        self.type_code
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }
}

//------------ AttributeError ------------------------------------------------

/// A malformed attribute found while parsing an attribute section.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AttributeError {
    pub typ: PathAttributeType,
    pub action: ErrorAction,
    pub error: ParseError,
}

impl fmt::Display for AttributeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({:?}): {}", self.typ, self.action, self.error)
    }
}

//------------ PaMap ---------------------------------------------------------

pub type AttributesMap = BTreeMap<u8, PathAttribute>;

/// The path attributes of one UPDATE message, keyed on type code.
///
/// Attributes are composed in ascending type code order, which makes the
/// packed form of two maps with the same attributes byte-identical. The
/// packed form is computed once and cached until the map changes.
///
/// MP_REACH_NLRI and MP_UNREACH_NLRI are never stored in here: they are
/// specific to a single message and handled by the
/// [`UpdateMessage`][crate::bgp::message::UpdateMessage] and the builder.
#[derive(Clone, Debug, Default)]
pub struct PaMap {
    attributes: AttributesMap,
    packed: OnceLock<Bytes>,
}

impl PaMap {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn contains(&self, typ: PathAttributeType) -> bool {
        self.attributes.contains_key(&typ.into())
    }

    pub fn attribute(&self, typ: PathAttributeType) -> Option<&PathAttribute> {
        self.attributes.get(&typ.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathAttribute> + '_ {
        self.attributes.values()
    }

    /// Decodes the attribute of type `A`, if present.
    ///
    /// Attributes that fail to decode are reported as absent.
    pub fn get<A: Attribute>(&self, config: &SessionConfig) -> Option<A> {
        let attr = self.attributes.get(&A::TYPE.into())?;
        match attr.get(config) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("failed to decode {} attribute: {}", A::TYPE, e);
                None
            }
        }
    }

    /// Packs and stores `value`, replacing any attribute of its type.
    pub fn set<A: Attribute>(&mut self, value: A, config: &SessionConfig)
        -> Result<Option<PathAttribute>, ComposeError>
    {
        if matches!(
            A::TYPE,
            PathAttributeType::MpReachNlri | PathAttributeType::MpUnreachNlri
        ) {
            return Err(ComposeError::IllegalCombination);
        }
        let attr = PathAttribute::new(&value, config)?;
        Ok(self.insert(attr))
    }

    /// Stores an attribute, replacing any attribute of its type.
    pub fn insert(&mut self, attr: PathAttribute) -> Option<PathAttribute> {
        self.packed.take();
        self.attributes.insert(attr.type_code, attr)
    }

    pub fn remove(&mut self, typ: PathAttributeType) -> Option<PathAttribute> {
        let res = self.attributes.remove(&typ.into());
        if res.is_some() {
            self.packed.take();
        }
        res
    }

    /// The concatenated TLVs of all attributes.
    ///
    /// The attributes always come out in ascending type code order, the
    /// order they were received or inserted in is not kept. A section
    /// received in another order thus packs to different bytes. Use the
    /// octets of the [`UpdateMessage`][crate::bgp::message::UpdateMessage]
    /// to relay a message unchanged.
    pub fn packed(&self) -> Bytes {
        self.packed.get_or_init(|| {
            let mut buf = Vec::with_capacity(self.packed_len());
            for attr in self.attributes.values() {
                attr.compose(&mut buf);
            }
            buf.into()
        }).clone()
    }

    pub fn packed_len(&self) -> usize {
        self.attributes.values().map(|a| a.compose_len()).sum()
    }

    /// Splits the packed form before the first attribute of type code
    /// `code` or higher.
    pub(crate) fn packed_split(&self, code: u8) -> (Bytes, Bytes) {
        let packed = self.packed();
        let at: usize = self.attributes.range(..code)
            .map(|(_, a)| a.compose_len())
            .sum();
        (packed.slice(..at), packed.slice(at..))
    }

    /// Parses a path attribute section.
    ///
    /// Errors in the framing of the section, as well as any problem with
    /// MP_REACH_NLRI or MP_UNREACH_NLRI, are returned as an error. Other
    /// malformed attributes are left out of the map and listed in the
    /// result together with the action to take for them. Of repeated
    /// attributes only the first one is kept.
    pub fn parse_section(raw: &Bytes, config: &SessionConfig)
        -> Result<AttributeSection, ParseError>
    {
        let mut parser = Parser::from_ref(raw);
        let mut section = AttributeSection::default();
        let mut seen = [false; 256];

        while parser.remaining() > 0 {
            let attr = PathAttribute::parse(&mut parser)?;
            let typ = attr.typ();
            let first = !seen[usize::from(attr.type_code)];
            seen[usize::from(attr.type_code)] = true;

            match typ {
                PathAttributeType::MpReachNlri => {
                    if !first {
                        return Err(ParseError::update_error(
                            UpdateMessageError::MalformedAttributeList,
                            "duplicate MP_REACH_NLRI"
                        ));
                    }
                    attr.check_flags()?;
                    section.mp_reach = Some(attr.get(config).map_err(|e|
                        e.in_update(UpdateMessageError::OptionalAttributeError)
                    )?);
                }
                PathAttributeType::MpUnreachNlri => {
                    if !first {
                        return Err(ParseError::update_error(
                            UpdateMessageError::MalformedAttributeList,
                            "duplicate MP_UNREACH_NLRI"
                        ));
                    }
                    attr.check_flags()?;
                    section.mp_unreach = Some(attr.get(config).map_err(|e|
                        e.in_update(UpdateMessageError::OptionalAttributeError)
                    )?);
                }
                _ => {
                    if !first {
                        debug!("dropping repeated {} attribute", typ);
                        continue;
                    }
                    if let Err(error) = attr.validate(config) {
                        let action = if typ.is_known() {
                            typ.error_action()
                        } else {
                            ErrorAction::TreatAsWithdraw
                        };
                        debug!(
                            "discarding malformed {} attribute ({:?}): {}",
                            typ, action, error
                        );
                        section.errors.push(
                            AttributeError { typ, action, error }
                        );
                        continue;
                    }
                    section.attributes.insert(attr);
                }
            }
        }
        Ok(section)
    }
}

//--- AS4 reconciliation

impl PaMap {
    /// Returns the AS path, reconstructed from AS4_PATH where needed.
    ///
    /// On two octet sessions AS4_PATH is merged in following RFC 6793
    /// section 4.2.3, unless AGGREGATOR names a real two octet AS in which
    /// case AS4_PATH is ignored. On four octet sessions AS4_PATH is never
    /// looked at.
    pub fn as_path(&self, config: &SessionConfig) -> Option<AsPath> {
        let as_path: AsPath = self.get(config)?;
        if config.four_octet_asn() {
            return Some(as_path);
        }
        if let Some(agg) = self.get::<Aggregator>(config) {
            if agg.asn != AS_TRANS {
                return Some(as_path);
            }
        }
        match self.get::<As4Path>(config) {
            Some(as4) => Some(as_path.merge_as4(&as4.0)),
            None => Some(as_path),
        }
    }

    /// Stores an AS path, adding AS4_PATH if the session requires it.
    pub fn set_as_path(&mut self, path: AsPath, config: &SessionConfig)
        -> Result<(), ComposeError>
    {
        if !config.four_octet_asn() && path.has_four_octet_asns() {
            let mut as4 = AsPath::new();
            for seg in path.segments() {
                if !seg.stype().is_confed() {
                    as4.push_segment(seg.clone());
                }
            }
            self.set(As4Path(as4), config)?;
        } else {
            self.remove(PathAttributeType::As4Path);
        }
        self.set(path, config)?;
        Ok(())
    }

    /// Returns the aggregator, taking AS4_AGGREGATOR into account.
    pub fn aggregator(&self, config: &SessionConfig) -> Option<Aggregator> {
        let agg: Aggregator = self.get(config)?;
        if !config.four_octet_asn() && agg.asn == AS_TRANS {
            if let Some(as4) = self.get::<As4Aggregator>(config) {
                return Some(as4.0);
            }
        }
        Some(agg)
    }

    /// Stores an aggregator, adding AS4_AGGREGATOR if needed.
    pub fn set_aggregator(&mut self, agg: Aggregator, config: &SessionConfig)
        -> Result<(), ComposeError>
    {
        if !config.four_octet_asn() && agg.asn.into_u32() > 0xffff {
            self.set(As4Aggregator(agg), config)?;
        } else {
            self.remove(PathAttributeType::As4Aggregator);
        }
        self.set(agg, config)?;
        Ok(())
    }
}

impl PartialEq for PaMap {
    fn eq(&self, other: &Self) -> bool {
        self.attributes == other.attributes
    }
}

impl Eq for PaMap { }

impl Hash for PaMap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.attributes.hash(state)
    }
}

impl FromIterator<PathAttribute> for PaMap {
    fn from_iter<I: IntoIterator<Item = PathAttribute>>(iter: I) -> Self {
        let mut res = Self::empty();
        for attr in iter {
            res.insert(attr);
        }
        res
    }
}

/// The result of parsing a path attribute section.
#[derive(Clone, Debug, Default)]
pub struct AttributeSection {
    pub attributes: PaMap,
    pub mp_reach: Option<MpReachNlri>,
    pub mp_unreach: Option<MpUnreachNlri>,
    pub errors: Vec<AttributeError>,
}

impl AttributeSection {
    /// Returns whether a malformed attribute requires treat-as-withdraw.
    pub fn treat_as_withdraw(&self) -> bool {
        self.errors.iter().any(|e| e.action == ErrorAction::TreatAsWithdraw)
    }
}

//------------ Registry ------------------------------------------------------

macro_rules! path_attributes {
    (
        $(
            $type_code:expr => $name:ident($data:ty), $flags:expr, $action:ident
        ),+ $(,)*
    ) => {

        /// Path attribute type codes.
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum PathAttributeType {
            $( $name ),+,
            Unimplemented(u8),
        }

        impl PathAttributeType {
            pub fn is_known(self) -> bool {
                !matches!(self, PathAttributeType::Unimplemented(_))
            }

            /// The flags an attribute of this type is sent with.
            pub fn flags(self) -> Flags {
                match self {
                    $( PathAttributeType::$name => $flags ),+,
                    PathAttributeType::Unimplemented(_) => Flags::OPT_TRANS,
                }
            }

            /// The RFC 7606 action for a malformed attribute of this type.
            pub fn error_action(self) -> ErrorAction {
                match self {
                    $( PathAttributeType::$name => ErrorAction::$action ),+,
                    PathAttributeType::Unimplemented(_) => {
                        ErrorAction::AttributeDiscard
                    }
                }
            }
        }

        impl From<u8> for PathAttributeType {
            fn from(code: u8) -> PathAttributeType {
                match code {
                    $( $type_code => PathAttributeType::$name ),+,
                    u => PathAttributeType::Unimplemented(u)
                }
            }
        }

        impl From<PathAttributeType> for u8 {
            fn from(pat: PathAttributeType) -> u8 {
                match pat {
                    $( PathAttributeType::$name => $type_code ),+,
                    PathAttributeType::Unimplemented(i) => i
                }
            }
        }

        impl fmt::Display for PathAttributeType {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match self {
                    $( PathAttributeType::$name => {
                        write!(f, stringify!($name))
                    } ),+,
                    PathAttributeType::Unimplemented(u) => {
                        write!(f, "Unimplemented-{}", u)
                    }
                }
            }
        }

        /// The typed value of a path attribute.
        #[derive(Clone, Debug, Eq, PartialEq)]
        pub enum AttributeValue {
            $( $name($data) ),+,
            Unimplemented(UnimplementedAttribute),
        }

        impl AttributeValue {
            pub fn typ(&self) -> PathAttributeType {
                match self {
                    $( AttributeValue::$name(_) => PathAttributeType::$name ),+,
                    AttributeValue::Unimplemented(u) => u.type_code.into(),
                }
            }

            fn parse_known(
                typ: PathAttributeType,
                parser: &mut Parser<'_, Bytes>,
                config: &SessionConfig,
            ) -> Option<Result<Self, ParseError>> {
                match typ {
                    $( PathAttributeType::$name => Some(
                        <$data>::parse_value(parser, config)
                            .map(AttributeValue::$name)
                    ) ),+,
                    PathAttributeType::Unimplemented(_) => None,
                }
            }

            /// Packs the value into a [`PathAttribute`].
            pub fn into_attribute(&self, config: &SessionConfig)
                -> Result<PathAttribute, ComposeError>
            {
                match self {
                    $( AttributeValue::$name(v) => {
                        PathAttribute::new(v, config)
                    } ),+,
                    AttributeValue::Unimplemented(u) => {
                        PathAttribute::from_parts(
                            u.flags, u.type_code, u.value.clone()
                        )
                    }
                }
            }
        }

        $(
        impl From<$data> for AttributeValue {
            fn from(value: $data) -> Self {
                AttributeValue::$name(value)
            }
        }
        )+
    }
}

path_attributes!(
    1   => Origin(OriginType), Flags::WELLKNOWN, TreatAsWithdraw,
    2   => AsPath(AsPath), Flags::WELLKNOWN, TreatAsWithdraw,
    3   => ConventionalNextHop(ConventionalNextHop), Flags::WELLKNOWN, TreatAsWithdraw,
    4   => MultiExitDisc(MultiExitDisc), Flags::OPT_NON_TRANS, TreatAsWithdraw,
    5   => LocalPref(LocalPref), Flags::WELLKNOWN, TreatAsWithdraw,
    6   => AtomicAggregate(AtomicAggregate), Flags::WELLKNOWN, AttributeDiscard,
    7   => Aggregator(Aggregator), Flags::OPT_TRANS, AttributeDiscard,
    8   => StandardCommunities(StandardCommunities), Flags::OPT_TRANS, TreatAsWithdraw,
    9   => OriginatorId(OriginatorId), Flags::OPT_NON_TRANS, TreatAsWithdraw,
    10  => ClusterList(ClusterList), Flags::OPT_NON_TRANS, TreatAsWithdraw,
    14  => MpReachNlri(MpReachNlri), Flags::OPT_NON_TRANS, SessionReset,
    15  => MpUnreachNlri(MpUnreachNlri), Flags::OPT_NON_TRANS, SessionReset,
    16  => ExtendedCommunities(ExtendedCommunities), Flags::OPT_TRANS, TreatAsWithdraw,
    17  => As4Path(As4Path), Flags::OPT_TRANS, AttributeDiscard,
    18  => As4Aggregator(As4Aggregator), Flags::OPT_TRANS, AttributeDiscard,
    22  => PmsiTunnel(PmsiTunnel), Flags::OPT_TRANS, TreatAsWithdraw,
    29  => BgpLsAttribute(BgpLsAttribute), Flags::OPT_NON_TRANS, TreatAsWithdraw,
    32  => LargeCommunities(LargeCommunities), Flags::OPT_TRANS, TreatAsWithdraw,
    35  => Otc(Otc), Flags::OPT_TRANS, TreatAsWithdraw,
);

impl PathAttributeType {
    // The UPDATE error subcode for a malformed value of this type.
    fn error_subcode(self, flags: Flags) -> UpdateMessageError {
        match self {
            PathAttributeType::Origin => {
                UpdateMessageError::InvalidOriginAttribute
            }
            PathAttributeType::AsPath | PathAttributeType::As4Path => {
                UpdateMessageError::MalformedAsPath
            }
            PathAttributeType::ConventionalNextHop => {
                UpdateMessageError::InvalidNextHopAttribute
            }
            _ if flags.is_optional() => {
                UpdateMessageError::OptionalAttributeError
            }
            _ => UpdateMessageError::MalformedAttributeList,
        }
    }
}

//------------ Attribute implementations -------------------------------------

impl Attribute for OriginType {
    const TYPE: PathAttributeType = PathAttributeType::Origin;

    fn parse_value(parser: &mut Parser<'_, Bytes>, _: &SessionConfig)
        -> Result<Self, ParseError>
    {
        match OriginType::from(parser.parse_u8()?) {
            OriginType::Unimplemented(_) => Err(ParseError::update_error(
                UpdateMessageError::InvalidOriginAttribute,
                "invalid ORIGIN value"
            )),
            origin => Ok(origin)
        }
    }

    fn compose_value(&self, target: &mut Vec<u8>, _: &SessionConfig)
        -> Result<(), ComposeError>
    {
        if let OriginType::Unimplemented(_) = self {
            return Err(ComposeError::InvalidAttribute("invalid ORIGIN value"));
        }
        target.push((*self).into());
        Ok(())
    }
}

impl Attribute for AsPath {
    const TYPE: PathAttributeType = PathAttributeType::AsPath;

    fn parse_value(parser: &mut Parser<'_, Bytes>, config: &SessionConfig)
        -> Result<Self, ParseError>
    {
        AsPath::parse(parser, config.four_octet_asn())
    }

    fn compose_value(&self, target: &mut Vec<u8>, config: &SessionConfig)
        -> Result<(), ComposeError>
    {
        self.compose(target, config.four_octet_asn());
        Ok(())
    }
}

impl Attribute for As4Path {
    const TYPE: PathAttributeType = PathAttributeType::As4Path;

    fn parse_value(parser: &mut Parser<'_, Bytes>, _: &SessionConfig)
        -> Result<Self, ParseError>
    {
        AsPath::parse(parser, true).map(As4Path)
    }

    fn compose_value(&self, target: &mut Vec<u8>, _: &SessionConfig)
        -> Result<(), ComposeError>
    {
        self.0.compose(target, true);
        Ok(())
    }
}

impl Attribute for ConventionalNextHop {
    const TYPE: PathAttributeType = PathAttributeType::ConventionalNextHop;

    fn parse_value(parser: &mut Parser<'_, Bytes>, _: &SessionConfig)
        -> Result<Self, ParseError>
    {
        Ok(ConventionalNextHop(parse_ipv4addr(parser)?))
    }

    fn compose_value(&self, target: &mut Vec<u8>, _: &SessionConfig)
        -> Result<(), ComposeError>
    {
        target.extend_from_slice(&self.0.octets());
        Ok(())
    }
}

macro_rules! u32_attribute {
    ($data:ident, $typ:ident) => {
        impl Attribute for $data {
            const TYPE: PathAttributeType = PathAttributeType::$typ;

            fn parse_value(parser: &mut Parser<'_, Bytes>, _: &SessionConfig)
                -> Result<Self, ParseError>
            {
                Ok($data(parser.parse_u32_be()?))
            }

            fn compose_value(&self, target: &mut Vec<u8>, _: &SessionConfig)
                -> Result<(), ComposeError>
            {
                target.extend_from_slice(&self.0.to_be_bytes());
                Ok(())
            }
        }
    }
}

u32_attribute!(MultiExitDisc, MultiExitDisc);
u32_attribute!(LocalPref, LocalPref);

impl Attribute for AtomicAggregate {
    const TYPE: PathAttributeType = PathAttributeType::AtomicAggregate;

    fn parse_value(_: &mut Parser<'_, Bytes>, _: &SessionConfig)
        -> Result<Self, ParseError>
    {
        Ok(AtomicAggregate)
    }

    fn compose_value(&self, _: &mut Vec<u8>, _: &SessionConfig)
        -> Result<(), ComposeError>
    {
        Ok(())
    }
}

impl Attribute for Aggregator {
    const TYPE: PathAttributeType = PathAttributeType::Aggregator;

    fn parse_value(parser: &mut Parser<'_, Bytes>, config: &SessionConfig)
        -> Result<Self, ParseError>
    {
        let asn = if config.four_octet_asn() {
            parser.parse_u32_be()?
        } else {
            parser.parse_u16_be()?.into()
        };
        Ok(Aggregator::new(Asn::from_u32(asn), parse_ipv4addr(parser)?))
    }

    fn compose_value(&self, target: &mut Vec<u8>, config: &SessionConfig)
        -> Result<(), ComposeError>
    {
        if config.four_octet_asn() {
            target.extend_from_slice(&self.asn.into_u32().to_be_bytes());
        } else {
            let asn = u16::try_from(self.asn.into_u32())
                .unwrap_or(AS_TRANS.into_u32() as u16);
            target.extend_from_slice(&asn.to_be_bytes());
        }
        target.extend_from_slice(&self.address.octets());
        Ok(())
    }
}

impl Attribute for As4Aggregator {
    const TYPE: PathAttributeType = PathAttributeType::As4Aggregator;

    fn parse_value(parser: &mut Parser<'_, Bytes>, _: &SessionConfig)
        -> Result<Self, ParseError>
    {
        let asn = Asn::from_u32(parser.parse_u32_be()?);
        Ok(As4Aggregator(Aggregator::new(asn, parse_ipv4addr(parser)?)))
    }

    fn compose_value(&self, target: &mut Vec<u8>, _: &SessionConfig)
        -> Result<(), ComposeError>
    {
        target.extend_from_slice(&self.0.asn.into_u32().to_be_bytes());
        target.extend_from_slice(&self.0.address.octets());
        Ok(())
    }
}

impl Attribute for OriginatorId {
    const TYPE: PathAttributeType = PathAttributeType::OriginatorId;

    fn parse_value(parser: &mut Parser<'_, Bytes>, _: &SessionConfig)
        -> Result<Self, ParseError>
    {
        Ok(OriginatorId(parse_ipv4addr(parser)?))
    }

    fn compose_value(&self, target: &mut Vec<u8>, _: &SessionConfig)
        -> Result<(), ComposeError>
    {
        target.extend_from_slice(&self.0.octets());
        Ok(())
    }
}

impl Attribute for ClusterList {
    const TYPE: PathAttributeType = PathAttributeType::ClusterList;

    fn parse_value(parser: &mut Parser<'_, Bytes>, _: &SessionConfig)
        -> Result<Self, ParseError>
    {
        let mut ids = Vec::with_capacity(parser.remaining() / 4);
        while parser.remaining() > 0 {
            ids.push(parse_ipv4addr(parser)?);
        }
        Ok(ClusterList(ids))
    }

    fn compose_value(&self, target: &mut Vec<u8>, _: &SessionConfig)
        -> Result<(), ComposeError>
    {
        for id in &self.0 {
            target.extend_from_slice(&id.octets());
        }
        Ok(())
    }
}

// Lists of fixed size items, the value length must be a multiple of the
// item size.
macro_rules! list_attribute {
    ($data:ident, $item:ident, $size:expr) => {
        impl Attribute for $data {
            const TYPE: PathAttributeType = PathAttributeType::$data;

            fn parse_value(parser: &mut Parser<'_, Bytes>, _: &SessionConfig)
                -> Result<Self, ParseError>
            {
                if parser.remaining() % $size != 0 {
                    return Err(ParseError::form_error(
                        concat!("invalid length for ", stringify!($data))
                    ));
                }
                let mut res = Vec::with_capacity(parser.remaining() / $size);
                while parser.remaining() > 0 {
                    let mut buf = [0u8; $size];
                    parser.parse_buf(&mut buf)?;
                    res.push($item::from_raw(buf));
                }
                Ok($data(res))
            }

            fn compose_value(&self, target: &mut Vec<u8>, _: &SessionConfig)
                -> Result<(), ComposeError>
            {
                for c in &self.0 {
                    target.extend_from_slice(&c.to_raw());
                }
                Ok(())
            }
        }
    }
}

list_attribute!(StandardCommunities, StandardCommunity, 4);
list_attribute!(ExtendedCommunities, ExtendedCommunity, 8);
list_attribute!(LargeCommunities, LargeCommunity, 12);

impl Attribute for PmsiTunnel {
    const TYPE: PathAttributeType = PathAttributeType::PmsiTunnel;

    fn parse_value(parser: &mut Parser<'_, Bytes>, _: &SessionConfig)
        -> Result<Self, ParseError>
    {
        let flags = parser.parse_u8()?;
        let tunnel_type = parser.parse_u8()?.into();
        let mut label = [0u8; 3];
        parser.parse_buf(&mut label)?;
        let tunnel_id = parser.parse_octets(parser.remaining())?;
        Ok(PmsiTunnel {
            flags, tunnel_type, label: Label::from_raw(label), tunnel_id
        })
    }

    fn compose_value(&self, target: &mut Vec<u8>, _: &SessionConfig)
        -> Result<(), ComposeError>
    {
        target.push(self.flags);
        target.push(self.tunnel_type.into());
        target.extend_from_slice(&self.label.to_raw());
        target.extend_from_slice(&self.tunnel_id);
        Ok(())
    }
}

impl Attribute for BgpLsAttribute {
    const TYPE: PathAttributeType = PathAttributeType::BgpLsAttribute;

    fn parse_value(parser: &mut Parser<'_, Bytes>, _: &SessionConfig)
        -> Result<Self, ParseError>
    {
        let mut tlvs = Vec::new();
        while parser.remaining() > 0 {
            let typ = parser.parse_u16_be()?;
            let len = parser.parse_u16_be()?;
            let value = parser.parse_octets(len.into())?;
            tlvs.push(LsAttributeTlv { typ, value });
        }
        Ok(BgpLsAttribute { tlvs })
    }

    fn compose_value(&self, target: &mut Vec<u8>, _: &SessionConfig)
        -> Result<(), ComposeError>
    {
        for tlv in &self.tlvs {
            let len = u16::try_from(tlv.value.len()).map_err(|_|
                ComposeError::InvalidAttribute("BGP-LS TLV too long")
            )?;
            target.extend_from_slice(&tlv.typ.to_be_bytes());
            target.extend_from_slice(&len.to_be_bytes());
            target.extend_from_slice(&tlv.value);
        }
        Ok(())
    }
}

impl Attribute for Otc {
    const TYPE: PathAttributeType = PathAttributeType::Otc;

    fn parse_value(parser: &mut Parser<'_, Bytes>, _: &SessionConfig)
        -> Result<Self, ParseError>
    {
        Ok(Otc(Asn::from_u32(parser.parse_u32_be()?)))
    }

    fn compose_value(&self, target: &mut Vec<u8>, _: &SessionConfig)
        -> Result<(), ComposeError>
    {
        target.extend_from_slice(&self.0.into_u32().to_be_bytes());
        Ok(())
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use crate::bgp::aspath::{Segment, SegmentType};

    fn parse_one(raw: &'static [u8]) -> PathAttribute {
        let bytes = Bytes::from_static(raw);
        let mut parser = Parser::from_ref(&bytes);
        let attr = PathAttribute::parse(&mut parser).unwrap();
        assert_eq!(parser.remaining(), 0);
        attr
    }

    #[test]
    fn registry() {
        assert_eq!(PathAttributeType::from(1), PathAttributeType::Origin);
        assert_eq!(u8::from(PathAttributeType::Otc), 35);
        assert_eq!(
            PathAttributeType::from(99),
            PathAttributeType::Unimplemented(99)
        );
        assert_eq!(
            PathAttributeType::As4Path.error_action(),
            ErrorAction::AttributeDiscard
        );
        assert_eq!(
            PathAttributeType::LocalPref.error_action(),
            ErrorAction::TreatAsWithdraw
        );
        assert_eq!(PathAttributeType::LargeCommunities.to_string(),
            "LargeCommunities"
        );
    }

    #[test]
    fn origin() {
        let config = SessionConfig::modern();
        let attr = parse_one(&[0x40, 0x01, 0x01, 0x02]);
        assert_eq!(
            attr.decode(&config).unwrap(),
            AttributeValue::Origin(OriginType::Incomplete)
        );

        let attr = parse_one(&[0x40, 0x01, 0x01, 0x03]);
        let err = attr.validate(&config).unwrap_err();
        assert_eq!(
            err.notification().update_error(),
            Some(UpdateMessageError::InvalidOriginAttribute)
        );

        // wrong length
        let attr = parse_one(&[0x40, 0x01, 0x02, 0x00, 0x00]);
        assert_eq!(
            attr.validate(&config).unwrap_err().notification()
                .update_error(),
            Some(UpdateMessageError::AttributeLengthError)
        );
    }

    #[test]
    fn flags_checked() {
        let config = SessionConfig::modern();
        // LOCAL_PREF sent as optional
        let attr = parse_one(&[0x80, 0x05, 0x04, 0x00, 0x00, 0x00, 0x64]);
        assert_eq!(
            attr.validate(&config).unwrap_err().notification()
                .update_error(),
            Some(UpdateMessageError::AttributeFlagsError)
        );
    }

    #[test]
    fn overrun() {
        let bytes = Bytes::from_static(&[0x40, 0x01, 0x05, 0x00]);
        let mut parser = Parser::from_ref(&bytes);
        let err = PathAttribute::parse(&mut parser).unwrap_err();
        assert_eq!(
            err.notification().update_error(),
            Some(UpdateMessageError::AttributeLengthError)
        );
    }

    #[test]
    fn unknown_roundtrip() {
        let config = SessionConfig::modern();
        // optional transitive, extended length for a short value
        let raw: &[u8] = &[0xd0, 0xf0, 0x00, 0x03, 0x01, 0x02, 0x03];
        let attr = parse_one(raw);
        assert_eq!(attr.typ(), PathAttributeType::Unimplemented(0xf0));
        assert!(attr.validate(&config).is_ok());
        let value = attr.decode(&config).unwrap();
        assert!(matches!(value, AttributeValue::Unimplemented(_)));
        assert_eq!(attr.packed().as_ref(), raw);
    }

    #[test]
    fn typed_roundtrips() {
        let config = SessionConfig::modern();
        let mut map = PaMap::empty();
        map.set(OriginType::Igp, &config).unwrap();
        map.set(MultiExitDisc(10), &config).unwrap();
        map.set(ConventionalNextHop(Ipv4Addr::new(1, 2, 3, 4)), &config)
            .unwrap();
        map.set(StandardCommunities(vec![
            StandardCommunity::new(65000, 1)
        ]), &config).unwrap();
        map.set(LargeCommunities(vec![
            LargeCommunity::new(65000, 1, 2)
        ]), &config).unwrap();

        assert_eq!(
            map.packed().as_ref(),
            &[
                0x40, 0x01, 0x01, 0x00,
                0x40, 0x03, 0x04, 1, 2, 3, 4,
                0x80, 0x04, 0x04, 0, 0, 0, 10,
                0xc0, 0x08, 0x04, 0xfd, 0xe8, 0x00, 0x01,
                0xc0, 0x20, 0x0c, 0, 0, 0xfd, 0xe8, 0, 0, 0, 1, 0, 0, 0, 2,
            ][..]
        );
        assert_eq!(map.get::<MultiExitDisc>(&config), Some(MultiExitDisc(10)));

        let (head, tail) = map.packed_split(14);
        assert_eq!(head.len(), 4 + 7 + 7 + 7);
        assert_eq!(tail.len(), 15);

        // mutation resets the packed form
        map.remove(PathAttributeType::MultiExitDisc);
        assert_eq!(map.packed().len(), 4 + 7 + 7 + 15);

        // communities of the wrong length
        let attr = parse_one(&[0xc0, 0x08, 0x05, 0, 0, 0, 0, 0]);
        assert!(attr.validate(&config).is_err());
    }

    #[test]
    fn long_values_use_extended_length() {
        let config = SessionConfig::modern();
        let communities = StandardCommunities(
            (0..100).map(|i| StandardCommunity::new(65000, i)).collect()
        );
        let attr = PathAttribute::new(&communities, &config).unwrap();
        assert!(attr.flags().is_extended_length());
        assert_eq!(attr.compose_len(), 404);
        assert_eq!(&attr.packed()[..4], &[0xd0, 0x08, 0x01, 0x90]);
        assert_eq!(attr.get::<StandardCommunities>(&config).unwrap(),
            communities
        );
    }

    #[test]
    fn section_errors() {
        let config = SessionConfig::modern();
        let raw = Bytes::from_static(&[
            // ORIGIN IGP
            0x40, 0x01, 0x01, 0x00,
            // ORIGIN again, dropped
            0x40, 0x01, 0x01, 0x02,
            // AGGREGATOR with a bad length, discarded
            0xc0, 0x07, 0x03, 0x00, 0x00, 0x00,
            // LOCAL_PREF
            0x40, 0x05, 0x04, 0x00, 0x00, 0x00, 0x64,
        ]);
        let section = PaMap::parse_section(&raw, &config).unwrap();
        assert_eq!(section.attributes.len(), 2);
        assert_eq!(
            section.attributes.get::<OriginType>(&config),
            Some(OriginType::Igp)
        );
        assert_eq!(section.errors.len(), 1);
        assert_eq!(section.errors[0].typ, PathAttributeType::Aggregator);
        assert!(!section.treat_as_withdraw());

        // a broken MED is treat-as-withdraw
        let raw = Bytes::from_static(&[0x80, 0x04, 0x02, 0x00, 0x00]);
        let section = PaMap::parse_section(&raw, &config).unwrap();
        assert!(section.treat_as_withdraw());
        assert!(section.attributes.is_empty());
    }

    #[test]
    fn packed_in_type_code_order() {
        let config = SessionConfig::modern();
        let raw = Bytes::from_static(&[
            // LOCAL_PREF, AS_PATH (empty), ORIGIN
            0x40, 0x05, 0x04, 0x00, 0x00, 0x00, 0x64,
            0x40, 0x02, 0x00,
            0x40, 0x01, 0x01, 0x00,
        ]);
        let section = PaMap::parse_section(&raw, &config).unwrap();
        assert_eq!(section.attributes.len(), 3);
        assert_eq!(
            section.attributes.packed().as_ref(),
            &[
                0x40, 0x01, 0x01, 0x00,
                0x40, 0x02, 0x00,
                0x40, 0x05, 0x04, 0x00, 0x00, 0x00, 0x64,
            ]
        );
        let (head, tail) = section.attributes.packed_split(
            PathAttributeType::MpReachNlri.into()
        );
        assert_eq!(head.len(), raw.len());
        assert!(tail.is_empty());
    }

    #[test]
    fn as4_reconciliation() {
        let legacy = SessionConfig::legacy();
        let path = AsPath::from_asns(
            [65000, 70000].into_iter().map(Asn::from_u32)
        );

        let mut map = PaMap::empty();
        map.set_as_path(path.clone(), &legacy).unwrap();
        assert!(map.contains(PathAttributeType::As4Path));
        assert_eq!(
            map.attribute(PathAttributeType::AsPath).unwrap().value().as_ref(),
            &[0x02, 0x02, 0xfd, 0xe8, 0x5b, 0xa0]
        );
        assert_eq!(map.as_path(&legacy), Some(path.clone()));

        // a real two octet aggregator voids AS4_PATH
        map.set_aggregator(
            Aggregator::new(Asn::from_u32(65001), Ipv4Addr::new(10, 0, 0, 1)),
            &legacy
        ).unwrap();
        assert_eq!(
            map.as_path(&legacy).unwrap().asns().collect::<Vec<_>>(),
            vec![Asn::from_u32(65000), AS_TRANS]
        );

        let agg = Aggregator::new(
            Asn::from_u32(70001), Ipv4Addr::new(10, 0, 0, 1)
        );
        map.set_aggregator(agg, &legacy).unwrap();
        assert_eq!(map.aggregator(&legacy), Some(agg));
        assert_eq!(map.as_path(&legacy), Some(path.clone()));

        // confederation segments stay out of AS4_PATH
        let mut confed = AsPath::new();
        confed.push_segment(Segment::new(
            SegmentType::ConfedSequence, [Asn::from_u32(65010)]
        ));
        confed.push_segment(Segment::new(
            SegmentType::Sequence, [Asn::from_u32(70000)]
        ));
        let mut map = PaMap::empty();
        map.set_as_path(confed.clone(), &legacy).unwrap();
        let as4 = map.get::<As4Path>(&legacy).unwrap();
        assert_eq!(as4.0.segments().len(), 1);
        assert_eq!(map.as_path(&legacy), Some(confed));

        let modern = SessionConfig::modern();
        let mut map = PaMap::empty();
        map.set_as_path(path.clone(), &modern).unwrap();
        assert!(!map.contains(PathAttributeType::As4Path));
        assert_eq!(map.as_path(&modern), Some(path));
    }
}
