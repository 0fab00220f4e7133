//! The NLRI carrying parts of an UPDATE message.
//!
//! [`NlriCollection`] holds a list of NLRI of one family, either as packed
//! bytes received from the wire or as a list of values built locally.
//! Whichever form is missing is derived on first access and kept, so a
//! received collection is only decoded if someone asks for the NLRI, and a
//! built one only packed once no matter how often it is sent.
//!
//! [`MpReachNlri`] and [`MpUnreachNlri`] are the values of the
//! MP_REACH_NLRI and MP_UNREACH_NLRI attributes of RFC 4760.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use bytes::Bytes;
use octseq::Parser;

use crate::bgp::message::update_builder::ComposeError;
use crate::bgp::message::SessionConfig;
use crate::bgp::nlri::{AfiSafiType, NextHop, Nlri, NlriIter, PathId};
use crate::bgp::path_attributes::{Attribute, PathAttributeType};
use crate::util::parser::ParseError;

//------------ NlriCollection ------------------------------------------------

/// A lazily decoded list of NLRI of one address family.
#[derive(Clone, Debug)]
pub struct NlriCollection {
    afisafi: AfiSafiType,
    addpath: bool,
    packed: OnceLock<Bytes>,
    nlris: OnceLock<Result<Vec<Nlri>, ParseError>>,
}

impl NlriCollection {
    /// Creates a collection over received bytes.
    ///
    /// Nothing is checked yet, see [`validate`][Self::validate].
    pub fn from_wire(raw: Bytes, afisafi: AfiSafiType, addpath: bool)
        -> Self
    {
        Self {
            afisafi,
            addpath,
            packed: OnceLock::from(raw),
            nlris: OnceLock::new(),
        }
    }

    /// Creates a collection from NLRI values.
    ///
    /// All NLRI must be of `afisafi`. If `addpath` is set, NLRI without a
    /// Path Identifier are packed with identifier 0, without it any
    /// identifier is left out.
    pub fn from_nlris(
        nlris: Vec<Nlri>,
        afisafi: AfiSafiType,
        addpath: bool
    ) -> Result<Self, ComposeError> {
        if nlris.iter().any(|n| n.afisafi() != afisafi) {
            return Err(ComposeError::IllegalCombination);
        }
        Ok(Self {
            afisafi,
            addpath,
            packed: OnceLock::new(),
            nlris: OnceLock::from(Ok(nlris)),
        })
    }

    /// An empty collection, as used by End-of-RIB markers.
    pub fn empty(afisafi: AfiSafiType) -> Self {
        Self::from_wire(Bytes::new(), afisafi, false)
    }

    pub fn afisafi(&self) -> AfiSafiType {
        self.afisafi
    }

    pub fn addpath(&self) -> bool {
        self.addpath
    }

    /// Returns the NLRI, decoding them on first use.
    pub fn nlris(&self) -> Result<&[Nlri], ParseError> {
        self.nlris.get_or_init(|| {
            NlriIter::new(self.packed(), self.afisafi, self.addpath).collect()
        }).as_ref().map(Vec::as_slice).map_err(|e| *e)
    }

    /// Returns an iterator decoding the packed NLRI one by one.
    pub fn iter(&self) -> NlriIter {
        NlriIter::new(self.packed(), self.afisafi, self.addpath)
    }

    /// Checks the packed NLRI without keeping the decoded values.
    pub fn validate(&self) -> Result<(), ParseError> {
        self.iter().validate()
    }

    /// Returns the packed NLRI, packing them on first use.
    pub fn packed(&self) -> Bytes {
        self.packed.get_or_init(|| {
            let mut buf = Vec::new();
            if let Some(Ok(nlris)) = self.nlris.get() {
                for n in nlris {
                    compose_nlri(n, self.addpath, &mut buf);
                }
            }
            buf.into()
        }).clone()
    }

    pub fn packed_len(&self) -> usize {
        match self.packed.get() {
            Some(packed) => packed.len(),
            None => match self.nlris.get() {
                Some(Ok(nlris)) => nlris.iter().map(|n|
                    nlri_len(n, self.addpath)
                ).sum(),
                _ => 0,
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.packed_len() == 0
    }
}

impl PartialEq for NlriCollection {
    fn eq(&self, other: &Self) -> bool {
        self.afisafi == other.afisafi
            && self.addpath == other.addpath
            && self.packed() == other.packed()
    }
}

impl Eq for NlriCollection { }

impl Hash for NlriCollection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.afisafi.hash(state);
        self.addpath.hash(state);
        self.packed().hash(state);
    }
}

/// Returns the packed length of `nlri` with or without a Path Identifier.
pub(crate) fn nlri_len(nlri: &Nlri, addpath: bool) -> usize {
    let body = nlri.compose_len() - nlri.path_id().map_or(0, |_| 4);
    if addpath { body + 4 } else { body }
}

/// Appends `nlri` with or without a Path Identifier.
pub(crate) fn compose_nlri(nlri: &Nlri, addpath: bool, target: &mut Vec<u8>) {
    if addpath {
        let id = nlri.path_id().unwrap_or(PathId(0));
        target.extend_from_slice(&id.0.to_be_bytes());
    }
    target.extend_from_slice(nlri.body().raw());
}

/// Returns `nlri` the way it is packed: with identifier 0 if it has none
/// and `addpath` is set, without any identifier if it is not.
pub(crate) fn wire_nlri(nlri: &Nlri, addpath: bool) -> Nlri {
    let path_id = addpath.then(|| nlri.path_id().unwrap_or(PathId(0)));
    Nlri::new(nlri.body().clone(), path_id)
}

//------------ MpReachNlri ---------------------------------------------------

/// The value of an MP_REACH_NLRI attribute.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MpReachNlri {
    nexthop: NextHop,
    nlri: NlriCollection,
}

impl MpReachNlri {
    pub fn new(nexthop: NextHop, nlri: NlriCollection) -> Self {
        Self { nexthop, nlri }
    }

    pub fn afisafi(&self) -> AfiSafiType {
        self.nlri.afisafi()
    }

    pub fn nexthop(&self) -> &NextHop {
        &self.nexthop
    }

    pub fn nlri(&self) -> &NlriCollection {
        &self.nlri
    }

    pub fn nlris(&self) -> Result<&[Nlri], ParseError> {
        self.nlri.nlris()
    }

    pub fn value_len(&self) -> usize {
        3 + 1 + self.nexthop.compose_len() + 1 + self.nlri.packed_len()
    }
}

impl Attribute for MpReachNlri {
    const TYPE: PathAttributeType = PathAttributeType::MpReachNlri;

    fn parse_value(parser: &mut Parser<'_, Bytes>, config: &SessionConfig)
        -> Result<Self, ParseError>
    {
        let afisafi = parse_afisafi(parser)?;
        let nexthop = NextHop::parse(parser, afisafi)?;
        // Reserved, formerly the number of SNPAs.
        parser.advance(1)?;
        // The NLRI themselves are only decoded by `nlris`.
        let raw = parser.parse_octets(parser.remaining())?;
        let nlri = NlriCollection::from_wire(
            raw, afisafi, config.rx_addpath(afisafi)
        );
        Ok(Self { nexthop, nlri })
    }

    fn compose_value(&self, target: &mut Vec<u8>, _: &SessionConfig)
        -> Result<(), ComposeError>
    {
        target.extend_from_slice(&self.afisafi().as_bytes());
        self.nexthop.compose(target)?;
        target.push(0);
        target.extend_from_slice(&self.nlri.packed());
        Ok(())
    }
}

impl fmt::Display for MpReachNlri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MP_REACH_NLRI({}, {})", self.afisafi(), self.nexthop)
    }
}

//------------ MpUnreachNlri -------------------------------------------------

/// The value of an MP_UNREACH_NLRI attribute.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MpUnreachNlri {
    nlri: NlriCollection,
}

impl MpUnreachNlri {
    pub fn new(nlri: NlriCollection) -> Self {
        Self { nlri }
    }

    /// The End-of-RIB marker for `afisafi`, RFC 4724.
    pub fn end_of_rib(afisafi: AfiSafiType) -> Self {
        Self { nlri: NlriCollection::empty(afisafi) }
    }

    pub fn afisafi(&self) -> AfiSafiType {
        self.nlri.afisafi()
    }

    pub fn nlri(&self) -> &NlriCollection {
        &self.nlri
    }

    pub fn nlris(&self) -> Result<&[Nlri], ParseError> {
        self.nlri.nlris()
    }

    pub fn value_len(&self) -> usize {
        3 + self.nlri.packed_len()
    }
}

impl Attribute for MpUnreachNlri {
    const TYPE: PathAttributeType = PathAttributeType::MpUnreachNlri;

    fn parse_value(parser: &mut Parser<'_, Bytes>, config: &SessionConfig)
        -> Result<Self, ParseError>
    {
        let afisafi = parse_afisafi(parser)?;
        let raw = parser.parse_octets(parser.remaining())?;
        let nlri = NlriCollection::from_wire(
            raw, afisafi, config.rx_addpath(afisafi)
        );
        Ok(Self { nlri })
    }

    fn compose_value(&self, target: &mut Vec<u8>, _: &SessionConfig)
        -> Result<(), ComposeError>
    {
        target.extend_from_slice(&self.afisafi().as_bytes());
        target.extend_from_slice(&self.nlri.packed());
        Ok(())
    }
}

impl fmt::Display for MpUnreachNlri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MP_UNREACH_NLRI({})", self.afisafi())
    }
}

fn parse_afisafi(parser: &mut Parser<'_, Bytes>)
    -> Result<AfiSafiType, ParseError>
{
    let afi = parser.parse_u16_be()?;
    let safi = parser.parse_u8()?;
    match AfiSafiType::from((afi, safi)) {
        AfiSafiType::Unsupported(_, _) => Err(ParseError::Unsupported),
        afisafi => Ok(afisafi),
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;
    use std::str::FromStr;
    use crate::bgp::nlri::{AddpathDirection, NlriSettings};
    use crate::bgp::path_attributes::PathAttribute;

    fn v6(prefix: &str) -> Nlri {
        let mut s = NlriSettings::new(AfiSafiType::Ipv6Unicast);
        s.prefix(prefix.parse().unwrap());
        s.build().unwrap()
    }

    #[test]
    fn lazy_decode() {
        let raw = Bytes::from_static(&[
            24, 10, 0, 0,
            16, 10, 1,
        ]);
        let coll = NlriCollection::from_wire(
            raw.clone(), AfiSafiType::Ipv4Unicast, false
        );
        assert!(coll.nlris.get().is_none());
        let nlris = coll.nlris().unwrap();
        assert_eq!(nlris.len(), 2);
        assert_eq!(nlris[1].to_string(), "10.1.0.0/16");
        assert_eq!(coll.packed(), raw);

        let broken = NlriCollection::from_wire(
            Bytes::from_static(&[33, 10, 0, 0, 0, 0]),
            AfiSafiType::Ipv4Unicast, false
        );
        assert!(broken.validate().is_err());
        assert!(broken.nlris().is_err());
    }

    #[test]
    fn lazy_pack() {
        let coll = NlriCollection::from_nlris(
            vec![v6("2001:db8::/32"), v6("2001:db8:1::/48")],
            AfiSafiType::Ipv6Unicast,
            true,
        ).unwrap();
        assert_eq!(coll.packed_len(), 4 + 5 + 4 + 7);
        assert!(coll.packed.get().is_none());
        let packed = coll.packed();
        assert_eq!(packed.len(), 20);
        assert_eq!(&packed[..5], &[0, 0, 0, 0, 32]);
        // the second call hands out the same bytes
        assert_eq!(coll.packed().as_ptr(), packed.as_ptr());

        assert_eq!(
            NlriCollection::from_nlris(
                vec![v6("2001:db8::/32")], AfiSafiType::Ipv4Unicast, false
            ),
            Err(ComposeError::IllegalCombination)
        );
    }

    #[test]
    fn mp_reach() {
        let config = SessionConfig::modern();
        let nh = NextHop::Unicast(Ipv6Addr::from_str("2001:db8::1").unwrap().into());
        let reach = MpReachNlri::new(nh, NlriCollection::from_nlris(
            vec![v6("2001:db8::/32")], AfiSafiType::Ipv6Unicast, false
        ).unwrap());
        let attr = PathAttribute::new(&reach, &config).unwrap();
        assert_eq!(attr.value().len(), reach.value_len());
        assert_eq!(&attr.value()[..4], &[0, 2, 1, 16]);

        let parsed: MpReachNlri = attr.get(&config).unwrap();
        assert_eq!(parsed, reach);
        assert_eq!(parsed.nexthop(), &nh);
        assert_eq!(parsed.nlris().unwrap(), &[v6("2001:db8::/32")]);

        // with AddPath the same bytes do not decode, but only the NLRI
        // are affected
        let addpath = config.with_addpath(
            AfiSafiType::Ipv6Unicast, AddpathDirection::Receive
        );
        let parsed: MpReachNlri = attr.get(&addpath).unwrap();
        assert_eq!(parsed.nexthop(), &nh);
        assert!(parsed.nlri.nlris.get().is_none());
        assert!(parsed.nlris().is_err());
    }

    #[test]
    fn mp_unreach() {
        let config = SessionConfig::modern();
        let eor = MpUnreachNlri::end_of_rib(AfiSafiType::L2VpnEvpn);
        let attr = PathAttribute::new(&eor, &config).unwrap();
        assert_eq!(attr.packed().as_ref(), &[0x80, 0x0f, 0x03, 0, 25, 70]);
        let parsed: MpUnreachNlri = attr.get(&config).unwrap();
        assert!(parsed.nlri().is_empty());

        // unknown family
        let attr = PathAttribute::from_parts(
            PathAttributeType::MpUnreachNlri.flags(), 15,
            Bytes::from_static(&[0, 2, 200])
        ).unwrap();
        assert!(attr.get::<MpUnreachNlri>(&config).is_err());
    }
}
