use std::fmt;

use bytes::Bytes;
use inetnum::addr::Prefix;
use octseq::{OctetsBuilder, Parser};
use paste::paste;

use crate::typeenum; // from util::macros
use crate::util::parser::ParseError;
use crate::view::ByteView;

use super::bgpls::BgpLsNlri;
use super::evpn::EvpnNlri;
use super::flowspec::FlowSpecNlri;
use super::mpls::MplsNlri;
use super::mpls_vpn::MplsVpnNlri;
use super::mup::MupNlri;
use super::mvpn::MvpnNlri;
use super::qualifier::PathId;
use super::routetarget::RouteTargetNlri;
use super::unicast::UnicastNlri;
use super::vpls::VplsNlri;

//------------ Afi / Safi ----------------------------------------------------

typeenum!(
/// AFI as used in BGP OPEN and UPDATE messages.
    Afi, u16,
    {
        1 => Ipv4,
        2 => Ipv6,
        25 => L2Vpn,
        16388 => LinkState,
    });

typeenum!(
/// SAFI as used in BGP OPEN and UPDATE messages.
    Safi, u8,
    {
        1 => Unicast,
        2 => Multicast,
        4 => MplsUnicast,
        5 => Mvpn,
        65 => Vpls,
        70 => Evpn,
        71 => BgpLs,
        72 => BgpLsVpn,
        85 => Mup,
        128 => MplsVpnUnicast,
        132 => RouteTarget,
        133 => FlowSpec,
        134 => FlowSpecVpn,
    });

/// The NLRI grammar shared by one or more address families.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NlriFamily {
    Unicast,
    Mpls,
    MplsVpn,
    FlowSpec,
    Evpn,
    BgpLs,
    Mup,
    Mvpn,
    Vpls,
    RouteTarget,
}

// The afisafi! macro generates the AfiSafiType enum, comprising all the
// supported (AFI, SAFI) combinations, and the dispatch from such a
// combination to the codec of its NlriFamily. Adding a family to the table
// below without a matching NlriBody variant does not compile.
macro_rules! afisafi {
    (
        $(
            $afi_code:expr => $afi_name:ident [
                $( $safi_code:expr => $safi_name:ident => $family:ident ),+
                $(,)*
            ]
        ),+ $(,)*
    ) =>
{
paste! {
    #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
    pub enum AfiSafiType {
        $( $( [<$afi_name $safi_name>] ,)+)+
        Unsupported(u16, u8),
    }

    impl AfiSafiType {
        /// All supported combinations, in table order.
        pub const ALL: &'static [AfiSafiType] = &[
            $( $( AfiSafiType::[<$afi_name $safi_name>] ,)+)+
        ];

        pub fn afi(self) -> Afi {
            match self {
            $($(
                Self::[<$afi_name $safi_name>] => Afi::$afi_name,
            )+)+
                Self::Unsupported(a, _s) => Afi::from(a)
            }
        }

        pub fn safi(self) -> Safi {
            match self {
            $($(
                Self::[<$afi_name $safi_name>] => Safi::$safi_name,
            )+)+
                Self::Unsupported(_a, s) => Safi::from(s)
            }
        }

        /// The NLRI grammar for this family, if supported.
        pub fn family(self) -> Option<NlriFamily> {
            match self {
            $($(
                Self::[<$afi_name $safi_name>] => Some(NlriFamily::$family),
            )+)+
                Self::Unsupported(..) => None
            }
        }

        pub const fn as_bytes(self) -> [u8; 3] {
            match self {
            $($(
                Self::[<$afi_name $safi_name>] => {
                    let afi = ($afi_code as u16).to_be_bytes();
                    [afi[0], afi[1], $safi_code]
                }
            )+)+
                AfiSafiType::Unsupported(a, s) => {
                    let afi = a.to_be_bytes();
                    [afi[0], afi[1], s]
                }
            }
        }
    }

    impl From<(u16, u8)> for AfiSafiType {
        fn from(t: (u16, u8)) -> Self {
            match t {
            $($(
                ($afi_code, $safi_code) => Self::[<$afi_name $safi_name>],
            )+)+
                _ => Self::Unsupported(t.0, t.1)
            }
        }
    }

    impl From<AfiSafiType> for (u16, u8) {
        fn from(afisafi: AfiSafiType) -> (u16, u8) {
            match afisafi {
            $($(
                AfiSafiType::[<$afi_name $safi_name>] => ($afi_code, $safi_code),
            )+)+
                AfiSafiType::Unsupported(a, s) => (a, s)
            }
        }
    }

    impl fmt::Display for AfiSafiType {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            match self {
            $($(
                Self::[<$afi_name $safi_name>] => {
                    write!(f, stringify!([<$afi_name $safi_name>]))
                }
            )+)+
                Self::Unsupported(a, s) => {
                    write!(f, "UnsupportedAfiSafi({}, {})", a, s)
                }
            }
        }
    }

    fn parse_body(parser: &mut Parser<'_, Bytes>, afisafi: AfiSafiType)
        -> Result<NlriBody, ParseError>
    {
        match afisafi {
        $($(
            AfiSafiType::[<$afi_name $safi_name>] => Ok(NlriBody::$family(
                [<$family Nlri>]::parse(parser, afisafi)?
            )),
        )+)+
            AfiSafiType::Unsupported(..) => Err(ParseError::Unsupported)
        }
    }
}
}
}

afisafi! {
    1_u16 => Ipv4 [
        1 => Unicast => Unicast,
        2 => Multicast => Unicast,
        4 => MplsUnicast => Mpls,
        5 => Mvpn => Mvpn,
        85 => Mup => Mup,
        128 => MplsVpnUnicast => MplsVpn,
        132 => RouteTarget => RouteTarget,
        133 => FlowSpec => FlowSpec,
        134 => FlowSpecVpn => FlowSpec,
    ],
    2_u16 => Ipv6 [
        1 => Unicast => Unicast,
        2 => Multicast => Unicast,
        4 => MplsUnicast => Mpls,
        5 => Mvpn => Mvpn,
        85 => Mup => Mup,
        128 => MplsVpnUnicast => MplsVpn,
        133 => FlowSpec => FlowSpec,
        134 => FlowSpecVpn => FlowSpec,
    ],
    25_u16 => L2Vpn [
        65 => Vpls => Vpls,
        70 => Evpn => Evpn,
    ],
    16388_u16 => LinkState [
        71 => BgpLs => BgpLs,
        72 => BgpLsVpn => BgpLs,
    ],
}

impl AfiSafiType {
    /// Position in [`AfiSafiType::ALL`], used for compact family sets.
    pub(crate) fn index(self) -> Option<usize> {
        Self::ALL.iter().position(|a| *a == self)
    }

    /// Returns true for the families that carry a Route Distinguisher.
    pub fn has_rd(self) -> bool {
        matches!(
            self,
            Self::Ipv4MplsVpnUnicast | Self::Ipv6MplsVpnUnicast |
            Self::Ipv4FlowSpecVpn | Self::Ipv6FlowSpecVpn |
            Self::LinkStateBgpLsVpn
        )
    }

    /// The family whose NLRI go in the conventional UPDATE sections.
    pub fn is_conventional(self) -> bool {
        self == Self::Ipv4Unicast
    }
}

//------------ AddpathDirection ----------------------------------------------

/// Direction(s) in which AddPath was negotiated for a family.
#[derive(Clone, Copy, Debug, Hash, Eq, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddpathDirection {
    Receive = 1,
    Send = 2,
    SendReceive = 3,
}

impl AddpathDirection {
    pub fn receives(self) -> bool {
        matches!(self, Self::Receive | Self::SendReceive)
    }

    pub fn sends(self) -> bool {
        matches!(self, Self::Send | Self::SendReceive)
    }
}

impl TryFrom<u8> for AddpathDirection {
    type Error = &'static str;
    fn try_from(u: u8) -> Result<Self, Self::Error> {
        match u {
            1 => Ok(Self::Receive),
            2 => Ok(Self::Send),
            3 => Ok(Self::SendReceive),
            _ => Err("invalid ADDPATH send/receive value")
        }
    }
}

//------------ AfiSafiSet ----------------------------------------------------

/// A small, copyable set of supported address families.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AfiSafiSet(u64);

impl AfiSafiSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        AfiSafiType::ALL.iter().copied().collect()
    }

    /// Inserts `afisafi`, returning false if it is not supported.
    pub fn insert(&mut self, afisafi: AfiSafiType) -> bool {
        match afisafi.index() {
            Some(i) => {
                self.0 |= 1 << i;
                true
            }
            None => false
        }
    }

    pub fn remove(&mut self, afisafi: AfiSafiType) {
        if let Some(i) = afisafi.index() {
            self.0 &= !(1 << i);
        }
    }

    pub fn contains(&self, afisafi: AfiSafiType) -> bool {
        afisafi.index().map(|i| self.0 & (1 << i) != 0).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = AfiSafiType> + '_ {
        AfiSafiType::ALL.iter().copied().filter(|a| self.contains(*a))
    }
}

impl FromIterator<AfiSafiType> for AfiSafiSet {
    fn from_iter<I: IntoIterator<Item = AfiSafiType>>(iter: I) -> Self {
        let mut res = Self::empty();
        for a in iter {
            res.insert(a);
        }
        res
    }
}

//------------ Traits --------------------------------------------------------

/// Parsing of the NLRI of one [`NlriFamily`].
///
/// Parsers are handed the declared address family, as the AFI can not
/// always be derived from the bytes themselves.
pub trait AfiSafiParse: Sized {
    fn parse(parser: &mut Parser<'_, Bytes>, afisafi: AfiSafiType)
        -> Result<Self, ParseError>;
}

/// Access to the canonical wire form of an NLRI.
///
/// Every NLRI type keeps the bytes it was decoded from (or built into), so
/// composing is a plain copy.
pub trait NlriCompose {
    fn raw(&self) -> &Bytes;

    fn compose_len(&self) -> usize {
        self.raw().len()
    }

    fn compose<Target: OctetsBuilder>(&self, target: &mut Target)
        -> Result<(), Target::AppendError>
    {
        target.append_slice(self.raw())
    }
}

//------------ NlriBody ------------------------------------------------------

/// The family specific part of an [`Nlri`].
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum NlriBody {
    Unicast(UnicastNlri),
    Mpls(MplsNlri),
    MplsVpn(MplsVpnNlri),
    FlowSpec(FlowSpecNlri),
    Evpn(EvpnNlri),
    BgpLs(BgpLsNlri),
    Mup(MupNlri),
    Mvpn(MvpnNlri),
    Vpls(VplsNlri),
    RouteTarget(RouteTargetNlri),
}

impl NlriBody {
    pub fn afisafi(&self) -> AfiSafiType {
        match self {
            NlriBody::Unicast(n) => n.afisafi(),
            NlriBody::Mpls(n) => n.afisafi(),
            NlriBody::MplsVpn(n) => n.afisafi(),
            NlriBody::FlowSpec(n) => n.afisafi(),
            NlriBody::Evpn(_) => AfiSafiType::L2VpnEvpn,
            NlriBody::BgpLs(n) => n.afisafi(),
            NlriBody::Mup(n) => n.afisafi(),
            NlriBody::Mvpn(n) => n.afisafi(),
            NlriBody::Vpls(_) => AfiSafiType::L2VpnVpls,
            NlriBody::RouteTarget(_) => AfiSafiType::Ipv4RouteTarget,
        }
    }

    pub fn raw(&self) -> &Bytes {
        match self {
            NlriBody::Unicast(n) => n.raw(),
            NlriBody::Mpls(n) => n.raw(),
            NlriBody::MplsVpn(n) => n.raw(),
            NlriBody::FlowSpec(n) => n.raw(),
            NlriBody::Evpn(n) => n.raw(),
            NlriBody::BgpLs(n) => n.raw(),
            NlriBody::Mup(n) => n.raw(),
            NlriBody::Mvpn(n) => n.raw(),
            NlriBody::Vpls(n) => n.raw(),
            NlriBody::RouteTarget(n) => n.raw(),
        }
    }
}

impl fmt::Display for NlriBody {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NlriBody::Unicast(n) => fmt::Display::fmt(n, f),
            NlriBody::Mpls(n) => fmt::Display::fmt(n, f),
            NlriBody::MplsVpn(n) => fmt::Display::fmt(n, f),
            NlriBody::FlowSpec(n) => fmt::Display::fmt(n, f),
            NlriBody::Evpn(n) => fmt::Display::fmt(n, f),
            NlriBody::BgpLs(n) => fmt::Display::fmt(n, f),
            NlriBody::Mup(n) => fmt::Display::fmt(n, f),
            NlriBody::Mvpn(n) => fmt::Display::fmt(n, f),
            NlriBody::Vpls(n) => fmt::Display::fmt(n, f),
            NlriBody::RouteTarget(n) => fmt::Display::fmt(n, f),
        }
    }
}

//------------ Nlri ----------------------------------------------------------

/// One route, as carried in an UPDATE message.
///
/// An `Nlri` is immutable. Two values are the same route if their family,
/// path identifier and packed bytes are equal; equality, ordering and
/// hashing are defined on exactly those.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Nlri {
    body: NlriBody,
    path_id: Option<PathId>,
}

impl Nlri {
    pub fn new(body: NlriBody, path_id: Option<PathId>) -> Self {
        Self { body, path_id }
    }

    /// Parses one NLRI of the declared family.
    ///
    /// If `addpath` is set, a 4 byte Path Identifier precedes the NLRI.
    pub fn parse(
        parser: &mut Parser<'_, Bytes>,
        afisafi: AfiSafiType,
        addpath: bool,
    ) -> Result<Self, ParseError> {
        let path_id = if addpath {
            Some(PathId::parse(parser)?)
        } else {
            None
        };
        let body = parse_body(parser, afisafi)?;
        Ok(Self { body, path_id })
    }

    /// Decodes one NLRI from the start of `view`.
    ///
    /// Returns the NLRI and the part of `view` following it.
    pub fn decode(view: &ByteView, afisafi: AfiSafiType, addpath: bool)
        -> Result<(Self, ByteView), ParseError>
    {
        let mut parser = view.parser();
        let nlri = Self::parse(&mut parser, afisafi, addpath)?;
        Ok((nlri, view.remainder(&parser)))
    }

    pub fn afisafi(&self) -> AfiSafiType {
        self.body.afisafi()
    }

    pub fn path_id(&self) -> Option<PathId> {
        self.path_id
    }

    pub fn body(&self) -> &NlriBody {
        &self.body
    }

    pub fn into_body(self) -> NlriBody {
        self.body
    }

    /// Returns the prefix for families that are keyed on one.
    pub fn prefix(&self) -> Option<Prefix> {
        match &self.body {
            NlriBody::Unicast(n) => Some(n.prefix()),
            NlriBody::Mpls(n) => Some(n.prefix()),
            NlriBody::MplsVpn(n) => Some(n.prefix()),
            _ => None,
        }
    }

    pub fn compose_len(&self) -> usize {
        self.path_id.map_or(0, |_| 4) + self.body.raw().len()
    }

    pub fn compose<Target: OctetsBuilder>(&self, target: &mut Target)
        -> Result<(), Target::AppendError>
    {
        if let Some(path_id) = self.path_id {
            path_id.compose(target)?;
        }
        target.append_slice(self.body.raw())
    }

    /// The canonical wire form, including the Path Identifier if any.
    pub fn packed(&self) -> Bytes {
        match self.path_id {
            None => self.body.raw().clone(),
            Some(path_id) => {
                let mut buf = Vec::with_capacity(self.compose_len());
                buf.extend_from_slice(&path_id.0.to_be_bytes());
                buf.extend_from_slice(self.body.raw());
                Bytes::from(buf)
            }
        }
    }
}

macro_rules! nlri_from {
    ($( $family:ident ),+ $(,)*) => { paste! {
        $(
        impl From<[<$family Nlri>]> for Nlri {
            fn from(n: [<$family Nlri>]) -> Self {
                Nlri::new(NlriBody::$family(n), None)
            }
        }
        )+
    }}
}

nlri_from!(
    Unicast, Mpls, MplsVpn, FlowSpec, Evpn, BgpLs, Mup, Mvpn, Vpls,
    RouteTarget
);

impl fmt::Display for Nlri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(path_id) = self.path_id {
            write!(f, "[{}] ", path_id)?;
        }
        fmt::Display::fmt(&self.body, f)
    }
}

//------------ NlriIter ------------------------------------------------------

/// Iterator over the NLRI packed back to back in a byte sequence.
///
/// After the first error the iterator is fused, as there is no way to find
/// the start of the next NLRI.
#[derive(Clone, Debug)]
pub struct NlriIter {
    raw: Bytes,
    pos: usize,
    afisafi: AfiSafiType,
    addpath: bool,
    failed: bool,
}

impl NlriIter {
    pub fn new(raw: Bytes, afisafi: AfiSafiType, addpath: bool) -> Self {
        Self { raw, pos: 0, afisafi, addpath, failed: false }
    }

    pub fn afisafi(&self) -> AfiSafiType {
        self.afisafi
    }

    /// Checks all remaining NLRI without producing them.
    pub fn validate(mut self) -> Result<(), ParseError> {
        self.try_for_each(|n| n.map(|_| ()))
    }
}

impl Iterator for NlriIter {
    type Item = Result<Nlri, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.raw.len() {
            return None;
        }
        let mut parser = Parser::from_ref(&self.raw);
        if let Err(e) = parser.seek(self.pos) {
            self.failed = true;
            return Some(Err(e.into()));
        }
        match Nlri::parse(&mut parser, self.afisafi, self.addpath) {
            Ok(n) => {
                self.pos = parser.pos();
                Some(Ok(n))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn afisafi_table() {
        assert_eq!(AfiSafiType::from((1, 1)), AfiSafiType::Ipv4Unicast);
        assert_eq!(AfiSafiType::from((2, 128)), AfiSafiType::Ipv6MplsVpnUnicast);
        assert_eq!(
            AfiSafiType::from((16388, 71)),
            AfiSafiType::LinkStateBgpLs
        );
        assert_eq!(AfiSafiType::from((2, 132)), AfiSafiType::Unsupported(2, 132));
        assert_eq!(
            <(u16, u8)>::from(AfiSafiType::L2VpnEvpn),
            (25, 70)
        );
        assert_eq!(AfiSafiType::Ipv6FlowSpec.as_bytes(), [0, 2, 133]);
        assert_eq!(AfiSafiType::Ipv4Mup.afi(), Afi::Ipv4);
        assert_eq!(AfiSafiType::Ipv4Mup.safi(), Safi::Mup);
        assert_eq!(
            AfiSafiType::Ipv4FlowSpecVpn.family(),
            Some(NlriFamily::FlowSpec)
        );
        assert_eq!(AfiSafiType::Ipv6Multicast.to_string(), "Ipv6Multicast");
        assert!(AfiSafiType::ALL.len() < 64);
    }

    #[test]
    fn afisafi_set() {
        let mut set = AfiSafiSet::empty();
        assert!(set.insert(AfiSafiType::Ipv6Unicast));
        assert!(set.insert(AfiSafiType::L2VpnEvpn));
        assert!(!set.insert(AfiSafiType::Unsupported(3, 3)));
        assert!(set.contains(AfiSafiType::Ipv6Unicast));
        assert!(!set.contains(AfiSafiType::Ipv4Unicast));
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![AfiSafiType::Ipv6Unicast, AfiSafiType::L2VpnEvpn]
        );
        set.remove(AfiSafiType::Ipv6Unicast);
        assert!(!set.contains(AfiSafiType::Ipv6Unicast));
        assert!(AfiSafiSet::all().contains(AfiSafiType::LinkStateBgpLsVpn));
    }

    #[test]
    fn unicast_with_addpath() {
        let raw = Bytes::from_static(&[
            0x00, 0x00, 0x00, 0x01, 0x18, 0x0a, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x02, 0x10, 0xc0, 0xa8,
        ]);
        let nlris = NlriIter::new(raw, AfiSafiType::Ipv4Unicast, true)
            .collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(nlris.len(), 2);
        assert_eq!(nlris[0].path_id(), Some(PathId(1)));
        assert_eq!(
            nlris[1].prefix(),
            Some(Prefix::from_str("192.168.0.0/16").unwrap())
        );
        assert_eq!(nlris[1].to_string(), "[2] 192.168.0.0/16");
        assert_eq!(
            nlris[0].packed().as_ref(),
            &[0x00, 0x00, 0x00, 0x01, 0x18, 0x0a, 0x00, 0x00]
        );
    }

    #[test]
    fn iter_fuses_after_error() {
        // second NLRI claims /33
        let raw = Bytes::from_static(&[0x08, 0x0a, 0x21, 0x0a]);
        let mut iter = NlriIter::new(raw, AfiSafiType::Ipv4Unicast, false);
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }

    #[test]
    fn decode_returns_remainder() {
        let view = ByteView::from_static(&[0x10, 0x0a, 0x01, 0xff, 0xee]);
        let (nlri, rest) = Nlri::decode(
            &view, AfiSafiType::Ipv4Multicast, false
        ).unwrap();
        assert_eq!(nlri.afisafi(), AfiSafiType::Ipv4Multicast);
        assert_eq!(rest.as_ref(), &[0xff, 0xee]);
    }

    #[test]
    fn same_bytes_different_afi() {
        // a /8 reads fine as both IPv4 and IPv6, the declared family
        // decides
        let view = ByteView::from_static(&[0x08, 0x20]);
        let (v4, _) = Nlri::decode(&view, AfiSafiType::Ipv4Unicast, false)
            .unwrap();
        let (v6, _) = Nlri::decode(&view, AfiSafiType::Ipv6Unicast, false)
            .unwrap();
        assert_eq!(v4.packed(), v6.packed());
        assert_ne!(v4, v6);
        assert_eq!(v4.prefix(), Some(Prefix::from_str("32.0.0.0/8").unwrap()));
        assert_eq!(v6.prefix(), Some(Prefix::from_str("2000::/8").unwrap()));
    }

    #[test]
    fn unsupported_family() {
        let view = ByteView::from_static(&[0x08, 0x20]);
        assert_eq!(
            Nlri::decode(&view, AfiSafiType::Unsupported(1, 200), false)
                .unwrap_err(),
            ParseError::Unsupported
        );
    }
}
