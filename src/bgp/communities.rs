//! The community flavours carried in path attributes.
//!
//! There is support for
//!  * Standard Communities, RFC1997, including well-known communities,
//!  * Extended Communities, RFC4360,
//!  * Large Communities, RFC8092.
//!
//! For Extended Communities, constructors and pretty printing cover the
//! Route Target and Route Origin subtypes. All others can be created from
//! raw bytes and print as hex.
//!
//! ```
//! use routewire::bgp::communities::{Community, StandardCommunity, Wellknown};
//!
//! let no_export = Community::from([0xff, 0xff, 0xff, 0x01]);
//! assert_eq!(no_export.to_wellknown(), Some(Wellknown::NoExport));
//! assert_eq!(no_export.to_string(), "NO_EXPORT");
//!
//! let c = Community::from(StandardCommunity::new(1234, 7890));
//! assert_eq!(c.to_string(), "AS1234:7890");
//! ```

use std::fmt::{Display, Error, Formatter};
use std::net::Ipv4Addr;

use inetnum::asn::Asn;

//--- Community --------------------------------------------------------------

/// Standard, Extended and Large Community variants.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Community {
    Standard(StandardCommunity),
    Extended(ExtendedCommunity),
    Large(LargeCommunity),
}

impl Community {
    pub fn to_wellknown(self) -> Option<Wellknown> {
        match self {
            Community::Standard(sc) => sc.to_wellknown(),
            _ => None
        }
    }

    /// Returns the AS number in the global administrator part, if any.
    pub fn asn(self) -> Option<Asn> {
        match self {
            Community::Standard(sc) => sc.asn(),
            Community::Extended(e) => match e.global_admin() {
                GlobalAdmin::As2(asn) => Some(Asn::from_u32(asn.into())),
                GlobalAdmin::As4(asn) => Some(asn),
                _ => None,
            },
            Community::Large(lc) => Some(lc.asn()),
        }
    }
}

impl AsRef<[u8]> for Community {
    fn as_ref(&self) -> &[u8] {
        match self {
            Community::Standard(c) => c.as_ref(),
            Community::Extended(c) => c.as_ref(),
            Community::Large(c) => c.as_ref(),
        }
    }
}

impl From<[u8; 4]> for Community {
    fn from(raw: [u8; 4]) -> Community {
        Community::Standard(StandardCommunity(raw))
    }
}

impl From<[u8; 8]> for Community {
    fn from(raw: [u8; 8]) -> Community {
        Community::Extended(ExtendedCommunity(raw))
    }
}

impl From<[u8; 12]> for Community {
    fn from(raw: [u8; 12]) -> Community {
        Community::Large(LargeCommunity(raw))
    }
}

impl From<StandardCommunity> for Community {
    fn from(sc: StandardCommunity) -> Self {
        Community::Standard(sc)
    }
}

impl From<Wellknown> for Community {
    fn from(wk: Wellknown) -> Self {
        Community::Standard(wk.into())
    }
}

impl From<ExtendedCommunity> for Community {
    fn from(ec: ExtendedCommunity) -> Self {
        Community::Extended(ec)
    }
}

impl From<LargeCommunity> for Community {
    fn from(lc: LargeCommunity) -> Self {
        Community::Large(lc)
    }
}

impl Display for Community {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        match self {
            Community::Standard(c) => Display::fmt(c, f),
            Community::Extended(c) => Display::fmt(c, f),
            Community::Large(c) => Display::fmt(c, f),
        }
    }
}

//--- Wellknown --------------------------------------------------------------

macro_rules! wellknown {
    ($name:ident,
        $($hex:expr => $var:ident, $pprim:expr ;)+
    )
    => {

        #[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        /// Well-known communities as registered by IANA.
        ///
        /// | u32 | enum variant | prints as |
        /// | --- | ---          | ---       |
        $(#[doc = concat!(
           "|", stringify!($hex),
           "|", stringify!($var),
           "|", $pprim,
           "|")])+
        pub enum $name {
            $(
            $var),+,
            Unrecognized(u16)
        }

        impl $name {
            pub fn to_u32(self) -> u32 {
                match self {
                    $($name::$var => $hex,)+
                    $name::Unrecognized(n) => (0xffff0000_u32 | n as u32)
                }
            }
        }

        impl TryFrom<u32> for $name {
            type Error = NotWellknown;

            fn try_from(n: u32) -> Result<Self, NotWellknown> {
                match n {
                    $($hex => Ok($name::$var),)+
                    n if n & 0xffff0000 == 0xffff0000 => {
                        Ok($name::Unrecognized(n as u16))
                    }
                    _ => Err(NotWellknown(n))
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
                match self {
                    $($name::$var => write!(f, $pprim),)+
                    $name::Unrecognized(n) => {
                        write!(f, "0x{:08X}", 0xffff0000_u32 | *n as u32)
                    }
                }
            }
        }
    };
}

wellknown!(Wellknown,
    0xFFFF0000 => GracefulShutdown, "GRACEFUL_SHUTDOWN";
    0xFFFF0001 => AcceptOwn, "ACCEPT_OWN";
    0xFFFF0002 => RouteFilterTranslatedV4, "ROUTE_FILTER_TRANSLATED_v4";
    0xFFFF0003 => RouteFilterV4, "ROUTE_FILTER_v4";
    0xFFFF0004 => RouteFilterTranslatedV6, "ROUTE_FILTER_TRANSLATED_v6";
    0xFFFF0005 => RouteFilterV6, "ROUTE_FILTER_v6";
    0xFFFF0006 => LlgrStale, "LLGR_STALE";
    0xFFFF0007 => NoLlgr, "NO_LLGR";
    0xFFFF0008 => AcceptOwnNexthop, "ACCEPT_OWN_NEXTHOP";
    0xFFFF0009 => StandbyPe, "STANDBY_PE";

    0xFFFFFF01 => NoExport, "NO_EXPORT";
    0xFFFFFF02 => NoAdvertise, "NO_ADVERTISE";
    0xFFFFFF03 => NoExportSubconfed, "NO_EXPORT_SUBCONFED";
    0xFFFFFF04 => NoPeer, "NOPEER";

    0xFFFF029A => Blackhole, "BLACKHOLE";
);

//--- StandardCommunity ------------------------------------------------------

/// Conventional, RFC1997 4-byte community.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StandardCommunity([u8; 4]);

impl StandardCommunity {
    pub fn new(asn: u16, tag: u16) -> StandardCommunity {
        let a = asn.to_be_bytes();
        let t = tag.to_be_bytes();
        StandardCommunity([a[0], a[1], t[0], t[1]])
    }

    pub fn from_raw(raw: [u8; 4]) -> Self {
        Self(raw)
    }

    pub fn from_u32(raw: u32) -> StandardCommunity {
        StandardCommunity(raw.to_be_bytes())
    }

    pub fn to_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub fn to_raw(self) -> [u8; 4] {
        self.0
    }

    // Route servers use the reserved 0:xxx, these return AS0.
    pub fn asn(self) -> Option<Asn> {
        if self.is_wellknown() {
            return None
        }
        Some(Asn::from_u32(u16::from_be_bytes([self.0[0], self.0[1]]).into()))
    }

    pub fn tag(self) -> Option<u16> {
        if self.is_wellknown() {
            return None
        }
        Some(u16::from_be_bytes([self.0[2], self.0[3]]))
    }

    pub fn is_wellknown(self) -> bool {
        matches!(self.0, [0xff, 0xff, _, _])
    }

    pub fn to_wellknown(self) -> Option<Wellknown> {
        Wellknown::try_from(self.to_u32()).ok()
    }
}

impl AsRef<[u8]> for StandardCommunity {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<u32> for StandardCommunity {
    fn from(n: u32) -> StandardCommunity {
        StandardCommunity::from_u32(n)
    }
}

impl From<Wellknown> for StandardCommunity {
    fn from(wk: Wellknown) -> Self {
        StandardCommunity::from_u32(wk.to_u32())
    }
}

// The reserved 0x0000xxxx print as AS0:xxxx.
impl Display for StandardCommunity {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        match (self.to_wellknown(), self.asn(), self.tag()) {
            (Some(wk), _, _) => write!(f, "{}", wk),
            (None, Some(asn), Some(tag)) => write!(f, "{}:{}", asn, tag),
            _ => write!(f, "0x{:08X}", self.to_u32()),
        }
    }
}

//--- ExtendedCommunity ------------------------------------------------------

/// Extended Community as defined in RFC4360.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExtendedCommunity([u8; 8]);

impl ExtendedCommunity {
    pub fn from_raw(raw: [u8; 8]) -> Self {
        Self(raw)
    }

    pub fn to_raw(self) -> [u8; 8] {
        self.0
    }

    pub fn type_raw(self) -> u8 {
        self.0[0]
    }

    pub fn types(self) -> (ExtendedCommunityType, ExtendedCommunitySubType) {
        use ExtendedCommunityType::*;
        use ExtendedCommunitySubType::*;
        match (self.0[0], self.0[1]) {
            (0x00, 0x02) => (TransitiveTwoOctetSpecific, RouteTarget),
            (0x00, 0x03) => (TransitiveTwoOctetSpecific, RouteOrigin),
            (0x00, b)    => (TransitiveTwoOctetSpecific, OtherSubType(b)),

            (0x01, 0x02) => (TransitiveIp4Specific, RouteTarget),
            (0x01, 0x03) => (TransitiveIp4Specific, RouteOrigin),
            (0x01, b)    => (TransitiveIp4Specific, OtherSubType(b)),

            (0x02, 0x02) => (TransitiveFourOctetSpecific, RouteTarget),
            (0x02, 0x03) => (TransitiveFourOctetSpecific, RouteOrigin),
            (0x02, b)    => (TransitiveFourOctetSpecific, OtherSubType(b)),

            (0x03, b)    => (TransitiveOpaque, OtherSubType(b)),

            (0x40, b)    => (NonTransitiveTwoOctetSpecific, OtherSubType(b)),
            (0x41, b)    => (NonTransitiveIp4Specific, OtherSubType(b)),
            (0x42, b)    => (NonTransitiveFourOctetSpecific, OtherSubType(b)),
            (0x43, 0x02) => (NonTransitiveOpaque, RouteTarget),
            (0x43, b)    => (NonTransitiveOpaque, OtherSubType(b)),

            (t, b) => (OtherType(t), OtherSubType(b))
        }
    }

    /// Returns true for route targets of any type.
    pub fn is_route_target(self) -> bool {
        self.types().1 == ExtendedCommunitySubType::RouteTarget
    }

    pub fn is_transitive(self) -> bool {
        self.type_raw() & 0x40 == 0x00
    }

    fn with_value(typ: u8, subtyp: u8, value: [u8; 6]) -> Self {
        let v = value;
        ExtendedCommunity([typ, subtyp, v[0], v[1], v[2], v[3], v[4], v[5]])
    }

    fn as2_value(global: u16, local: u32) -> [u8; 6] {
        let g = global.to_be_bytes();
        let l = local.to_be_bytes();
        [g[0], g[1], l[0], l[1], l[2], l[3]]
    }

    fn four_octet_value(global: [u8; 4], local: u16) -> [u8; 6] {
        let l = local.to_be_bytes();
        [global[0], global[1], global[2], global[3], l[0], l[1]]
    }

    //--- route target constructors

    pub fn transitive_as2_route_target(global: u16, local: u32) -> Self {
        Self::with_value(0x00, 0x02, Self::as2_value(global, local))
    }

    pub fn transitive_as4_route_target(global: Asn, local: u16) -> Self {
        Self::with_value(
            0x02, 0x02, Self::four_octet_value(global.to_raw(), local)
        )
    }

    pub fn transitive_ip4_route_target(global: Ipv4Addr, local: u16) -> Self {
        Self::with_value(
            0x01, 0x02, Self::four_octet_value(global.octets(), local)
        )
    }

    /// Returns the global administrator of the specific types.
    pub fn global_admin(self) -> GlobalAdmin {
        use ExtendedCommunityType::*;
        let v = &self.0;
        match self.types().0 {
            TransitiveTwoOctetSpecific | NonTransitiveTwoOctetSpecific => {
                GlobalAdmin::As2(u16::from_be_bytes([v[2], v[3]]))
            }
            TransitiveFourOctetSpecific | NonTransitiveFourOctetSpecific => {
                GlobalAdmin::As4(Asn::from_u32(
                    u32::from_be_bytes([v[2], v[3], v[4], v[5]])
                ))
            }
            TransitiveIp4Specific | NonTransitiveIp4Specific => {
                GlobalAdmin::Ipv4(Ipv4Addr::new(v[2], v[3], v[4], v[5]))
            }
            _ => GlobalAdmin::None,
        }
    }

    /// Returns the local administrator of the specific types.
    pub fn local_admin(self) -> Option<u32> {
        let v = &self.0;
        match self.global_admin() {
            GlobalAdmin::As2(_) => {
                Some(u32::from_be_bytes([v[4], v[5], v[6], v[7]]))
            }
            GlobalAdmin::As4(_) | GlobalAdmin::Ipv4(_) => {
                Some(u16::from_be_bytes([v[6], v[7]]).into())
            }
            GlobalAdmin::None => None,
        }
    }
}

/// The global administrator field of an [`ExtendedCommunity`].
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum GlobalAdmin {
    As2(u16),
    As4(Asn),
    Ipv4(Ipv4Addr),
    None,
}

impl Display for GlobalAdmin {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        match self {
            GlobalAdmin::As2(asn) => write!(f, "{}", asn),
            GlobalAdmin::As4(asn) => write!(f, "{}", asn),
            GlobalAdmin::Ipv4(addr) => write!(f, "{}", addr),
            GlobalAdmin::None => Ok(()),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ExtendedCommunityType {
    TransitiveTwoOctetSpecific,
    TransitiveIp4Specific,
    TransitiveFourOctetSpecific,
    TransitiveOpaque,
    NonTransitiveTwoOctetSpecific,
    NonTransitiveIp4Specific,
    NonTransitiveFourOctetSpecific,
    NonTransitiveOpaque,
    OtherType(u8)
}

#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ExtendedCommunitySubType {
    RouteTarget,
    RouteOrigin,
    OtherSubType(u8),
}

impl AsRef<[u8]> for ExtendedCommunity {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for ExtendedCommunity {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        use ExtendedCommunitySubType::*;

        let tag = match self.types().1 {
            RouteTarget => "rt",
            RouteOrigin => "ro",
            OtherSubType(_) => "",
        };
        if self.is_transitive() && !tag.is_empty() {
            if let Some(local) = self.local_admin() {
                return write!(f, "{}:{}:{}", tag, self.global_admin(), local)
            }
        }
        write!(f, "0x")?;
        for b in &self.0 {
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

//--- LargeCommunity ---------------------------------------------------------

/// Large Community as defined in RFC8092.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LargeCommunity([u8; 12]);

impl LargeCommunity {
    pub fn new(global: u32, local1: u32, local2: u32) -> Self {
        let mut raw = [0u8; 12];
        raw[0..4].copy_from_slice(&global.to_be_bytes());
        raw[4..8].copy_from_slice(&local1.to_be_bytes());
        raw[8..12].copy_from_slice(&local2.to_be_bytes());
        Self(raw)
    }

    pub fn from_raw(raw: [u8; 12]) -> Self {
        Self(raw)
    }

    pub fn to_raw(self) -> [u8; 12] {
        self.0
    }

    pub fn asn(self) -> Asn {
        Asn::from_u32(self.global())
    }

    fn u32_at(self, at: usize) -> u32 {
        u32::from_be_bytes(
            [self.0[at], self.0[at + 1], self.0[at + 2], self.0[at + 3]]
        )
    }

    pub fn global(self) -> u32 {
        self.u32_at(0)
    }

    pub fn local1(self) -> u32 {
        self.u32_at(4)
    }

    pub fn local2(self) -> u32 {
        self.u32_at(8)
    }
}

impl AsRef<[u8]> for LargeCommunity {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for LargeCommunity {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "{}:{}:{}", self.global(), self.local1(), self.local2())
    }
}

//--- Error ------------------------------------------------------------------

/// A value outside of the well-known community range.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NotWellknown(pub u32);

impl Display for NotWellknown {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "0x{:08X} is not a well-known community", self.0)
    }
}

impl std::error::Error for NotWellknown {}

//--- tests ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wellknowns() {
        let sc = StandardCommunity::from_raw([0xff, 0xff, 0xff, 0x01]);
        assert!(sc.is_wellknown());
        assert_eq!(sc, Wellknown::NoExport.into());
        assert_eq!(sc.asn(), None);
        assert_eq!(sc.tag(), None);
        assert_eq!(sc.to_string(), "NO_EXPORT");
        assert_eq!(Wellknown::NoAdvertise.to_string(), "NO_ADVERTISE");
        assert_eq!(Wellknown::Blackhole.to_u32(), 0xffff029a);

        let u = StandardCommunity::from_u32(0xFFFF9999);
        assert_eq!(u.to_wellknown(), Some(Wellknown::Unrecognized(0x9999)));
        assert_eq!(u.to_string(), "0xFFFF9999");

        assert_eq!(Wellknown::try_from(0xffff0001), Ok(Wellknown::AcceptOwn));
        assert_eq!(
            Wellknown::try_from(0x0fff0001),
            Err(NotWellknown(0x0fff0001))
        );
    }

    #[test]
    fn standard() {
        let sc = StandardCommunity::new(100, 666);
        assert_eq!(sc.to_raw(), [0x00, 0x64, 0x02, 0x9a]);
        assert_eq!(sc.to_string(), "AS100:666");
        assert_eq!(sc.asn(), Some(Asn::from_u32(100)));
        assert_eq!(sc.tag(), Some(666));

        // reserved range prints as AS0
        let reserved = StandardCommunity::from_u32(52005);
        assert_eq!(reserved.asn(), Some(Asn::from_u32(0)));
        assert_eq!(reserved.to_string(), "AS0:52005");
    }

    #[test]
    fn extended() {
        use ExtendedCommunity as EC;
        let rt = EC::transitive_as2_route_target(65000, 1);
        assert_eq!(rt.to_raw(), [0x00, 0x02, 0xfd, 0xe8, 0, 0, 0, 1]);
        assert!(rt.is_route_target());
        assert!(rt.is_transitive());
        assert_eq!(rt.global_admin(), GlobalAdmin::As2(65000));
        assert_eq!(rt.local_admin(), Some(1));
        assert_eq!(rt.to_string(), "rt:65000:1");

        let rt = EC::transitive_as4_route_target(Asn::from_u32(66001), 7);
        assert_eq!(rt.to_string(), "rt:AS66001:7");
        let rt = EC::transitive_ip4_route_target(Ipv4Addr::new(192, 0, 2, 1), 7);
        assert_eq!(rt.to_string(), "rt:192.0.2.1:7");

        // route origin, AS2 specific
        let ro = EC::from_raw([0x00, 0x03, 0x04, 0xd2, 0, 0, 0x03, 0x15]);
        assert_eq!(ro.to_string(), "ro:1234:789");
        assert!(!ro.is_route_target());

        let raw = EC::from_raw([0x80, 0x06, 0, 0, 0, 0, 0, 0]);
        assert_eq!(raw.to_string(), "0x8006000000000000");
        assert_eq!(raw.global_admin(), GlobalAdmin::None);
        assert!(!raw.is_transitive());
    }

    #[test]
    fn large() {
        let lc = LargeCommunity::new(1234, 5, 6);
        assert_eq!(lc.to_raw()[..4], [0, 0, 0x04, 0xd2]);
        assert_eq!(lc.to_string(), "1234:5:6");
        assert_eq!(lc.asn(), Asn::from_u32(1234));
        assert_eq!(lc.local1(), 5);
        assert_eq!(lc.local2(), 6);
    }

    #[test]
    fn community_asn() {
        let c: Community =
            ExtendedCommunity::transitive_as2_route_target(1234, 789).into();
        assert_eq!(c.asn(), Some(Asn::from_u32(1234)));
        let c: Community = Wellknown::NoPeer.into();
        assert_eq!(c.asn(), None);
        assert_eq!(c.to_string(), "NOPEER");
        let c = Community::from([0u8; 12]);
        assert_eq!(c.asn(), Some(Asn::from_u32(0)));
    }
}
