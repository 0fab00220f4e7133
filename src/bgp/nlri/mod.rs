//! NLRI for all supported address families.
//!
//! Every NLRI type keeps its canonical wire bytes and derives everything
//! else from those. The family of an NLRI is always supplied by the
//! context it is parsed in, never guessed from its bytes.

pub mod afisafi;
pub mod bgpls;
pub(crate) mod common;
pub mod evpn;
pub mod flowspec;
pub mod mpls;
pub mod mpls_vpn;
pub mod mup;
pub mod mvpn;
pub mod nexthop;
pub mod qualifier;
pub mod routetarget;
pub mod settings;
pub mod unicast;
pub mod vpls;

pub use self::afisafi::{
    Afi, AfiSafiSet, AfiSafiType, AddpathDirection, Nlri, NlriBody,
    NlriCompose, NlriFamily, NlriIter, Safi,
};
pub use self::nexthop::NextHop;
pub use self::qualifier::{
    EthernetTag, Esi, Label, Labels, PathId, RouteDistinguisher,
};
pub use self::settings::NlriSettings;
