//! A wire format codec for BGP UPDATE messages.
//!
//! The crate turns received UPDATE messages into typed NLRI and path
//! attributes, and packs route changes back into UPDATE messages no larger
//! than a session allows. It does not run BGP sessions: everything learned
//! in the OPEN exchange is handed in through a
//! [`SessionConfig`][bgp::message::SessionConfig].
//!
//! All values keep the bytes they were parsed from in a [`ByteView`] or a
//! [`Bytes`][bytes::Bytes] and decode lazily, so a received message is only
//! decoded as far as it is looked at.

pub mod bgp;
pub mod view;

pub use view::ByteView;

//--- Private modules

mod util;
