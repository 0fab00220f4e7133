pub mod nlri_collection;
pub mod notification;
pub mod session_config;
pub mod update;
pub mod update_builder;
pub mod update_collection;

use std::fmt;

use octseq::Parser;

use crate::typeenum; // from util::macros
use crate::util::parser::ParseError;

use notification::MessageHeaderError;

pub use nlri_collection::{
    MpReachNlri, MpUnreachNlri, NlriCollection
};
pub use notification::{Notification, NotificationMessage};
pub use session_config::SessionConfig;
pub use update::UpdateMessage;
pub use update_builder::{ComposeError, UpdateBuilder};
pub use update_collection::{Action, RouteChange, UpdateCollection};

typeenum!(
/// BGP Message types.
    MsgType, u8,
    {
        1 => Open,
        2 => Update,
        3 => Notification,
        4 => Keepalive,
        5 => RouteRefresh,
    });

//--- Header -----------------------------------------------------------------
// As per RFC4271:
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |                                                               |
//  +                                                               +
//  |                                                               |
//  +                                                               +
//  |                           Marker                              |
//  +                                                               +
//  |                                                               |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |          Length               |      Type     |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

/// BGP Message header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    length: u16,
    msg_type: MsgType,
}

impl Header {
    pub const LEN: usize = 19;

    const MARKER: [u8; 16] = [0xff; 16];

    /// Parses and checks the header at the start of a complete message.
    ///
    /// The length field must cover exactly the bytes the parser was
    /// created over, so a header can only be parsed from a message that
    /// has been framed already.
    pub fn parse<R: AsRef<[u8]> + ?Sized>(parser: &mut Parser<'_, R>)
        -> Result<Self, ParseError>
    {
        let mut marker = [0u8; 16];
        parser.parse_buf(&mut marker)?;
        if marker != Self::MARKER {
            return Err(ParseError::header_error(
                MessageHeaderError::ConnectionNotSynchronized,
                "invalid BGP marker"
            ));
        }
        let length = parser.parse_u16_be()?;
        let msg_type = parser.parse_u8()?.into();
        let total = parser.pos() + parser.remaining();
        if usize::from(length) < Self::LEN || usize::from(length) != total {
            return Err(ParseError::header_error(
                MessageHeaderError::BadMessageLength,
                "invalid message length"
            ));
        }
        if let MsgType::Unimplemented(_) = msg_type {
            return Err(ParseError::header_error(
                MessageHeaderError::BadMessageType,
                "invalid message type"
            ));
        }
        Ok(Self { length, msg_type })
    }

    /// Appends a header for a message of `length` bytes in total.
    pub fn compose(length: u16, msg_type: MsgType, target: &mut Vec<u8>) {
        target.extend_from_slice(&Self::MARKER);
        target.extend_from_slice(&length.to_be_bytes());
        target.push(msg_type.into());
    }

    /// Returns the value of the length field in this header.
    pub fn length(&self) -> u16 {
        self.length
    }

    /// Returns the value of the message type field in this header.
    pub fn msg_type(&self) -> MsgType {
        self.msg_type
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.msg_type, self.length)
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn keepalive() -> Vec<u8> {
        let mut buf = Vec::new();
        Header::compose(19, MsgType::Keepalive, &mut buf);
        buf
    }

    #[test]
    fn header() {
        let buf = keepalive();
        let hdr = Header::parse(&mut Parser::from_ref(&buf[..])).unwrap();
        assert_eq!(hdr.msg_type(), MsgType::Keepalive);
        assert_eq!(hdr.length(), 19);
    }

    #[test]
    fn header_errors() {
        let mut buf = keepalive();
        buf[0] = 0;
        let err = Header::parse(&mut Parser::from_ref(&buf[..])).unwrap_err();
        assert_eq!(err.notification().subcode(), 1);

        // length does not match the buffer
        let mut buf = keepalive();
        buf.push(0);
        let err = Header::parse(&mut Parser::from_ref(&buf[..])).unwrap_err();
        assert_eq!(err.notification().subcode(), 2);

        let mut buf = keepalive();
        buf[18] = 9;
        let err = Header::parse(&mut Parser::from_ref(&buf[..])).unwrap_err();
        assert_eq!(err.notification().subcode(), 3);

        assert_eq!(
            Header::parse(&mut Parser::from_ref(&keepalive()[..10])),
            Err(ParseError::ShortInput)
        );
    }
}
