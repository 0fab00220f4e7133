use std::fmt;

use bytes::Bytes;
use octseq::Parser;

use crate::bgp::message::{Header, MsgType};
use crate::typeenum; // from util::macros
use crate::util::parser::ParseError;

typeenum!(
/// NOTIFICATION error codes, RFC 4271 section 4.5.
    ErrorCode, u8,
    {
        1 => MessageHeaderError,
        2 => OpenMessageError,
        3 => UpdateMessageError,
        4 => HoldTimerExpired,
        5 => FiniteStateMachineError,
        6 => Cease,
    });

typeenum!(
/// Subcodes for the Message Header Error code.
    MessageHeaderError, u8,
    {
        1 => ConnectionNotSynchronized,
        2 => BadMessageLength,
        3 => BadMessageType,
    });

typeenum!(
/// Subcodes for the UPDATE Message Error code.
///
/// Subcode 7 (AS Routing Loop) is deprecated and intentionally left out.
    UpdateMessageError, u8,
    {
        1 => MalformedAttributeList,
        2 => UnrecognizedWellknownAttribute,
        3 => MissingWellknownAttribute,
        4 => AttributeFlagsError,
        5 => AttributeLengthError,
        6 => InvalidOriginAttribute,
        8 => InvalidNextHopAttribute,
        9 => OptionalAttributeError,
        10 => InvalidNetworkField,
        11 => MalformedAsPath,
    });

//------------ Notification --------------------------------------------------

/// The (code, subcode) pair a BGP speaker sends for a given error.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Notification {
    code: ErrorCode,
    subcode: u8,
}

impl Notification {
    pub fn new(code: ErrorCode, subcode: u8) -> Self {
        Self { code, subcode }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn subcode(&self) -> u8 {
        self.subcode
    }

    /// Returns the subcode as an [`UpdateMessageError`], if applicable.
    pub fn update_error(&self) -> Option<UpdateMessageError> {
        match self.code {
            ErrorCode::UpdateMessageError => Some(self.subcode.into()),
            _ => None,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.code {
            ErrorCode::MessageHeaderError => write!(
                f, "{}/{}",
                self.code, MessageHeaderError::from(self.subcode)
            ),
            ErrorCode::UpdateMessageError => write!(
                f, "{}/{}",
                self.code, UpdateMessageError::from(self.subcode)
            ),
            _ => write!(f, "{}/{}", self.code, self.subcode),
        }
    }
}

//------------ NotificationMessage -------------------------------------------

/// BGP NOTIFICATION message.
///
/// The session layer sends one of these when an UPDATE is rejected in a way
/// RFC 7606 does not allow to recover from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NotificationMessage {
    octets: Bytes,
}

impl NotificationMessage {
    /// Composes a NOTIFICATION for the given error, carrying `data`.
    pub fn for_error(err: &ParseError, data: &[u8]) -> Self {
        Self::new(err.notification(), data)
    }

    pub fn new(notification: Notification, data: &[u8]) -> Self {
        // Data that does not fit is cut off, the code and subcode are what
        // matters to the receiving end.
        let max_data = usize::from(u16::MAX) - Header::LEN - 2;
        let data = &data[..data.len().min(max_data)];
        let len = Header::LEN + 2 + data.len();
        let mut buf = Vec::with_capacity(len);
        Header::compose(
            u16::try_from(len).unwrap_or(u16::MAX),
            MsgType::Notification,
            &mut buf
        );
        buf.push(notification.code.into());
        buf.push(notification.subcode);
        buf.extend_from_slice(data);
        Self { octets: Bytes::from(buf) }
    }

    pub fn from_octets(octets: Bytes) -> Result<Self, ParseError> {
        let mut parser = Parser::from_ref(&octets);
        let hdr = Header::parse(&mut parser)?;
        if hdr.msg_type() != MsgType::Notification {
            return Err(ParseError::form_error("not a NOTIFICATION message"));
        }
        // code and subcode are mandatory
        parser.check_len(2)?;
        Ok(Self { octets })
    }

    pub fn notification(&self) -> Notification {
        Notification::new(self.code(), self.subcode())
    }

    pub fn code(&self) -> ErrorCode {
        self.octets[Header::LEN].into()
    }

    pub fn subcode(&self) -> u8 {
        self.octets[Header::LEN + 1]
    }

    pub fn data(&self) -> Option<&[u8]> {
        if self.octets.len() > Header::LEN + 2 {
            Some(&self.octets[Header::LEN + 2..])
        } else {
            None
        }
    }
}

impl AsRef<[u8]> for NotificationMessage {
    fn as_ref(&self) -> &[u8] {
        self.octets.as_ref()
    }
}

//--- Tests ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification() {
        let buf = vec![
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0x00, 0x15, 0x03, 0x06, 0x04
        ];
        let notification = NotificationMessage::from_octets(
            Bytes::from(buf)
        ).unwrap();

        assert_eq!(notification.code(), ErrorCode::Cease);
        assert_eq!(notification.subcode(), 4);
        assert_eq!(notification.data(), None);
    }

    #[test]
    fn compose_for_parse_error() {
        let err = ParseError::update_error(
            UpdateMessageError::AttributeLengthError,
            "attribute length exceeds remaining bytes"
        );
        let msg = NotificationMessage::for_error(&err, &[0x80, 0x0e, 0xff]);
        assert_eq!(
            msg.as_ref(),
            &[
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
                0x00, 0x18, 0x03, 0x03, 0x05, 0x80, 0x0e, 0xff
            ]
        );
        let parsed = NotificationMessage::from_octets(
            Bytes::copy_from_slice(msg.as_ref())
        ).unwrap();
        assert_eq!(
            parsed.notification().update_error(),
            Some(UpdateMessageError::AttributeLengthError)
        );
        assert_eq!(
            parsed.notification().to_string(),
            "UpdateMessageError/AttributeLengthError"
        );
    }
}
