use core::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use octseq::Parser;

use crate::bgp::message::notification::{
    ErrorCode, MessageHeaderError, Notification, UpdateMessageError
};

//--------- Address helpers --------------------------------------------------

pub fn parse_ipv4addr<R: AsRef<[u8]> + ?Sized>(parser: &mut Parser<'_, R>)
    -> Result<Ipv4Addr, ParseError>
{
    let mut buf = [0u8; 4];
    parser.parse_buf(&mut buf)?;
    Ok(Ipv4Addr::from(buf))
}

pub fn parse_ipv6addr<R: AsRef<[u8]> + ?Sized>(parser: &mut Parser<'_, R>)
    -> Result<Ipv6Addr, ParseError>
{
    let mut buf = [0u8; 16];
    parser.parse_buf(&mut buf)?;
    Ok(Ipv6Addr::from(buf))
}

/// Returns an error unless the parser has been fully consumed.
pub fn check_exhausted<R: AsRef<[u8]> + ?Sized>(
    parser: &Parser<'_, R>,
    msg: &'static str,
) -> Result<(), ParseError> {
    if parser.remaining() != 0 {
        return Err(ParseError::form_error(msg));
    }
    Ok(())
}

//--------- ParseError -------------------------------------------------------

/// An error happened while parsing data.
///
/// Errors start out unclassified (`ShortInput`, `Form`, `Unsupported`) at
/// the place where the offending bytes are read. The layer that knows the
/// context, e.g. the path attribute loop of an UPDATE message, classifies
/// them into the NOTIFICATION error subcode a BGP speaker would send back.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError {
    /// An attempt was made to go beyond the end of the parser.
    ShortInput,

    /// A formatting error occurred.
    Form(FormError),

    /// The input is well-formed but describes something we do not handle.
    Unsupported,

    /// An UPDATE message error with its NOTIFICATION subcode.
    Update(UpdateMessageError, FormError),

    /// A message header error with its NOTIFICATION subcode.
    Header(MessageHeaderError, FormError),
}

impl ParseError {
    /// Creates a new parse error as a form error with the given message.
    pub fn form_error(msg: &'static str) -> Self {
        FormError::new(msg).into()
    }

    pub fn update_error(subcode: UpdateMessageError, msg: &'static str)
        -> Self
    {
        ParseError::Update(subcode, FormError::new(msg))
    }

    pub fn header_error(subcode: MessageHeaderError, msg: &'static str)
        -> Self
    {
        ParseError::Header(subcode, FormError::new(msg))
    }

    /// Classifies this error as an UPDATE message error.
    ///
    /// Errors that already carry a classification are returned as is, so
    /// the innermost layer that knew better wins.
    pub fn in_update(self, subcode: UpdateMessageError) -> Self {
        match self {
            ParseError::ShortInput => ParseError::Update(
                subcode, FormError::new("unexpected end of input")
            ),
            ParseError::Form(e) => ParseError::Update(subcode, e),
            ParseError::Unsupported => ParseError::Update(
                subcode, FormError::new("unsupported")
            ),
            classified => classified,
        }
    }

    pub fn is_short_input(&self) -> bool {
        matches!(self, ParseError::ShortInput)
    }

    /// Returns the NOTIFICATION code and subcode for this error.
    ///
    /// Unclassified errors are reported as a Malformed Attribute List,
    /// which is the broadest UPDATE message error.
    pub fn notification(&self) -> Notification {
        match self {
            ParseError::Header(sub, _) => Notification::new(
                ErrorCode::MessageHeaderError, (*sub).into()
            ),
            ParseError::Update(sub, _) => Notification::new(
                ErrorCode::UpdateMessageError, (*sub).into()
            ),
            _ => Notification::new(
                ErrorCode::UpdateMessageError,
                UpdateMessageError::MalformedAttributeList.into()
            ),
        }
    }
}

//--- From

impl From<FormError> for ParseError {
    fn from(err: FormError) -> Self {
        ParseError::Form(err)
    }
}

impl From<octseq::parse::ShortInput> for ParseError {
    fn from(_: octseq::parse::ShortInput) -> Self {
        ParseError::ShortInput
    }
}

//--- Display and Error

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ParseError::ShortInput => f.write_str("unexpected end of input"),
            ParseError::Form(ref err) => err.fmt(f),
            ParseError::Unsupported => f.write_str("unsupported"),
            ParseError::Update(sub, ref err) => {
                write!(f, "UPDATE message error ({}): {}", sub, err)
            }
            ParseError::Header(sub, ref err) => {
                write!(f, "message header error ({}): {}", sub, err)
            }
        }
    }
}

impl std::error::Error for ParseError { }

//------------ FormError -----------------------------------------------------

/// A formatting error occured.
///
/// This is a generic error for all kinds of error cases that result in data
/// not being accepted. For diagnostics, the error is being given a static
/// string describing the error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormError(&'static str);

impl FormError {
    /// Creates a new form error value with the given diagnostics string.
    pub fn new(msg: &'static str) -> Self {
        FormError(msg)
    }

    pub fn description(&self) -> &'static str {
        self.0
    }
}

//--- Display and Error

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0)
    }
}

//--------- Tests ------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_keeps_innermost() {
        let e = ParseError::update_error(
            UpdateMessageError::InvalidNetworkField, "mask too long"
        );
        assert_eq!(
            e.in_update(UpdateMessageError::OptionalAttributeError),
            e
        );

        let short = ParseError::ShortInput
            .in_update(UpdateMessageError::AttributeLengthError);
        let n = short.notification();
        assert_eq!(n.code(), ErrorCode::UpdateMessageError);
        assert_eq!(n.subcode(), 5);
    }

    #[test]
    fn addresses() {
        let buf = [10, 0, 0, 1, 0xff];
        let mut parser = Parser::from_ref(&buf[..]);
        assert_eq!(
            parse_ipv4addr(&mut parser).unwrap(),
            Ipv4Addr::new(10, 0, 0, 1)
        );
        assert!(check_exhausted(&parser, "trailing").is_err());
        assert_eq!(
            parse_ipv6addr(&mut parser),
            Err(ParseError::ShortInput)
        );
    }
}
