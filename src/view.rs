//! Immutable, sliceable views over received bytes.
//!
//! All decoders in this crate work on a [`ByteView`]. Slicing a view never
//! copies: the sub-view shares the backing storage of the original receive
//! buffer, which stays alive for as long as any view into it exists. Values
//! that should not pin a (possibly large) receive buffer can be detached
//! into their own storage via [`ByteView::detach`].

use std::fmt;
use std::ops::{Bound, Deref, RangeBounds};

use bytes::Bytes;
use octseq::Parser;

use crate::util::parser::ParseError;

/// An immutable view on a contiguous region of bytes.
///
/// Equality, ordering and hashing operate on the referenced bytes, never on
/// the identity of the backing storage.
#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ByteView(Bytes);

impl ByteView {
    pub fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    pub const fn from_static(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }

    pub fn copy_from_slice(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a sub-view, or an error if `range` is out of bounds.
    pub fn slice(&self, range: impl RangeBounds<usize>)
        -> Result<ByteView, ParseError>
    {
        let start = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n.checked_add(1)
                .ok_or(ParseError::ShortInput)?,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&n) => n.checked_add(1)
                .ok_or(ParseError::ShortInput)?,
            Bound::Excluded(&n) => n,
            Bound::Unbounded => self.len(),
        };
        if start > end || end > self.len() {
            return Err(ParseError::ShortInput);
        }
        Ok(Self(self.0.slice(start..end)))
    }

    /// Splits the view in two at `at`.
    pub fn split_at(&self, at: usize)
        -> Result<(ByteView, ByteView), ParseError>
    {
        Ok((self.slice(..at)?, self.slice(at..)?))
    }

    pub fn get_u8(&self, at: usize) -> Result<u8, ParseError> {
        self.0.get(at).copied().ok_or(ParseError::ShortInput)
    }

    pub fn get_u16(&self, at: usize) -> Result<u16, ParseError> {
        let end = at.checked_add(2).ok_or(ParseError::ShortInput)?;
        match self.0.get(at..end) {
            Some(b) => Ok(u16::from_be_bytes([b[0], b[1]])),
            None => Err(ParseError::ShortInput),
        }
    }

    pub fn get_u32(&self, at: usize) -> Result<u32, ParseError> {
        let end = at.checked_add(4).ok_or(ParseError::ShortInput)?;
        match self.0.get(at..end) {
            Some(b) => Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]])),
            None => Err(ParseError::ShortInput),
        }
    }

    /// Returns a parser positioned at the start of this view.
    pub fn parser(&self) -> Parser<'_, Bytes> {
        Parser::from_ref(&self.0)
    }

    /// Returns the part of this view not yet consumed by `parser`.
    ///
    /// The parser must have been obtained via [`ByteView::parser`] on this
    /// very view.
    pub fn remainder(&self, parser: &Parser<'_, Bytes>) -> ByteView {
        Self(self.0.slice(parser.pos().min(self.len())..))
    }

    /// Copies the viewed bytes into fresh storage.
    pub fn detach(&self) -> ByteView {
        Self(Bytes::copy_from_slice(&self.0))
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

//--- Conversions

impl From<Bytes> for ByteView {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(v: Vec<u8>) -> Self {
        Self(Bytes::from(v))
    }
}

impl From<&'static [u8]> for ByteView {
    fn from(s: &'static [u8]) -> Self {
        Self(Bytes::from_static(s))
    }
}

impl From<ByteView> for Bytes {
    fn from(v: ByteView) -> Self {
        v.0
    }
}

impl Deref for ByteView {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ByteView({:02x?})", self.0.as_ref())
    }
}

//--- Tests ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slicing_is_bounds_checked() {
        let v = ByteView::from(vec![1, 2, 3, 4, 5]);
        assert_eq!(v.slice(1..3).unwrap().as_ref(), &[2, 3]);
        assert_eq!(v.slice(..=4).unwrap().len(), 5);
        assert_eq!(v.slice(4..6), Err(ParseError::ShortInput));
        assert_eq!(v.slice(3..2), Err(ParseError::ShortInput));
        assert!(v.slice(5..).unwrap().is_empty());

        let (a, b) = v.split_at(2).unwrap();
        assert_eq!(a.as_ref(), &[1, 2]);
        assert_eq!(b.as_ref(), &[3, 4, 5]);
        assert!(v.split_at(6).is_err());
    }

    #[test]
    fn slices_share_storage() {
        let v = ByteView::from(vec![0xaa; 64]);
        let s = v.slice(8..16).unwrap();
        assert_eq!(s.as_ptr(), v[8..].as_ptr());
        let d = s.detach();
        assert_eq!(d, s);
        assert_ne!(d.as_ptr(), s.as_ptr());
    }

    #[test]
    fn integers() {
        let v = ByteView::from_static(&[0x00, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(v.get_u8(4), Ok(4));
        assert_eq!(v.get_u16(3), Ok(0x0304));
        assert_eq!(v.get_u32(1), Ok(0x01020304));
        assert_eq!(v.get_u32(2), Err(ParseError::ShortInput));
        assert_eq!(v.get_u16(usize::MAX), Err(ParseError::ShortInput));
    }

    #[test]
    fn remainder_after_parsing() {
        let v = ByteView::from_static(&[0x01, 0x02, 0x03]);
        let mut parser = v.parser();
        assert_eq!(parser.parse_u8().unwrap(), 1);
        assert_eq!(v.remainder(&parser).as_ref(), &[2, 3]);
    }
}
