//! AS Path representation.
//!
//! [`AsPath`] is the decoded form of the AS_PATH and AS4_PATH attributes:
//! a list of [`Segment`]s, each holding one or more ASNs. On the wire the
//! ASNs take two or four octets depending on the session. For sessions
//! without four octet AS support, ASNs that do not fit are replaced by
//! [`AS_TRANS`] and the real path travels in AS4_PATH, see RFC 6793.

use std::fmt;

use inetnum::asn::Asn;
use octseq::Parser;

use crate::util::parser::ParseError;

/// The reserved two octet AS standing in for a four octet one.
// `Asn::from_u32` is not a `const fn` in inetnum 0.1; `Asn` is a
// `#[repr(transparent)]` wrapper around `u32`, so this is equivalent.
// SAFETY: `Asn` is `#[repr(transparent)]` over `u32`.
pub const AS_TRANS: Asn = unsafe { std::mem::transmute::<u32, Asn>(23456) };

//----------- AsPath ---------------------------------------------------------

/// An AS path as a list of segments.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AsPath {
    segments: Vec<Segment>,
}

impl AsPath {
    pub fn new() -> Self {
        Self { segments: Vec::new() }
    }

    /// Creates a path of a single AS_SEQUENCE.
    pub fn from_asns(asns: impl IntoIterator<Item = Asn>) -> Self {
        let seg = Segment::new(SegmentType::Sequence, asns);
        if seg.asns.is_empty() {
            return Self::new()
        }
        Self { segments: vec![seg] }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns all ASNs, in the order they appear on the wire.
    pub fn asns(&self) -> impl Iterator<Item = Asn> + '_ {
        self.segments.iter().flat_map(|s| s.asns.iter().copied())
    }

    /// Returns true if `asn` appears anywhere in the path.
    pub fn contains(&self, asn: Asn) -> bool {
        self.asns().any(|a| a == asn)
    }

    /// The right-most ASN of a path ending in an AS_SEQUENCE.
    pub fn origin(&self) -> Option<Asn> {
        match self.segments.last() {
            Some(s) if s.stype == SegmentType::Sequence => s.asns.last().copied(),
            _ => None
        }
    }

    /// The path length as used by route selection, RFC 4271 section
    /// 9.1.2.2: an AS_SET counts as one, confederation segments as zero.
    pub fn hop_count(&self) -> usize {
        self.segments.iter().map(|s| match s.stype {
            SegmentType::Sequence => s.asns.len(),
            SegmentType::Set => 1,
            SegmentType::ConfedSequence | SegmentType::ConfedSet => 0,
        }).sum()
    }

    /// Prepends `asn`, extending the first AS_SEQUENCE if there is room.
    pub fn prepend(&mut self, asn: Asn) {
        match self.segments.first_mut() {
            Some(s) if s.stype == SegmentType::Sequence
                && s.asns.len() < Segment::MAX_ASNS =>
            {
                s.asns.insert(0, asn);
            }
            _ => self.segments.insert(0, Segment::new(
                SegmentType::Sequence, [asn]
            )),
        }
    }

    pub fn push_segment(&mut self, segment: Segment) {
        if !segment.asns.is_empty() {
            self.segments.push(segment);
        }
    }

    /// Returns true if any ASN needs four octets.
    pub fn has_four_octet_asns(&self) -> bool {
        self.asns().any(|a| a.into_u32() > 0xffff)
    }

    /// Parses the value of an AS_PATH or AS4_PATH attribute.
    ///
    /// Unknown segment types and empty segments are rejected as malformed,
    /// as RFC 7606 section 7.2 requires.
    pub fn parse<R: AsRef<[u8]> + ?Sized>(
        parser: &mut Parser<'_, R>,
        four_octet: bool,
    ) -> Result<Self, ParseError> {
        let mut segments = Vec::new();
        while parser.remaining() > 0 {
            let stype = SegmentType::try_from(parser.parse_u8()?)?;
            let count = parser.parse_u8()?;
            if count == 0 {
                return Err(ParseError::form_error("empty AS path segment"));
            }
            let mut asns = Vec::with_capacity(count.into());
            for _ in 0..count {
                let asn = if four_octet {
                    parser.parse_u32_be()?
                } else {
                    parser.parse_u16_be()?.into()
                };
                asns.push(Asn::from_u32(asn));
            }
            segments.push(Segment { stype, asns });
        }
        Ok(Self { segments })
    }

    /// Returns the length of the composed path.
    pub fn compose_len(&self, four_octet: bool) -> usize {
        let asn_len = if four_octet { 4 } else { 2 };
        self.segments.iter().map(|s| {
            let n = s.asns.len();
            // segments longer than 255 ASNs are split when composing
            2 * n.div_ceil(Segment::MAX_ASNS) + n * asn_len
        }).sum()
    }

    /// Composes the path with two or four octet ASNs.
    ///
    /// In the two octet form, ASNs that do not fit are written as
    /// [`AS_TRANS`].
    pub fn compose(&self, target: &mut Vec<u8>, four_octet: bool) {
        for s in &self.segments {
            for chunk in s.asns.chunks(Segment::MAX_ASNS) {
                target.push(s.stype.into());
                target.push(chunk.len() as u8);
                for asn in chunk {
                    if four_octet {
                        target.extend_from_slice(&asn.into_u32().to_be_bytes());
                    } else {
                        let a = u16::try_from(asn.into_u32())
                            .unwrap_or(AS_TRANS.into_u32() as u16);
                        target.extend_from_slice(&a.to_be_bytes());
                    }
                }
            }
        }
    }

    /// Reconstructs the path of a two octet session from its AS_PATH and
    /// AS4_PATH, following RFC 6793 section 4.2.3.
    ///
    /// If AS4_PATH is longer than AS_PATH it is ignored. Otherwise the
    /// leading ASNs of AS_PATH that AS4_PATH does not cover are kept and
    /// AS4_PATH is appended. Confederation segments in AS4_PATH are
    /// dropped.
    pub fn merge_as4(&self, as4_path: &AsPath) -> AsPath {
        let as4_segments: Vec<&Segment> = as4_path.segments.iter()
            .filter(|s| !s.stype.is_confed())
            .collect();
        let as4_count: usize = as4_segments.iter().map(|s| s.count()).sum();
        let as_count: usize = self.segments.iter().map(|s| s.count()).sum();
        if as_count < as4_count {
            return self.clone();
        }

        let mut keep = as_count - as4_count;
        let mut res = AsPath::new();
        for s in &self.segments {
            if s.stype.is_confed() {
                res.segments.push(s.clone());
                continue;
            }
            if keep == 0 {
                break;
            }
            match s.stype {
                SegmentType::Sequence => {
                    let n = keep.min(s.asns.len());
                    res.segments.push(Segment {
                        stype: s.stype,
                        asns: s.asns[..n].to_vec()
                    });
                    keep -= n;
                }
                _ => {
                    res.segments.push(s.clone());
                    keep -= 1;
                }
            }
        }
        res.segments.extend(as4_segments.into_iter().cloned());
        res
    }
}

impl fmt::Display for AsPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for s in &self.segments {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            fmt::Display::fmt(s, f)?;
        }
        Ok(())
    }
}

//----------- Segment --------------------------------------------------------

/// One segment of an [`AsPath`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    stype: SegmentType,
    asns: Vec<Asn>,
}

impl Segment {
    const MAX_ASNS: usize = 255;

    pub fn new(stype: SegmentType, asns: impl IntoIterator<Item = Asn>)
        -> Self
    {
        Self { stype, asns: asns.into_iter().collect() }
    }

    pub fn stype(&self) -> SegmentType {
        self.stype
    }

    pub fn asns(&self) -> &[Asn] {
        &self.asns
    }

    // The number of ASNs as counted by RFC 6793.
    fn count(&self) -> usize {
        match self.stype {
            SegmentType::Sequence => self.asns.len(),
            SegmentType::Set => 1,
            _ => 0,
        }
    }
}

// AS_SEQUENCE prints as plain ASNs, the others as '{..}' for AS_SET,
// '(..)' for AS_CONFED_SEQUENCE and '[..]' for AS_CONFED_SET.
impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (open, sep, close) = match self.stype {
            SegmentType::Sequence => ("", " ", ""),
            SegmentType::Set => ("{", ",", "}"),
            SegmentType::ConfedSequence => ("(", " ", ")"),
            SegmentType::ConfedSet => ("[", ",", "]"),
        };
        write!(f, "{}", open)?;
        for (i, asn) in self.asns.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", sep)?;
            }
            write!(f, "{}", asn.into_u32())?;
        }
        write!(f, "{}", close)
    }
}

/// AS_PATH Segment types as defined in RFC4271 and RFC5065.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SegmentType {
    Set,
    Sequence,
    ConfedSequence,
    ConfedSet,
}

impl SegmentType {
    pub fn is_confed(self) -> bool {
        matches!(self, SegmentType::ConfedSequence | SegmentType::ConfedSet)
    }
}

impl From<SegmentType> for u8 {
    fn from(value: SegmentType) -> u8 {
        match value {
            SegmentType::Set => 1,
            SegmentType::Sequence => 2,
            SegmentType::ConfedSequence => 3,
            SegmentType::ConfedSet => 4,
        }
    }
}

impl TryFrom<u8> for SegmentType {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SegmentType::Set),
            2 => Ok(SegmentType::Sequence),
            3 => Ok(SegmentType::ConfedSequence),
            4 => Ok(SegmentType::ConfedSet),
            _ => Err(ParseError::form_error("invalid AS path segment type"))
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            SegmentType::Set => "AS_SET",
            SegmentType::Sequence => "AS_SEQUENCE",
            SegmentType::ConfedSequence => "AS_CONFED_SEQUENCE",
            SegmentType::ConfedSet => "AS_CONFED_SET",
        })
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn asns(v: &[u32]) -> Vec<Asn> {
        v.iter().map(|a| Asn::from_u32(*a)).collect()
    }

    #[test]
    fn parse_and_compose() {
        let raw = [
            0x02, 0x02, 0x00, 0x00, 0x00, 0x64, 0x00, 0x01, 0x11, 0x70,
            0x01, 0x02, 0x00, 0x00, 0x01, 0x2c, 0x00, 0x00, 0x01, 0x90,
        ];
        let mut parser = Parser::from_ref(&raw[..]);
        let path = AsPath::parse(&mut parser, true).unwrap();
        assert_eq!(path.segments().len(), 2);
        assert_eq!(path.to_string(), "100 70000 {300,400}");
        assert_eq!(path.hop_count(), 3);
        assert_eq!(path.origin(), None);
        assert!(path.has_four_octet_asns());

        let mut buf = Vec::new();
        path.compose(&mut buf, true);
        assert_eq!(buf, raw);
        assert_eq!(path.compose_len(true), raw.len());

        // two octet form substitutes AS_TRANS
        let mut buf = Vec::new();
        path.compose(&mut buf, false);
        assert_eq!(
            buf,
            [0x02, 0x02, 0x00, 0x64, 0x5b, 0xa0, 0x01, 0x02, 0x01, 0x2c,
                0x01, 0x90]
        );
        assert_eq!(path.compose_len(false), buf.len());
    }

    #[test]
    fn malformed() {
        // unknown segment type
        let mut parser = Parser::from_ref(&[0x05, 0x01, 0x00, 0x64][..]);
        assert!(AsPath::parse(&mut parser, false).is_err());
        // empty segment
        let mut parser = Parser::from_ref(&[0x02, 0x00][..]);
        assert!(AsPath::parse(&mut parser, false).is_err());
        // truncated
        let mut parser = Parser::from_ref(&[0x02, 0x02, 0x00, 0x64, 0x00][..]);
        assert_eq!(
            AsPath::parse(&mut parser, false),
            Err(ParseError::ShortInput)
        );
    }

    #[test]
    fn long_segments_are_split() {
        let path = AsPath::from_asns((0..300).map(Asn::from_u32));
        let mut buf = Vec::new();
        path.compose(&mut buf, true);
        assert_eq!(buf.len(), path.compose_len(true));
        let mut parser = Parser::from_ref(&buf[..]);
        let parsed = AsPath::parse(&mut parser, true).unwrap();
        assert_eq!(parsed.segments().len(), 2);
        assert_eq!(parsed.hop_count(), 300);
    }

    #[test]
    fn prepend() {
        let mut path = AsPath::new();
        path.prepend(Asn::from_u32(200));
        path.prepend(Asn::from_u32(100));
        assert_eq!(path.segments().len(), 1);
        assert_eq!(path.origin(), Some(Asn::from_u32(200)));
        assert!(path.contains(Asn::from_u32(100)));
    }

    #[test]
    fn merge_as4() {
        // AS_PATH 100 AS_TRANS AS_TRANS, AS4_PATH 70000 80000
        let as_path = AsPath::from_asns(asns(&[100, 23456, 23456]));
        let as4_path = AsPath::from_asns(asns(&[70000, 80000]));
        let merged = as_path.merge_as4(&as4_path);
        assert_eq!(merged.asns().collect::<Vec<_>>(),
            asns(&[100, 70000, 80000])
        );

        // AS4_PATH longer than AS_PATH is ignored
        let short = AsPath::from_asns(asns(&[100]));
        assert_eq!(short.merge_as4(&as4_path), short);

        // confederation segments are kept from AS_PATH, dropped from
        // AS4_PATH
        let mut as_path = AsPath::new();
        as_path.push_segment(Segment::new(
            SegmentType::ConfedSequence, asns(&[65001])
        ));
        as_path.push_segment(Segment::new(
            SegmentType::Sequence, asns(&[23456])
        ));
        let mut as4_path = AsPath::new();
        as4_path.push_segment(Segment::new(
            SegmentType::ConfedSequence, asns(&[65001])
        ));
        as4_path.push_segment(Segment::new(
            SegmentType::Sequence, asns(&[70000])
        ));
        let merged = as_path.merge_as4(&as4_path);
        assert_eq!(merged.to_string(), "(65001) 70000");
    }
}
