//! Packing route changes into UPDATE messages.
//!
//! The [`UpdateBuilder`] takes any number of announcements and withdrawals,
//! possibly of many families, next hops and attribute sets, and turns them
//! into as few UPDATE messages as the maximum message size of the session
//! allows.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::IpAddr;

use bytes::Bytes;
use log::{debug, trace};
use octseq::builder::ShortBuf;

use crate::bgp::message::nlri_collection::{
    compose_nlri, nlri_len, wire_nlri
};
use crate::bgp::message::update_collection::{Action, RouteChange};
use crate::bgp::message::{Header, MsgType, SessionConfig, UpdateMessage};
use crate::bgp::nlri::{AfiSafiType, NextHop, Nlri};
use crate::bgp::path_attributes::{PaMap, PathAttribute, PathAttributeType};
use crate::bgp::types::ConventionalNextHop;
use crate::util::parser::ParseError;

//------------ UpdateBuilder -------------------------------------------------

/// Builds UPDATE messages from route changes.
///
/// Changes are grouped by family, next hop and attributes. Each group
/// shares one path attribute section which is packed once and repeated
/// byte for byte in every message the group needs. Groups are emitted in
/// the order their first change was pushed, withdrawals before
/// announcements, so the same input always results in the same messages.
///
/// Withdrawals of IPv4 unicast go into the Withdrawn Routes field, those of
/// other families into MP_UNREACH_NLRI. Announcements of IPv4 unicast with
/// an IPv4 next hop (or none, if the attributes carry NEXT_HOP already) use
/// the conventional NLRI field, everything else MP_REACH_NLRI.
///
/// Since all withdrawals are placed before all announcements, a prefix that
/// is both withdrawn and announced ends up announced at the receiver.
#[derive(Clone, Debug)]
pub struct UpdateBuilder {
    config: SessionConfig,
    changes: Vec<RouteChange>,
}

impl UpdateBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self { config, changes: Vec::new() }
    }

    pub fn push(&mut self, change: RouteChange) {
        self.changes.push(change)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Packs all changes into messages.
    ///
    /// Every message is at most as large as the maximum message size of
    /// the session. Fails if a single withdrawal, or one set of attributes
    /// together with a single NLRI, does not fit into a message.
    pub fn build(self) -> Result<Vec<UpdateMessage>, ComposeError> {
        let (withdrawals, announcements) = self.partition()?;
        let mut packer = Packer::new(self.config);
        for (afisafi, nlris) in &withdrawals {
            packer.withdraw(*afisafi, nlris)?;
        }
        for (idx, group) in announcements.iter().enumerate() {
            packer.announce(idx, group)?;
        }
        packer.finish()
    }

    fn partition(&self)
        -> Result<(Vec<(AfiSafiType, Vec<Nlri>)>, Vec<AnnounceGroup>), ComposeError>
    {
        let mut withdrawals: Vec<(AfiSafiType, Vec<Nlri>)> = Vec::new();
        let mut withdrawn = HashSet::new();
        let mut groups: Vec<AnnounceGroup> = Vec::new();

        // Changes are looked up on what they were handed in with first.
        // Different inputs can resolve to the same wire attributes, e.g. a
        // next hop passed separately or as NEXT_HOP attribute, so groups
        // are keyed on their resolved form as well.
        let mut index: HashMap<(AfiSafiType, Option<NextHop>, Bytes), usize>
            = HashMap::new();
        let mut resolved: HashMap<GroupKey, usize> = HashMap::new();

        for change in &self.changes {
            let afisafi = change.nlri.afisafi();
            if afisafi != AfiSafiType::Ipv4Unicast
                && !self.config.has_family(afisafi)
            {
                return Err(ComposeError::IllegalCombination);
            }
            match change.action {
                Action::Withdraw => {
                    let addpath = self.config.tx_addpath(afisafi);
                    if !withdrawn.insert(wire_nlri(&change.nlri, addpath)) {
                        continue;
                    }
                    match withdrawals.iter_mut().find(|(a, _)| *a == afisafi) {
                        Some((_, list)) => list.push(change.nlri.clone()),
                        None => withdrawals.push(
                            (afisafi, vec![change.nlri.clone()])
                        ),
                    }
                }
                Action::Announce => {
                    let key = (
                        afisafi, change.nexthop, change.attributes.packed()
                    );
                    let idx = match index.get(&key) {
                        Some(idx) => *idx,
                        None => {
                            let group = AnnounceGroup::new(
                                afisafi,
                                change.nexthop,
                                &change.attributes,
                                &self.config,
                            )?;
                            let idx = match resolved.get(&group.key()) {
                                Some(idx) => *idx,
                                None => {
                                    resolved.insert(
                                        group.key(), groups.len()
                                    );
                                    groups.push(group);
                                    groups.len() - 1
                                }
                            };
                            index.insert(key, idx);
                            idx
                        }
                    };
                    groups[idx].push(&change.nlri);
                }
            }
        }
        Ok((withdrawals, groups))
    }
}

impl Extend<RouteChange> for UpdateBuilder {
    fn extend<T: IntoIterator<Item = RouteChange>>(&mut self, iter: T) {
        self.changes.extend(iter)
    }
}

//------------ AnnounceGroup -------------------------------------------------

/// Announcements sharing family, next hop and attributes.
#[derive(Debug)]
struct AnnounceGroup {
    afisafi: AfiSafiType,

    /// The MP_REACH_NLRI next hop, `None` for conventional NLRI.
    nexthop: Option<NextHop>,

    /// The packed attributes, split where MP_REACH_NLRI goes.
    head: Bytes,
    tail: Bytes,

    addpath: bool,
    nlris: Vec<Nlri>,
    seen: HashSet<Nlri>,
}

/// What makes two announcement groups end up identical on the wire.
type GroupKey = (AfiSafiType, Option<NextHop>, Bytes, Bytes);

impl AnnounceGroup {
    fn new(
        afisafi: AfiSafiType,
        nexthop: Option<NextHop>,
        attributes: &PaMap,
        config: &SessionConfig,
    ) -> Result<Self, ComposeError> {
        let mut attributes = attributes.clone();
        let conventional = match (afisafi, nexthop) {
            (AfiSafiType::Ipv4Unicast, None) => {
                if !attributes.contains(PathAttributeType::ConventionalNextHop) {
                    return Err(ComposeError::InvalidAttribute(
                        "missing NEXT_HOP"
                    ));
                }
                true
            }
            (
                AfiSafiType::Ipv4Unicast,
                Some(NextHop::Unicast(IpAddr::V4(addr)))
            ) => {
                attributes.set(ConventionalNextHop(addr), config)?;
                true
            }
            _ => {
                attributes.remove(PathAttributeType::ConventionalNextHop);
                false
            }
        };
        let (head, tail) = attributes.packed_split(
            PathAttributeType::MpReachNlri.into()
        );
        Ok(Self {
            afisafi,
            nexthop: if conventional {
                None
            } else {
                Some(nexthop.unwrap_or_else(|| NextHop::empty_for(afisafi)))
            },
            head,
            tail,
            addpath: config.tx_addpath(afisafi),
            nlris: Vec::new(),
            seen: HashSet::new(),
        })
    }

    fn key(&self) -> GroupKey {
        (self.afisafi, self.nexthop, self.head.clone(), self.tail.clone())
    }

    // NLRI that only differ in what is left out on the wire are sent once.
    fn push(&mut self, nlri: &Nlri) {
        if self.seen.insert(wire_nlri(nlri, self.addpath)) {
            self.nlris.push(nlri.clone());
        }
    }

    fn attributes_len(&self) -> usize {
        self.head.len() + self.tail.len()
    }
}

//------------ MpSection -----------------------------------------------------

/// An MP_REACH_NLRI or MP_UNREACH_NLRI attribute under construction.
#[derive(Debug)]
struct MpSection {
    afisafi: AfiSafiType,
    nexthop: Option<NextHop>,
    nlri: Vec<u8>,
}

impl MpSection {
    fn value_len(&self) -> usize {
        3 + self.nexthop.map_or(0, |nh| 1 + nh.compose_len() + 1)
            + self.nlri.len()
    }

    fn compose_len(&self) -> usize {
        let len = self.value_len();
        if len > 255 { len + 4 } else { len + 3 }
    }

    fn compose(&self, target: &mut Vec<u8>) -> Result<(), ComposeError> {
        let mut value = Vec::with_capacity(self.value_len());
        value.extend_from_slice(&self.afisafi.as_bytes());
        let typ = match self.nexthop {
            Some(nexthop) => {
                nexthop.compose(&mut value)?;
                value.push(0);
                PathAttributeType::MpReachNlri
            }
            None => PathAttributeType::MpUnreachNlri
        };
        value.extend_from_slice(&self.nlri);
        PathAttribute::from_parts(typ.flags(), typ.into(), value.into())?
            .compose(target);
        Ok(())
    }
}

//------------ PduBuilder ----------------------------------------------------

/// A single UPDATE message under construction.
#[derive(Debug, Default)]
struct PduBuilder {
    withdrawn: Vec<u8>,
    mp_unreach: Option<MpSection>,

    /// The announce group whose attributes this message carries.
    group: Option<usize>,
    head: Bytes,
    tail: Bytes,
    mp_reach: Option<MpSection>,
    nlri: Vec<u8>,
}

impl PduBuilder {
    /// The size of an UPDATE with nothing in it.
    const EMPTY_LEN: usize = Header::LEN + 2 + 2;

    fn len(&self) -> usize {
        Self::EMPTY_LEN + self.withdrawn.len() + self.attributes_len()
            + self.nlri.len()
    }

    fn attributes_len(&self) -> usize {
        self.head.len() + self.tail.len()
            + self.mp_reach.as_ref().map_or(0, MpSection::compose_len)
            + self.mp_unreach.as_ref().map_or(0, MpSection::compose_len)
    }

    fn is_empty(&self) -> bool {
        self.withdrawn.is_empty()
            && self.mp_unreach.is_none()
            && self.group.is_none()
    }

    /// Adds a withdrawal if it fits.
    fn add_withdrawal(
        &mut self,
        afisafi: AfiSafiType,
        nlri: &Nlri,
        addpath: bool,
        max: usize,
    ) -> bool {
        if afisafi == AfiSafiType::Ipv4Unicast {
            let before = self.withdrawn.len();
            compose_nlri(nlri, addpath, &mut self.withdrawn);
            if self.len() > max {
                self.withdrawn.truncate(before);
                return false;
            }
            return true;
        }

        let created = self.mp_unreach.is_none();
        let section = self.mp_unreach.get_or_insert_with(|| MpSection {
            afisafi, nexthop: None, nlri: Vec::new()
        });
        if section.afisafi != afisafi {
            return false;
        }
        let before = section.nlri.len();
        compose_nlri(nlri, addpath, &mut section.nlri);
        if self.len() > max {
            if created {
                self.mp_unreach = None;
            }
            else if let Some(section) = self.mp_unreach.as_mut() {
                section.nlri.truncate(before);
            }
            return false;
        }
        true
    }

    /// Adds an announcement if it fits and does not conflict.
    fn add_announcement(
        &mut self,
        idx: usize,
        group: &AnnounceGroup,
        nlri: &Nlri,
        addpath: bool,
        max: usize,
    ) -> bool {
        let created = match self.group {
            Some(current) if current != idx => return false,
            Some(_) => false,
            None => {
                self.group = Some(idx);
                self.head = group.head.clone();
                self.tail = group.tail.clone();
                self.mp_reach = group.nexthop.map(|nexthop| MpSection {
                    afisafi: group.afisafi,
                    nexthop: Some(nexthop),
                    nlri: Vec::new(),
                });
                true
            }
        };

        let target = match self.mp_reach.as_mut() {
            Some(section) => &mut section.nlri,
            None => &mut self.nlri,
        };
        let before = target.len();
        compose_nlri(nlri, addpath, target);

        if self.len() > max {
            if created {
                self.group = None;
                self.head = Bytes::new();
                self.tail = Bytes::new();
                self.mp_reach = None;
                self.nlri.clear();
            }
            else {
                match self.mp_reach.as_mut() {
                    Some(section) => section.nlri.truncate(before),
                    None => self.nlri.truncate(before),
                }
            }
            return false;
        }
        true
    }

    fn compose(&self) -> Result<Vec<u8>, ComposeError> {
        let len = self.len();
        let pdu_len = u16::try_from(len).map_err(|_|
            ComposeError::PduTooLarge(len)
        )?;
        let mut buf = Vec::with_capacity(len);
        Header::compose(pdu_len, MsgType::Update, &mut buf);

        // Both section lengths are below the PDU length checked above.
        buf.extend_from_slice(&(self.withdrawn.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.withdrawn);
        buf.extend_from_slice(&(self.attributes_len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.head);
        if let Some(section) = self.mp_reach.as_ref() {
            section.compose(&mut buf)?;
        }
        if let Some(section) = self.mp_unreach.as_ref() {
            section.compose(&mut buf)?;
        }
        buf.extend_from_slice(&self.tail);
        buf.extend_from_slice(&self.nlri);
        Ok(buf)
    }
}

//------------ Packer --------------------------------------------------------

/// Fills messages greedily, one after the other.
struct Packer {
    config: SessionConfig,
    max: usize,
    current: PduBuilder,
    done: Vec<UpdateMessage>,
}

impl Packer {
    fn new(config: SessionConfig) -> Self {
        Self {
            config,
            max: config.max_message_size(),
            current: PduBuilder::default(),
            done: Vec::new(),
        }
    }

    fn withdraw(&mut self, afisafi: AfiSafiType, nlris: &[Nlri])
        -> Result<(), ComposeError>
    {
        let addpath = self.config.tx_addpath(afisafi);
        for nlri in nlris {
            if self.current.add_withdrawal(afisafi, nlri, addpath, self.max) {
                continue;
            }
            self.flush()?;
            if !self.current.add_withdrawal(afisafi, nlri, addpath, self.max) {
                return Err(ComposeError::PduTooLarge(
                    PduBuilder::EMPTY_LEN + nlri_len(nlri, addpath)
                ));
            }
        }
        Ok(())
    }

    fn announce(&mut self, idx: usize, group: &AnnounceGroup)
        -> Result<(), ComposeError>
    {
        let addpath = self.config.tx_addpath(group.afisafi);
        let mut chunks = 1;
        for nlri in &group.nlris {
            if self.current.add_announcement(
                idx, group, nlri, addpath, self.max
            ) {
                continue;
            }
            if self.current.group == Some(idx) {
                chunks += 1;
            }
            self.flush()?;
            if !self.current.add_announcement(
                idx, group, nlri, addpath, self.max
            ) {
                return Err(ComposeError::AttributesTooLarge(
                    group.attributes_len()
                ));
            }
        }
        if chunks > 1 {
            debug!(
                "split {} {} announcements into {} messages",
                group.nlris.len(), group.afisafi, chunks
            );
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ComposeError> {
        if self.current.is_empty() {
            return Ok(());
        }
        let pdu = std::mem::take(&mut self.current);
        trace!(
            "closing UPDATE of {} bytes ({} withdrawn, {} attributes, {} nlri)",
            pdu.len(), pdu.withdrawn.len(), pdu.attributes_len(),
            pdu.nlri.len()
        );
        let buf = pdu.compose()?;
        self.done.push(
            UpdateMessage::from_octets(buf.into(), &self.config.as_peer())?
        );
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<UpdateMessage>, ComposeError> {
        self.flush()?;
        Ok(self.done)
    }
}

//------------ ComposeError --------------------------------------------------

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ComposeError {
    /// Exceeded maximum PDU size, data field carries the violating length.
    PduTooLarge(usize),

    /// A single attribute value longer than 65535 bytes.
    AttributeTooLarge(PathAttributeType, usize),

    /// Attributes that do not fit a message even with a single NLRI.
    AttributesTooLarge(usize),

    IllegalCombination,
    InvalidNlri(&'static str),
    InvalidAttribute(&'static str),
    WrongAddressType,

    /// Variant for `octseq::builder::ShortBuf`
    ShortBuf,

    /// A composed message failed to parse.
    ParseError(ParseError),
}

impl From<ShortBuf> for ComposeError {
    fn from(_: ShortBuf) -> ComposeError {
        ComposeError::ShortBuf
    }
}

impl From<ParseError> for ComposeError {
    fn from(pe: ParseError) -> ComposeError {
        ComposeError::ParseError(pe)
    }
}

impl std::error::Error for ComposeError { }

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ComposeError::PduTooLarge(n) => {
                write!(f, "oversized PDU: {n} bytes")
            }
            ComposeError::AttributeTooLarge(attr, n) => {
                write!(f, "oversized attribute {attr}: {n} bytes")
            }
            ComposeError::AttributesTooLarge(n) => {
                write!(f, "oversized attributes: {n} bytes")
            }
            ComposeError::IllegalCombination => {
                write!(f, "illegal combination of prefixes/attributes")
            }
            ComposeError::InvalidNlri(s) => write!(f, "invalid NLRI: {s}"),
            ComposeError::InvalidAttribute(s) => {
                write!(f, "invalid attribute: {s}")
            }
            ComposeError::WrongAddressType => write!(f, "wrong address type"),
            ComposeError::ShortBuf => write!(f, "buffer too short"),
            ComposeError::ParseError(pe) => {
                write!(f, "parse error in composed PDU: {pe}")
            }
        }
    }
}

//------------ Tests ---------------------------------------------------------
