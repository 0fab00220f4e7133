use std::fmt;

use bytes::Bytes;
use log::{debug, warn};
use octseq::Parser;

use crate::bgp::aspath::AsPath;
use crate::bgp::communities::{Community, Wellknown};
use crate::bgp::message::notification::{MessageHeaderError, UpdateMessageError};
use crate::bgp::message::update_builder::ComposeError;
use crate::bgp::message::update_collection::UpdateCollection;
use crate::bgp::message::{
    Header, MpReachNlri, MpUnreachNlri, MsgType, NlriCollection, SessionConfig
};
use crate::bgp::nlri::{AfiSafiType, NextHop, Nlri};
use crate::bgp::path_attributes::{
    Attribute, AttributeError, AttributeSection, ErrorAction, PaMap,
    PathAttributeType
};
use crate::bgp::types::{
    Aggregator, ConventionalNextHop, ExtendedCommunities, LargeCommunities,
    OriginType, StandardCommunities
};
use crate::util::parser::ParseError;

/// BGP UPDATE message.
///
/// The message is checked completely when it is created: the framing of
/// all sections, every path attribute and the NLRI. Malformed attributes
/// are handled following RFC 7606: they are left out of
/// [`attributes`][Self::attributes] and, depending on the attribute, either
/// simply dropped or cause all routes in the message to be treated as
/// withdrawn. Errors that leave the message unusable as a whole are
/// returned as a [`ParseError`] carrying the NOTIFICATION to send.
///
/// The NLRI are kept in packed form until asked for.
///
// ---BGP Update--------------------------------------------------------------
//
//  +-----------------------------------------------------+
//  |   Withdrawn Routes Length (2 octets)                |
//  +-----------------------------------------------------+
//  |   Withdrawn Routes (variable)                       |
//  +-----------------------------------------------------+
//  |   Total Path Attribute Length (2 octets)            |
//  +-----------------------------------------------------+
//  |   Path Attributes (variable)                        |
//  +-----------------------------------------------------+
//  |   Network Layer Reachability Information (variable) |
//  +-----------------------------------------------------+
#[derive(Clone, Debug)]
pub struct UpdateMessage {
    octets: Bytes,
    header: Header,
    withdrawn: NlriCollection,
    section: AttributeSection,
    announced: NlriCollection,
    treat_as_withdraw: bool,
    session_config: SessionConfig,
}

impl UpdateMessage {
    /// Creates an UpdateMessage from a complete message.
    ///
    /// As parsing of BGP UPDATE messages requires stateful information
    /// signalled by the BGP OPEN messages, this function requires a
    /// [`SessionConfig`].
    pub fn from_octets(octets: Bytes, config: &SessionConfig)
        -> Result<Self, ParseError>
    {
        let mut parser = Parser::from_ref(&octets);
        let header = Header::parse(&mut parser)?;
        if header.msg_type() != MsgType::Update {
            return Err(ParseError::header_error(
                MessageHeaderError::BadMessageType,
                "not an UPDATE message"
            ));
        }

        let withdrawn_len = usize::from(parser.parse_u16_be()?);
        if parser.remaining() < withdrawn_len + 2 {
            return Err(ParseError::update_error(
                UpdateMessageError::MalformedAttributeList,
                "withdrawn routes length exceeds message"
            ));
        }
        let raw_withdrawn = parser.parse_octets(withdrawn_len)?;
        let attributes_len = usize::from(parser.parse_u16_be()?);
        if parser.remaining() < attributes_len {
            return Err(ParseError::update_error(
                UpdateMessageError::MalformedAttributeList,
                "path attribute length exceeds message"
            ));
        }
        let raw_attributes = parser.parse_octets(attributes_len)?;
        let raw_nlri = parser.parse_octets(parser.remaining())?;

        let addpath = config.rx_addpath(AfiSafiType::Ipv4Unicast);
        let withdrawn = NlriCollection::from_wire(
            raw_withdrawn, AfiSafiType::Ipv4Unicast, addpath
        );
        withdrawn.validate().map_err(|e|
            e.in_update(UpdateMessageError::InvalidNetworkField)
        )?;
        let announced = NlriCollection::from_wire(
            raw_nlri, AfiSafiType::Ipv4Unicast, addpath
        );
        announced.validate().map_err(|e|
            e.in_update(UpdateMessageError::InvalidNetworkField)
        )?;

        let section = PaMap::parse_section(&raw_attributes, config)?;
        let mut res = Self {
            octets,
            header,
            withdrawn,
            section,
            announced,
            treat_as_withdraw: false,
            session_config: *config,
        };
        res.treat_as_withdraw = res.check_treat_as_withdraw();
        Ok(res)
    }

    /// Decides on treat-as-withdraw, RFC 7606 sections 3 and 5.
    fn check_treat_as_withdraw(&self) -> bool {
        if let Some(err) = self.section.errors.iter().find(|e|
            e.action == ErrorAction::TreatAsWithdraw
        ) {
            warn!("treating UPDATE as withdraw: {}", err);
            return true;
        }
        for err in &self.section.errors {
            debug!("attribute discarded: {}", err);
        }

        let has_mp_nlri = self.section.mp_reach.as_ref().is_some_and(|r|
            !r.nlri().is_empty()
        );
        if self.announced.is_empty() && !has_mp_nlri {
            return false;
        }
        let mut mandatory = vec![
            PathAttributeType::Origin, PathAttributeType::AsPath
        ];
        if !self.announced.is_empty() {
            mandatory.push(PathAttributeType::ConventionalNextHop);
        }
        if let Some(typ) = mandatory.into_iter().find(|t|
            !self.section.attributes.contains(*t)
        ) {
            warn!("treating UPDATE as withdraw: missing {} attribute", typ);
            return true;
        }
        false
    }

    /// Creates the End-of-RIB marker for a family, RFC 4724.
    ///
    /// For IPv4 unicast this is an empty UPDATE, for all other families an
    /// UPDATE with only an empty MP_UNREACH_NLRI.
    pub fn end_of_rib(afisafi: AfiSafiType, config: &SessionConfig)
        -> Result<Self, ComposeError>
    {
        let mut buf = Vec::with_capacity(Header::LEN + 10);
        if afisafi == AfiSafiType::Ipv4Unicast {
            Header::compose(23, MsgType::Update, &mut buf);
            buf.extend_from_slice(&[0, 0, 0, 0]);
        }
        else {
            Header::compose(29, MsgType::Update, &mut buf);
            buf.extend_from_slice(&[0, 0, 0, 6]);
            let typ = PathAttributeType::MpUnreachNlri;
            buf.extend_from_slice(&[typ.flags().into(), typ.into(), 3]);
            buf.extend_from_slice(&afisafi.as_bytes());
        }
        Ok(Self::from_octets(buf.into(), &config.as_peer())?)
    }

    /// Returns the family if this UPDATE is an End-of-RIB marker.
    pub fn is_eor(&self) -> Option<AfiSafiType> {
        // minimum length for a BGP UPDATE indicates EOR
        if self.octets.len() == 23 {
            return Some(AfiSafiType::Ipv4Unicast);
        }
        if !self.withdrawn.is_empty()
            || !self.announced.is_empty()
            || !self.section.attributes.is_empty()
            || self.section.mp_reach.is_some()
        {
            return None;
        }
        self.section.mp_unreach.as_ref()
            .filter(|u| u.nlri().is_empty())
            .map(|u| u.afisafi())
    }
}

//--- Accessors

impl UpdateMessage {
    pub fn octets(&self) -> &Bytes {
        &self.octets
    }

    pub fn header(&self) -> Header {
        self.header
    }

    /// Returns the length in bytes of the entire BGP message.
    pub fn length(&self) -> u16 {
        self.header.length()
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    /// The conventional IPv4 unicast withdrawals.
    pub fn withdrawn(&self) -> &NlriCollection {
        &self.withdrawn
    }

    /// The conventional IPv4 unicast announcements.
    pub fn announced(&self) -> &NlriCollection {
        &self.announced
    }

    pub fn mp_reach(&self) -> Option<&MpReachNlri> {
        self.section.mp_reach.as_ref()
    }

    pub fn mp_unreach(&self) -> Option<&MpUnreachNlri> {
        self.section.mp_unreach.as_ref()
    }

    /// The valid path attributes, except for the MP attributes.
    pub fn attributes(&self) -> &PaMap {
        &self.section.attributes
    }

    /// The malformed attributes that were left out.
    pub fn attribute_errors(&self) -> &[AttributeError] {
        &self.section.errors
    }

    /// Returns whether all routes of this message are to be withdrawn.
    pub fn is_treat_as_withdraw(&self) -> bool {
        self.treat_as_withdraw
    }

    pub fn has_conventional_nlri(&self) -> bool {
        !self.announced.is_empty()
    }

    pub fn has_mp_nlri(&self) -> bool {
        self.section.mp_reach.is_some()
    }

    /// Decodes the attribute of type `A`, if present and valid.
    pub fn get<A: Attribute>(&self) -> Option<A> {
        self.section.attributes.get(&self.session_config)
    }

    pub fn origin(&self) -> Option<OriginType> {
        self.get()
    }

    /// The AS path, with AS4_PATH merged in on two octet sessions.
    pub fn as_path(&self) -> Option<AsPath> {
        self.section.attributes.as_path(&self.session_config)
    }

    /// The aggregator, with AS4_AGGREGATOR taken into account.
    pub fn aggregator(&self) -> Option<Aggregator> {
        self.section.attributes.aggregator(&self.session_config)
    }

    /// The next hop of the announced routes.
    ///
    /// This is the next hop in MP_REACH_NLRI if present, the NEXT_HOP
    /// attribute otherwise.
    pub fn nexthop(&self) -> Option<NextHop> {
        if let Some(reach) = self.mp_reach() {
            return Some(*reach.nexthop());
        }
        self.get::<ConventionalNextHop>().map(|nh|
            NextHop::Unicast(nh.0.into())
        )
    }

    /// Returns all conventional, Extended and Large Communities.
    pub fn all_communities(&self) -> Option<Vec<Community>> {
        let mut res: Vec<Community> = Vec::new();
        if let Some(c) = self.get::<StandardCommunities>() {
            res.extend(c.0.into_iter().map(Community::from));
        }
        if let Some(c) = self.get::<ExtendedCommunities>() {
            res.extend(c.0.into_iter().map(Community::from));
        }
        if let Some(c) = self.get::<LargeCommunities>() {
            res.extend(c.0.into_iter().map(Community::from));
        }
        if res.is_empty() { None } else { Some(res) }
    }

    /// Returns whether the routes carry a well-known community.
    pub fn has_wellknown(&self, wellknown: Wellknown) -> bool {
        self.get::<StandardCommunities>().is_some_and(|c|
            c.0.iter().any(|c| c.to_wellknown() == Some(wellknown))
        )
    }

    /// Returns the route changes carried by this message.
    ///
    /// The first collection holds all withdrawals together with the
    /// conventional announcements, a second one the announcements from
    /// MP_REACH_NLRI, if any. Under treat-as-withdraw, all announcements
    /// are returned as withdrawals.
    pub fn collections(&self) -> Result<Vec<UpdateCollection>, ParseError> {
        let mut withdraws: Vec<Nlri> = self.withdrawn.nlris()?.to_vec();
        if let Some(unreach) = self.mp_unreach() {
            withdraws.extend_from_slice(unreach.nlris()?);
        }
        let conventional = self.announced.nlris()?.to_vec();
        let mp = match self.mp_reach() {
            Some(reach) => reach.nlris()?.to_vec(),
            None => Vec::new(),
        };

        if self.treat_as_withdraw {
            withdraws.extend(conventional);
            withdraws.extend(mp);
            if withdraws.is_empty() {
                return Ok(Vec::new());
            }
            return Ok(vec![UpdateCollection::withdrawals(withdraws)]);
        }

        let mut res = Vec::new();
        if !withdraws.is_empty() || !conventional.is_empty() {
            let nexthop = if conventional.is_empty() {
                None
            } else {
                self.get::<ConventionalNextHop>().map(|nh|
                    NextHop::Unicast(nh.0.into())
                )
            };
            let attributes = if conventional.is_empty() {
                PaMap::empty()
            } else {
                self.section.attributes.clone()
            };
            res.push(UpdateCollection::from_parts(
                withdraws, conventional, nexthop, attributes
            ));
        }
        if let Some(reach) = self.mp_reach().filter(|_| !mp.is_empty()) {
            let mut attributes = self.section.attributes.clone();
            attributes.remove(PathAttributeType::ConventionalNextHop);
            res.push(UpdateCollection::from_parts(
                Vec::new(), mp, Some(*reach.nexthop()), attributes
            ));
        }
        Ok(res)
    }
}

impl AsRef<[u8]> for UpdateMessage {
    fn as_ref(&self) -> &[u8] {
        self.octets.as_ref()
    }
}

impl PartialEq for UpdateMessage {
    fn eq(&self, other: &Self) -> bool {
        self.octets == other.octets
    }
}

impl Eq for UpdateMessage { }

impl fmt::Display for UpdateMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.header)?;
        if let Some(afisafi) = self.is_eor() {
            return write!(f, " End-of-RIB {}", afisafi);
        }
        write!(
            f, ", {} withdrawn, {} attributes, {} nlri",
            self.withdrawn.packed_len(),
            self.section.attributes.len(),
            self.announced.packed_len(),
        )?;
        if let Some(reach) = self.mp_reach() {
            write!(f, ", {}", reach)?;
        }
        if let Some(unreach) = self.mp_unreach() {
            write!(f, ", {}", unreach)?;
        }
        Ok(())
    }
}

//------------ Tests ---------------------------------------------------------
