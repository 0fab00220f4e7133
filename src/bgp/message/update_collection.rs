use std::fmt;
use std::sync::Arc;

use crate::bgp::message::update_builder::{ComposeError, UpdateBuilder};
use crate::bgp::message::{SessionConfig, UpdateMessage};
use crate::bgp::nlri::{AfiSafiType, NextHop, Nlri};
use crate::bgp::path_attributes::PaMap;

/// Whether a route is announced or withdrawn.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    Withdraw,
    Announce,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Action::Withdraw => write!(f, "withdraw"),
            Action::Announce => write!(f, "announce"),
        }
    }
}

//------------ RouteChange ---------------------------------------------------

/// A single announcement or withdrawal as handed to the [`UpdateBuilder`].
///
/// For withdrawals, `nexthop` and `attributes` are ignored.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RouteChange {
    pub nlri: Nlri,
    pub action: Action,
    pub nexthop: Option<NextHop>,
    pub attributes: Arc<PaMap>,
}

impl RouteChange {
    pub fn announce(
        nlri: Nlri,
        nexthop: Option<NextHop>,
        attributes: Arc<PaMap>
    ) -> Self {
        Self { nlri, action: Action::Announce, nexthop, attributes }
    }

    pub fn withdraw(nlri: Nlri) -> Self {
        Self {
            nlri,
            action: Action::Withdraw,
            nexthop: None,
            attributes: Arc::default(),
        }
    }
}

//------------ UpdateCollection ----------------------------------------------

/// A batch of route changes sharing one set of path attributes.
///
/// All announced NLRI share the family, the next hop and the attributes of
/// the collection. The next hop is kept separate from the attributes: for
/// IPv4 unicast it ends up in the NEXT_HOP attribute, for every other
/// family in MP_REACH_NLRI. Withdrawn NLRI may be of any family.
///
/// A collection is a purely semantic container. It becomes one or more
/// [`UpdateMessage`]s via [`pack`][Self::pack].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UpdateCollection {
    withdraws: Vec<Nlri>,
    announces: Vec<Nlri>,
    nexthop: Option<NextHop>,
    attributes: Arc<PaMap>,
}

impl UpdateCollection {
    pub fn new(attributes: PaMap, nexthop: Option<NextHop>) -> Self {
        Self {
            withdraws: Vec::new(),
            announces: Vec::new(),
            nexthop,
            attributes: Arc::new(attributes),
        }
    }

    /// Creates a collection without checking the announced families.
    pub(crate) fn from_parts(
        withdraws: Vec<Nlri>,
        announces: Vec<Nlri>,
        nexthop: Option<NextHop>,
        attributes: PaMap,
    ) -> Self {
        Self {
            withdraws,
            announces,
            nexthop,
            attributes: Arc::new(attributes),
        }
    }

    /// Creates a collection with withdrawals only.
    pub fn withdrawals(withdraws: Vec<Nlri>) -> Self {
        Self { withdraws, ..Default::default() }
    }

    /// Adds an announcement.
    ///
    /// The NLRI must be of the same family as those already announced.
    pub fn announce(&mut self, nlri: Nlri) -> Result<(), ComposeError> {
        if let Some(afisafi) = self.afisafi() {
            if nlri.afisafi() != afisafi {
                return Err(ComposeError::IllegalCombination);
            }
        }
        self.announces.push(nlri);
        Ok(())
    }

    pub fn withdraw(&mut self, nlri: Nlri) {
        self.withdraws.push(nlri);
    }

    /// The family of the announced NLRI, if any.
    pub fn afisafi(&self) -> Option<AfiSafiType> {
        self.announces.first().map(|n| n.afisafi())
    }

    pub fn announces(&self) -> &[Nlri] {
        &self.announces
    }

    pub fn withdraws(&self) -> &[Nlri] {
        &self.withdraws
    }

    pub fn nexthop(&self) -> Option<&NextHop> {
        self.nexthop.as_ref()
    }

    pub fn attributes(&self) -> &PaMap {
        &self.attributes
    }

    pub fn is_empty(&self) -> bool {
        self.announces.is_empty() && self.withdraws.is_empty()
    }

    /// Returns all changes, withdrawals first.
    pub fn changes(&self) -> impl Iterator<Item = RouteChange> + '_ {
        self.withdraws.iter().map(|n| RouteChange::withdraw(n.clone()))
            .chain(self.announces.iter().map(|n| RouteChange::announce(
                n.clone(), self.nexthop, self.attributes.clone()
            )))
    }

    /// Turns all announcements into withdrawals.
    ///
    /// This is the treat-as-withdraw of RFC 7606.
    pub fn into_withdrawals(mut self) -> Self {
        self.withdraws.append(&mut self.announces);
        self.nexthop = None;
        self.attributes = Arc::default();
        self
    }

    /// Packs the collection into as few messages as possible.
    pub fn pack(&self, config: &SessionConfig)
        -> Result<Vec<UpdateMessage>, ComposeError>
    {
        let mut builder = UpdateBuilder::new(*config);
        builder.extend(self.changes());
        builder.build()
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::nlri::NlriSettings;

    fn nlri(afisafi: AfiSafiType, prefix: &str) -> Nlri {
        let mut s = NlriSettings::new(afisafi);
        s.prefix(prefix.parse().unwrap());
        s.build().unwrap()
    }

    #[test]
    fn collection() {
        let mut coll = UpdateCollection::new(PaMap::empty(), None);
        assert!(coll.is_empty());
        coll.announce(nlri(AfiSafiType::Ipv4Unicast, "10.0.0.0/8")).unwrap();
        assert_eq!(
            coll.announce(nlri(AfiSafiType::Ipv6Unicast, "2001:db8::/32")),
            Err(ComposeError::IllegalCombination)
        );
        coll.withdraw(nlri(AfiSafiType::Ipv6Unicast, "2001:db8::/32"));
        assert_eq!(coll.afisafi(), Some(AfiSafiType::Ipv4Unicast));

        let changes: Vec<_> = coll.changes().collect();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].action, Action::Withdraw);
        assert_eq!(changes[1].action, Action::Announce);

        let withdrawn = coll.into_withdrawals();
        assert_eq!(withdrawn.withdraws().len(), 2);
        assert!(withdrawn.announces().is_empty());
    }
}
