use inetnum::addr::Prefix;

use crate::bgp::message::update_builder::ComposeError;

use super::afisafi::{Afi, AfiSafiType, Nlri, NlriBody, Safi};
use super::mpls::MplsNlri;
use super::mpls_vpn::MplsVpnNlri;
use super::qualifier::{Labels, PathId, RouteDistinguisher};
use super::unicast::UnicastNlri;

/// Collects the fields of a prefix based NLRI before it is built.
///
/// [`Nlri`] values can not be changed after construction. Producers that
/// learn labels, RD or path identifier piecemeal set them here and call
/// [`build`][Self::build] once everything is known.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NlriSettings {
    afisafi: AfiSafiType,
    prefix: Option<Prefix>,
    labels: Option<Labels>,
    rd: Option<RouteDistinguisher>,
    path_id: Option<PathId>,
}

impl NlriSettings {
    pub fn new(afisafi: AfiSafiType) -> Self {
        Self { afisafi, prefix: None, labels: None, rd: None, path_id: None }
    }

    pub fn afisafi(&self) -> AfiSafiType {
        self.afisafi
    }

    pub fn prefix(&mut self, prefix: Prefix) -> &mut Self {
        self.prefix = Some(prefix);
        self
    }

    pub fn labels(&mut self, labels: Labels) -> &mut Self {
        self.labels = Some(labels);
        self
    }

    pub fn rd(&mut self, rd: RouteDistinguisher) -> &mut Self {
        self.rd = Some(rd);
        self
    }

    pub fn path_id(&mut self, path_id: PathId) -> &mut Self {
        self.path_id = Some(path_id);
        self
    }

    /// Reclassifies the family from the fields actually present.
    ///
    /// A prefix with labels and RD becomes VPN, with labels only it
    /// becomes labeled unicast, and without either plain unicast. A
    /// declared multicast family stays multicast when neither is set. The
    /// AFI follows the prefix if there is one.
    pub fn normalize(&mut self) -> &mut Self {
        let afi = match self.prefix {
            Some(p) if p.is_v4() => Afi::Ipv4,
            Some(_) => Afi::Ipv6,
            None => self.afisafi.afi(),
        };
        let safi = match (&self.labels, self.rd) {
            (Some(_), Some(_)) | (None, Some(_)) => Safi::MplsVpnUnicast,
            (Some(_), None) => Safi::MplsUnicast,
            (None, None) if self.afisafi.safi() == Safi::Multicast => {
                Safi::Multicast
            }
            (None, None) => Safi::Unicast,
        };
        self.afisafi = AfiSafiType::from((u16::from(afi), u8::from(safi)));
        self
    }

    /// Builds the NLRI, checking the fields against the declared family.
    pub fn build(&self) -> Result<Nlri, ComposeError> {
        use AfiSafiType::*;

        let prefix = self.prefix.ok_or(
            ComposeError::InvalidNlri("missing prefix")
        )?;
        let v4 = match self.afisafi.afi() {
            Afi::Ipv4 => true,
            Afi::Ipv6 => false,
            _ => return Err(ComposeError::IllegalCombination),
        };
        if prefix.is_v4() != v4 {
            return Err(ComposeError::WrongAddressType);
        }

        let body = match self.afisafi {
            Ipv4Unicast | Ipv6Unicast | Ipv4Multicast | Ipv6Multicast => {
                if self.labels.is_some() || self.rd.is_some() {
                    return Err(ComposeError::IllegalCombination);
                }
                NlriBody::Unicast(UnicastNlri::new(self.afisafi, prefix)?)
            }
            Ipv4MplsUnicast | Ipv6MplsUnicast => {
                if self.rd.is_some() {
                    return Err(ComposeError::IllegalCombination);
                }
                let labels = self.labels.clone().ok_or(
                    ComposeError::InvalidNlri("missing labels")
                )?;
                NlriBody::Mpls(MplsNlri::new(prefix, labels)?)
            }
            Ipv4MplsVpnUnicast | Ipv6MplsVpnUnicast => {
                let labels = self.labels.clone().ok_or(
                    ComposeError::InvalidNlri("missing labels")
                )?;
                let rd = self.rd.ok_or(
                    ComposeError::InvalidNlri("missing route distinguisher")
                )?;
                NlriBody::MplsVpn(MplsVpnNlri::new(prefix, labels, rd)?)
            }
            _ => return Err(ComposeError::IllegalCombination),
        };
        Ok(Nlri::new(body, self.path_id))
    }
}

impl Nlri {
    /// Returns the settings this NLRI could be rebuilt from.
    ///
    /// Only prefix based families have settings.
    pub fn to_settings(&self) -> Option<NlriSettings> {
        let mut res = NlriSettings::new(self.afisafi());
        match self.body() {
            NlriBody::Unicast(n) => {
                res.prefix(n.prefix());
            }
            NlriBody::Mpls(n) => {
                res.prefix(n.prefix()).labels(n.labels().clone());
            }
            NlriBody::MplsVpn(n) => {
                res.prefix(n.prefix())
                    .labels(n.labels().clone())
                    .rd(n.rd());
            }
            _ => return None,
        }
        res.path_id = self.path_id();
        Some(res)
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn build_vpn() {
        let mut settings = NlriSettings::new(AfiSafiType::Ipv4MplsVpnUnicast);
        settings.prefix(Prefix::from_str("10.0.0.0/24").unwrap());
        assert!(settings.build().is_err());
        settings.labels(Labels::from_values(&[100]).unwrap());
        assert!(settings.build().is_err());
        settings.rd(RouteDistinguisher::from_asn2(65000, 1));
        let nlri = settings.build().unwrap();
        assert_eq!(nlri.afisafi(), AfiSafiType::Ipv4MplsVpnUnicast);
        assert_eq!(nlri.to_settings().unwrap(), settings);
    }

    #[test]
    fn normalize() {
        let mut settings = NlriSettings::new(AfiSafiType::Ipv4MplsVpnUnicast);
        settings.prefix(Prefix::from_str("2001:db8::/32").unwrap());
        settings.normalize();
        assert_eq!(settings.afisafi(), AfiSafiType::Ipv6Unicast);
        let nlri = settings.build().unwrap();
        assert_eq!(nlri.to_string(), "2001:db8::/32");

        settings.labels(Labels::from_values(&[16]).unwrap())
            .path_id(PathId(7))
            .normalize();
        assert_eq!(settings.afisafi(), AfiSafiType::Ipv6MplsUnicast);
        let nlri = settings.build().unwrap();
        assert_eq!(nlri.path_id(), Some(PathId(7)));

        let mut mc = NlriSettings::new(AfiSafiType::Ipv4Multicast);
        mc.prefix(Prefix::from_str("232.0.0.0/8").unwrap()).normalize();
        assert_eq!(mc.afisafi(), AfiSafiType::Ipv4Multicast);
    }

    #[test]
    fn mismatches() {
        let mut settings = NlriSettings::new(AfiSafiType::Ipv4Unicast);
        settings.prefix(Prefix::from_str("2001:db8::/32").unwrap());
        assert_eq!(settings.build(), Err(ComposeError::WrongAddressType));

        let mut settings = NlriSettings::new(AfiSafiType::Ipv4Unicast);
        settings.prefix(Prefix::from_str("10.0.0.0/8").unwrap())
            .rd(RouteDistinguisher::zeroes());
        assert_eq!(settings.build(), Err(ComposeError::IllegalCombination));

        let settings = NlriSettings::new(AfiSafiType::L2VpnEvpn);
        assert!(settings.build().is_err());
    }
}
