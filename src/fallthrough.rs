//! Fallthrough policy for names the record store does not know.

use hickory_proto::rr::Name;

use crate::error::DnsError;

/// Decides whether a no-match is handed to the next handler instead of
/// answering NXDOMAIN.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fallthrough {
    zones: Vec<Name>,
}

impl Fallthrough {
    /// Never fall through.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Fall through for every name.
    pub fn all() -> Self {
        Self {
            zones: vec![Name::root()],
        }
    }

    /// Fall through for names within any of `zones`. An empty list means all names.
    pub fn zones(zones: Vec<Name>) -> Self {
        if zones.is_empty() {
            return Self::all();
        }
        Self { zones }
    }

    /// Build from the configured zone list; `None` disables fallthrough.
    pub fn from_config(zones: Option<&[String]>) -> Result<Self, DnsError> {
        let Some(zones) = zones else {
            return Ok(Self::disabled());
        };

        let zones = zones
            .iter()
            .map(|zone| -> Result<Name, DnsError> {
                let mut name = Name::from_ascii(zone)?;
                name.set_fqdn(true);
                Ok(name)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::zones(zones))
    }

    /// True when any fallthrough zone is configured.
    pub fn is_enabled(&self) -> bool {
        !self.zones.is_empty()
    }

    /// Whether a no-match for `name` should go to the next handler.
    pub fn through(&self, name: &Name) -> bool {
        self.zones
            .iter()
            .any(|zone| zone.is_root() || zone.zone_of(name))
    }
}
