//! Identity of the module being published.

use std::fmt;

use serde::{Deserialize, Serialize};

/// organisation, name and revision of a published module
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleId {
    pub organisation: String,
    pub name: String,
    pub revision: String,
}

impl ModuleId {
    pub fn new(
        organisation: impl Into<String>,
        name: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        Self {
            organisation: organisation.into(),
            name: name.into(),
            revision: revision.into(),
        }
    }

    /// changelist description for a publish of this module
    pub fn publish_description(&self) -> String {
        format!("Publishing {}", self)
    }
}

/// `org#name;rev`
impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{};{}", self.organisation, self.name, self.revision)
    }
}

/// Parse `org/name@rev`.
impl std::str::FromStr for ModuleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid module id '{}': expected org/name@rev", s);

        let (coords, revision) = s.rsplit_once('@').ok_or_else(invalid)?;
        let (organisation, name) = coords.split_once('/').ok_or_else(invalid)?;

        let parts = [organisation, name, revision];
        if parts.iter().any(|p| p.trim().is_empty() || p.contains('/')) {
            return Err(invalid());
        }

        Ok(Self::new(organisation.trim(), name.trim(), revision.trim()))
    }
}
