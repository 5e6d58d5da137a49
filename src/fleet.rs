//! Fleet inventory records and the cluster credential objects derived from
//! them.
//!
//! Resource names follow the hub API layout:
//! `projects/{project}/locations/{location}/memberships/{membership}` and
//! `.../memberships/{membership}/bindings/{binding}`.

use log::warn;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FleetError {
    #[error("invalid membership resource name: {0}")]
    InvalidMembershipName(String),
    #[error("invalid membership binding resource name: {0}")]
    InvalidBindingName(String),
    #[error("invalid scope in binding {binding}: {scope}")]
    InvalidScope { binding: String, scope: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MembershipName {
    pub project: String,
    pub location: String,
    pub membership: String,
}

impl FromStr for MembershipName {
    type Err = FleetError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = name.split('/').collect();
        match parts.as_slice() {
            ["projects", project, "locations", location, "memberships", membership]
                if !project.is_empty() && !location.is_empty() && !membership.is_empty() =>
            {
                Ok(Self {
                    project: project.to_string(),
                    location: location.to_string(),
                    membership: membership.to_string(),
                })
            }
            _ => Err(FleetError::InvalidMembershipName(name.to_string())),
        }
    }
}

impl fmt::Display for MembershipName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/locations/{}/memberships/{}",
            self.project, self.location, self.membership
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MembershipBindingName {
    pub membership: MembershipName,
    pub binding: String,
}

impl FromStr for MembershipBindingName {
    type Err = FleetError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = name.split('/').collect();
        if parts.len() != 8 || parts[6] != "bindings" || parts[7].is_empty() {
            return Err(FleetError::InvalidBindingName(name.to_string()));
        }
        let membership = parts[..6]
            .join("/")
            .parse::<MembershipName>()
            .map_err(|_| FleetError::InvalidBindingName(name.to_string()))?;
        Ok(Self {
            membership,
            binding: parts[7].to_string(),
        })
    }
}

/// Connect gateway endpoint for a member cluster.
pub fn connect_gateway_url(project_num: &str, location: &str, membership: &str) -> String {
    if location == "global" {
        format!(
            "https://connectgateway.googleapis.com/v1/projects/{project_num}/locations/{location}/gkeMemberships/{membership}"
        )
    } else {
        format!(
            "https://{location}-connectgateway.googleapis.com/v1/projects/{project_num}/locations/{location}/gkeMemberships/{membership}"
        )
    }
}

/// Desired cluster credential object for one membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterSecretSpec {
    /// `{membership}.{location}.{project_num}`
    pub name: String,
    pub short_name: String,
    pub server: String,
}

impl ClusterSecretSpec {
    pub fn for_membership(membership: &MembershipName, project_num: &str) -> Self {
        Self {
            name: format!(
                "{}.{}.{}",
                membership.membership, membership.location, project_num
            ),
            short_name: membership.membership.clone(),
            server: connect_gateway_url(project_num, &membership.location, &membership.membership),
        }
    }
}

/// Membership to scope associations, indexed both ways.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tenancy {
    pub memberships: BTreeMap<MembershipName, Vec<String>>,
    pub scopes: BTreeMap<String, Vec<MembershipName>>,
}

impl Tenancy {
    pub fn members_of(&self, scope: &str) -> Option<&[MembershipName]> {
        self.scopes.get(scope).map(Vec::as_slice)
    }

    /// One credential object per known membership.
    pub fn cluster_secrets(&self, project_num: &str) -> Vec<ClusterSecretSpec> {
        self.memberships
            .keys()
            .map(|membership| ClusterSecretSpec::for_membership(membership, project_num))
            .collect()
    }
}

/// Builds the tenancy maps. `bindings` pairs a binding resource name with its
/// scope resource name. Malformed entries are skipped with a warning.
pub fn build_tenancy<'a>(
    memberships: impl IntoIterator<Item = &'a str>,
    scopes: impl IntoIterator<Item = &'a str>,
    bindings: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Tenancy {
    let mut tenancy = Tenancy::default();
    for name in memberships {
        match name.parse::<MembershipName>() {
            Ok(membership) => {
                tenancy.memberships.entry(membership).or_default();
            }
            Err(err) => warn!("event=fleet_record_skipped error={err}"),
        }
    }
    for scope in scopes {
        tenancy
            .scopes
            .entry(scope_id(scope).to_string())
            .or_default();
    }
    for (binding, scope) in bindings {
        let parsed = match binding.parse::<MembershipBindingName>() {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("event=fleet_record_skipped error={err}");
                continue;
            }
        };
        let scope = scope_id(scope);
        if scope.is_empty() {
            let err = FleetError::InvalidScope {
                binding: binding.to_string(),
                scope: scope.to_string(),
            };
            warn!("event=fleet_record_skipped error={err}");
            continue;
        }
        tenancy
            .memberships
            .entry(parsed.membership.clone())
            .or_default()
            .push(scope.to_string());
        tenancy
            .scopes
            .entry(scope.to_string())
            .or_default()
            .push(parsed.membership);
    }
    tenancy
}

fn scope_id(scope: &str) -> &str {
    scope.rsplit('/').next().unwrap_or(scope)
}
