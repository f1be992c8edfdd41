//! Group-based permission resolution.
//!
//! A [`PermissionMatrix`] maps directory group names to the actions they grant
//! on each [`Resource`]. Resolution is a pure union over the caller's groups;
//! unknown groups contribute nothing, so an empty or unrecognised group list
//! is denied everything.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Employees,
    Workspaces,
    Monitoring,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Employees, Resource::Workspaces, Resource::Monitoring];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Employees => "employees",
            Resource::Workspaces => "workspaces",
            Resource::Monitoring => "monitoring",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "create")]
    Create,
    #[serde(rename = "read")]
    Read,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "delete")]
    Delete,
    /// Unrestricted access to the resource.
    #[serde(rename = "*")]
    Any,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Any => "*",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved permissions: every resource is present, possibly with no actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeMap<Resource, BTreeSet<Action>>);

impl Default for PermissionSet {
    fn default() -> Self {
        Self(Resource::ALL.iter().map(|r| (*r, BTreeSet::new())).collect())
    }
}

impl PermissionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Actions granted on `resource`.
    pub fn actions(&self, resource: Resource) -> impl Iterator<Item = Action> + '_ {
        self.0.get(&resource).into_iter().flatten().copied()
    }

    /// Whether `action` (or the `*` wildcard) is granted on `resource`.
    pub fn allows(&self, resource: Resource, action: Action) -> bool {
        self.0
            .get(&resource)
            .is_some_and(|actions| actions.contains(&action) || actions.contains(&Action::Any))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }

    fn grant(&mut self, resource: Resource, actions: &BTreeSet<Action>) {
        self.0.entry(resource).or_default().extend(actions.iter().copied());
    }
}

/// Static mapping of group name to per-resource grants.
#[derive(Debug, Clone, Default)]
pub struct PermissionMatrix {
    groups: BTreeMap<String, BTreeMap<Resource, BTreeSet<Action>>>,
}

static STANDARD_MATRIX: Lazy<PermissionMatrix> = Lazy::new(|| {
    use Action::*;
    use Resource::*;

    PermissionMatrix::new()
        .with_group(
            "HR-Admins",
            [
                (Employees, &[Create, Read, Update, Delete][..]),
                (Workspaces, &[Create, Read, Delete][..]),
                (Monitoring, &[][..]),
            ],
        )
        .with_group(
            "IT-Admins",
            [
                (Employees, &[][..]),
                (Workspaces, &[Create, Read, Delete][..]),
                (Monitoring, &[Read][..]),
            ],
        )
        .with_group(
            "Dept-Managers",
            [(Employees, &[Read][..]), (Workspaces, &[Read][..]), (Monitoring, &[][..])],
        )
        .with_group(
            "Engineering",
            [(Employees, &[Read][..]), (Workspaces, &[Read][..]), (Monitoring, &[][..])],
        )
});

impl PermissionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in HR portal matrix.
    pub fn standard() -> &'static PermissionMatrix {
        &STANDARD_MATRIX
    }

    /// Add (or extend) a group's grants.
    pub fn with_group<'a, I>(mut self, group: &str, grants: I) -> Self
    where
        I: IntoIterator<Item = (Resource, &'a [Action])>,
    {
        let entry = self.groups.entry(group.to_string()).or_default();
        for (resource, actions) in grants {
            entry.entry(resource).or_default().extend(actions.iter().copied());
        }
        self
    }

    /// Union of the grants of every group in `groups`.
    pub fn resolve<S: AsRef<str>>(&self, groups: &[S]) -> PermissionSet {
        let mut permissions = PermissionSet::empty();
        for group in groups {
            if let Some(grants) = self.groups.get(group.as_ref()) {
                for (resource, actions) in grants {
                    permissions.grant(*resource, actions);
                }
            }
        }
        permissions
    }

    pub fn has_permission<S: AsRef<str>>(&self, groups: &[S], resource: Resource, action: Action) -> bool {
        groups.iter().any(|group| {
            self.groups
                .get(group.as_ref())
                .and_then(|grants| grants.get(&resource))
                .is_some_and(|actions| actions.contains(&action) || actions.contains(&Action::Any))
        })
    }
}
