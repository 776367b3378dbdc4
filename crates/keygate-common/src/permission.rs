use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Granting this entry satisfies any requirement.
pub const WILDCARD: &str = "*";

/// Ordered set of permission strings.
///
/// Stored as comma-joined text; in memory every entry is trimmed and non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_csv(raw: &str) -> Self {
        raw.split(',').collect()
    }

    pub fn to_csv(&self) -> String {
        self.0.iter().map(String::as_str).collect::<Vec<_>>().join(",")
    }

    pub fn insert(&mut self, permission: impl AsRef<str>) -> bool {
        let permission = permission.as_ref().trim();
        if permission.is_empty() {
            return false;
        }
        self.0.insert(permission.to_string())
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission.trim())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.contains(WILDCARD)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// True when every entry of `required` is granted by this set.
    ///
    /// A blank required entry can only be met by the wildcard.
    pub fn grants<S: AsRef<str>>(&self, required: &[S]) -> bool {
        if required.is_empty() {
            return true;
        }
        if self.is_empty() {
            return false;
        }
        if self.is_wildcard() {
            return true;
        }
        required
            .iter()
            .all(|permission| self.0.contains(permission.as_ref().trim()))
    }
}

impl<S: AsRef<str>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = PermissionSet::new();
        for permission in iter {
            set.insert(permission);
        }
        set
    }
}

impl From<Vec<String>> for PermissionSet {
    fn from(value: Vec<String>) -> Self {
        value.into_iter().collect()
    }
}

impl From<PermissionSet> for Vec<String> {
    fn from(value: PermissionSet) -> Self {
        value.0.into_iter().collect()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_csv())
    }
}

/// Evaluates a stored comma-joined grant against the required permissions.
pub fn has_permissions<S: AsRef<str>>(granted_csv: &str, required: &[S]) -> bool {
    PermissionSet::from_csv(granted_csv).grants(required)
}
