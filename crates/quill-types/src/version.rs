use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-document version number.
///
/// Numbers start at [`VersionNumber::BASE`] and grow by exactly one for each
/// appended version; the version store is the only component that assigns
/// them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionNumber(u32);

impl VersionNumber {
    /// Number of the first version of every document.
    pub const BASE: Self = Self(1);

    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// The number directly after this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns `true` for the first version of a document.
    pub fn is_base(&self) -> bool {
        *self == Self::BASE
    }
}

impl fmt::Debug for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u32> for VersionNumber {
    fn from(n: u32) -> Self {
        Self(n)
    }
}
