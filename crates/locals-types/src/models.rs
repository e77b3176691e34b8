use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type EventId = i64;

/// How an account was created. Fixed at creation; OAuth logins for an
/// existing email must present the same provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
    Apple,
    Meta,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Google => "google",
            Self::Apple => "apple",
            Self::Meta => "meta",
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProvider(pub String);

impl fmt::Display for UnknownProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown auth provider '{}'", self.0)
    }
}

impl std::error::Error for UnknownProvider {}

impl FromStr for AuthProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "google" => Ok(Self::Google),
            "apple" => Ok(Self::Apple),
            // The frontend SDK reports itself as "facebook"
            "meta" | "facebook" => Ok(Self::Meta),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// An unordered pair of users, always held as (lower id, higher id).
///
/// Both directions of a DM request build the same value, so storage keyed on
/// `(low, high)` can never hold a mirrored duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DmPair {
    low: UserId,
    high: UserId,
}

impl DmPair {
    /// Returns `None` when both sides are the same user.
    pub fn new(a: UserId, b: UserId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn low(&self) -> UserId {
        self.low
    }

    pub fn high(&self) -> UserId {
        self.high
    }

    /// The other member of the pair, if `user` is one of them.
    pub fn peer_of(&self, user: UserId) -> Option<UserId> {
        if user == self.low {
            Some(self.high)
        } else if user == self.high {
            Some(self.low)
        } else {
            None
        }
    }
}
