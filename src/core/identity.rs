//! Layer 1: Identity atoms
//!
//! BlobRef: content-hash name of an immutable blob
//! UserId: federated user identity (`name@domain`)

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::{CoreError, InvalidId};

/// Content-hash identifier of an immutable blob.
///
/// Opaque beyond non-emptiness: foreign stores may use any hash scheme, so
/// equality is string equality and nothing more. Refs minted locally by
/// [`BlobRef::for_bytes`] use the `sha256-<hex>` form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() {
            Err(InvalidId::BlobRef {
                raw: s,
                reason: "empty".into(),
            }
            .into())
        } else {
            Ok(Self(s))
        }
    }

    /// Hash the exact byte sequence to be stored.
    pub fn for_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(7 + 64);
        hex.push_str("sha256-");
        for b in digest {
            use std::fmt::Write;
            let _ = write!(hex, "{:02x}", b);
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobRef({:?})", self.0)
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Federated user identity in `name@domain` form.
///
/// Both halves must be non-empty. No further validation: the signing layer,
/// not the indexer, is the authority on who a user is.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() {
            return Err(InvalidId::User {
                raw: s,
                reason: "empty".into(),
            }
            .into());
        }
        let Some((name, domain)) = s.split_once('@') else {
            return Err(InvalidId::User {
                raw: s,
                reason: "missing '@' separator".into(),
            }
            .into());
        };
        if name.is_empty() || domain.is_empty() {
            return Err(InvalidId::User {
                raw: s,
                reason: "name and domain must be non-empty".into(),
            }
            .into());
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn domain(&self) -> &str {
        self.0.split_once('@').map(|(_, d)| d).unwrap_or("")
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({:?})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = CoreError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        UserId::parse(s)
    }
}

impl From<UserId> for String {
    fn from(u: UserId) -> String {
        u.0
    }
}
