//! Layer 2: Access control atoms
//!
//! PermissionBits: Read/Write/Invite/Expel bitmask
//! PermAction: what a permission blob does to membership
//! AclDelta: the transformable allow/deny payload of a permission node

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use serde::{Deserialize, Serialize};

use super::error::InvalidPermAction;

/// Bitmask of document capabilities.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionBits(pub u32);

impl PermissionBits {
    pub const NONE: PermissionBits = PermissionBits(0);
    pub const READ: PermissionBits = PermissionBits(1);
    pub const WRITE: PermissionBits = PermissionBits(1 << 1);
    pub const INVITE: PermissionBits = PermissionBits(1 << 2);
    pub const EXPEL: PermissionBits = PermissionBits(1 << 3);
    /// Union of every defined capability. The document owner holds this.
    pub const ALL: PermissionBits =
        PermissionBits(Self::READ.0 | Self::WRITE.0 | Self::INVITE.0 | Self::EXPEL.0);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `mask` is present.
    pub fn contains(self, mask: PermissionBits) -> bool {
        self.0 & mask.0 == mask.0
    }
}

impl BitOr for PermissionBits {
    type Output = PermissionBits;
    fn bitor(self, rhs: Self) -> Self {
        PermissionBits(self.0 | rhs.0)
    }
}

impl BitAnd for PermissionBits {
    type Output = PermissionBits;
    fn bitand(self, rhs: Self) -> Self {
        PermissionBits(self.0 & rhs.0)
    }
}

impl Not for PermissionBits {
    type Output = PermissionBits;
    fn not(self) -> Self {
        PermissionBits(!self.0)
    }
}

impl fmt::Debug for PermissionBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = Vec::new();
        if self.contains(PermissionBits::READ) {
            names.push("read");
        }
        if self.contains(PermissionBits::WRITE) {
            names.push("write");
        }
        if self.contains(PermissionBits::INVITE) {
            names.push("invite");
        }
        if self.contains(PermissionBits::EXPEL) {
            names.push("expel");
        }
        write!(f, "PermissionBits({})", names.join("|"))
    }
}

/// Membership effect of a permission blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermAction {
    Invite,
    Expel,
    Change,
}

impl PermAction {
    pub fn parse(raw: &str) -> Result<Self, InvalidPermAction> {
        match raw {
            "invite" => Ok(PermAction::Invite),
            "expel" => Ok(PermAction::Expel),
            "change" => Ok(PermAction::Change),
            _ => Err(InvalidPermAction {
                raw: raw.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PermAction::Invite => "invite",
            PermAction::Expel => "expel",
            PermAction::Change => "change",
        }
    }
}

impl fmt::Display for PermAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transformable payload of a permission node.
///
/// Folding a delta into a user's bits is `(bits | allow) & !deny`; deny wins
/// over allow within a single delta.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclDelta {
    pub allow: PermissionBits,
    pub deny: PermissionBits,
}

impl AclDelta {
    pub fn new(allow: PermissionBits, deny: PermissionBits) -> Self {
        Self { allow, deny }
    }

    /// Fold this delta into an existing capability set.
    pub fn fold_into(self, bits: PermissionBits) -> PermissionBits {
        (bits | self.allow) & !self.deny
    }
}
