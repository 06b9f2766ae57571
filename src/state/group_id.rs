//! Typed chat-group identifier bridging the chat platform and the listing store.
//!
//! The chat platform addresses super-groups with a negative id carrying a fixed
//! `-100` prefix (`-1001234567890`), while listings persist the bare positive
//! suffix (`"1234567890"`). Both forms are derived from a single [`GroupId`]
//! so callers never juggle raw integers with an implicit sign convention.

use std::fmt;

use thiserror::Error;

/// Offset the chat platform adds (negated) to super-group identifiers.
pub const SUPERGROUP_OFFSET: i64 = 1_000_000_000_000;

/// Reasons a raw identifier cannot be turned into a [`GroupId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupIdError {
    /// The storage value is not an integer.
    #[error("group id `{0}` is not numeric")]
    NotNumeric(String),
    /// The storage value is zero or does not fit below the platform offset.
    #[error("group id `{0}` is out of range for the storage form")]
    StorageOutOfRange(String),
    /// The platform value is not a super-group identifier.
    #[error("chat id {0} is not a super-group id")]
    NotSupergroup(i64),
}

/// Identifier of a chat group linked to a listing.
///
/// Internally kept in storage form (the positive suffix); the platform form is
/// computed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(i64);

impl GroupId {
    /// Build from the chat platform's signed super-group id.
    pub fn from_platform(chat_id: i64) -> Result<Self, GroupIdError> {
        let suffix = chat_id
            .checked_add(SUPERGROUP_OFFSET)
            .and_then(i64::checked_neg)
            .filter(|suffix| *suffix > 0)
            .ok_or(GroupIdError::NotSupergroup(chat_id))?;
        Ok(Self(suffix))
    }

    /// Build from the persisted storage representation.
    ///
    /// Legacy records that already hold the signed platform form (leading `-`)
    /// are accepted and normalised.
    pub fn from_storage(value: &str) -> Result<Self, GroupIdError> {
        let trimmed = value.trim();
        let parsed = trimmed
            .parse::<i64>()
            .map_err(|_| GroupIdError::NotNumeric(trimmed.to_owned()))?;

        if trimmed.starts_with('-') {
            return Self::from_platform(parsed);
        }

        if parsed <= 0 || parsed.checked_add(SUPERGROUP_OFFSET).is_none() {
            return Err(GroupIdError::StorageOutOfRange(trimmed.to_owned()));
        }
        Ok(Self(parsed))
    }

    /// Signed id understood by the chat platform.
    pub fn to_platform(self) -> i64 {
        -(SUPERGROUP_OFFSET + self.0)
    }

    /// Canonical storage representation.
    pub fn to_storage(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_platform())
    }
}
