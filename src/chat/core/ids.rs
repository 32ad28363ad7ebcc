// File: src/chat/core/ids.rs

//! Identifier types for the chat session engine.
//!
//! Placeholders are resolved by [`MessageId`] rather than by their index in
//! the history, and every file selection gets a fresh [`SelectionId`] so a
//! late encode result can be recognised as stale.
//!
//! ## Cargo features used by this module
//! - `uuid_v7`: enables `UUIDv7` generation via `uuid/v7`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a time-ordered ID when `uuid_v7` is enabled, random otherwise.
#[inline]
#[must_use]
fn uuid_time_ordered() -> Uuid {
    #[cfg(feature = "uuid_v7")]
    {
        Uuid::now_v7()
    }
    #[cfg(not(feature = "uuid_v7"))]
    {
        Uuid::new_v4()
    }
}

/// Declare a UUID newtype with a consistent API.
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            /// Create a new identifier.
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(uuid_time_ordered())
            }

            /// Borrow the underlying UUID.
            #[inline]
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            #[inline]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_uuid_id!(
    /// Identifier of a transcript message.
    ///
    /// Assigned when the message is appended and never reused, so an
    /// in-flight query can find its placeholder after other appends.
    MessageId
);

define_uuid_id!(
    /// Generation of a file selection.
    ///
    /// Each `select_file` mints a new one; encode results tagged with an older
    /// generation are discarded.
    SelectionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = MessageId::new();
        let b = MessageId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_parses_back() {
        let id = SelectionId::new();
        let parsed: SelectionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.as_uuid(), id.as_uuid());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("not-a-uuid".parse::<MessageId>().is_err());
    }
}
