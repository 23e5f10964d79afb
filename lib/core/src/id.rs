//! Typed identifiers.
//!
//! Each id wraps a ULID, so ids sort by creation time, and renders with a
//! short type prefix (`conv_01J...`). Parsing accepts the prefixed form or
//! the bare ULID.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// An id string that is not a ULID, with or without its prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    pub kind: &'static str,
    pub input: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid {} id", self.input, self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident => $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// A fresh id stamped with the current time.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            #[must_use]
            pub const fn ulid(&self) -> Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", Self::PREFIX, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bare = s
                    .strip_prefix(Self::PREFIX)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .unwrap_or(s);
                bare.parse::<Ulid>().map(Self).map_err(|_| ParseIdError {
                    kind: Self::PREFIX,
                    input: s.to_string(),
                })
            }
        }
    };
}

ulid_id!(
    /// The operator who owns a conversation.
    UserId => "usr"
);

ulid_id!(
    /// A conversation; memory and history are keyed by it.
    ConversationId => "conv"
);

ulid_id!(
    /// A persisted message.
    MessageId => "msg"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_prefix() {
        assert!(ConversationId::new().to_string().starts_with("conv_"));
        assert!(UserId::new().to_string().starts_with("usr_"));
    }

    #[test]
    fn parses_prefixed_and_bare() {
        let id = ConversationId::new();
        assert_eq!(id.to_string().parse::<ConversationId>().unwrap(), id);
        assert_eq!(id.ulid().to_string().parse::<ConversationId>().unwrap(), id);
    }

    #[test]
    fn rejects_garbage() {
        let err = "conv_nope".parse::<ConversationId>().unwrap_err();
        assert_eq!(err.kind, "conv");
        assert_eq!(err.input, "conv_nope");
    }

    #[test]
    fn later_ids_sort_after_earlier_ones() {
        let first = MessageId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(MessageId::new() > first);
    }

    #[test]
    fn serializes_as_bare_ulid() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.ulid()));
    }
}
