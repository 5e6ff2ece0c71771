//! Typed identifiers for the core domain records.
//!
//! Mirrors the newtype-over-`Uuid` pattern used throughout the gateway: a
//! bare `Uuid` says nothing about which table it addresses, so each record
//! family gets its own wrapper.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

uuid_id!(RawMessageId);
uuid_id!(ItemId);
uuid_id!(ResolvedLinkId);
uuid_id!(EvidenceSourceId);
uuid_id!(QueueItemId);
uuid_id!(ClusterId);

/// Identifier for a source Telegram channel. Channels are referenced by
/// their Telegram-assigned numeric id, carried as a string since channel
/// ids routinely exceed convenient integer ranges in practice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ChannelId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct() {
        assert_ne!(ItemId::new(), ItemId::new());
    }

    #[test]
    fn id_roundtrips_through_json() {
        let id = RawMessageId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: RawMessageId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
