//! Type-safe identifier wrappers.
//!
//! Spikes and activations are numbered independently by the reasoning
//! system, so a spike and an activation may share the same integer. The
//! distinct newtypes keep the two id spaces from being mixed at compile
//! time. The wire format is a plain JSON integer.
//!
//! [`SessionId`] identifies one in-memory graph session. It uses UUID v7
//! (time-ordered) so session ids sort by start time.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around a `u64` wire id with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(#[ts(type = "number")] pub u64);

        impl $name {
            /// Wrap a raw wire id.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Return the raw wire id.
            pub const fn into_inner(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier of a spike (one occurrence of a signal).
    SpikeId
}

define_id! {
    /// Unique identifier of an activation (one candidate behavior instance).
    ActivationId
}

/// Unique identifier of a visualizer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new session identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&SpikeId::new(7)).ok();
        assert_eq!(json.as_deref(), Some("7"));

        let parsed: Result<ActivationId, _> = serde_json::from_str("12");
        assert_eq!(parsed.ok(), Some(ActivationId::new(12)));
    }

    #[test]
    fn negative_wire_id_is_rejected() {
        let parsed: Result<SpikeId, _> = serde_json::from_str("-1");
        assert!(parsed.is_err());
    }

    #[test]
    fn session_ids_are_distinct() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
