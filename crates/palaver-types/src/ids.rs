//! Wire-width identifier wrappers.
//!
//! Every entity in the protocol has a strongly-typed id to prevent
//! accidental mixing of identifiers at compile time. All ids are `u16`
//! because that is their exact width on the wire (see `docs/protocol.md`);
//! the topmost value is reserved as a null sentinel in every id space.
//!
//! Ids are allocated by whoever owns the entity: the agent container hands
//! out [`AgentId`]s, item and node ids come from whoever seeds the cluster.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around a `u16` wire identifier.
macro_rules! define_wire_id {
    (
        $(#[$meta:meta])*
        $name:ident, $none_doc:expr
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u16);

        impl $name {
            #[doc = $none_doc]
            pub const NONE: Self = Self(u16::MAX);

            /// Return the raw wire representation.
            pub const fn into_inner(self) -> u16 {
                self.0
            }

            /// Whether this id is the null sentinel.
            pub const fn is_none(self) -> bool {
                self.0 == u16::MAX
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                if self.is_none() {
                    write!(f, "none")
                } else {
                    write!(f, "{}", self.0)
                }
            }
        }

        impl From<u16> for $name {
            fn from(raw: u16) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u16 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_wire_id! {
    /// Unique identifier for an agent within one process.
    AgentId,
    "Sentinel destination meaning \"the directory service\", not an agent."
}

define_wire_id! {
    /// Identifier for a tradeable item kind.
    ItemId,
    "Sentinel meaning \"no item\": a free contribution has this constraint."
}

define_wire_id! {
    /// Identifier for a node (a participant host-local trading entity).
    NodeId,
    "Sentinel for an unassigned node slot."
}
