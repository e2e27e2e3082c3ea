//! Identifier types.
//!
//! Vessels carry a UUID v7 wrapped in [`VesselId`] so they cannot be mixed
//! up with other identifiers. Resources are addressed by name at the API
//! boundary and by [`ResourceId`], a stable hash of that name, internally.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a vessel (one resource registry per vessel).
    VesselId
}

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Integer id of a resource, derived from its name.
///
/// The id is the 32-bit FNV-1a hash of the UTF-8 name, so the same name
/// always maps to the same id across runs and processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u32);

impl ResourceId {
    /// Hash a resource name into its id.
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = FNV_OFFSET;
        let mut i = 0;
        while i < bytes.len() {
            // `i < len` guards the index; the hash wraps by definition.
            #[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
            {
                hash ^= bytes[i] as u32;
                hash = hash.wrapping_mul(FNV_PRIME);
                i += 1;
            }
        }
        Self(hash)
    }

    /// Return the raw id.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<&str> for ResourceId {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

impl core::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn vessel_ids_are_unique() {
        let a = VesselId::new();
        let b = VesselId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }

    #[test]
    fn resource_id_is_stable() {
        assert_eq!(
            ResourceId::from_name("ElectricCharge"),
            ResourceId::from("ElectricCharge")
        );
        assert_ne!(
            ResourceId::from_name("Oxygen"),
            ResourceId::from_name("Nitrogen")
        );
    }

    #[test]
    fn resource_id_matches_fnv1a_reference() {
        // Reference values for 32-bit FNV-1a.
        assert_eq!(ResourceId::from_name("").get(), 0x811c_9dc5);
        assert_eq!(ResourceId::from_name("a").get(), 0xe40c_292c);
    }

    #[test]
    fn vessel_id_roundtrip_via_serde() {
        let id = VesselId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: VesselId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
