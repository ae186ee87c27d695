//! Typed identifiers for orders, patients and encounters.
//!
//! All three wrap a canonical [`ShardableUuid`]; distinct types keep an order identifier from
//! being passed where a patient is expected.

use crate::{OrderError, OrderResult};
use orderchain_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! canonical_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(ShardableUuid);

        impl $name {
            pub fn new() -> Self {
                Self(ShardableUuid::new())
            }

            /// Parses a canonical identifier.
            ///
            /// # Errors
            ///
            /// Returns [`OrderError::InvalidInput`] if `input` is not canonical.
            pub fn parse(input: &str) -> OrderResult<Self> {
                ShardableUuid::parse(input.trim()).map(Self).map_err(|e| {
                    OrderError::InvalidInput(format!("invalid {} identifier: {}", $what, e))
                })
            }

            pub fn as_uuid(&self) -> &ShardableUuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<ShardableUuid> for $name {
            fn from(value: ShardableUuid) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = OrderError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

canonical_id!(
    /// Identifier of a persisted order; stable once assigned.
    OrderId,
    "order"
);
canonical_id!(PatientId, "patient");
canonical_id!(EncounterId, "encounter");
