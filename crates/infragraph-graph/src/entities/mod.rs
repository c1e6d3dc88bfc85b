//! Entity kinds of one discovery cycle.
//!
//! Descriptive fields come from loaders. `links` fields are filled only by
//! the linker and are never deserialized.

use std::cmp::Ordering;

use infragraph_core::{compare_names, ResourceKind, Tag};

/// Implements `Entity` for kinds named by tag, falling back to the key.
macro_rules! tagged_entity {
    ($ty:ty, $kind:expr, $key:ident) => {
        impl $crate::entities::Entity for $ty {
            const KIND: infragraph_core::ResourceKind = $kind;

            fn key(&self) -> &str {
                &self.$key
            }

            fn name(&self) -> &str {
                infragraph_core::name_tag(&self.tags).unwrap_or(&self.$key)
            }

            fn tags(&self) -> &[infragraph_core::Tag] {
                &self.tags
            }
        }
    };
}

mod compute;
mod network;
mod services;
pub mod stats;

pub use compute::*;
pub use network::*;
pub use services::*;
pub use stats::*;

pub trait Entity {
    const KIND: ResourceKind;

    /// Provider-assigned primary key; stable across cycles.
    fn key(&self) -> &str;

    /// Display name: the `Name` tag when present, else a kind-specific fallback.
    fn name(&self) -> &str;

    fn identity_key(&self) -> &str {
        self.key()
    }

    fn tags(&self) -> &[Tag] {
        &[]
    }

    fn identity(&self) -> String {
        Self::KIND.identity(self.identity_key())
    }

    /// Order of the kind's arena and of every list of this kind.
    fn canonical_cmp(&self, other: &Self) -> Ordering {
        compare_names(self.name(), other.name()).then_with(|| self.key().cmp(other.key()))
    }
}

