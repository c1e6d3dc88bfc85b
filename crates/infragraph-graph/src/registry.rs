use std::collections::HashMap;

use infragraph_core::{InfraGraphError, ResourceKind, Result};

use crate::generation::EntityRef;

/// Flat index from identity string to entity, rebuilt with every generation.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    by_identity: HashMap<String, EntityRef>,
}

impl Registry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            by_identity: HashMap::with_capacity(capacity),
        }
    }

    /// Identities must be unique across every kind of one generation.
    pub fn insert(&mut self, identity: String, entity: EntityRef) -> Result<()> {
        if self.by_identity.contains_key(&identity) {
            return Err(InfraGraphError::DuplicateIdentity(identity));
        }
        self.by_identity.insert(identity, entity);
        Ok(())
    }

    pub fn get(&self, identity: &str) -> Option<EntityRef> {
        self.by_identity.get(identity).copied()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.by_identity.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, EntityRef)> {
        self.by_identity.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Identities of one kind, unordered.
    pub fn identities_of(&self, kind: ResourceKind) -> impl Iterator<Item = &str> {
        self.by_identity
            .iter()
            .filter(move |(_, v)| v.kind() == kind)
            .map(|(k, _)| k.as_str())
    }
}
