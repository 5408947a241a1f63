//! Projection contract and registry (read model builders).
//!
//! A projection translates one aggregate type's events into read-model
//! mutations. Read models are **disposable**: events are the source of truth,
//! and any projection can be rebuilt by replaying its streams from scratch.
//!
//! Projections must be idempotent at the mutation level (upserts keyed by
//! entity id); the projector on top additionally skips already-projected
//! versions by checkpoint, so at-least-once redelivery is safe.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::envelope::EventEnvelope;

/// Outcome of handing one envelope to a projection.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProjectionStatus {
    /// The event was recognized and the read model was updated.
    Applied,
    /// The event was recognized as belonging to this entity type but the
    /// projection has no mapping for it. The projector treats this as a
    /// failure, never as success.
    Unhandled,
}

/// Failure while applying a single envelope inside a projection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// The payload could not be deserialized into the projection's event type
    /// (unknown type tag or schema skew).
    #[error("event payload deserialization failed: {0}")]
    Deserialize(String),
}

/// A read-model builder for exactly one entity type.
///
/// Implementations deserialize the envelope payload into their closed event
/// enum and switch over it exhaustively; serde's tagged representation makes
/// an unknown tag a [`ApplyError::Deserialize`] rather than a silent default.
pub trait Projection: Send + Sync {
    /// The entity-type tag this projection owns (e.g. `car`).
    fn entity_type(&self) -> &'static str;

    /// Apply a single envelope, updating the read model.
    fn project(&self, envelope: &EventEnvelope) -> Result<ProjectionStatus, ApplyError>;
}

/// Registry construction failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate projection registered for entity type '{0}'")]
    DuplicateEntityType(String),
}

/// Maps each entity-type tag to exactly one projection.
///
/// Validated eagerly at construction: a duplicate entity type is rejected
/// immediately instead of surfacing as a silently ambiguous lookup later.
pub struct ProjectionRegistry {
    handlers: HashMap<String, Arc<dyn Projection>>,
}

impl ProjectionRegistry {
    pub fn new(
        projections: impl IntoIterator<Item = Arc<dyn Projection>>,
    ) -> Result<Self, RegistryError> {
        let mut handlers: HashMap<String, Arc<dyn Projection>> = HashMap::new();
        for projection in projections {
            let entity_type = projection.entity_type().to_string();
            if handlers.contains_key(&entity_type) {
                return Err(RegistryError::DuplicateEntityType(entity_type));
            }
            handlers.insert(entity_type, projection);
        }
        Ok(Self { handlers })
    }

    pub fn get(&self, entity_type: &str) -> Option<&Arc<dyn Projection>> {
        self.handlers.get(entity_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl core::fmt::Debug for ProjectionRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProjectionRegistry")
            .field("entity_types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
