use objbook_store::{Entity, StoreError};

/// Per-entity replication failures.
///
/// None of these abort a batch; they are collected in a
/// [`BatchReport`](crate::BatchReport).
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    /// The destination already holds an entity with this type and identifier.
    #[error("entity already present in destination: {0}")]
    AlreadyPresent(Entity),

    /// The type cannot be replicated.
    #[error("entity type {type_tag} is not copyable: {reason}")]
    NotCompliant { type_tag: String, reason: &'static str },

    /// The destination instance could not be created.
    #[error("could not construct {entity} in destination: {source}")]
    Construct {
        entity: Entity,
        #[source]
        source: StoreError,
    },

    /// The destination backend refused a commit. The entity exists in the
    /// destination and its pending references are queued, but the backend
    /// has not accepted every value.
    #[error("destination rejected {entity}: {source}")]
    Rejected {
        entity: Entity,
        #[source]
        source: StoreError,
    },

    /// The entity is not in the source book.
    #[error("entity not found in source: {0}")]
    Missing(Entity),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for replication operations.
pub type CopyResult<T> = Result<T, CopyError>;
