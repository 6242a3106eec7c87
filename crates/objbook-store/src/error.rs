use objbook_types::TypeError;

use crate::instance::Entity;

/// Errors from book, registry and dispatch operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No class is registered under this type name.
    #[error("unknown entity type: {0}")]
    UnknownType(String),

    /// A class is already registered under this type name.
    #[error("entity type already registered: {0}")]
    DuplicateType(String),

    /// The type has no parameter with this name.
    #[error("unknown parameter {type_tag}.{param}")]
    UnknownParam { type_tag: String, param: String },

    /// The entity does not exist in this book.
    #[error("entity not found: {0}")]
    EntityNotFound(Entity),

    /// An entity with the same type and identifier is already in the book.
    #[error("entity already present: {0}")]
    AlreadyPresent(Entity),

    /// The type cannot be instantiated.
    #[error("entity type has no constructor: {0}")]
    NoConstructor(String),

    /// The null identifier cannot name a live entity.
    #[error("cannot create an entity with the null identifier")]
    NullGuid,

    /// The parameter has no setter.
    #[error("parameter is read-only: {0}")]
    ReadOnly(String),

    /// The value does not match the parameter's kind, or the kind has no
    /// scalar form for this operation.
    #[error("unsupported value for parameter {param} of kind {kind}")]
    Unsupported { param: String, kind: String },

    /// The accessor could not reach a payload of its declared type.
    #[error("payload of {entity} does not match parameter {param}")]
    PayloadMismatch { entity: Entity, param: String },

    /// Text could not be parsed into the parameter's kind.
    #[error("invalid value for parameter {param}: {source}")]
    InvalidValue {
        param: String,
        #[source]
        source: TypeError,
    },

    /// `commit_edit` was called without a matching `begin_edit`.
    #[error("entity is not being edited: {0}")]
    NotEditing(Entity),

    /// The backend rejected a commit.
    #[error("backend error: {0}")]
    Backend(String),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
