use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::tag::TypeTag;

/// The type-tag of a registered parameter.
///
/// This is a closed set: anything that does not parse into one of these
/// variants is an unsupported type and is rejected at the boundary.
/// [`ParamKind::Reference`] covers parameters whose type-tag names another
/// registered entity type; together with `Choice` and `Collection` these
/// form a type's reference list.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    String,
    Int32,
    Int64,
    Double,
    Boolean,
    Guid,
    Time,
    Numeric,
    Kvp,
    Char,
    Collection,
    Choice,
    Book,
    Reference(TypeTag),
}

impl ParamKind {
    /// Canonical kind name. For references this is the target type name.
    pub fn name(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Int32 => "gint32",
            Self::Int64 => "gint64",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Guid => "guid",
            Self::Time => "time",
            Self::Numeric => "numeric",
            Self::Kvp => "kvp",
            Self::Char => "character",
            Self::Collection => "collection",
            Self::Choice => "choice",
            Self::Book => "book",
            Self::Reference(target) => target.as_str(),
        }
    }

    /// Scalar kinds have a single value that copies across books as-is.
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            Self::Kvp | Self::Collection | Self::Choice | Self::Book | Self::Reference(_)
        )
    }

    /// Kinds that point at other entities and must be resolved, not copied.
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Collection | Self::Choice | Self::Reference(_))
    }

    /// Resolve a kind name. `Reference` kinds are never produced here: a
    /// type name is only a reference once the registry has confirmed it, so
    /// callers holding a registry try that first.
    pub fn from_name(name: &str) -> Result<Self, TypeError> {
        Ok(match name {
            "string" => Self::String,
            "gint32" => Self::Int32,
            "gint64" => Self::Int64,
            "double" => Self::Double,
            "boolean" => Self::Boolean,
            "guid" => Self::Guid,
            "time" => Self::Time,
            "numeric" => Self::Numeric,
            "kvp" => Self::Kvp,
            "character" => Self::Char,
            "collection" => Self::Collection,
            "choice" => Self::Choice,
            "book" => Self::Book,
            other => return Err(TypeError::UnsupportedKind(other.to_string())),
        })
    }
}

impl FromStr for ParamKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
