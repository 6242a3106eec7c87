//! Strongly-typed parameter accessors.
//!
//! An [`Accessor`] is the closed sum type behind every registered parameter:
//! one variant per [`ParamKind`], each carrying closures typed for that kind.
//! The closures reach the instance payload by downcasting, so handing an
//! accessor the wrong payload type yields `None` rather than reinterpreting
//! memory.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use objbook_types::{Guid, Numeric, ParamKind, Timestamp, TypeTag};

use crate::instance::{Entity, Instance};

/// Erased getter: `None` when the instance payload is not the declared type.
pub type Getter<V> = Arc<dyn Fn(&Instance) -> Option<V> + Send + Sync>;

/// Erased setter: `false` when the instance payload is not the declared type.
pub type Setter<V> = Arc<dyn Fn(&mut Instance, V) -> bool + Send + Sync>;

/// A getter with an optional setter. No setter means read-only.
pub struct Field<V> {
    get: Getter<V>,
    set: Option<Setter<V>>,
}

impl<V: 'static> Field<V> {
    /// Accessor pair over payload type `T`.
    pub fn read_write<T, G, S>(get: G, set: S) -> Self
    where
        T: Any,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let mut field = Self::read_only::<T, G>(get);
        field.set = Some(Arc::new(move |inst: &mut Instance, value: V| {
            match inst.data_mut::<T>() {
                Some(data) => {
                    set(data, value);
                    true
                }
                None => false,
            }
        }));
        field
    }

    /// Getter only; the parameter is derived or read-only.
    pub fn read_only<T, G>(get: G) -> Self
    where
        T: Any,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        Self {
            get: Arc::new(move |inst: &Instance| inst.data::<T>().map(&get)),
            set: None,
        }
    }
}

impl<V> Field<V> {
    /// Read the value, or `None` if the payload is the wrong type.
    pub fn get(&self, inst: &Instance) -> Option<V> {
        (self.get)(inst)
    }

    /// `None` if read-only, otherwise whether the payload accepted the value.
    pub fn set(&self, inst: &mut Instance, value: V) -> Option<bool> {
        self.set.as_ref().map(|set| set(inst, value))
    }

    /// Returns `true` if there is no setter.
    pub fn is_read_only(&self) -> bool {
        self.set.is_none()
    }
}

impl<V> Clone for Field<V> {
    fn clone(&self) -> Self {
        Self {
            get: Arc::clone(&self.get),
            set: self.set.clone(),
        }
    }
}

/// One variant per parameter kind.
#[derive(Clone)]
pub enum Accessor {
    String(Field<String>),
    Int32(Field<i32>),
    Int64(Field<i64>),
    Double(Field<f64>),
    Boolean(Field<bool>),
    Char(Field<char>),
    Guid(Field<Guid>),
    Time(Field<Timestamp>),
    Numeric(Field<Numeric>),
    /// The instance's own side-table.
    Kvp,
    /// A single entity of a registered type.
    Reference {
        target: TypeTag,
        field: Field<Option<Guid>>,
    },
    /// A single entity of any type.
    Choice(Field<Option<Entity>>),
    /// A list of entities of one type.
    Collection {
        element: TypeTag,
        field: Field<Vec<Guid>>,
    },
    /// The owning book. Always read-only.
    Book,
}

impl Accessor {
    /// The parameter kind this accessor serves.
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::String(_) => ParamKind::String,
            Self::Int32(_) => ParamKind::Int32,
            Self::Int64(_) => ParamKind::Int64,
            Self::Double(_) => ParamKind::Double,
            Self::Boolean(_) => ParamKind::Boolean,
            Self::Char(_) => ParamKind::Char,
            Self::Guid(_) => ParamKind::Guid,
            Self::Time(_) => ParamKind::Time,
            Self::Numeric(_) => ParamKind::Numeric,
            Self::Kvp => ParamKind::Kvp,
            Self::Reference { target, .. } => ParamKind::Reference(target.clone()),
            Self::Choice(_) => ParamKind::Choice,
            Self::Collection { .. } => ParamKind::Collection,
            Self::Book => ParamKind::Book,
        }
    }

    /// Returns `true` if values cannot be written through this accessor.
    pub fn is_read_only(&self) -> bool {
        match self {
            Self::String(f) => f.is_read_only(),
            Self::Int32(f) => f.is_read_only(),
            Self::Int64(f) => f.is_read_only(),
            Self::Double(f) => f.is_read_only(),
            Self::Boolean(f) => f.is_read_only(),
            Self::Char(f) => f.is_read_only(),
            Self::Guid(f) => f.is_read_only(),
            Self::Time(f) => f.is_read_only(),
            Self::Numeric(f) => f.is_read_only(),
            Self::Kvp => false,
            Self::Reference { field, .. } => field.is_read_only(),
            Self::Choice(f) => f.is_read_only(),
            Self::Collection { field, .. } => field.is_read_only(),
            Self::Book => true,
        }
    }

    /// Entity type a `Reference` or `Collection` points at.
    pub fn target_type(&self) -> Option<&TypeTag> {
        match self {
            Self::Reference { target, .. } => Some(target),
            Self::Collection { element, .. } => Some(element),
            _ => None,
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("kind", &self.kind())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

/// Scalar Rust types that map onto a [`ParamKind`].
pub trait ScalarType: Sized + Send + Sync + 'static {
    const KIND: ParamKind;

    fn into_accessor(field: Field<Self>) -> Accessor;
}

macro_rules! scalar_type {
    ($ty:ty, $variant:ident) => {
        impl ScalarType for $ty {
            const KIND: ParamKind = ParamKind::$variant;

            fn into_accessor(field: Field<Self>) -> Accessor {
                Accessor::$variant(field)
            }
        }
    };
}

scalar_type!(String, String);
scalar_type!(i32, Int32);
scalar_type!(i64, Int64);
scalar_type!(f64, Double);
scalar_type!(bool, Boolean);
scalar_type!(char, Char);
scalar_type!(Guid, Guid);
scalar_type!(Timestamp, Time);
scalar_type!(Numeric, Numeric);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Counter {
        value: i64,
    }

    fn counter_instance() -> Instance {
        Instance::new(
            Entity::new(TypeTag::new("counter"), Guid::new()),
            Guid::new(),
            Box::new(Counter::default()),
        )
    }

    #[test]
    fn read_write_field() {
        let field: Field<i64> =
            Field::read_write(|c: &Counter| c.value, |c: &mut Counter, v| c.value = v);
        let mut inst = counter_instance();
        assert_eq!(field.set(&mut inst, 7), Some(true));
        assert_eq!(field.get(&inst), Some(7));
        assert!(!field.is_read_only());
    }

    #[test]
    fn read_only_field_refuses_set() {
        let field: Field<i64> = Field::read_only(|c: &Counter| c.value * 2);
        let mut inst = counter_instance();
        assert_eq!(field.set(&mut inst, 3), None);
        assert_eq!(field.get(&inst), Some(0));
    }

    #[test]
    fn wrong_payload_is_reported_not_reinterpreted() {
        let field: Field<String> =
            Field::read_write(|s: &String| s.clone(), |s: &mut String, v| *s = v);
        let mut inst = counter_instance();
        assert_eq!(field.get(&inst), None);
        assert_eq!(field.set(&mut inst, "x".into()), Some(false));
    }

    #[test]
    fn accessor_kind_and_read_only() {
        let acc = i64::into_accessor(Field::read_only(|c: &Counter| c.value));
        assert_eq!(acc.kind(), ParamKind::Int64);
        assert!(acc.is_read_only());
        assert!(Accessor::Book.is_read_only());
        assert!(!Accessor::Kvp.is_read_only());
    }

    #[test]
    fn scalar_kinds() {
        assert_eq!(<String as ScalarType>::KIND, ParamKind::String);
        assert_eq!(<Numeric as ScalarType>::KIND, ParamKind::Numeric);
        assert_eq!(<char as ScalarType>::KIND, ParamKind::Char);
    }
}
