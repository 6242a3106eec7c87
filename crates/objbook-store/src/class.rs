use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use objbook_types::{Guid, ParamKind, TypeTag};

use crate::accessor::{Accessor, Field, ScalarType};
use crate::instance::{Entity, EntityData};

/// A named, typed field accessor on an entity type.
///
/// Parameters are immutable once registered and are shared as `Arc<Param>`,
/// so anything holding one (an undo snapshot, a pending reference) keeps
/// the accessor alive.
pub struct Param {
    name: String,
    accessor: Accessor,
}

impl Param {
    pub fn new(name: impl Into<String>, accessor: Accessor) -> Self {
        Self {
            name: name.into(),
            accessor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamKind {
        self.accessor.kind()
    }

    pub fn accessor(&self) -> &Accessor {
        &self.accessor
    }

    pub fn is_read_only(&self) -> bool {
        self.accessor.is_read_only()
    }

    /// Has both getter and setter, or is the key-value side-table.
    pub fn is_copyable(&self) -> bool {
        !self.is_read_only()
    }

    pub fn is_reference(&self) -> bool {
        self.kind().is_reference()
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

/// Builds a fresh, empty payload for an entity type.
pub type Constructor = Arc<dyn Fn() -> Box<dyn EntityData> + Send + Sync>;

/// Registered metadata for one entity type.
pub struct ObjectClass {
    type_tag: TypeTag,
    create: Option<Constructor>,
    params: Vec<Arc<Param>>,
    index: HashMap<String, usize>,
}

impl ObjectClass {
    /// Start declaring a type whose payload is `T`, constructed with
    /// `T::default()`.
    pub fn builder<T: EntityData + Default>(type_tag: &str) -> ClassBuilder<T> {
        let create: Constructor = Arc::new(|| Box::new(T::default()) as Box<dyn EntityData>);
        ClassBuilder {
            type_tag: TypeTag::new(type_tag),
            create: Some(create),
            params: Vec::new(),
            _payload: PhantomData,
        }
    }

    /// Declare a type that cannot be instantiated.
    pub fn builder_without_constructor<T: EntityData>(type_tag: &str) -> ClassBuilder<T> {
        ClassBuilder {
            type_tag: TypeTag::new(type_tag),
            create: None,
            params: Vec::new(),
            _payload: PhantomData,
        }
    }

    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    /// All parameters in declaration order.
    pub fn params(&self) -> &[Arc<Param>] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&Arc<Param>> {
        self.index.get(name).map(|&i| &self.params[i])
    }

    pub fn copyable_params(&self) -> impl Iterator<Item = &Arc<Param>> {
        self.params.iter().filter(|p| p.is_copyable())
    }

    /// The type's reference list.
    pub fn references(&self) -> impl Iterator<Item = &Arc<Param>> {
        self.params.iter().filter(|p| p.is_reference())
    }

    pub fn has_constructor(&self) -> bool {
        self.create.is_some()
    }

    /// Constructible and with at least one copyable parameter.
    pub fn is_compliant(&self) -> bool {
        self.has_constructor() && self.copyable_params().next().is_some()
    }

    pub(crate) fn construct(&self) -> Option<Box<dyn EntityData>> {
        self.create.as_ref().map(|create| create())
    }
}

impl fmt::Debug for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectClass")
            .field("type_tag", &self.type_tag)
            .field("constructible", &self.has_constructor())
            .field("params", &self.params)
            .finish()
    }
}

/// Declarative parameter table for payload type `T`.
///
/// Re-declaring a parameter name replaces the earlier accessor in place.
pub struct ClassBuilder<T> {
    type_tag: TypeTag,
    create: Option<Constructor>,
    params: Vec<Param>,
    _payload: PhantomData<fn() -> T>,
}

impl<T: EntityData> ClassBuilder<T> {
    /// A scalar field with getter and setter.
    pub fn field<V, G, S>(self, name: &str, get: G, set: S) -> Self
    where
        V: ScalarType,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.push(name, V::into_accessor(Field::read_write::<T, _, _>(get, set)))
    }

    /// A scalar computed from the payload; read-only.
    pub fn derived<V, G>(self, name: &str, get: G) -> Self
    where
        V: ScalarType,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.push(name, V::into_accessor(Field::read_only::<T, _>(get)))
    }

    /// A single reference to an entity of type `target`.
    pub fn reference<G, S>(self, name: &str, target: &str, get: G, set: S) -> Self
    where
        G: Fn(&T) -> Option<Guid> + Send + Sync + 'static,
        S: Fn(&mut T, Option<Guid>) + Send + Sync + 'static,
    {
        let accessor = Accessor::Reference {
            target: TypeTag::new(target),
            field: Field::read_write::<T, _, _>(get, set),
        };
        self.push(name, accessor)
    }

    /// A single reference to an entity of any type.
    pub fn choice<G, S>(self, name: &str, get: G, set: S) -> Self
    where
        G: Fn(&T) -> Option<Entity> + Send + Sync + 'static,
        S: Fn(&mut T, Option<Entity>) + Send + Sync + 'static,
    {
        self.push(name, Accessor::Choice(Field::read_write::<T, _, _>(get, set)))
    }

    /// A list of references to entities of type `element`.
    pub fn collection<G, S>(self, name: &str, element: &str, get: G, set: S) -> Self
    where
        G: Fn(&T) -> Vec<Guid> + Send + Sync + 'static,
        S: Fn(&mut T, Vec<Guid>) + Send + Sync + 'static,
    {
        let accessor = Accessor::Collection {
            element: TypeTag::new(element),
            field: Field::read_write::<T, _, _>(get, set),
        };
        self.push(name, accessor)
    }

    /// Expose the instance's key-value side-table.
    pub fn kvp(self, name: &str) -> Self {
        self.push(name, Accessor::Kvp)
    }

    /// Expose the owning book.
    pub fn book(self, name: &str) -> Self {
        self.push(name, Accessor::Book)
    }

    pub fn build(self) -> ObjectClass {
        let mut params: Vec<Arc<Param>> = Vec::with_capacity(self.params.len());
        let mut index: HashMap<String, usize> = HashMap::new();
        for param in self.params {
            match index.get(param.name()) {
                Some(&i) => params[i] = Arc::new(param),
                None => {
                    index.insert(param.name().to_string(), params.len());
                    params.push(Arc::new(param));
                }
            }
        }
        ObjectClass {
            type_tag: self.type_tag,
            create: self.create,
            params,
            index,
        }
    }

    fn push(mut self, name: &str, accessor: Accessor) -> Self {
        self.params.push(Param::new(name, accessor));
        self
    }
}
