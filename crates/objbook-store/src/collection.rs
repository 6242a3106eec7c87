use std::collections::btree_map::{self, BTreeMap};

use objbook_types::{Guid, TypeTag};

use crate::instance::Instance;

/// All instances of one type within a book, keyed by identifier.
#[derive(Debug)]
pub struct Collection {
    type_tag: TypeTag,
    instances: BTreeMap<Guid, Instance>,
}

impl Collection {
    pub(crate) fn new(type_tag: TypeTag) -> Self {
        Self {
            type_tag,
            instances: BTreeMap::new(),
        }
    }

    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn contains(&self, guid: &Guid) -> bool {
        self.instances.contains_key(guid)
    }

    pub fn get(&self, guid: &Guid) -> Option<&Instance> {
        self.instances.get(guid)
    }

    /// Instances in identifier order.
    pub fn iter(&self) -> btree_map::Values<'_, Guid, Instance> {
        self.instances.values()
    }

    pub fn guids(&self) -> Vec<Guid> {
        self.instances.keys().copied().collect()
    }

    pub(crate) fn get_mut(&mut self, guid: &Guid) -> Option<&mut Instance> {
        self.instances.get_mut(guid)
    }

    /// Insert unless the identifier is taken; hands the instance back if so.
    pub(crate) fn insert(&mut self, inst: Instance) -> Result<(), Box<Instance>> {
        match self.instances.entry(inst.guid()) {
            btree_map::Entry::Occupied(_) => Err(Box::new(inst)),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(inst);
                Ok(())
            }
        }
    }

    pub(crate) fn remove(&mut self, guid: &Guid) -> Option<Instance> {
        self.instances.remove(guid)
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Instance;
    type IntoIter = btree_map::Values<'a, Guid, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{invoice_instance, Invoice};

    #[test]
    fn insert_rejects_duplicate_identifier() {
        let mut collection = Collection::new(TypeTag::new("invoice"));
        let inst = invoice_instance();
        let entity = inst.entity().clone();
        collection.insert(inst).unwrap();
        assert!(collection.contains(&entity.guid));

        let twin = Instance::new(entity, Guid::new(), Box::new(Invoice::default()));
        assert!(collection.insert(twin).is_err());
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn iteration_in_guid_order() {
        let mut collection = Collection::new(TypeTag::new("invoice"));
        for _ in 0..5 {
            collection.insert(invoice_instance()).unwrap();
        }
        let guids: Vec<Guid> = collection.iter().map(Instance::guid).collect();
        let mut sorted = guids.clone();
        sorted.sort();
        assert_eq!(guids, sorted);
        assert_eq!(collection.guids(), sorted);
    }

    #[test]
    fn remove() {
        let mut collection = Collection::new(TypeTag::new("invoice"));
        let inst = invoice_instance();
        let guid = inst.guid();
        collection.insert(inst).unwrap();
        assert!(collection.remove(&guid).is_some());
        assert!(collection.is_empty());
    }
}
