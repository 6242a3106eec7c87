//! Entity types shared by the replication tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use objbook_store::{Book, ChangeEvent, Entity, ObjectClass, Registry};
use objbook_types::{Guid, Numeric};

#[derive(Debug, Default)]
pub struct Invoice {
    pub id: String,
    pub amount: Numeric,
    pub customer: Option<Guid>,
    pub owner: Option<Entity>,
    pub lines: Vec<Guid>,
}

#[derive(Debug, Default)]
pub struct Customer {
    pub name: String,
}

#[derive(Debug, Default)]
pub struct Entry {
    pub memo: String,
}

#[derive(Debug, Default)]
pub struct Node {
    pub label: String,
    pub next: Option<Guid>,
}

#[derive(Debug, Default)]
pub struct Summary {
    pub total: i64,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn invoice_class() -> ObjectClass {
    ObjectClass::builder::<Invoice>("invoice")
        .field("id", |i: &Invoice| i.id.clone(), |i: &mut Invoice, v| i.id = v)
        .field("amount", |i: &Invoice| i.amount, |i: &mut Invoice, v| i.amount = v)
        .reference(
            "customer",
            "customer",
            |i: &Invoice| i.customer,
            |i: &mut Invoice, v| i.customer = v,
        )
        .choice("owner", |i: &Invoice| i.owner.clone(), |i: &mut Invoice, v| i.owner = v)
        .collection(
            "lines",
            "entry",
            |i: &Invoice| i.lines.clone(),
            |i: &mut Invoice, v| i.lines = v,
        )
        .kvp("slots")
        .book("book")
        .build()
}

pub fn customer_class() -> ObjectClass {
    ObjectClass::builder::<Customer>("customer")
        .field("name", |c: &Customer| c.name.clone(), |c: &mut Customer, v| c.name = v)
        .build()
}

pub fn entry_class() -> ObjectClass {
    ObjectClass::builder::<Entry>("entry")
        .field("memo", |e: &Entry| e.memo.clone(), |e: &mut Entry, v| e.memo = v)
        .build()
}

pub fn node_class() -> ObjectClass {
    ObjectClass::builder::<Node>("node")
        .field("label", |n: &Node| n.label.clone(), |n: &mut Node, v| n.label = v)
        .reference("next", "node", |n: &Node| n.next, |n: &mut Node, v| n.next = v)
        .build()
}

/// A type with nothing to copy.
pub fn summary_class() -> ObjectClass {
    ObjectClass::builder::<Summary>("summary")
        .derived("total", |s: &Summary| s.total)
        .build()
}

pub fn registry() -> Arc<Registry> {
    let registry = Registry::new();
    for class in [
        invoice_class(),
        customer_class(),
        entry_class(),
        node_class(),
        summary_class(),
    ] {
        registry.register(class).unwrap();
    }
    Arc::new(registry)
}

/// Source and destination books over one registry.
pub fn books() -> (Book, Book) {
    init_tracing();
    let registry = registry();
    (Book::new(Arc::clone(&registry)), Book::new(registry))
}

pub fn invoice(book: &mut Book, id: &str, amount: &str) -> Entity {
    let entity = book.create_entity("invoice").unwrap();
    book.set_param_from_string(&entity, "id", id).unwrap();
    book.set_param_from_string(&entity, "amount", amount).unwrap();
    entity
}

pub fn customer(book: &mut Book, name: &str) -> Entity {
    let entity = book.create_entity("customer").unwrap();
    book.set_param_from_string(&entity, "name", name).unwrap();
    entity
}

pub fn invoice_data<'a>(book: &'a Book, entity: &Entity) -> &'a Invoice {
    book.get(entity).unwrap().data::<Invoice>().unwrap()
}

/// Collect every event `book` delivers from now on.
pub fn record_events(book: &mut Book) -> Arc<Mutex<Vec<ChangeEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    book.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    seen
}
