//! Shared test types.

use std::sync::Arc;

use objbook_types::{Guid, Numeric, Timestamp, TypeTag};

use crate::class::ObjectClass;
use crate::instance::{Entity, Instance};
use crate::registry::Registry;

#[derive(Debug)]
pub(crate) struct Invoice {
    pub id: String,
    pub amount: Numeric,
    pub count: i32,
    pub total: i64,
    pub rate: f64,
    pub paid: bool,
    pub code: char,
    pub external: Guid,
    pub due: Timestamp,
    pub customer: Option<Guid>,
    pub owner: Option<Entity>,
    pub lines: Vec<Guid>,
}

impl Default for Invoice {
    fn default() -> Self {
        Self {
            id: String::new(),
            amount: Numeric::zero(),
            count: 0,
            total: 0,
            rate: 0.0,
            paid: false,
            code: 'x',
            external: Guid::null(),
            due: Timestamp::zero(),
            customer: None,
            owner: None,
            lines: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Customer {
    pub name: String,
}

pub(crate) fn invoice_class() -> ObjectClass {
    ObjectClass::builder::<Invoice>("invoice")
        .field("id", |i: &Invoice| i.id.clone(), |i: &mut Invoice, v| i.id = v)
        .field("amount", |i: &Invoice| i.amount, |i: &mut Invoice, v| i.amount = v)
        .field("count", |i: &Invoice| i.count, |i: &mut Invoice, v| i.count = v)
        .field("total", |i: &Invoice| i.total, |i: &mut Invoice, v| i.total = v)
        .field("rate", |i: &Invoice| i.rate, |i: &mut Invoice, v| i.rate = v)
        .field("paid", |i: &Invoice| i.paid, |i: &mut Invoice, v| i.paid = v)
        .field("code", |i: &Invoice| i.code, |i: &mut Invoice, v| i.code = v)
        .field("external", |i: &Invoice| i.external, |i: &mut Invoice, v| i.external = v)
        .field("due", |i: &Invoice| i.due, |i: &mut Invoice, v| i.due = v)
        .derived("line_count", |i: &Invoice| i.lines.len() as i64)
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

pub(crate) fn customer_class() -> ObjectClass {
    ObjectClass::builder::<Customer>("customer")
        .field("name", |c: &Customer| c.name.clone(), |c: &mut Customer, v| c.name = v)
        .build()
}

pub(crate) fn registry() -> Arc<Registry> {
    let registry = Registry::new();
    for class in [invoice_class(), customer_class()] {
        registry.register(class).unwrap();
    }
    Arc::new(registry)
}

pub(crate) fn invoice_instance() -> Instance {
    Instance::new(
        Entity::new(TypeTag::new("invoice"), Guid::new()),
        Guid::new(),
        Box::new(Invoice::default()),
    )
}
