//! Parameter dispatch.
//!
//! [`read`] and [`write`] are the only places that branch on the accessor
//! variant, and [`ParamValue::to_text`] / [`ParamValue::parse`] the only
//! places that fix a textual encoding per kind. Stringification, parsing,
//! cross-book copies and undo snapshots are all expressed through these four.

use std::fmt;

use objbook_types::{Guid, KvpFrame, Numeric, ParamKind, Timestamp, TypeError};

use crate::accessor::{Accessor, Field};
use crate::class::Param;
use crate::error::{StoreError, StoreResult};
use crate::instance::{Entity, Instance};

/// Separator between guids in a collection's text form.
const LIST_SEPARATOR: &str = ",";

/// A parameter value read through its accessor.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Boolean(bool),
    Char(char),
    Guid(Guid),
    Time(Timestamp),
    Numeric(Numeric),
    Kvp(KvpFrame),
    Reference(Option<Guid>),
    Choice(Option<Entity>),
    Collection(Vec<Guid>),
    Book(Guid),
}

impl ParamValue {
    /// Canonical text form.
    ///
    /// Loss-free for every kind except `Kvp`, which renders as a summary.
    pub fn to_text(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Int32(v) => v.to_string(),
            Self::Int64(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::Boolean(v) => v.to_string(),
            Self::Char(c) => c.to_string(),
            Self::Guid(g) | Self::Book(g) => g.to_hex(),
            Self::Time(t) => t.to_text(),
            Self::Numeric(n) => n.to_string(),
            Self::Kvp(frame) => frame.summary(),
            Self::Reference(guid) => guid.map(|g| g.to_hex()).unwrap_or_default(),
            Self::Choice(entity) => entity.as_ref().map(Entity::to_string).unwrap_or_default(),
            Self::Collection(guids) => guids
                .iter()
                .map(Guid::to_hex)
                .collect::<Vec<_>>()
                .join(LIST_SEPARATOR),
        }
    }

    /// Parse the text form of `kind`.
    pub fn parse(kind: &ParamKind, text: &str) -> Result<Self, TypeError> {
        Ok(match kind {
            ParamKind::String => Self::String(text.to_string()),
            ParamKind::Int32 => Self::Int32(
                text.trim()
                    .parse()
                    .map_err(|_| TypeError::text("gint32", text))?,
            ),
            ParamKind::Int64 => Self::Int64(
                text.trim()
                    .parse()
                    .map_err(|_| TypeError::text("gint64", text))?,
            ),
            ParamKind::Double => Self::Double(
                text.trim()
                    .parse()
                    .map_err(|_| TypeError::text("double", text))?,
            ),
            ParamKind::Boolean => Self::Boolean(parse_bool(text)?),
            ParamKind::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Self::Char(c),
                    _ => return Err(TypeError::text("character", text)),
                }
            }
            ParamKind::Guid => Self::Guid(Guid::from_hex(text)?),
            ParamKind::Book => Self::Book(Guid::from_hex(text)?),
            ParamKind::Time => Self::Time(Timestamp::parse(text)?),
            ParamKind::Numeric => Self::Numeric(Numeric::parse(text)?),
            // The summary does not carry the frame's content.
            ParamKind::Kvp => return Err(TypeError::text("kvp", text)),
            ParamKind::Reference(_) => Self::Reference(parse_optional(text, Guid::from_hex)?),
            ParamKind::Choice => Self::Choice(parse_optional(text, Entity::parse)?),
            ParamKind::Collection => {
                let text = text.trim();
                if text.is_empty() {
                    Self::Collection(Vec::new())
                } else {
                    Self::Collection(
                        text.split(LIST_SEPARATOR)
                            .map(Guid::from_hex)
                            .collect::<Result<_, _>>()?,
                    )
                }
            }
        })
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

fn parse_bool(text: &str) -> Result<bool, TypeError> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if text.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(TypeError::text("boolean", text))
    }
}

fn parse_optional<T>(
    text: &str,
    parse: impl Fn(&str) -> Result<T, TypeError>,
) -> Result<Option<T>, TypeError> {
    let text = text.trim();
    if text.is_empty() {
        Ok(None)
    } else {
        parse(text).map(Some)
    }
}

/// Outcome of [`copy_value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    /// The value now lives on the destination.
    Copied,
    /// The parameter points at these entities; link them once they exist in
    /// the destination book.
    Deferred(Vec<Entity>),
    /// Nothing to copy: read-only, or bound to the owning book.
    Skipped,
}

/// Read a parameter's current value.
pub fn read(inst: &Instance, param: &Param) -> StoreResult<ParamValue> {
    let value = match param.accessor() {
        Accessor::String(f) => f.get(inst).map(ParamValue::String),
        Accessor::Int32(f) => f.get(inst).map(ParamValue::Int32),
        Accessor::Int64(f) => f.get(inst).map(ParamValue::Int64),
        Accessor::Double(f) => f.get(inst).map(ParamValue::Double),
        Accessor::Boolean(f) => f.get(inst).map(ParamValue::Boolean),
        Accessor::Char(f) => f.get(inst).map(ParamValue::Char),
        Accessor::Guid(f) => f.get(inst).map(ParamValue::Guid),
        Accessor::Time(f) => f.get(inst).map(ParamValue::Time),
        Accessor::Numeric(f) => f.get(inst).map(ParamValue::Numeric),
        Accessor::Kvp => Some(ParamValue::Kvp(inst.kvp().clone())),
        Accessor::Reference { field, .. } => field.get(inst).map(ParamValue::Reference),
        Accessor::Choice(f) => f.get(inst).map(ParamValue::Choice),
        Accessor::Collection { field, .. } => field.get(inst).map(ParamValue::Collection),
        Accessor::Book => Some(ParamValue::Book(inst.book_id())),
    };
    value.ok_or_else(|| mismatch(inst, param))
}

/// Write a value through the parameter's setter.
///
/// The value's variant must match the parameter's kind.
pub fn write(inst: &mut Instance, param: &Param, value: ParamValue) -> StoreResult<()> {
    match (param.accessor(), value) {
        (Accessor::String(f), ParamValue::String(v)) => apply(f, inst, param, v),
        (Accessor::Int32(f), ParamValue::Int32(v)) => apply(f, inst, param, v),
        (Accessor::Int64(f), ParamValue::Int64(v)) => apply(f, inst, param, v),
        (Accessor::Double(f), ParamValue::Double(v)) => apply(f, inst, param, v),
        (Accessor::Boolean(f), ParamValue::Boolean(v)) => apply(f, inst, param, v),
        (Accessor::Char(f), ParamValue::Char(v)) => apply(f, inst, param, v),
        (Accessor::Guid(f), ParamValue::Guid(v)) => apply(f, inst, param, v),
        (Accessor::Time(f), ParamValue::Time(v)) => apply(f, inst, param, v),
        (Accessor::Numeric(f), ParamValue::Numeric(v)) => apply(f, inst, param, v),
        (Accessor::Kvp, ParamValue::Kvp(frame)) => {
            *inst.kvp_mut() = frame;
            Ok(())
        }
        (Accessor::Reference { field, .. }, ParamValue::Reference(v)) => {
            apply(field, inst, param, v)
        }
        (Accessor::Choice(f), ParamValue::Choice(v)) => apply(f, inst, param, v),
        (Accessor::Collection { field, .. }, ParamValue::Collection(v)) => {
            apply(field, inst, param, v)
        }
        (Accessor::Book, _) => Err(StoreError::ReadOnly(param.name().to_string())),
        (_, _) => Err(unsupported(param)),
    }
}

fn apply<V>(field: &Field<V>, inst: &mut Instance, param: &Param, value: V) -> StoreResult<()> {
    match field.set(inst, value) {
        Some(true) => Ok(()),
        Some(false) => Err(mismatch(inst, param)),
        None => Err(StoreError::ReadOnly(param.name().to_string())),
    }
}

fn mismatch(inst: &Instance, param: &Param) -> StoreError {
    StoreError::PayloadMismatch {
        entity: inst.entity().clone(),
        param: param.name().to_string(),
    }
}

fn unsupported(param: &Param) -> StoreError {
    StoreError::Unsupported {
        param: param.name().to_string(),
        kind: param.kind().to_string(),
    }
}

/// Text form of a parameter's current value.
pub fn get_as_string(inst: &Instance, param: &Param) -> StoreResult<String> {
    read(inst, param).map(|value| value.to_text())
}

/// Parse `text` as the parameter's kind and write it.
pub fn set_from_string(inst: &mut Instance, param: &Param, text: &str) -> StoreResult<()> {
    if param.is_read_only() {
        return Err(StoreError::ReadOnly(param.name().to_string()));
    }
    let value = ParamValue::parse(&param.kind(), text).map_err(|source| {
        StoreError::InvalidValue {
            param: param.name().to_string(),
            source,
        }
    })?;
    write(inst, param, value)
}

/// Copy one parameter from `source` to `dest`.
///
/// Reference kinds are never written here; their targets come back as
/// [`Transfer::Deferred`] for the caller to link once they exist at the
/// destination. The key-value side-table is deep cloned.
pub fn copy_value(source: &Instance, dest: &mut Instance, param: &Param) -> StoreResult<Transfer> {
    match param.accessor() {
        Accessor::Book => Ok(Transfer::Skipped),
        Accessor::Kvp => {
            *dest.kvp_mut() = source.kvp().clone();
            Ok(Transfer::Copied)
        }
        Accessor::Reference { .. } | Accessor::Choice(_) | Accessor::Collection { .. } => {
            references_of(source, param).map(Transfer::Deferred)
        }
        _ if param.is_read_only() => Ok(Transfer::Skipped),
        _ => {
            let value = read(source, param)?;
            write(dest, param, value)?;
            Ok(Transfer::Copied)
        }
    }
}

/// Entities a reference-kind parameter currently points at. Empty for every
/// other kind, and for null or unset references.
pub fn references_of(inst: &Instance, param: &Param) -> StoreResult<Vec<Entity>> {
    let targets: Vec<Entity> = match param.accessor() {
        Accessor::Reference { target, field } => field
            .get(inst)
            .ok_or_else(|| mismatch(inst, param))?
            .into_iter()
            .map(|guid| Entity::new(target.clone(), guid))
            .collect(),
        Accessor::Choice(field) => field
            .get(inst)
            .ok_or_else(|| mismatch(inst, param))?
            .into_iter()
            .collect(),
        Accessor::Collection { element, field } => field
            .get(inst)
            .ok_or_else(|| mismatch(inst, param))?
            .into_iter()
            .map(|guid| Entity::new(element.clone(), guid))
            .collect(),
        _ => Vec::new(),
    };
    Ok(targets
        .into_iter()
        .filter(|entity| !entity.guid.is_null())
        .collect())
}

/// Point a reference-kind parameter at `target`.
///
/// Single references are overwritten; collections gain `target` unless it
/// is already a member.
pub fn link_reference(inst: &mut Instance, param: &Param, target: &Entity) -> StoreResult<()> {
    let value = match param.accessor() {
        Accessor::Reference { .. } => ParamValue::Reference(Some(target.guid)),
        Accessor::Choice(_) => ParamValue::Choice(Some(target.clone())),
        Accessor::Collection { field, .. } => {
            let mut members = field.get(inst).ok_or_else(|| mismatch(inst, param))?;
            if members.contains(&target.guid) {
                return Ok(());
            }
            members.push(target.guid);
            ParamValue::Collection(members)
        }
        _ => return Err(unsupported(param)),
    };
    write(inst, param, value)
}
