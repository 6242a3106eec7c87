//! Entity copies between books.
//!
//! Every public entry point suspends the destination's change events for
//! the whole call and resolves pending references once at the end, so
//! subscribers see one batch and never a half-copied entity.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use objbook_store::dispatch::{self, Transfer};
use objbook_store::{Book, Collection, Entity, Instance, ReferenceRecord};

use crate::error::{CopyError, CopyResult};
use crate::report::BatchReport;
use crate::resolve::{resolve_pending, Resolution};

/// Copy one entity into `dest`, keeping its identifier.
///
/// Fails with [`CopyError::AlreadyPresent`] if `dest` already holds it.
pub fn copy_entity(dest: &mut Book, source: &Instance) -> CopyResult<Entity> {
    dest.suspend_events();
    let copied = copy_one(dest, source);
    resolve_pending(dest);
    dest.resume_events();
    copied
}

/// Copy each entity independently. Entities already in `dest` are skipped.
pub fn copy_list<'a, I>(dest: &mut Book, sources: I) -> BatchReport
where
    I: IntoIterator<Item = &'a Instance>,
{
    let mut report = BatchReport::default();
    dest.suspend_events();
    for source in sources {
        report.record(source.entity().clone(), copy_one(dest, source).map(drop));
    }
    finish(dest, &mut report, "list");
    report
}

/// Copy a whole collection, first flagging members already in `dest`.
pub fn copy_collection(dest: &mut Book, collection: &Collection) -> BatchReport {
    let mut report = BatchReport {
        duplicates_detected: count_duplicates(dest, collection),
        ..Default::default()
    };
    dest.suspend_events();
    for source in collection {
        report.record(source.entity().clone(), copy_one(dest, source).map(drop));
    }
    finish(dest, &mut report, "collection");
    report
}

/// Copy `entity` from `source`, then whatever it references and whatever
/// those reference. The walk stops after two hops.
pub fn copy_one_recursive(dest: &mut Book, source: &Book, entity: &Entity) -> BatchReport {
    let mut report = BatchReport::default();
    dest.suspend_events();
    match source.get(entity) {
        Some(inst) => report.record(entity.clone(), copy_one(dest, inst).map(drop)),
        None => report.record(entity.clone(), Err(CopyError::Missing(entity.clone()))),
    }
    copy_closure(dest, source, std::slice::from_ref(entity), &mut report);
    finish(dest, &mut report, "recursive");
    report
}

/// [`copy_collection`] for the source book's `type_tag` collection,
/// followed by the same two-hop walk from every member.
pub fn copy_collection_recursive(dest: &mut Book, source: &Book, type_tag: &str) -> BatchReport {
    let Some(collection) = source.collection(type_tag) else {
        debug!(type_tag, "no source collection to copy");
        return BatchReport::default();
    };
    let mut report = BatchReport {
        duplicates_detected: count_duplicates(dest, collection),
        ..Default::default()
    };
    dest.suspend_events();
    let roots: Vec<Entity> = collection.iter().map(|inst| inst.entity().clone()).collect();
    for inst in collection {
        report.record(inst.entity().clone(), copy_one(dest, inst).map(drop));
    }
    copy_closure(dest, source, &roots, &mut report);
    finish(dest, &mut report, "recursive collection");
    report
}

fn copy_one(dest: &mut Book, source: &Instance) -> CopyResult<Entity> {
    let entity = source.entity().clone();
    if dest.contains(&entity) {
        return Err(CopyError::AlreadyPresent(entity));
    }
    let type_tag = entity.type_tag.as_str();
    let class = dest
        .registry()
        .find(type_tag)
        .ok_or_else(|| not_compliant(type_tag, "type not registered"))?;
    if !class.has_constructor() {
        return Err(not_compliant(type_tag, "no constructor"));
    }
    if class.copyable_params().next().is_none() {
        return Err(not_compliant(type_tag, "no copyable parameters"));
    }

    dest.create_entity_with_guid(type_tag, entity.guid)
        .map_err(|source| CopyError::Construct {
            entity: entity.clone(),
            source,
        })?;

    let mut deferred = Vec::new();
    let mut rejected = None;
    for param in class.copyable_params() {
        let mut transfer = None;
        let committed = dest.edit(&entity, |inst| {
            transfer = Some(dispatch::copy_value(source, inst, param));
        });
        // A rejected commit leaves the value written; its references still
        // need linking.
        match transfer {
            Some(Ok(Transfer::Deferred(targets))) => deferred.extend(
                targets
                    .into_iter()
                    .map(|target| ReferenceRecord::new(entity.clone(), param.clone(), target)),
            ),
            Some(Ok(Transfer::Copied | Transfer::Skipped)) | None => {}
            Some(Err(err)) => warn!(
                entity = %entity,
                param = %param.name(),
                error = %err,
                "could not copy parameter"
            ),
        }
        if let Err(err) = committed {
            warn!(entity = %entity, param = %param.name(), error = %err, "commit rejected");
            if rejected.is_none() {
                rejected = Some(err);
            }
        }
    }
    dest.push_pending_references(deferred);

    if let Some(source) = rejected {
        return Err(CopyError::Rejected { entity, source });
    }
    debug!(entity = %entity, "copied entity");
    Ok(entity)
}

fn not_compliant(type_tag: &str, reason: &'static str) -> CopyError {
    warn!(type_tag, reason, "entity type is not copyable");
    CopyError::NotCompliant {
        type_tag: type_tag.to_string(),
        reason,
    }
}

fn count_duplicates(dest: &Book, collection: &Collection) -> usize {
    let duplicates = collection
        .iter()
        .filter(|inst| dest.contains(inst.entity()))
        .count();
    if duplicates > 0 {
        warn!(
            type_tag = %collection.type_tag(),
            duplicates,
            "destination already holds members of the collection"
        );
    }
    duplicates
}

/// Entities referenced by `entities` in `source`, in reference order.
fn referenced(source: &Book, entities: &[Entity]) -> Vec<Entity> {
    let mut out = Vec::new();
    for entity in entities {
        let Some(inst) = source.get(entity) else {
            continue;
        };
        let Some(class) = source.registry().find(entity.type_tag.as_str()) else {
            continue;
        };
        for param in class.references() {
            match dispatch::references_of(inst, param) {
                Ok(targets) => out.extend(targets),
                Err(err) => warn!(
                    entity = %entity,
                    param = %param.name(),
                    error = %err,
                    "could not read references"
                ),
            }
        }
    }
    out
}

/// Copy the two-hop reference closure of `roots`.
fn copy_closure(dest: &mut Book, source: &Book, roots: &[Entity], report: &mut BatchReport) {
    let mut seen: BTreeSet<Entity> = roots.iter().cloned().collect();
    let mut frontier = roots.to_vec();

    for hop in 1..=2 {
        let next: Vec<Entity> = referenced(source, &frontier)
            .into_iter()
            .filter(|entity| seen.insert(entity.clone()))
            .collect();
        debug!(hop, entities = next.len(), "walking references");
        for entity in &next {
            if dest.contains(entity) {
                report.skipped.push(entity.clone());
                continue;
            }
            match source.get(entity) {
                Some(inst) => report.record(entity.clone(), copy_one(dest, inst).map(drop)),
                None => warn!(entity = %entity, "referenced entity not in source book"),
            }
        }
        frontier = next;
    }
}

fn finish(dest: &mut Book, report: &mut BatchReport, kind: &str) {
    let Resolution {
        linked, remaining, ..
    } = resolve_pending(dest);
    report.references_linked = linked;
    report.unresolved_references = remaining;
    dest.resume_events();
    info!(
        kind,
        copied = report.copied.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        duplicates = report.duplicates_detected,
        unresolved = remaining,
        "batch copy finished"
    );
}
