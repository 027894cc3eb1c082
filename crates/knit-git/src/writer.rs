//! Storing parsed pack records in an object database.

use crate::delta::apply_delta;
use crate::pack::{BaseRef, ObjectKind, PackObjectRecord};
use crate::{GitError, Result};
use knit_storage::{ObjectDatabase, ObjectId, ObjectType, StorageError};

/// Counts of what [`write_all`] stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Whole objects written in the first pass.
    pub objects: usize,
    /// Objects reconstructed from ref-deltas.
    pub deltas: usize,
}

impl WriteSummary {
    /// Total number of objects written.
    pub fn total(&self) -> usize {
        self.objects + self.deltas
    }
}

/// Writes every record of a pack to `db`.
///
/// Whole objects are written first so that the bases of ref-deltas are
/// present when the deltas are applied; a reconstructed object takes its
/// base's type. A delta whose base is itself a not-yet-applied delta is
/// retried in a later round. Offset-deltas are not supported and are
/// rejected before anything is written.
pub fn write_all<D>(db: &D, records: &[PackObjectRecord]) -> Result<WriteSummary>
where
    D: ObjectDatabase + ?Sized,
{
    let mut whole: Vec<(usize, ObjectType, &PackObjectRecord)> = Vec::new();
    let mut pending: Vec<(usize, ObjectId, &PackObjectRecord)> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match (record.kind, record.kind.object_type(), record.base_ref) {
            (_, Some(object_type), _) => whole.push((index, object_type, record)),
            (ObjectKind::RefDelta, None, Some(BaseRef::Id(base))) => {
                pending.push((index, base, record))
            }
            (kind, _, _) => return Err(GitError::UnsupportedObjectKind { index, kind }),
        }
    }

    let mut summary = WriteSummary::default();
    for (index, object_type, record) in whole {
        let id = db
            .write(object_type, &record.content)
            .map_err(|source| GitError::Object { index, source })?;
        tracing::trace!(index, %id, %object_type, "Stored object");
        summary.objects += 1;
    }

    let mut round = 0;
    while !pending.is_empty() {
        round += 1;
        let before = pending.len();
        let mut deferred = Vec::new();

        for item in pending {
            let (index, base, record) = item;
            let object = |source| GitError::Object { index, source };

            if !db.contains(&base).map_err(object)? {
                deferred.push(item);
                continue;
            }

            let (base_type, base_content) = db.read(&base).map_err(object)?;
            let content = apply_delta(&base_content, &record.content)
                .map_err(|source| GitError::Delta { index, source })?;
            let id = db.write(base_type, &content).map_err(object)?;

            tracing::trace!(index, %base, %id, "Resolved ref-delta");
            summary.deltas += 1;
        }

        if deferred.len() == before {
            if let Some(&(index, base, _)) = deferred.first() {
                return Err(GitError::Object {
                    index,
                    source: StorageError::NoSuchObject(base.to_hex()),
                });
            }
        }
        if !deferred.is_empty() {
            tracing::debug!(round, remaining = deferred.len(), "Deferring deltas with missing bases");
        }
        pending = deferred;
    }

    tracing::debug!(objects = summary.objects, deltas = summary.deltas, "Wrote pack objects");
    Ok(summary)
}
