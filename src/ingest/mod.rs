//! Participant ingestion pipeline: normalize, validate, deduplicate,
//! persist. Entry points are `add_single` (one form submission) and
//! `add_bulk` (one CSV upload).
//!
//! Per-row failures never abort a bulk run; they are accumulated into the
//! returned `ImportSummary`. Only CSV parse failures and store failures
//! are fatal, and a store failure mid-import leaves earlier batches
//! committed (no rollback).

pub mod dedup;
pub mod normalize;
pub mod validate;

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{Participant, RoomKind};
use crate::error::{AddError, ImportError, StoreError};
use crate::store::Store;

use dedup::{DedupIndex, DedupKey};
use normalize::{RawRow, normalize_headers, row_from_record};
use validate::validate_row;

/// Accepted rows are persisted in fixed-size sequential batches so
/// progress is incremental and a failure stops only subsequent batches.
pub const BATCH_SIZE: usize = 50;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub added: usize,
    pub validation_rejected: usize,
    pub duplicate_rejected: usize,
    /// One line per rejected row, in file order, numbered to match a
    /// spreadsheet viewer (data row i is line i + 2, after the header).
    pub rejections: Vec<String>,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Upload Summary:\nTotal rows: {}\nSuccessfully added: {}\n\
             Skipped (validation errors): {}\nSkipped (duplicates): {}",
            self.total_rows, self.added, self.validation_rejected, self.duplicate_rejected
        )?;
        if !self.rejections.is_empty() {
            write!(f, "\n\nRejected rows:\n{}", self.rejections.join("\n"))?;
        }
        Ok(())
    }
}

/// Second-tier duplicate check against the persistent store. In private
/// rooms both the email and the name must be free; public rooms only
/// check the name.
async fn check_existing(
    store: &dyn Store,
    room_id: Uuid,
    row: &RawRow,
    kind: RoomKind,
) -> Result<Option<String>, StoreError> {
    if kind.is_public() {
        let key = DedupKey::Name(row.name.clone());
        if store.participant_exists(room_id, &key).await? {
            return Ok(Some("Name already exists in this room".to_owned()));
        }
        return Ok(None);
    }

    let email = DedupKey::Email(row.email.to_lowercase());
    if store.participant_exists(room_id, &email).await? {
        return Ok(Some("Email already exists in this room".to_owned()));
    }
    let name = DedupKey::Name(row.name.clone());
    if store.participant_exists(room_id, &name).await? {
        return Ok(Some("Name already exists in this room".to_owned()));
    }
    Ok(None)
}

/// Normalizes, validates, dedup-checks and persists one participant.
/// Returns the stored record, or the first failure reason.
pub async fn add_single(
    store: &dyn Store,
    room_id: Uuid,
    kind: RoomKind,
    row: RawRow,
) -> Result<Participant, AddError> {
    let row = row.trimmed();
    validate_row(&row, kind).map_err(AddError::Invalid)?;
    if let Some(reason) = check_existing(store, room_id, &row, kind)
        .await
        .map_err(AddError::from)?
    {
        return Err(AddError::Duplicate(reason));
    }

    let participant = row.into_participant(room_id, kind);
    // the unique indexes may still refuse the row if a concurrent add won
    // the race between the existence check and this insert
    store.insert_participant(&participant).await?;
    info!(room = %room_id, name = %participant.name, "participant added");
    Ok(participant)
}

/// Runs one CSV upload through the pipeline. Every data row is attempted;
/// the summary always reports full counts even on partial success.
pub async fn add_bulk(
    store: &dyn Store,
    room_id: Uuid,
    kind: RoomKind,
    csv_text: &str,
) -> Result<ImportSummary, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_text.as_bytes());
    let headers = normalize_headers(reader.headers()?);
    // collect up front: a malformed file (ragged rows included) aborts
    // before any row is processed
    let records: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;

    let mut summary = ImportSummary {
        total_rows: records.len(),
        ..ImportSummary::default()
    };
    let mut index = DedupIndex::new();
    let mut accepted: Vec<Participant> = Vec::new();

    for (i, record) in records.iter().enumerate() {
        let line = i + 2;
        let row = row_from_record(&headers, record);

        if let Err(reason) = validate_row(&row, kind) {
            summary.validation_rejected += 1;
            summary.rejections.push(format!("Row {line}: {reason}"));
            continue;
        }

        if let Some(field) = index.duplicate_field(&row, kind) {
            summary.duplicate_rejected += 1;
            summary
                .rejections
                .push(format!("Row {line}: Duplicate {field} in file"));
            continue;
        }

        if let Some(reason) = check_existing(store, room_id, &row, kind).await? {
            summary.duplicate_rejected += 1;
            summary.rejections.push(format!("Row {line}: {reason}"));
            continue;
        }

        index.record(&row, kind);
        accepted.push(row.into_participant(room_id, kind));
    }

    for batch in accepted.chunks(BATCH_SIZE) {
        // a failed batch aborts the remainder; committed batches stay
        store.insert_participants(batch).await?;
        summary.added += batch.len();
        debug!(room = %room_id, committed = summary.added, "import batch committed");
    }

    info!(
        room = %room_id,
        total = summary.total_rows,
        added = summary.added,
        invalid = summary.validation_rejected,
        duplicate = summary.duplicate_rejected,
        "bulk import finished"
    );
    Ok(summary)
}
