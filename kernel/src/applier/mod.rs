// Update Applier
//
// Executes the property writes for one pass over one document. Each row
// edit is scoped and committed on its own: a failing row is reported and
// the pass moves on, earlier and later rows are unaffected.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::feed::{same_name, MetadataBatch, MetadataRecord};
use crate::matcher::{LinkIndex, MatchOutcome, MatchStrategy, Matcher};
use crate::store::{LinkStore, RowId};

/// Outcome of one pass against one project part of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub used_part: String,
    pub scanned_entities: usize,
    pub linked_entities: usize,

    /// Every (record, linked entity) hit, written or not.
    pub matched_links: usize,

    /// Rows actually written, each row at most once per pass.
    pub updated_rows: usize,

    pub updated_per_record: BTreeMap<String, usize>,
    pub missing_columns_per_record: BTreeMap<String, Vec<String>>,
    pub not_found_records: Vec<String>,
    pub warnings: Vec<String>,
}

impl ApplyReport {
    pub fn new(used_part: impl Into<String>) -> Self {
        Self {
            used_part: used_part.into(),
            ..Self::default()
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(part = %self.used_part, "{message}");
        self.warnings.push(message);
    }

    fn note_missing(&mut self, record: &str, columns: Vec<&str>) {
        if columns.is_empty() {
            return;
        }
        let set = self
            .missing_columns_per_record
            .entry(record.to_string())
            .or_default();
        for column in columns {
            if !set.iter().any(|c| same_name(c, column)) {
                set.push(column.to_string());
            }
        }
    }
}

/// Run one match-and-apply pass of `batch` over `store`.
pub fn apply_batch(store: &mut dyn LinkStore, batch: &MetadataBatch, part: &str) -> ApplyReport {
    let index = LinkIndex::build(&*store, &batch.match_columns);

    let mut pass = ApplyPass {
        store,
        written: HashSet::new(),
        report: ApplyReport::new(part),
    };
    pass.report.scanned_entities = index.scanned;
    pass.report.linked_entities = index.linked.len();

    let matcher = Matcher::new(&index, batch.shape);
    for record in &batch.records {
        if record.properties.is_empty() {
            pass.report
                .warn(format!("record `{}` has no properties; skipped", record.name));
            continue;
        }

        match matcher.resolve(record) {
            MatchOutcome::Skipped(reason) => pass.report.warn(reason),
            MatchOutcome::Matched(m) => {
                if m.targets.is_empty() && m.strategy == MatchStrategy::RowId {
                    pass.report.warn(format!(
                        "record `{}`: rowId {} has no linked objects in this document",
                        record.name,
                        record.row_id.unwrap_or_default()
                    ));
                }
                for row_id in m.targets {
                    pass.report.matched_links += 1;
                    pass.write_row(record, row_id);
                }
            }
        }
    }

    let mut report = pass.report;
    for name in batch.record_names() {
        if !report.updated_per_record.contains_key(name) {
            report.not_found_records.push(name.to_string());
        }
    }

    tracing::debug!(
        part,
        scanned = report.scanned_entities,
        linked = report.linked_entities,
        matched = report.matched_links,
        updated = report.updated_rows,
        "apply pass finished"
    );

    report
}

struct ApplyPass<'s> {
    store: &'s mut dyn LinkStore,
    written: HashSet<RowId>,
    report: ApplyReport,
}

impl ApplyPass<'_> {
    fn write_row(&mut self, record: &MetadataRecord, row_id: RowId) {
        // A row gets one attempt per pass, whichever record reaches it first.
        if !self.written.insert(row_id) {
            return;
        }

        let row = match self.store.fetch_row(row_id) {
            Ok(row) => row,
            Err(err) => {
                self.report.warn(format!(
                    "failed to get rowId={row_id} for `{}`: {err}",
                    record.name
                ));
                return;
            }
        };

        let mut edit = match self.store.begin_edit(row_id) {
            Ok(edit) => edit,
            Err(err) => {
                self.report.warn(format!(
                    "failed updating `{}` (rowId={row_id}): {err}",
                    record.name
                ));
                return;
            }
        };

        let mut missing = Vec::new();
        for (column, value) in record.properties.iter() {
            match row.column(column) {
                Some(schema_column) => edit.set(schema_column, value),
                None => missing.push(column),
            }
        }
        if let Err(err) = self.store.commit_edit(edit) {
            self.report.warn(format!(
                "failed updating `{}` (rowId={row_id}): {err}",
                record.name
            ));
            return;
        }

        // Only committed rows report their missing columns.
        self.report.note_missing(&record.name, missing);
        self.report.updated_rows += 1;
        *self
            .report
            .updated_per_record
            .entry(record.name.clone())
            .or_insert(0) += 1;
    }
}
