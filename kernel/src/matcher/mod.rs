// Record Matcher
//
// Resolves each feed record to the rows it targets. Strategies are tried
// in a fixed order and the first applicable one wins:
//
//   handle -> row id -> tag -> name over the match columns
//
// Only entities with a resolvable store link take part in matching.

use std::collections::BTreeMap;

use crate::feed::{same_name, FeedShape, MetadataRecord};
use crate::store::{EntityId, LinkStore, RowId, StoreRow};

/// Column read for tag matching.
pub const TAG_COLUMN: &str = "Tag";

/// A document entity with a resolved store link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedEntity {
    pub entity: EntityId,
    pub handle: Option<String>,
    pub row_id: RowId,

    /// Trimmed value of the row's tag column, if non-blank.
    pub tag: Option<String>,

    /// First non-blank match column value, if any.
    pub name_key: Option<String>,
}

/// Linked entities of one document, scanned once per pass.
#[derive(Debug, Clone, Default)]
pub struct LinkIndex {
    pub scanned: usize,
    pub linked: Vec<LinkedEntity>,
}

impl LinkIndex {
    /// Scan every entity of the store.
    ///
    /// Entities without a link, or whose link does not resolve, are counted
    /// as scanned only. A row that cannot be fetched still counts as linked
    /// but never matches by tag or name.
    pub fn build(store: &dyn LinkStore, match_columns: &[String]) -> Self {
        let mut index = LinkIndex::default();
        let mut rows: BTreeMap<RowId, Option<StoreRow>> = BTreeMap::new();

        for entity in store.entities() {
            index.scanned += 1;

            if !store.has_link(entity) {
                continue;
            }
            let Some(row_id) = store.resolve_row_id(entity) else {
                continue;
            };

            let row = rows
                .entry(row_id)
                .or_insert_with(|| match store.fetch_row(row_id) {
                    Ok(row) => Some(row),
                    Err(err) => {
                        tracing::debug!(row_id, error = %err, "linked row could not be read");
                        None
                    }
                });

            let tag = row
                .as_ref()
                .and_then(|r| r.first_non_empty([TAG_COLUMN]))
                .map(str::to_string);
            let name_key = row
                .as_ref()
                .and_then(|r| r.first_non_empty(match_columns.iter().map(String::as_str)))
                .map(str::to_string);

            index.linked.push(LinkedEntity {
                entity,
                handle: store.handle(entity),
                row_id,
                tag,
                name_key,
            });
        }

        index
    }
}

/// Strategy that resolved a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Handle,
    RowId,
    Tag,
    Name,
}

/// Rows targeted by one record: one entry per matched linked entity, so a
/// row shared by several entities appears several times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMatch {
    pub strategy: MatchStrategy,
    pub targets: Vec<RowId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched(RecordMatch),

    /// The record carries no usable identity.
    Skipped(String),
}

/// Matches records against a scanned document.
pub struct Matcher<'a> {
    index: &'a LinkIndex,
    shape: FeedShape,
}

impl<'a> Matcher<'a> {
    pub fn new(index: &'a LinkIndex, shape: FeedShape) -> Self {
        Self { index, shape }
    }

    pub fn resolve(&self, record: &MetadataRecord) -> MatchOutcome {
        if let Some(handle) = &record.handle {
            let targets = self
                .index
                .linked
                .iter()
                .find(|e| e.handle.as_deref().is_some_and(|h| same_name(h, handle)))
                .map(|e| vec![e.row_id])
                .unwrap_or_default();
            return matched(MatchStrategy::Handle, targets);
        }

        if let Some(row_id) = record.row_id {
            let targets = self
                .index
                .linked
                .iter()
                .filter(|e| e.row_id == row_id)
                .map(|e| e.row_id)
                .collect();
            return matched(MatchStrategy::RowId, targets);
        }

        if let Some(tag) = &record.tag {
            return matched(
                MatchStrategy::Tag,
                self.targets_by(|e| e.tag.as_deref(), tag),
            );
        }

        match self.shape {
            FeedShape::Elements => matched(
                MatchStrategy::Name,
                self.targets_by(|e| e.name_key.as_deref(), &record.name),
            ),
            FeedShape::Items => MatchOutcome::Skipped(format!(
                "record `{}` skipped: match.tag or match.rowId is required",
                record.name
            )),
        }
    }

    fn targets_by<F>(&self, key: F, wanted: &str) -> Vec<RowId>
    where
        F: Fn(&LinkedEntity) -> Option<&str>,
    {
        self.index
            .linked
            .iter()
            .filter(|e| key(e).is_some_and(|k| same_name(k, wanted)))
            .map(|e| e.row_id)
            .collect()
    }
}

fn matched(strategy: MatchStrategy, targets: Vec<RowId>) -> MatchOutcome {
    MatchOutcome::Matched(RecordMatch { strategy, targets })
}
