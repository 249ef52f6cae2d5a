// Project Part Resolution
//
// Decides which project part a document is reconciled against. A forced
// part is final whatever it updates; otherwise the well-known parts are
// probed in order and the first one that updates at least one row wins.

use crate::applier::{apply_batch, ApplyReport};
use crate::batch::Document;
use crate::feed::{same_name, MetadataBatch};

/// Parts probed, in order, when the feed does not force one.
pub const AUTO_PART_CANDIDATES: [&str; 2] = ["Piping", "PnId"];

/// Part name reported when auto-probing found nothing to update.
pub const AUTO_PART_LABEL: &str = "(auto)";

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("project part `{0}` not found")]
pub struct PartNotFoundError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartSelection {
    Forced(String),
    Auto,
}

impl PartSelection {
    /// Selection requested by the feed itself.
    pub fn from_batch(batch: &MetadataBatch) -> Self {
        match &batch.project_part {
            Some(part) => PartSelection::Forced(part.clone()),
            None => PartSelection::Auto,
        }
    }
}

/// Known part names, looked up case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartRegistry {
    names: Vec<String>,
}

impl PartRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Registered spelling of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .find(|n| same_name(n, name))
            .map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Apply `batch` to `document` under the given part selection.
pub fn apply_with_selection(
    document: &mut dyn Document,
    registry: &PartRegistry,
    selection: &PartSelection,
    batch: &MetadataBatch,
) -> Result<ApplyReport, PartNotFoundError> {
    match selection {
        PartSelection::Forced(name) => {
            let part = registry
                .get(name)
                .ok_or_else(|| PartNotFoundError(name.clone()))?;
            let store = document
                .data_links(part)
                .ok_or_else(|| PartNotFoundError(name.clone()))?;
            Ok(apply_batch(store, batch, part))
        }
        PartSelection::Auto => {
            for candidate in AUTO_PART_CANDIDATES {
                let Some(part) = registry.get(candidate) else {
                    continue;
                };
                let Some(store) = document.data_links(part) else {
                    continue;
                };

                let report = apply_batch(store, batch, part);
                if report.updated_rows > 0 {
                    return Ok(report);
                }
                tracing::debug!(part, "auto-probe: part updated nothing, trying next");
            }

            let mut report = ApplyReport::new(AUTO_PART_LABEL);
            report.warn(
                "no matching linked entities were updated \
                 (wrong projectPart, no links, or names not found)",
            );
            Ok(report)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::tests::MemoryDocument;
    use crate::feed::{FeedShape, MetadataRecord, PropertyMap};
    use crate::store::InMemoryLinkStore;

    fn batch(project_part: Option<&str>) -> MetadataBatch {
        MetadataBatch::new(
            FeedShape::Elements,
            vec![MetadataRecord::named(
                "V1",
                PropertyMap::from_iter([("Size", "2in")]),
            )],
            project_part.map(str::to_string),
            None,
        )
    }

    fn part_with_tag(tag: &str) -> InMemoryLinkStore {
        let mut store = InMemoryLinkStore::new();
        store.add_row(1, [("Tag", tag), ("Size", "1in")]);
        store.add_entity("A", Some(1));
        store
    }

    fn document() -> MemoryDocument {
        MemoryDocument::new()
            .with_part("Piping", part_with_tag("OTHER"))
            .with_part("PnId", part_with_tag("V1"))
    }

    #[test]
    fn auto_probe_takes_first_part_that_updates() {
        let registry = PartRegistry::new(["Piping", "PnId"]);
        let mut doc = document();
        let batch = batch(None);

        let report =
            apply_with_selection(&mut doc, &registry, &PartSelection::from_batch(&batch), &batch)
                .unwrap();

        assert_eq!(report.used_part, "PnId");
        assert_eq!(report.updated_rows, 1);
    }

    #[test]
    fn auto_probe_stops_at_first_part_that_updates() {
        let registry = PartRegistry::new(["Piping", "PnId"]);
        let mut doc = MemoryDocument::new()
            .with_part("Piping", part_with_tag("V1"))
            .with_part("PnId", part_with_tag("V1"));
        let batch = batch(None);

        let report = apply_with_selection(&mut doc, &registry, &PartSelection::Auto, &batch)
            .unwrap();

        assert_eq!(report.used_part, "Piping");
        assert_eq!(doc.store("Piping").value(1, "Size"), Some("2in"));
        assert_eq!(doc.store("PnId").value(1, "Size"), Some("1in"));
    }

    #[test]
    fn forced_part_is_final_even_without_updates() {
        let registry = PartRegistry::new(["Piping", "PnId"]);
        let mut doc = document();
        let batch = batch(Some("piping"));

        let report =
            apply_with_selection(&mut doc, &registry, &PartSelection::from_batch(&batch), &batch)
                .unwrap();

        assert_eq!(report.used_part, "Piping");
        assert_eq!(report.updated_rows, 0);
        assert_eq!(report.not_found_records, vec!["V1".to_string()]);
    }

    #[test]
    fn forced_unknown_part_fails() {
        let registry = PartRegistry::new(["Piping"]);
        let mut doc = document();
        let batch = batch(Some("Electrical"));

        let err =
            apply_with_selection(&mut doc, &registry, &PartSelection::from_batch(&batch), &batch)
                .unwrap_err();

        assert_eq!(err, PartNotFoundError("Electrical".into()));
    }

    #[test]
    fn auto_probe_without_updates_warns() {
        let registry = PartRegistry::new(["Piping"]);
        let mut doc = MemoryDocument::new().with_part("Piping", part_with_tag("OTHER"));
        let batch = batch(None);

        let report = apply_with_selection(&mut doc, &registry, &PartSelection::Auto, &batch)
            .unwrap();

        assert_eq!(report.used_part, AUTO_PART_LABEL);
        assert_eq!(report.updated_rows, 0);
        assert_eq!(report.warnings.len(), 1);
    }
}
