// Metadata Feed Loader
//
// Parses the external JSON feed into a canonical, immutable batch of
// property updates. Loading either yields a whole batch or fails before
// any store is touched; there are no partial loads.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::store::RowId;

/// Fallback columns consulted, in order, for name-based matching.
pub const DEFAULT_MATCH_COLUMNS: [&str; 6] = [
    "Tag",
    "TagValue",
    "Name",
    "Number",
    "LineNumberTag",
    "LineNumber",
];

/// Errors raised while loading a feed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("cannot read feed {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("feed is not valid JSON: {0}")]
    Json(String),

    #[error("feed must contain an `elements` or `items` array")]
    MissingRecords,

    #[error("feed contains no records")]
    Empty,

    #[error("record {index} is malformed: {reason}")]
    MalformedRecord { index: usize, reason: String },

    #[error("record {index} is missing a non-empty `name`")]
    MissingName { index: usize },

    #[error("record `{name}` is missing `properties`")]
    MissingProperties { name: String },

    #[error("record `{name}` has invalid `properties` (must be object or array)")]
    InvalidProperties { name: String },

    #[error("record `{name}` has an invalid properties[] item (needs name/value)")]
    InvalidPropertyItem { name: String },

    #[error("record `{name}` property `{column}` must be a string")]
    NonStringValue { name: String, column: String },
}

/// Case-insensitive identity comparison used for names, tags, handles and columns.
pub fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

/// Column name to desired value, keyed case-insensitively.
///
/// Inserting an existing key (in any casing) replaces its value and keeps
/// the first spelling of the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap {
    entries: Vec<(String, String)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| same_name(k, &column)) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| same_name(k, column))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = PropertyMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// One desired update from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    /// Canonical name: the first-seen spelling among records that share it.
    pub name: String,
    pub handle: Option<String>,
    pub row_id: Option<RowId>,
    pub tag: Option<String>,
    pub properties: PropertyMap,
}

impl MetadataRecord {
    /// Record matched by name only.
    pub fn named(name: impl Into<String>, properties: PropertyMap) -> Self {
        Self {
            name: name.into(),
            handle: None,
            row_id: None,
            tag: None,
            properties,
        }
    }
}

/// Which top-level array the records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedShape {
    /// `elements`: name-keyed records; records without explicit identity
    /// fall back to name matching over the match columns.
    Elements,

    /// `items`: match-keyed records; records need `match.tag` or `match.rowId`.
    Items,
}

/// The loaded feed. Built once per run and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataBatch {
    pub version: u32,
    pub shape: FeedShape,
    pub records: Vec<MetadataRecord>,
    pub project_part: Option<String>,
    pub match_columns: Vec<String>,
}

impl MetadataBatch {
    /// Build a batch directly, normalizing names and match columns the same
    /// way the loader does.
    pub fn new(
        shape: FeedShape,
        records: Vec<MetadataRecord>,
        project_part: Option<String>,
        match_columns: Option<Vec<String>>,
    ) -> Self {
        let mut records = records;
        canonicalize_names(&mut records);
        Self {
            version: 1,
            shape,
            records,
            project_part: non_blank(project_part),
            match_columns: normalize_match_columns(match_columns),
        }
    }

    /// Distinct canonical record names, in first-seen order.
    pub fn record_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for record in &self.records {
            if !names.contains(&record.name.as_str()) {
                names.push(&record.name);
            }
        }
        names
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFeed {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    project_part: Option<String>,
    #[serde(default)]
    match_columns: Option<Vec<String>>,
    #[serde(default)]
    elements: Option<Value>,
    #[serde(default)]
    items: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    handle: Option<String>,
    #[serde(default, rename = "match")]
    criteria: Option<RawMatch>,
    #[serde(default)]
    properties: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMatch {
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    row_id: Option<RowId>,
    #[serde(default)]
    handle: Option<String>,
}

/// Parse raw feed bytes into a batch.
pub fn load_batch(bytes: &[u8]) -> Result<MetadataBatch, SchemaError> {
    let raw: RawFeed =
        serde_json::from_slice(bytes).map_err(|e| SchemaError::Json(e.to_string()))?;

    let (shape, values) = match (raw.elements, raw.items) {
        (Some(Value::Array(values)), _) => (FeedShape::Elements, values),
        (None, Some(Value::Array(values))) => (FeedShape::Items, values),
        _ => return Err(SchemaError::MissingRecords),
    };

    if values.is_empty() {
        return Err(SchemaError::Empty);
    }

    let mut records = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        let raw_record = RawRecord::deserialize(value).map_err(|e| {
            SchemaError::MalformedRecord {
                index,
                reason: e.to_string(),
            }
        })?;
        records.push(normalize_record(shape, index, raw_record)?);
    }

    let mut batch = MetadataBatch::new(shape, records, raw.project_part, raw.match_columns);
    batch.version = raw.version.unwrap_or(1);
    Ok(batch)
}

/// Read and parse a feed file.
pub fn load_batch_from_path(path: &Path) -> Result<MetadataBatch, SchemaError> {
    let bytes = fs::read(path).map_err(|e| SchemaError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    load_batch(&bytes)
}

fn normalize_record(
    shape: FeedShape,
    index: usize,
    raw: RawRecord,
) -> Result<MetadataRecord, SchemaError> {
    let criteria = raw.criteria.unwrap_or_default();
    let tag = non_blank(criteria.tag);
    let row_id = criteria.row_id;
    let handle = non_blank(raw.handle).or_else(|| non_blank(criteria.handle));

    let name = match (shape, non_blank(raw.name)) {
        (_, Some(name)) => name,
        (FeedShape::Elements, None) => return Err(SchemaError::MissingName { index }),
        (FeedShape::Items, None) => match (&tag, row_id) {
            (Some(tag), _) => tag.clone(),
            (None, Some(row_id)) => format!("rowId={row_id}"),
            (None, None) => format!("items[{index}]"),
        },
    };

    let properties = match (shape, raw.properties) {
        (_, Some(value)) => normalize_properties(&name, value)?,
        (FeedShape::Items, None) => PropertyMap::new(),
        (FeedShape::Elements, None) => return Err(SchemaError::MissingProperties { name }),
    };

    Ok(MetadataRecord {
        name,
        handle,
        row_id,
        tag,
        properties,
    })
}

fn normalize_properties(name: &str, value: Value) -> Result<PropertyMap, SchemaError> {
    let mut map = PropertyMap::new();

    match value {
        Value::Object(object) => {
            for (column, value) in object {
                insert_property(&mut map, name, &column, value)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                let (column, value) = match item {
                    Value::Object(mut pair) => match (pair.remove("name"), pair.remove("value")) {
                        (Some(Value::String(column)), Some(value)) => (column, value),
                        _ => {
                            return Err(SchemaError::InvalidPropertyItem {
                                name: name.to_string(),
                            })
                        }
                    },
                    _ => {
                        return Err(SchemaError::InvalidPropertyItem {
                            name: name.to_string(),
                        })
                    }
                };
                insert_property(&mut map, name, &column, value)?;
            }
        }
        _ => {
            return Err(SchemaError::InvalidProperties {
                name: name.to_string(),
            })
        }
    }

    Ok(map)
}

fn insert_property(
    map: &mut PropertyMap,
    name: &str,
    column: &str,
    value: Value,
) -> Result<(), SchemaError> {
    let column = column.trim();
    if column.is_empty() {
        return Ok(());
    }

    match value {
        Value::String(value) => {
            map.insert(column, value);
            Ok(())
        }
        _ => Err(SchemaError::NonStringValue {
            name: name.to_string(),
            column: column.to_string(),
        }),
    }
}

fn canonicalize_names(records: &mut [MetadataRecord]) {
    let mut seen: Vec<String> = Vec::new();
    for record in records.iter_mut() {
        match seen.iter().find(|s| same_name(s, &record.name)) {
            Some(canonical) => record.name = canonical.clone(),
            None => seen.push(record.name.clone()),
        }
    }
}

fn normalize_match_columns(columns: Option<Vec<String>>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for column in columns.unwrap_or_default() {
        let column = column.trim();
        if !column.is_empty() && !out.iter().any(|c| same_name(c, column)) {
            out.push(column.to_string());
        }
    }

    if out.is_empty() {
        DEFAULT_MATCH_COLUMNS.iter().map(|c| c.to_string()).collect()
    } else {
        out
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
