//! Cursor fields and cursor-state folding

use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Field that orders a stream's records for incremental reads.
///
/// Either a single top-level name or a path into nested records. In YAML and
/// JSON both `cursor_field: updated` and `cursor_field: [meta, updated]` work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CursorField {
    Field(String),
    Path(Vec<String>),
}

impl CursorField {
    /// The cursor as a path; a single name becomes a one-element path
    pub fn path(&self) -> Vec<String> {
        match self {
            CursorField::Field(name) => vec![name.clone()],
            CursorField::Path(path) => path.clone(),
        }
    }

    /// Key under which the cursor value is kept in stream state (the leaf name)
    pub fn state_key(&self) -> &str {
        match self {
            CursorField::Field(name) => name,
            CursorField::Path(path) => path.last().map_or("", String::as_str),
        }
    }

    /// The cursor value of a record, if present
    pub fn value_in<'a>(&self, record: &'a JsonObject) -> Option<&'a JsonValue> {
        let (first, rest) = match self {
            CursorField::Field(name) => (name.as_str(), &[][..]),
            CursorField::Path(path) => {
                let (first, rest) = path.split_first()?;
                (first.as_str(), rest)
            }
        };

        rest.iter()
            .try_fold(record.get(first)?, |current, part| current.get(part))
    }
}

impl From<&str> for CursorField {
    fn from(name: &str) -> Self {
        CursorField::Field(name.to_string())
    }
}

/// Compare two cursor values of the same kind.
///
/// Numbers compare numerically and strings lexically, which orders ISO-8601
/// timestamps correctly. Anything else is incomparable.
pub fn compare_cursor_values(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                Some(x.cmp(&y))
            } else {
                x.as_f64()?.partial_cmp(&y.as_f64()?)
            }
        }
        (JsonValue::String(x), JsonValue::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Fold a record into a max-cursor state `{state_key: value}`.
///
/// Records without a cursor value leave the state untouched. When the stored
/// and the new value cannot be compared the newer record wins.
pub fn max_cursor_state(
    cursor: &CursorField,
    mut current: JsonObject,
    latest_record: &JsonObject,
) -> JsonObject {
    let Some(latest) = cursor.value_in(latest_record).filter(|v| !v.is_null()) else {
        return current;
    };

    let key = cursor.state_key();
    let replace = match current.get(key) {
        Some(stored) => !matches!(
            compare_cursor_values(latest, stored),
            Some(Ordering::Less | Ordering::Equal)
        ),
        None => true,
    };

    if replace {
        current.insert(key.to_string(), latest.clone());
    }
    current
}
