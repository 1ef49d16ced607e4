use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// How far past the end of a sequence an index may reach. Anything further
/// would pad the sequence with an unbounded number of nulls.
pub const MAX_SEQUENCE_PADDING: usize = 1024;

/// One step of a [`Path`]: a mapping field or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged, from = "RawSegment")]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

/// Wire form of a segment. Strings made only of ASCII digits are read as
/// indices, so `["items", "0"]` and `["items", 0]` address the same slot.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSegment {
    Index(usize),
    Key(String),
}

impl From<RawSegment> for PathSegment {
    fn from(raw: RawSegment) -> Self {
        match raw {
            RawSegment::Index(i) => PathSegment::Index(i),
            RawSegment::Key(k) => PathSegment::from(k.as_str()),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(i) = s.parse() {
                return PathSegment::Index(i);
            }
        }
        PathSegment::Key(s.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        PathSegment::Index(i)
    }
}

impl PathSegment {
    /// The mapping key this segment addresses. Indices use their decimal spelling.
    pub fn to_key(&self) -> String {
        match self {
            PathSegment::Index(i) => i.to_string(),
            PathSegment::Key(k) => k.clone(),
        }
    }

    /// The empty container to create when this segment is the next step.
    fn empty_container(&self) -> Value {
        match self {
            PathSegment::Index(_) => Value::Array(Vec::new()),
            PathSegment::Key(_) => Value::Object(Map::new()),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "{i}"),
            PathSegment::Key(k) => f.write_str(k),
        }
    }
}

/// An ordered list of segments leading into a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<PathSegment>);

impl Path {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Parse a dotted path such as `hero.buttons.0.label`.
    pub fn parse(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Self::default();
        }
        Self(dotted.split('.').map(PathSegment::from).collect())
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Render the first `depth` segments, used to locate errors.
    fn prefix(&self, depth: usize) -> String {
        if depth == 0 {
            return "(root)".to_string();
        }
        Path(self.0[..depth].to_vec()).to_string()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl<S: Into<PathSegment>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// The path does not fit the shape of the document it was applied to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("cannot traverse into {found} at `{at}`")]
    NotAContainer { at: String, found: &'static str },
    #[error("sequence at `{at}` cannot be addressed by key `{key}`")]
    KeyOnSequence { at: String, key: String },
    #[error("index {index} at `{at}` is beyond the allowed limit of {limit}")]
    IndexOutOfRange {
        at: String,
        index: usize,
        limit: usize,
    },
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// Return a copy of `document` with `value` stored at `path`.
///
/// Missing or null intermediate slots are filled with an empty sequence when
/// the following segment is an index and an empty mapping otherwise.
/// Sequences addressed past their end are padded with nulls, at most
/// [`MAX_SEQUENCE_PADDING`] of them. `document` is never modified; an empty
/// path yields an unchanged copy.
pub fn update(document: &Value, path: &Path, value: Value) -> Result<Value, PathError> {
    let segments = path.segments();
    let Some((last, parents)) = segments.split_last() else {
        return Ok(document.clone());
    };

    let mut updated = document.clone();
    let mut current = &mut updated;
    for (depth, segment) in parents.iter().enumerate() {
        let slot = slot_mut(current, segment, path, depth)?;
        if slot.is_null() {
            *slot = segments[depth + 1].empty_container();
        }
        current = slot;
    }

    *slot_mut(current, last, path, parents.len())? = value;
    Ok(updated)
}

/// Fail-soft variant of [`update`]: a path conflict is logged and the
/// original document is returned as-is.
pub fn update_or_keep(document: &Value, path: &Path, value: Value) -> Value {
    match update(document, path, value) {
        Ok(updated) => updated,
        Err(err) => {
            tracing::warn!(path = %path, error = %err, "Dropping edit that does not fit the document");
            document.clone()
        }
    }
}

/// Resolve `path` inside `document`.
pub fn get<'a>(document: &'a Value, path: &Path) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(document, |current, segment| match (current, segment) {
            (Value::Object(map), segment) => map.get(&segment.to_key()),
            (Value::Array(items), PathSegment::Index(i)) => items.get(*i),
            _ => None,
        })
}

fn slot_mut<'a>(
    container: &'a mut Value,
    segment: &PathSegment,
    path: &Path,
    depth: usize,
) -> Result<&'a mut Value, PathError> {
    match container {
        Value::Object(map) => Ok(map.entry(segment.to_key()).or_insert(Value::Null)),
        Value::Array(items) => match segment {
            PathSegment::Index(i) => {
                let index = *i;
                let limit = items.len().saturating_add(MAX_SEQUENCE_PADDING);
                if index > limit {
                    return Err(PathError::IndexOutOfRange {
                        at: path.prefix(depth),
                        index,
                        limit,
                    });
                }
                if items.len() <= index {
                    items.resize(index + 1, Value::Null);
                }
                Ok(&mut items[index])
            }
            PathSegment::Key(key) => Err(PathError::KeyOnSequence {
                at: path.prefix(depth),
                key: key.clone(),
            }),
        },
        other => Err(PathError::NotAContainer {
            at: path.prefix(depth),
            found: kind_of(other),
        }),
    }
}
