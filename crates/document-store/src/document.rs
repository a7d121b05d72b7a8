//! Documents, filters and update operators.
//!
//! Documents are JSON objects keyed by [`EntityId`] within a named collection.
//! Field paths use dots to reach into nested objects (`"address.country"`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{EntityId, Result, StoreError};

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: EntityId,
    pub body: Value,
}

impl Document {
    pub fn new(id: EntityId, body: Value) -> Self {
        Self { id, body }
    }
}

/// Selects documents by ID and by field equality.
///
/// All conditions must hold. Field conditions compare scalars for equality;
/// they are also expressible as PostgreSQL JSONB containment, see
/// [`Filter::containment`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    ids: Option<Vec<EntityId>>,
    fields: Vec<(String, Value)>,
}

impl Filter {
    /// Matches every document in a collection.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches the document with the given ID.
    pub fn by_id(id: EntityId) -> Self {
        Self {
            ids: Some(vec![id]),
            fields: Vec::new(),
        }
    }

    /// Matches documents whose ID is one of `ids`.
    pub fn by_ids(ids: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            ids: Some(ids.into_iter().collect()),
            fields: Vec::new(),
        }
    }

    /// Adds a field equality condition.
    pub fn field(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((path.into(), value.into()));
        self
    }

    pub fn ids(&self) -> Option<&[EntityId]> {
        self.ids.as_deref()
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Returns true if the document satisfies every condition.
    pub fn matches(&self, id: EntityId, body: &Value) -> bool {
        if let Some(ids) = &self.ids
            && !ids.contains(&id)
        {
            return false;
        }
        self.fields
            .iter()
            .all(|(path, expected)| lookup(body, path) == Some(expected))
    }

    /// Nested JSON object equivalent to the field conditions, for `body @> $1`.
    pub fn containment(&self) -> Value {
        let mut root = Value::Object(Map::new());
        for (path, value) in &self.fields {
            // Conflicting paths (`a` then `a.b`) keep the first condition.
            let _ = assign(&mut root, path, value.clone());
        }
        root
    }
}

/// A single update operator.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Replaces the value at a path, creating parents as needed.
    Set(String, Value),
    /// Appends to the array at a path, creating it if absent.
    Push(String, Value),
    /// Removes every element equal to the value from the array at a path.
    Pull(String, Value),
}

/// An ordered list of update operators applied to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set(path.into(), value.into()));
        self
    }

    pub fn push(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Push(path.into(), value.into()));
        self
    }

    pub fn pull(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Pull(path.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    /// Applies the operators in order. Returns true if the document changed.
    pub fn apply(&self, body: &mut Value) -> Result<bool> {
        let before = body.clone();
        for op in &self.ops {
            match op {
                UpdateOp::Set(path, value) => assign(body, path, value.clone())?,
                UpdateOp::Push(path, value) => {
                    let array = array_at(body, path)?;
                    array.push(value.clone());
                }
                UpdateOp::Pull(path, value) => {
                    let array = array_at(body, path)?;
                    array.retain(|v| v != value);
                }
            }
        }
        Ok(*body != before)
    }
}

/// Outcome of a conditional update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

impl UpdateResult {
    pub fn unmatched() -> Self {
        Self::default()
    }
}

fn lookup<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(body, |current, key| current.get(key))
}

fn assign(body: &mut Value, path: &str, value: Value) -> Result<()> {
    let mut segments = path.split('.').peekable();
    let mut current = body;
    while let Some(key) = segments.next() {
        let Value::Object(map) = current else {
            return Err(invalid(path, "parent is not an object"));
        };
        if segments.peek().is_none() {
            map.insert(key.to_string(), value);
            return Ok(());
        }
        current = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    Err(invalid(path, "empty path"))
}

fn array_at<'a>(body: &'a mut Value, path: &str) -> Result<&'a mut Vec<Value>> {
    if lookup(body, path).is_none() {
        assign(body, path, Value::Array(Vec::new()))?;
    }
    let target = path
        .split('.')
        .try_fold(body, |current, key| current.get_mut(key))
        .ok_or_else(|| invalid(path, "missing field"))?;
    if target.is_null() {
        *target = Value::Array(Vec::new());
    }
    match target {
        Value::Array(array) => Ok(array),
        _ => Err(invalid(path, "not an array")),
    }
}

fn invalid(path: &str, reason: &str) -> StoreError {
    StoreError::InvalidUpdate {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}
