//! JSON Patch (RFC 6902) over JSON Pointers (RFC 6901).
//!
//! Updates carry their document change as a patch. Application is atomic:
//! [`apply_patch`] works on a copy and returns it only if every operation
//! succeeded.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PatchError;

/// A single JSON Patch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

impl PatchOperation {
    /// The target pointer of this operation.
    pub fn path(&self) -> &str {
        match self {
            PatchOperation::Add { path, .. }
            | PatchOperation::Remove { path }
            | PatchOperation::Replace { path, .. }
            | PatchOperation::Move { path, .. }
            | PatchOperation::Copy { path, .. }
            | PatchOperation::Test { path, .. } => path,
        }
    }
}

/// Apply a patch to a copy of `doc`.
pub fn apply_patch(doc: &Value, ops: &[PatchOperation]) -> Result<Value, PatchError> {
    let mut out = doc.clone();
    for op in ops {
        apply_one(&mut out, op)?;
    }
    Ok(out)
}

fn apply_one(doc: &mut Value, op: &PatchOperation) -> Result<(), PatchError> {
    match op {
        PatchOperation::Add { path, value } => add(doc, path, value.clone()),
        PatchOperation::Remove { path } => remove(doc, path).map(drop),
        PatchOperation::Replace { path, value } => {
            let target = pointer_mut(doc, path)?;
            *target = value.clone();
            Ok(())
        }
        PatchOperation::Move { from, path } => {
            if from == path {
                return Ok(());
            }
            if path.starts_with(&format!("{from}/")) {
                return Err(PatchError::MoveIntoChild {
                    from: from.clone(),
                    path: path.clone(),
                });
            }
            let value = remove(doc, from)?;
            add(doc, path, value)
        }
        PatchOperation::Copy { from, path } => {
            let value = pointer(doc, from)?.clone();
            add(doc, path, value)
        }
        PatchOperation::Test { path, value } => {
            if pointer(doc, path)? == value {
                Ok(())
            } else {
                Err(PatchError::TestFailed(path.clone()))
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pointers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_pointer(path: &str) -> Result<Vec<String>, PatchError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| PatchError::InvalidPointer(path.to_string()))?;
    Ok(rest
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn parse_index(path: &str, token: &str, len: usize) -> Result<usize, PatchError> {
    let invalid = || PatchError::InvalidIndex {
        path: path.to_string(),
        index: token.to_string(),
    };
    if token.is_empty()
        || !token.bytes().all(|b| b.is_ascii_digit())
        || (token.len() > 1 && token.starts_with('0'))
    {
        return Err(invalid());
    }
    let index: usize = token.parse().map_err(|_| invalid())?;
    if index >= len {
        return Err(invalid());
    }
    Ok(index)
}

fn child<'a>(value: &'a Value, path: &str, token: &str) -> Result<&'a Value, PatchError> {
    match value {
        Value::Object(map) => map
            .get(token)
            .ok_or_else(|| PatchError::PathNotFound(path.to_string())),
        Value::Array(items) => Ok(&items[parse_index(path, token, items.len())?]),
        _ => Err(PatchError::PathNotFound(path.to_string())),
    }
}

fn child_mut<'a>(value: &'a mut Value, path: &str, token: &str) -> Result<&'a mut Value, PatchError> {
    match value {
        Value::Object(map) => map
            .get_mut(token)
            .ok_or_else(|| PatchError::PathNotFound(path.to_string())),
        Value::Array(items) => {
            let index = parse_index(path, token, items.len())?;
            Ok(&mut items[index])
        }
        _ => Err(PatchError::PathNotFound(path.to_string())),
    }
}

fn pointer<'a>(doc: &'a Value, path: &str) -> Result<&'a Value, PatchError> {
    parse_pointer(path)?
        .iter()
        .try_fold(doc, |value, token| child(value, path, token))
}

fn pointer_mut<'a>(doc: &'a mut Value, path: &str) -> Result<&'a mut Value, PatchError> {
    let tokens = parse_pointer(path)?;
    let mut value = doc;
    for token in &tokens {
        value = child_mut(value, path, token)?;
    }
    Ok(value)
}

/// Split a pointer into its parent container and final token.
fn parent_mut<'a>(doc: &'a mut Value, path: &str) -> Result<(&'a mut Value, String), PatchError> {
    let mut tokens = parse_pointer(path)?;
    let last = tokens
        .pop()
        .ok_or_else(|| PatchError::InvalidPointer(path.to_string()))?;
    let mut value = doc;
    for token in &tokens {
        value = child_mut(value, path, token)?;
    }
    Ok((value, last))
}

fn add(doc: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    if path.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (parent, last) = parent_mut(doc, path)?;
    match parent {
        Value::Object(map) => {
            map.insert(last, value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
            } else {
                // Inserting at `len` appends.
                let index = parse_index(path, &last, items.len() + 1)?;
                items.insert(index, value);
            }
            Ok(())
        }
        _ => Err(PatchError::PathNotFound(path.to_string())),
    }
}

fn remove(doc: &mut Value, path: &str) -> Result<Value, PatchError> {
    let (parent, last) = parent_mut(doc, path)?;
    match parent {
        Value::Object(map) => map
            .remove(&last)
            .ok_or_else(|| PatchError::PathNotFound(path.to_string())),
        Value::Array(items) => {
            let index = parse_index(path, &last, items.len())?;
            Ok(items.remove(index))
        }
        _ => Err(PatchError::PathNotFound(path.to_string())),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Diff
// ─────────────────────────────────────────────────────────────────────────────

/// Compute a patch that turns `source` into `target`.
///
/// Only `add`, `remove`, and `replace` are emitted. The result satisfies
/// `apply_patch(source, &diff(source, target)) == target`.
pub fn diff(source: &Value, target: &Value) -> Vec<PatchOperation> {
    let mut ops = Vec::new();
    diff_into(source, target, String::new(), &mut ops);
    ops
}

fn diff_into(source: &Value, target: &Value, path: String, ops: &mut Vec<PatchOperation>) {
    if source == target {
        return;
    }
    match (source, target) {
        (Value::Object(src), Value::Object(dst)) => {
            for key in src.keys().filter(|k| !dst.contains_key(*k)) {
                ops.push(PatchOperation::Remove {
                    path: format!("{path}/{}", escape_token(key)),
                });
            }
            for (key, dst_value) in dst {
                let child_path = format!("{path}/{}", escape_token(key));
                match src.get(key) {
                    Some(src_value) => diff_into(src_value, dst_value, child_path, ops),
                    None => ops.push(PatchOperation::Add {
                        path: child_path,
                        value: dst_value.clone(),
                    }),
                }
            }
        }
        (Value::Array(src), Value::Array(dst)) => {
            let shared = src.len().min(dst.len());
            for i in 0..shared {
                diff_into(&src[i], &dst[i], format!("{path}/{i}"), ops);
            }
            // Remove from the back so earlier indices stay valid.
            for i in (shared..src.len()).rev() {
                ops.push(PatchOperation::Remove {
                    path: format!("{path}/{i}"),
                });
            }
            for (i, value) in dst.iter().enumerate().skip(shared) {
                ops.push(PatchOperation::Add {
                    path: format!("{path}/{i}"),
                    value: value.clone(),
                });
            }
        }
        _ => ops.push(PatchOperation::Replace {
            path,
            value: target.clone(),
        }),
    }
}
