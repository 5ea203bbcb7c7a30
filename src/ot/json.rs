//! Wire-form encode/decode for [`TextOperation`]: a flat JSON array where a
//! positive integer is `Retain(n)`, a negative integer is `Delete(-n)`, and
//! a string is `Insert(s)`.

use serde_json::Value;

use super::{Component, TextOperation};
use crate::error::SyncError;

pub fn to_json(op: &TextOperation) -> Value {
    let entries: Vec<Value> = op
        .components()
        .into_iter()
        .map(|c| match c {
            Component::Retain(n) => Value::from(n as i64),
            Component::Delete(n) => Value::from(-(n as i64)),
            Component::Insert(s) => Value::from(s),
        })
        .collect();
    Value::Array(entries)
}

pub fn from_json(value: &Value) -> Result<TextOperation, SyncError> {
    let entries = value.as_array().ok_or_else(|| {
        SyncError::MalformedOperation("operation must be a JSON array".to_string())
    })?;

    let mut op = TextOperation::new();
    for entry in entries {
        match entry {
            Value::Number(n) => {
                let n = n.as_i64().ok_or_else(|| {
                    SyncError::MalformedOperation(format!(
                        "operation entries must be integers, got {entry}"
                    ))
                })?;
                if n == 0 {
                    return Err(SyncError::MalformedOperation(
                        "operation entries must not be zero".to_string(),
                    ));
                }
                if n > 0 {
                    op.retain(n as u64);
                } else {
                    op.delete((-n) as u64);
                }
            }
            Value::String(s) => {
                if s.is_empty() {
                    return Err(SyncError::MalformedOperation(
                        "insert entries must not be empty".to_string(),
                    ));
                }
                op.insert(s);
            }
            other => {
                return Err(SyncError::MalformedOperation(format!(
                    "operation entries must be a non-zero integer or a string, got {other}"
                )));
            }
        }
    }
    Ok(op)
}
