//! The text-operation algebra: a value type representing a transformation
//! from one string to another as a sequence of `retain`/`insert`/`delete`
//! components, plus `apply`, `compose`, and `transform`.
//!
//! The component-level bookkeeping (canonicalization, the delete-before-
//! insert tiebreak, `apply`/`compose`/`transform`) is delegated to
//! [`operational_transform::OperationSeq`], the same crate `edison-note`'s
//! collaboration module and the `ethersync` daemon both already depend on
//! for this exact purpose. This module wraps it in a crate-local type so we
//! control the JSON wire form and raise our own [`SyncError`] taxonomy
//! instead of the raw crate's error type.

use operational_transform::{Operation as OTOp, OperationSeq};
use serde_json::Value;

use crate::error::SyncError;

mod json;

pub use json::{from_json, to_json};

/// A single component of a [`TextOperation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Retain(u64),
    Insert(String),
    Delete(u64),
}

/// A transformation from one string to another, expressed as an ordered
/// sequence of [`Component`]s.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextOperation(OperationSeq);

impl TextOperation {
    /// An empty operation: applicable only to the empty string.
    pub fn new() -> Self {
        Self(OperationSeq::default())
    }

    /// The identity operation over a string of length `len`: a single
    /// `Retain(len)`, used as the left/right zero of `transform`
    /// (see testable property 4).
    pub fn identity(len: u64) -> Self {
        let mut op = OperationSeq::default();
        if len > 0 {
            op.retain(len);
        }
        Self(op)
    }

    /// Appends a retain component, merging with a trailing retain if
    /// present. No-op when `n == 0`.
    pub fn retain(&mut self, n: u64) -> &mut Self {
        if n > 0 {
            self.0.retain(n);
        }
        self
    }

    /// Appends an insert component. No-op when `s` is empty.
    pub fn insert(&mut self, s: &str) -> &mut Self {
        if !s.is_empty() {
            self.0.insert(s);
        }
        self
    }

    /// Appends a delete component. No-op when `n == 0`.
    pub fn delete(&mut self, n: u64) -> &mut Self {
        if n > 0 {
            self.0.delete(n);
        }
        self
    }

    pub fn base_len(&self) -> usize {
        self.0.base_len()
    }

    pub fn target_len(&self) -> usize {
        self.0.target_len()
    }

    pub fn is_noop(&self) -> bool {
        self.0.ops().iter().all(|op| matches!(op, OTOp::Retain(_)))
    }

    pub fn components(&self) -> Vec<Component> {
        self.0
            .ops()
            .iter()
            .map(|op| match op {
                OTOp::Retain(n) => Component::Retain(*n),
                OTOp::Insert(s) => Component::Insert(s.clone()),
                OTOp::Delete(n) => Component::Delete(*n),
            })
            .collect()
    }

    /// Applies this operation to `x`. Fails with
    /// [`SyncError::OperationLengthMismatch`] when `x`'s length (in chars)
    /// does not equal `base_len()`.
    pub fn apply(&self, x: &str) -> Result<String, SyncError> {
        self.0
            .apply(x)
            .map_err(|_| SyncError::OperationLengthMismatch)
    }

    /// Composes `self` then `other` into a single operation `c` such that
    /// `apply(c, x) == apply(other, apply(self, x))`. Requires
    /// `self.target_len() == other.base_len()`; any other relationship is
    /// an algebra-level bug, not a user-facing error, so it is reported as
    /// [`SyncError::InvariantViolated`].
    pub fn compose(&self, other: &TextOperation) -> Result<TextOperation, SyncError> {
        self.0
            .compose(&other.0)
            .map(TextOperation)
            .map_err(|e| {
                SyncError::invariant(
                    "compose",
                    format!(
                        "cannot compose op with target_len {} against op with base_len {}: {e}",
                        self.target_len(),
                        other.base_len()
                    ),
                )
            })
    }

    /// Transforms `self` (`a`) and `other` (`b`), both defined against the
    /// same base string, into `(a', b')` such that
    /// `compose(a, b') == compose(b, a')`. When both sides insert at the
    /// same position, `a`'s insertion is ordered first (the side bias is a
    /// contract with the server and must not change independently).
    pub fn transform(&self, other: &TextOperation) -> Result<(TextOperation, TextOperation), SyncError> {
        self.0
            .transform(&other.0)
            .map(|(a, b)| (TextOperation(a), TextOperation(b)))
            .map_err(|e| {
                SyncError::invariant(
                    "transform",
                    format!(
                        "cannot transform operations with base_len {} and {}: {e}",
                        self.base_len(),
                        other.base_len()
                    ),
                )
            })
    }

    /// Computes the inverse of this operation against the string it was
    /// applied to (*before* the edit), i.e. `apply(invert(op, x), apply(op,
    /// x)) == x`. Used by the undo history to build redo/undo entries.
    pub fn invert(&self, base: &str) -> TextOperation {
        TextOperation(self.0.invert(base))
    }

    /// Encodes this operation into the wire form of §4.1: a flat JSON array
    /// where a positive integer is a retain, a negative integer is a
    /// delete, and a string is an insert.
    pub fn to_json(&self) -> Value {
        json::to_json(self)
    }

    /// Decodes the wire form of §4.1. Rejects zero entries and
    /// non-string/non-integer entries with
    /// [`SyncError::MalformedOperation`].
    pub fn from_json(value: &Value) -> Result<TextOperation, SyncError> {
        json::from_json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(build: impl FnOnce(&mut TextOperation)) -> TextOperation {
        let mut op = TextOperation::new();
        build(&mut op);
        op
    }

    #[test]
    fn apply_retain_insert_delete() {
        let mut o = TextOperation::new();
        o.retain(1).insert("X").retain(2);
        assert_eq!(o.apply("abc").unwrap(), "aXbc");
    }

    #[test]
    fn apply_rejects_length_mismatch() {
        let mut o = TextOperation::new();
        o.retain(5);
        assert_eq!(o.apply("abc"), Err(SyncError::OperationLengthMismatch));
    }

    #[test]
    fn compose_law_matches_sequential_apply() {
        let mut a = TextOperation::new();
        a.retain(1).insert("X").retain(2);
        let mut b = TextOperation::new();
        b.retain(2).delete(1).retain(2);

        let c = a.compose(&b).unwrap();
        let x = "abc";
        assert_eq!(c.apply(x).unwrap(), b.apply(&a.apply(x).unwrap()).unwrap());
    }

    #[test]
    fn compose_is_associative() {
        let mut a = TextOperation::new();
        a.insert("12").retain(3);
        let mut b = TextOperation::new();
        b.retain(2).delete(1).retain(2);
        let mut c = TextOperation::new();
        c.retain(1).insert("!").retain(3);

        let left = a.compose(&b).unwrap().compose(&c).unwrap();
        let right = a.compose(&b.compose(&c).unwrap()).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn transform_preserves_convergence() {
        let a = op(|o| {
            o.insert("X");
            o.retain(3);
        });
        let b = op(|o| {
            o.retain(3);
            o.insert("!");
        });

        let (a_prime, b_prime) = a.transform(&b).unwrap();
        let left = a.compose(&b_prime).unwrap();
        let right = b.compose(&a_prime).unwrap();
        assert_eq!(left, right);
        assert_eq!(left.apply("abc").unwrap(), "Xabc!");
    }

    #[test]
    fn transform_identity_is_a_no_op() {
        let identity = TextOperation::identity(3);
        let b = op(|o| {
            o.retain(1);
            o.insert("Z");
            o.retain(2);
        });
        let (a_prime, b_prime) = identity.transform(&b).unwrap();
        assert_eq!(b_prime, b);
        assert!(a_prime.is_noop());
    }

    #[test]
    fn json_round_trip() {
        let mut o = TextOperation::new();
        o.retain(2).delete(2).insert("XY").retain(2);
        let value = o.to_json();
        assert_eq!(value, serde_json::json!([2, -2, "XY", 2]));
        let parsed = TextOperation::from_json(&value).unwrap();
        assert_eq!(parsed, o);
    }

    #[test]
    fn from_json_rejects_zero_entries() {
        let value = serde_json::json!([0, "x"]);
        assert!(matches!(
            TextOperation::from_json(&value),
            Err(SyncError::MalformedOperation(_))
        ));
    }

    #[test]
    fn invert_undoes_the_operation() {
        let mut o = TextOperation::new();
        o.retain(1).insert("X").retain(2);
        let base = "abc";
        let applied = o.apply(base).unwrap();
        let inverse = o.invert(base);
        assert_eq!(inverse.apply(&applied).unwrap(), base);
    }
}
