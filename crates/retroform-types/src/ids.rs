//! Typed identifiers for members, forms, templates, reviews, and children.
//!
//! All ID types wrap the storage layer's 64-bit row id. They exist so a
//! `ReviewId` can never be passed where a `FormId` is expected; the storage
//! layer assigns the underlying value at first insert, which is why domain
//! objects hold `Option<XxxId>` until they are persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A member identifier.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(i64);

/// A form identifier.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormId(i64);

/// A question identifier (form or template questions).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(i64);

/// A template identifier.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(i64);

/// A review identifier.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(i64);

/// A question-answer identifier.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerId(i64);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_row_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Wrap a storage row id.
            pub const fn from_raw(raw: i64) -> Self {
                Self(raw)
            }

            /// The underlying row id, for binding into storage queries.
            pub const fn raw(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($name, "({})"), self.0)
            }
        }

        impl From<i64> for $T {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$T> for i64 {
            fn from(id: $T) -> i64 {
                id.0
            }
        }
    };
}

impl_row_id!(MemberId, "MemberId");
impl_row_id!(FormId, "FormId");
impl_row_id!(QuestionId, "QuestionId");
impl_row_id!(TemplateId, "TemplateId");
impl_row_id!(ReviewId, "ReviewId");
impl_row_id!(AnswerId, "AnswerId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_and_display() {
        let id = FormId::from_raw(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(i64::from(id), 42);
        assert_eq!(format!("{id}"), "42");
        assert_eq!(format!("{id:?}"), "FormId(42)");
    }

    #[test]
    fn test_serde_transparent() {
        let id = ReviewId::from_raw(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "7");
        let back: ReviewId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
