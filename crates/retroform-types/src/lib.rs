//! Shared identity types for retroform.
//!
//! This crate is the relational foundation: typed IDs and the member record.
//! It has **no internal retroform dependencies** — a pure leaf crate that
//! other crates build on.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! Member (MemberId)
//!     └── owns Form (FormId, shared via 8-char code)
//!     └── owns Template (TemplateId, blueprint for forms)
//!     └── authors Review (ReviewId, against a form)
//!
//! Form (FormId)
//!     └── owns Question (QuestionId, ordered by position)
//!
//! Template (TemplateId)
//!     └── owns Question (QuestionId, ordered by position)
//!     └── copied into Form on use (fresh question identities)
//!
//! Review (ReviewId)
//!     └── owns QuestionAnswer (AnswerId, ordered by position)
//!         └── answers Question of the source form
//! ```

pub mod ids;
pub mod member;

// Re-export primary types at crate root for convenience.
pub use ids::{AnswerId, FormId, MemberId, QuestionId, ReviewId, TemplateId};
pub use member::Member;

/// Current time as Unix milliseconds. Used by constructors throughout the
/// workspace.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
