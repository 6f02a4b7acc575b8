//! Retroform domain core.
//!
//! A member creates a reusable question **form** (directly or from a
//! **template**), shares it via a short public code, and collects structured
//! **reviews** against it. Two mechanisms carry the real logic:
//!
//! - [`reconcile`] — merges a client-submitted edit list against a parent's
//!   ordered child collection: match by identity, create for unreferenced
//!   entries, drop the rest, renumber positions dense and zero-based.
//! - [`code`] — unique short-code generation for shareable form identifiers,
//!   bounded retry against an existence check.
//!
//! Everything else is the plumbing around them: the three parent aggregates
//! ([`form::Form`], [`template::Template`], [`review::Review`]), SQLite
//! persistence ([`db::Db`]) that saves a reconciled parent atomically, and
//! the [`service`] layer that wires load → authorize → reconcile → persist.
//!
//! [`reconcile`]: reconcile::reconcile

pub mod code;
pub mod db;
pub mod error;
pub mod form;
pub mod reconcile;
pub mod review;
pub mod service;
pub mod template;

// Re-export primary types at crate root for convenience.
pub use code::{CODE_LENGTH, generate_unique_code};
pub use db::Db;
pub use error::{Error, Result};
pub use form::{Form, Question, QuestionEdit, QuestionPayload};
pub use reconcile::{ChildRecord, SubmittedEdit, reconcile};
pub use review::{AnswerEdit, AnswerPayload, QuestionAnswer, Review};
pub use service::{
    FormRequest, FormService, MemberService, ReviewService, TemplateRequest, TemplateService,
};
pub use template::Template;
