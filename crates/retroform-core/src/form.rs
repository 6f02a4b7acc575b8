//! Form aggregate: a shareable set of ordered questions.
//!
//! A form is created by a member, shared via its public [`code`], and answered
//! by reviews. Its questions are exclusively owned — they exist only inside
//! their form, ordered by a dense zero-based `position` that is recomputed on
//! every reconciliation.
//!
//! [`code`]: Form::code

use serde::{Deserialize, Serialize};

use retroform_types::{FormId, MemberId, QuestionId, now_millis};

use crate::error::{Error, Result};
use crate::reconcile::{ChildRecord, SubmittedEdit, reconcile};
use crate::template::Template;

/// Client-supplied content of a question.
///
/// Shared by forms and templates; the two keep structurally identical
/// children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPayload {
    /// The question text. Must be non-empty.
    pub value: String,
    /// Guidance shown alongside the question. May be empty.
    pub description: String,
}

impl QuestionPayload {
    pub fn new(value: impl Into<String>, description: impl Into<String>) -> Self {
        Self { value: value.into(), description: description.into() }
    }
}

/// An ordered question owned by a form or template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Storage identity, absent until persisted.
    pub id: Option<QuestionId>,
    /// The question text.
    pub value: String,
    /// Guidance shown alongside the question.
    pub description: String,
    /// Index within the parent's sequence. Derived, never client-supplied.
    pub position: i32,
}

impl ChildRecord for Question {
    type Id = QuestionId;
    type Payload = QuestionPayload;

    fn id(&self) -> Option<QuestionId> {
        self.id
    }

    fn create(payload: QuestionPayload) -> Result<Self> {
        validate_value(&payload.value)?;
        Ok(Question {
            id: None,
            value: payload.value,
            description: payload.description,
            position: 0,
        })
    }

    fn apply(&mut self, payload: QuestionPayload) -> Result<()> {
        validate_value(&payload.value)?;
        self.value = payload.value;
        self.description = payload.description;
        Ok(())
    }

    fn set_position(&mut self, position: i32) {
        self.position = position;
    }
}

fn validate_value(value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidArgument("question text cannot be empty".into()));
    }
    Ok(())
}

/// An edit against a form's question list.
pub type QuestionEdit = SubmittedEdit<QuestionId, QuestionPayload>;

/// A shareable question form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    /// Storage identity, absent until persisted.
    pub id: Option<FormId>,
    /// Public share code. Assigned before first persistence, then immutable.
    pub code: String,
    /// Form title. Never empty.
    pub title: String,
    /// The creating member. Set once, never changes.
    pub owner: MemberId,
    /// Ordered questions, positions dense and zero-based.
    pub questions: Vec<Question>,
    /// When the form was created (Unix millis).
    pub created_at: u64,
    /// When the form was last updated (Unix millis).
    pub updated_at: u64,
}

impl Form {
    /// Create a new form with an initial question list.
    ///
    /// `code` comes from [`crate::code::generate_unique_code`]; the service
    /// layer owns the uniqueness check.
    pub fn new(
        owner: MemberId,
        code: impl Into<String>,
        title: impl Into<String>,
        edits: Vec<QuestionEdit>,
    ) -> Result<Self> {
        let title = validate_title(title.into())?;
        let questions = reconcile(Vec::new(), edits)?;
        let now = now_millis();
        Ok(Form {
            id: None,
            code: code.into(),
            title,
            owner,
            questions,
            created_at: now,
            updated_at: now,
        })
    }

    /// Create a form from a template: same title, deep-copied questions.
    ///
    /// The copies carry no identity — the storage layer assigns fresh ones —
    /// so the template is unaffected by anything that later happens to the
    /// form.
    pub fn from_template(
        owner: MemberId,
        code: impl Into<String>,
        template: &Template,
    ) -> Result<Self> {
        let edits = template
            .questions
            .iter()
            .map(|q| QuestionEdit::create(QuestionPayload::new(q.value.clone(), q.description.clone())))
            .collect();
        Form::new(owner, code, template.title.as_str(), edits)
    }

    /// Replace the title and reconcile the question list.
    pub fn update(&mut self, title: impl Into<String>, edits: Vec<QuestionEdit>) -> Result<()> {
        let title = validate_title(title.into())?;
        let questions = reconcile(std::mem::take(&mut self.questions), edits)?;
        self.title = title;
        self.questions = questions;
        self.updated_at = now_millis();
        Ok(())
    }

    /// Whether the given member created this form.
    pub fn is_owned_by(&self, member: MemberId) -> bool {
        self.owner == member
    }

    /// Look up a question by identity.
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == Some(id))
    }
}

pub(crate) fn validate_title(title: String) -> Result<String> {
    if title.trim().is_empty() {
        return Err(Error::InvalidArgument("title cannot be empty".into()));
    }
    Ok(title)
}
