//! Template aggregate: a reusable form blueprint.
//!
//! Templates own the same ordered [`Question`] children as forms. Creating a
//! form from a template deep-copies the questions and bumps the template's
//! `used_count`; the two writes commit in the same transaction (see
//! [`crate::service::FormService::create_from_template`]).

use serde::{Deserialize, Serialize};

use retroform_types::{MemberId, TemplateId, now_millis};

use crate::error::Result;
use crate::form::{Question, QuestionEdit, validate_title};
use crate::reconcile::reconcile;

/// A reusable form blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Storage identity, absent until persisted.
    pub id: Option<TemplateId>,
    /// Template title. Never empty.
    pub title: String,
    /// What the template is for.
    pub description: String,
    /// The creating member. Set once, never changes.
    pub owner: MemberId,
    /// Ordered questions, positions dense and zero-based.
    pub questions: Vec<Question>,
    /// How many forms were created from this template.
    pub used_count: i64,
    /// When the template was created (Unix millis).
    pub created_at: u64,
    /// When the template was last updated (Unix millis).
    pub updated_at: u64,
}

impl Template {
    /// Create a new template with an initial question list.
    pub fn new(
        owner: MemberId,
        title: impl Into<String>,
        description: impl Into<String>,
        edits: Vec<QuestionEdit>,
    ) -> Result<Self> {
        let title = validate_title(title.into())?;
        let questions = reconcile(Vec::new(), edits)?;
        let now = now_millis();
        Ok(Template {
            id: None,
            title,
            description: description.into(),
            owner,
            questions,
            used_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace title and description, and reconcile the question list.
    pub fn update(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        edits: Vec<QuestionEdit>,
    ) -> Result<()> {
        let title = validate_title(title.into())?;
        let questions = reconcile(std::mem::take(&mut self.questions), edits)?;
        self.title = title;
        self.description = description.into();
        self.questions = questions;
        self.updated_at = now_millis();
        Ok(())
    }

    /// Whether the given member created this template.
    pub fn is_owned_by(&self, member: MemberId) -> bool {
        self.owner == member
    }
}
