//! Review aggregate: answers submitted against a form.
//!
//! A review is written by a member against a form located by its share code.
//! Its children are [`QuestionAnswer`]s — an answer value plus a
//! back-reference to the form question it answers. The back-reference must
//! resolve within the review's source form, and an answer can never be moved
//! to a different question after creation.
//!
//! Reviews outlive their source form: deleting a form keeps its reviews
//! readable and their answer values editable, but adding new answers then
//! fails because there is no form left to validate the question against.

use serde::{Deserialize, Serialize};

use retroform_types::{AnswerId, FormId, MemberId, QuestionId, ReviewId, now_millis};

use crate::error::{Error, Result};
use crate::form::{Form, validate_title};
use crate::reconcile::{ChildRecord, SubmittedEdit, reconcile};

/// Client-supplied content of a question-answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerPayload {
    /// The form question being answered.
    pub question_id: QuestionId,
    /// The answer text. Must be non-empty.
    pub answer: String,
}

impl AnswerPayload {
    pub fn new(question_id: QuestionId, answer: impl Into<String>) -> Self {
        Self { question_id, answer: answer.into() }
    }
}

/// An ordered answer owned by a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    /// Storage identity, absent until persisted.
    pub id: Option<AnswerId>,
    /// The form question this answers. Immutable after creation.
    pub question_id: QuestionId,
    /// The answer text.
    pub answer: String,
    /// Index within the review's sequence. Derived, never client-supplied.
    pub position: i32,
}

impl ChildRecord for QuestionAnswer {
    type Id = AnswerId;
    type Payload = AnswerPayload;

    fn id(&self) -> Option<AnswerId> {
        self.id
    }

    fn create(payload: AnswerPayload) -> Result<Self> {
        validate_answer(&payload.answer)?;
        Ok(QuestionAnswer {
            id: None,
            question_id: payload.question_id,
            answer: payload.answer,
            position: 0,
        })
    }

    fn apply(&mut self, payload: AnswerPayload) -> Result<()> {
        validate_answer(&payload.answer)?;
        if payload.question_id != self.question_id {
            return Err(Error::InvalidArgument(format!(
                "answer {} cannot be moved from question {} to question {}",
                self.id.map(|id| id.to_string()).unwrap_or_else(|| "(new)".into()),
                self.question_id,
                payload.question_id,
            )));
        }
        self.answer = payload.answer;
        Ok(())
    }

    fn set_position(&mut self, position: i32) {
        self.position = position;
    }
}

fn validate_answer(answer: &str) -> Result<()> {
    if answer.trim().is_empty() {
        return Err(Error::InvalidArgument("answer cannot be empty".into()));
    }
    Ok(())
}

/// An edit against a review's answer list.
pub type AnswerEdit = SubmittedEdit<AnswerId, AnswerPayload>;

/// A member's answers to a form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// Storage identity, absent until persisted.
    pub id: Option<ReviewId>,
    /// Review title. Never empty.
    pub title: String,
    /// The authoring member. Set once, never changes.
    pub owner: MemberId,
    /// The form this review answers. May dangle after the form is deleted.
    pub form_id: FormId,
    /// Hidden from the public timeline when set.
    pub is_private: bool,
    /// Ordered answers, positions dense and zero-based.
    pub question_answers: Vec<QuestionAnswer>,
    /// Like counter.
    pub likes: i64,
    /// When the review was created (Unix millis).
    pub created_at: u64,
    /// When the review was last updated (Unix millis).
    pub updated_at: u64,
}

impl Review {
    /// Create a new review against a persisted form.
    ///
    /// Every answered question must belong to `form`; a stale or foreign
    /// question id fails with [`Error::NotFound`].
    pub fn new(
        owner: MemberId,
        form: &Form,
        title: impl Into<String>,
        is_private: bool,
        edits: Vec<AnswerEdit>,
    ) -> Result<Self> {
        let form_id = form.id.ok_or_else(|| {
            Error::InvalidArgument("form must be persisted before it can be reviewed".into())
        })?;
        let title = validate_title(title.into())?;
        check_lineage(&edits, Some(form))?;
        let question_answers = reconcile(Vec::new(), edits)?;
        let now = now_millis();
        Ok(Review {
            id: None,
            title,
            owner,
            form_id,
            is_private,
            question_answers,
            likes: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reconcile the answer list and set the private flag.
    ///
    /// `form` is the review's source form if it still exists. Edits that
    /// create new answers need it for lineage validation; edits that update
    /// existing answers do not, so a review stays editable after its form is
    /// gone as long as no answers are added.
    pub fn update(
        &mut self,
        is_private: bool,
        edits: Vec<AnswerEdit>,
        form: Option<&Form>,
    ) -> Result<()> {
        check_lineage(&edits, form)?;
        let question_answers = reconcile(std::mem::take(&mut self.question_answers), edits)?;
        self.question_answers = question_answers;
        self.is_private = is_private;
        self.updated_at = now_millis();
        Ok(())
    }

    /// Bump the like counter and return the new value.
    pub fn like(&mut self, count: i64) -> i64 {
        self.likes += count;
        self.likes
    }

    /// Whether the given member authored this review.
    pub fn is_owned_by(&self, member: MemberId) -> bool {
        self.owner == member
    }
}

/// Every create-edit must answer a question of the source form.
fn check_lineage(edits: &[AnswerEdit], form: Option<&Form>) -> Result<()> {
    for edit in edits.iter().filter(|e| e.target.is_none()) {
        let question_id = edit.payload.question_id;
        match form {
            Some(form) if form.question(question_id).is_some() => {}
            Some(form) => {
                return Err(Error::NotFound(format!(
                    "question {question_id} is not part of form {}",
                    form.code
                )));
            }
            None => {
                return Err(Error::NotFound(
                    "source form no longer exists; new answers cannot be added".into(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{QuestionEdit, QuestionPayload};

    fn owner() -> MemberId {
        MemberId::from_raw(1)
    }

    fn persisted_form() -> Form {
        let mut form = Form::new(
            owner(),
            "abcd1234",
            "retro",
            vec![
                QuestionEdit::create(QuestionPayload::new("q1", "")),
                QuestionEdit::create(QuestionPayload::new("q2", "")),
            ],
        )
        .unwrap();
        form.id = Some(FormId::from_raw(1));
        form.questions[0].id = Some(QuestionId::from_raw(10));
        form.questions[1].id = Some(QuestionId::from_raw(11));
        form
    }

    #[test]
    fn test_new_review_orders_answers() {
        let form = persisted_form();
        let review = Review::new(
            owner(),
            &form,
            "sprint 1",
            false,
            vec![
                AnswerEdit::create(AnswerPayload::new(QuestionId::from_raw(11), "answer two")),
                AnswerEdit::create(AnswerPayload::new(QuestionId::from_raw(10), "answer one")),
            ],
        )
        .unwrap();

        assert_eq!(review.question_answers.len(), 2);
        assert_eq!(review.question_answers[0].question_id, QuestionId::from_raw(11));
        assert_eq!(review.question_answers[0].position, 0);
        assert_eq!(review.question_answers[1].position, 1);
        assert_eq!(review.likes, 0);
    }

    #[test]
    fn test_foreign_question_rejected() {
        let form = persisted_form();
        let err = Review::new(
            owner(),
            &form,
            "sprint 1",
            false,
            vec![AnswerEdit::create(AnswerPayload::new(QuestionId::from_raw(99), "answer"))],
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_answer_cannot_move_between_questions() {
        let form = persisted_form();
        let mut review = Review::new(
            owner(),
            &form,
            "sprint 1",
            false,
            vec![AnswerEdit::create(AnswerPayload::new(QuestionId::from_raw(10), "answer"))],
        )
        .unwrap();
        review.question_answers[0].id = Some(AnswerId::from_raw(100));

        let err = review
            .update(
                false,
                vec![AnswerEdit::update(
                    AnswerId::from_raw(100),
                    AnswerPayload::new(QuestionId::from_raw(11), "moved"),
                )],
                Some(&form),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_update_without_form_allows_value_edits_only() {
        let form = persisted_form();
        let mut review = Review::new(
            owner(),
            &form,
            "sprint 1",
            false,
            vec![AnswerEdit::create(AnswerPayload::new(QuestionId::from_raw(10), "answer"))],
        )
        .unwrap();
        review.question_answers[0].id = Some(AnswerId::from_raw(100));

        // Value edit works with the form gone.
        review
            .update(
                true,
                vec![AnswerEdit::update(
                    AnswerId::from_raw(100),
                    AnswerPayload::new(QuestionId::from_raw(10), "edited"),
                )],
                None,
            )
            .unwrap();
        assert!(review.is_private);
        assert_eq!(review.question_answers[0].answer, "edited");

        // Adding an answer does not.
        let err = review
            .update(
                true,
                vec![
                    AnswerEdit::update(
                        AnswerId::from_raw(100),
                        AnswerPayload::new(QuestionId::from_raw(10), "edited"),
                    ),
                    AnswerEdit::create(AnswerPayload::new(QuestionId::from_raw(11), "late")),
                ],
                None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_like_accumulates() {
        let form = persisted_form();
        let mut review = Review::new(owner(), &form, "sprint 1", false, vec![]).unwrap();
        assert_eq!(review.like(1), 1);
        assert_eq!(review.like(3), 4);
    }
}
