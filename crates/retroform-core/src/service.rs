//! Service layer: orchestration over the domain aggregates and storage.
//!
//! Every mutating operation follows the same shape: load the parent
//! (`NotFound`), check ownership (`Unauthorized`), mutate through the domain
//! layer (which runs the reconciler), persist inside one transaction. The
//! requester always arrives as an explicit [`MemberId`] — there is no ambient
//! "current member".

use tracing::{debug, info};

use retroform_types::{Member, MemberId, ReviewId, TemplateId};

use crate::code::{CODE_LENGTH, generate_unique_code};
use crate::db::Db;
use crate::error::{Error, Result};
use crate::form::{Form, QuestionEdit};
use crate::review::{AnswerEdit, Review};
use crate::template::Template;

/// How many times a form insert is retried when it loses the
/// check-then-insert race on the code's UNIQUE constraint.
const CODE_INSERT_RETRIES: u32 = 3;

/// A create or update request for a form's own fields.
#[derive(Debug, Clone)]
pub struct FormRequest {
    pub title: String,
    pub questions: Vec<QuestionEdit>,
}

/// A create or update request for a template's own fields.
#[derive(Debug, Clone)]
pub struct TemplateRequest {
    pub title: String,
    pub description: String,
    pub questions: Vec<QuestionEdit>,
}

/// Operations on forms.
pub struct FormService<'a> {
    db: &'a Db,
}

impl<'a> FormService<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Create a form, assigning a fresh share code.
    pub fn create(&self, owner: MemberId, request: FormRequest) -> Result<Form> {
        self.require_member(owner)?;
        self.insert_with_code(
            |code| Form::new(owner, code, request.title.as_str(), request.questions.clone()),
            None,
        )
    }

    /// Create a form from a template, bumping the template's used_count in
    /// the same transaction. With `overrides`, the new form takes the given
    /// title and questions instead of the template's.
    pub fn create_from_template(
        &self,
        owner: MemberId,
        template_id: TemplateId,
        overrides: Option<FormRequest>,
    ) -> Result<Form> {
        self.require_member(owner)?;
        let template = self
            .db
            .find_template(template_id)?
            .ok_or_else(|| Error::NotFound(format!("template {template_id}")))?;

        self.insert_with_code(
            |code| match &overrides {
                Some(request) => Form::new(owner, code, request.title.as_str(), request.questions.clone()),
                None => Form::from_template(owner, code, &template),
            },
            Some(template_id),
        )
    }

    /// Get a form by its share code.
    pub fn find_by_code(&self, code: &str) -> Result<Form> {
        self.db
            .find_form_by_code(code)?
            .ok_or_else(|| Error::NotFound(format!("form code {code}")))
    }

    /// All forms created by a member, most recently updated first.
    pub fn find_by_member(&self, member: MemberId) -> Result<Vec<Form>> {
        self.db.forms_by_member(member)
    }

    /// Update a form's title and reconcile its questions.
    pub fn update(&self, requester: MemberId, code: &str, request: FormRequest) -> Result<Form> {
        let mut form = self.find_by_code(code)?;
        if !form.is_owned_by(requester) {
            return Err(Error::Unauthorized(format!(
                "member {requester} cannot modify form {code}"
            )));
        }
        form.update(request.title, request.questions)?;
        self.db.update_form(&mut form)?;
        debug!(code, owner = %form.owner, "form updated");
        Ok(form)
    }

    /// Delete a form and all its questions.
    pub fn delete(&self, requester: MemberId, code: &str) -> Result<()> {
        let form = self.find_by_code(code)?;
        if !form.is_owned_by(requester) {
            return Err(Error::Unauthorized(format!(
                "member {requester} cannot delete form {code}"
            )));
        }
        if let Some(id) = form.id {
            self.db.delete_form(id)?;
        }
        info!(code, "form deleted");
        Ok(())
    }

    /// Generate a code, build the form, and insert it — re-rolling the code
    /// if a concurrent creator wins the UNIQUE race on `forms.code`.
    fn insert_with_code(
        &self,
        build: impl Fn(String) -> Result<Form>,
        from_template: Option<TemplateId>,
    ) -> Result<Form> {
        self.insert_with_codes(build, from_template, || {
            generate_unique_code(CODE_LENGTH, |c| self.db.exists_by_code(c))
        })
    }

    fn insert_with_codes(
        &self,
        build: impl Fn(String) -> Result<Form>,
        from_template: Option<TemplateId>,
        mut next_code: impl FnMut() -> Result<String>,
    ) -> Result<Form> {
        let mut attempts = 0;
        loop {
            let code = next_code()?;
            let mut form = build(code)?;
            let result = match from_template {
                Some(template_id) => self.db.insert_form_from_template(&mut form, template_id),
                None => self.db.insert_form(&mut form),
            };
            match result {
                Ok(_) => {
                    info!(code = %form.code, owner = %form.owner, "form created");
                    return Ok(form);
                }
                Err(err) if err.is_unique_violation("forms.code") => {
                    attempts += 1;
                    if attempts > CODE_INSERT_RETRIES {
                        return Err(Error::CodeGenerationExhausted(attempts));
                    }
                    debug!(code = %form.code, attempts, "code collided on insert, regenerating");
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn require_member(&self, id: MemberId) -> Result<()> {
        self.db
            .find_member(id)?
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("member {id}")))
    }
}

/// Operations on members.
pub struct MemberService<'a> {
    db: &'a Db,
}

impl<'a> MemberService<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Register a member by their external auth identity, or return the
    /// already-registered member with that identity.
    pub fn register(
        &self,
        social_id: &str,
        nickname: &str,
        profile_url: &str,
    ) -> Result<Member> {
        if let Some(existing) = self.db.find_member_by_social_id(social_id)? {
            return Ok(existing);
        }
        validate_nickname(nickname)?;
        let mut member = Member::new(social_id, nickname, profile_url);
        self.db.save_member(&mut member)?;
        info!(id = ?member.id, nickname, "member registered");
        Ok(member)
    }

    /// Get a member by id.
    pub fn find_by_id(&self, id: MemberId) -> Result<Member> {
        self.db
            .find_member(id)?
            .ok_or_else(|| Error::NotFound(format!("member {id}")))
    }

    /// Rename the requesting member. Members can only rename themselves.
    pub fn update_nickname(&self, requester: MemberId, nickname: &str) -> Result<Member> {
        validate_nickname(nickname)?;
        let mut member = self.find_by_id(requester)?;
        member.update_nickname(nickname);
        self.db.save_member(&mut member)?;
        debug!(id = %requester, nickname, "member renamed");
        Ok(member)
    }
}

fn validate_nickname(nickname: &str) -> Result<()> {
    if nickname.trim().is_empty() {
        return Err(Error::InvalidArgument("nickname cannot be empty".into()));
    }
    Ok(())
}

/// Operations on templates.
pub struct TemplateService<'a> {
    db: &'a Db,
}

impl<'a> TemplateService<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Create a template.
    pub fn create(&self, owner: MemberId, request: TemplateRequest) -> Result<Template> {
        self.require_member(owner)?;
        let mut template =
            Template::new(owner, request.title, request.description, request.questions)?;
        self.db.insert_template(&mut template)?;
        info!(id = ?template.id, owner = %owner, "template created");
        Ok(template)
    }

    /// Get a template by id.
    pub fn find_by_id(&self, id: TemplateId) -> Result<Template> {
        self.db
            .find_template(id)?
            .ok_or_else(|| Error::NotFound(format!("template {id}")))
    }

    /// All templates, most recently updated first.
    pub fn find_all(&self) -> Result<Vec<Template>> {
        self.db.all_templates()
    }

    /// All templates created by a member, most recently updated first.
    pub fn find_by_member(&self, member: MemberId) -> Result<Vec<Template>> {
        self.db.templates_by_member(member)
    }

    /// Update a template's fields and reconcile its questions.
    pub fn update(
        &self,
        requester: MemberId,
        id: TemplateId,
        request: TemplateRequest,
    ) -> Result<Template> {
        let mut template = self.find_by_id(id)?;
        if !template.is_owned_by(requester) {
            return Err(Error::Unauthorized(format!(
                "member {requester} cannot modify template {id}"
            )));
        }
        template.update(request.title, request.description, request.questions)?;
        self.db.update_template(&mut template)?;
        debug!(%id, "template updated");
        Ok(template)
    }

    /// Delete a template and all its questions.
    pub fn delete(&self, requester: MemberId, id: TemplateId) -> Result<()> {
        let template = self.find_by_id(id)?;
        if !template.is_owned_by(requester) {
            return Err(Error::Unauthorized(format!(
                "member {requester} cannot delete template {id}"
            )));
        }
        self.db.delete_template(id)?;
        info!(%id, "template deleted");
        Ok(())
    }

    fn require_member(&self, id: MemberId) -> Result<()> {
        self.db
            .find_member(id)?
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("member {id}")))
    }
}

/// Operations on reviews.
pub struct ReviewService<'a> {
    db: &'a Db,
}

impl<'a> ReviewService<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Submit a review against the form with the given share code.
    pub fn create(
        &self,
        owner: MemberId,
        form_code: &str,
        title: &str,
        is_private: bool,
        edits: Vec<AnswerEdit>,
    ) -> Result<Review> {
        self.require_member(owner)?;
        let form = self
            .db
            .find_form_by_code(form_code)?
            .ok_or_else(|| Error::NotFound(format!("form code {form_code}")))?;

        let mut review = Review::new(owner, &form, title, is_private, edits)?;
        self.db.insert_review(&mut review)?;
        info!(id = ?review.id, form = form_code, "review created");
        Ok(review)
    }

    /// Get a review by id.
    pub fn find_by_id(&self, id: ReviewId) -> Result<Review> {
        self.db
            .find_review(id)?
            .ok_or_else(|| Error::NotFound(format!("review {id}")))
    }

    /// All reviews by a member, most recently updated first.
    pub fn find_by_member(&self, member: MemberId) -> Result<Vec<Review>> {
        self.db.reviews_by_member(member)
    }

    /// All reviews against the form with the given share code.
    pub fn find_by_form_code(&self, code: &str) -> Result<Vec<Review>> {
        let form = self
            .db
            .find_form_by_code(code)?
            .ok_or_else(|| Error::NotFound(format!("form code {code}")))?;
        match form.id {
            Some(id) => self.db.reviews_by_form(id),
            None => Ok(Vec::new()),
        }
    }

    /// All public reviews, most recently updated first.
    pub fn timeline(&self) -> Result<Vec<Review>> {
        self.db.timeline()
    }

    /// Reconcile a review's answers and set its private flag.
    ///
    /// The source form is loaded for lineage validation of new answers; if it
    /// was deleted, updates to existing answer values still succeed.
    pub fn update(
        &self,
        requester: MemberId,
        id: ReviewId,
        is_private: bool,
        edits: Vec<AnswerEdit>,
    ) -> Result<Review> {
        let mut review = self.find_by_id(id)?;
        if !review.is_owned_by(requester) {
            return Err(Error::Unauthorized(format!(
                "member {requester} cannot modify review {id}"
            )));
        }
        let form = self.db.find_form(review.form_id)?;
        review.update(is_private, edits, form.as_ref())?;
        self.db.update_review(&mut review)?;
        debug!(%id, "review updated");
        Ok(review)
    }

    /// Delete a review and all its answers.
    pub fn delete(&self, requester: MemberId, id: ReviewId) -> Result<()> {
        let review = self.find_by_id(id)?;
        if !review.is_owned_by(requester) {
            return Err(Error::Unauthorized(format!(
                "member {requester} cannot delete review {id}"
            )));
        }
        self.db.delete_review(id)?;
        info!(%id, "review deleted");
        Ok(())
    }

    /// Bump a review's like counter, returning the new value.
    pub fn like(&self, id: ReviewId, count: i64) -> Result<i64> {
        self.db
            .increment_likes(id, count)?
            .ok_or_else(|| Error::NotFound(format!("review {id}")))
    }

    fn require_member(&self, id: MemberId) -> Result<()> {
        self.db
            .find_member(id)?
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("member {id}")))
    }
}
