//! SQLite persistence for members, forms, templates, and reviews.
//!
//! One handle, one connection. Parent aggregates are saved as a whole inside
//! a single transaction: the parent row is upserted, then the child table is
//! diffed against the reconciled in-memory collection — children that kept
//! their id are UPDATEd, id-less children are INSERTed (the fresh rowid is
//! written back into the domain object), and ids no longer present are
//! DELETEd. No read between those steps can observe a partial replacement or
//! a non-contiguous position sequence.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};

use retroform_types::{
    AnswerId, FormId, Member, MemberId, QuestionId, ReviewId, TemplateId,
};

use crate::error::Result;
use crate::form::{Form, Question};
use crate::review::{QuestionAnswer, Review};
use crate::template::Template;

/// Database handle for retroform persistence.
pub struct Db {
    conn: Connection,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS members (
    id INTEGER PRIMARY KEY,
    social_id TEXT NOT NULL UNIQUE,
    nickname TEXT NOT NULL,
    profile_url TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS forms (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    owner_id INTEGER NOT NULL REFERENCES members(id),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_forms_owner ON forms(owner_id, updated_at DESC);

CREATE TABLE IF NOT EXISTS form_questions (
    id INTEGER PRIMARY KEY,
    form_id INTEGER NOT NULL REFERENCES forms(id) ON DELETE CASCADE,
    value TEXT NOT NULL,
    description TEXT NOT NULL,
    position INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_form_questions_form ON form_questions(form_id, position);

CREATE TABLE IF NOT EXISTS templates (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    owner_id INTEGER NOT NULL REFERENCES members(id),
    used_count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_templates_owner ON templates(owner_id, updated_at DESC);

CREATE TABLE IF NOT EXISTS template_questions (
    id INTEGER PRIMARY KEY,
    template_id INTEGER NOT NULL REFERENCES templates(id) ON DELETE CASCADE,
    value TEXT NOT NULL,
    description TEXT NOT NULL,
    position INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_template_questions_template ON template_questions(template_id, position);

-- reviews.form_id carries no foreign key: reviews outlive their source form.
CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    owner_id INTEGER NOT NULL REFERENCES members(id),
    form_id INTEGER NOT NULL,
    is_private INTEGER NOT NULL DEFAULT 0,
    likes INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reviews_owner ON reviews(owner_id, updated_at DESC);
CREATE INDEX IF NOT EXISTS idx_reviews_form ON reviews(form_id, updated_at DESC);
CREATE INDEX IF NOT EXISTS idx_reviews_timeline ON reviews(is_private, updated_at DESC);

CREATE TABLE IF NOT EXISTS question_answers (
    id INTEGER PRIMARY KEY,
    review_id INTEGER NOT NULL REFERENCES reviews(id) ON DELETE CASCADE,
    question_id INTEGER NOT NULL,
    answer TEXT NOT NULL,
    position INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_question_answers_review ON question_answers(review_id, position);
"#;

impl Db {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Insert or update a member, writing the assigned id back.
    pub fn save_member(&self, member: &mut Member) -> Result<MemberId> {
        match member.id {
            Some(id) => {
                self.conn.execute(
                    "UPDATE members SET social_id = ?1, nickname = ?2, profile_url = ?3
                     WHERE id = ?4",
                    params![member.social_id, member.nickname, member.profile_url, id.raw()],
                )?;
                Ok(id)
            }
            None => {
                self.conn.execute(
                    "INSERT INTO members (social_id, nickname, profile_url)
                     VALUES (?1, ?2, ?3)",
                    params![member.social_id, member.nickname, member.profile_url],
                )?;
                let id = MemberId::from_raw(self.conn.last_insert_rowid());
                member.id = Some(id);
                Ok(id)
            }
        }
    }

    /// Get a member by id.
    pub fn find_member(&self, id: MemberId) -> Result<Option<Member>> {
        let member = self
            .conn
            .query_row(
                "SELECT id, social_id, nickname, profile_url FROM members WHERE id = ?1",
                params![id.raw()],
                row_to_member,
            )
            .optional()?;
        Ok(member)
    }

    /// Get a member by their external auth identity.
    pub fn find_member_by_social_id(&self, social_id: &str) -> Result<Option<Member>> {
        let member = self
            .conn
            .query_row(
                "SELECT id, social_id, nickname, profile_url FROM members WHERE social_id = ?1",
                params![social_id],
                row_to_member,
            )
            .optional()?;
        Ok(member)
    }

    // =========================================================================
    // Forms
    // =========================================================================

    /// Whether a form code is already in use.
    pub fn exists_by_code(&self, code: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM forms WHERE code = ?1",
            params![code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert a new form with its questions, writing assigned ids back.
    pub fn insert_form(&self, form: &mut Form) -> Result<FormId> {
        let tx = self.conn.unchecked_transaction()?;
        let id = insert_form_tx(&tx, form)?;
        tx.commit()?;
        Ok(id)
    }

    /// Insert a form created from a template and bump the template's
    /// used_count, atomically.
    pub fn insert_form_from_template(
        &self,
        form: &mut Form,
        template_id: TemplateId,
    ) -> Result<FormId> {
        let tx = self.conn.unchecked_transaction()?;
        let id = insert_form_tx(&tx, form)?;
        tx.execute(
            "UPDATE templates SET used_count = used_count + 1 WHERE id = ?1",
            params![template_id.raw()],
        )?;
        tx.commit()?;
        Ok(id)
    }

    /// Get a form (with questions) by its share code.
    pub fn find_form_by_code(&self, code: &str) -> Result<Option<Form>> {
        let form = self
            .conn
            .query_row(
                "SELECT id, code, title, owner_id, created_at, updated_at
                 FROM forms WHERE code = ?1",
                params![code],
                row_to_form,
            )
            .optional()?;
        self.attach_questions(form)
    }

    /// Get a form (with questions) by id.
    pub fn find_form(&self, id: FormId) -> Result<Option<Form>> {
        let form = self
            .conn
            .query_row(
                "SELECT id, code, title, owner_id, created_at, updated_at
                 FROM forms WHERE id = ?1",
                params![id.raw()],
                row_to_form,
            )
            .optional()?;
        self.attach_questions(form)
    }

    /// All forms created by a member, most recently updated first.
    pub fn forms_by_member(&self, owner: MemberId) -> Result<Vec<Form>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, code, title, owner_id, created_at, updated_at
             FROM forms WHERE owner_id = ?1 ORDER BY updated_at DESC, id DESC",
        )?;
        let forms = stmt
            .query_map(params![owner.raw()], row_to_form)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        forms
            .into_iter()
            .map(|form| self.load_questions(form))
            .collect()
    }

    /// Persist a reconciled form: parent row plus child identity diff, in one
    /// transaction.
    pub fn update_form(&self, form: &mut Form) -> Result<()> {
        let Some(id) = form.id else {
            self.insert_form(form)?;
            return Ok(());
        };
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE forms SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![form.title, form.updated_at as i64, id.raw()],
        )?;
        save_questions(&tx, "form_questions", "form_id", id.raw(), &mut form.questions)?;
        tx.commit()?;
        Ok(())
    }

    /// Delete a form and all its questions.
    pub fn delete_form(&self, id: FormId) -> Result<()> {
        self.conn.execute("DELETE FROM forms WHERE id = ?1", params![id.raw()])?;
        Ok(())
    }

    fn attach_questions(&self, form: Option<Form>) -> Result<Option<Form>> {
        form.map(|form| self.load_questions(form)).transpose()
    }

    fn load_questions(&self, mut form: Form) -> Result<Form> {
        let Some(id) = form.id else {
            return Ok(form);
        };
        form.questions = self.questions_of("form_questions", "form_id", id.raw())?;
        Ok(form)
    }

    fn questions_of(&self, table: &str, parent_col: &str, parent_id: i64) -> Result<Vec<Question>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, value, description, position
             FROM {table} WHERE {parent_col} = ?1 ORDER BY position",
        ))?;
        let questions = stmt
            .query_map(params![parent_id], |row| {
                Ok(Question {
                    id: Some(QuestionId::from_raw(row.get(0)?)),
                    value: row.get(1)?,
                    description: row.get(2)?,
                    position: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(questions)
    }

    // =========================================================================
    // Templates
    // =========================================================================

    /// Insert a new template with its questions, writing assigned ids back.
    pub fn insert_template(&self, template: &mut Template) -> Result<TemplateId> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO templates (title, description, owner_id, used_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                template.title,
                template.description,
                template.owner.raw(),
                template.used_count,
                template.created_at as i64,
                template.updated_at as i64,
            ],
        )?;
        let id = TemplateId::from_raw(tx.last_insert_rowid());
        template.id = Some(id);
        save_questions(&tx, "template_questions", "template_id", id.raw(), &mut template.questions)?;
        tx.commit()?;
        Ok(id)
    }

    /// Get a template (with questions) by id.
    pub fn find_template(&self, id: TemplateId) -> Result<Option<Template>> {
        let template = self
            .conn
            .query_row(
                "SELECT id, title, description, owner_id, used_count, created_at, updated_at
                 FROM templates WHERE id = ?1",
                params![id.raw()],
                row_to_template,
            )
            .optional()?;
        template
            .map(|template| self.load_template_questions(template))
            .transpose()
    }

    /// All templates, most recently updated first.
    pub fn all_templates(&self) -> Result<Vec<Template>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, owner_id, used_count, created_at, updated_at
             FROM templates ORDER BY updated_at DESC, id DESC",
        )?;
        let templates = stmt
            .query_map([], row_to_template)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        templates
            .into_iter()
            .map(|template| self.load_template_questions(template))
            .collect()
    }

    /// All templates created by a member, most recently updated first.
    pub fn templates_by_member(&self, owner: MemberId) -> Result<Vec<Template>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, owner_id, used_count, created_at, updated_at
             FROM templates WHERE owner_id = ?1 ORDER BY updated_at DESC, id DESC",
        )?;
        let templates = stmt
            .query_map(params![owner.raw()], row_to_template)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        templates
            .into_iter()
            .map(|template| self.load_template_questions(template))
            .collect()
    }

    /// Persist a reconciled template, in one transaction.
    pub fn update_template(&self, template: &mut Template) -> Result<()> {
        let Some(id) = template.id else {
            self.insert_template(template)?;
            return Ok(());
        };
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE templates SET title = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            params![template.title, template.description, template.updated_at as i64, id.raw()],
        )?;
        save_questions(&tx, "template_questions", "template_id", id.raw(), &mut template.questions)?;
        tx.commit()?;
        Ok(())
    }

    /// Delete a template and all its questions.
    pub fn delete_template(&self, id: TemplateId) -> Result<()> {
        self.conn.execute("DELETE FROM templates WHERE id = ?1", params![id.raw()])?;
        Ok(())
    }

    fn load_template_questions(&self, mut template: Template) -> Result<Template> {
        let Some(id) = template.id else {
            return Ok(template);
        };
        template.questions = self.questions_of("template_questions", "template_id", id.raw())?;
        Ok(template)
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    /// Insert a new review with its answers, writing assigned ids back.
    pub fn insert_review(&self, review: &mut Review) -> Result<ReviewId> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO reviews (title, owner_id, form_id, is_private, likes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                review.title,
                review.owner.raw(),
                review.form_id.raw(),
                review.is_private,
                review.likes,
                review.created_at as i64,
                review.updated_at as i64,
            ],
        )?;
        let id = ReviewId::from_raw(tx.last_insert_rowid());
        review.id = Some(id);
        save_answers(&tx, id.raw(), &mut review.question_answers)?;
        tx.commit()?;
        Ok(id)
    }

    /// Get a review (with answers) by id.
    pub fn find_review(&self, id: ReviewId) -> Result<Option<Review>> {
        let review = self
            .conn
            .query_row(
                "SELECT id, title, owner_id, form_id, is_private, likes, created_at, updated_at
                 FROM reviews WHERE id = ?1",
                params![id.raw()],
                row_to_review,
            )
            .optional()?;
        review.map(|review| self.load_answers(review)).transpose()
    }

    /// All reviews by a member, most recently updated first.
    pub fn reviews_by_member(&self, owner: MemberId) -> Result<Vec<Review>> {
        self.review_list(
            "SELECT id, title, owner_id, form_id, is_private, likes, created_at, updated_at
             FROM reviews WHERE owner_id = ?1 ORDER BY updated_at DESC, id DESC",
            params![owner.raw()],
        )
    }

    /// All reviews against a form, most recently updated first.
    pub fn reviews_by_form(&self, form_id: FormId) -> Result<Vec<Review>> {
        self.review_list(
            "SELECT id, title, owner_id, form_id, is_private, likes, created_at, updated_at
             FROM reviews WHERE form_id = ?1 ORDER BY updated_at DESC, id DESC",
            params![form_id.raw()],
        )
    }

    /// All public reviews, most recently updated first.
    pub fn timeline(&self) -> Result<Vec<Review>> {
        self.review_list(
            "SELECT id, title, owner_id, form_id, is_private, likes, created_at, updated_at
             FROM reviews WHERE is_private = 0 ORDER BY updated_at DESC, id DESC",
            params![],
        )
    }

    /// Persist a reconciled review, in one transaction.
    pub fn update_review(&self, review: &mut Review) -> Result<()> {
        let Some(id) = review.id else {
            self.insert_review(review)?;
            return Ok(());
        };
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE reviews SET title = ?1, is_private = ?2, likes = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                review.title,
                review.is_private,
                review.likes,
                review.updated_at as i64,
                id.raw(),
            ],
        )?;
        save_answers(&tx, id.raw(), &mut review.question_answers)?;
        tx.commit()?;
        Ok(())
    }

    /// Delete a review and all its answers.
    pub fn delete_review(&self, id: ReviewId) -> Result<()> {
        self.conn.execute("DELETE FROM reviews WHERE id = ?1", params![id.raw()])?;
        Ok(())
    }

    /// Bump a review's like counter and return the new value, or `None` if
    /// the review does not exist.
    pub fn increment_likes(&self, id: ReviewId, count: i64) -> Result<Option<i64>> {
        let changed = self.conn.execute(
            "UPDATE reviews SET likes = likes + ?1 WHERE id = ?2",
            params![count, id.raw()],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        let likes = self.conn.query_row(
            "SELECT likes FROM reviews WHERE id = ?1",
            params![id.raw()],
            |row| row.get(0),
        )?;
        Ok(Some(likes))
    }

    fn review_list(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Review>> {
        let mut stmt = self.conn.prepare(sql)?;
        let reviews = stmt
            .query_map(args, row_to_review)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        reviews
            .into_iter()
            .map(|review| self.load_answers(review))
            .collect()
    }

    fn load_answers(&self, mut review: Review) -> Result<Review> {
        let Some(id) = review.id else {
            return Ok(review);
        };
        let mut stmt = self.conn.prepare(
            "SELECT id, question_id, answer, position
             FROM question_answers WHERE review_id = ?1 ORDER BY position",
        )?;
        review.question_answers = stmt
            .query_map(params![id.raw()], |row| {
                Ok(QuestionAnswer {
                    id: Some(AnswerId::from_raw(row.get(0)?)),
                    question_id: QuestionId::from_raw(row.get(1)?),
                    answer: row.get(2)?,
                    position: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(review)
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn row_to_member(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        id: Some(MemberId::from_raw(row.get(0)?)),
        social_id: row.get(1)?,
        nickname: row.get(2)?,
        profile_url: row.get(3)?,
    })
}

fn row_to_form(row: &Row<'_>) -> rusqlite::Result<Form> {
    Ok(Form {
        id: Some(FormId::from_raw(row.get(0)?)),
        code: row.get(1)?,
        title: row.get(2)?,
        owner: MemberId::from_raw(row.get(3)?),
        questions: Vec::new(),
        created_at: row.get::<_, i64>(4)? as u64,
        updated_at: row.get::<_, i64>(5)? as u64,
    })
}

fn row_to_template(row: &Row<'_>) -> rusqlite::Result<Template> {
    Ok(Template {
        id: Some(TemplateId::from_raw(row.get(0)?)),
        title: row.get(1)?,
        description: row.get(2)?,
        owner: MemberId::from_raw(row.get(3)?),
        questions: Vec::new(),
        used_count: row.get(4)?,
        created_at: row.get::<_, i64>(5)? as u64,
        updated_at: row.get::<_, i64>(6)? as u64,
    })
}

fn row_to_review(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: Some(ReviewId::from_raw(row.get(0)?)),
        title: row.get(1)?,
        owner: MemberId::from_raw(row.get(2)?),
        form_id: FormId::from_raw(row.get(3)?),
        is_private: row.get(4)?,
        question_answers: Vec::new(),
        likes: row.get(5)?,
        created_at: row.get::<_, i64>(6)? as u64,
        updated_at: row.get::<_, i64>(7)? as u64,
    })
}

// =============================================================================
// Child diffing
// =============================================================================

fn insert_form_tx(tx: &Transaction<'_>, form: &mut Form) -> Result<FormId> {
    tx.execute(
        "INSERT INTO forms (code, title, owner_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            form.code,
            form.title,
            form.owner.raw(),
            form.created_at as i64,
            form.updated_at as i64,
        ],
    )?;
    let id = FormId::from_raw(tx.last_insert_rowid());
    form.id = Some(id);
    save_questions(tx, "form_questions", "form_id", id.raw(), &mut form.questions)?;
    Ok(id)
}

/// Diff a parent's persisted questions against the reconciled collection:
/// update kept ids, insert new children (capturing the rowid), delete the
/// rest. Shared by the form and template tables, which have the same shape.
fn save_questions(
    tx: &Transaction<'_>,
    table: &str,
    parent_col: &str,
    parent_id: i64,
    questions: &mut [Question],
) -> Result<()> {
    let kept: HashSet<i64> = questions.iter().filter_map(|q| q.id.map(|id| id.raw())).collect();
    delete_missing_children(tx, table, parent_col, parent_id, &kept)?;

    for question in questions.iter_mut() {
        match question.id {
            Some(id) => {
                tx.execute(
                    &format!(
                        "UPDATE {table} SET value = ?1, description = ?2, position = ?3
                         WHERE id = ?4 AND {parent_col} = ?5",
                    ),
                    params![question.value, question.description, question.position, id.raw(), parent_id],
                )?;
            }
            None => {
                tx.execute(
                    &format!(
                        "INSERT INTO {table} ({parent_col}, value, description, position)
                         VALUES (?1, ?2, ?3, ?4)",
                    ),
                    params![parent_id, question.value, question.description, question.position],
                )?;
                question.id = Some(QuestionId::from_raw(tx.last_insert_rowid()));
            }
        }
    }
    Ok(())
}

/// Same diff for a review's answers.
fn save_answers(
    tx: &Transaction<'_>,
    review_id: i64,
    answers: &mut [QuestionAnswer],
) -> Result<()> {
    let kept: HashSet<i64> = answers.iter().filter_map(|a| a.id.map(|id| id.raw())).collect();
    delete_missing_children(tx, "question_answers", "review_id", review_id, &kept)?;

    for answer in answers.iter_mut() {
        match answer.id {
            Some(id) => {
                tx.execute(
                    "UPDATE question_answers SET question_id = ?1, answer = ?2, position = ?3
                     WHERE id = ?4 AND review_id = ?5",
                    params![answer.question_id.raw(), answer.answer, answer.position, id.raw(), review_id],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO question_answers (review_id, question_id, answer, position)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![review_id, answer.question_id.raw(), answer.answer, answer.position],
                )?;
                answer.id = Some(AnswerId::from_raw(tx.last_insert_rowid()));
            }
        }
    }
    Ok(())
}

fn delete_missing_children(
    tx: &Transaction<'_>,
    table: &str,
    parent_col: &str,
    parent_id: i64,
    kept: &HashSet<i64>,
) -> Result<()> {
    let mut stmt = tx.prepare(&format!("SELECT id FROM {table} WHERE {parent_col} = ?1"))?;
    let existing = stmt
        .query_map(params![parent_id], |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for id in existing.into_iter().filter(|id| !kept.contains(id)) {
        tx.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{QuestionEdit, QuestionPayload};
    use crate::review::{AnswerEdit, AnswerPayload};

    fn member(db: &Db, social_id: &str, nickname: &str) -> MemberId {
        let mut member = Member::new(social_id, nickname, "https://img.example/p");
        db.save_member(&mut member).unwrap()
    }

    fn question_edits(texts: &[&str]) -> Vec<QuestionEdit> {
        texts
            .iter()
            .map(|t| QuestionEdit::create(QuestionPayload::new(*t, "")))
            .collect()
    }

    #[test]
    fn test_member_roundtrip() {
        let db = Db::in_memory().unwrap();
        let id = member(&db, "social-1", "jason");

        let loaded = db.find_member(id).unwrap().unwrap();
        assert_eq!(loaded.nickname, "jason");

        let by_social = db.find_member_by_social_id("social-1").unwrap().unwrap();
        assert_eq!(by_social.id, Some(id));

        assert!(db.find_member(MemberId::from_raw(999)).unwrap().is_none());
    }

    #[test]
    fn test_form_roundtrip_assigns_child_ids() {
        let db = Db::in_memory().unwrap();
        let owner = member(&db, "social-1", "jason");

        let mut form = Form::new(owner, "abcd1234", "retro", question_edits(&["q1", "q2"])).unwrap();
        db.insert_form(&mut form).unwrap();
        assert!(form.id.is_some());
        assert!(form.questions.iter().all(|q| q.id.is_some()));

        let loaded = db.find_form_by_code("abcd1234").unwrap().unwrap();
        assert_eq!(loaded.title, "retro");
        assert_eq!(loaded.questions.len(), 2);
        assert_eq!(loaded.questions[0].value, "q1");
        assert_eq!(loaded.questions[1].position, 1);
        assert!(db.exists_by_code("abcd1234").unwrap());
        assert!(!db.exists_by_code("zzzzzzzz").unwrap());
    }

    #[test]
    fn test_duplicate_code_violates_constraint() {
        let db = Db::in_memory().unwrap();
        let owner = member(&db, "social-1", "jason");

        let mut form1 = Form::new(owner, "abcd1234", "one", vec![]).unwrap();
        db.insert_form(&mut form1).unwrap();

        let mut form2 = Form::new(owner, "abcd1234", "two", vec![]).unwrap();
        let err = db.insert_form(&mut form2).unwrap_err();
        assert!(err.is_unique_violation("forms.code"));
    }

    #[test]
    fn test_update_form_keeps_matched_child_identity() {
        let db = Db::in_memory().unwrap();
        let owner = member(&db, "social-1", "jason");

        let mut form = Form::new(owner, "abcd1234", "retro", question_edits(&["q1", "q2"])).unwrap();
        db.insert_form(&mut form).unwrap();
        let kept_id = form.questions[1].id.unwrap();
        let dropped_id = form.questions[0].id.unwrap();

        form.update(
            "retro v2",
            vec![
                QuestionEdit::update(kept_id, QuestionPayload::new("q2-edited", "")),
                QuestionEdit::create(QuestionPayload::new("q3", "")),
            ],
        )
        .unwrap();
        db.update_form(&mut form).unwrap();

        let loaded = db.find_form_by_code("abcd1234").unwrap().unwrap();
        assert_eq!(loaded.title, "retro v2");
        assert_eq!(loaded.questions.len(), 2);
        assert_eq!(loaded.questions[0].id, Some(kept_id));
        assert_eq!(loaded.questions[0].value, "q2-edited");
        assert_eq!(loaded.questions[0].position, 0);
        assert!(loaded.questions[1].id.is_some());
        assert_ne!(loaded.questions[1].id, Some(dropped_id));
        assert_eq!(loaded.questions[1].position, 1);
    }

    #[test]
    fn test_delete_form_cascades_questions() {
        let db = Db::in_memory().unwrap();
        let owner = member(&db, "social-1", "jason");

        let mut form = Form::new(owner, "abcd1234", "retro", question_edits(&["q1"])).unwrap();
        let id = db.insert_form(&mut form).unwrap();
        db.delete_form(id).unwrap();

        assert!(db.find_form(id).unwrap().is_none());
        let orphans: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM form_questions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn test_form_from_template_is_transactional() {
        let db = Db::in_memory().unwrap();
        let owner = member(&db, "social-1", "jason");

        let mut template =
            Template::new(owner, "blueprint", "d", question_edits(&["q1", "q2"])).unwrap();
        let template_id = db.insert_template(&mut template).unwrap();

        let mut form = Form::from_template(owner, "abcd1234", &template).unwrap();
        db.insert_form_from_template(&mut form, template_id).unwrap();

        let template = db.find_template(template_id).unwrap().unwrap();
        assert_eq!(template.used_count, 1);

        // Copied questions got identities of their own.
        let loaded = db.find_form_by_code("abcd1234").unwrap().unwrap();
        let template_ids: Vec<_> = template.questions.iter().map(|q| q.id).collect();
        assert_eq!(loaded.questions.len(), 2);
        assert!(loaded.questions.iter().all(|q| !template_ids.contains(&q.id)));
    }

    #[test]
    fn test_template_listing() {
        let db = Db::in_memory().unwrap();
        let jason = member(&db, "social-1", "jason");
        let woni = member(&db, "social-2", "woni");

        let mut t1 = Template::new(jason, "t1", "", vec![]).unwrap();
        db.insert_template(&mut t1).unwrap();
        let mut t2 = Template::new(woni, "t2", "", vec![]).unwrap();
        db.insert_template(&mut t2).unwrap();

        assert_eq!(db.all_templates().unwrap().len(), 2);
        let mine = db.templates_by_member(jason).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "t1");
    }

    #[test]
    fn test_review_roundtrip_and_likes() {
        let db = Db::in_memory().unwrap();
        let owner = member(&db, "social-1", "jason");

        let mut form = Form::new(owner, "abcd1234", "retro", question_edits(&["q1"])).unwrap();
        db.insert_form(&mut form).unwrap();
        let question_id = form.questions[0].id.unwrap();

        let mut review = Review::new(
            owner,
            &form,
            "sprint 1",
            false,
            vec![AnswerEdit::create(AnswerPayload::new(question_id, "went well"))],
        )
        .unwrap();
        let id = db.insert_review(&mut review).unwrap();

        let loaded = db.find_review(id).unwrap().unwrap();
        assert_eq!(loaded.title, "sprint 1");
        assert_eq!(loaded.question_answers.len(), 1);
        assert_eq!(loaded.question_answers[0].question_id, question_id);

        assert_eq!(db.increment_likes(id, 2).unwrap(), Some(2));
        assert_eq!(db.increment_likes(id, 3).unwrap(), Some(5));
        assert_eq!(db.increment_likes(ReviewId::from_raw(999), 1).unwrap(), None);
    }

    #[test]
    fn test_timeline_hides_private_reviews() {
        let db = Db::in_memory().unwrap();
        let owner = member(&db, "social-1", "jason");

        let mut form = Form::new(owner, "abcd1234", "retro", question_edits(&["q1"])).unwrap();
        db.insert_form(&mut form).unwrap();
        let question_id = form.questions[0].id.unwrap();

        let mut public = Review::new(
            owner,
            &form,
            "public",
            false,
            vec![AnswerEdit::create(AnswerPayload::new(question_id, "a"))],
        )
        .unwrap();
        db.insert_review(&mut public).unwrap();

        let mut hidden = Review::new(
            owner,
            &form,
            "hidden",
            true,
            vec![AnswerEdit::create(AnswerPayload::new(question_id, "b"))],
        )
        .unwrap();
        db.insert_review(&mut hidden).unwrap();

        let timeline = db.timeline().unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].title, "public");

        let by_form = db.reviews_by_form(form.id.unwrap()).unwrap();
        assert_eq!(by_form.len(), 2);
    }

    #[test]
    fn test_reviews_survive_form_deletion() {
        let db = Db::in_memory().unwrap();
        let owner = member(&db, "social-1", "jason");

        let mut form = Form::new(owner, "abcd1234", "retro", question_edits(&["q1"])).unwrap();
        let form_id = db.insert_form(&mut form).unwrap();
        let question_id = form.questions[0].id.unwrap();

        let mut review = Review::new(
            owner,
            &form,
            "sprint 1",
            false,
            vec![AnswerEdit::create(AnswerPayload::new(question_id, "a"))],
        )
        .unwrap();
        let review_id = db.insert_review(&mut review).unwrap();

        db.delete_form(form_id).unwrap();

        let loaded = db.find_review(review_id).unwrap().unwrap();
        assert_eq!(loaded.question_answers.len(), 1);
        assert_eq!(loaded.form_id, form_id);
    }
}
