//! Retroform command-line binary.
//!
//! Drives the form/template/review services against a local SQLite database.
//! Authentication is out of scope: the acting member is passed explicitly
//! with `--member`, after registering one with `add-member`.
//!
//! Usage:
//!   retroform add-member --social-id 1 --nickname jason
//!   retroform create-form --member 1 --title retro -q "what went well" -q "what to improve"
//!   retroform show-form Xk2f9aQz
//!   retroform update-form Xk2f9aQz --member 1 --title retro -q "12=what went well" -q "new question"
//!   retroform submit-review Xk2f9aQz --member 2 --title "sprint 1" -a "12=we shipped"
//!   retroform timeline

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use retroform_core::{
    AnswerEdit, AnswerPayload, Db, FormRequest, FormService, MemberService, QuestionEdit,
    QuestionPayload, ReviewService, TemplateRequest, TemplateService,
};
use retroform_types::{AnswerId, MemberId, QuestionId, ReviewId, TemplateId};

/// Shareable retrospective forms from the command line.
#[derive(Parser, Debug)]
#[command(name = "retroform")]
#[command(about = "Create question forms, share them by code, collect reviews")]
struct Args {
    /// Database path (defaults to the user data dir).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a member (idempotent per social id).
    AddMember {
        #[arg(long)]
        social_id: String,
        #[arg(long)]
        nickname: String,
        #[arg(long, default_value = "")]
        profile_url: String,
    },
    /// Change a member's nickname.
    SetNickname {
        #[arg(long)]
        member: i64,
        #[arg(long)]
        nickname: String,
    },
    /// Create a form. Questions: "text", "text|description", or "id=text" to
    /// keep an existing question when updating.
    CreateForm {
        #[arg(long)]
        member: i64,
        #[arg(long)]
        title: String,
        #[arg(short, long = "question")]
        questions: Vec<String>,
    },
    /// Show a form by its share code.
    ShowForm { code: String },
    /// List forms created by a member.
    MyForms {
        #[arg(long)]
        member: i64,
    },
    /// Replace a form's title and question list (full replace: unreferenced
    /// questions are deleted).
    UpdateForm {
        code: String,
        #[arg(long)]
        member: i64,
        #[arg(long)]
        title: String,
        #[arg(short, long = "question")]
        questions: Vec<String>,
    },
    /// Delete a form and its questions.
    DeleteForm {
        code: String,
        #[arg(long)]
        member: i64,
    },
    /// Create a template.
    CreateTemplate {
        #[arg(long)]
        member: i64,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(short, long = "question")]
        questions: Vec<String>,
    },
    /// List templates (all, or one member's).
    Templates {
        #[arg(long)]
        member: Option<i64>,
    },
    /// Create a form from a template.
    UseTemplate {
        template: i64,
        #[arg(long)]
        member: i64,
    },
    /// Submit a review against a form. Answers: "question-id=text".
    SubmitReview {
        code: String,
        #[arg(long)]
        member: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        private: bool,
        #[arg(short, long = "answer")]
        answers: Vec<String>,
    },
    /// Replace a review's answers. Answers: "question-id=text" for new ones,
    /// "answer-id@question-id=text" to keep an existing answer.
    UpdateReview {
        review: i64,
        #[arg(long)]
        member: i64,
        #[arg(long)]
        private: bool,
        #[arg(short, long = "answer")]
        answers: Vec<String>,
    },
    /// Delete a review.
    DeleteReview {
        review: i64,
        #[arg(long)]
        member: i64,
    },
    /// List reviews by member or by form code.
    Reviews {
        #[arg(long)]
        member: Option<i64>,
        #[arg(long)]
        form: Option<String>,
    },
    /// All public reviews, most recently updated first.
    Timeline,
    /// Like a review.
    Like {
        review: i64,
        #[arg(long, default_value_t = 1)]
        count: i64,
    },
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("retroform")
        .join("retroform.db")
}

/// Parse "text", "text|description", or "id=text[|description]".
fn parse_question(spec: &str) -> Result<QuestionEdit> {
    let (target, rest) = split_id_prefix(spec, '=');
    let (value, description) = match rest.split_once('|') {
        Some((value, description)) => (value, description),
        None => (rest, ""),
    };
    let payload = QuestionPayload::new(value, description);
    Ok(match target {
        Some(id) => QuestionEdit::update(QuestionId::from_raw(id), payload),
        None => QuestionEdit::create(payload),
    })
}

/// Parse "question-id=text" or "answer-id@question-id=text".
fn parse_answer(spec: &str) -> Result<AnswerEdit> {
    let (answer_id, rest) = split_id_prefix(spec, '@');
    let Some((question, text)) = rest.split_once('=') else {
        bail!("answer must look like question-id=text, got {spec:?}");
    };
    let question_id: i64 = question
        .trim()
        .parse()
        .with_context(|| format!("bad question id in {spec:?}"))?;
    let payload = AnswerPayload::new(QuestionId::from_raw(question_id), text);
    Ok(match answer_id {
        Some(id) => AnswerEdit::update(AnswerId::from_raw(id), payload),
        None => AnswerEdit::create(payload),
    })
}

/// Split a leading "<digits><sep>" prefix off a spec, if present.
fn split_id_prefix(spec: &str, sep: char) -> (Option<i64>, &str) {
    if let Some((head, rest)) = spec.split_once(sep) {
        if let Ok(id) = head.trim().parse::<i64>() {
            return (Some(id), rest);
        }
    }
    (None, spec)
}

fn parse_questions(specs: &[String]) -> Result<Vec<QuestionEdit>> {
    specs.iter().map(|s| parse_question(s)).collect()
}

fn parse_answers(specs: &[String]) -> Result<Vec<AnswerEdit>> {
    specs.iter().map(|s| parse_answer(s)).collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let path = args.db.unwrap_or_else(default_db_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let db = Db::open(&path).with_context(|| format!("opening {}", path.display()))?;
    tracing::debug!(db = %path.display(), "database opened");

    let members = MemberService::new(&db);
    let forms = FormService::new(&db);
    let templates = TemplateService::new(&db);
    let reviews = ReviewService::new(&db);

    match args.command {
        Command::AddMember { social_id, nickname, profile_url } => {
            print_json(&members.register(&social_id, &nickname, &profile_url)?)?;
        }
        Command::SetNickname { member, nickname } => {
            print_json(&members.update_nickname(MemberId::from_raw(member), &nickname)?)?;
        }
        Command::CreateForm { member, title, questions } => {
            let form = forms.create(
                MemberId::from_raw(member),
                FormRequest { title, questions: parse_questions(&questions)? },
            )?;
            print_json(&form)?;
        }
        Command::ShowForm { code } => {
            print_json(&forms.find_by_code(&code)?)?;
        }
        Command::MyForms { member } => {
            print_json(&forms.find_by_member(MemberId::from_raw(member))?)?;
        }
        Command::UpdateForm { code, member, title, questions } => {
            let form = forms.update(
                MemberId::from_raw(member),
                &code,
                FormRequest { title, questions: parse_questions(&questions)? },
            )?;
            print_json(&form)?;
        }
        Command::DeleteForm { code, member } => {
            forms.delete(MemberId::from_raw(member), &code)?;
            eprintln!("deleted form {code}");
        }
        Command::CreateTemplate { member, title, description, questions } => {
            let template = templates.create(
                MemberId::from_raw(member),
                TemplateRequest { title, description, questions: parse_questions(&questions)? },
            )?;
            print_json(&template)?;
        }
        Command::Templates { member } => match member {
            Some(member) => {
                print_json(&templates.find_by_member(MemberId::from_raw(member))?)?;
            }
            None => print_json(&templates.find_all()?)?,
        },
        Command::UseTemplate { template, member } => {
            let form = forms.create_from_template(
                MemberId::from_raw(member),
                TemplateId::from_raw(template),
                None,
            )?;
            print_json(&form)?;
        }
        Command::SubmitReview { code, member, title, private, answers } => {
            let review = reviews.create(
                MemberId::from_raw(member),
                &code,
                &title,
                private,
                parse_answers(&answers)?,
            )?;
            print_json(&review)?;
        }
        Command::UpdateReview { review, member, private, answers } => {
            let review = reviews.update(
                MemberId::from_raw(member),
                ReviewId::from_raw(review),
                private,
                parse_answers(&answers)?,
            )?;
            print_json(&review)?;
        }
        Command::DeleteReview { review, member } => {
            reviews.delete(MemberId::from_raw(member), ReviewId::from_raw(review))?;
            eprintln!("deleted review {review}");
        }
        Command::Reviews { member, form } => match (member, form) {
            (Some(member), _) => {
                print_json(&reviews.find_by_member(MemberId::from_raw(member))?)?;
            }
            (None, Some(code)) => print_json(&reviews.find_by_form_code(&code)?)?,
            (None, None) => bail!("pass --member or --form"),
        },
        Command::Timeline => {
            print_json(&reviews.timeline()?)?;
        }
        Command::Like { review, count } => {
            let likes = reviews.like(ReviewId::from_raw(review), count)?;
            println!("{likes}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_question_variants() {
        let edit = parse_question("what went well").unwrap();
        assert!(edit.target.is_none());
        assert_eq!(edit.payload.value, "what went well");
        assert_eq!(edit.payload.description, "");

        let edit = parse_question("keep|say more").unwrap();
        assert_eq!(edit.payload.value, "keep");
        assert_eq!(edit.payload.description, "say more");

        let edit = parse_question("12=edited text").unwrap();
        assert_eq!(edit.target, Some(QuestionId::from_raw(12)));
        assert_eq!(edit.payload.value, "edited text");
    }

    #[test]
    fn test_parse_question_with_equals_in_text() {
        // A non-numeric head is not an id prefix.
        let edit = parse_question("a=b").unwrap();
        assert!(edit.target.is_none());
        assert_eq!(edit.payload.value, "a=b");
    }

    #[test]
    fn test_parse_answer_variants() {
        let edit = parse_answer("12=we shipped").unwrap();
        assert!(edit.target.is_none());
        assert_eq!(edit.payload.question_id, QuestionId::from_raw(12));
        assert_eq!(edit.payload.answer, "we shipped");

        let edit = parse_answer("7@12=we shipped more").unwrap();
        assert_eq!(edit.target, Some(AnswerId::from_raw(7)));
        assert_eq!(edit.payload.question_id, QuestionId::from_raw(12));

        assert!(parse_answer("no separator").is_err());
    }
}
