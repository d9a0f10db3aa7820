use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Passing mark applied when a questionnaire does not set one.
pub const DEFAULT_PASSING_MARK: u32 = 70;

pub const DEFAULT_ACCENT_COLOR: &str = "#7c3aed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Default,
    Dark,
    Gradient,
    Minimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundStyle {
    #[default]
    Solid,
    Gradient,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FormMode {
    #[default]
    Standard,
    Questionnaire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    Text,
    Paragraph,
    MultipleChoice,
    Checkbox,
    Rating,
}

impl QuestionKind {
    /// Only choice-style questions participate in scoring.
    pub fn is_scoreable(self) -> bool {
        matches!(self, QuestionKind::MultipleChoice | QuestionKind::Checkbox)
    }
}

/// Correct-answer specification. A single string means exactly-one-answer
/// grading; a list means set-equality grading (order irrelevant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    One(String),
    Many(Vec<String>),
}

impl CorrectAnswer {
    pub fn is_empty(&self) -> bool {
        match self {
            CorrectAnswer::One(s) => s.is_empty(),
            CorrectAnswer::Many(v) => v.is_empty(),
        }
    }
}

/// A respondent's answer to one question. Checkbox questions collect a
/// list; everything else collects a single string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Many(Vec<String>),
}

impl AnswerValue {
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Text(s) => s.is_empty(),
            AnswerValue::Many(v) => v.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_scale: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<CorrectAnswer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default = "now_iso")]
    pub created_at: String,
    #[serde(default = "now_iso")]
    pub updated_at: String,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_accent_color")]
    pub accent_color: String,
    #[serde(default)]
    pub background_style: BackgroundStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default)]
    pub mode: FormMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passing_mark: Option<u32>,
}

impl Form {
    pub fn new(title: impl Into<String>) -> Self {
        let now = now_iso();
        Form {
            id: generate_id(),
            title: title.into(),
            description: String::new(),
            questions: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
            theme: Theme::default(),
            accent_color: default_accent_color(),
            background_style: BackgroundStyle::default(),
            background_color: None,
            mode: FormMode::default(),
            passing_mark: None,
        }
    }

    /// Effective passing mark, falling back to the product default.
    pub fn effective_passing_mark(&self) -> u32 {
        self.passing_mark.unwrap_or(DEFAULT_PASSING_MARK)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormResponse {
    pub id: String,
    pub form_id: String,
    #[serde(default)]
    pub answers: HashMap<String, AnswerValue>,
    #[serde(default = "now_iso")]
    pub submitted_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preliminary_score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<i64>,
}

impl FormResponse {
    pub fn new(form_id: impl Into<String>) -> Self {
        FormResponse {
            id: generate_id(),
            form_id: form_id.into(),
            answers: HashMap::new(),
            submitted_at: now_iso(),
            student_name: None,
            preliminary_score: None,
            final_score: None,
            max_score: None,
        }
    }
}

/// Short random alphanumeric token used for form/response ids. Not
/// cryptographically unique; collision probability is accepted.
pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect()
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

fn default_accent_color() -> String {
    DEFAULT_ACCENT_COLOR.to_string()
}
