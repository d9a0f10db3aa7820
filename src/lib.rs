pub mod config;
pub mod export;
pub mod models;
pub mod scoring;
pub mod share;
pub mod storage;

pub use export::export_to_csv;
pub use models::{
    AnswerValue, BackgroundStyle, CorrectAnswer, Form, FormMode, FormResponse, Question,
    QuestionKind, Theme,
};
pub use scoring::{calculate_score, grade_response, ScoreResult};
pub use share::{decode_form, encode_form, export_file_name, export_form_json, import_form_json};
pub use storage::{
    DocBinStore, FormStore, HybridStore, LocalStore, PostgresStore, StorageError,
};
