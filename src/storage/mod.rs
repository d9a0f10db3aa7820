pub mod docbin;
pub mod hybrid;
pub mod local;
pub mod postgres;

pub use docbin::DocBinStore;
pub use hybrid::HybridStore;
pub use local::LocalStore;
pub use postgres::PostgresStore;

use crate::models::{Form, FormResponse};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend's connection parameters are missing or placeholders.
    /// Routine signal to use the fallback, never surfaced to users.
    #[error("Backend not configured")]
    Unconfigured,
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Persistence contract shared by the relational, document-bin and
/// local fallback backends. Absent records come back as `Ok(None)` or
/// an empty list; errors mean the backend itself misbehaved.
#[async_trait]
pub trait FormStore: Send + Sync {
    /// Inserts the form if its id is unknown, updates it otherwise.
    /// Returns the stored form (the id may be backend-assigned).
    async fn save_form(&self, form: &Form, owner: Option<&str>) -> Result<Form>;

    async fn get_form(&self, id: &str) -> Result<Option<Form>>;

    async fn delete_form(&self, id: &str, owner: Option<&str>) -> Result<()>;

    /// With an owner: that owner's forms. Without: only public forms
    /// for remote backends; everything for the local fallback.
    async fn list_forms(&self, owner: Option<&str>) -> Result<Vec<Form>>;

    async fn save_response(
        &self,
        response: &FormResponse,
        owner: Option<&str>,
    ) -> Result<FormResponse>;

    async fn list_responses(
        &self,
        form_id: Option<&str>,
        owner: Option<&str>,
    ) -> Result<Vec<FormResponse>>;
}
