use async_trait::async_trait;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tokio::sync::Mutex;

use super::{FormStore, Result, StorageError};
use crate::config::local_data_dir;
use crate::models::{generate_id, now_iso, Form, FormResponse};

// Fixed storage keys; the on-disk files are named after them.
pub const FORMS_KEY: &str = "kuest_forms";
pub const RESPONSES_KEY: &str = "kuest_responses";

/// Last-resort backend: two flat JSON arrays on local disk. Also used
/// by the façade as a best-effort mirror of successful remote writes,
/// so reads keep working offline.
#[derive(Debug)]
pub struct LocalStore {
    dir: PathBuf,
    // File access is whole-file read/rewrite; serialize it.
    lock: Mutex<()>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::with_dir(local_data_dir())
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        LocalStore {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Missing or unreadable files degrade to an empty list rather
    /// than failing the operation.
    fn load<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let path = self.path_for(key);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&text) {
            Ok(items) => items,
            Err(e) => {
                warn!("Discarding corrupt local store {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    fn store<T: Serialize>(&self, key: &str, items: &[T]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let text = serde_json::to_string(items)?;
        fs::write(self.path_for(key), text)?;
        Ok(())
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FormStore for LocalStore {
    async fn save_form(&self, form: &Form, _owner: Option<&str>) -> Result<Form> {
        let _guard = self.lock.lock().await;

        let mut stored = form.clone();
        if stored.id.is_empty() {
            stored.id = generate_id();
        }
        stored.updated_at = now_iso();

        let mut forms: Vec<Form> = self.load(FORMS_KEY);
        match forms.iter_mut().find(|f| f.id == stored.id) {
            Some(existing) => *existing = stored.clone(),
            None => forms.push(stored.clone()),
        }
        self.store(FORMS_KEY, &forms)?;

        info!("Saved form {} locally", stored.id);
        Ok(stored)
    }

    async fn get_form(&self, id: &str) -> Result<Option<Form>> {
        let _guard = self.lock.lock().await;
        let forms: Vec<Form> = self.load(FORMS_KEY);
        Ok(forms.into_iter().find(|f| f.id == id))
    }

    async fn delete_form(&self, id: &str, _owner: Option<&str>) -> Result<()> {
        let _guard = self.lock.lock().await;

        let mut forms: Vec<Form> = self.load(FORMS_KEY);
        let before = forms.len();
        forms.retain(|f| f.id != id);
        if forms.len() == before {
            return Err(StorageError::QueryFailed(format!("Form {} not found", id)));
        }
        self.store(FORMS_KEY, &forms)?;

        // Responses to a deleted form are orphans; drop them too.
        let mut responses: Vec<FormResponse> = self.load(RESPONSES_KEY);
        responses.retain(|r| r.form_id != id);
        self.store(RESPONSES_KEY, &responses)?;

        info!("Deleted form {} locally", id);
        Ok(())
    }

    async fn list_forms(&self, _owner: Option<&str>) -> Result<Vec<Form>> {
        let _guard = self.lock.lock().await;
        // The local store has no ownership concept; everything is visible.
        Ok(self.load(FORMS_KEY))
    }

    async fn save_response(
        &self,
        response: &FormResponse,
        _owner: Option<&str>,
    ) -> Result<FormResponse> {
        let _guard = self.lock.lock().await;

        let mut stored = response.clone();
        if stored.id.is_empty() {
            stored.id = generate_id();
        }

        let mut responses: Vec<FormResponse> = self.load(RESPONSES_KEY);
        // Same id means a reviewer adjusted the final score; replace.
        match responses.iter_mut().find(|r| r.id == stored.id) {
            Some(existing) => *existing = stored.clone(),
            None => responses.push(stored.clone()),
        }
        self.store(RESPONSES_KEY, &responses)?;

        info!("Saved response {} locally", stored.id);
        Ok(stored)
    }

    async fn list_responses(
        &self,
        form_id: Option<&str>,
        _owner: Option<&str>,
    ) -> Result<Vec<FormResponse>> {
        let _guard = self.lock.lock().await;
        let responses: Vec<FormResponse> = self.load(RESPONSES_KEY);
        Ok(match form_id {
            Some(form_id) => responses.into_iter().filter(|r| r.form_id == form_id).collect(),
            None => responses,
        })
    }
}
