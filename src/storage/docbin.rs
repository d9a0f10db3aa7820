use async_trait::async_trait;
use log::{error, info, warn};
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{FormStore, Result, StorageError};
use crate::config::DocBinConfig;
use crate::models::{now_iso, Form, FormResponse};

// One HTTP client for the process; per-request headers carry the key.
static HTTP: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .connect_timeout(std::time::Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| Client::new())
});

/// One stored blob: a form plus its embedded response list. The bin id
/// assigned by the service *is* the form id, so a form cannot be
/// silently renamed through this backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinRecord {
    #[serde(rename = "type")]
    kind: String,
    form_data: Form,
    #[serde(default)]
    responses: Vec<FormResponse>,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct BinEnvelope {
    record: BinRecord,
}

#[derive(Debug, Deserialize)]
struct BinMetadata {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedEnvelope {
    metadata: BinMetadata,
}

#[derive(Debug, Deserialize)]
struct CollectionEntry {
    record: String,
}

/// Document-bin backend: each form lives in one opaque JSON blob behind
/// a bins-style HTTP API. Deleting is not supported by design; forms
/// created here are permanent.
#[derive(Debug, Default)]
pub struct DocBinStore;

impl DocBinStore {
    pub fn new() -> Self {
        DocBinStore
    }

    fn settings(&self) -> Result<DocBinConfig> {
        let settings = DocBinConfig::from_env();
        if !settings.is_configured() {
            return Err(StorageError::Unconfigured);
        }
        Ok(settings)
    }

    async fn fetch_record(&self, settings: &DocBinConfig, id: &str) -> Result<Option<BinRecord>> {
        let url = format!("{}/b/{}/latest", settings.base_url, id);
        let response = HTTP
            .get(&url)
            .header("X-Master-Key", &settings.api_key)
            .send()
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StorageError::QueryFailed(format!(
                "Bin fetch returned {}",
                response.status()
            )));
        }

        let envelope: BinEnvelope = response
            .json()
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Bad bin payload: {}", e)))?;
        Ok(Some(envelope.record))
    }

    async fn write_record(
        &self,
        settings: &DocBinConfig,
        id: &str,
        record: &BinRecord,
    ) -> Result<()> {
        let url = format!("{}/b/{}", settings.base_url, id);
        let response = HTTP
            .put(&url)
            .header("X-Master-Key", &settings.api_key)
            .json(record)
            .send()
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::QueryFailed(format!(
                "Bin update returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn create_record(&self, settings: &DocBinConfig, record: &BinRecord) -> Result<String> {
        let url = format!("{}/b", settings.base_url);
        let mut request = HTTP
            .post(&url)
            .header("X-Master-Key", &settings.api_key)
            .header("X-Bin-Private", "true");
        if let Some(collection) = &settings.collection_id {
            request = request.header("X-Collection-Id", collection);
        }

        let response = request
            .json(record)
            .send()
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::QueryFailed(format!(
                "Bin create returned {}",
                response.status()
            )));
        }

        let created: CreatedEnvelope = response
            .json()
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Bad create payload: {}", e)))?;
        Ok(created.metadata.id)
    }

    async fn list_bin_ids(&self, settings: &DocBinConfig) -> Result<Vec<String>> {
        let collection = settings
            .collection_id
            .as_ref()
            .ok_or(StorageError::Unsupported(
                "listing forms requires a collection id",
            ))?;

        let url = format!("{}/c/{}/bins", settings.base_url, collection);
        let response = HTTP
            .get(&url)
            .header("X-Master-Key", &settings.api_key)
            .send()
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::QueryFailed(format!(
                "Collection listing returned {}",
                response.status()
            )));
        }

        let entries: Vec<CollectionEntry> = response
            .json()
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Bad collection payload: {}", e)))?;
        Ok(entries.into_iter().map(|e| e.record).collect())
    }
}

#[async_trait]
impl FormStore for DocBinStore {
    async fn save_form(&self, form: &Form, _owner: Option<&str>) -> Result<Form> {
        let settings = self.settings()?;
        let now = now_iso();

        // Existing bin: rewrite the form in place, keeping its responses.
        if !form.id.is_empty() {
            if let Some(mut record) = self.fetch_record(&settings, &form.id).await? {
                record.form_data = form.clone();
                record.form_data.updated_at = now.clone();
                record.updated_at = now;
                self.write_record(&settings, &form.id, &record).await?;
                info!("Updated form bin {}", form.id);
                return Ok(record.form_data);
            }
        }

        // New form: the service assigns the bin id, which becomes the
        // form id. The client-generated id is discarded.
        let mut record = BinRecord {
            kind: "form".to_string(),
            form_data: form.clone(),
            responses: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };
        let bin_id = self.create_record(&settings, &record).await?;
        record.form_data.id = bin_id.clone();
        self.write_record(&settings, &bin_id, &record).await?;
        info!("Created form bin {}", bin_id);
        Ok(record.form_data)
    }

    async fn get_form(&self, id: &str) -> Result<Option<Form>> {
        let settings = self.settings()?;
        Ok(self
            .fetch_record(&settings, id)
            .await?
            .map(|record| record.form_data))
    }

    async fn delete_form(&self, _id: &str, _owner: Option<&str>) -> Result<()> {
        // Bins are permanent once created. Callers must treat this
        // failure as deterministic, not transient.
        Err(StorageError::Unsupported("document-bin forms cannot be deleted"))
    }

    async fn list_forms(&self, _owner: Option<&str>) -> Result<Vec<Form>> {
        let settings = self.settings()?;
        let ids = self.list_bin_ids(&settings).await?;

        let mut forms = Vec::with_capacity(ids.len());
        for id in ids {
            match self.fetch_record(&settings, &id).await {
                Ok(Some(record)) => forms.push(record.form_data),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable bin {}: {}", id, e),
            }
        }
        Ok(forms)
    }

    async fn save_response(
        &self,
        response: &FormResponse,
        _owner: Option<&str>,
    ) -> Result<FormResponse> {
        let settings = self.settings()?;

        // Read-modify-write on the whole blob. Two near-simultaneous
        // submissions can each read the same prior state and one append
        // will be lost; see DESIGN.md for the known-race discussion.
        let mut record = self
            .fetch_record(&settings, &response.form_id)
            .await?
            .ok_or_else(|| {
                error!("Response save against missing bin {}", response.form_id);
                StorageError::QueryFailed(format!("Form bin {} not found", response.form_id))
            })?;

        record.responses.push(response.clone());
        record.updated_at = now_iso();
        self.write_record(&settings, &response.form_id, &record).await?;

        info!(
            "Appended response {} to form bin {} ({} total)",
            response.id,
            response.form_id,
            record.responses.len()
        );
        Ok(response.clone())
    }

    async fn list_responses(
        &self,
        form_id: Option<&str>,
        _owner: Option<&str>,
    ) -> Result<Vec<FormResponse>> {
        let settings = self.settings()?;

        match form_id {
            Some(id) => Ok(self
                .fetch_record(&settings, id)
                .await?
                .map(|record| record.responses)
                .unwrap_or_default()),
            None => {
                // Without a form id this walks the whole collection.
                let ids = self.list_bin_ids(&settings).await?;
                let mut all = Vec::new();
                for id in ids {
                    if let Some(record) = self.fetch_record(&settings, &id).await? {
                        all.extend(record.responses);
                    }
                }
                Ok(all)
            }
        }
    }
}
