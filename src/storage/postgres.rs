use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, Runtime};
use log::{error, info};
use serde_json::Value;
use tokio_postgres::NoTls;

use super::{FormStore, Result, StorageError};
use crate::config::PostgresConfig;
use crate::models::{
    generate_id, now_iso, AnswerValue, BackgroundStyle, Form, FormMode, FormResponse, Question,
    Theme, DEFAULT_ACCENT_COLOR,
};
use std::collections::HashMap;

/// Relational backend. Maps forms and responses onto two tables with
/// snake_case columns and JSONB blobs for the nested collections.
///
/// Connection parameters are read from the environment on every
/// operation, so a deployment can be pointed at a database without
/// restarting the process.
#[derive(Debug, Default)]
pub struct PostgresStore;

impl PostgresStore {
    pub fn new() -> Self {
        PostgresStore
    }

    async fn connect(&self) -> Result<Pool> {
        let settings = PostgresConfig::from_env();
        if !settings.is_configured() {
            return Err(StorageError::Unconfigured);
        }

        let mut cfg = Config::new();
        cfg.host = Some(settings.host);
        cfg.port = Some(settings.port);
        cfg.dbname = Some(settings.dbname);
        cfg.user = Some(settings.user);
        cfg.password = Some(settings.password);
        cfg.manager = Some(deadpool_postgres::ManagerConfig {
            recycling_method: deadpool_postgres::RecyclingMethod::Fast,
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StorageError::ConnectionFailed(format!("Pool creation failed: {}", e)))
    }

    async fn client(&self) -> Result<deadpool_postgres::Object> {
        let pool = self.connect().await?;
        pool.get()
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))
    }
}

#[async_trait]
impl FormStore for PostgresStore {
    async fn save_form(&self, form: &Form, owner: Option<&str>) -> Result<Form> {
        let client = self.client().await?;

        let mut stored = form.clone();
        if stored.id.is_empty() {
            stored.id = generate_id();
        }
        stored.updated_at = now_iso();

        let questions = serde_json::to_value(&stored.questions)?;
        let theme = enum_str(&stored.theme)?;
        let background_style = enum_str(&stored.background_style)?;
        let mode = enum_str(&stored.mode)?;
        let passing_mark = stored.passing_mark.map(|m| m as i32);
        // Anonymous saves are shareable by link only, but they are the
        // rows an ownerless list can see.
        let is_public = owner.is_none();

        let updated = client
            .execute(
                r#"
                UPDATE forms
                SET title = $2, description = $3, questions = $4, updated_at = $5,
                    theme = $6, accent_color = $7, background_style = $8,
                    background_color = $9, mode = $10, passing_mark = $11
                WHERE id = $1
                "#,
                &[
                    &stored.id,
                    &stored.title,
                    &stored.description,
                    &questions,
                    &stored.updated_at,
                    &theme,
                    &stored.accent_color,
                    &background_style,
                    &stored.background_color,
                    &mode,
                    &passing_mark,
                ],
            )
            .await
            .map_err(|e| {
                error!("Failed to update form {}: {}", stored.id, e);
                StorageError::QueryFailed(format!("Failed to update form: {}", e))
            })?;

        if updated == 0 {
            client
                .execute(
                    r#"
                    INSERT INTO forms
                    (id, title, description, questions, created_at, updated_at,
                     theme, accent_color, background_style, background_color,
                     mode, passing_mark, user_id, is_public)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                    "#,
                    &[
                        &stored.id,
                        &stored.title,
                        &stored.description,
                        &questions,
                        &stored.created_at,
                        &stored.updated_at,
                        &theme,
                        &stored.accent_color,
                        &background_style,
                        &stored.background_color,
                        &mode,
                        &passing_mark,
                        &owner,
                        &is_public,
                    ],
                )
                .await
                .map_err(|e| {
                    error!("Failed to insert form {}: {}", stored.id, e);
                    StorageError::QueryFailed(format!("Failed to insert form: {}", e))
                })?;
        }

        info!("Saved form {} to postgres", stored.id);
        Ok(stored)
    }

    async fn get_form(&self, id: &str) -> Result<Option<Form>> {
        let client = self.client().await?;

        let row = client
            .query_opt(
                r#"
                SELECT id, title, description, questions, created_at, updated_at,
                       theme, accent_color, background_style, background_color,
                       mode, passing_mark
                FROM forms
                WHERE id = $1
                "#,
                &[&id],
            )
            .await
            .map_err(|e| {
                error!("Failed to fetch form {}: {}", id, e);
                StorageError::QueryFailed(format!("Failed to fetch form: {}", e))
            })?;

        Ok(row.map(form_from_row))
    }

    async fn delete_form(&self, id: &str, owner: Option<&str>) -> Result<()> {
        let client = self.client().await?;

        let deleted = match owner {
            Some(owner) => client
                .execute(
                    "DELETE FROM forms WHERE id = $1 AND user_id = $2",
                    &[&id, &owner],
                )
                .await,
            None => client.execute("DELETE FROM forms WHERE id = $1", &[&id]).await,
        }
        .map_err(|e| {
            error!("Failed to delete form {}: {}", id, e);
            StorageError::QueryFailed(format!("Failed to delete form: {}", e))
        })?;

        if deleted == 0 {
            return Err(StorageError::QueryFailed(format!(
                "Form {} not found or not owned by caller",
                id
            )));
        }

        info!("Deleted form {} from postgres", id);
        Ok(())
    }

    async fn list_forms(&self, owner: Option<&str>) -> Result<Vec<Form>> {
        let client = self.client().await?;

        let base = r#"
            SELECT id, title, description, questions, created_at, updated_at,
                   theme, accent_color, background_style, background_color,
                   mode, passing_mark
            FROM forms
        "#;

        let rows = match owner {
            Some(owner) => {
                let query = format!("{} WHERE user_id = $1 ORDER BY updated_at DESC", base);
                client.query(query.as_str(), &[&owner]).await
            }
            None => {
                let query = format!("{} WHERE is_public ORDER BY updated_at DESC", base);
                client.query(query.as_str(), &[]).await
            }
        }
        .map_err(|e| {
            error!("Failed to list forms: {}", e);
            StorageError::QueryFailed(format!("Failed to list forms: {}", e))
        })?;

        Ok(rows.into_iter().map(form_from_row).collect())
    }

    async fn save_response(
        &self,
        response: &FormResponse,
        owner: Option<&str>,
    ) -> Result<FormResponse> {
        let client = self.client().await?;

        let mut stored = response.clone();
        if stored.id.is_empty() {
            stored.id = generate_id();
        }

        let answers = serde_json::to_value(&stored.answers)?;
        let preliminary = stored.preliminary_score;
        let fin = stored.final_score;
        let max = stored.max_score;

        client
            .execute(
                r#"
                INSERT INTO form_responses
                (id, form_id, responses, submitted_at, student_name,
                 preliminary_score, final_score, max_score, user_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO UPDATE SET final_score = EXCLUDED.final_score
                "#,
                &[
                    &stored.id,
                    &stored.form_id,
                    &answers,
                    &stored.submitted_at,
                    &stored.student_name,
                    &preliminary,
                    &fin,
                    &max,
                    &owner,
                ],
            )
            .await
            .map_err(|e| {
                error!("Failed to save response {}: {}", stored.id, e);
                StorageError::QueryFailed(format!("Failed to save response: {}", e))
            })?;

        info!("Saved response {} for form {}", stored.id, stored.form_id);
        Ok(stored)
    }

    async fn list_responses(
        &self,
        form_id: Option<&str>,
        owner: Option<&str>,
    ) -> Result<Vec<FormResponse>> {
        let client = self.client().await?;

        let base = r#"
            SELECT id, form_id, responses, submitted_at, student_name,
                   preliminary_score, final_score, max_score
            FROM form_responses
        "#;

        let rows = match (form_id, owner) {
            (Some(form_id), Some(owner)) => {
                let query = format!(
                    "{} WHERE form_id = $1 AND user_id = $2 ORDER BY submitted_at ASC",
                    base
                );
                client.query(query.as_str(), &[&form_id, &owner]).await
            }
            (Some(form_id), None) => {
                let query = format!("{} WHERE form_id = $1 ORDER BY submitted_at ASC", base);
                client.query(query.as_str(), &[&form_id]).await
            }
            (None, Some(owner)) => {
                let query = format!("{} WHERE user_id = $1 ORDER BY submitted_at ASC", base);
                client.query(query.as_str(), &[&owner]).await
            }
            (None, None) => {
                let query = format!("{} ORDER BY submitted_at ASC", base);
                client.query(query.as_str(), &[]).await
            }
        }
        .map_err(|e| {
            error!("Failed to list responses: {}", e);
            StorageError::QueryFailed(format!("Failed to list responses: {}", e))
        })?;

        Ok(rows.into_iter().map(response_from_row).collect())
    }
}

/// Serializes one of the wire enums to its lowercase column string.
fn enum_str<T: serde::Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        Value::String(s) => Ok(s),
        other => Err(StorageError::QueryFailed(format!(
            "Unexpected enum encoding: {}",
            other
        ))),
    }
}

/// Parses a lowercase column string back into a wire enum, backfilling
/// the default for rows written before the column existed.
fn enum_from_str<T: serde::de::DeserializeOwned + Default>(value: Option<String>) -> T {
    value
        .and_then(|s| serde_json::from_value(Value::String(s)).ok())
        .unwrap_or_default()
}

fn form_from_row(row: tokio_postgres::Row) -> Form {
    let questions: Value = row.get("questions");
    let questions: Vec<Question> = serde_json::from_value(questions).unwrap_or_default();

    let theme: Option<String> = row.get("theme");
    let background_style: Option<String> = row.get("background_style");
    let mode: Option<String> = row.get("mode");
    let accent_color: Option<String> = row.get("accent_color");
    let passing_mark: Option<i32> = row.get("passing_mark");

    let description: Option<String> = row.get("description");

    Form {
        id: row.get("id"),
        title: row.get("title"),
        description: description.unwrap_or_default(),
        questions,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        theme: enum_from_str::<Theme>(theme),
        accent_color: accent_color.unwrap_or_else(|| DEFAULT_ACCENT_COLOR.to_string()),
        background_style: enum_from_str::<BackgroundStyle>(background_style),
        background_color: row.get("background_color"),
        mode: enum_from_str::<FormMode>(mode),
        passing_mark: passing_mark.map(|m| m as u32),
    }
}

fn response_from_row(row: tokio_postgres::Row) -> FormResponse {
    let answers: Value = row.get("responses");
    let answers: HashMap<String, AnswerValue> = serde_json::from_value(answers).unwrap_or_default();

    FormResponse {
        id: row.get("id"),
        form_id: row.get("form_id"),
        answers,
        submitted_at: row.get("submitted_at"),
        student_name: row.get("student_name"),
        preliminary_score: row.get("preliminary_score"),
        final_score: row.get("final_score"),
        max_score: row.get("max_score"),
    }
}
