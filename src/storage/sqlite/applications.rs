//! SQLite implementation for application storage

use crate::errors::StorageError;
use crate::registry::types::{Application, OAuthClientConfig, Page};
use crate::storage::rows::{
    AppJson, ApplicationRow, OAuthColumns, OAuthConfigJson, from_json_str, map_write_error,
    to_json_string,
};
use crate::storage::traits::{ApplicationStore, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{Row, Transaction};

const SELECT_APPLICATION: &str = r#"
    SELECT a.app_id, a.app_name, a.description, a.auth_flow_graph_id,
           a.registration_flow_graph_id, a.is_registration_flow_enabled, a.branding_id,
           a.app_json, a.created_at, a.updated_at,
           o.client_id, o.consumer_secret, o.oauth_config_json
    FROM applications a
    LEFT JOIN oauth_clients o ON o.deployment_id = a.deployment_id AND o.app_id = a.app_id
"#;

/// SQLite implementation of application storage
pub struct SqliteApplicationStore {
    pool: SqlitePool,
    deployment_id: String,
}

impl SqliteApplicationStore {
    /// Create a new SQLite application store scoped to a deployment
    pub fn new(pool: SqlitePool, deployment_id: String) -> Self {
        Self {
            pool,
            deployment_id,
        }
    }

    fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
    where
        T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
    {
        row.try_get(name)
            .map_err(|e| StorageError::DatabaseError(format!("Failed to get {}: {}", name, e)))
    }

    fn parse_timestamp(value: &str, name: &str) -> Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(value)
            .map_err(|e| StorageError::InvalidData(format!("Invalid {} timestamp: {}", name, e)))?
            .with_timezone(&Utc))
    }

    /// Convert a joined SQLite row to an Application
    fn row_to_application(row: &SqliteRow) -> Result<Application> {
        let app_json: String = Self::column(row, "app_json")?;
        let created_at: String = Self::column(row, "created_at")?;
        let updated_at: String = Self::column(row, "updated_at")?;
        let is_registration_flow_enabled: i64 = Self::column(row, "is_registration_flow_enabled")?;

        let client_id: Option<String> = Self::column(row, "client_id")?;
        let oauth = match client_id {
            Some(client_id) => {
                let config_json: String = Self::column(row, "oauth_config_json")?;
                Some(OAuthColumns {
                    client_id,
                    consumer_secret: Self::column(row, "consumer_secret")?,
                    config: from_json_str::<OAuthConfigJson>(&config_json)?,
                })
            }
            None => None,
        };

        Ok(ApplicationRow {
            id: Self::column(row, "app_id")?,
            name: Self::column(row, "app_name")?,
            description: Self::column(row, "description")?,
            auth_flow_graph_id: Self::column(row, "auth_flow_graph_id")?,
            registration_flow_graph_id: Self::column(row, "registration_flow_graph_id")?,
            is_registration_flow_enabled: is_registration_flow_enabled != 0,
            branding_id: Self::column(row, "branding_id")?,
            app_json: from_json_str::<AppJson>(&app_json)?,
            created_at: Self::parse_timestamp(&created_at, "created_at")?,
            updated_at: Self::parse_timestamp(&updated_at, "updated_at")?,
            oauth,
        }
        .into_application())
    }

    async fn insert_oauth_client(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        client: &OAuthClientConfig,
    ) -> Result<()> {
        let config_json = to_json_string(&OAuthConfigJson::from_client(client))?;
        sqlx::query(
            r#"
            INSERT INTO oauth_clients (deployment_id, client_id, app_id, consumer_secret, oauth_config_json)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.deployment_id)
        .bind(&client.client_id)
        .bind(&client.app_id)
        .bind(&client.hashed_client_secret)
        .bind(&config_json)
        .execute(&mut **tx)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn delete_oauth_client(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        client_id: &str,
    ) -> Result<()> {
        sqlx::query("DELETE FROM oauth_clients WHERE deployment_id = ? AND client_id = ?")
            .bind(&self.deployment_id)
            .bind(client_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ApplicationStore for SqliteApplicationStore {
    async fn create(&self, application: &Application) -> Result<()> {
        let app_json = to_json_string(&AppJson::from_application(application))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO applications (
                deployment_id, app_id, app_name, description, auth_flow_graph_id,
                registration_flow_graph_id, is_registration_flow_enabled, branding_id,
                app_json, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.deployment_id)
        .bind(&application.id)
        .bind(&application.name)
        .bind(&application.description)
        .bind(&application.auth_flow_graph_id)
        .bind(&application.registration_flow_graph_id)
        .bind(if application.is_registration_flow_enabled {
            1i64
        } else {
            0i64
        })
        .bind(&application.branding_id)
        .bind(&app_json)
        .bind(application.created_at.to_rfc3339())
        .bind(application.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        if let Some(client) = application.oauth_client() {
            self.insert_oauth_client(&mut tx, client).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Application>> {
        let sql = format!("{} WHERE a.deployment_id = ? AND a.app_id = ?", SELECT_APPLICATION);
        let row = sqlx::query(&sql)
            .bind(&self.deployment_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_application).transpose()
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Application>> {
        let sql = format!(
            "{} WHERE a.deployment_id = ? AND a.app_name = ?",
            SELECT_APPLICATION
        );
        let row = sqlx::query(&sql)
            .bind(&self.deployment_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_application).transpose()
    }

    async fn get_oauth_client(&self, client_id: &str) -> Result<Option<OAuthClientConfig>> {
        let row = sqlx::query(
            r#"
            SELECT client_id, app_id, consumer_secret, oauth_config_json
            FROM oauth_clients WHERE deployment_id = ? AND client_id = ?
            "#,
        )
        .bind(&self.deployment_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let config_json: String = Self::column(&row, "oauth_config_json")?;
        let config: OAuthConfigJson = from_json_str(&config_json)?;
        Ok(Some(config.into_client(
            Self::column(&row, "app_id")?,
            Self::column(&row, "client_id")?,
            Self::column(&row, "consumer_secret")?,
        )))
    }

    async fn list(&self, page: Option<Page>) -> Result<Vec<Application>> {
        let rows = match page {
            Some(page) => {
                let sql = format!(
                    "{} WHERE a.deployment_id = ? ORDER BY a.created_at, a.app_id LIMIT ? OFFSET ?",
                    SELECT_APPLICATION
                );
                sqlx::query(&sql)
                    .bind(&self.deployment_id)
                    .bind(page.limit as i64)
                    .bind(page.offset as i64)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!(
                    "{} WHERE a.deployment_id = ? ORDER BY a.created_at, a.app_id",
                    SELECT_APPLICATION
                );
                sqlx::query(&sql)
                    .bind(&self.deployment_id)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        rows.iter().map(Self::row_to_application).collect()
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE deployment_id = ?")
                .bind(&self.deployment_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StorageError::DatabaseError(e.to_string()))?;
        Ok(count as usize)
    }

    async fn update(&self, existing: &Application, updated: &Application) -> Result<()> {
        let app_json = to_json_string(&AppJson::from_application(updated))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE applications SET
                app_name = ?, description = ?, auth_flow_graph_id = ?,
                registration_flow_graph_id = ?, is_registration_flow_enabled = ?,
                branding_id = ?, app_json = ?, updated_at = ?
            WHERE deployment_id = ? AND app_id = ?
            "#,
        )
        .bind(&updated.name)
        .bind(&updated.description)
        .bind(&updated.auth_flow_graph_id)
        .bind(&updated.registration_flow_graph_id)
        .bind(if updated.is_registration_flow_enabled {
            1i64
        } else {
            0i64
        })
        .bind(&updated.branding_id)
        .bind(&app_json)
        .bind(updated.updated_at.to_rfc3339())
        .bind(&self.deployment_id)
        .bind(&existing.id)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "Application not found: {}",
                existing.id
            )));
        }

        match (existing.oauth_client(), updated.oauth_client()) {
            (Some(old), Some(new)) if old.client_id == new.client_id => {
                let config_json = to_json_string(&OAuthConfigJson::from_client(new))?;
                sqlx::query(
                    r#"
                    UPDATE oauth_clients SET consumer_secret = ?, oauth_config_json = ?
                    WHERE deployment_id = ? AND client_id = ?
                    "#,
                )
                .bind(&new.hashed_client_secret)
                .bind(&config_json)
                .bind(&self.deployment_id)
                .bind(&new.client_id)
                .execute(&mut *tx)
                .await
                .map_err(map_write_error)?;
            }
            (Some(old), Some(new)) => {
                self.delete_oauth_client(&mut tx, &old.client_id).await?;
                self.insert_oauth_client(&mut tx, new).await?;
            }
            (Some(old), None) => self.delete_oauth_client(&mut tx, &old.client_id).await?,
            (None, Some(new)) => self.insert_oauth_client(&mut tx, new).await?,
            (None, None) => {}
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM oauth_clients WHERE deployment_id = ? AND app_id = ?")
            .bind(&self.deployment_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        let result = sqlx::query("DELETE FROM applications WHERE deployment_id = ? AND app_id = ?")
            .bind(&self.deployment_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "Application not found: {}",
                id
            )));
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}
