use sqlx::PgPool;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

pub const LATEST_SCHEMA_VERSION: i32 = 1;

/// Applies `schema/<n>/` scripts in version order. A fresh database runs
/// `init_schema.sql` of the first pending version, later ones `update_schema.sql`.
pub struct MigrationTool {
    schema_path: PathBuf,
}

/// Splits a script into statements. `--` comment lines are dropped first.
pub fn split_statements(contents: &str) -> Vec<String> {
    let without_comments: String = contents
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    without_comments
        .split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .map(str::to_string)
        .collect()
}

impl MigrationTool {
    pub fn new(schema_path: PathBuf) -> Self {
        tracing::debug!("Migration tool using {}", schema_path.display());
        Self { schema_path }
    }

    async fn ensure_migration_table(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                db INT PRIMARY KEY,
                version INT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(pool)
        .await
        .map_err(|e| AppError::Internal(format!("Unable to create schema_version table: {}", e)))?;
        Ok(())
    }

    async fn get_current_version(&self, pool: &PgPool) -> Result<i32> {
        let version: Option<i32> =
            sqlx::query_scalar("SELECT version FROM schema_version WHERE db = 0")
                .fetch_optional(pool)
                .await?;
        Ok(version.unwrap_or(0))
    }

    async fn set_version(&self, pool: &PgPool, version: i32) -> Result<()> {
        sqlx::query(
            "INSERT INTO schema_version (db, version, applied_at) VALUES (0, $1, NOW())
             ON CONFLICT (db) DO UPDATE SET version = EXCLUDED.version, applied_at = NOW()",
        )
        .bind(version)
        .execute(pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to set schema_version to {}: {}", version, e)))?;
        Ok(())
    }

    async fn execute_sql_file(&self, pool: &PgPool, file_path: &Path) -> Result<()> {
        let contents = fs::read_to_string(file_path)
            .map_err(|e| AppError::Internal(format!("Failed to read {}: {}", file_path.display(), e)))?;

        let mut tx = pool.begin().await?;
        for statement in split_statements(&contents) {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Internal(format!("Error executing SQL `{}`: {}", statement, e)))?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Version directories under the schema path, ascending.
    pub fn available_versions(&self) -> Result<Vec<i32>> {
        let mut versions: Vec<i32> = fs::read_dir(&self.schema_path)
            .map_err(|e| {
                AppError::Internal(format!(
                    "Unable to read schema directory {}: {}",
                    self.schema_path.display(),
                    e
                ))
            })?
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                if !path.is_dir() {
                    return None;
                }
                path.file_name()?.to_string_lossy().parse::<i32>().ok()
            })
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    /// Script to run to move from `current` to `version`, if one exists.
    pub fn script_for(&self, current: i32, version: i32) -> Option<PathBuf> {
        let name = if current == 0 {
            "init_schema.sql"
        } else {
            "update_schema.sql"
        };
        let path = self.schema_path.join(version.to_string()).join(name);
        path.exists().then_some(path)
    }

    /// Migrates from the recorded version up to `target_version`; returns the version reached.
    pub async fn migrate_to_version(&self, pool: &PgPool, target_version: i32) -> Result<i32> {
        self.ensure_migration_table(pool).await?;

        let mut current_version = self.get_current_version(pool).await?;
        tracing::info!("Current DB version is: {}", current_version);

        for v in self.available_versions()? {
            if v <= current_version || v > target_version {
                continue;
            }
            match self.script_for(current_version, v) {
                Some(script) => {
                    tracing::info!("Upgrading from {} to {} with {}", current_version, v, script.display());
                    self.execute_sql_file(pool, &script).await?;
                }
                None => tracing::warn!("No migration script for version {} - skipping.", v),
            }
            self.set_version(pool, v).await?;
            current_version = v;
        }

        if current_version < target_version {
            tracing::warn!(
                "No more migration scripts found, but target_version={} > current_version={}",
                target_version,
                current_version
            );
        } else {
            tracing::info!("Migration completed. DB is now at version {}", current_version);
        }
        Ok(current_version)
    }
}
