// config.rs
// YAML config file + CLI overrides, resolved into an export request.

use crate::db::models::{ExportMode, ExportRequest, TableSelection};
use crate::error::{ExportError, Result};
use crate::export::orchestrator::{ExportOptions, ScriptHeader};
use crate::export::structure::StructureOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_PORT: u16 = 5432;

/// Every field is optional so a file and the command line can each supply
/// part of the configuration.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub connection_string: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub schema: Option<String>,
    pub tables: Option<Vec<String>>,
    pub mode: Option<String>,
    pub batch_size: Option<usize>,
    pub output: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub drop_existing: Option<bool>,
    pub header: Option<bool>,
}

impl ExportConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| ExportError::configuration(format!("Invalid config file: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExportError::configuration(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Field-wise merge; values present in `overrides` win.
    pub fn merge(self, overrides: ExportConfig) -> ExportConfig {
        ExportConfig {
            connection_string: overrides.connection_string.or(self.connection_string),
            host: overrides.host.or(self.host),
            port: overrides.port.or(self.port),
            database: overrides.database.or(self.database),
            user: overrides.user.or(self.user),
            password: overrides.password.or(self.password),
            schema: overrides.schema.or(self.schema),
            tables: overrides.tables.or(self.tables),
            mode: overrides.mode.or(self.mode),
            batch_size: overrides.batch_size.or(self.batch_size),
            output: overrides.output.or(self.output),
            manifest: overrides.manifest.or(self.manifest),
            drop_existing: overrides.drop_existing.or(self.drop_existing),
            header: overrides.header.or(self.header),
        }
    }

    pub fn schema(&self) -> &str {
        self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }

    pub fn to_request(&self) -> Result<ExportRequest> {
        let mode = match &self.mode {
            Some(mode) => ExportMode::from_str(mode)?,
            None => ExportMode::Both,
        };
        let tables = match &self.tables {
            None => TableSelection::All,
            Some(names) => TableSelection::Named(names.iter().map(|t| t.trim().to_string()).collect()),
        };
        ExportRequest::new(
            self.schema(),
            tables,
            mode,
            self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        )
    }

    pub fn export_options(&self, generated_at: Option<DateTime<Utc>>) -> Result<ExportOptions> {
        let header = if self.header.unwrap_or(true) {
            Some(ScriptHeader {
                database: self.connect_options()?.get_database().unwrap_or("postgres").to_string(),
                generated_at,
            })
        } else {
            None
        };
        Ok(ExportOptions {
            structure: StructureOptions {
                drop_existing: self.drop_existing.unwrap_or(false),
            },
            header,
        })
    }

    /// Connection string when given, otherwise the discrete fields.
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(url) = &self.connection_string {
            return PgConnectOptions::from_str(url)
                .map_err(|e| ExportError::configuration(format!("Invalid connection string: {}", e)));
        }
        let database = self.database.as_deref().ok_or_else(|| {
            ExportError::configuration("Missing --database (or --connection-string)")
        })?;
        let mut options = PgConnectOptions::new()
            .host(self.host.as_deref().unwrap_or("localhost"))
            .port(self.port.unwrap_or(DEFAULT_PORT))
            .database(database);
        if let Some(user) = &self.user {
            options = options.username(user);
        }
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        Ok(options)
    }
}
