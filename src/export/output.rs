// export/output.rs
// Script sinks and the catalog manifest writer

use crate::db::models::TableDescriptor;
use crate::error::{ExportError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Destination for rendered SQL. Chunks arrive whole: a statement is either
/// written completely or not at all.
#[async_trait]
pub trait ScriptSink: Send {
    async fn write_chunk(&mut self, chunk: &str) -> Result<()>;

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ScriptSink for String {
    async fn write_chunk(&mut self, chunk: &str) -> Result<()> {
        self.push_str(chunk);
        Ok(())
    }
}

/// Buffered sink over any tokio writer (file, stdout).
pub struct WriterSink<W: AsyncWrite + Unpin + Send> {
    writer: BufWriter<W>,
    target: String,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    pub fn new(writer: W, target: impl Into<String>) -> Self {
        Self {
            writer: BufWriter::new(writer),
            target: target.into(),
        }
    }
}

impl WriterSink<tokio::fs::File> {
    pub async fn create(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::create(path)
            .await
            .map_err(|e| ExportError::output(format!("cannot create {}", path.display()), e))?;
        Ok(Self::new(file, path.display().to_string()))
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ScriptSink for WriterSink<W> {
    async fn write_chunk(&mut self, chunk: &str) -> Result<()> {
        self.writer
            .write_all(chunk.as_bytes())
            .await
            .map_err(|e| ExportError::output(format!("cannot write to {}", self.target), e))
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .await
            .map_err(|e| ExportError::output(format!("cannot flush {}", self.target), e))
    }
}

/// Snapshot of the descriptors one run was built from.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CatalogManifest {
    pub schema: String,
    pub generated_at: Option<DateTime<Utc>>,
    pub tables: Vec<TableDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Yaml,
}

impl ManifestFormat {
    /// `.yaml` / `.yml` → YAML, anything else → JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
            Some("yaml") | Some("yml") => ManifestFormat::Yaml,
            _ => ManifestFormat::Json,
        }
    }
}

pub struct ManifestExporter;

impl ManifestExporter {
    pub fn render(&self, manifest: &CatalogManifest, format: ManifestFormat) -> Result<String> {
        let serialized = match format {
            ManifestFormat::Json => serde_json::to_string_pretty(manifest)
                .map_err(|e| ExportError::configuration(format!("cannot serialize manifest: {}", e)))?,
            ManifestFormat::Yaml => serde_yaml::to_string(manifest)
                .map_err(|e| ExportError::configuration(format!("cannot serialize manifest: {}", e)))?,
        };
        Ok(serialized)
    }

    pub fn export_manifest_to_file(&self, manifest: &CatalogManifest, output_file: &Path) -> Result<()> {
        let serialized = self.render(manifest, ManifestFormat::from_path(output_file))?;
        let context = || format!("cannot write manifest {}", output_file.display());
        let mut file = File::create(output_file).map_err(|e| ExportError::output(context(), e))?;
        file.write_all(serialized.as_bytes())
            .map_err(|e| ExportError::output(context(), e))?;
        Ok(())
    }
}
