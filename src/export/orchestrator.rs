// export/orchestrator.rs
// Composes structure and data output for one export request.

use super::data::DataExporter;
use super::output::ScriptSink;
use super::structure::{render_create, render_foreign_keys, StructureOptions};
use crate::db::accessors::ConnectionProvider;
use crate::db::catalog::Catalog;
use crate::db::models::{ExportRequest, TableDescriptor, TableSelection};
use crate::error::Result;
use crate::sql::formatter::qualify;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};

const SECTION_RULE: &str = "-- =============================================";

/// Comment block and session settings at the top of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptHeader {
    pub database: String,
    pub generated_at: Option<DateTime<Utc>>,
}

impl ScriptHeader {
    pub fn render(&self) -> String {
        let mut sql = String::from("-- PostgreSQL export\n");
        sql.push_str(&format!("-- Database: {}\n", self.database));
        if let Some(at) = self.generated_at {
            sql.push_str(&format!("-- Date: {}\n", at.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        sql.push_str("-- Generated with pg-sql-exporter\n\n");
        sql.push_str("SET statement_timeout = 0;\n");
        sql.push_str("SET lock_timeout = 0;\n");
        sql.push_str("SET client_encoding = 'UTF8';\n");
        sql.push_str("SET standard_conforming_strings = on;\n");
        sql.push_str("SET check_function_bodies = false;\n");
        sql.push_str("SET client_min_messages = warning;\n\n");
        sql
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub structure: StructureOptions,
    pub header: Option<ScriptHeader>,
}

/// One event per rendered batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub table: String,
    pub batches_completed: usize,
    pub rows_completed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub tables: Vec<TableDescriptor>,
    pub batches: usize,
    pub rows: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub script: String,
    pub summary: ExportSummary,
}

pub struct ExportOrchestrator<'c, C: ConnectionProvider + ?Sized> {
    conn: &'c mut C,
    options: ExportOptions,
    progress: Option<mpsc::UnboundedSender<ProgressEvent>>,
    cancel: Option<watch::Receiver<bool>>,
}

impl<'c, C: ConnectionProvider + ?Sized> ExportOrchestrator<'c, C> {
    pub fn new(conn: &'c mut C, options: ExportOptions) -> Self {
        Self {
            conn,
            options,
            progress: None,
            cancel: None,
        }
    }

    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Polled between tables and before every batch fetch.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run the export and collect the whole script in memory.
    pub async fn run(&mut self, request: &ExportRequest) -> Result<ExportOutcome> {
        let mut script = String::new();
        let summary = self.run_into(request, &mut script).await?;
        Ok(ExportOutcome { script, summary })
    }

    /// Run the export, writing each finished chunk to `sink` as soon as it
    /// is rendered. Structure always precedes data.
    pub async fn run_into<S: ScriptSink + ?Sized>(
        &mut self,
        request: &ExportRequest,
        sink: &mut S,
    ) -> Result<ExportSummary> {
        request.validate()?;
        let mut summary = ExportSummary::default();

        let names = match &request.tables {
            TableSelection::All => Catalog::new(&mut *self.conn).get_tables(&request.schema).await?,
            TableSelection::Named(names) => names.clone(),
        };

        for name in &names {
            if self.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let descriptor = Catalog::new(&mut *self.conn)
                .describe_table(&request.schema, name)
                .await?;
            summary.tables.push(descriptor);
        }

        if let Some(header) = &self.options.header {
            sink.write_chunk(&header.render()).await?;
        }

        if !summary.cancelled && request.mode.includes_structure() {
            sink.write_chunk(&section_banner("TABLE STRUCTURE")).await?;
            for table in &summary.tables {
                let mut chunk = render_create(table, &self.options.structure);
                chunk.push('\n');
                sink.write_chunk(&chunk).await?;
            }
            // After every CREATE TABLE, so referenced tables already exist
            let mut foreign_keys: String = summary.tables.iter().map(render_foreign_keys).collect();
            if !foreign_keys.is_empty() {
                foreign_keys.push('\n');
                sink.write_chunk(&foreign_keys).await?;
            }
        }

        if !summary.cancelled && request.mode.includes_data() {
            if request.mode.includes_structure() {
                sink.write_chunk("\n").await?;
            }
            sink.write_chunk(&section_banner("TABLE DATA")).await?;
            let tables = std::mem::take(&mut summary.tables);
            for table in &tables {
                if self.export_table_data(table, request.batch_size, sink, &mut summary).await? {
                    break;
                }
            }
            summary.tables = tables;
        }

        if summary.cancelled {
            sink.write_chunk("-- Export cancelled; output above is complete up to this point\n")
                .await?;
        }
        sink.flush().await?;
        Ok(summary)
    }

    /// Returns `true` when cancellation stopped the table early.
    async fn export_table_data<S: ScriptSink + ?Sized>(
        &mut self,
        table: &TableDescriptor,
        batch_size: usize,
        sink: &mut S,
        summary: &mut ExportSummary,
    ) -> Result<bool> {
        let qualified = qualify(&table.schema, &table.name);
        tracing::debug!(table = %qualified, "exporting rows");
        sink.write_chunk(&format!("-- Data for {}\n", qualified)).await?;

        let cancel = self.cancel.clone();
        let progress = self.progress.clone();
        let mut exporter = DataExporter::new(&mut *self.conn);
        let mut cursor = exporter.export_table(table, batch_size)?;
        let mut batches = 0;

        loop {
            if cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
                summary.cancelled = true;
                return Ok(true);
            }
            let Some((batch, sql)) = cursor.next_chunk().await? else {
                break;
            };
            sink.write_chunk(&sql).await?;
            batches += 1;
            summary.batches += 1;
            summary.rows += batch.len();
            if let Some(tx) = &progress {
                // Receiver gone means nobody is listening; keep exporting
                let _ = tx.send(ProgressEvent {
                    table: table.name.clone(),
                    batches_completed: batches,
                    rows_completed: cursor.rows_read(),
                });
            }
        }

        if batches == 0 {
            sink.write_chunk(&format!("-- No rows in {}\n", qualified)).await?;
        }
        sink.write_chunk("\n").await?;
        Ok(false)
    }
}

fn section_banner(title: &str) -> String {
    format!("{}\n-- {}\n{}\n\n", SECTION_RULE, title, SECTION_RULE)
}
