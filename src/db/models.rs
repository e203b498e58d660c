// Data structures for catalog descriptors, row data and export requests

use crate::error::{ExportError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Raw `information_schema.columns.data_type` text.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Underlying type name; element type (`_int4`) for arrays, type name for
    /// user-defined types.
    pub udt_name: String,
    pub char_max_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_scale: Option<i32>,
    pub nullable: bool,
    pub default: Option<String>,
    pub ordinal: i32,
}

impl ColumnDescriptor {
    /// Column with only a name and declared type; mostly for tests and fakes.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, ordinal: i32) -> Self {
        let data_type = data_type.into();
        Self {
            name: name.into(),
            udt_name: data_type.clone(),
            data_type,
            char_max_length: None,
            numeric_precision: None,
            numeric_scale: None,
            nullable: true,
            default: None,
            ordinal,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey,
    Check,
}

impl ConstraintKind {
    /// Map a `pg_constraint.contype` code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "p" => Some(ConstraintKind::PrimaryKey),
            "u" => Some(ConstraintKind::Unique),
            "f" => Some(ConstraintKind::ForeignKey),
            "c" => Some(ConstraintKind::Check),
            _ => None,
        }
    }

    /// Emission order within one table.
    pub fn rank(self) -> u8 {
        match self {
            ConstraintKind::PrimaryKey => 0,
            ConstraintKind::Unique => 1,
            ConstraintKind::ForeignKey => 2,
            ConstraintKind::Check => 3,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    /// Map a `pg_constraint.confupdtype` / `confdeltype` code.
    pub fn from_code(code: &str) -> Self {
        match code {
            "r" => ReferentialAction::Restrict,
            "c" => ReferentialAction::Cascade,
            "n" => ReferentialAction::SetNull,
            "d" => ReferentialAction::SetDefault,
            _ => ReferentialAction::NoAction,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyTarget {
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
    pub on_update: ReferentialAction,
    pub on_delete: ReferentialAction,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConstraintDescriptor {
    pub name: String,
    pub kind: ConstraintKind,
    /// Participating columns in stored (key) order.
    pub columns: Vec<String>,
    pub references: Option<ForeignKeyTarget>,
    /// Boolean expression of a CHECK constraint, verbatim from the catalog.
    pub check_expression: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SequenceDescriptor {
    pub schema: String,
    pub name: String,
    pub owning_column: String,
    pub start_value: i64,
    pub increment: i64,
    /// `None` when the sequence was never advanced or is not visible.
    pub last_value: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub schema: String,
    pub name: String,
    /// Ordered by ordinal position.
    pub columns: Vec<ColumnDescriptor>,
    pub constraints: Vec<ConstraintDescriptor>,
    pub sequences: Vec<SequenceDescriptor>,
}

impl TableDescriptor {
    pub fn primary_key(&self) -> Option<&ConstraintDescriptor> {
        self.constraints
            .iter()
            .find(|c| c.kind == ConstraintKind::PrimaryKey)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// One scalar value read from the database.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Text, and anything the provider had the server cast to text.
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One result row as returned by a connection provider: values keep the
/// positional order of the select list, `columns` names them.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<SqlValue>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Text value of a column; `None` for SQL NULL or a missing column.
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(SqlValue::as_str).map(str::to_string)
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }
}

/// A bounded page of rows, positionally aligned with `columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    /// Zero-based index of this batch within the table export.
    pub index: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl RowBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    Structure,
    Data,
    Both,
}

impl ExportMode {
    pub fn includes_structure(self) -> bool {
        matches!(self, ExportMode::Structure | ExportMode::Both)
    }

    pub fn includes_data(self) -> bool {
        matches!(self, ExportMode::Data | ExportMode::Both)
    }
}

impl FromStr for ExportMode {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "structure" => Ok(ExportMode::Structure),
            "data" => Ok(ExportMode::Data),
            "both" => Ok(ExportMode::Both),
            other => Err(ExportError::configuration(format!(
                "Unknown export mode '{}'. Supported modes: structure, data, both",
                other
            ))),
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportMode::Structure => "structure",
            ExportMode::Data => "data",
            ExportMode::Both => "both",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSelection {
    All,
    Named(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub schema: String,
    pub tables: TableSelection,
    pub mode: ExportMode,
    pub batch_size: usize,
}

impl ExportRequest {
    pub fn new(
        schema: impl Into<String>,
        tables: TableSelection,
        mode: ExportMode,
        batch_size: usize,
    ) -> Result<Self> {
        let request = Self {
            schema: schema.into(),
            tables,
            mode,
            batch_size,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema.trim().is_empty() {
            return Err(ExportError::configuration("Schema name cannot be empty"));
        }
        if self.batch_size == 0 {
            return Err(ExportError::configuration(
                "Batch size must be a positive integer",
            ));
        }
        if let TableSelection::Named(tables) = &self.tables {
            if tables.is_empty() {
                return Err(ExportError::configuration(
                    "Table list cannot be empty; omit it to export all tables",
                ));
            }
            if tables.iter().any(|t| t.trim().is_empty()) {
                return Err(ExportError::configuration("Table name cannot be empty"));
            }
        }
        Ok(())
    }
}
