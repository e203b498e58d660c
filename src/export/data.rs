// export/data.rs
// Streams table rows in bounded batches and renders one multi-row INSERT per batch.

use crate::db::accessors::ConnectionProvider;
use crate::db::models::{ColumnDescriptor, RowBatch, TableDescriptor};
use crate::error::{BoxError, ExportError, Result};
use crate::sql::formatter::{format_classified, qualify, quote_identifier, TypeClass};

/// Types the connection provider decodes natively; everything else is
/// selected as `::text` and rendered from its text form. Dates and
/// timestamps go through text: `infinity` and BC values have no chrono form.
const NATIVE_TYPES: &[&str] = &[
    "smallint",
    "integer",
    "bigint",
    "double precision",
    "boolean",
    "bytea",
    "time without time zone",
    "text",
    "character varying",
    "character",
];

/// Types without a usable btree ordering.
const UNSORTABLE_TYPES: &[&str] = &[
    "json", "xml", "point", "line", "lseg", "box", "path", "polygon", "circle",
];

pub fn select_expression(column: &ColumnDescriptor) -> String {
    let quoted = quote_identifier(&column.name);
    if NATIVE_TYPES.contains(&column.data_type.to_lowercase().as_str()) {
        quoted
    } else {
        format!("{}::text AS {}", quoted, quoted)
    }
}

/// Primary key columns when there is one, otherwise every sortable column by
/// ordinal position. Empty when nothing can be ordered.
pub fn order_by_clause(table: &TableDescriptor) -> String {
    if let Some(pk) = table.primary_key().filter(|pk| !pk.columns.is_empty()) {
        let cols: Vec<String> = pk.columns.iter().map(|c| quote_identifier(c)).collect();
        return format!(" ORDER BY {}", cols.join(", "));
    }
    let positions: Vec<String> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            let declared = c.data_type.to_lowercase();
            let udt = c.udt_name.to_lowercase();
            !UNSORTABLE_TYPES.contains(&declared.as_str()) && !UNSORTABLE_TYPES.contains(&udt.as_str())
        })
        .map(|(idx, _)| (idx + 1).to_string())
        .collect();
    if positions.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", positions.join(", "))
    }
}

pub fn build_batch_query(table: &TableDescriptor, batch_size: usize, offset: usize) -> String {
    let select_list: Vec<String> = table.columns.iter().map(select_expression).collect();
    format!(
        "SELECT {} FROM {}{} LIMIT {} OFFSET {}",
        select_list.join(", "),
        qualify(&table.schema, &table.name),
        order_by_clause(table),
        batch_size,
        offset
    )
}

/// One `INSERT INTO ... VALUES (...), (...);` for the whole batch, or `None`
/// for an empty batch. Nothing is returned unless every value rendered.
pub fn render_insert(table: &TableDescriptor, batch: &RowBatch) -> Result<Option<String>> {
    if batch.is_empty() {
        return Ok(None);
    }
    let shape_error = |row: usize, reason: String| ExportError::Format {
        schema: table.schema.clone(),
        table: table.name.clone(),
        column: "*".to_string(),
        row,
        batch: batch.index,
        reason,
    };
    let column_names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    if batch.columns.iter().map(String::as_str).ne(column_names.iter().copied()) {
        return Err(shape_error(
            0,
            format!(
                "batch columns {:?} do not match table columns {:?}",
                batch.columns, column_names
            ),
        ));
    }
    let classes: Vec<TypeClass> = table
        .columns
        .iter()
        .map(|c| TypeClass::classify(&c.data_type))
        .collect();

    let mut tuples = Vec::with_capacity(batch.len());
    for (row_idx, row) in batch.rows.iter().enumerate() {
        if row.len() != column_names.len() {
            return Err(shape_error(
                row_idx,
                format!("expected {} values, got {}", column_names.len(), row.len()),
            ));
        }
        let mut literals = Vec::with_capacity(row.len());
        for ((value, class), column) in row.iter().zip(&classes).zip(&table.columns) {
            let literal = format_classified(value, *class).map_err(|e| ExportError::Format {
                schema: table.schema.clone(),
                table: table.name.clone(),
                column: column.name.clone(),
                row: row_idx,
                batch: batch.index,
                reason: e.reason,
            })?;
            literals.push(literal);
        }
        tuples.push(format!("    ({})", literals.join(", ")));
    }

    let columns: Vec<String> = column_names.iter().map(|c| quote_identifier(c)).collect();
    Ok(Some(format!(
        "INSERT INTO {} ({}) VALUES\n{};\n",
        qualify(&table.schema, &table.name),
        columns.join(", "),
        tuples.join(",\n")
    )))
}

pub struct DataExporter<'c, C: ConnectionProvider + ?Sized> {
    conn: &'c mut C,
}

impl<'c, C: ConnectionProvider + ?Sized> DataExporter<'c, C> {
    pub fn new(conn: &'c mut C) -> Self {
        Self { conn }
    }

    /// Lazy batch cursor over `table`. Fails on a zero batch size before any
    /// query is issued.
    pub fn export_table<'a>(
        &'a mut self,
        table: &'a TableDescriptor,
        batch_size: usize,
    ) -> Result<BatchCursor<'a, C>> {
        BatchCursor::new(&mut *self.conn, table, batch_size)
    }
}

/// Offset cursor over one table. Each fetch reads at most `batch_size` rows;
/// the cursor is exhausted after a short (or empty) page.
pub struct BatchCursor<'a, C: ConnectionProvider + ?Sized> {
    conn: &'a mut C,
    table: &'a TableDescriptor,
    batch_size: usize,
    next_index: usize,
    rows_read: usize,
    finished: bool,
}

impl<'a, C: ConnectionProvider + ?Sized> BatchCursor<'a, C> {
    pub fn new(conn: &'a mut C, table: &'a TableDescriptor, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(ExportError::configuration(
                "Batch size must be a positive integer",
            ));
        }
        Ok(Self {
            conn,
            table,
            batch_size,
            next_index: 0,
            rows_read: 0,
            finished: false,
        })
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        if self.finished {
            return Ok(None);
        }
        let index = self.next_index;
        let sql = build_batch_query(self.table, self.batch_size, self.rows_read);
        tracing::debug!(table = %self.table.name, batch = index, "fetching rows");

        let data_error = |source: BoxError| ExportError::DataQuery {
            schema: self.table.schema.clone(),
            table: self.table.name.clone(),
            batch: index,
            source,
        };
        let rows = self.conn.query(&sql, &[]).await.map_err(data_error)?;

        let width = self.table.columns.len();
        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            if row.values.len() != width {
                return Err(data_error(
                    format!("expected {} values per row, got {}", width, row.values.len()).into(),
                ));
            }
            values.push(row.values);
        }

        if values.len() < self.batch_size {
            self.finished = true;
        }
        if values.is_empty() {
            return Ok(None);
        }
        self.next_index += 1;
        self.rows_read += values.len();
        Ok(Some(RowBatch {
            index,
            columns: self.table.columns.iter().map(|c| c.name.clone()).collect(),
            rows: values,
        }))
    }

    /// Next rendered INSERT statement, with the batch it came from.
    pub async fn next_chunk(&mut self) -> Result<Option<(RowBatch, String)>> {
        while let Some(batch) = self.next_batch().await? {
            if let Some(sql) = render_insert(self.table, &batch)? {
                return Ok(Some((batch, sql)));
            }
        }
        Ok(None)
    }
}
