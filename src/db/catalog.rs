// db/catalog.rs
// Catalog queries that build table descriptors for one export run.

use super::accessors::ConnectionProvider;
use super::models::*;
use crate::error::{ExportError, Result};

pub const LIST_TABLES_SQL: &str = "SELECT table_name::text AS table_name
FROM information_schema.tables
WHERE table_schema = $1 AND table_type = 'BASE TABLE'
ORDER BY table_name";

pub const COLUMNS_SQL: &str = "SELECT column_name::text AS column_name,
       data_type::text AS data_type,
       udt_name::text AS udt_name,
       character_maximum_length::int4 AS char_max_length,
       numeric_precision::int4 AS numeric_precision,
       numeric_scale::int4 AS numeric_scale,
       is_nullable::text AS is_nullable,
       column_default::text AS column_default,
       ordinal_position::int4 AS ordinal_position
FROM information_schema.columns
WHERE table_schema = $1 AND table_name = $2
ORDER BY ordinal_position";

/// One row per constraint key position; CHECK constraints without columns
/// still yield a single row.
pub const CONSTRAINTS_SQL: &str = "SELECT con.conname::text AS constraint_name,
       con.contype::text AS constraint_type,
       k.ord::int4 AS key_position,
       att.attname::text AS column_name,
       fns.nspname::text AS ref_schema,
       fcl.relname::text AS ref_table,
       fatt.attname::text AS ref_column,
       con.confupdtype::text AS on_update,
       con.confdeltype::text AS on_delete,
       CASE WHEN con.contype = 'c' THEN pg_get_expr(con.conbin, con.conrelid) END AS check_expression
FROM pg_constraint con
JOIN pg_class cl ON cl.oid = con.conrelid
JOIN pg_namespace ns ON ns.oid = cl.relnamespace
LEFT JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord) ON true
LEFT JOIN pg_attribute att ON att.attrelid = con.conrelid AND att.attnum = k.attnum
LEFT JOIN pg_class fcl ON fcl.oid = con.confrelid
LEFT JOIN pg_namespace fns ON fns.oid = fcl.relnamespace
LEFT JOIN pg_attribute fatt ON fatt.attrelid = con.confrelid AND fatt.attnum = con.confkey[k.ord::int4]
WHERE ns.nspname = $1 AND cl.relname = $2 AND con.contype IN ('p', 'u', 'f', 'c')
ORDER BY con.conname, k.ord";

/// Resolves the regclass text of a `nextval(...)` default on the server, so
/// an unqualified name follows the session search_path.
pub const SEQUENCE_SQL: &str = "SELECT ns.nspname::text AS sequence_schema,
       cl.relname::text AS sequence_name,
       seq.start_value::int8 AS start_value,
       seq.increment_by::int8 AS increment_by,
       seq.last_value::int8 AS last_value
FROM pg_class cl
JOIN pg_namespace ns ON ns.oid = cl.relnamespace
LEFT JOIN pg_sequences seq ON seq.schemaname = ns.nspname AND seq.sequencename = cl.relname
WHERE cl.oid = to_regclass($1)";

/// Reads catalog metadata through a borrowed connection. Nothing is cached:
/// every call goes back to the database.
pub struct Catalog<'c, C: ConnectionProvider + ?Sized> {
    conn: &'c mut C,
}

impl<'c, C: ConnectionProvider + ?Sized> Catalog<'c, C> {
    pub fn new(conn: &'c mut C) -> Self {
        Self { conn }
    }

    /// Base tables of a schema, in catalog (name) order.
    pub async fn get_tables(&mut self, schema: &str) -> Result<Vec<String>> {
        let rows = self
            .conn
            .query(LIST_TABLES_SQL, &[schema])
            .await
            .map_err(|e| ExportError::structure_query(schema, "*", e))?;
        rows.iter()
            .map(|row| required_text(row, "table_name", schema, "*"))
            .collect()
    }

    pub async fn get_columns_for_table(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>> {
        let rows = self
            .conn
            .query(COLUMNS_SQL, &[schema, table])
            .await
            .map_err(|e| ExportError::structure_query(schema, table, e))?;
        rows.iter()
            .map(|row| {
                Ok(ColumnDescriptor {
                    name: required_text(row, "column_name", schema, table)?,
                    data_type: required_text(row, "data_type", schema, table)?,
                    udt_name: row.text("udt_name").unwrap_or_default(),
                    char_max_length: row.int("char_max_length").map(|v| v as i32),
                    numeric_precision: row.int("numeric_precision").map(|v| v as i32),
                    numeric_scale: row.int("numeric_scale").map(|v| v as i32),
                    nullable: row.text("is_nullable").as_deref() != Some("NO"),
                    default: row.text("column_default"),
                    ordinal: row.int("ordinal_position").unwrap_or_default() as i32,
                })
            })
            .collect()
    }

    pub async fn get_constraints_for_table(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ConstraintDescriptor>> {
        let rows = self
            .conn
            .query(CONSTRAINTS_SQL, &[schema, table])
            .await
            .map_err(|e| ExportError::structure_query(schema, table, e))?;

        let mut constraints: Vec<ConstraintDescriptor> = Vec::new();
        for row in &rows {
            let name = required_text(row, "constraint_name", schema, table)?;
            let code = required_text(row, "constraint_type", schema, table)?;
            let Some(kind) = ConstraintKind::from_code(&code) else {
                continue;
            };

            let idx = match constraints.iter().position(|c| c.name == name) {
                Some(idx) => idx,
                None => {
                    let references = match kind {
                        ConstraintKind::ForeignKey => Some(ForeignKeyTarget {
                            schema: required_text(row, "ref_schema", schema, table)?,
                            table: required_text(row, "ref_table", schema, table)?,
                            columns: Vec::new(),
                            on_update: ReferentialAction::from_code(
                                &row.text("on_update").unwrap_or_default(),
                            ),
                            on_delete: ReferentialAction::from_code(
                                &row.text("on_delete").unwrap_or_default(),
                            ),
                        }),
                        _ => None,
                    };
                    constraints.push(ConstraintDescriptor {
                        name,
                        kind,
                        columns: Vec::new(),
                        references,
                        check_expression: row.text("check_expression"),
                    });
                    constraints.len() - 1
                }
            };

            let constraint = &mut constraints[idx];
            if let Some(column) = row.text("column_name") {
                constraint.columns.push(column);
            }
            if let (Some(target), Some(ref_column)) =
                (constraint.references.as_mut(), row.text("ref_column"))
            {
                target.columns.push(ref_column);
            }
        }

        constraints.sort_by(|a, b| {
            a.kind
                .rank()
                .cmp(&b.kind.rank())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(constraints)
    }

    /// Sequence behind a `nextval('<regclass>')` default. Name and schema
    /// come from the server; state defaults to 1 / 1 / none when not visible.
    pub async fn get_sequence(
        &mut self,
        table_schema: &str,
        table: &str,
        owning_column: &str,
        regclass: &str,
    ) -> Result<SequenceDescriptor> {
        let rows = self
            .conn
            .query(SEQUENCE_SQL, &[regclass])
            .await
            .map_err(|e| ExportError::structure_query(table_schema, table, e))?;
        let row = rows.first();

        let mut parts = split_qualified_name(regclass);
        let fallback_name = parts.pop().unwrap_or_default();
        let fallback_schema = parts.pop().unwrap_or_else(|| table_schema.to_string());
        Ok(SequenceDescriptor {
            schema: row
                .and_then(|r| r.text("sequence_schema"))
                .unwrap_or(fallback_schema),
            name: row
                .and_then(|r| r.text("sequence_name"))
                .unwrap_or(fallback_name),
            owning_column: owning_column.to_string(),
            start_value: row.and_then(|r| r.int("start_value")).unwrap_or(1),
            increment: row.and_then(|r| r.int("increment_by")).unwrap_or(1),
            last_value: row.and_then(|r| r.int("last_value")),
        })
    }

    /// Full descriptor of one table: columns, constraints and the sequences
    /// behind `nextval(...)` defaults.
    pub async fn describe_table(&mut self, schema: &str, table: &str) -> Result<TableDescriptor> {
        tracing::debug!(schema, table, "reading catalog metadata");
        let columns = self.get_columns_for_table(schema, table).await?;
        if columns.is_empty() {
            return Err(ExportError::structure_message(
                schema,
                table,
                "table not found or has no columns",
            ));
        }
        let constraints = self.get_constraints_for_table(schema, table).await?;

        let mut sequences = Vec::new();
        for column in &columns {
            let Some(regclass) = column.default.as_deref().and_then(parse_nextval) else {
                continue;
            };
            let sequence = self
                .get_sequence(schema, table, &column.name, &regclass)
                .await?;
            sequences.push(sequence);
        }

        Ok(TableDescriptor {
            schema: schema.to_string(),
            name: table.to_string(),
            columns,
            constraints,
            sequences,
        })
    }
}

fn required_text(row: &Row, column: &str, schema: &str, table: &str) -> Result<String> {
    row.text(column).ok_or_else(|| {
        ExportError::structure_message(
            schema,
            table,
            format!("catalog row is missing '{}'", column),
        )
    })
}

/// Extract the regclass text from `nextval('<name>'::regclass)`.
pub fn parse_nextval(default: &str) -> Option<String> {
    let rest = default.trim().strip_prefix("nextval(")?;
    let rest = rest.strip_prefix('\'')?;
    let end = rest.find("'::regclass").or_else(|| rest.rfind('\''))?;
    let name = rest[..end].replace("''", "'");
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Split `schema.name` / `"Odd.Schema"."Name"` into unquoted parts.
pub fn split_qualified_name(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            '.' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}
