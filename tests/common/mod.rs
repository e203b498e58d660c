// tests/common/mod.rs
// In-memory ConnectionProvider answering the catalog and paging queries.
#![allow(dead_code)]

use async_trait::async_trait;
use pg_sql_exporter::db::accessors::ConnectionProvider;
use pg_sql_exporter::db::catalog::{
    split_qualified_name, COLUMNS_SQL, CONSTRAINTS_SQL, LIST_TABLES_SQL, SEQUENCE_SQL,
};
use pg_sql_exporter::db::models::{
    ColumnDescriptor, ConstraintDescriptor, ConstraintKind, ReferentialAction, Row, SqlValue,
};
use pg_sql_exporter::error::BoxError;
use tokio::sync::watch;

pub struct FakeTable {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub constraints: Vec<ConstraintDescriptor>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl FakeTable {
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn constraint(mut self, constraint: ConstraintDescriptor) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn primary_key(self, name: &str, columns: &[&str]) -> Self {
        self.constraint(ConstraintDescriptor {
            name: name.into(),
            kind: ConstraintKind::PrimaryKey,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            references: None,
            check_expression: None,
        })
    }

    pub fn row(mut self, values: Vec<SqlValue>) -> Self {
        self.rows.push(values);
        self
    }
}

pub struct FakeSequence {
    pub schema: String,
    pub name: String,
    pub start_value: i64,
    pub increment: i64,
    pub last_value: Option<i64>,
}

#[derive(Default)]
pub struct FakeConnection {
    pub tables: Vec<FakeTable>,
    pub sequences: Vec<FakeSequence>,
    /// Every statement received, in order.
    pub queries: Vec<String>,
    /// Data queries that succeed before every further one fails.
    pub fail_data_after: Option<usize>,
    pub fail_catalog: bool,
    pub closed: bool,
    /// Flip the flag once this many data queries have been answered.
    pub cancel_after: Option<(usize, watch::Sender<bool>)>,
    data_queries: usize,
}

impl FakeConnection {
    pub fn new(tables: Vec<FakeTable>) -> Self {
        Self {
            tables,
            ..Default::default()
        }
    }

    pub fn with_sequence(mut self, schema: &str, name: &str, start: i64, increment: i64, last: Option<i64>) -> Self {
        self.sequences.push(FakeSequence {
            schema: schema.into(),
            name: name.into(),
            start_value: start,
            increment,
            last_value: last,
        });
        self
    }

    pub fn data_queries(&self) -> Vec<&String> {
        self.queries.iter().filter(|q| q.contains(" LIMIT ")).collect()
    }

    fn table(&self, schema: &str, name: &str) -> Option<&FakeTable> {
        self.tables.iter().find(|t| t.schema == schema && t.name == name)
    }

    fn list_tables(&self, schema: &str) -> Vec<Row> {
        let mut names: Vec<&str> = self
            .tables
            .iter()
            .filter(|t| t.schema == schema)
            .map(|t| t.name.as_str())
            .collect();
        names.sort();
        names
            .into_iter()
            .map(|n| Row::new(vec!["table_name".into()], vec![n.into()]))
            .collect()
    }

    fn columns(&self, schema: &str, name: &str) -> Vec<Row> {
        let Some(table) = self.table(schema, name) else {
            return Vec::new();
        };
        let names: Vec<String> = [
            "column_name",
            "data_type",
            "udt_name",
            "char_max_length",
            "numeric_precision",
            "numeric_scale",
            "is_nullable",
            "column_default",
            "ordinal_position",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let int = |v: Option<i32>| -> SqlValue { v.map(i64::from).into() };
        table
            .columns
            .iter()
            .map(|c| {
                Row::new(
                    names.clone(),
                    vec![
                        c.name.as_str().into(),
                        c.data_type.as_str().into(),
                        c.udt_name.as_str().into(),
                        int(c.char_max_length),
                        int(c.numeric_precision),
                        int(c.numeric_scale),
                        SqlValue::from(if c.nullable { "YES" } else { "NO" }),
                        c.default.clone().into(),
                        SqlValue::Int(i64::from(c.ordinal)),
                    ],
                )
            })
            .collect()
    }

    fn constraints(&self, schema: &str, name: &str) -> Vec<Row> {
        let Some(table) = self.table(schema, name) else {
            return Vec::new();
        };
        let names: Vec<String> = [
            "constraint_name",
            "constraint_type",
            "key_position",
            "column_name",
            "ref_schema",
            "ref_table",
            "ref_column",
            "on_update",
            "on_delete",
            "check_expression",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut rows = Vec::new();
        for constraint in &table.constraints {
            let code = match constraint.kind {
                ConstraintKind::PrimaryKey => "p",
                ConstraintKind::Unique => "u",
                ConstraintKind::ForeignKey => "f",
                ConstraintKind::Check => "c",
            };
            let positions = constraint.columns.len().max(1);
            for pos in 0..positions {
                let target = constraint.references.as_ref();
                rows.push(Row::new(
                    names.clone(),
                    vec![
                        constraint.name.as_str().into(),
                        code.into(),
                        SqlValue::Int(pos as i64 + 1),
                        constraint.columns.get(pos).cloned().into(),
                        target.map(|t| t.schema.clone()).into(),
                        target.map(|t| t.table.clone()).into(),
                        target.and_then(|t| t.columns.get(pos).cloned()).into(),
                        action_code(target.map(|t| t.on_update)).into(),
                        action_code(target.map(|t| t.on_delete)).into(),
                        constraint.check_expression.clone().into(),
                    ],
                ));
            }
        }
        rows
    }

    /// `to_regclass` with a search_path of `public`.
    fn sequence(&self, regclass: &str) -> Vec<Row> {
        let mut parts = split_qualified_name(regclass);
        let name = parts.pop().unwrap_or_default();
        let schema = parts.pop().unwrap_or_else(|| "public".to_string());
        self.sequences
            .iter()
            .filter(|s| s.schema == schema && s.name == name)
            .map(|s| {
                Row::new(
                    vec![
                        "sequence_schema".into(),
                        "sequence_name".into(),
                        "start_value".into(),
                        "increment_by".into(),
                        "last_value".into(),
                    ],
                    vec![
                        s.schema.as_str().into(),
                        s.name.as_str().into(),
                        SqlValue::Int(s.start_value),
                        SqlValue::Int(s.increment),
                        s.last_value.into(),
                    ],
                )
            })
            .collect()
    }

    fn page(&mut self, sql: &str) -> Result<Vec<Row>, BoxError> {
        if let Some(limit) = self.fail_data_after {
            if self.data_queries >= limit {
                return Err("connection reset by peer".into());
            }
        }
        self.data_queries += 1;

        let (schema, name) = parse_from(sql).ok_or("unparseable FROM clause")?;
        let limit = number_after(sql, " LIMIT ").ok_or("missing LIMIT")?;
        let offset = number_after(sql, " OFFSET ").ok_or("missing OFFSET")?;
        let table = self
            .table(&schema, &name)
            .ok_or_else(|| format!("relation \"{}.{}\" does not exist", schema, name))?;
        let columns: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
        let rows: Vec<Row> = table
            .rows
            .iter()
            .skip(offset)
            .take(limit)
            .map(|values| Row::new(columns.clone(), values.clone()))
            .collect();

        if let Some((after, tx)) = &self.cancel_after {
            if self.data_queries >= *after {
                let _ = tx.send(true);
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl ConnectionProvider for FakeConnection {
    async fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, BoxError> {
        self.queries.push(sql.to_string());
        let is_catalog = [LIST_TABLES_SQL, COLUMNS_SQL, CONSTRAINTS_SQL, SEQUENCE_SQL].contains(&sql);
        if is_catalog && self.fail_catalog {
            return Err("permission denied for schema".into());
        }
        match (sql, params) {
            (LIST_TABLES_SQL, [schema]) => Ok(self.list_tables(schema)),
            (COLUMNS_SQL, [schema, table]) => Ok(self.columns(schema, table)),
            (CONSTRAINTS_SQL, [schema, table]) => Ok(self.constraints(schema, table)),
            (SEQUENCE_SQL, [regclass]) => Ok(self.sequence(regclass)),
            _ if sql.starts_with("SELECT ") && sql.contains(" LIMIT ") => self.page(sql),
            _ => Err(format!("unexpected query: {}", sql).into()),
        }
    }

    async fn close(&mut self) -> Result<(), BoxError> {
        self.closed = true;
        Ok(())
    }
}

fn action_code(action: Option<ReferentialAction>) -> Option<String> {
    let code = match action? {
        ReferentialAction::NoAction => "a",
        ReferentialAction::Restrict => "r",
        ReferentialAction::Cascade => "c",
        ReferentialAction::SetNull => "n",
        ReferentialAction::SetDefault => "d",
    };
    Some(code.to_string())
}

/// `FROM "schema"."table"` with doubled quotes undone.
fn parse_from(sql: &str) -> Option<(String, String)> {
    let rest = &sql[sql.find(" FROM ")? + 6..];
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = rest.chars().peekable();
    if chars.next()? != '"' {
        return None;
    }
    while let Some(c) = chars.next() {
        match c {
            '"' if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => {
                parts.push(std::mem::take(&mut current));
                if parts.len() == 2 {
                    break;
                }
                if chars.next() != Some('.') || chars.next() != Some('"') {
                    return None;
                }
            }
            _ => current.push(c),
        }
    }
    let name = parts.pop()?;
    let schema = parts.pop()?;
    Some((schema, name))
}

fn number_after(sql: &str, keyword: &str) -> Option<usize> {
    let rest = &sql[sql.rfind(keyword)? + keyword.len()..];
    rest.split_whitespace().next()?.parse().ok()
}

/// `users(id serial primary key, name text, created_at timestamp default now())`
pub fn users_table() -> FakeTable {
    use chrono::NaiveDate;
    let ts = |day: u32| {
        SqlValue::Timestamp(
            NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        )
    };
    FakeTable::new("public", "users")
        .column(
            ColumnDescriptor::new("id", "integer", 1)
                .not_null()
                .with_default("nextval('users_id_seq'::regclass)"),
        )
        .column(ColumnDescriptor::new("name", "text", 2))
        .column(ColumnDescriptor::new("created_at", "timestamp without time zone", 3).with_default("now()"))
        .primary_key("users_pkey", &["id"])
        .row(vec![SqlValue::Int(1), "O'Brien".into(), ts(1)])
        .row(vec![SqlValue::Int(2), SqlValue::Null, ts(2)])
}
