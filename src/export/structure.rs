// export/structure.rs
// Renders DDL for table descriptors read from the catalog.

use crate::db::accessors::ConnectionProvider;
use crate::db::catalog::Catalog;
use crate::db::models::{ConstraintDescriptor, ConstraintKind, ReferentialAction, SequenceDescriptor, TableDescriptor};
use crate::error::Result;
use crate::sql::formatter::{qualify, quote_identifier, text_literal};
use crate::sql::typemap::map_column_type;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureOptions {
    /// Emit `DROP TABLE IF EXISTS ... CASCADE;` before each table.
    pub drop_existing: bool,
}

pub struct StructureExporter<'c, C: ConnectionProvider + ?Sized> {
    conn: &'c mut C,
    options: StructureOptions,
}

impl<'c, C: ConnectionProvider + ?Sized> StructureExporter<'c, C> {
    pub fn new(conn: &'c mut C, options: StructureOptions) -> Self {
        Self { conn, options }
    }

    /// DDL for one already-described table.
    pub fn export_table(&self, table: &TableDescriptor) -> String {
        render_table(table, &self.options)
    }

    /// DDL for every base table of `schema`, in catalog order. Foreign keys
    /// come last so they never reference a table not yet created.
    pub async fn export_all(&mut self, schema: &str) -> Result<String> {
        let tables = Catalog::new(&mut *self.conn).get_tables(schema).await?;
        let mut descriptors = Vec::with_capacity(tables.len());
        for table in tables {
            let descriptor = Catalog::new(&mut *self.conn)
                .describe_table(schema, &table)
                .await?;
            descriptors.push(descriptor);
        }

        let mut sql = String::new();
        for descriptor in &descriptors {
            sql.push_str(&render_create(descriptor, &self.options));
            sql.push('\n');
        }
        let foreign_keys: String = descriptors.iter().map(render_foreign_keys).collect();
        if !foreign_keys.is_empty() {
            sql.push_str(&foreign_keys);
            sql.push('\n');
        }
        Ok(sql)
    }
}

/// `CREATE TABLE`, then sequence statements, then one `ALTER TABLE ... ADD
/// CONSTRAINT` per constraint, foreign keys last. Pure: reads nothing but
/// the descriptor.
pub fn render_table(table: &TableDescriptor, options: &StructureOptions) -> String {
    let mut sql = render_create(table, options);
    sql.push_str(&render_foreign_keys(table));
    sql
}

/// Everything for one table except its foreign keys.
pub fn render_create(table: &TableDescriptor, options: &StructureOptions) -> String {
    let qualified = qualify(&table.schema, &table.name);
    let mut sql = format!("-- Table: {}\n", qualified);

    if options.drop_existing {
        sql.push_str(&format!("DROP TABLE IF EXISTS {} CASCADE;\n", qualified));
    }

    let mut columns: Vec<_> = table.columns.iter().collect();
    columns.sort_by_key(|c| c.ordinal);
    let column_lines: Vec<String> = columns
        .iter()
        .map(|col| {
            let mut line = format!("    {} {}", quote_identifier(&col.name), map_column_type(col));
            if !col.nullable {
                line.push_str(" NOT NULL");
            }
            let owns_sequence = table.sequences.iter().any(|s| s.owning_column == col.name);
            if let (Some(default), false) = (&col.default, owns_sequence) {
                line.push_str(" DEFAULT ");
                line.push_str(default);
            }
            line
        })
        .collect();
    sql.push_str(&format!("CREATE TABLE {} (\n", qualified));
    sql.push_str(&column_lines.join(",\n"));
    sql.push_str("\n);\n");

    for sequence in &table.sequences {
        sql.push_str(&render_sequence(&qualified, sequence));
    }
    for constraint in table
        .constraints
        .iter()
        .filter(|c| c.kind != ConstraintKind::ForeignKey)
    {
        sql.push_str(&render_constraint(&qualified, constraint));
    }
    sql
}

/// `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY` statements of one table.
pub fn render_foreign_keys(table: &TableDescriptor) -> String {
    let qualified = qualify(&table.schema, &table.name);
    table
        .constraints
        .iter()
        .filter(|c| c.kind == ConstraintKind::ForeignKey)
        .map(|c| render_constraint(&qualified, c))
        .collect()
}

fn render_sequence(qualified_table: &str, sequence: &SequenceDescriptor) -> String {
    let seq = qualify(&sequence.schema, &sequence.name);
    let mut sql = format!(
        "CREATE SEQUENCE IF NOT EXISTS {} START WITH {} INCREMENT BY {};\n",
        seq, sequence.start_value, sequence.increment
    );
    if let Some(last) = sequence.last_value {
        sql.push_str(&format!("SELECT setval({}, {}, true);\n", text_literal(&seq), last));
    }
    let column = quote_identifier(&sequence.owning_column);
    sql.push_str(&format!(
        "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT nextval({});\n",
        qualified_table,
        column,
        text_literal(&seq)
    ));
    sql.push_str(&format!(
        "ALTER SEQUENCE {} OWNED BY {}.{};\n",
        seq, qualified_table, column
    ));
    sql
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_constraint(qualified_table: &str, constraint: &ConstraintDescriptor) -> String {
    let body = match constraint.kind {
        ConstraintKind::PrimaryKey => format!("PRIMARY KEY ({})", column_list(&constraint.columns)),
        ConstraintKind::Unique => format!("UNIQUE ({})", column_list(&constraint.columns)),
        ConstraintKind::ForeignKey => {
            let mut body = format!("FOREIGN KEY ({})", column_list(&constraint.columns));
            if let Some(target) = &constraint.references {
                body.push_str(&format!(
                    " REFERENCES {} ({})",
                    qualify(&target.schema, &target.table),
                    column_list(&target.columns)
                ));
                if target.on_update != ReferentialAction::NoAction {
                    body.push_str(&format!(" ON UPDATE {}", target.on_update.as_sql()));
                }
                if target.on_delete != ReferentialAction::NoAction {
                    body.push_str(&format!(" ON DELETE {}", target.on_delete.as_sql()));
                }
            }
            body
        }
        ConstraintKind::Check => match &constraint.check_expression {
            // Catalog text is already valid SQL; not re-parsed
            Some(expr) => format!("CHECK ({})", expr),
            None => {
                return format!(
                    "-- CHECK constraint {} has no readable expression\n",
                    quote_identifier(&constraint.name)
                )
            }
        },
    };
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} {};\n",
        qualified_table,
        quote_identifier(&constraint.name),
        body
    )
}
