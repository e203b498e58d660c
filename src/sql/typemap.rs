// sql/typemap.rs
// Declared catalog type → DDL type string.

use super::formatter::quote_identifier;
use crate::db::models::ColumnDescriptor;

/// `information_schema.columns.data_type` values with a dedicated spelling.
const TYPE_MAP: &[(&str, &str)] = &[
    ("character varying", "VARCHAR"),
    ("character", "CHAR"),
    ("numeric", "NUMERIC"),
    ("timestamp without time zone", "TIMESTAMP"),
    ("timestamp with time zone", "TIMESTAMPTZ"),
    ("time without time zone", "TIME"),
    ("time with time zone", "TIMETZ"),
    ("smallint", "SMALLINT"),
    ("integer", "INTEGER"),
    ("bigint", "BIGINT"),
    ("real", "REAL"),
    ("double precision", "DOUBLE PRECISION"),
    ("boolean", "BOOLEAN"),
    ("text", "TEXT"),
    ("bytea", "BYTEA"),
    ("date", "DATE"),
    ("interval", "INTERVAL"),
    ("json", "JSON"),
    ("jsonb", "JSONB"),
    ("uuid", "UUID"),
    ("xml", "XML"),
    ("money", "MONEY"),
    ("inet", "INET"),
    ("cidr", "CIDR"),
    ("macaddr", "MACADDR"),
];

/// Internal (`udt_name`) spellings, used for array element types.
const UDT_MAP: &[(&str, &str)] = &[
    ("int2", "SMALLINT"),
    ("int4", "INTEGER"),
    ("int8", "BIGINT"),
    ("float4", "REAL"),
    ("float8", "DOUBLE PRECISION"),
    ("numeric", "NUMERIC"),
    ("bool", "BOOLEAN"),
    ("text", "TEXT"),
    ("varchar", "VARCHAR"),
    ("bpchar", "CHAR"),
    ("bytea", "BYTEA"),
    ("date", "DATE"),
    ("time", "TIME"),
    ("timetz", "TIMETZ"),
    ("timestamp", "TIMESTAMP"),
    ("timestamptz", "TIMESTAMPTZ"),
    ("interval", "INTERVAL"),
    ("json", "JSON"),
    ("jsonb", "JSONB"),
    ("uuid", "UUID"),
];

fn lookup(table: &[(&str, &'static str)], name: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| *to)
}

/// Render the column type for a `CREATE TABLE` line. Unknown types pass
/// through unchanged.
pub fn map_column_type(column: &ColumnDescriptor) -> String {
    let declared = column.data_type.trim();
    match declared.to_lowercase().as_str() {
        "array" => {
            let element = column.udt_name.trim_start_matches('_');
            let mapped = lookup(UDT_MAP, element)
                .map(str::to_string)
                .unwrap_or_else(|| element.to_string());
            format!("{}[]", mapped)
        }
        "user-defined" => quote_identifier(&column.udt_name),
        lowered @ ("character varying" | "character" | "bit" | "bit varying") => {
            let base = match lowered {
                "character" => "CHAR",
                "bit" => "BIT",
                "bit varying" => "VARBIT",
                _ => "VARCHAR",
            };
            match column.char_max_length {
                Some(len) => format!("{}({})", base, len),
                None => base.to_string(),
            }
        }
        "numeric" => match (column.numeric_precision, column.numeric_scale) {
            (Some(p), Some(s)) if s > 0 => format!("NUMERIC({},{})", p, s),
            (Some(p), _) => format!("NUMERIC({})", p),
            (None, _) => "NUMERIC".to_string(),
        },
        lowered => lookup(TYPE_MAP, lowered)
            .map(str::to_string)
            .unwrap_or_else(|| declared.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(data_type: &str) -> ColumnDescriptor {
        ColumnDescriptor::new("c", data_type, 1)
    }

    #[test]
    fn maps_simple_types() {
        assert_eq!(map_column_type(&column("integer")), "INTEGER");
        assert_eq!(map_column_type(&column("timestamp without time zone")), "TIMESTAMP");
        assert_eq!(map_column_type(&column("timestamp with time zone")), "TIMESTAMPTZ");
        assert_eq!(map_column_type(&column("double precision")), "DOUBLE PRECISION");
    }

    #[test]
    fn maps_lengths_and_precision() {
        let mut varchar = column("character varying");
        varchar.char_max_length = Some(80);
        assert_eq!(map_column_type(&varchar), "VARCHAR(80)");

        let mut unbounded = column("character varying");
        unbounded.char_max_length = None;
        assert_eq!(map_column_type(&unbounded), "VARCHAR");

        let mut flags = column("bit");
        flags.char_max_length = Some(8);
        assert_eq!(map_column_type(&flags), "BIT(8)");

        let mut mask = column("bit varying");
        mask.char_max_length = Some(64);
        assert_eq!(map_column_type(&mask), "VARBIT(64)");
        mask.char_max_length = None;
        assert_eq!(map_column_type(&mask), "VARBIT");

        let mut money = column("numeric");
        money.numeric_precision = Some(10);
        money.numeric_scale = Some(2);
        assert_eq!(map_column_type(&money), "NUMERIC(10,2)");

        money.numeric_scale = Some(0);
        assert_eq!(map_column_type(&money), "NUMERIC(10)");

        assert_eq!(map_column_type(&column("numeric")), "NUMERIC");
    }

    #[test]
    fn maps_arrays_and_user_types() {
        let mut tags = column("ARRAY");
        tags.udt_name = "_text".into();
        assert_eq!(map_column_type(&tags), "TEXT[]");

        let mut mood = column("USER-DEFINED");
        mood.udt_name = "Mood".into();
        assert_eq!(map_column_type(&mood), "\"Mood\"");
    }

    #[test]
    fn unknown_types_pass_through() {
        assert_eq!(map_column_type(&column("tsvector")), "tsvector");
        assert_eq!(map_column_type(&column("geometry(Point,4326)")), "geometry(Point,4326)");
    }
}
