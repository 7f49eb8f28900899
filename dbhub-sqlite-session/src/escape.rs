//! Identifier and value escaping (§4.1c). Used to synthesise the SQL the
//! diff engine (C2) emits and the on-the-fly index the row reader (C1) may
//! create.

/// Wrap an identifier in double quotes, doubling any embedded `"`.
pub fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// A SQLite cell value as read back from a prepared statement, used both to
/// render query results (§4.1b) and to synthesise diff/merge SQL (§4.2b).
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Render a value as a SQL literal suitable for splicing into generated
/// INSERT/UPDATE/DELETE statements (§4.1c).
pub fn quote_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => format!("{f:?}"),
        SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        SqlValue::Blob(bytes) => format!("x'{}'", hex::encode(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifier_with_embedded_quote() {
        assert_eq!(quote_identifier("weird\"table"), "\"weird\"\"table\"");
    }

    #[test]
    fn quotes_text_with_embedded_quote() {
        assert_eq!(
            quote_value(&SqlValue::Text("it's".to_string())),
            "'it''s'"
        );
    }

    #[test]
    fn quotes_blob_as_hex_literal() {
        assert_eq!(quote_value(&SqlValue::Blob(vec![0xde, 0xad])), "x'dead'");
    }

    #[test]
    fn quotes_null_and_numbers_verbatim() {
        assert_eq!(quote_value(&SqlValue::Null), "NULL");
        assert_eq!(quote_value(&SqlValue::Integer(-7)), "-7");
    }
}
