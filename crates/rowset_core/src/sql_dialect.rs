use crate::Value;
use crate::sql_type::SqlType;

/// Database-specific SQL syntax (quoting, escaping, literals, row limits).
pub trait SqlDialect: Send + Sync {
    /// Quote an identifier (table/column name) when it needs it.
    fn quote_identifier(&self, name: &str) -> String;

    /// Escape a string for use inside a single-quoted literal.
    fn escape_string(&self, s: &str) -> String {
        s.replace('\'', "''")
    }

    /// Render literal text for a column of the given type.
    ///
    /// `None` becomes the `NULL` keyword. Character and temporal types are
    /// single-quoted, everything else is emitted as-is.
    fn literal(&self, text: Option<&str>, sql_type: SqlType) -> String {
        match text {
            None => "NULL".to_string(),
            Some(text) if sql_type.needs_quoted_literal() => {
                format!("'{}'", self.escape_string(text))
            }
            Some(text) => text.to_string(),
        }
    }

    /// Convert a Value to a SQL literal for a column of the given type.
    fn value_to_literal(&self, value: &Value, sql_type: SqlType) -> String {
        self.literal(value.as_literal_text().as_deref(), sql_type)
    }

    /// Clause limiting a DELETE or UPDATE to `count` rows.
    fn row_limit_clause(&self, count: usize) -> String {
        format!("ROWS {}", count)
    }
}

/// Dialect emitting plain identifiers and `ROWS n` limits.
///
/// Identifiers are left bare unless they contain characters that require
/// double quotes.
pub struct DefaultSqlDialect;

impl SqlDialect for DefaultSqlDialect {
    fn quote_identifier(&self, name: &str) -> String {
        if is_plain_identifier(name) {
            return name.to_string();
        }

        let escaped = name.replace('"', "\"\"");
        format!("\"{}\"", escaped)
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
}
