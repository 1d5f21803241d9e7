//! SQL statement detection and operation/table extraction.
//!
//! TCP captures from database clients usually carry wire-protocol framing
//! bytes before the statement text, so detection scans for the earliest SQL
//! verb anywhere in the payload rather than anchoring at offset 0.

const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "UPDATE", "DELETE", "INSERT", "ALTER", "CREATE", "DROP",
];

/// Object-kind and noise words between a DDL verb and the target name,
/// e.g. `CREATE UNIQUE INDEX IF NOT EXISTS idx_users ...`.
const DDL_NOISE: &[&str] = &[
    "TABLE", "INDEX", "DATABASE", "SCHEMA", "VIEW", "SEQUENCE", "TRIGGER", "FUNCTION",
    "PROCEDURE", "EXTENSION", "UNIQUE", "TEMPORARY", "TEMP", "OR", "REPLACE", "IF", "NOT",
    "EXISTS",
];

/// Byte offset of the earliest SQL verb in the payload, or `None` if the
/// payload does not look like SQL. Matching is case-insensitive; the
/// original text is left untouched.
pub fn sql_statement_offset(payload: &str) -> Option<usize> {
    let upper = payload.to_ascii_uppercase();
    SQL_KEYWORDS.iter().filter_map(|k| upper.find(k)).min()
}

/// Extract `(operation, table)` from a statement that starts at a SQL verb.
///
/// The operation is the verb itself, uppercased. The table is the
/// conventional target per verb: the identifier after `FROM` for
/// SELECT/DELETE, after `INTO` for INSERT, the next identifier for UPDATE,
/// and the identifier after the object kind for ALTER/CREATE/DROP. Schema
/// qualifiers and enclosing quotes are stripped from the label; the full
/// statement stays verbatim in the span.
pub fn parse_operation_and_table(sql: &str) -> (String, String) {
    let tokens: Vec<&str> = sql.split_whitespace().collect();
    let Some(first) = tokens.first() else {
        return (String::new(), String::new());
    };
    let op = first.to_ascii_uppercase();

    let table = match op.as_str() {
        "SELECT" | "DELETE" => token_after(&tokens, "FROM"),
        "INSERT" => token_after(&tokens, "INTO"),
        "UPDATE" => tokens.get(1).copied(),
        "ALTER" | "CREATE" | "DROP" => ddl_target(&tokens),
        _ => None,
    };

    (op, table.map(clean_identifier).unwrap_or_default())
}

fn token_after<'a>(tokens: &[&'a str], keyword: &str) -> Option<&'a str> {
    let idx = tokens.iter().position(|t| t.eq_ignore_ascii_case(keyword))?;
    tokens.get(idx + 1).copied()
}

fn ddl_target<'a>(tokens: &[&'a str]) -> Option<&'a str> {
    tokens
        .iter()
        .skip(1)
        .find(|t| !DDL_NOISE.iter().any(|n| t.eq_ignore_ascii_case(n)))
        .copied()
}

/// Strip quoting, anything from the first punctuation on (a column list
/// can follow the table name without whitespace) and the schema qualifier.
fn clean_identifier(token: &str) -> String {
    let token = token.trim_matches(|c| matches!(c, '"' | '\'' | '`'));
    let token = token
        .split(|c: char| matches!(c, '(' | ';' | ','))
        .next()
        .unwrap_or(token);
    let token = token.rsplit('.').next().unwrap_or(token);
    token
        .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_at_offset_zero() {
        assert_eq!(sql_statement_offset("SELECT id FROM users"), Some(0));
    }

    #[test]
    fn verb_after_framing_noise() {
        assert_eq!(
            sql_statement_offset("\u{0}\u{0}\u{10}SELECT id FROM users WHERE x=1"),
            Some(3)
        );
    }

    #[test]
    fn earliest_verb_wins() {
        // UPDATE appears before SELECT; the earliest occurrence is the
        // statement start regardless of keyword priority.
        let s = "UPDATE t SET a=(SELECT 1)";
        assert_eq!(sql_statement_offset(s), Some(0));
    }

    #[test]
    fn lowercase_detected() {
        assert_eq!(sql_statement_offset("select 1"), Some(0));
    }

    #[test]
    fn verb_at_end_of_capture_buffer() {
        // A verb whose last byte is the last byte of the capture.
        let mut buf = vec![b'x'; 256];
        buf[250..].copy_from_slice(b"SELECT");
        let payload = String::from_utf8(buf).unwrap();
        assert_eq!(sql_statement_offset(&payload), Some(250));
    }

    #[test]
    fn no_verb_is_none() {
        assert_eq!(sql_statement_offset("BINARYJUNK..."), None);
        assert_eq!(sql_statement_offset(""), None);
    }

    #[test]
    fn select_from() {
        let (op, table) = parse_operation_and_table("SELECT id FROM users WHERE x=1");
        assert_eq!(op, "SELECT");
        assert_eq!(table, "users");
    }

    #[test]
    fn select_without_from() {
        let (op, table) = parse_operation_and_table("SELECT 1");
        assert_eq!(op, "SELECT");
        assert_eq!(table, "");
    }

    #[test]
    fn delete_from() {
        let (op, table) = parse_operation_and_table("DELETE FROM sessions WHERE id=2");
        assert_eq!(op, "DELETE");
        assert_eq!(table, "sessions");
    }

    #[test]
    fn insert_into_with_column_list() {
        let (op, table) = parse_operation_and_table("INSERT INTO orders(id, total) VALUES (1, 2)");
        assert_eq!(op, "INSERT");
        assert_eq!(table, "orders");
    }

    #[test]
    fn identifier_truncated_at_first_punctuation() {
        // No whitespace between the table name and the column list.
        let (_, table) = parse_operation_and_table("INSERT INTO orders(id,total) VALUES (1,2)");
        assert_eq!(table, "orders");
        let (_, table) = parse_operation_and_table("DELETE FROM sessions;");
        assert_eq!(table, "sessions");
    }

    #[test]
    fn update_table() {
        let (op, table) = parse_operation_and_table("UPDATE accounts SET balance=0");
        assert_eq!(op, "UPDATE");
        assert_eq!(table, "accounts");
    }

    #[test]
    fn create_table_if_not_exists() {
        let (op, table) = parse_operation_and_table("CREATE TABLE IF NOT EXISTS metrics (v int)");
        assert_eq!(op, "CREATE");
        assert_eq!(table, "metrics");
    }

    #[test]
    fn drop_index() {
        let (op, table) = parse_operation_and_table("DROP INDEX idx_users");
        assert_eq!(op, "DROP");
        assert_eq!(table, "idx_users");
    }

    #[test]
    fn alter_table() {
        let (op, table) = parse_operation_and_table("ALTER TABLE users ADD COLUMN age int");
        assert_eq!(op, "ALTER");
        assert_eq!(table, "users");
    }

    #[test]
    fn schema_qualifier_stripped() {
        let (_, table) = parse_operation_and_table("SELECT * FROM public.users");
        assert_eq!(table, "users");
    }

    #[test]
    fn quoted_identifier_stripped() {
        let (_, table) = parse_operation_and_table("SELECT * FROM \"Users\"");
        assert_eq!(table, "Users");
        let (_, table) = parse_operation_and_table("SELECT * FROM `db`.`users`");
        assert_eq!(table, "users");
    }

    #[test]
    fn lowercase_statement_keeps_original_case_in_table() {
        let (op, table) = parse_operation_and_table("select id from Users");
        assert_eq!(op, "SELECT");
        assert_eq!(table, "Users");
    }
}
