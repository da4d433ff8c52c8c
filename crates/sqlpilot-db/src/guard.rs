//! Statement-type guard for queries headed to the database
//!
//! The generation service is instructed in prose never to produce DML,
//! but an instruction is not an enforcement. This guard is the code-level
//! check: anything that is not a plain `SELECT`/`WITH` read, or that
//! smuggles a mutating keyword anywhere in the statement, is rejected
//! before the gateway sees it.
//!
//! Keywords are matched on whole tokens, not substrings, so column names
//! like `created_at` or a CTE named `deleted` do not trip the guard.

use thiserror::Error;

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "TRUNCATE", "ALTER", "CREATE", "GRANT", "REVOKE",
    "REPLACE", "ATTACH", "DETACH", "PRAGMA", "VACUUM", "REINDEX",
];

/// Why a query was rejected by the read-only guard.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadOnlyViolation {
    #[error("only SELECT statements are allowed, found '{0}'")]
    NotSelect(String),

    #[error("{0} statements are not allowed")]
    ForbiddenKeyword(String),

    #[error("empty query")]
    Empty,
}

/// Reject anything that is not a read-only SELECT.
pub fn ensure_read_only(query: &str) -> Result<(), ReadOnlyViolation> {
    let mut tokens = tokenize(query);

    let Some(first) = tokens.next() else {
        return Err(ReadOnlyViolation::Empty);
    };
    if first != "SELECT" && first != "WITH" {
        return Err(ReadOnlyViolation::NotSelect(first));
    }

    for token in tokens {
        if FORBIDDEN_KEYWORDS.contains(&token.as_str()) {
            return Err(ReadOnlyViolation::ForbiddenKeyword(token));
        }
    }

    Ok(())
}

/// Upper-cased word tokens of a SQL string.
fn tokenize(query: &str) -> impl Iterator<Item = String> + '_ {
    query
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_and_cte_are_allowed() {
        assert!(ensure_read_only("SELECT * FROM orders").is_ok());
        assert!(ensure_read_only("select id, name from customers").is_ok());
        assert!(ensure_read_only("WITH cte AS (SELECT 1) SELECT * FROM cte").is_ok());
    }

    #[test]
    fn test_dml_is_rejected() {
        for query in [
            "INSERT INTO orders VALUES (1)",
            "UPDATE orders SET amount = 0",
            "DELETE FROM orders;",
            "DROP TABLE orders",
            "TRUNCATE orders",
        ] {
            let err = ensure_read_only(query).unwrap_err();
            assert!(matches!(err, ReadOnlyViolation::NotSelect(_)), "{query}");
        }
    }

    #[test]
    fn test_smuggled_keywords_are_rejected() {
        let err = ensure_read_only("SELECT 1; DROP TABLE orders").unwrap_err();
        assert_eq!(err, ReadOnlyViolation::ForbiddenKeyword("DROP".into()));

        let err = ensure_read_only("WITH x AS (SELECT 1) DELETE FROM orders").unwrap_err();
        assert_eq!(err, ReadOnlyViolation::ForbiddenKeyword("DELETE".into()));
    }

    #[test]
    fn test_keyword_like_identifiers_are_allowed() {
        assert!(ensure_read_only("SELECT created_at FROM orders").is_ok());
        assert!(ensure_read_only("SELECT update_count FROM stats").is_ok());
        assert!(ensure_read_only("WITH deleted_orders AS (SELECT 1) SELECT * FROM deleted_orders").is_ok());
    }

    #[test]
    fn test_empty_query_is_rejected() {
        assert_eq!(ensure_read_only("   "), Err(ReadOnlyViolation::Empty));
    }
}
