//! DDL for DuckDB-backed target tables

/// Statement creating a target table if it does not exist yet.
///
/// Every entity gets its own table with a unique business key, the record as
/// JSON and the two audit timestamps (RFC 3339 text). `key_parts` keeps the
/// individual components of composite keys.
pub fn create_target_table(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS "{table}" (
    business_key VARCHAR PRIMARY KEY,
    key_parts JSON NOT NULL,
    record JSON NOT NULL,
    created_at VARCHAR NOT NULL,
    updated_at VARCHAR NOT NULL
);
"#
    )
}

/// Upsert statement for a target table
pub fn upsert_row(table: &str) -> String {
    format!(
        r#"INSERT INTO "{table}" (business_key, key_parts, record, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT (business_key) DO UPDATE SET
    record = excluded.record,
    updated_at = excluded.updated_at"#
    )
}

/// Point lookup by business key
pub fn select_row(table: &str) -> String {
    format!(
        r#"SELECT record, created_at, updated_at FROM "{table}" WHERE business_key = ?1"#
    )
}

/// Full scan ordered by business key
pub fn select_all(table: &str) -> String {
    format!(
        r#"SELECT key_parts, record, created_at, updated_at FROM "{table}" ORDER BY business_key"#
    )
}

/// Row count
pub fn count_rows(table: &str) -> String {
    format!(r#"SELECT COUNT(*) FROM "{table}""#)
}

/// Existence check against the information schema
pub fn table_exists() -> &'static str {
    "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?1"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_quote_table() {
        assert!(create_target_table("dim_products").contains(r#""dim_products""#));
        assert!(upsert_row("dim_products").contains("ON CONFLICT (business_key)"));
        assert!(!upsert_row("dim_products").contains("created_at = excluded"));
    }
}
