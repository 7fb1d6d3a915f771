//! SQL schema for the network index.
//!
//! Applied as a single batch when a database is opened; every statement is
//! idempotent so reopening an existing file is safe.

/// Returns the full SQL schema as a single batch string.
///
/// - `basins`: one row per basin (areas, Pfafstetter code, stream order)
/// - `upstream`: one row per (basin, upstream basin) pair
pub fn create_schema() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS basins (
        basin_id INTEGER PRIMARY KEY,
        area REAL NOT NULL,
        tot_area REAL NOT NULL,
        pfaf_id TEXT NOT NULL,
        stream_order INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_basins_pfaf ON basins(pfaf_id);

    CREATE TABLE IF NOT EXISTS upstream (
        basin_id INTEGER NOT NULL REFERENCES basins(basin_id),
        up_id INTEGER NOT NULL,
        PRIMARY KEY (basin_id, up_id)
    );
    CREATE INDEX IF NOT EXISTS idx_upstream_basin ON upstream(basin_id);
    "#
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn schema_is_valid_sql() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema())
            .expect("Schema SQL should be valid");
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();
        conn.execute_batch(create_schema()).unwrap();
    }

    #[test]
    fn schema_creates_tables_and_indexes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();

        for (kind, name) in [
            ("table", "basins"),
            ("table", "upstream"),
            ("index", "idx_basins_pfaf"),
            ("index", "idx_upstream_basin"),
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
                    [kind, name],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "{} '{}' should exist", kind, name);
        }
    }
}
