//! SQLite schema for the version store.

use rusqlite::Connection;

use crate::error::StoreResult;

/// Bumped whenever the DDL below changes shape.
pub const SCHEMA_VERSION: i64 = 1;

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id                     TEXT PRIMARY KEY,
    owner_id               TEXT NOT NULL,
    name                   TEXT NOT NULL,
    password_hash          TEXT,
    original_filename      TEXT NOT NULL,
    mime_type              TEXT NOT NULL,
    original_hash          TEXT,
    original_marker        INTEGER,
    original_secret_bound  INTEGER,
    original_content       TEXT,
    current_version_id     TEXT,
    status                 TEXT NOT NULL,
    required_signatures    INTEGER NOT NULL,
    created_at             TEXT NOT NULL,
    updated_at             TEXT NOT NULL,
    UNIQUE (owner_id, name)
);

CREATE TABLE IF NOT EXISTS versions (
    id                TEXT PRIMARY KEY,
    document_id       TEXT NOT NULL REFERENCES documents(id),
    version_number    INTEGER NOT NULL,
    stage             TEXT NOT NULL,
    hash              TEXT NOT NULL,
    freshness_marker  INTEGER NOT NULL,
    secret_bound      INTEGER NOT NULL,
    content_pointer   TEXT NOT NULL,
    tx_signature      TEXT,
    memo              TEXT,
    anchor_marker     INTEGER,
    created_by        TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    UNIQUE (document_id, version_number)
);

CREATE INDEX IF NOT EXISTS idx_versions_tx ON versions(tx_signature);
"#;

pub fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(DDL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn version_numbers_are_unique_per_document() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO documents (id, owner_id, name, original_filename, mime_type, \
             status, required_signatures, created_at, updated_at) \
             VALUES ('doc', 'o', 'n', 'f.pdf', 'application/pdf', 'awaiting_signatures', 1, 't', 't')",
            [],
        )
        .unwrap();
        let insert = "INSERT INTO versions (id, document_id, version_number, stage, hash, \
                      freshness_marker, secret_bound, content_pointer, created_by, created_at) \
                      VALUES (?1, 'doc', 1, 'unsigned', 'h', 0, 0, 'p', 'o', 't')";
        conn.execute(insert, ["a"]).unwrap();
        let err = conn.execute(insert, ["b"]).unwrap_err();
        assert!(matches!(
            crate::StoreError::from(err),
            crate::StoreError::Conflict(_)
        ));
    }
}
