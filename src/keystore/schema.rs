//! Database schema and migrations for the contact store.

use rusqlite::Connection;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 20240611;

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    if current_version < SCHEMA_VERSION {
        migrate(conn, current_version)?;
    }

    Ok(())
}

/// Run migrations from current version to latest.
fn migrate(conn: &Connection, from_version: u32) -> rusqlite::Result<()> {
    if from_version < 1 {
        migrate_v1(conn)?;
    }

    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}

/// Migration to version 1 - initial schema.
fn migrate_v1(conn: &Connection) -> rusqlite::Result<()> {
    // One row per unique (suffixed) fingerprint
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pubkeys (
            fingerprint TEXT PRIMARY KEY,
            family TEXT NOT NULL,
            material BLOB NOT NULL,
            expires_on INTEGER,
            last_check INTEGER,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS pubkey_longids (
            longid TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            PRIMARY KEY (longid, fingerprint),
            FOREIGN KEY (fingerprint) REFERENCES pubkeys(fingerprint) ON DELETE CASCADE
        ) WITHOUT ROWID",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS emails (
            email TEXT PRIMARY KEY,
            name TEXT,
            last_use INTEGER
        )",
        [],
    )?;

    // seq is a store-wide counter, higher means more recently linked
    conn.execute(
        "CREATE TABLE IF NOT EXISTS email_pubkeys (
            email TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            seq INTEGER NOT NULL,
            PRIMARY KEY (email, fingerprint),
            FOREIGN KEY (email) REFERENCES emails(email) ON DELETE CASCADE,
            FOREIGN KEY (fingerprint) REFERENCES pubkeys(fingerprint) ON DELETE CASCADE
        )",
        [],
    )?;

    // The primary key doubles as the sorted index scanned by prefix search
    conn.execute(
        "CREATE TABLE IF NOT EXISTS searchable (
            token TEXT NOT NULL,
            email TEXT NOT NULL,
            PRIMARY KEY (token, email),
            FOREIGN KEY (email) REFERENCES emails(email) ON DELETE CASCADE
        ) WITHOUT ROWID",
        [],
    )?;

    // Append-only. No foreign key: a fingerprint may be revoked before
    // its material is ever imported.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS revocations (
            fingerprint TEXT PRIMARY KEY
        ) WITHOUT ROWID",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pubkey_longids_fingerprint ON pubkey_longids(fingerprint)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_email_pubkeys_fingerprint ON email_pubkeys(fingerprint)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_searchable_email ON searchable(email)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn test_init_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        for table in [
            "pubkeys",
            "pubkey_longids",
            "emails",
            "email_pubkeys",
            "searchable",
            "revocations",
        ] {
            assert!(table_exists(&conn, table), "missing table {}", table);
        }
    }

    #[test]
    fn test_schema_version() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_init_schema_twice() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let rows: u32 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
