//! Unit tests for the LinkNest database layer (connection + migrations).

use linknest::database::migrations::{get_schema_version, run_all, CURRENT_SCHEMA_VERSION};
use linknest::database::Database;

#[test]
fn test_open_in_memory_succeeds() {
    let db = Database::open_in_memory();
    assert!(db.is_ok(), "open_in_memory should succeed");
}

#[test]
fn test_migrations_create_bookmarks_table() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let exists: bool = db
        .connection()
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='bookmarks'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);
    assert!(exists, "Table 'bookmarks' should exist after migrations");
}

#[test]
fn test_migrations_create_owner_index() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let exists: bool = db
        .connection()
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='index' AND name='idx_bookmarks_user_created'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);
    assert!(exists, "Owner index should exist after migrations");
}

#[test]
fn test_schema_version_is_current() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    assert_eq!(get_schema_version(db.connection()), CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_migrations_are_idempotent() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    // Running migrations a second time should not fail or add versions
    assert!(run_all(db.connection()).is_ok());
    let versions: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(versions, CURRENT_SCHEMA_VERSION as i64);
}

#[test]
fn test_open_file_database_creates_parent_dirs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("nested").join("linknest.db");

    let db = Database::open(&db_path);
    assert!(db.is_ok(), "open with file path should succeed");
    assert!(db_path.exists(), "Database file should exist on disk");
}

#[test]
fn test_bookmarks_table_schema() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();

    conn.execute(
        "INSERT INTO bookmarks (id, user_id, title, url, created_at)
         VALUES ('bk-1', 'user-1', 'Example', 'https://example.com', '2024-05-01T00:00:00Z')",
        [],
    )
    .expect("Should be able to insert into bookmarks table");

    let (tags, updated_at): (String, Option<String>) = conn
        .query_row(
            "SELECT tags, updated_at FROM bookmarks WHERE id = 'bk-1'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("Should be able to query bookmarks");

    assert_eq!(tags, "[]");
    assert!(updated_at.is_none());
}

#[test]
fn test_bookmark_ids_are_unique() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();
    let insert = "INSERT INTO bookmarks (id, user_id, title, url, created_at)
                  VALUES ('bk-1', 'user-1', 'A', 'https://a.io', '2024-05-01T00:00:00Z')";
    conn.execute(insert, []).unwrap();
    assert!(conn.execute(insert, []).is_err());
}
