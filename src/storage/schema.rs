use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '[]',
            images TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            is_pinned INTEGER NOT NULL DEFAULT 0,
            is_archived INTEGER NOT NULL DEFAULT 0,
            is_trashed INTEGER NOT NULL DEFAULT 0,
            is_password_protected INTEGER NOT NULL DEFAULT 0,
            password TEXT,
            CHECK (NOT (is_archived = 1 AND is_trashed = 1))
        );

        CREATE INDEX IF NOT EXISTS notes_updated_at ON notes(updated_at DESC);
        "#,
    )
    .context("applying schema migrations")?;
    Ok(())
}
