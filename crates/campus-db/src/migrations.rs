use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS class_groups (
            id                  TEXT PRIMARY KEY,
            subject_name        TEXT NOT NULL,
            building            TEXT NOT NULL,
            floor_number        INTEGER NOT NULL,
            classroom_number    TEXT NOT NULL,
            time_slot           TEXT,
            created_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_class_groups_created
            ON class_groups(created_at);

        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id    TEXT NOT NULL REFERENCES class_groups(id),
            author      TEXT NOT NULL,
            body        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_group
            ON messages(group_id, created_at, id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
