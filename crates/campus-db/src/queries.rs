use crate::Database;
use crate::models::{GroupRow, MessageRow, format_timestamp, parse_timestamp};
use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use campus_types::models::{Group, Message, NewGroup, NewMessage, SortOrder};

impl Database {
    // -- Class groups --

    /// Insert a group. Callers are expected to pass a normalized `NewGroup`.
    pub fn create_group(&self, group: &NewGroup) -> Result<Group> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO class_groups
                    (id, subject_name, building, floor_number, classroom_number, time_slot, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id.to_string(),
                    group.subject_name,
                    group.building,
                    group.floor_number,
                    group.classroom_number,
                    group.time_slot,
                    format_timestamp(created_at),
                ],
            )?;
            Ok(())
        })?;

        // Round-trip through the stored text so the returned value matches reads.
        self.get_group(id)?
            .ok_or_else(|| anyhow::anyhow!("class group {} vanished after insert", id))
    }

    /// All groups, newest first.
    pub fn list_groups(&self) -> Result<Vec<Group>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, subject_name, building, floor_number, classroom_number, time_slot, created_at
                 FROM class_groups
                 ORDER BY created_at DESC, id DESC",
            )?;

            let rows = stmt
                .query_map([], group_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(Group::try_from).collect()
        })
    }

    pub fn get_group(&self, id: Uuid) -> Result<Option<Group>> {
        self.with_conn(|conn| query_group(conn, id))
    }

    // -- Messages --

    /// Append a message to a group's log. Returns `None` when the group does
    /// not exist. The insert hook stages the message before the writer is
    /// released, so staging order is append order; it is told about the
    /// commit only after the writer is free again.
    pub fn append_message(&self, group_id: Uuid, message: &NewMessage) -> Result<Option<Message>> {
        let stored = self.with_conn_mut(|conn| {
            if query_group(conn, group_id)?.is_none() {
                return Ok(None);
            }

            let gid = group_id.to_string();

            // Never stamp a message earlier than the newest one in its group,
            // so timestamp order and id order agree.
            let newest: Option<String> = conn.query_row(
                "SELECT MAX(created_at) FROM messages WHERE group_id = ?1",
                [&gid],
                |row| row.get(0),
            )?;
            let mut created_at = Utc::now();
            if let Some(newest) = newest {
                created_at = created_at.max(parse_timestamp(&newest)?);
            }
            let stamp = format_timestamp(created_at);

            conn.execute(
                "INSERT INTO messages (group_id, author, body, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![gid, message.author(), message.body(), stamp],
            )?;

            let stored = Message::try_from(MessageRow {
                id: conn.last_insert_rowid(),
                group_id: gid,
                author: message.author().to_string(),
                body: message.body().to_string(),
                created_at: stamp,
            })?;

            debug!("Appended message {} to group {}", stored.id, group_id);
            self.stage_insert(&stored);

            Ok(Some(stored))
        })?;

        if stored.is_some() {
            self.commit_insert(group_id);
        }
        Ok(stored)
    }

    /// Messages of one group by ordering key. `limit` of `None` returns all.
    pub fn query_messages(
        &self,
        group_id: Uuid,
        order: SortOrder,
        limit: Option<u32>,
    ) -> Result<Vec<Message>> {
        self.with_conn(|conn| query_messages(conn, group_id, order, limit))
    }
}

fn group_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        id: row.get(0)?,
        subject_name: row.get(1)?,
        building: row.get(2)?,
        floor_number: row.get(3)?,
        classroom_number: row.get(4)?,
        time_slot: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn query_group(conn: &Connection, id: Uuid) -> Result<Option<Group>> {
    let mut stmt = conn.prepare(
        "SELECT id, subject_name, building, floor_number, classroom_number, time_slot, created_at
         FROM class_groups
         WHERE id = ?1",
    )?;

    let row = stmt.query_row([id.to_string()], group_from_row).optional()?;

    row.map(Group::try_from).transpose()
}

fn query_messages(
    conn: &Connection,
    group_id: Uuid,
    order: SortOrder,
    limit: Option<u32>,
) -> Result<Vec<Message>> {
    let sql = match order {
        SortOrder::Asc => {
            "SELECT id, group_id, author, body, created_at
             FROM messages
             WHERE group_id = ?1
             ORDER BY created_at ASC, id ASC
             LIMIT ?2"
        }
        SortOrder::Desc => {
            "SELECT id, group_id, author, body, created_at
             FROM messages
             WHERE group_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2"
        }
    };

    // SQLite treats a negative LIMIT as unbounded.
    let limit = limit.map_or(-1, i64::from);

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(rusqlite::params![group_id.to_string(), limit], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                group_id: row.get(1)?,
                author: row.get(2)?,
                body: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(Message::try_from).collect()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
