//! Database row types: these map directly to SQLite rows.
//! Distinct from campus-types API models to keep the DB layer independent.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use campus_types::models::{Group, Message};

pub struct GroupRow {
    pub id: String,
    pub subject_name: String,
    pub building: String,
    pub floor_number: i32,
    pub classroom_number: String,
    pub time_slot: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: i64,
    pub group_id: String,
    pub author: String,
    pub body: String,
    pub created_at: String,
}

impl TryFrom<GroupRow> for Group {
    type Error = anyhow::Error;

    fn try_from(row: GroupRow) -> Result<Self> {
        Ok(Group {
            id: row
                .id
                .parse()
                .with_context(|| format!("corrupt class group id '{}'", row.id))?,
            subject_name: row.subject_name,
            building: row.building,
            floor_number: row.floor_number,
            classroom_number: row.classroom_number,
            time_slot: row.time_slot,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(Message {
            id: row.id,
            group_id: row.group_id.parse().with_context(|| {
                format!("corrupt group_id '{}' on message {}", row.group_id, row.id)
            })?,
            author: row.author,
            body: row.body,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

/// Fixed-width UTC form, so text comparison in SQL matches time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("corrupt timestamp '{}'", raw))?;
    Ok(ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formatted_timestamps_sort_like_time() {
        let early = Utc.with_ymd_and_hms(2026, 3, 1, 9, 5, 0).unwrap();
        let later = early + chrono::Duration::microseconds(7);

        let (a, b) = (format_timestamp(early), format_timestamp(later));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_timestamp(&b).unwrap(), later);
    }
}
