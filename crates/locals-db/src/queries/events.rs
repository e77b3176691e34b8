use std::collections::HashMap;

use rusqlite::{Connection, Row};
use tracing::warn;

use locals_discovery::EventFilter;
use locals_types::models::{EventId, UserId};

use crate::models::{EventRow, NewEvent};
use crate::queries::{OptionalExt, format_ts, parse_ts, parse_ts_or_epoch};
use crate::{Database, Result, StoreError};

const EVENT_SELECT: &str = "SELECT e.id, e.title, e.description, e.unique_aspect, e.host_id,
            u.username, u.first_name, u.last_name, u.profile_pic,
            e.created_at, e.number_of_guests, e.number_of_bookings, e.occurence_date,
            e.duration_minutes, e.location, e.latitude, e.longitude, e.price_cents, e.photos
     FROM events e
     LEFT JOIN users u ON e.host_id = u.id";

impl Database {
    /// Inserts an event and links it to the named tags. Unknown tag names are skipped.
    pub fn create_event(&self, event: &NewEvent<'_>) -> Result<EventId> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO events (title, description, unique_aspect, host_id, number_of_guests,
                    occurence_date, duration_minutes, location, latitude, longitude, price_cents, photos)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    event.title,
                    event.description,
                    event.unique_aspect,
                    event.host_id,
                    event.number_of_guests,
                    event.occurence_date.as_ref().map(format_ts),
                    event.duration_minutes,
                    event.location,
                    event.latitude,
                    event.longitude,
                    event.price_cents,
                    serde_json::to_string(event.photos)?,
                ],
            )?;
            let event_id = tx.last_insert_rowid();

            {
                let mut link = tx.prepare(
                    "INSERT OR IGNORE INTO event_tags (event_id, tag_id)
                     SELECT ?1, id FROM tags WHERE tag_name = ?2",
                )?;
                for tag in event.tags {
                    if link.execute(rusqlite::params![event_id, tag])? == 0
                        && !tag_exists(&tx, tag)?
                    {
                        warn!("Ignoring unknown tag '{}' on event {}", tag, event_id);
                    }
                }
            }

            tx.commit()?;
            Ok(event_id)
        })
    }

    pub fn get_event(&self, id: EventId) -> Result<Option<EventRow>> {
        self.with_conn(|conn| {
            let sql = format!("{EVENT_SELECT} WHERE e.id = ?1");
            let row = conn.query_row(&sql, [id], map_event).optional()?;
            match row {
                Some(event) => Ok(attach_tags(conn, vec![event])?.pop()),
                None => Ok(None),
            }
        })
    }

    /// Runs a discovery query.
    ///
    /// Time window, age cutoff and availability narrow the candidates in SQL;
    /// tag and radius checks then run over what is left. Result order is by
    /// occurrence (undated last) when `sort_by_date` is set, else by id.
    pub fn list_events(&self, filter: &EventFilter) -> Result<Vec<EventRow>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(start) = filter.window.start {
            params.push(format_ts(&start));
            clauses.push("e.occurence_date >= ?");
        }
        if let Some(end) = filter.window.end {
            params.push(format_ts(&end));
            clauses.push("e.occurence_date < ?");
        }
        if let Some(cutoff) = filter.not_before {
            params.push(format_ts(&cutoff));
            clauses.push("(e.occurence_date IS NULL OR e.occurence_date >= ?)");
        }
        if filter.available_only {
            clauses.push("(e.number_of_guests IS NOT NULL AND e.number_of_bookings < e.number_of_guests)");
        }

        let mut sql = EVENT_SELECT.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        if filter.sort_by_date {
            sql.push_str(" ORDER BY e.occurence_date IS NULL, e.occurence_date ASC, e.id ASC");
        } else {
            sql.push_str(" ORDER BY e.id ASC");
        }

        let candidates = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), map_event)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            attach_tags(conn, rows)
        })?;

        Ok(filter.apply_post_filters(candidates))
    }

    pub fn list_hosted_events(&self, host_id: UserId) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            let sql = format!("{EVENT_SELECT} WHERE e.host_id = ?1 ORDER BY e.id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([host_id], map_event)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            attach_tags(conn, rows)
        })
    }

    /// Deletes an event owned by `actor`. Bookings, reviews and tag links cascade.
    pub fn delete_event(&self, id: EventId, actor: UserId) -> Result<()> {
        self.with_conn(|conn| {
            let host: Option<Option<UserId>> = conn
                .query_row("SELECT host_id FROM events WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;

            match host {
                None => Err(StoreError::NotFound("Event")),
                Some(Some(host_id)) if host_id == actor => {
                    conn.execute("DELETE FROM events WHERE id = ?1", [id])?;
                    Ok(())
                }
                Some(_) => Err(StoreError::Forbidden(
                    "Only the host can delete this event".into(),
                )),
            }
        })
    }

    pub fn event_exists(&self, id: EventId) -> Result<bool> {
        self.with_conn(|conn| {
            let exists =
                conn.query_row("SELECT EXISTS(SELECT 1 FROM events WHERE id = ?1)", [id], |row| {
                    row.get(0)
                })?;
            Ok(exists)
        })
    }
}

fn tag_exists(conn: &Connection, name: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tags WHERE tag_name = ?1)",
        [name],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn map_event(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    let id: EventId = row.get(0)?;

    let created_at: String = row.get(9)?;
    let occurence_raw: Option<String> = row.get(12)?;
    let occurence_date = occurence_raw.and_then(|raw| {
        let parsed = parse_ts(&raw);
        if parsed.is_none() {
            warn!("Corrupt occurence_date '{}' on event {}", raw, id);
        }
        parsed
    });

    let photos_raw: String = row.get(18)?;
    let photos = serde_json::from_str::<Vec<String>>(&photos_raw).unwrap_or_else(|e| {
        warn!("Corrupt photos on event {}: {}", id, e);
        Vec::new()
    });

    Ok(EventRow {
        id,
        title: row.get(1)?,
        description: row.get(2)?,
        unique_aspect: row.get(3)?,
        host_id: row.get(4)?,
        host_username: row.get(5)?,
        host_first_name: row.get(6)?,
        host_last_name: row.get(7)?,
        host_profile_pic: row.get(8)?,
        created_at: parse_ts_or_epoch(&created_at, "created_at", id),
        number_of_guests: row.get(10)?,
        number_of_bookings: row.get(11)?,
        occurence_date,
        duration_minutes: row.get(13)?,
        location: row.get(14)?,
        latitude: row.get(15)?,
        longitude: row.get(16)?,
        price_cents: row.get(17)?,
        photos,
        tags: Vec::new(),
    })
}

/// Event ids bound per tag query. SQLite caps host parameters at 32766.
const TAG_BATCH: usize = 500;

/// Batch-fetch tag names for the given events, one query per `TAG_BATCH` ids.
fn attach_tags(conn: &Connection, mut events: Vec<EventRow>) -> Result<Vec<EventRow>> {
    let mut by_event: HashMap<EventId, Vec<String>> = HashMap::new();

    for chunk in events.chunks(TAG_BATCH) {
        let placeholders: Vec<String> = (1..=chunk.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT et.event_id, t.tag_name FROM event_tags et
             JOIN tags t ON t.id = et.tag_id
             WHERE et.event_id IN ({})
             ORDER BY t.tag_name",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter().map(|e| e.id)), |row| {
            Ok((row.get::<_, EventId>(0)?, row.get::<_, String>(1)?))
        })?;
        for pair in rows {
            let (event_id, name) = pair?;
            by_event.entry(event_id).or_default().push(name);
        }
    }

    for event in &mut events {
        event.tags = by_event.remove(&event.id).unwrap_or_default();
    }

    Ok(events)
}
