use rusqlite::Connection;
use tracing::info;

use crate::Result;

/// Tags every deployment starts with.
pub const DEFAULT_TAGS: &[&str] = &["music", "performance", "class", "dance", "comedy", "play", "theatre"];

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                password        TEXT,
                first_name      TEXT NOT NULL DEFAULT '',
                last_name       TEXT NOT NULL DEFAULT '',
                bio             TEXT,
                profile_pic     TEXT,
                is_traveler     INTEGER NOT NULL DEFAULT 0,
                is_host         INTEGER NOT NULL DEFAULT 0,
                auth_provider   TEXT NOT NULL DEFAULT 'local',
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            );

            CREATE TABLE tags (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                tag_name    TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE events (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                title               TEXT NOT NULL,
                description         TEXT NOT NULL DEFAULT '',
                unique_aspect       TEXT NOT NULL DEFAULT '',
                host_id             INTEGER REFERENCES users(id) ON DELETE SET NULL,
                created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                number_of_guests    INTEGER DEFAULT 1,
                number_of_bookings  INTEGER NOT NULL DEFAULT 0 CHECK (number_of_bookings >= 0),
                occurence_date      TEXT,
                duration_minutes    INTEGER,
                location            TEXT NOT NULL,
                latitude            REAL,
                longitude           REAL,
                price_cents         INTEGER NOT NULL DEFAULT 0,
                photos              TEXT NOT NULL DEFAULT '[]'
            );

            CREATE INDEX idx_events_occurence ON events(occurence_date);
            CREATE INDEX idx_events_host ON events(host_id);

            CREATE TABLE event_tags (
                event_id    INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                tag_id      INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (event_id, tag_id)
            );

            CREATE TABLE bookings (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id    INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                guest_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                UNIQUE(event_id, guest_id)
            );

            CREATE INDEX idx_bookings_guest ON bookings(guest_id);

            CREATE TABLE reviews (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id    INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                text        TEXT NOT NULL,
                rating      INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            );

            CREATE INDEX idx_reviews_event ON reviews(event_id);

            -- One row per unordered pair, lower id first
            CREATE TABLE allowed_dms (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user1_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                user2_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                UNIQUE(user1_id, user2_id),
                CHECK (user1_id < user2_id)
            );

            CREATE INDEX idx_allowed_dms_user2 ON allowed_dms(user2_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

/// Inserts any missing default tags. Safe to run on every start.
pub fn seed_tags(conn: &Connection) -> Result<()> {
    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO tags (tag_name, description) VALUES (?1, ?2)")?;

    let mut created = 0;
    for tag in DEFAULT_TAGS {
        created += stmt.execute((tag, format!("{} events", capitalize(tag))))?;
    }

    if created > 0 {
        info!("Seeded {} default tags", created);
    }
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
