use rusqlite::TransactionBehavior;
use tracing::{debug, info};

use locals_types::models::{EventId, UserId};

use crate::models::{BookingOutcome, GuestBookingRow};
use crate::queries::{OptionalExt, parse_ts};
use crate::{Database, Result, StoreError};

impl Database {
    /// Books `guest` onto an event, or returns their existing booking.
    ///
    /// The insert and the `number_of_bookings` bump commit together in one
    /// immediate transaction, so repeated or concurrent calls for the same
    /// pair raise the count exactly once.
    pub fn register_booking(&self, event_id: EventId, guest_id: UserId) -> Result<BookingOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM events WHERE id = ?1)",
                [event_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::NotFound("Event"));
            }

            let inserted = tx.execute(
                "INSERT INTO bookings (event_id, guest_id) VALUES (?1, ?2)
                 ON CONFLICT(event_id, guest_id) DO NOTHING",
                [event_id, guest_id],
            )?;

            let outcome = if inserted == 1 {
                let booking_id = tx.last_insert_rowid();
                tx.execute(
                    "UPDATE events SET number_of_bookings = number_of_bookings + 1 WHERE id = ?1",
                    [event_id],
                )?;
                BookingOutcome::Created(booking_id)
            } else {
                let booking_id: i64 = tx.query_row(
                    "SELECT id FROM bookings WHERE event_id = ?1 AND guest_id = ?2",
                    [event_id, guest_id],
                    |row| row.get(0),
                )?;
                BookingOutcome::AlreadyExists(booking_id)
            };

            tx.commit()?;

            match outcome {
                BookingOutcome::Created(id) => {
                    info!("Booking {} created: user {} on event {}", id, guest_id, event_id)
                }
                BookingOutcome::AlreadyExists(id) => {
                    debug!("Booking {} already exists for user {} on event {}", id, guest_id, event_id)
                }
            }
            Ok(outcome)
        })
    }

    /// Removes a booking and recounts the event's bookings from the table.
    /// Returns the affected event id.
    pub fn delete_booking(&self, booking_id: i64) -> Result<EventId> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let event_id: EventId = tx
                .query_row("SELECT event_id FROM bookings WHERE id = ?1", [booking_id], |row| {
                    row.get(0)
                })
                .optional()?
                .ok_or(StoreError::NotFound("Booking"))?;

            tx.execute("DELETE FROM bookings WHERE id = ?1", [booking_id])?;
            tx.execute(
                "UPDATE events
                 SET number_of_bookings = (SELECT COUNT(*) FROM bookings WHERE event_id = ?1)
                 WHERE id = ?1",
                [event_id],
            )?;

            tx.commit()?;
            info!("Booking {} deleted from event {}", booking_id, event_id);
            Ok(event_id)
        })
    }

    pub fn list_guest_bookings(&self, guest_id: UserId) -> Result<Vec<GuestBookingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT b.id, e.id, e.title, e.occurence_date
                 FROM bookings b
                 JOIN events e ON e.id = b.event_id
                 WHERE b.guest_id = ?1
                 ORDER BY b.id",
            )?;
            let rows = stmt
                .query_map([guest_id], |row| {
                    let event_date: Option<String> = row.get(3)?;
                    Ok(GuestBookingRow {
                        id: row.get(0)?,
                        event_id: row.get(1)?,
                        event_title: row.get(2)?,
                        event_date: event_date.as_deref().and_then(parse_ts),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Live count of booking rows, independent of the stored aggregate.
    pub fn count_bookings(&self, event_id: EventId) -> Result<i64> {
        self.with_conn(|conn| {
            let count =
                conn.query_row("SELECT COUNT(*) FROM bookings WHERE event_id = ?1", [event_id], |row| {
                    row.get(0)
                })?;
            Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewEvent, NewUser};
    use locals_types::models::AuthProvider;

    fn user(db: &Database, username: &str) -> UserId {
        db.create_user(&NewUser {
            username,
            password_hash: Some("hash"),
            first_name: "",
            last_name: "",
            is_traveler: true,
            is_host: true,
            auth_provider: AuthProvider::Local,
        })
        .unwrap()
    }

    fn event(db: &Database, host_id: UserId) -> EventId {
        db.create_event(&NewEvent {
            title: "Walking tour",
            description: "",
            unique_aspect: "",
            host_id,
            number_of_guests: Some(10),
            occurence_date: None,
            duration_minutes: None,
            location: "Old town",
            latitude: None,
            longitude: None,
            price_cents: 0,
            photos: &[],
            tags: &[],
        })
        .unwrap()
    }

    fn stored_count(db: &Database, event_id: EventId) -> i64 {
        db.get_event(event_id).unwrap().unwrap().number_of_bookings
    }

    #[test]
    fn register_twice_counts_once() {
        let db = Database::open_in_memory().unwrap();
        let host = user(&db, "host@example.com");
        let guest = user(&db, "guest@example.com");
        let ev = event(&db, host);

        let first = db.register_booking(ev, guest).unwrap();
        let second = db.register_booking(ev, guest).unwrap();

        assert!(matches!(first, BookingOutcome::Created(_)));
        assert!(matches!(second, BookingOutcome::AlreadyExists(_)));
        assert_eq!(first.id(), second.id());
        assert_eq!(stored_count(&db, ev), 1);
    }

    #[test]
    fn register_on_missing_event() {
        let db = Database::open_in_memory().unwrap();
        let guest = user(&db, "guest@example.com");
        assert!(matches!(db.register_booking(42, guest), Err(StoreError::NotFound("Event"))));
    }

    #[test]
    fn delete_recounts() {
        let db = Database::open_in_memory().unwrap();
        let host = user(&db, "host@example.com");
        let a = user(&db, "a@example.com");
        let b = user(&db, "b@example.com");
        let ev = event(&db, host);

        let booking_a = db.register_booking(ev, a).unwrap().id();
        db.register_booking(ev, b).unwrap();

        // Simulate a drifted aggregate; delete must not just decrement it
        db.with_conn(|conn| {
            conn.execute("UPDATE events SET number_of_bookings = 7 WHERE id = ?1", [ev])?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.delete_booking(booking_a).unwrap(), ev);
        assert_eq!(stored_count(&db, ev), 1);
        assert_eq!(db.count_bookings(ev).unwrap(), 1);

        assert!(matches!(db.delete_booking(booking_a), Err(StoreError::NotFound("Booking"))));
    }

    #[test]
    fn guest_bookings_listing() {
        let db = Database::open_in_memory().unwrap();
        let host = user(&db, "host@example.com");
        let guest = user(&db, "guest@example.com");
        let ev = event(&db, host);
        db.register_booking(ev, guest).unwrap();

        let rows = db.list_guest_bookings(guest).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_id, ev);
        assert_eq!(rows[0].event_title, "Walking tour");
        assert!(rows[0].event_date.is_none());
        assert!(db.list_guest_bookings(host).unwrap().is_empty());
    }
}
