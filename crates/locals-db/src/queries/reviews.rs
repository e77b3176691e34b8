use locals_types::models::EventId;

use crate::models::ReviewRow;
use crate::{Database, Result, StoreError};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

impl Database {
    /// Appends a review. Several reviews per event (and per author) are allowed.
    pub fn create_review(&self, event_id: EventId, text: &str, rating: i64) -> Result<i64> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(StoreError::Invalid(format!(
                "Rating must be between {MIN_RATING} and {MAX_RATING}"
            )));
        }

        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM events WHERE id = ?1)",
                [event_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::NotFound("Event"));
            }

            conn.execute(
                "INSERT INTO reviews (event_id, text, rating) VALUES (?1, ?2, ?3)",
                rusqlite::params![event_id, text, rating],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Reviews for an event in the order they were written.
    pub fn list_reviews(&self, event_id: EventId) -> Result<Vec<ReviewRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, event_id, text, rating, created_at FROM reviews
                 WHERE event_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([event_id], |row| {
                    Ok(ReviewRow {
                        id: row.get(0)?,
                        event_id: row.get(1)?,
                        text: row.get(2)?,
                        rating: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewEvent, NewUser};
    use locals_types::models::AuthProvider;

    fn seeded_event(db: &Database) -> EventId {
        let host = db
            .create_user(&NewUser {
                username: "host@example.com",
                password_hash: Some("hash"),
                first_name: "",
                last_name: "",
                is_traveler: false,
                is_host: true,
                auth_provider: AuthProvider::Local,
            })
            .unwrap();
        db.create_event(&NewEvent {
            title: "Pottery class",
            description: "",
            unique_aspect: "",
            host_id: host,
            number_of_guests: Some(4),
            occurence_date: None,
            duration_minutes: Some(90),
            location: "Studio",
            latitude: None,
            longitude: None,
            price_cents: 4000,
            photos: &[],
            tags: &[],
        })
        .unwrap()
    }

    #[test]
    fn ratings_outside_range_are_rejected() {
        let db = Database::open_in_memory().unwrap();
        let ev = seeded_event(&db);

        for rating in [i64::MIN, -1, 0, 6, 100] {
            let err = db.create_review(ev, "nope", rating).unwrap_err();
            assert!(matches!(err, StoreError::Invalid(_)), "rating {rating}");
        }
        assert!(db.list_reviews(ev).unwrap().is_empty());
    }

    #[test]
    fn ratings_in_range_are_listed_in_order() {
        let db = Database::open_in_memory().unwrap();
        let ev = seeded_event(&db);

        for rating in MIN_RATING..=MAX_RATING {
            db.create_review(ev, &format!("{rating} stars"), rating).unwrap();
        }
        // Same text twice is fine
        db.create_review(ev, "5 stars", 5).unwrap();

        let reviews = db.list_reviews(ev).unwrap();
        let ratings: Vec<i64> = reviews.iter().map(|r| r.rating).collect();
        assert_eq!(ratings, vec![1, 2, 3, 4, 5, 5]);
        assert_eq!(reviews[0].text, "1 stars");
    }

    #[test]
    fn review_on_missing_event() {
        let db = Database::open_in_memory().unwrap();
        let err = db.create_review(404, "ghost", 3).unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Event")));
    }

    #[test]
    fn check_constraint_backs_validation() {
        let db = Database::open_in_memory().unwrap();
        let ev = seeded_event(&db);
        let result = db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reviews (event_id, text, rating) VALUES (?1, 'raw', 9)",
                [ev],
            )?;
            Ok(())
        });
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }
}
