use tracing::{info, warn};

use locals_types::models::{DmPair, UserId};

use crate::{Database, Result, StoreError};

impl Database {
    /// Allows `requester` and `target` to message each other.
    ///
    /// The pair is canonicalized before both lookup and insert, so A→B and
    /// B→A land on the same row. Returns `true` if a new row was written.
    pub fn grant_dm(&self, requester: UserId, target: UserId) -> Result<bool> {
        let pair = DmPair::new(requester, target)
            .ok_or_else(|| StoreError::Invalid("Cannot start a DM with yourself".into()))?;

        self.with_conn(|conn| {
            let found: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE id IN (?1, ?2)",
                [pair.low(), pair.high()],
                |row| row.get(0),
            )?;
            if found < 2 {
                return Err(StoreError::NotFound("User"));
            }

            let inserted = conn.execute(
                "INSERT OR IGNORE INTO allowed_dms (user1_id, user2_id) VALUES (?1, ?2)",
                [pair.low(), pair.high()],
            )?;
            if inserted > 0 {
                info!("DM allowed between users {} and {}", pair.low(), pair.high());
            }
            Ok(inserted > 0)
        })
    }

    /// Counterparts `user` may message. Rows that fail to decode are skipped.
    pub fn list_dm_peers(&self, user: UserId) -> Result<Vec<UserId>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user1_id, user2_id FROM allowed_dms
                 WHERE user1_id = ?1 OR user2_id = ?1
                 ORDER BY id",
            )?;
            let rows = stmt.query_map([user], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, UserId>(1)?, row.get::<_, UserId>(2)?))
            })?;

            let mut peers = Vec::new();
            for row in rows {
                let (id, a, b) = match row {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        warn!("Skipping unreadable allowed_dms row for user {}: {}", user, e);
                        continue;
                    }
                };
                match DmPair::new(a, b).and_then(|pair| pair.peer_of(user)) {
                    Some(peer) => peers.push(peer),
                    None => warn!("Skipping malformed allowed_dms row {} ({}, {})", id, a, b),
                }
            }
            Ok(peers)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use locals_types::models::AuthProvider;

    fn user(db: &Database, username: &str) -> UserId {
        db.create_user(&NewUser {
            username,
            password_hash: Some("hash"),
            first_name: "",
            last_name: "",
            is_traveler: true,
            is_host: false,
            auth_provider: AuthProvider::Local,
        })
        .unwrap()
    }

    fn stored_pairs(db: &Database) -> Vec<(i64, i64)> {
        db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT user1_id, user2_id FROM allowed_dms ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .unwrap()
    }

    #[test]
    fn both_directions_share_one_row() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a@example.com");
        let b = user(&db, "b@example.com");

        assert!(db.grant_dm(b, a).unwrap());
        assert!(!db.grant_dm(a, b).unwrap());
        assert!(!db.grant_dm(b, a).unwrap());

        assert_eq!(stored_pairs(&db), vec![(a.min(b), a.max(b))]);
        assert_eq!(db.list_dm_peers(a).unwrap(), vec![b]);
        assert_eq!(db.list_dm_peers(b).unwrap(), vec![a]);
    }

    #[test]
    fn unknown_target_and_self() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a@example.com");

        assert!(matches!(db.grant_dm(a, a + 50), Err(StoreError::NotFound("User"))));
        assert!(matches!(db.grant_dm(a, a), Err(StoreError::Invalid(_))));
        assert!(db.list_dm_peers(a).unwrap().is_empty());
    }

    #[test]
    fn corrupt_rows_do_not_fail_listing() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a@example.com");
        let b = user(&db, "b@example.com");
        let c = user(&db, "c@example.com");
        db.grant_dm(a, b).unwrap();

        db.with_conn(|conn| {
            conn.pragma_update(None, "foreign_keys", "OFF")?;
            conn.execute(
                "INSERT INTO allowed_dms (user1_id, user2_id) VALUES (?1, 'not-a-user')",
                [a],
            )?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        })
        .unwrap();
        db.grant_dm(c, a).unwrap();

        assert_eq!(db.list_dm_peers(a).unwrap(), vec![b, c]);
    }
}
