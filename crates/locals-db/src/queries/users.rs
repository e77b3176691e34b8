use rusqlite::{Connection, Row, types::Type};
use tracing::info;

use locals_types::models::{AuthProvider, UserId};

use crate::models::{NewUser, ProfileUpdate, UserRow};
use crate::queries::{OptionalExt, conflict_on_constraint};
use crate::{Database, Result, StoreError};

const USER_COLUMNS: &str = "id, username, email, password, first_name, last_name, bio, profile_pic,
     is_traveler, is_host, auth_provider, created_at";

impl Database {
    /// Creates an account. The username doubles as the email address.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<UserId> {
        self.with_conn(|conn| insert_user(conn, user))
    }

    pub fn get_user_by_id(&self, id: UserId) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    /// Logs in or signs up an OAuth identity.
    ///
    /// An existing account must have been created through the same provider;
    /// otherwise the login is rejected with `Conflict`. Returns the user and
    /// whether it was created by this call.
    pub fn find_or_create_oauth_user(
        &self,
        email: &str,
        provider: AuthProvider,
        first_name: &str,
        last_name: &str,
    ) -> Result<(UserRow, bool)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if let Some(existing) = query_user(&tx, "email = ?1", email)? {
                if existing.auth_provider != provider {
                    return Err(StoreError::Conflict(format!(
                        "Account for this email uses {} sign-in",
                        existing.auth_provider
                    )));
                }
                return Ok((existing, false));
            }

            let id = insert_user(
                &tx,
                &NewUser {
                    username: email,
                    password_hash: None,
                    first_name,
                    last_name,
                    is_traveler: true,
                    is_host: false,
                    auth_provider: provider,
                },
            )?;
            let created = query_user(&tx, "id = ?1", id)?.ok_or(StoreError::NotFound("User"))?;
            tx.commit()?;

            info!("Created {} account {} for {}", provider, id, email);
            Ok((created, true))
        })
    }

    pub fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> Result<UserRow> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET
                    first_name  = COALESCE(?2, first_name),
                    last_name   = COALESCE(?3, last_name),
                    bio         = COALESCE(?4, bio),
                    profile_pic = COALESCE(?5, profile_pic),
                    is_host     = COALESCE(?6, is_host),
                    is_traveler = COALESCE(?7, is_traveler)
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    update.first_name,
                    update.last_name,
                    update.bio,
                    update.profile_pic,
                    update.is_host,
                    update.is_traveler,
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("User"));
            }
            query_user(conn, "id = ?1", id)?.ok_or(StoreError::NotFound("User"))
        })
    }
}

fn insert_user(conn: &Connection, user: &NewUser<'_>) -> Result<UserId> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 OR email = ?1)",
        [user.username],
        |row| row.get(0),
    )?;
    if taken {
        return Err(StoreError::Conflict("Username already exists".into()));
    }

    conn.execute(
        "INSERT INTO users (username, email, password, first_name, last_name, is_traveler, is_host, auth_provider)
         VALUES (?1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            user.username,
            user.password_hash,
            user.first_name,
            user.last_name,
            user.is_traveler,
            user.is_host,
            user.auth_provider.as_str(),
        ],
    )
    .map_err(|e| conflict_on_constraint(e, "Username already exists"))?;

    Ok(conn.last_insert_rowid())
}

fn query_user<P: rusqlite::ToSql>(conn: &Connection, predicate: &str, value: P) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}");
    conn.query_row(&sql, [value], map_user).optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    let provider: String = row.get(10)?;
    let auth_provider = provider
        .parse::<AuthProvider>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;

    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        bio: row.get(6)?,
        profile_pic: row.get(7)?,
        is_traveler: row.get(8)?,
        is_host: row.get(9)?,
        auth_provider,
        created_at: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_user(username: &str) -> NewUser<'_> {
        NewUser {
            username,
            password_hash: Some("hash"),
            first_name: "Ada",
            last_name: "Lovelace",
            is_traveler: true,
            is_host: false,
            auth_provider: AuthProvider::Local,
        }
    }

    #[test]
    fn duplicate_username_conflicts() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_user(&local_user("ada@example.com")).unwrap();

        let err = db.create_user(&local_user("ada@example.com")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let user = db.get_user_by_email("ada@example.com").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, user.email);
        assert_eq!(user.auth_provider, AuthProvider::Local);
    }

    #[test]
    fn oauth_login_reuses_matching_provider() {
        let db = Database::open_in_memory().unwrap();
        let (first, created) = db
            .find_or_create_oauth_user("g@example.com", AuthProvider::Google, "G", "User")
            .unwrap();
        assert!(created);
        assert!(first.password.is_none());

        let (again, created) = db
            .find_or_create_oauth_user("g@example.com", AuthProvider::Google, "G", "User")
            .unwrap();
        assert!(!created);
        assert_eq!(again.id, first.id);
    }

    #[test]
    fn oauth_login_with_other_provider_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&local_user("ada@example.com")).unwrap();

        let err = db
            .find_or_create_oauth_user("ada@example.com", AuthProvider::Apple, "Ada", "L")
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn profile_update_is_partial() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_user(&local_user("ada@example.com")).unwrap();

        let updated = db
            .update_profile(
                id,
                &ProfileUpdate {
                    bio: Some("Engine enthusiast".into()),
                    is_host: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Engine enthusiast"));
        assert!(updated.is_host);
        assert_eq!(updated.first_name, "Ada");

        let err = db.update_profile(9999, &ProfileUpdate::default()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
