//! User handlers

use super::repo::{get_enum, get_json, get_ts, store_now, to_json, to_millis, Database};
use crate::error::{Error, Result};
use crate::types::*;
use chrono::Duration;
use rusqlite::{params, OptionalExtension, Row};

/// Default page size for [`Database::list_users`]
pub const DEFAULT_USER_LIMIT: usize = 50;

impl Database {
    /// Look up a user by email through the email index
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT * FROM users WHERE email = ?1 LIMIT 1",
            [email],
            Self::row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Get a user by ID
    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.connection();
        conn.query_row("SELECT * FROM users WHERE id = ?1", [id], Self::row_to_user)
            .optional()
            .map_err(Error::from)
    }

    /// List users, newest first.
    ///
    /// Only one filter narrows the scan: `role` when present, otherwise
    /// `status`. When both are given, `status` is ignored.
    pub fn list_users(&self, filter: &UserFilter, limit: usize) -> Result<Vec<User>> {
        let conn = self.connection();

        let (sql, value) = if let Some(role) = filter.role {
            ("SELECT * FROM users WHERE role = ?1", Some(role.as_str()))
        } else if let Some(status) = filter.status {
            ("SELECT * FROM users WHERE status = ?1", Some(status.as_str()))
        } else {
            ("SELECT * FROM users", None)
        };
        let sql = format!("{sql} ORDER BY creation_time DESC, rowid DESC LIMIT {limit}");

        let mut stmt = conn.prepare(&sql)?;
        let users = match value {
            Some(value) => stmt.query_map([value], Self::row_to_user)?,
            None => stmt.query_map([], Self::row_to_user)?,
        }
        .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Create a user. Fails with [`Error::DuplicateEmail`] before any write
    /// when the email is already taken.
    pub fn create_user(&self, input: &NewUser) -> Result<String> {
        if self.get_user_by_email(&input.email)?.is_some() {
            tracing::debug!(email = %input.email, "Rejected duplicate email");
            return Err(Error::DuplicateEmail(input.email.clone()));
        }

        let now = store_now();
        let user = User {
            id: new_id(),
            creation_time: now,
            email: input.email.clone(),
            name: input.name.clone(),
            role: input.role,
            status: UserStatus::Active,
            phone: input.phone.clone(),
            company: input.company.clone(),
            preferences: UserPreferences::default(),
            metadata: UserMetadata::new(now),
        };

        let conn = self.connection();
        conn.execute(
            r#"
            INSERT INTO users (id, creation_time, email, name, role, status, phone, company,
                               preferences, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                user.id,
                to_millis(user.creation_time),
                user.email,
                user.name,
                user.role.as_str(),
                user.status.as_str(),
                user.phone,
                user.company,
                to_json(&user.preferences)?,
                to_json(&user.metadata)?,
            ],
        )?;

        tracing::info!(user_id = %user.id, role = %user.role, "Created user");
        Ok(user.id)
    }

    /// Merge `patch` into the user and stamp `metadata.updatedAt`
    pub fn update_user(&self, id: &str, patch: &UserPatch) -> Result<String> {
        let mut user = self.require_user(id)?;

        if let Some(name) = &patch.name {
            user.name = name.clone();
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(status) = patch.status {
            user.status = status;
        }
        if let Some(phone) = &patch.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(company) = &patch.company {
            user.company = Some(company.clone());
        }
        if let Some(preferences) = &patch.preferences {
            user.preferences = preferences.clone();
        }
        user.metadata.updated_at = store_now();

        self.save_user(&user)?;
        tracing::info!(user_id = %id, "Updated user");
        Ok(user.id)
    }

    /// Record a login: stamps `lastLogin` and `updatedAt`
    pub fn update_last_login(&self, id: &str) -> Result<String> {
        let mut user = self.require_user(id)?;

        let now = store_now();
        user.metadata.last_login = Some(now);
        user.metadata.updated_at = now;

        self.save_user(&user)?;
        tracing::debug!(user_id = %id, "Recorded login");
        Ok(user.id)
    }

    /// Soft delete: the user becomes inactive and stays in the store
    pub fn soft_delete_user(&self, id: &str) -> Result<String> {
        let mut user = self.require_user(id)?;

        user.status = UserStatus::Inactive;
        user.metadata.updated_at = store_now();

        self.save_user(&user)?;
        tracing::info!(user_id = %id, "Deactivated user");
        Ok(user.id)
    }

    /// Aggregate counts over every user
    pub fn user_stats(&self) -> Result<UserStats> {
        let users = {
            let conn = self.connection();
            let mut stmt = conn.prepare("SELECT * FROM users")?;
            let users = stmt
                .query_map([], Self::row_to_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            users
        };

        let recent_cutoff = store_now() - Duration::days(RECENT_LOGIN_WINDOW_DAYS);
        let mut stats = UserStats::default();

        for user in &users {
            stats.total += 1;
            match user.status {
                UserStatus::Active => stats.active += 1,
                UserStatus::Inactive => stats.inactive += 1,
                UserStatus::Suspended => stats.suspended += 1,
            }
            match user.role {
                UserRole::Admin => stats.by_role.admin += 1,
                UserRole::User => stats.by_role.user += 1,
                UserRole::Agent => stats.by_role.agent += 1,
            }
            if user
                .metadata
                .last_login
                .map_or(false, |login| login >= recent_cutoff)
            {
                stats.recent_logins += 1;
            }
        }

        Ok(stats)
    }

    fn require_user(&self, id: &str) -> Result<User> {
        self.get_user(id)?
            .ok_or_else(|| Error::not_found("user", id))
    }

    fn save_user(&self, user: &User) -> Result<()> {
        let conn = self.connection();
        conn.execute(
            r#"
            UPDATE users SET name = ?2, role = ?3, status = ?4, phone = ?5, company = ?6,
                             preferences = ?7, metadata = ?8
            WHERE id = ?1
            "#,
            params![
                user.id,
                user.name,
                user.role.as_str(),
                user.status.as_str(),
                user.phone,
                user.company,
                to_json(&user.preferences)?,
                to_json(&user.metadata)?,
            ],
        )?;
        Ok(())
    }

    fn row_to_user(row: &Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get("id")?,
            creation_time: get_ts(row, "creation_time")?,
            email: row.get("email")?,
            name: row.get("name")?,
            role: get_enum(row, "role")?,
            status: get_enum(row, "status")?,
            phone: row.get("phone")?,
            company: row.get("company")?,
            preferences: get_json(row, "preferences")?,
            metadata: get_json(row, "metadata")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn new_user(email: &str, role: UserRole) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "A".to_string(),
            role,
            phone: None,
            company: None,
        }
    }

    #[test]
    fn test_create_initializes_defaults() {
        let db = test_db();
        let id = db.create_user(&new_user("a@x.com", UserRole::User)).unwrap();

        let user = db.get_user(&id).unwrap().unwrap();
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.preferences, UserPreferences::default());
        assert_eq!(user.metadata.created_at, user.metadata.updated_at);
        assert!(user.metadata.last_login.is_none());
        assert_eq!(db.get_user_by_email("a@x.com").unwrap().unwrap().id, id);
        assert!(db.get_user_by_email("nobody@x.com").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_performs_no_write() {
        let db = test_db();
        db.create_user(&new_user("a@x.com", UserRole::User)).unwrap();

        let err = db
            .create_user(&new_user("a@x.com", UserRole::Admin))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateEmail(ref email) if email == "a@x.com"));
        assert_eq!(db.user_stats().unwrap().total, 1);
    }

    #[test]
    fn test_update_preserves_metadata() {
        let db = test_db();
        let id = db.create_user(&new_user("a@x.com", UserRole::User)).unwrap();
        db.update_last_login(&id).unwrap();
        let before = db.get_user(&id).unwrap().unwrap();

        db.update_user(
            &id,
            &UserPatch {
                name: Some("Alice".to_string()),
                company: Some("Acme".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let after = db.get_user(&id).unwrap().unwrap();
        assert_eq!(after.name, "Alice");
        assert_eq!(after.company.as_deref(), Some("Acme"));
        assert_eq!(after.email, "a@x.com");
        assert_eq!(after.metadata.last_login, before.metadata.last_login);
        assert_eq!(after.metadata.created_at, before.metadata.created_at);
        assert!(after.metadata.updated_at >= before.metadata.updated_at);
    }

    #[test]
    fn test_missing_user_is_not_found() {
        let db = test_db();
        for result in [
            db.update_user("missing", &UserPatch::default()),
            db.update_last_login("missing"),
            db.soft_delete_user("missing"),
        ] {
            assert!(matches!(result, Err(Error::NotFound { entity: "user", .. })));
        }
    }

    #[test]
    fn test_soft_delete_keeps_document() {
        let db = test_db();
        let id = db.create_user(&new_user("a@x.com", UserRole::User)).unwrap();

        db.soft_delete_user(&id).unwrap();

        let user = db.get_user(&id).unwrap().unwrap();
        assert_eq!(user.status, UserStatus::Inactive);
    }

    #[test]
    fn test_list_uses_single_filter_dimension() {
        let db = test_db();
        let admin = db.create_user(&new_user("admin@x.com", UserRole::Admin)).unwrap();
        db.create_user(&new_user("u1@x.com", UserRole::User)).unwrap();
        let suspended_admin = db.create_user(&new_user("admin2@x.com", UserRole::Admin)).unwrap();
        db.update_user(
            &suspended_admin,
            &UserPatch {
                status: Some(UserStatus::Suspended),
                ..Default::default()
            },
        )
        .unwrap();

        // role drives the scan; status is accepted but not applied
        let filter = UserFilter {
            role: Some(UserRole::Admin),
            status: Some(UserStatus::Active),
        };
        let admins = db.list_users(&filter, DEFAULT_USER_LIMIT).unwrap();
        assert_eq!(admins.len(), 2);
        assert_eq!(admins[0].id, suspended_admin);
        assert_eq!(admins[1].id, admin);

        let suspended = db
            .list_users(
                &UserFilter {
                    status: Some(UserStatus::Suspended),
                    ..Default::default()
                },
                DEFAULT_USER_LIMIT,
            )
            .unwrap();
        assert_eq!(suspended.len(), 1);

        assert_eq!(db.list_users(&UserFilter::default(), 2).unwrap().len(), 2);
    }

    #[test]
    fn test_stats_counts_recent_logins() {
        let db = test_db();
        let a = db.create_user(&new_user("a@x.com", UserRole::Admin)).unwrap();
        let b = db.create_user(&new_user("b@x.com", UserRole::Agent)).unwrap();
        db.create_user(&new_user("c@x.com", UserRole::User)).unwrap();
        db.update_last_login(&a).unwrap();
        db.update_last_login(&b).unwrap();
        db.soft_delete_user(&b).unwrap();

        // push b's login outside the window
        let mut stale = db.get_user(&b).unwrap().unwrap();
        stale.metadata.last_login = Some(store_now() - Duration::days(8));
        db.save_user(&stale).unwrap();

        let stats = db.user_stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.inactive, 1);
        assert_eq!(stats.suspended, 0);
        assert_eq!(
            stats.by_role,
            RoleCounts {
                admin: 1,
                user: 1,
                agent: 1
            }
        );
        assert_eq!(stats.recent_logins, 1);
    }
}
