use crate::notifications::{Notification, NotificationStore, NotificationType};
use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_versioned_db, Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
    DEFAULT_TIMESTAMP,
};
use crate::user::*;
use anyhow::{bail, Context, Result};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::{
    path::Path,
    str::FromStr,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};
use tracing::{debug, info};

/// Notifications kept per user, older ones are evicted on insert.
pub const MAX_NOTIFICATIONS_PER_USER: usize = 100;

const USER_FOREIGN_KEY: ForeignKey = ForeignKey {
    foreign_table: "user",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

/// V 0
const USER_TABLE_V_0: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("role", &SqlType::Text, non_null = true),
        sqlite_column!("display_name", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[("idx_user_handle", "handle")],
};

const CUSTOMER_PROFILE_TABLE_V_0: Table = Table {
    name: "customer_profile",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            is_primary_key = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("phone", &SqlType::Text),
        sqlite_column!("default_address", &SqlType::Text),
    ],
    unique_constraints: &[],
    indices: &[],
};

const VENDOR_PROFILE_TABLE_V_0: Table = Table {
    name: "vendor_profile",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            is_primary_key = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("business_name", &SqlType::Text, non_null = true),
        sqlite_column!("location", &SqlType::Text),
        sqlite_column!("phone", &SqlType::Text),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!(
            "is_open",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("1")
        ),
    ],
    unique_constraints: &[],
    indices: &[],
};

const RIDER_PROFILE_TABLE_V_0: Table = Table {
    name: "rider_profile",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            is_primary_key = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("vehicle_type", &SqlType::Text),
        sqlite_column!("phone", &SqlType::Text),
        sqlite_column!(
            "is_available",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("1")
        ),
    ],
    unique_constraints: &[],
    indices: &[],
};

const AUTH_TOKEN_TABLE_V_0: Table = Table {
    name: "auth_token",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("value", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[("idx_auth_token_value", "value")],
};

const USER_PASSWORD_CREDENTIALS_V_0: Table = Table {
    name: "user_password_credentials",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            is_primary_key = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[],
};

/// V 1
const OIDC_SUBJECT_TABLE_V_1: Table = Table {
    name: "oidc_subject",
    columns: &[
        sqlite_column!(
            "subject",
            &SqlType::Text,
            is_primary_key = true,
            non_null = true
        ),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[("idx_oidc_subject_user", "user_id")],
};

const NOTIFICATION_TABLE_V_1: Table = Table {
    name: "notification",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Text,
            is_primary_key = true,
            non_null = true
        ),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("notification_type", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("body", &SqlType::Text),
        sqlite_column!("data", &SqlType::Text, non_null = true),
        sqlite_column!("read_at", &SqlType::Integer),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
    ],
    unique_constraints: &[],
    indices: &[("idx_notification_user", "user_id")],
};

const VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            USER_TABLE_V_0,
            CUSTOMER_PROFILE_TABLE_V_0,
            VENDOR_PROFILE_TABLE_V_0,
            RIDER_PROFILE_TABLE_V_0,
            AUTH_TOKEN_TABLE_V_0,
            USER_PASSWORD_CREDENTIALS_V_0,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[
            USER_TABLE_V_0,
            CUSTOMER_PROFILE_TABLE_V_0,
            VENDOR_PROFILE_TABLE_V_0,
            RIDER_PROFILE_TABLE_V_0,
            AUTH_TOKEN_TABLE_V_0,
            USER_PASSWORD_CREDENTIALS_V_0,
            OIDC_SUBJECT_TABLE_V_1,
            NOTIFICATION_TABLE_V_1,
        ],
        migration: Some(|conn: &Connection| {
            OIDC_SUBJECT_TABLE_V_1.create(conn)?;
            NOTIFICATION_TABLE_V_1.create(conn)?;
            Ok(())
        }),
    },
];

fn system_time_from_column_result(value: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(value.max(0) as u64)
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn role_from_column(row: &Row, idx: usize) -> rusqlite::Result<UserRole> {
    let raw: String = row.get(idx)?;
    UserRole::from_str(&raw).ok_or(rusqlite::Error::InvalidColumnType(
        idx,
        "role".to_string(),
        Type::Text,
    ))
}

fn auth_token_from_row(row: &Row) -> rusqlite::Result<AuthToken> {
    Ok(AuthToken {
        user_id: row.get(0)?,
        value: AuthTokenValue(row.get(1)?),
        created: system_time_from_column_result(row.get(2)?),
        last_used: row
            .get::<usize, Option<i64>>(3)?
            .map(system_time_from_column_result),
    })
}

fn notification_from_row(row: &Row) -> rusqlite::Result<Notification> {
    let type_raw: String = row.get(1)?;
    let notification_type = NotificationType::from_db_str(&type_raw).ok_or(
        rusqlite::Error::InvalidColumnType(1, "notification_type".to_string(), Type::Text),
    )?;
    let data_raw: String = row.get(4)?;
    Ok(Notification {
        id: row.get(0)?,
        notification_type,
        title: row.get(2)?,
        body: row.get(3)?,
        data: serde_json::from_str(&data_raw).unwrap_or(serde_json::Value::Null),
        read_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const NOTIFICATION_COLUMNS: &str = "id, notification_type, title, body, data, read_at, created_at";

fn write_profile(conn: &Connection, user_id: usize, profile: &Profile) -> Result<()> {
    match profile {
        Profile::Customer(p) => {
            conn.execute(
                "INSERT OR REPLACE INTO customer_profile (user_id, phone, default_address) VALUES (?1, ?2, ?3)",
                params![user_id, p.phone, p.default_address],
            )?;
        }
        Profile::Vendor(p) => {
            conn.execute(
                "INSERT OR REPLACE INTO vendor_profile (user_id, business_name, location, phone, description, is_open) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![user_id, p.business_name, p.location, p.phone, p.description, p.is_open],
            )?;
        }
        Profile::Rider(p) => {
            conn.execute(
                "INSERT OR REPLACE INTO rider_profile (user_id, vehicle_type, phone, is_available) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, p.vehicle_type, p.phone, p.is_available],
            )?;
        }
        Profile::Admin => {}
    }
    Ok(())
}

#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned_db(db_path, VERSIONED_SCHEMAS)?;
        Ok(SqliteUserStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn get_user_role(conn: &Connection, user_id: usize) -> Result<Option<UserRole>> {
        Ok(conn
            .query_row(
                "SELECT role FROM user WHERE id = ?1",
                params![user_id],
                |row| role_from_column(row, 0),
            )
            .optional()?)
    }
}

impl UserStore for SqliteUserStore {
    fn create_user(
        &self,
        user_handle: &str,
        display_name: &str,
        profile: &Profile,
    ) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO user (handle, role, display_name) VALUES (?1, ?2, ?3)",
            params![user_handle, profile.role().as_str(), display_name],
        )
        .with_context(|| format!("Failed to create user {}", user_handle))?;
        let user_id = tx.last_insert_rowid() as usize;
        write_profile(&tx, user_id, profile)?;
        tx.commit()?;
        info!(
            "Created {} user {} with id {}",
            profile.role().as_str(),
            user_handle,
            user_id
        );
        Ok(user_id)
    }

    fn get_user(&self, user_id: usize) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT id, handle, role, display_name, created FROM user WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        handle: row.get(1)?,
                        role: role_from_column(row, 2)?,
                        display_name: row.get(3)?,
                        created: row.get(4)?,
                    })
                },
            )
            .optional()?)
    }

    fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT id FROM user WHERE handle = ?1",
                params![user_handle],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn get_user_profile(&self, user_id: usize) -> Result<Option<Profile>> {
        let conn = self.conn.lock().unwrap();
        let role = match Self::get_user_role(&conn, user_id)? {
            Some(role) => role,
            None => return Ok(None),
        };
        let profile = match role {
            UserRole::Customer => conn
                .query_row(
                    "SELECT phone, default_address FROM customer_profile WHERE user_id = ?1",
                    params![user_id],
                    |row| {
                        Ok(Profile::Customer(CustomerProfile {
                            phone: row.get(0)?,
                            default_address: row.get(1)?,
                        }))
                    },
                )
                .optional()?,
            UserRole::Vendor => conn
                .query_row(
                    "SELECT business_name, location, phone, description, is_open FROM vendor_profile WHERE user_id = ?1",
                    params![user_id],
                    |row| {
                        Ok(Profile::Vendor(VendorProfile {
                            business_name: row.get(0)?,
                            location: row.get(1)?,
                            phone: row.get(2)?,
                            description: row.get(3)?,
                            is_open: row.get(4)?,
                        }))
                    },
                )
                .optional()?,
            UserRole::Rider => conn
                .query_row(
                    "SELECT vehicle_type, phone, is_available FROM rider_profile WHERE user_id = ?1",
                    params![user_id],
                    |row| {
                        Ok(Profile::Rider(RiderProfile {
                            vehicle_type: row.get(0)?,
                            phone: row.get(1)?,
                            is_available: row.get(2)?,
                        }))
                    },
                )
                .optional()?,
            UserRole::Admin => Some(Profile::Admin),
        };
        match profile {
            Some(profile) => Ok(Some(profile)),
            None => {
                debug!("User {} has no profile row, using defaults", user_id);
                Ok(Some(Profile::default_for(role, "")))
            }
        }
    }

    fn update_user_profile(&self, user_id: usize, profile: &Profile) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        match Self::get_user_role(&conn, user_id)? {
            Some(role) if role == profile.role() => write_profile(&conn, user_id, profile),
            Some(role) => bail!(
                "Cannot store a {} profile for {} user {}",
                profile.role().as_str(),
                role.as_str(),
                user_id
            ),
            None => bail!("User {} not found", user_id),
        }
    }

    fn update_display_name(&self, user_id: usize, display_name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE user SET display_name = ?1 WHERE id = ?2",
            params![display_name, user_id],
        )?;
        if updated == 0 {
            bail!("User {} not found", user_id);
        }
        Ok(())
    }

    fn list_vendors(&self) -> Result<Vec<VendorSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.display_name, v.business_name, v.location, v.description, v.is_open \
             FROM user u JOIN vendor_profile v ON v.user_id = u.id ORDER BY u.id",
        )?;
        let vendors = stmt
            .query_map(params![], vendor_summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(vendors)
    }

    fn get_vendor(&self, vendor_id: usize) -> Result<Option<VendorSummary>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT u.id, u.display_name, v.business_name, v.location, v.description, v.is_open \
                 FROM user u JOIN vendor_profile v ON v.user_id = u.id WHERE u.id = ?1",
                params![vendor_id],
                vendor_summary_from_row,
            )
            .optional()?)
    }

    fn get_user_id_by_oidc_subject(&self, subject: &str) -> Result<Option<usize>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT user_id FROM oidc_subject WHERE subject = ?1",
                params![subject],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn link_oidc_subject(&self, user_id: usize, subject: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO oidc_subject (subject, user_id) VALUES (?1, ?2)",
            params![subject, user_id],
        )
        .with_context(|| format!("Failed to link subject to user {}", user_id))?;
        Ok(())
    }

    fn count_users_created_between(&self, start: i64, end: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user WHERE created >= ?1 AND created < ?2",
            params![start, end],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn vendor_summary_from_row(row: &Row) -> rusqlite::Result<VendorSummary> {
    Ok(VendorSummary {
        id: row.get(0)?,
        display_name: row.get(1)?,
        business_name: row.get(2)?,
        location: row.get(3)?,
        description: row.get(4)?,
        is_open: row.get(5)?,
    })
}

impl UserAuthTokenStore for SqliteUserStore {
    fn get_user_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT user_id, value, created, last_used FROM auth_token WHERE value = ?1",
                params![value.0],
                auth_token_from_row,
            )
            .optional()?)
    }

    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let existing = self.get_user_auth_token(token)?;
        if existing.is_some() {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "DELETE FROM auth_token WHERE value = ?1",
                params![token.0],
            )?;
        }
        Ok(existing)
    }

    fn update_user_auth_token_last_used_timestamp(&self, token: &AuthTokenValue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE auth_token SET last_used = ?1 WHERE value = ?2",
            params![unix_now(), token.0],
        )?;
        Ok(())
    }

    fn add_user_auth_token(&self, token: &AuthToken) -> Result<()> {
        let created = token
            .created
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_else(|_| unix_now());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_token (user_id, value, created) VALUES (?1, ?2, ?3)",
            params![token.user_id, token.value.0, created],
        )?;
        Ok(())
    }

    fn prune_unused_auth_tokens(&self, unused_for_days: u64) -> Result<usize> {
        let cutoff = unix_now() - (unused_for_days as i64) * 24 * 60 * 60;
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM auth_token WHERE COALESCE(last_used, created) < ?1",
            params![cutoff],
        )?;
        Ok(deleted)
    }
}

impl UserAuthCredentialsStore for SqliteUserStore {
    fn get_password_credentials(&self, user_handle: &str) -> Result<Option<PasswordCredentials>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT c.user_id, c.salt, c.hash, c.hasher, c.created, c.last_used \
                 FROM user_password_credentials c JOIN user u ON u.id = c.user_id \
                 WHERE u.handle = ?1",
                params![user_handle],
                |row| {
                    Ok((
                        row.get::<usize, usize>(0)?,
                        row.get::<usize, String>(1)?,
                        row.get::<usize, String>(2)?,
                        row.get::<usize, String>(3)?,
                        row.get::<usize, i64>(4)?,
                        row.get::<usize, Option<i64>>(5)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((user_id, salt, hash, hasher, created, last_used)) => {
                let hasher = PasswordHasherKind::from_str(&hasher)
                    .with_context(|| format!("Invalid hasher for user {}", user_id))?;
                Ok(Some(PasswordCredentials {
                    user_id,
                    salt,
                    hash,
                    hasher,
                    created: system_time_from_column_result(created),
                    last_used: last_used.map(system_time_from_column_result),
                }))
            }
        }
    }

    fn set_password_credentials(&self, credentials: &PasswordCredentials) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO user_password_credentials (user_id, salt, hash, hasher) VALUES (?1, ?2, ?3, ?4)",
            params![
                credentials.user_id,
                credentials.salt,
                credentials.hash,
                credentials.hasher.to_string()
            ],
        )?;
        Ok(())
    }

    fn touch_password_credentials(&self, user_id: usize) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE user_password_credentials SET last_used = ?1 WHERE user_id = ?2",
            params![unix_now(), user_id],
        )?;
        Ok(())
    }
}

impl NotificationStore for SqliteUserStore {
    fn create_notification(
        &self,
        user_id: usize,
        notification_type: NotificationType,
        title: String,
        body: Option<String>,
        data: serde_json::Value,
    ) -> Result<Notification> {
        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            notification_type,
            title,
            body,
            data,
            read_at: None,
            created_at: unix_now(),
        };
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO notification (id, user_id, notification_type, title, body, data, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                notification.id,
                user_id,
                notification.notification_type.as_db_str(),
                notification.title,
                notification.body,
                notification.data.to_string(),
                notification.created_at,
            ],
        )
        .with_context(|| format!("Failed to create notification for user {}", user_id))?;
        let evicted = tx.execute(
            "DELETE FROM notification WHERE user_id = ?1 AND id NOT IN \
             (SELECT id FROM notification WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2)",
            params![user_id, MAX_NOTIFICATIONS_PER_USER],
        )?;
        tx.commit()?;
        if evicted > 0 {
            debug!(
                "Evicted {} old notifications for user {}",
                evicted, user_id
            );
        }
        Ok(notification)
    }

    fn get_user_notifications(&self, user_id: usize) -> Result<Vec<Notification>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notification WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
            NOTIFICATION_COLUMNS
        ))?;
        let notifications = stmt
            .query_map(params![user_id], notification_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notifications)
    }

    fn get_notification(
        &self,
        notification_id: &str,
        user_id: usize,
    ) -> Result<Option<Notification>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {} FROM notification WHERE id = ?1 AND user_id = ?2",
                    NOTIFICATION_COLUMNS
                ),
                params![notification_id, user_id],
                notification_from_row,
            )
            .optional()?)
    }

    fn mark_notification_read(
        &self,
        notification_id: &str,
        user_id: usize,
    ) -> Result<Option<Notification>> {
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE notification SET read_at = ?1 WHERE id = ?2 AND user_id = ?3 AND read_at IS NULL",
                params![unix_now(), notification_id, user_id],
            )?;
        }
        self.get_notification(notification_id, user_id)
    }

    fn mark_all_notifications_read(&self, user_id: usize) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE notification SET read_at = ?1 WHERE user_id = ?2 AND read_at IS NULL",
            params![unix_now(), user_id],
        )?;
        Ok(updated)
    }

    fn get_unread_count(&self, user_id: usize) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notification WHERE user_id = ?1 AND read_at IS NULL",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
