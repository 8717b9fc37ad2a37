//! Local identity store.
//!
//! Persists exactly three fields — `email`, `identifier`,
//! `is_authenticated` — as independent keys in a SQLite key-value table.
//! The record walks through three shapes:
//!
//! - fresh: all fields absent (never registered, or wiped)
//! - pending: email + identifier present, not yet verified
//! - authenticated: email + identifier present, verified
//!
//! Any other combination is corrupted and must be erased.

pub mod record;

pub use record::IdentityRecord;

use crate::error::ApiError;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const KEY_EMAIL: &str = "email";
const KEY_IDENTIFIER: &str = "identifier";
const KEY_IS_AUTHENTICATED: &str = "is_authenticated";

/// The two identity fields required before any authenticated remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFields {
    pub email: String,
    pub identifier: String,
}

/// SQLite-backed key-value store for the identity record.
pub struct IdentityStore {
    conn: Mutex<Connection>,
}

impl IdentityStore {
    /// Open (or create) the identity database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open identity store at {}", db_path.display()))?;

        // WAL mode for crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS identity (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Read the full identity record.
    pub fn load(&self) -> Result<IdentityRecord> {
        let conn = self.conn.lock();
        let email = Self::get_key(&conn, KEY_EMAIL)?;
        let identifier = Self::get_key(&conn, KEY_IDENTIFIER)?;
        let is_authenticated = Self::get_key(&conn, KEY_IS_AUTHENTICATED)?
            .map(|v| v == "true")
            .unwrap_or(false);

        Ok(IdentityRecord {
            email,
            identifier,
            is_authenticated,
        })
    }

    /// Persist a freshly registered identity in the pending state.
    pub fn save_registration(&self, email: &str, identifier: &str) -> Result<()> {
        let conn = self.conn.lock();
        Self::set_key(&conn, KEY_EMAIL, email)?;
        Self::set_key(&conn, KEY_IDENTIFIER, identifier)?;
        Self::set_key(&conn, KEY_IS_AUTHENTICATED, "false")?;
        Ok(())
    }

    /// Flip the record from pending to authenticated.
    pub fn mark_authenticated(&self) -> Result<()> {
        let conn = self.conn.lock();
        Self::set_key(&conn, KEY_IS_AUTHENTICATED, "true")?;
        Ok(())
    }

    /// Erase all three fields (reset, logout, corruption recovery).
    pub fn clear(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM identity WHERE key IN (?1, ?2, ?3)",
            params![KEY_EMAIL, KEY_IDENTIFIER, KEY_IS_AUTHENTICATED],
        )?;
        Ok(())
    }

    /// Precondition guard for every authenticated remote call.
    ///
    /// Stricter than the consistency rule in one direction and looser in
    /// another: it only demands the two identity fields, so a pending
    /// record passes, but a record missing either field fails with
    /// `InvalidStorage` regardless of the authentication flag.
    pub fn require_auth_fields(&self) -> Result<Result<AuthFields, ApiError>> {
        let record = self.load()?;
        match (record.email, record.identifier) {
            (Some(email), Some(identifier)) => Ok(Ok(AuthFields { email, identifier })),
            _ => Ok(Err(ApiError::invalid_storage())),
        }
    }

    fn get_key(conn: &Connection, key: &str) -> Result<Option<String>> {
        let value = conn
            .query_row(
                "SELECT value FROM identity WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_key(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO identity (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}
