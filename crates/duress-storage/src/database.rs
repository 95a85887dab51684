//! SQLite-backed tier
//!
//! The encrypted tier is a SQLCipher database keyed with the raw tier key;
//! the boot-accessible tier is the same table layout without a key.

use crate::backend::{Entry, TierBackend};
use crate::security::TierKey;
use crate::tier::TierKind;
use crate::value::{StoredValue, Value, ValueKind};
use crate::{migrations, Error, Result};
use parking_lot::Mutex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};

const UPSERT_SQL: &str = "INSERT INTO preferences (key, kind, value) VALUES (?1, ?2, ?3) \
     ON CONFLICT(key) DO UPDATE SET kind = excluded.kind, value = excluded.value";

/// One tier stored in a SQLite database file
pub struct SqliteTier {
    conn: Mutex<Connection>,
    kind: TierKind,
    path: PathBuf,
}

impl SqliteTier {
    /// Open (or create) the encrypted tier
    pub fn open_encrypted<P: AsRef<Path>>(path: P, key: &TierKey) -> Result<Self> {
        Self::open(path.as_ref(), Some(key))
    }

    /// Open (or create) the boot-accessible tier
    pub fn open_plain<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path.as_ref(), None)
    }

    fn open(path: &Path, key: Option<&TierKey>) -> Result<Self> {
        let db_exists = path.exists();
        let kind = if key.is_some() {
            TierKind::Encrypted
        } else {
            TierKind::BootAccessible
        };

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // PRAGMA key must be the first statement on the connection, or
        // SQLCipher creates the file unencrypted.
        if let Some(key) = key {
            apply_key(&conn, key)?;
        }

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA synchronous=FULL;")?;

        if key.is_some() {
            verify_cipher(&conn, path, db_exists)?;
        }

        migrations::run_migrations(&conn)?;

        tracing::debug!(tier = %kind, path = %path.display(), "Opened tier database");

        Ok(Self {
            conn: Mutex::new(conn),
            kind,
            path: path.to_path_buf(),
        })
    }

    /// Tier this database backs
    pub fn kind(&self) -> TierKind {
        self.kind
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn apply_key(conn: &Connection, key: &TierKey) -> Result<()> {
    let literal = key.pragma_literal();
    // PRAGMA key may return a row ("ok") depending on the SQLCipher build
    if let Err(e) = conn.execute(&format!("PRAGMA key = {};", literal.as_str()), []) {
        if !e.to_string().contains("Execute returned results") {
            return Err(Error::Encryption(format!(
                "Failed to set database encryption key: {}",
                e
            )));
        }
    }
    Ok(())
}

fn verify_cipher(conn: &Connection, path: &Path, db_exists: bool) -> Result<()> {
    let cipher_version: std::result::Result<String, rusqlite::Error> =
        conn.query_row("PRAGMA cipher_version", [], |row| row.get(0));

    match cipher_version {
        Ok(version) if !version.is_empty() => {
            tracing::debug!("SQLCipher version: {}", version);
        }
        Ok(_) | Err(_) => {
            return Err(Error::Encryption(
                "SQLCipher encryption verification failed. Tier may not be encrypted.".to_string(),
            ));
        }
    }

    // An existing file must be readable with this key
    if db_exists {
        let readable: std::result::Result<i64, rusqlite::Error> =
            conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get(0));
        if readable.is_err() {
            tracing::warn!(path = %path.display(), "Encrypted tier exists but cannot be read");
            return Err(Error::Encryption(
                "Cannot read encrypted tier: it may have been created with a different key."
                    .to_string(),
            ));
        }
    }

    Ok(())
}

fn decode(kind: &str, raw: ValueRef<'_>) -> StoredValue {
    let value = match (ValueKind::parse(kind), raw) {
        (Some(ValueKind::Bool), ValueRef::Integer(i)) => Some(Value::Bool(i != 0)),
        (Some(ValueKind::Int), ValueRef::Integer(i)) => Some(Value::Int(i)),
        (Some(ValueKind::Str), ValueRef::Text(t)) => {
            std::str::from_utf8(t).ok().map(|s| Value::Str(s.to_string()))
        }
        _ => None,
    };

    match value {
        Some(v) => StoredValue::Known(v),
        None => StoredValue::Unrecognized {
            kind: kind.to_string(),
        },
    }
}

fn encode(value: &Value) -> SqlValue {
    match value {
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Str(s) => SqlValue::Text(s.clone()),
    }
}

impl TierBackend for SqliteTier {
    fn get_raw(&self, key: &str) -> Result<Option<StoredValue>> {
        let conn = self.conn.lock();
        let stored = conn
            .query_row(
                "SELECT kind, value FROM preferences WHERE key = ?1",
                [key],
                |row| {
                    let kind: String = row.get(0)?;
                    Ok(decode(&kind, row.get_ref(1)?))
                },
            )
            .optional()?;
        Ok(stored)
    }

    fn set_raw(&self, key: &str, value: &Value) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(UPSERT_SQL, params![key, value.kind().as_str(), encode(value)])?;
        Ok(())
    }

    fn set_many(&self, entries: &[(String, Value)]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for (key, value) in entries {
            tx.execute(UPSERT_SQL, params![key, value.kind().as_str(), encode(value)])?;
        }
        tx.commit()?;
        Ok(())
    }

    fn enumerate(&self) -> Result<Vec<Entry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key, kind, value FROM preferences ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let kind: String = row.get(1)?;
            Ok(Entry {
                key,
                value: decode(&kind, row.get_ref(2)?),
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
