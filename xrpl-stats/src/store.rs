//! Shared on-disk cache between the server process and the widget process.
//!
//! A narrow key/value interface over SQLite: snapshot records keyed by
//! (network, mode), plus one unkeyed active-selection record. One writer
//! process, one concurrent reader process; SQLite's per-key atomicity is
//! the only coordination.

use crate::{
    error::Error,
    network::{Network, RefreshMode},
    snapshot::Snapshot,
};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use tracing::{debug, warn};

pub struct SharedStore {
    conn: Connection,
}

impl SharedStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL lets the widget process read while the server writes.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS active_selection (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                network TEXT NOT NULL,
                mode TEXT NOT NULL
            )",
            [],
        )?;

        debug!("shared store ready");
        Ok(Self { conn })
    }

    fn cache_key(network: Network, mode: RefreshMode) -> String {
        format!(
            "xrpl.cache.{}.{}",
            network.short_name().replace(' ', "-"),
            mode.mode_name().replace(' ', "-"),
        )
    }

    /// Write `snapshot` under its (network, mode) key, unconditionally
    /// overwriting any prior value. Last write wins.
    pub fn put(
        &self,
        network: Network,
        mode: RefreshMode,
        snapshot: &Snapshot,
    ) -> Result<(), Error> {
        let key = Self::cache_key(network, mode);
        let value = serde_json::to_string(snapshot)?;

        self.conn.execute(
            "INSERT INTO snapshots (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp()],
        )?;

        debug!(key, total = snapshot.total_transactions, "snapshot stored");
        Ok(())
    }

    /// Read the snapshot for (network, mode).
    ///
    /// A never-written key and a corrupt or incompatible payload both read
    /// as `None`; the consumer never sees a hard failure here.
    pub fn get(&self, network: Network, mode: RefreshMode) -> Option<Snapshot> {
        let key = Self::cache_key(network, mode);

        let value: String = self
            .conn
            .query_row(
                "SELECT value FROM snapshots WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .unwrap_or_else(|err| {
                warn!(key, %err, "snapshot read failed");
                None
            })?;

        match serde_json::from_str(&value) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(key, %err, "stored snapshot is corrupt, treating as absent");
                None
            }
        }
    }

    /// Record the primary consumer's current (network, mode) choice.
    pub fn set_active_selection(&self, network: Network, mode: RefreshMode) -> Result<(), Error> {
        self.conn.execute(
            "INSERT INTO active_selection (id, network, mode) VALUES (0, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET network = excluded.network, mode = excluded.mode",
            params![network.display_name(), mode.mode_name()],
        )?;
        Ok(())
    }

    /// The primary consumer's last recorded choice, if any. Unreadable or
    /// unrecognized records read as `None`.
    pub fn active_selection(&self) -> Option<(Network, RefreshMode)> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT network, mode FROM active_selection WHERE id = 0",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .unwrap_or_else(|err| {
                warn!(%err, "active selection read failed");
                None
            });

        let (network, mode) = row?;
        Some((
            Network::from_display_name(&network)?,
            RefreshMode::from_mode_name(&mode)?,
        ))
    }
}
