use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::util::{ensure_parent_directory, now_utc_string};

pub struct RecordStore {
    connection: Connection,
}

impl RecordStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        ensure_parent_directory(db_path)?;
        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        configure_connection(&connection)?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory record store")?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    pub fn exists(&self, collection: &str, record_id: &str) -> Result<bool> {
        let found = self
            .connection
            .query_row(
                "SELECT 1 FROM records WHERE collection = ?1 AND record_id = ?2 LIMIT 1",
                params![collection, record_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn find_one<T: DeserializeOwned>(
        &self,
        collection: &str,
        record_id: &str,
    ) -> Result<Option<T>> {
        let body = self
            .connection
            .query_row(
                "
                SELECT body FROM records
                WHERE collection = ?1 AND record_id = ?2
                ORDER BY seq ASC
                LIMIT 1
                ",
                params![collection, record_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        body.map(|raw| {
            serde_json::from_str(&raw).with_context(|| {
                format!("malformed record in {collection} for identifier {record_id}")
            })
        })
        .transpose()
    }

    pub fn find_all<T: DeserializeOwned>(&self, collection: &str, record_id: &str) -> Result<Vec<T>> {
        let mut statement = self.connection.prepare(
            "
            SELECT body FROM records
            WHERE collection = ?1 AND record_id = ?2
            ORDER BY seq ASC
            ",
        )?;
        let mut rows = statement.query(params![collection, record_id])?;
        let mut out = Vec::<T>::new();

        while let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            let record = serde_json::from_str(&raw).with_context(|| {
                format!("malformed record in {collection} for identifier {record_id}")
            })?;
            out.push(record);
        }

        Ok(out)
    }

    pub fn insert_one<T: Serialize>(&self, collection: &str, record_id: &str, record: &T) -> Result<()> {
        let body = serde_json::to_string(record)
            .with_context(|| format!("failed to serialize record for {collection}"))?;
        self.connection.execute(
            "
            INSERT INTO records(collection, record_id, seq, body, created_at)
            VALUES(?1, ?2, COALESCE((SELECT MAX(seq) + 1 FROM records WHERE collection = ?1 AND record_id = ?2), 0), ?3, ?4)
            ",
            params![collection, record_id, body, now_utc_string()],
        )?;
        Ok(())
    }

    pub fn insert_many<T: Serialize>(
        &self,
        collection: &str,
        record_id: &str,
        records: &[T],
    ) -> Result<usize> {
        let tx = self.connection.unchecked_transaction()?;
        {
            let mut statement = tx.prepare(
                "
                INSERT INTO records(collection, record_id, seq, body, created_at)
                VALUES(?1, ?2, ?3, ?4, ?5)
                ",
            )?;
            let next_seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq) + 1, 0) FROM records WHERE collection = ?1 AND record_id = ?2",
                params![collection, record_id],
                |row| row.get(0),
            )?;
            let created_at = now_utc_string();

            for (index, record) in records.iter().enumerate() {
                let body = serde_json::to_string(record)
                    .with_context(|| format!("failed to serialize record for {collection}"))?;
                statement.execute(params![
                    collection,
                    record_id,
                    next_seq + index as i64,
                    body,
                    created_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    pub fn delete(&self, collection: &str, record_id: &str) -> Result<usize> {
        let removed = self.connection.execute(
            "DELETE FROM records WHERE collection = ?1 AND record_id = ?2",
            params![collection, record_id],
        )?;
        Ok(removed)
    }

    pub fn count(&self, collection: &str) -> Result<i64> {
        let count = self.connection.query_row(
            "SELECT COUNT(DISTINCT record_id) FROM records WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS records (
          collection TEXT NOT NULL,
          record_id TEXT NOT NULL,
          seq INTEGER NOT NULL,
          body TEXT NOT NULL,
          created_at TEXT NOT NULL,
          PRIMARY KEY(collection, record_id, seq)
        );
        ",
    )?;
    Ok(())
}
