use crate::error::{Result, VaultError};
use crate::registry::NodeInfo;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One row per logical file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub file_id: String,
    pub file_name: String,
    pub file_type: String,
    pub chunk_count: u32,
    /// Empty for a zero-byte file.
    #[serde(rename = "firstChunkNodeID")]
    pub first_chunk_node_id: String,
    pub first_chunk_node_url: String,
    pub merkle_root_hash: String,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// Location of one chunk. Never mutated after upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub file_id: String,
    pub file_name: String,
    pub chunk_index: u32,
    #[serde(rename = "chunkNodeID")]
    pub chunk_node_id: String,
    pub chunk_node_url: String,
    pub chunk_hash: String,
    #[serde(rename = "nextChunkNodeID")]
    pub next_chunk_node_id: String,
    pub next_chunk_node_url: String,
}

/// Listing view of a file: no hashes, no node addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub file_id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub chunk_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl From<FileMetadata> for FileSummary {
    fn from(meta: FileMetadata) -> Self {
        Self {
            file_id: meta.file_id,
            file_name: meta.file_name,
            file_type: meta.file_type,
            file_size: meta.file_size,
            chunk_count: meta.chunk_count,
            created_at: meta.created_at,
            last_modified: meta.last_modified,
            last_accessed: meta.last_accessed,
        }
    }
}

const FILE_COLUMNS: &str = "file_id, file_name, file_type, chunk_count, first_chunk_node_id,
     first_chunk_node_url, merkle_root_hash, file_size, created_at, last_modified, last_accessed";

const CHUNK_COLUMNS: &str = "chunk_id, file_id, file_name, chunk_index, chunk_node_id,
     chunk_node_url, chunk_hash, next_chunk_node_id, next_chunk_node_url";

pub struct MetadataStore {
    db_path: PathBuf,
}

impl MetadataStore {
    /// Opens (creating if needed) the database at `db_path`.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self { db_path };
        store.init_schema()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn get_conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS file_metadata (
                file_id TEXT PRIMARY KEY,
                file_name TEXT NOT NULL,
                file_type TEXT NOT NULL,
                chunk_count INTEGER NOT NULL,
                first_chunk_node_id TEXT NOT NULL,
                first_chunk_node_url TEXT NOT NULL,
                merkle_root_hash TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                last_modified TEXT NOT NULL,
                last_accessed TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunk_records (
                chunk_id TEXT PRIMARY KEY,
                file_id TEXT NOT NULL,
                file_name TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                chunk_node_id TEXT NOT NULL,
                chunk_node_url TEXT NOT NULL,
                chunk_hash TEXT NOT NULL,
                next_chunk_node_id TEXT NOT NULL,
                next_chunk_node_url TEXT NOT NULL,
                UNIQUE (file_id, chunk_index)
            );

            CREATE INDEX IF NOT EXISTS idx_chunk_records_file_id
                ON chunk_records(file_id);",
        )?;

        Ok(())
    }

    /// Writes the file row and all of its chunk records atomically.
    pub fn put_file(&self, meta: &FileMetadata, records: &[ChunkRecord]) -> Result<()> {
        let file_size = i64::try_from(meta.file_size).map_err(|_| {
            VaultError::InvalidRequest(format!("file size {} out of range", meta.file_size))
        })?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            &format!(
                "INSERT INTO file_metadata ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                FILE_COLUMNS
            ),
            params![
                meta.file_id,
                meta.file_name,
                meta.file_type,
                meta.chunk_count,
                meta.first_chunk_node_id,
                meta.first_chunk_node_url,
                meta.merkle_root_hash,
                file_size,
                meta.created_at.to_rfc3339(),
                meta.last_modified.to_rfc3339(),
                meta.last_accessed.to_rfc3339(),
            ],
        )?;

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO chunk_records ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                CHUNK_COLUMNS
            ))?;
            for record in records {
                stmt.execute(params![
                    record.chunk_id,
                    record.file_id,
                    record.file_name,
                    record.chunk_index,
                    record.chunk_node_id,
                    record.chunk_node_url,
                    record.chunk_hash,
                    record.next_chunk_node_id,
                    record.next_chunk_node_url,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get_file(&self, file_id: &str) -> Result<Option<FileMetadata>> {
        let conn = self.get_conn()?;
        let meta = conn
            .query_row(
                &format!("SELECT {} FROM file_metadata WHERE file_id = ?1", FILE_COLUMNS),
                [file_id],
                file_from_row,
            )
            .optional()?;
        Ok(meta)
    }

    /// All files, oldest first.
    pub fn list_files(&self) -> Result<Vec<FileMetadata>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM file_metadata ORDER BY created_at, file_id",
            FILE_COLUMNS
        ))?;
        let files = stmt
            .query_map([], file_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    pub fn list_chunks(&self, file_id: &str) -> Result<Vec<ChunkRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM chunk_records WHERE file_id = ?1 ORDER BY chunk_index",
            CHUNK_COLUMNS
        ))?;
        let chunks = stmt
            .query_map([file_id], chunk_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(chunks)
    }

    /// Distinct nodes owning at least one chunk of `file_id`, in order of
    /// the lowest chunk index each one holds.
    pub fn list_chunk_nodes(&self, file_id: &str) -> Result<Vec<NodeInfo>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT chunk_node_id, chunk_node_url, MIN(chunk_index) AS first_index
             FROM chunk_records WHERE file_id = ?1
             GROUP BY chunk_node_id, chunk_node_url
             ORDER BY first_index",
        )?;
        let nodes = stmt
            .query_map([file_id], |row| {
                Ok(NodeInfo::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(nodes)
    }

    /// Returns false if the file does not exist.
    pub fn touch_last_accessed(&self, file_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            "UPDATE file_metadata SET last_accessed = ?1 WHERE file_id = ?2",
            params![at.to_rfc3339(), file_id],
        )?;
        Ok(updated > 0)
    }

    /// Removes the file row and its chunk records together.
    pub fn delete_file(&self, file_id: &str) -> Result<bool> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM chunk_records WHERE file_id = ?1", [file_id])?;
        let deleted = tx.execute("DELETE FROM file_metadata WHERE file_id = ?1", [file_id])?;
        tx.commit()?;
        Ok(deleted > 0)
    }
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_size(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileMetadata> {
    Ok(FileMetadata {
        file_id: row.get(0)?,
        file_name: row.get(1)?,
        file_type: row.get(2)?,
        chunk_count: row.get(3)?,
        first_chunk_node_id: row.get(4)?,
        first_chunk_node_url: row.get(5)?,
        merkle_root_hash: row.get(6)?,
        file_size: parse_size(row, 7)?,
        created_at: parse_timestamp(row, 8)?,
        last_modified: parse_timestamp(row, 9)?,
        last_accessed: parse_timestamp(row, 10)?,
    })
}

fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<ChunkRecord> {
    Ok(ChunkRecord {
        chunk_id: row.get(0)?,
        file_id: row.get(1)?,
        file_name: row.get(2)?,
        chunk_index: row.get(3)?,
        chunk_node_id: row.get(4)?,
        chunk_node_url: row.get(5)?,
        chunk_hash: row.get(6)?,
        next_chunk_node_id: row.get(7)?,
        next_chunk_node_url: row.get(8)?,
    })
}
