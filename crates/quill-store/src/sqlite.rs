use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use quill_types::{
    AnchorReceipt, ContentHash, ContentPointer, Digest, DocumentId, DocumentStatus, Memo, OwnerId,
    Timestamp, VersionId, VersionNumber, VersionStage,
};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::record::{
    AppendedVersion, CreatedDocument, DocumentRecord, NewDocument, NewVersion, VersionRecord,
};
use crate::schema;
use crate::traits::VersionStore;

/// How long a writer waits for another connection's write lock.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const DOCUMENT_COLUMNS: &str = "id, owner_id, name, password_hash, original_filename, mime_type, \
     original_hash, original_marker, original_secret_bound, original_content, current_version_id, \
     status, required_signatures, created_at, updated_at";

const VERSION_COLUMNS: &str = "id, document_id, version_number, stage, hash, freshness_marker, \
     secret_bound, content_pointer, tx_signature, memo, anchor_marker, created_by, created_at";

/// SQLite-backed version store.
///
/// Every write runs inside a `BEGIN IMMEDIATE` transaction: the database
/// write lock is taken before the current maximum version number is read,
/// so writers on separate connections (or processes) serialize on the
/// database and never assign the same number. `UNIQUE(document_id,
/// version_number)` backs this up.
pub struct SqliteVersionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteVersionStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_busy_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening version store");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")?;
        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory version store");
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `op` against the connection on the blocking thread pool.
    async fn with_conn<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| StoreError::Internal("connection lock poisoned".into()))?;
            op(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("store task failed: {e}")))?
    }
}

impl std::fmt::Debug for SqliteVersionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteVersionStore").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Column encoding
// ---------------------------------------------------------------------------

fn parse<T>(column: &str, value: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("{column} {value:?}: {e}")))
}

fn timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, value: &str) -> StoreResult<Timestamp> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("{column} {value:?}: {e}")))
}

fn marker_to_sql(marker: u64) -> StoreResult<i64> {
    i64::try_from(marker)
        .map_err(|_| StoreError::Internal(format!("freshness marker {marker} out of range")))
}

fn marker_from_sql(column: &str, value: i64) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} is negative: {value}")))
}

struct DocumentRow {
    id: String,
    owner: String,
    name: String,
    password_hash: Option<String>,
    original_filename: String,
    mime_type: String,
    original_hash: Option<String>,
    original_marker: Option<i64>,
    original_secret_bound: Option<bool>,
    original_content: Option<String>,
    current_version: Option<String>,
    status: String,
    required_signatures: u32,
    created_at: String,
    updated_at: String,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            name: row.get(2)?,
            password_hash: row.get(3)?,
            original_filename: row.get(4)?,
            mime_type: row.get(5)?,
            original_hash: row.get(6)?,
            original_marker: row.get(7)?,
            original_secret_bound: row.get(8)?,
            original_content: row.get(9)?,
            current_version: row.get(10)?,
            status: row.get(11)?,
            required_signatures: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }

    fn into_record(self) -> StoreResult<DocumentRecord> {
        let original_hash = match (self.original_hash, self.original_marker) {
            (Some(hex), Some(marker)) => Some(ContentHash::new(
                parse::<Digest>("original_hash", &hex)?,
                marker_from_sql("original_marker", marker)?,
                self.original_secret_bound.unwrap_or(false),
            )),
            _ => None,
        };
        Ok(DocumentRecord {
            id: parse("documents.id", &self.id)?,
            owner: OwnerId::new(self.owner).map_err(|e| StoreError::Corrupt(e.to_string()))?,
            name: self.name,
            password_hash: self.password_hash,
            original_filename: self.original_filename,
            mime_type: self.mime_type,
            original_hash,
            original_content: self
                .original_content
                .as_deref()
                .map(|p| parse::<ContentPointer>("original_content", p))
                .transpose()?,
            current_version: self
                .current_version
                .as_deref()
                .map(|v| parse::<VersionId>("current_version_id", v))
                .transpose()?,
            status: parse("status", &self.status)?,
            required_signatures: self.required_signatures,
            created_at: parse_timestamp("documents.created_at", &self.created_at)?,
            updated_at: parse_timestamp("documents.updated_at", &self.updated_at)?,
        })
    }
}

struct VersionRow {
    id: String,
    document_id: String,
    number: u32,
    stage: String,
    hash: String,
    freshness_marker: i64,
    secret_bound: bool,
    content: String,
    tx_signature: Option<String>,
    memo: Option<String>,
    anchor_marker: Option<i64>,
    created_by: String,
    created_at: String,
}

impl VersionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            document_id: row.get(1)?,
            number: row.get(2)?,
            stage: row.get(3)?,
            hash: row.get(4)?,
            freshness_marker: row.get(5)?,
            secret_bound: row.get(6)?,
            content: row.get(7)?,
            tx_signature: row.get(8)?,
            memo: row.get(9)?,
            anchor_marker: row.get(10)?,
            created_by: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    fn into_record(self) -> StoreResult<VersionRecord> {
        let anchor = match (self.tx_signature, self.memo, self.anchor_marker) {
            (Some(tx), Some(memo), Some(marker)) => Some(AnchorReceipt::new(
                tx,
                parse::<Memo>("memo", &memo)?,
                marker_from_sql("anchor_marker", marker)?,
            )),
            (None, None, None) => None,
            _ => return Err(StoreError::Corrupt(format!("version {} has a partial anchor", self.id))),
        };
        Ok(VersionRecord {
            id: parse("versions.id", &self.id)?,
            document_id: parse("document_id", &self.document_id)?,
            number: VersionNumber::new(self.number),
            stage: parse::<VersionStage>("stage", &self.stage)?,
            hash: ContentHash::new(
                parse::<Digest>("hash", &self.hash)?,
                marker_from_sql("freshness_marker", self.freshness_marker)?,
                self.secret_bound,
            ),
            content: parse("content_pointer", &self.content)?,
            anchor,
            created_by: OwnerId::new(self.created_by).map_err(|e| StoreError::Corrupt(e.to_string()))?,
            created_at: parse_timestamp("versions.created_at", &self.created_at)?,
        })
    }
}

fn insert_version(conn: &Connection, v: &VersionRecord) -> StoreResult<()> {
    let anchor_marker = v
        .anchor
        .as_ref()
        .map(|a| marker_to_sql(a.freshness_marker))
        .transpose()?;
    conn.execute(
        &format!(
            "INSERT INTO versions ({VERSION_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        params![
            v.id.to_string(),
            v.document_id.to_string(),
            v.number.get(),
            v.stage.as_str(),
            v.hash.to_hex(),
            marker_to_sql(v.hash.freshness_marker)?,
            v.hash.secret_bound,
            v.content.to_string(),
            v.anchor.as_ref().map(|a| a.tx_signature.as_str()),
            v.anchor.as_ref().map(|a| a.memo.to_string()),
            anchor_marker,
            v.created_by.as_str(),
            timestamp(&v.created_at),
        ],
    )?;
    Ok(())
}

fn query_document(conn: &Connection, id: &DocumentId) -> StoreResult<Option<DocumentRecord>> {
    conn.query_row(
        &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
        params![id.to_string()],
        DocumentRow::from_row,
    )
    .optional()?
    .map(DocumentRow::into_record)
    .transpose()
}

fn require_document(conn: &Connection, id: &DocumentId) -> StoreResult<DocumentRecord> {
    query_document(conn, id)?.ok_or_else(|| StoreError::document_not_found(id))
}

fn query_version(conn: &Connection, sql: &str, key: &str) -> StoreResult<Option<VersionRecord>> {
    conn.query_row(sql, params![key], VersionRow::from_row)
        .optional()?
        .map(VersionRow::into_record)
        .transpose()
}

fn new_version_record(document_id: DocumentId, number: VersionNumber, v: NewVersion) -> VersionRecord {
    VersionRecord {
        id: VersionId::new(),
        document_id,
        number,
        stage: v.stage,
        hash: v.hash,
        content: v.content,
        anchor: v.anchor,
        created_by: v.created_by,
        created_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// VersionStore
// ---------------------------------------------------------------------------

#[async_trait]
impl VersionStore for SqliteVersionStore {
    async fn create_document_with_version(&self, doc: NewDocument) -> StoreResult<CreatedDocument> {
        self.with_conn(move |conn| {
            let document_id = DocumentId::new();
            let version = new_version_record(document_id, VersionNumber::BASE, doc.first_version);
            let now = timestamp(&version.created_at);
            let original_marker = doc
                .original_hash
                .map(|h| marker_to_sql(h.freshness_marker))
                .transpose()?;

            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                &format!(
                    "INSERT INTO documents ({DOCUMENT_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    document_id.to_string(),
                    doc.owner.as_str(),
                    doc.name,
                    doc.password_hash,
                    doc.original_filename,
                    doc.mime_type,
                    doc.original_hash.map(|h| h.to_hex()),
                    original_marker,
                    doc.original_hash.map(|h| h.secret_bound),
                    doc.original_content.map(|p| p.to_string()),
                    version.id.to_string(),
                    doc.status.as_str(),
                    doc.required_signatures,
                    now,
                    now,
                ],
            )?;
            insert_version(&tx, &version)?;
            tx.commit()?;

            debug!(document = %document_id, version = %version.id, "document created");
            Ok(CreatedDocument {
                document_id,
                version_id: version.id,
                number: VersionNumber::BASE,
            })
        })
        .await
    }

    async fn add_version(
        &self,
        document_id: &DocumentId,
        version: NewVersion,
    ) -> StoreResult<AppendedVersion> {
        let document_id = *document_id;
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let document = require_document(&tx, &document_id)?;
            let max: Option<u32> = tx.query_row(
                "SELECT MAX(version_number) FROM versions WHERE document_id = ?1",
                params![document_id.to_string()],
                |row| row.get(0),
            )?;
            let number = max
                .map(|n| VersionNumber::new(n).next())
                .unwrap_or(VersionNumber::BASE);

            let next_status = match version.stage {
                VersionStage::Signed => {
                    let signed: u32 = tx.query_row(
                        "SELECT COUNT(*) FROM versions WHERE document_id = ?1 AND stage = ?2",
                        params![document_id.to_string(), VersionStage::Signed.as_str()],
                        |row| row.get(0),
                    )?;
                    DocumentStatus::after_signature(signed + 1, document.required_signatures)
                }
                VersionStage::Unsigned => document.status,
            };
            let allowed = match version.stage {
                VersionStage::Signed => document.status.accepts_signatures(),
                VersionStage::Unsigned => !document.status.is_terminal(),
            };
            if !allowed {
                return Err(StoreError::InvalidTransition {
                    document: document_id,
                    from: document.status,
                    to: next_status,
                });
            }

            let record = new_version_record(document_id, number, version);
            insert_version(&tx, &record)?;
            tx.execute(
                "UPDATE documents SET current_version_id = ?1, status = ?2, updated_at = ?3 \
                 WHERE id = ?4",
                params![
                    record.id.to_string(),
                    next_status.as_str(),
                    timestamp(&record.created_at),
                    document_id.to_string(),
                ],
            )?;
            tx.commit()?;

            debug!(document = %document_id, %number, status = %next_status, "version appended");
            Ok(AppendedVersion {
                version_id: record.id,
                number,
                status: next_status,
            })
        })
        .await
    }

    async fn get_document(&self, document_id: &DocumentId) -> StoreResult<DocumentRecord> {
        let document_id = *document_id;
        self.with_conn(move |conn| require_document(conn, &document_id))
            .await
    }

    async fn get_version(
        &self,
        document_id: &DocumentId,
        number: VersionNumber,
    ) -> StoreResult<VersionRecord> {
        let document_id = *document_id;
        self.with_conn(move |conn| {
            require_document(conn, &document_id)?;
            conn.query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM versions \
                     WHERE document_id = ?1 AND version_number = ?2"
                ),
                params![document_id.to_string(), number.get()],
                VersionRow::from_row,
            )
            .optional()?
            .map(VersionRow::into_record)
            .transpose()?
            .ok_or_else(|| StoreError::version_not_found(&document_id, number))
        })
        .await
    }

    async fn get_current_version(&self, document_id: &DocumentId) -> StoreResult<VersionRecord> {
        let document_id = *document_id;
        self.with_conn(move |conn| {
            let document = require_document(conn, &document_id)?;
            let current = document
                .current_version
                .ok_or_else(|| StoreError::version_not_found(&document_id, "current"))?;
            query_version(
                conn,
                &format!("SELECT {VERSION_COLUMNS} FROM versions WHERE id = ?1"),
                &current.to_string(),
            )?
            .ok_or_else(|| StoreError::Corrupt(format!("current version {current} is missing")))
        })
        .await
    }

    async fn list_versions(&self, document_id: &DocumentId) -> StoreResult<Vec<VersionRecord>> {
        let document_id = *document_id;
        self.with_conn(move |conn| {
            require_document(conn, &document_id)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {VERSION_COLUMNS} FROM versions \
                 WHERE document_id = ?1 ORDER BY version_number"
            ))?;
            let rows = stmt
                .query_map(params![document_id.to_string()], VersionRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(VersionRow::into_record).collect()
        })
        .await
    }

    async fn update_status(
        &self,
        document_id: &DocumentId,
        next: DocumentStatus,
    ) -> StoreResult<DocumentRecord> {
        let document_id = *document_id;
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut document = require_document(&tx, &document_id)?;
            if !document.status.can_transition_to(next) {
                return Err(StoreError::InvalidTransition {
                    document: document_id,
                    from: document.status,
                    to: next,
                });
            }
            document.status = next;
            document.updated_at = Utc::now();
            tx.execute(
                "UPDATE documents SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    next.as_str(),
                    timestamp(&document.updated_at),
                    document_id.to_string()
                ],
            )?;
            tx.commit()?;
            debug!(document = %document_id, status = %next, "status updated");
            Ok(document)
        })
        .await
    }

    async fn find_version_by_tx(&self, tx_signature: &str) -> StoreResult<Option<VersionRecord>> {
        let tx_signature = tx_signature.to_owned();
        self.with_conn(move |conn| {
            query_version(
                conn,
                &format!("SELECT {VERSION_COLUMNS} FROM versions WHERE tx_signature = ?1 LIMIT 1"),
                &tx_signature,
            )
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::{document, version};
    use crate::traits::conformance;

    #[tokio::test]
    async fn conformance_suite() {
        conformance::run_all(&SqliteVersionStore::open_in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.db");

        let mut doc = document("persisted", 2);
        doc.password_hash = Some("$argon2id$v=19$stub".into());
        let created = {
            let store = SqliteVersionStore::open(&path).unwrap();
            let created = store.create_document_with_version(doc).await.unwrap();
            store
                .add_version(&created.document_id, version(2, VersionStage::Signed, true))
                .await
                .unwrap();
            created
        };

        let store = SqliteVersionStore::open(&path).unwrap();
        let doc = store.get_document(&created.document_id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::PartiallySigned);
        assert_eq!(doc.password_hash.as_deref(), Some("$argon2id$v=19$stub"));
        assert_eq!(doc.original_hash.unwrap().freshness_marker, 99);
        assert_eq!(doc.original_content, Some(ContentPointer::for_content(b"original")));

        let versions = store.list_versions(&created.document_id).await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].id, created.version_id);
        let anchor = versions[1].anchor.as_ref().unwrap();
        assert_eq!(anchor.tx_signature, "tx-2");
        assert_eq!(anchor.memo.digest(), &versions[1].hash.digest);
    }

    #[tokio::test]
    async fn unanchored_version_round_trips() {
        let store = SqliteVersionStore::open_in_memory().unwrap();
        let id = store
            .create_document_with_version(document("plain", 1))
            .await
            .unwrap()
            .document_id;
        store
            .add_version(&id, version(5, VersionStage::Unsigned, false))
            .await
            .unwrap();
        let current = store.get_current_version(&id).await.unwrap();
        assert!(current.anchor.is_none());
        assert_eq!(current.hash.freshness_marker, 105);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");
        let first = Arc::new(SqliteVersionStore::open(&path).unwrap());
        let second = Arc::new(SqliteVersionStore::open(&path).unwrap());

        let id = first
            .create_document_with_version(document("race", 1))
            .await
            .unwrap()
            .document_id;

        let mut handles = Vec::new();
        for byte in 0..20u8 {
            let store = if byte % 2 == 0 {
                Arc::clone(&first)
            } else {
                Arc::clone(&second)
            };
            handles.push(tokio::spawn(async move {
                store
                    .add_version(&id, version(byte, VersionStage::Unsigned, false))
                    .await
                    .unwrap()
                    .number
                    .get()
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (2..=21).collect::<Vec<u32>>());

        let versions = second.list_versions(&id).await.unwrap();
        let listed: Vec<u32> = versions.iter().map(|v| v.number.get()).collect();
        assert_eq!(listed, (1..=21).collect::<Vec<u32>>());

        let current = first.get_current_version(&id).await.unwrap();
        assert_eq!(current.number, VersionNumber::new(21));
    }

    #[tokio::test]
    async fn corrupt_rows_are_reported() {
        let store = SqliteVersionStore::open_in_memory().unwrap();
        let id = store
            .create_document_with_version(document("tampered", 1))
            .await
            .unwrap()
            .document_id;
        store
            .with_conn(move |conn| {
                conn.execute(
                    "UPDATE documents SET status = 'archived' WHERE id = ?1",
                    params![id.to_string()],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store.get_document(&id).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)), "{err:?}");
    }
}
