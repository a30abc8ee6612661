//! libSQL storage layer (local file).
//!
//! The [`Storage`] struct wraps a libSQL database holding the scraped
//! `raw_documents`, the persisted feature `results`, and the pass history in
//! `runs`.
//!
//! **Access rules:**
//! - `pressfeat run` / `import` / `requeue`: read-write via [`Storage::open`]
//! - `pressfeat export` / `status`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use pressfeat_shared::{FeatureRecord, PressfeatError, ProcessOutcome, RawDocument, Result, RunId};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// Map a libSQL error into the storage error variant.
fn db_err(e: libsql::Error) -> PressfeatError {
    PressfeatError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| PressfeatError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PressfeatError::Storage(format!(
                "database {} does not exist",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        PressfeatError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(PressfeatError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Raw documents
    // -----------------------------------------------------------------------

    /// Insert a scraped document. Returns `false` if the id already exists.
    pub async fn insert_raw_document(&self, doc: &RawDocument) -> Result<bool> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let inserted = self
            .conn
            .execute(
                "INSERT INTO raw_documents (id, link, source, body_html, page_html, imported_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    doc.id.as_str(),
                    doc.link.as_str(),
                    doc.source.as_str(),
                    doc.body_html.as_str(),
                    doc.page_html.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(inserted > 0)
    }

    /// Ids of all unprocessed documents for `source`, in import order.
    ///
    /// The returned list is the pass snapshot: documents imported afterwards
    /// are not part of it.
    pub async fn unprocessed_ids(&self, source: &str) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM raw_documents
                 WHERE source = ?1 AND status IS NULL
                 ORDER BY imported_at, id",
                params![source],
            )
            .await
            .map_err(db_err)?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            ids.push(row.get::<String>(0).map_err(db_err)?);
        }
        Ok(ids)
    }

    /// Number of unprocessed documents for `source`.
    pub async fn count_unprocessed(&self, source: &str) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM raw_documents WHERE source = ?1 AND status IS NULL",
            source,
        )
        .await
    }

    /// Load a document by id, only if it still lacks the processed marker.
    pub async fn get_unprocessed_document(&self, id: &str) -> Result<Option<RawDocument>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, link, source, body_html, page_html
                 FROM raw_documents WHERE id = ?1 AND status IS NULL",
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(RawDocument {
                id: row.get::<String>(0).map_err(db_err)?,
                link: row.get::<String>(1).map_err(db_err)?,
                source: row.get::<String>(2).map_err(db_err)?,
                body_html: row.get::<String>(3).map_err(db_err)?,
                page_html: row.get::<String>(4).map_err(db_err)?,
            })),
            None => Ok(None),
        }
    }

    /// Processed marker of a document: `None` while unprocessed.
    ///
    /// Errors if the document does not exist.
    pub async fn document_status(&self, id: &str) -> Result<Option<ProcessOutcome>> {
        let mut rows = self
            .conn
            .query("SELECT status FROM raw_documents WHERE id = ?1", params![id])
            .await
            .map_err(db_err)?;

        let row = rows
            .next()
            .await
            .map_err(db_err)?
            .ok_or_else(|| PressfeatError::Storage(format!("no document with id {id:?}")))?;

        match row.get::<String>(0).ok() {
            Some(s) => s
                .parse::<ProcessOutcome>()
                .map(Some)
                .map_err(PressfeatError::Storage),
            None => Ok(None),
        }
    }

    /// Set the processed marker on a document. Setting it again overwrites.
    pub async fn mark_processed(
        &self,
        id: &str,
        outcome: ProcessOutcome,
        failure: Option<&str>,
        run_id: Option<&RunId>,
    ) -> Result<()> {
        self.check_writable()?;
        mark_on(&self.conn, id, outcome, failure, run_id).await
    }

    /// Clear the processed marker on failed documents of `source` (and on
    /// skipped ones too when `include_skipped`). Returns the number requeued.
    pub async fn requeue(&self, source: &str, include_skipped: bool) -> Result<u64> {
        self.check_writable()?;
        let sql = if include_skipped {
            "UPDATE raw_documents
             SET status = NULL, processed_at = NULL, failure = NULL, run_id = NULL
             WHERE source = ?1 AND status IN ('failed', 'skipped')"
        } else {
            "UPDATE raw_documents
             SET status = NULL, processed_at = NULL, failure = NULL, run_id = NULL
             WHERE source = ?1 AND status = 'failed'"
        };
        self.conn
            .execute(sql, params![source])
            .await
            .map_err(db_err)
    }

    /// Per-outcome document counts for `source`.
    pub async fn outcome_counts(&self, source: &str) -> Result<OutcomeCounts> {
        let mut rows = self
            .conn
            .query(
                "SELECT status, COUNT(*) FROM raw_documents WHERE source = ?1 GROUP BY status",
                params![source],
            )
            .await
            .map_err(db_err)?;

        let mut counts = OutcomeCounts::default();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let n = row.get::<i64>(1).map_err(db_err)? as u64;
            match row.get::<String>(0).ok().as_deref() {
                None => counts.unprocessed += n,
                Some("persisted") => counts.persisted += n,
                Some("skipped") => counts.skipped += n,
                Some("failed") => counts.failed += n,
                Some(other) => {
                    tracing::warn!(status = other, count = n, "unknown document status");
                }
            }
        }
        Ok(counts)
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    /// Insert or replace the feature record for `record.id`.
    pub async fn upsert_feature_record(
        &self,
        record: &FeatureRecord,
        run_id: Option<&RunId>,
    ) -> Result<()> {
        self.check_writable()?;
        upsert_on(&self.conn, record, run_id).await
    }

    /// Persist the optional feature record and set the processed marker in
    /// one transaction.
    pub async fn commit_document(
        &self,
        id: &str,
        record: Option<&FeatureRecord>,
        outcome: ProcessOutcome,
        failure: Option<&str>,
        run_id: Option<&RunId>,
    ) -> Result<()> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(db_err)?;
        let written = async {
            if let Some(record) = record {
                upsert_on(&tx, record, run_id).await?;
            }
            mark_on(&tx, id, outcome, failure, run_id).await
        }
        .await;

        match written {
            Ok(()) => tx.commit().await.map_err(db_err),
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(%id, error = %rb, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Get a feature record by document id.
    pub async fn get_feature_record(&self, id: &str) -> Result<Option<FeatureRecord>> {
        let mut rows = self
            .conn
            .query("SELECT record_json FROM results WHERE id = ?1", params![id])
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(decode_record(&row)?)),
            None => Ok(None),
        }
    }

    /// List feature records, optionally restricted to one source.
    pub async fn list_feature_records(&self, source: Option<&str>) -> Result<Vec<FeatureRecord>> {
        let mut rows = match source {
            Some(source) => {
                self.conn
                    .query(
                        "SELECT record_json FROM results WHERE source = ?1 ORDER BY created_at, id",
                        params![source],
                    )
                    .await
            }
            None => {
                self.conn
                    .query(
                        "SELECT record_json FROM results ORDER BY created_at, id",
                        params![],
                    )
                    .await
            }
        }
        .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(decode_record(&row)?);
        }
        Ok(results)
    }

    /// Number of feature records for `source`.
    pub async fn count_results(&self, source: &str) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM results WHERE source = ?1", source)
            .await
    }

    // -----------------------------------------------------------------------
    // Run history
    // -----------------------------------------------------------------------

    /// Record the start of a pass. Returns the generated run ID.
    pub async fn insert_run(&self, source: &str) -> Result<RunId> {
        self.check_writable()?;
        let id = RunId::new();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO runs (id, source, started_at) VALUES (?1, ?2, ?3)",
                params![id.to_string(), source, now.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(id)
    }

    /// Record the completion of a pass.
    pub async fn finish_run(&self, run_id: &RunId, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id.to_string()],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Most recent runs for `source`, newest first.
    pub async fn list_runs(&self, source: &str, limit: u32) -> Result<Vec<RunRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, started_at, finished_at, stats_json FROM runs
                 WHERE source = ?1 ORDER BY started_at DESC LIMIT ?2",
                params![source, limit],
            )
            .await
            .map_err(db_err)?;

        let mut runs = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            runs.push(RunRecord {
                id: row.get::<String>(0).map_err(db_err)?,
                started_at: row.get::<String>(1).map_err(db_err)?,
                finished_at: row.get::<String>(2).ok(),
                stats_json: row.get::<String>(3).ok(),
            });
        }
        Ok(runs)
    }

    async fn count(&self, sql: &str, source: &str) -> Result<u64> {
        let mut rows = self
            .conn
            .query(sql, params![source])
            .await
            .map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)? as u64),
            None => Ok(0),
        }
    }
}

/// Document counts per processed marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub unprocessed: u64,
    pub persisted: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// A row of the pass history.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: String,
    pub started_at: String,
    /// `None` while the pass is running or if it aborted.
    pub finished_at: Option<String>,
    pub stats_json: Option<String>,
}

async fn mark_on(
    conn: &Connection,
    id: &str,
    outcome: ProcessOutcome,
    failure: Option<&str>,
    run_id: Option<&RunId>,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let updated = conn
        .execute(
            "UPDATE raw_documents
             SET status = ?1, processed_at = ?2, failure = ?3, run_id = ?4
             WHERE id = ?5",
            params![
                outcome.as_str(),
                now.as_str(),
                failure,
                run_id.map(|r| r.to_string()),
                id
            ],
        )
        .await
        .map_err(db_err)?;

    if updated == 0 {
        return Err(PressfeatError::Storage(format!(
            "cannot mark {id:?}: no such document"
        )));
    }
    Ok(())
}

async fn upsert_on(conn: &Connection, record: &FeatureRecord, run_id: Option<&RunId>) -> Result<()> {
    let json = serde_json::to_string(record)
        .map_err(|e| PressfeatError::Storage(format!("failed to encode record: {e}")))?;
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO results (id, source, record_json, created_at, run_id)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
           source = excluded.source,
           record_json = excluded.record_json,
           created_at = excluded.created_at,
           run_id = excluded.run_id",
        params![
            record.id.as_str(),
            record.source.as_str(),
            json,
            now.as_str(),
            run_id.map(|r| r.to_string())
        ],
    )
    .await
    .map_err(db_err)?;
    Ok(())
}

/// Convert a `record_json` column into a [`FeatureRecord`].
fn decode_record(row: &libsql::Row) -> Result<FeatureRecord> {
    let json: String = row.get(0).map_err(db_err)?;
    serde_json::from_str(&json)
        .map_err(|e| PressfeatError::Storage(format!("corrupt result record: {e}")))
}
