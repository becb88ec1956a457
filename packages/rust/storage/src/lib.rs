//! Document storage for Postforge.
//!
//! [`SqliteStore`] is the production [`DocumentStore`] backed by a local
//! libSQL database with versioned migrations. [`MemoryStore`] is an
//! in-memory implementation for tests and dry runs.
//!
//! Every per-document write is a single SQL statement, so updates are
//! atomic per document key — no interleaved partial field updates.

mod migrations;

pub mod memory;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, Row, params};
use sha2::{Digest, Sha256};

use postforge_shared::{
    Document, DocumentId, DocumentStore, EnrichmentUpdate, PostforgeError, Result,
};

pub use memory::MemoryStore;

/// SHA-256 hash of document content, hex-encoded. Recorded at ingestion for
/// change detection.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// libSQL-backed document store.
pub struct SqliteStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PostforgeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PostforgeError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PostforgeError::Storage(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
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
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    PostforgeError::Storage(format!(
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

    async fn query_documents(&self, sql: &str) -> Result<Vec<Document>> {
        let mut rows = self
            .conn
            .query(sql, params![])
            .await
            .map_err(|e| PostforgeError::Storage(e.to_string()))?;

        let mut docs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PostforgeError::Storage(e.to_string()))?
        {
            docs.push(row_to_document(&row)?);
        }
        Ok(docs)
    }
}

const DOCUMENT_COLUMNS: &str = "id, url, title, author, published, excerpt, category, \
     original_content, content_hash, formatted_original_content, updated_content, \
     sources_json, enrichment_model, enriched_at, quality_score, created_at, updated_at";

fn get_text(row: &Row, idx: i32) -> Result<String> {
    match row
        .get_value(idx)
        .map_err(|e| PostforgeError::Storage(format!("column {idx}: {e}")))?
    {
        libsql::Value::Text(s) => Ok(s),
        other => Err(PostforgeError::Storage(format!(
            "column {idx}: expected text, got {other:?}"
        ))),
    }
}

fn get_opt_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row
        .get_value(idx)
        .map_err(|e| PostforgeError::Storage(format!("column {idx}: {e}")))?
    {
        libsql::Value::Null => Ok(None),
        libsql::Value::Text(s) => Ok(Some(s)),
        other => Err(PostforgeError::Storage(format!(
            "column {idx}: expected text or null, got {other:?}"
        ))),
    }
}

fn get_integer(row: &Row, idx: i32) -> Result<i64> {
    match row
        .get_value(idx)
        .map_err(|e| PostforgeError::Storage(format!("column {idx}: {e}")))?
    {
        libsql::Value::Integer(i) => Ok(i),
        other => Err(PostforgeError::Storage(format!(
            "column {idx}: expected integer, got {other:?}"
        ))),
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PostforgeError::Storage(format!("bad timestamp {raw:?}: {e}")))
}

fn row_to_document(row: &Row) -> Result<Document> {
    let id_raw = get_text(row, 0)?;
    let sources_json = get_text(row, 11)?;
    let enriched_at_raw = get_opt_text(row, 13)?;
    let quality_score = get_integer(row, 14)?;
    let created_at_raw = get_text(row, 15)?;
    let updated_at_raw = get_text(row, 16)?;

    Ok(Document {
        id: id_raw
            .parse::<DocumentId>()
            .map_err(|e| PostforgeError::Storage(format!("bad document id {id_raw:?}: {e}")))?,
        url: get_text(row, 1)?,
        title: get_text(row, 2)?,
        author: get_text(row, 3)?,
        published: get_text(row, 4)?,
        excerpt: get_text(row, 5)?,
        category: get_opt_text(row, 6)?,
        original_content: get_text(row, 7)?,
        content_hash: get_text(row, 8)?,
        formatted_original_content: get_opt_text(row, 9)?,
        updated_content: get_opt_text(row, 10)?,
        sources: serde_json::from_str(&sources_json)
            .map_err(|e| PostforgeError::Storage(format!("bad sources JSON: {e}")))?,
        enrichment_model: get_opt_text(row, 12)?,
        enriched_at: enriched_at_raw.as_deref().map(parse_timestamp).transpose()?,
        quality_score: quality_score.clamp(0, 100) as u8,
        created_at: parse_timestamp(&created_at_raw)?,
        updated_at: parse_timestamp(&updated_at_raw)?,
    })
}

impl DocumentStore for SqliteStore {
    async fn find_pending(&self) -> Result<Vec<Document>> {
        self.query_documents(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at, id"
        ))
        .await
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<Document>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE url = ?1"),
                params![url],
            )
            .await
            .map_err(|e| PostforgeError::Storage(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| PostforgeError::Storage(e.to_string()))?
        {
            Some(row) => Ok(Some(row_to_document(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_if_absent(&self, doc: &Document) -> Result<bool> {
        let sources_json = serde_json::to_string(&doc.sources)
            .map_err(|e| PostforgeError::Storage(e.to_string()))?;

        let affected = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO documents
                   (id, url, title, author, published, excerpt, category,
                    original_content, content_hash, formatted_original_content,
                    updated_content, sources_json, enrichment_model, enriched_at,
                    quality_score, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    doc.id.to_string(),
                    doc.url.as_str(),
                    doc.title.as_str(),
                    doc.author.as_str(),
                    doc.published.as_str(),
                    doc.excerpt.as_str(),
                    doc.category.as_deref(),
                    doc.original_content.as_str(),
                    doc.content_hash.as_str(),
                    doc.formatted_original_content.as_deref(),
                    doc.updated_content.as_deref(),
                    sources_json,
                    doc.enrichment_model.as_deref(),
                    doc.enriched_at.map(|t| t.to_rfc3339()),
                    i64::from(doc.quality_score),
                    doc.created_at.to_rfc3339(),
                    doc.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| PostforgeError::Storage(e.to_string()))?;

        Ok(affected > 0)
    }

    async fn update_enrichment(&self, url: &str, update: &EnrichmentUpdate) -> Result<()> {
        let sources_json = serde_json::to_string(&update.sources)
            .map_err(|e| PostforgeError::Storage(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        let affected = self
            .conn
            .execute(
                "UPDATE documents SET
                   updated_content = ?1,
                   sources_json = ?2,
                   enrichment_model = ?3,
                   enriched_at = ?4,
                   quality_score = ?5,
                   updated_at = ?6
                 WHERE url = ?7",
                params![
                    update.updated_content.as_str(),
                    sources_json,
                    update.model.as_str(),
                    update.enriched_at.to_rfc3339(),
                    i64::from(update.quality_score),
                    now,
                    url,
                ],
            )
            .await
            .map_err(|e| PostforgeError::Storage(e.to_string()))?;

        if affected == 0 {
            return Err(PostforgeError::Storage(format!(
                "no document with url {url}"
            )));
        }
        Ok(())
    }

    async fn update_formatted(&self, url: &str, formatted: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn
            .execute(
                "UPDATE documents SET formatted_original_content = ?1, updated_at = ?2
                 WHERE url = ?3",
                params![formatted, now, url],
            )
            .await
            .map_err(|e| PostforgeError::Storage(e.to_string()))?;

        if affected == 0 {
            return Err(PostforgeError::Storage(format!(
                "no document with url {url}"
            )));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Document>> {
        self.query_documents(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at, id"
        ))
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
