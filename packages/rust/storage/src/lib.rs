//! libSQL storage layer for the enrichment audit trail.
//!
//! The [`Storage`] struct wraps a libSQL database holding two tables:
//! - `enrichment_logs`: append-only [`AuditRecord`]s, one per logged step attempt
//! - `step_completions`: [`CompletionRecord`] markers for successful steps
//!
//! Records are never updated or deleted through this crate. Consumers that
//! only need the write/read contract depend on the [`LogStore`] trait.

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use enrichkit_shared::{
    AuditEntry, AuditQuery, AuditRecord, CompletionEntry, CompletionQuery, CompletionRecord,
    DatabaseSettings, EnrichKitError, Result,
};
use libsql::{Connection, Database, params};
use uuid::Uuid;

/// URL schemes that address a remote libSQL server.
const REMOTE_SCHEMES: [&str; 4] = ["libsql://", "https://", "http://", "wss://"];

/// Write/read contract of the enrichment log store.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append an audit record, assigning its id and timestamp.
    async fn insert_audit_record(&self, entry: &AuditEntry) -> Result<AuditRecord>;

    /// Append a completion marker, assigning its id and timestamp.
    async fn insert_completion(&self, entry: &CompletionEntry) -> Result<CompletionRecord>;

    /// List audit records matching `query`, newest first.
    async fn list_audit_records(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>>;

    /// List completion markers matching `query`, newest first.
    async fn list_completions(&self, query: &CompletionQuery) -> Result<Vec<CompletionRecord>>;

    /// Cheap connectivity check.
    async fn ping(&self) -> Result<()>;
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a local database file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EnrichKitError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| EnrichKitError::Storage(e.to_string()))?;

        Self::from_database(db).await
    }

    /// Connect using resolved settings.
    ///
    /// `libsql://`, `http(s)://` and `wss://` URLs connect to a remote server
    /// authenticated with the service key; anything else (optionally prefixed
    /// with `file:`) is treated as a local path.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let url = settings.url.trim();

        if REMOTE_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
            tracing::info!(url, "connecting to remote audit database");
            let db = libsql::Builder::new_remote(url.to_string(), settings.auth_token.clone())
                .build()
                .await
                .map_err(|e| EnrichKitError::Storage(e.to_string()))?;
            return Self::from_database(db).await;
        }

        let path = url.strip_prefix("file:").unwrap_or(url);
        tracing::info!(path, "opening local audit database");
        Self::open(Path::new(path)).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        let conn = db
            .connect()
            .map_err(|e| EnrichKitError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
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
                        EnrichKitError::Storage(format!(
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
}

#[async_trait]
impl LogStore for Storage {
    async fn insert_audit_record(&self, entry: &AuditEntry) -> Result<AuditRecord> {
        let id = Uuid::now_v7().to_string();
        let stored_at = Utc::now();
        self.conn
            .execute(
                "INSERT INTO enrichment_logs (id, company_id, company_domain, workflow_id,
                   workflow_slug, play_name, step_number, status, batch_id, result_table,
                   error_message, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    id.as_str(),
                    entry.company_id.as_str(),
                    entry.company_domain.as_str(),
                    entry.workflow_id.as_str(),
                    entry.workflow_slug.as_str(),
                    entry.play_name.as_str(),
                    entry.step_number,
                    entry.status.as_str(),
                    entry.batch_id.as_deref(),
                    entry.result_table.as_deref(),
                    entry.error_message.as_deref(),
                    stored_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| EnrichKitError::Storage(e.to_string()))?;

        Ok(AuditRecord {
            id,
            entry: entry.clone(),
            stored_at,
        })
    }

    async fn insert_completion(&self, entry: &CompletionEntry) -> Result<CompletionRecord> {
        let id = Uuid::now_v7().to_string();
        let completed_at = Utc::now();
        self.conn
            .execute(
                "INSERT INTO step_completions (id, company_id, play_name, step_number,
                   workflow_slug, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.as_str(),
                    entry.company_id.as_str(),
                    entry.play_name.as_str(),
                    entry.step_number,
                    entry.workflow_slug.as_str(),
                    completed_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| EnrichKitError::Storage(e.to_string()))?;

        Ok(CompletionRecord {
            id,
            entry: entry.clone(),
            completed_at,
        })
    }

    async fn list_audit_records(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, company_id, company_domain, workflow_id, workflow_slug, play_name,
                   step_number, status, batch_id, result_table, error_message, stored_at
                 FROM enrichment_logs
                 WHERE (?1 IS NULL OR company_id = ?1)
                   AND (?2 IS NULL OR workflow_id = ?2)
                   AND (?3 IS NULL OR status = ?3)
                 ORDER BY rowid DESC
                 LIMIT ?4",
                params![
                    query.company_id.as_deref(),
                    query.workflow_id.as_deref(),
                    query.status.as_deref(),
                    query.effective_limit(),
                ],
            )
            .await
            .map_err(|e| EnrichKitError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| EnrichKitError::Storage(e.to_string()))?
        {
            results.push(row_to_audit_record(&row)?);
        }
        Ok(results)
    }

    async fn list_completions(&self, query: &CompletionQuery) -> Result<Vec<CompletionRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, company_id, play_name, step_number, workflow_slug, completed_at
                 FROM step_completions
                 WHERE (?1 IS NULL OR company_id = ?1)
                   AND (?2 IS NULL OR play_name = ?2)
                   AND (?3 IS NULL OR step_number = ?3)
                 ORDER BY rowid DESC",
                params![
                    query.company_id.as_deref(),
                    query.play_name.as_deref(),
                    query.step_number,
                ],
            )
            .await
            .map_err(|e| EnrichKitError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| EnrichKitError::Storage(e.to_string()))?
        {
            results.push(row_to_completion(&row)?);
        }
        Ok(results)
    }

    async fn ping(&self) -> Result<()> {
        self.conn
            .query("SELECT 1", params![])
            .await
            .map_err(|e| EnrichKitError::Storage(e.to_string()))?;
        Ok(())
    }
}

/// Convert a database row to an [`AuditRecord`].
fn row_to_audit_record(row: &libsql::Row) -> Result<AuditRecord> {
    Ok(AuditRecord {
        id: text(row, 0)?,
        entry: AuditEntry {
            company_id: text(row, 1)?,
            company_domain: text(row, 2)?,
            workflow_id: text(row, 3)?,
            workflow_slug: text(row, 4)?,
            play_name: text(row, 5)?,
            step_number: row
                .get::<i64>(6)
                .map_err(|e| EnrichKitError::Storage(e.to_string()))?,
            status: text(row, 7)?,
            batch_id: row.get::<String>(8).ok(),
            result_table: row.get::<String>(9).ok(),
            error_message: row.get::<String>(10).ok(),
        },
        stored_at: timestamp(row, 11)?,
    })
}

/// Convert a database row to a [`CompletionRecord`].
fn row_to_completion(row: &libsql::Row) -> Result<CompletionRecord> {
    Ok(CompletionRecord {
        id: text(row, 0)?,
        entry: CompletionEntry {
            company_id: text(row, 1)?,
            play_name: text(row, 2)?,
            step_number: row
                .get::<i64>(3)
                .map_err(|e| EnrichKitError::Storage(e.to_string()))?,
            workflow_slug: text(row, 4)?,
        },
        completed_at: timestamp(row, 5)?,
    })
}

fn text(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx)
        .map_err(|e| EnrichKitError::Storage(e.to_string()))
}

fn timestamp(row: &libsql::Row, idx: i32) -> Result<DateTime<Utc>> {
    let s = text(row, idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EnrichKitError::Storage(format!("invalid date: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("ek_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn entry(company_id: &str, status: &str) -> AuditEntry {
        AuditEntry {
            company_id: company_id.into(),
            company_domain: format!("{company_id}.example.com"),
            workflow_id: "wf-1".into(),
            workflow_slug: "homepage-scrape".into(),
            play_name: "Homepage Scrape".into(),
            step_number: 1,
            status: status.into(),
            batch_id: None,
            result_table: Some("homepage_content".into()),
            error_message: None,
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
        storage.ping().await.expect("ping");
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("ek_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn connect_with_file_url() {
        let tmp = std::env::temp_dir().join(format!("ek_test_{}.db", Uuid::now_v7()));
        let settings = DatabaseSettings {
            url: format!("file:{}", tmp.display()),
            auth_token: "unused-for-local".into(),
        };
        let storage = Storage::connect(&settings).await.expect("connect");
        assert_eq!(storage.get_schema_version().await, 1);
        assert!(tmp.exists());
    }

    #[tokio::test]
    async fn audit_record_roundtrip() {
        let storage = test_storage().await;
        let mut e = entry("c-1", "error");
        e.error_message = Some("proxy returned HTTP 500".into());
        e.step_number = 0;

        let stored = storage.insert_audit_record(&e).await.expect("insert");
        assert!(!stored.id.is_empty());

        let records = storage
            .list_audit_records(&AuditQuery::default())
            .await
            .expect("list");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, stored.id);
        assert_eq!(records[0].entry, e);
        assert_eq!(records[0].entry.batch_id, None);
    }

    #[tokio::test]
    async fn audit_query_filters_and_orders() {
        let storage = test_storage().await;
        for (company, status) in [("a", "success"), ("b", "error"), ("a", "error")] {
            storage
                .insert_audit_record(&entry(company, status))
                .await
                .unwrap();
        }

        let for_a = storage
            .list_audit_records(&AuditQuery {
                company_id: Some("a".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(for_a.len(), 2);
        // Newest first
        assert_eq!(for_a[0].entry.status, "error");
        assert_eq!(for_a[1].entry.status, "success");

        let errors = storage
            .list_audit_records(&AuditQuery {
                status: Some("error".into()),
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].entry.company_id, "a");
    }

    #[tokio::test]
    async fn completions_allow_duplicates() {
        let storage = test_storage().await;
        let completion = entry("c-1", "success").completion();

        let first = storage.insert_completion(&completion).await.expect("first");
        let second = storage.insert_completion(&completion).await.expect("second");
        assert_ne!(first.id, second.id);

        let found = storage
            .list_completions(&CompletionQuery {
                company_id: Some("c-1".into()),
                play_name: Some("Homepage Scrape".into()),
                step_number: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 2);

        let other_step = storage
            .list_completions(&CompletionQuery {
                company_id: Some("c-1".into()),
                play_name: None,
                step_number: Some(2),
            })
            .await
            .unwrap();
        assert!(other_step.is_empty());
    }
}
