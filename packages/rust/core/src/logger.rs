//! Result logger: durable audit trail plus best-effort completion markers.
//!
//! Logging is a two-phase write:
//! 1. the audit record. A failure here is fatal: the caller must learn the
//!    step went unlogged.
//! 2. the completion marker, only for successful steps. A failure here is
//!    logged and never propagated.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use enrichkit_shared::{AuditEntry, AuditRecord, EnrichKitError, LogRequest, Result};
use enrichkit_storage::LogStore;

/// What happened to the completion marker of a logged step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The step did not succeed, so no marker was due.
    NotApplicable,
    /// Marker written.
    Recorded { id: String },
    /// Marker write failed; the audit record still stands.
    Failed { error: String },
}

/// Acknowledgement of a logged step.
#[derive(Debug, Clone)]
pub struct LogReceipt {
    /// Id of the audit record.
    pub log_id: String,
    pub completion: CompletionOutcome,
}

/// Writes enrichment step outcomes to a [`LogStore`].
#[derive(Clone)]
pub struct ResultLogger {
    store: Arc<dyn LogStore>,
}

impl ResultLogger {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    /// The underlying store, for read-side queries.
    pub fn store(&self) -> &Arc<dyn LogStore> {
        &self.store
    }

    /// Validate and log one step outcome.
    pub async fn log(&self, request: LogRequest) -> Result<LogReceipt> {
        let entry = request.validate()?;
        self.log_entry(entry).await
    }

    /// Log an already validated step outcome.
    #[instrument(
        skip_all,
        fields(
            company_id = %entry.company_id,
            workflow_id = %entry.workflow_id,
            step_number = entry.step_number,
        )
    )]
    pub async fn log_entry(&self, entry: AuditEntry) -> Result<LogReceipt> {
        let record = self.store.insert_audit_record(&entry).await.map_err(|e| {
            error!(error = %e, "audit record write failed");
            EnrichKitError::AuditWrite(e.to_string())
        })?;

        let completion = if entry.is_success() {
            self.record_completion(&record).await
        } else {
            CompletionOutcome::NotApplicable
        };

        info!(
            log_id = %record.id,
            status = %record.entry.status,
            ?completion,
            "enrichment step logged"
        );

        Ok(LogReceipt {
            log_id: record.id,
            completion,
        })
    }

    /// Second, non-fatal phase: mark the step completed.
    async fn record_completion(&self, record: &AuditRecord) -> CompletionOutcome {
        match self.store.insert_completion(&record.entry.completion()).await {
            Ok(marker) => CompletionOutcome::Recorded { id: marker.id },
            Err(e) => {
                let failure = EnrichKitError::CompletionWrite(e.to_string());
                warn!(log_id = %record.id, error = %failure, "completion marker not recorded");
                CompletionOutcome::Failed {
                    error: failure.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use enrichkit_shared::{AuditQuery, CompletionEntry, CompletionQuery, CompletionRecord};
    use enrichkit_storage::Storage;
    use serde_json::json;
    use uuid::Uuid;

    /// In-memory store with switchable write failures.
    #[derive(Default)]
    struct FakeStore {
        audits: Mutex<Vec<AuditRecord>>,
        completions: Mutex<Vec<CompletionRecord>>,
        completion_attempts: AtomicUsize,
        fail_audit: bool,
        fail_completion: bool,
    }

    #[async_trait]
    impl LogStore for FakeStore {
        async fn insert_audit_record(&self, entry: &AuditEntry) -> Result<AuditRecord> {
            if self.fail_audit {
                return Err(EnrichKitError::Storage("disk I/O error".into()));
            }
            let record = AuditRecord {
                id: Uuid::now_v7().to_string(),
                entry: entry.clone(),
                stored_at: Utc::now(),
            };
            self.audits.lock().unwrap().push(record.clone());
            Ok(record)
        }

        async fn insert_completion(&self, entry: &CompletionEntry) -> Result<CompletionRecord> {
            self.completion_attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_completion {
                return Err(EnrichKitError::Storage("no such table: step_completions".into()));
            }
            let record = CompletionRecord {
                id: Uuid::now_v7().to_string(),
                entry: entry.clone(),
                completed_at: Utc::now(),
            };
            self.completions.lock().unwrap().push(record.clone());
            Ok(record)
        }

        async fn list_audit_records(&self, _query: &AuditQuery) -> Result<Vec<AuditRecord>> {
            Ok(self.audits.lock().unwrap().iter().rev().cloned().collect())
        }

        async fn list_completions(&self, _query: &CompletionQuery) -> Result<Vec<CompletionRecord>> {
            Ok(self.completions.lock().unwrap().iter().rev().cloned().collect())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    fn log_request(status: &str) -> LogRequest {
        serde_json::from_value(json!({
            "company_id": "c-1",
            "company_domain": "acme.com",
            "workflow_id": "wf-1",
            "workflow_slug": "homepage-scrape",
            "play_name": "Homepage Scrape",
            "step_number": 1,
            "status": status,
            "batch_id": "batch-7"
        }))
        .unwrap()
    }

    fn logger_with(store: &Arc<FakeStore>) -> ResultLogger {
        ResultLogger::new(store.clone())
    }

    #[tokio::test]
    async fn success_writes_audit_and_completion() {
        let store = Arc::new(FakeStore::default());
        let receipt = logger_with(&store).log(log_request("success")).await.expect("log");

        let audits = store.audits.lock().unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].id, receipt.log_id);
        assert_eq!(audits[0].entry.batch_id.as_deref(), Some("batch-7"));

        let completions = store.completions.lock().unwrap();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].entry.company_id, "c-1");
        assert!(matches!(receipt.completion, CompletionOutcome::Recorded { .. }));
    }

    #[tokio::test]
    async fn error_status_writes_audit_only() {
        let store = Arc::new(FakeStore::default());
        let mut request = log_request("error");
        request.error_message = Some("proxy returned HTTP 500".into());

        let receipt = logger_with(&store).log(request).await.expect("log");

        assert_eq!(receipt.completion, CompletionOutcome::NotApplicable);
        assert_eq!(store.audits.lock().unwrap().len(), 1);
        assert_eq!(store.completion_attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn completion_failure_is_not_fatal() {
        let store = Arc::new(FakeStore {
            fail_completion: true,
            ..Default::default()
        });

        let receipt = logger_with(&store).log(log_request("success")).await.expect("still ok");

        assert!(!receipt.log_id.is_empty());
        assert_eq!(store.audits.lock().unwrap().len(), 1);
        match receipt.completion {
            CompletionOutcome::Failed { error } => assert!(error.contains("step_completions")),
            other => panic!("expected failed completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn audit_failure_is_fatal_and_skips_completion() {
        let store = Arc::new(FakeStore {
            fail_audit: true,
            ..Default::default()
        });

        let err = logger_with(&store).log(log_request("success")).await.unwrap_err();

        assert!(matches!(err, EnrichKitError::AuditWrite(_)));
        assert!(err.to_string().contains("disk I/O error"));
        assert_eq!(store.completion_attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn validation_happens_before_any_write() {
        let store = Arc::new(FakeStore::default());
        let mut request = log_request("success");
        request.step_number = None;

        let err = logger_with(&store).log(request).await.unwrap_err();

        assert!(matches!(err, EnrichKitError::Validation { .. }));
        assert!(store.audits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn step_zero_is_logged() {
        let store = Arc::new(FakeStore::default());
        let mut request = log_request("success");
        request.step_number = Some(0);

        logger_with(&store).log(request).await.expect("step 0 accepted");
        assert_eq!(store.completions.lock().unwrap()[0].entry.step_number, 0);
    }

    #[tokio::test]
    async fn repeated_success_duplicates_markers_in_libsql() {
        let tmp = std::env::temp_dir().join(format!("ek_logger_{}.db", Uuid::now_v7()));
        let storage = Arc::new(Storage::open(&tmp).await.expect("open"));
        let logger = ResultLogger::new(storage.clone());

        logger.log(log_request("success")).await.unwrap();
        logger.log(log_request("success")).await.unwrap();
        logger.log(log_request("error")).await.unwrap();

        let audits = storage.list_audit_records(&AuditQuery::default()).await.unwrap();
        assert_eq!(audits.len(), 3);

        let markers = storage
            .list_completions(&CompletionQuery {
                company_id: Some("c-1".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(markers.len(), 2);
    }
}
