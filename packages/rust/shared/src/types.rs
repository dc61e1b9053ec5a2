//! Core domain types for batch scraping and enrichment logging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EnrichKitError, Result};

/// Status value that marks a logged step as completed.
pub const SUCCESS_STATUS: &str = "success";

/// Default page size for audit trail queries.
pub const DEFAULT_QUERY_LIMIT: u32 = 100;

/// Upper bound for audit trail query page size.
pub const MAX_QUERY_LIMIT: u32 = 1000;

// ---------------------------------------------------------------------------
// Batch request
// ---------------------------------------------------------------------------

/// One company within a batch.
///
/// Fields default to empty so that an incomplete entry is reported as an
/// item-level failure instead of rejecting the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInput {
    #[serde(default)]
    pub company_id: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub company_domain: String,
}

impl CompanyInput {
    /// Names of required fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.company_id.trim().is_empty() {
            missing.push("company_id");
        }
        if self.company_name.trim().is_empty() {
            missing.push("company_name");
        }
        if self.company_domain.trim().is_empty() {
            missing.push("company_domain");
        }
        missing
    }
}

/// The workflow a batch belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub slug: String,
}

/// Body of `POST /scrape-batch`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub companies: Option<Vec<CompanyInput>>,
    #[serde(default)]
    pub workflow: Option<WorkflowRef>,
}

impl BatchRequest {
    /// Build a request from parts.
    pub fn new(companies: Vec<CompanyInput>, workflow: WorkflowRef) -> Self {
        Self {
            companies: Some(companies),
            workflow: Some(workflow),
        }
    }

    /// Check request-level invariants and return the validated parts.
    pub fn validate(&self) -> Result<(&[CompanyInput], &WorkflowRef)> {
        let companies = match self.companies.as_deref() {
            Some(c) if !c.is_empty() => c,
            _ => {
                return Err(EnrichKitError::validation(
                    "companies array is required and must not be empty",
                ));
            }
        };

        let workflow = match self.workflow.as_ref() {
            Some(w) if !w.id.trim().is_empty() => w,
            _ => return Err(EnrichKitError::validation("workflow.id is required")),
        };

        Ok((companies, workflow))
    }
}

// ---------------------------------------------------------------------------
// Batch result
// ---------------------------------------------------------------------------

/// Outcome of one batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Error,
}

/// Result ledger entry for one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub company_domain: String,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemResult {
    pub fn success(company_domain: impl Into<String>) -> Self {
        Self {
            company_domain: company_domain.into(),
            status: ItemStatus::Success,
            error: None,
        }
    }

    pub fn failure(company_domain: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            company_domain: company_domain.into(),
            status: ItemStatus::Error,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Success
    }
}

/// Aggregate response of `POST /scrape-batch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub total: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub results: Vec<ItemResult>,
}

impl BatchResult {
    /// Tally counts from an ordered result ledger.
    pub fn from_results(results: Vec<ItemResult>) -> Self {
        let success_count = results.iter().filter(|r| r.is_success()).count();
        Self {
            total: results.len(),
            success_count,
            failed_count: results.len() - success_count,
            results,
        }
    }
}

// ---------------------------------------------------------------------------
// Enrichment log
// ---------------------------------------------------------------------------

/// Body of `POST /log-enrichment`, as received.
///
/// Every field is optional at the wire level; [`LogRequest::validate`]
/// decides what is actually required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogRequest {
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub company_domain: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub workflow_slug: Option<String>,
    #[serde(default)]
    pub play_name: Option<String>,
    /// Accepted in place of `play_name`.
    #[serde(default)]
    pub workflow_title: Option<String>,
    #[serde(default)]
    pub step_number: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub result_table: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl LogRequest {
    /// Validate presence of every required field, reporting all missing ones at once.
    ///
    /// An explicit `step_number: 0` is valid; only an absent value is rejected.
    pub fn validate(self) -> Result<AuditEntry> {
        let play_name = non_empty(self.play_name).or_else(|| non_empty(self.workflow_title));

        let fields = (
            non_empty(self.company_id),
            non_empty(self.company_domain),
            non_empty(self.workflow_id),
            non_empty(self.workflow_slug),
            play_name,
            self.step_number,
            non_empty(self.status),
        );

        match fields {
            (
                Some(company_id),
                Some(company_domain),
                Some(workflow_id),
                Some(workflow_slug),
                Some(play_name),
                Some(step_number),
                Some(status),
            ) => Ok(AuditEntry {
                company_id,
                company_domain,
                workflow_id,
                workflow_slug,
                play_name,
                step_number,
                status,
                batch_id: non_empty(self.batch_id),
                result_table: non_empty(self.result_table),
                error_message: non_empty(self.error_message),
            }),
            (id, domain, wf_id, wf_slug, play, step, status) => {
                let missing: Vec<&str> = [
                    ("company_id", id.is_none()),
                    ("company_domain", domain.is_none()),
                    ("workflow_id", wf_id.is_none()),
                    ("workflow_slug", wf_slug.is_none()),
                    ("play_name", play.is_none()),
                    ("step_number", step.is_none()),
                    ("status", status.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();

                Err(EnrichKitError::validation(format!(
                    "Missing required fields: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// A validated enrichment log entry, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub company_id: String,
    pub company_domain: String,
    pub workflow_id: String,
    pub workflow_slug: String,
    pub play_name: String,
    pub step_number: i64,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AuditEntry {
    /// Whether this entry should also produce a completion marker.
    pub fn is_success(&self) -> bool {
        self.status == SUCCESS_STATUS
    }

    /// The completion marker derived from this entry.
    pub fn completion(&self) -> CompletionEntry {
        CompletionEntry {
            company_id: self.company_id.clone(),
            play_name: self.play_name.clone(),
            step_number: self.step_number,
            workflow_slug: self.workflow_slug.clone(),
        }
    }
}

/// A persisted, immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    #[serde(flatten)]
    pub entry: AuditEntry,
    pub stored_at: DateTime<Utc>,
}

/// A completion marker, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub company_id: String,
    pub play_name: String,
    pub step_number: i64,
    pub workflow_slug: String,
}

/// A persisted completion marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub id: String,
    #[serde(flatten)]
    pub entry: CompletionEntry,
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Filters for listing audit records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl AuditQuery {
    /// Page size clamped to `1..=MAX_QUERY_LIMIT`.
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .clamp(1, MAX_QUERY_LIMIT)
    }
}

/// Filters for listing completion markers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionQuery {
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub play_name: Option<String>,
    #[serde(default)]
    pub step_number: Option<i64>,
}
