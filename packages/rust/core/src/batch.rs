//! Batch orchestrator: fetch → forward for every company, one ledger entry each.
//!
//! Items are isolated: a failure is recorded in that company's
//! [`ItemResult`] and the batch moves on. The ledger always has exactly one
//! entry per input company, in input order.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use enrichkit_fetcher::ProxyFetcher;
use enrichkit_shared::{
    BatchRequest, BatchResult, CompanyInput, ItemResult, Result, ScrapeSettings, WorkflowRef,
};

use crate::forwarder::StorageForwarder;

/// Runs batches against a configured fetcher and forwarder.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    fetcher: ProxyFetcher,
    forwarder: StorageForwarder,
    concurrency: usize,
}

impl BatchRunner {
    /// Build a runner from resolved settings.
    pub fn new(settings: &ScrapeSettings) -> Result<Self> {
        Ok(Self::from_parts(
            ProxyFetcher::new(settings.proxy.clone())?,
            StorageForwarder::new(settings.forwarder.clone())?,
            settings.concurrency,
        ))
    }

    pub fn from_parts(
        fetcher: ProxyFetcher,
        forwarder: StorageForwarder,
        concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            forwarder,
            concurrency: concurrency.max(1),
        }
    }

    /// Validate and process a batch.
    ///
    /// Only request-level validation can fail; item failures land in the result.
    #[instrument(skip_all)]
    pub async fn run(&self, request: &BatchRequest) -> Result<BatchResult> {
        let (companies, workflow) = request.validate()?;

        info!(
            workflow_id = %workflow.id,
            workflow_slug = %workflow.slug,
            companies = companies.len(),
            concurrency = self.concurrency,
            "starting batch"
        );

        let results = if self.concurrency == 1 {
            self.run_sequential(companies, workflow).await
        } else {
            self.run_concurrent(companies, workflow).await
        };

        let result = BatchResult::from_results(results);

        info!(
            workflow_id = %workflow.id,
            total = result.total,
            success_count = result.success_count,
            failed_count = result.failed_count,
            "batch completed"
        );

        Ok(result)
    }

    async fn run_sequential(
        &self,
        companies: &[CompanyInput],
        workflow: &WorkflowRef,
    ) -> Vec<ItemResult> {
        let mut results = Vec::with_capacity(companies.len());
        for company in companies {
            results.push(process_company(&self.fetcher, &self.forwarder, workflow, company).await);
        }
        results
    }

    /// Fan out up to `concurrency` items at once; handles are awaited in
    /// input order so the ledger keeps input order.
    async fn run_concurrent(
        &self,
        companies: &[CompanyInput],
        workflow: &WorkflowRef,
    ) -> Vec<ItemResult> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(companies.len());

        for company in companies {
            let fetcher = self.fetcher.clone();
            let forwarder = self.forwarder.clone();
            let workflow = workflow.clone();
            let company = company.clone();
            let sem = semaphore.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return ItemResult::failure(company.company_domain, "batch worker pool closed");
                };
                process_company(&fetcher, &forwarder, &workflow, &company).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (handle, company) in handles.into_iter().zip(companies) {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(company_domain = %company.company_domain, error = %e, "item task failed");
                    ItemResult::failure(&company.company_domain, format!("item task failed: {e}"))
                }
            };
            results.push(result);
        }
        results
    }
}

/// Fetch then forward one company. Never fails; errors become the item's result.
#[instrument(skip_all, fields(company_domain = %company.company_domain))]
async fn process_company(
    fetcher: &ProxyFetcher,
    forwarder: &StorageForwarder,
    workflow: &WorkflowRef,
    company: &CompanyInput,
) -> ItemResult {
    let missing = company.missing_fields();
    if !missing.is_empty() {
        let message = format!("missing company fields: {}", missing.join(", "));
        warn!(%message, "skipping incomplete company");
        return ItemResult::failure(&company.company_domain, message);
    }

    let content = match fetcher.fetch(&company.company_domain).await {
        Ok(content) => content,
        Err(e) => {
            warn!(error = %e, "fetch failed");
            return ItemResult::failure(&company.company_domain, e.to_string());
        }
    };

    if let Err(e) = forwarder.forward(workflow, company, &content).await {
        warn!(error = %e, "forward failed");
        return ItemResult::failure(&company.company_domain, e.to_string());
    }

    debug!("company processed");
    ItemResult::success(&company.company_domain)
}
