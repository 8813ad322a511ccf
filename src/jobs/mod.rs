//! Research jobs
//!
//! A job is one end-to-end run of the [`ResearchPipeline`] for one company.
//! [`JobManager`] hands out job ids, runs the pipeline in the background and
//! keeps a [`JobRecord`] per job that callers poll for status and the final
//! report. Records can optionally be mirrored to a [`DocumentStore`].

use crate::research::{Phase, ResearchPipeline, ResearchState};
use crate::types::{AppError, CompanyProfile, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pollable view of one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub company: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub report: Option<String>,
    pub error: Option<String>,
}

impl JobRecord {
    fn pending(id: String, company: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            company,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            report: None,
            error: None,
        }
    }

    fn transition(&mut self, status: JobStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Persistence for job records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_job(&self, record: &JobRecord) -> Result<()>;

    async fn update_job(&self, id: &str, status: JobStatus, error: Option<&str>) -> Result<()>;

    async fn store_report(&self, id: &str, report: &str) -> Result<()>;

    async fn get_job(&self, id: &str) -> Result<Option<JobRecord>>;
}

/// Process-local [`DocumentStore`].
#[derive(Default)]
pub struct InMemoryDocumentStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create_job(&self, record: &JobRecord) -> Result<()> {
        self.jobs.write().insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update_job(&self, id: &str, status: JobStatus, error: Option<&str>) -> Result<()> {
        let mut jobs = self.jobs.write();
        let record = jobs
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Job {}", id)))?;
        record.transition(status);
        if let Some(error) = error {
            record.error = Some(error.to_string());
        }
        Ok(())
    }

    async fn store_report(&self, id: &str, report: &str) -> Result<()> {
        let mut jobs = self.jobs.write();
        let record = jobs
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Job {}", id)))?;
        record.report = Some(report.to_string());
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Option<JobRecord>> {
        Ok(self.jobs.read().get(id).cloned())
    }
}

/// Starts research jobs and tracks their records.
#[derive(Clone)]
pub struct JobManager {
    pipeline: Arc<ResearchPipeline>,
    jobs: Arc<RwLock<HashMap<String, JobRecord>>>,
    store: Option<Arc<dyn DocumentStore>>,
}

impl JobManager {
    pub fn new(pipeline: Arc<ResearchPipeline>) -> Self {
        Self {
            pipeline,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Accept a job and run it in the background. Returns the job id
    /// immediately; poll [`JobManager::status`] for progress.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(&self, company: CompanyProfile) -> Result<String> {
        let id = self.accept(&company).await?;

        let manager = self.clone();
        let job_id = id.clone();
        tokio::spawn(async move {
            manager.execute(company, job_id).await;
        });

        Ok(id)
    }

    /// Run a job to completion and return its final record.
    pub async fn run(&self, company: CompanyProfile) -> Result<JobRecord> {
        let id = self.accept(&company).await?;
        self.execute(company, id.clone()).await;
        self.status(&id)
    }

    pub fn status(&self, id: &str) -> Result<JobRecord> {
        self.jobs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Job {}", id)))
    }

    /// The final report, once the job has completed.
    pub fn report(&self, id: &str) -> Result<String> {
        self.status(id)?
            .report
            .ok_or_else(|| AppError::NotFound(format!("No report found for job {}", id)))
    }

    pub fn jobs(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.jobs.read().values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }

    async fn accept(&self, company: &CompanyProfile) -> Result<String> {
        company.validate()?;

        let id = Uuid::new_v4().to_string();
        let record = JobRecord::pending(id.clone(), company.name.clone());
        self.jobs.write().insert(id.clone(), record.clone());

        if let Some(store) = &self.store {
            if let Err(e) = store.create_job(&record).await {
                warn!(job_id = %id, error = %e, "Failed to persist new job");
            }
        }

        info!(job_id = %id, company = %company.name, "Job accepted");
        Ok(id)
    }

    async fn execute(&self, company: CompanyProfile, id: String) {
        self.transition(&id, JobStatus::Processing, None).await;

        let state = self.pipeline.run_to_state(company, id.clone()).await;
        self.finish(&id, state).await;
    }

    async fn finish(&self, id: &str, state: ResearchState) {
        match (state.phase, state.report) {
            (Phase::Done, Some(report)) => {
                if let Some(record) = self.jobs.write().get_mut(id) {
                    record.report = Some(report.clone());
                }
                if let Some(store) = &self.store {
                    if let Err(e) = store.store_report(id, &report).await {
                        warn!(job_id = %id, error = %e, "Failed to persist report");
                    }
                }
                self.transition(id, JobStatus::Completed, None).await;
            }
            _ => {
                let error = state
                    .error
                    .unwrap_or_else(|| "Research finished without a report".to_string());
                self.transition(id, JobStatus::Failed, Some(error)).await;
            }
        }
    }

    async fn transition(&self, id: &str, status: JobStatus, error: Option<String>) {
        if let Some(record) = self.jobs.write().get_mut(id) {
            record.transition(status);
            if error.is_some() {
                record.error = error.clone();
            }
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.update_job(id, status, error.as_deref()).await {
                warn!(job_id = %id, error = %e, "Failed to persist job status");
            }
        }

        info!(job_id = %id, status = %status, "Job status changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[tokio::test]
    async fn test_in_memory_store_lifecycle() {
        let store = InMemoryDocumentStore::new();
        let record = JobRecord::pending("job-1".into(), "Acme".into());
        store.create_job(&record).await.unwrap();

        store
            .update_job("job-1", JobStatus::Processing, None)
            .await
            .unwrap();
        store.store_report("job-1", "# Acme").await.unwrap();

        let stored = store.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Processing);
        assert_eq!(stored.report.as_deref(), Some("# Acme"));
        assert!(stored.updated_at >= stored.created_at);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_store_unknown_job() {
        let store = InMemoryDocumentStore::new();
        let err = store
            .update_job("missing", JobStatus::Failed, Some("boom"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.get_job("missing").await.unwrap().is_none());
        assert!(store.is_empty());
    }
}
