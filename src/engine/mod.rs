//! Query Execution Engine
//!
//! One engine drives one query at a time through submit, monitor,
//! retrieve. It keeps no cross-query state and spawns no background
//! tasks; callers wanting N concurrent queries run N engines over a
//! shared service handle.

use std::sync::Arc;
use std::time::Duration;

use crate::error::QueryResult;
use crate::resources::ResourceSelection;
use crate::results::{self, ResultSet, RetrievalOptions, DEFAULT_ROW_LIMIT};
use crate::service::{QueryHandle, QueryRequest, QueryService};
use crate::timerange::TimeRange;

pub mod monitor;

pub use monitor::{format_elapsed, Progress, QueryOutcome};

/// Execution knobs for one engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay between status polls; also the progress report cadence
    pub update_interval: Duration,

    /// Row cap requested from the service and enforced at retrieval
    pub limit: usize,

    /// Drop `@`-prefixed columns from retrieved results
    pub exclude_metadata: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(30),
            limit: DEFAULT_ROW_LIMIT,
            exclude_metadata: false,
        }
    }
}

/// Client-side driver for asynchronous queries
pub struct QueryEngine {
    service: Arc<dyn QueryService>,
    config: EngineConfig,
}

impl QueryEngine {
    pub fn new(service: Arc<dyn QueryService>, config: EngineConfig) -> Self {
        Self { service, config }
    }

    /// Submit a query. Exactly one wire call; retry policy stays with the
    /// caller, who knows whether resubmitting is acceptable.
    pub async fn submit(
        &self,
        query: &str,
        selection: &ResourceSelection,
        range: TimeRange,
    ) -> QueryResult<QueryHandle> {
        let request =
            QueryRequest::new(query, selection.resolved.clone(), range, self.config.limit);

        tracing::info!(
            "Submitting query over {} resource(s), {} to {}",
            request.resources.len(),
            range.start_rfc3339(),
            range.end_rfc3339()
        );
        self.service.submit(&request).await
    }

    /// Monitor a submitted query until it reaches a terminal state
    pub async fn wait<F>(&self, handle: &QueryHandle, on_progress: F) -> QueryResult<QueryOutcome>
    where
        F: FnMut(&Progress),
    {
        monitor::wait_for_terminal(
            self.service.as_ref(),
            handle,
            self.config.update_interval,
            on_progress,
        )
        .await
    }

    /// Fetch and normalize the results of a completed query
    pub async fn retrieve(&self, handle: &QueryHandle) -> QueryResult<ResultSet> {
        let options = RetrievalOptions {
            limit: self.config.limit,
            exclude_metadata: self.config.exclude_metadata,
        };
        results::retrieve(self.service.as_ref(), handle, &options).await
    }

    /// Submit, monitor, and retrieve in one call
    pub async fn execute<F>(
        &self,
        query: &str,
        selection: &ResourceSelection,
        range: TimeRange,
        on_progress: F,
    ) -> QueryResult<ResultSet>
    where
        F: FnMut(&Progress),
    {
        let handle = self.submit(query, selection, range).await?;
        let outcome = self.wait(&handle, on_progress).await?;
        outcome.into_result()?;
        self.retrieve(&handle).await
    }

    /// Ask the service to stop a running query. Never called implicitly;
    /// dropping the engine leaves the query running remotely.
    pub async fn cancel(&self, handle: &QueryHandle) -> QueryResult<()> {
        self.service.cancel(handle).await
    }
}
