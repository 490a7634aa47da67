//! Query Monitoring
//!
//! The poll loop that drives one submitted query to a terminal state. One
//! progress report per poll; the sleep sits between polls rather than
//! before the first, so short queries finish in a single cycle.

use std::time::{Duration, Instant};

use crate::error::{QueryError, QueryResult};
use crate::service::{QueryHandle, QueryService, QueryStatistics, QueryStatus};

/// What one poll observed
#[derive(Debug, Clone)]
pub struct Progress {
    /// Wall-clock time since monitoring began
    pub elapsed: Duration,
    pub status: QueryStatus,
    pub statistics: QueryStatistics,
}

impl Progress {
    pub fn elapsed_human(&self) -> String {
        format_elapsed(self.elapsed)
    }
}

/// Terminal result of one monitored execution.
///
/// Terminal states are reported values, not errors: a query ending in
/// Failed is still a successful monitoring run. `into_result` collapses
/// the distinction for callers that only care about completion.
#[derive(Debug)]
pub enum QueryOutcome {
    Complete { statistics: QueryStatistics },
    Failed { error: QueryError },
    Cancelled,
    TimedOut,
}

impl QueryOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, QueryOutcome::Complete { .. })
    }

    pub fn into_result(self) -> QueryResult<QueryStatistics> {
        match self {
            QueryOutcome::Complete { statistics } => Ok(statistics),
            QueryOutcome::Failed { error } => Err(error),
            QueryOutcome::Cancelled => Err(QueryError::QueryCancelled(
                "query was cancelled before completing".to_string(),
            )),
            QueryOutcome::TimedOut => Err(QueryError::QueryTimedOut(
                "query exceeded the service execution time limit".to_string(),
            )),
        }
    }
}

/// Poll until the query reaches a terminal state.
///
/// Transport and protocol failures abort monitoring with an error. The
/// query may well still be running on the service afterwards; nothing is
/// cancelled implicitly.
pub(crate) async fn wait_for_terminal<F>(
    service: &dyn QueryService,
    handle: &QueryHandle,
    interval: Duration,
    mut on_progress: F,
) -> QueryResult<QueryOutcome>
where
    F: FnMut(&Progress),
{
    let started = Instant::now();
    let mut last_statistics: Option<QueryStatistics> = None;

    loop {
        let snapshot = service.poll(handle).await?;

        // Counters never shrink within one execution. A service that
        // reports otherwise is answering for the wrong query.
        if let Some(previous) = last_statistics {
            if let Some((counter, before, after)) =
                snapshot.statistics.regression_from(&previous)
            {
                return Err(QueryError::Transport(format!(
                    "service reported {} regressing from {} to {} for query {}",
                    counter, before, after, handle.id
                )));
            }
        }
        last_statistics = Some(snapshot.statistics);

        let progress = Progress {
            elapsed: started.elapsed(),
            status: snapshot.status,
            statistics: snapshot.statistics,
        };
        on_progress(&progress);

        match snapshot.status {
            QueryStatus::Complete => {
                tracing::info!("Query {} completed", handle.id);
                return Ok(QueryOutcome::Complete {
                    statistics: snapshot.statistics,
                });
            }
            QueryStatus::Failed => {
                let error = match snapshot.failure {
                    Some(failure) => {
                        QueryError::from_service_code(&failure.code, failure.message)
                    }
                    None => QueryError::Transport(
                        "query failed without a reported reason".to_string(),
                    ),
                };
                tracing::warn!("Query {} failed: {}", handle.id, error);
                return Ok(QueryOutcome::Failed { error });
            }
            QueryStatus::Cancelled => return Ok(QueryOutcome::Cancelled),
            QueryStatus::Timeout => return Ok(QueryOutcome::TimedOut),
            QueryStatus::Scheduled | QueryStatus::Running => {}
        }

        tokio::time::sleep(interval).await;
    }
}

/// Compact elapsed-time rendering: "45s", "2m 15s", "1h 5m"
pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
