//! Query Service Interface
//!
//! The engine talks to two remote collaborators, both behind async traits
//! so tests can script them: the query service itself (submit, poll,
//! fetch) and the resource catalog used for wildcard expansion.
//!
//! All types here mirror the service wire format. Timestamps are UTC
//! milliseconds throughout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::QueryResult;
use crate::timerange::TimeRange;

pub mod http;

// ============================================
// Handles and status
// ============================================

/// Opaque handle for one submitted query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHandle {
    /// Identifier minted by the service at submission
    pub id: String,
    /// Submission instant, UTC milliseconds
    pub submitted_at: i64,
}

impl QueryHandle {
    pub fn new(id: impl Into<String>, submitted_at: i64) -> Self {
        Self {
            id: id.into(),
            submitted_at,
        }
    }

    /// Leading eight characters of the identifier, used in artifact names
    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

/// Execution state reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    Scheduled,
    Running,
    Complete,
    Failed,
    Cancelled,
    Timeout,
}

impl QueryStatus {
    /// Terminal states never transition again; the service keeps reporting
    /// the same one on every subsequent poll.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueryStatus::Complete
                | QueryStatus::Failed
                | QueryStatus::Cancelled
                | QueryStatus::Timeout
        )
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryStatus::Scheduled => "Scheduled",
            QueryStatus::Running => "Running",
            QueryStatus::Complete => "Complete",
            QueryStatus::Failed => "Failed",
            QueryStatus::Cancelled => "Cancelled",
            QueryStatus::Timeout => "Timeout",
        };
        write!(f, "{}", name)
    }
}

/// Scan counters reported alongside the status. Within one execution the
/// service only ever grows these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryStatistics {
    pub records_scanned: u64,
    pub records_matched: u64,
    pub bytes_scanned: u64,
}

impl QueryStatistics {
    /// First counter that moved backwards relative to `prev`, if any.
    /// Returns the counter name with its previous and current values.
    pub fn regression_from(&self, prev: &Self) -> Option<(&'static str, u64, u64)> {
        if self.records_scanned < prev.records_scanned {
            return Some(("records_scanned", prev.records_scanned, self.records_scanned));
        }
        if self.records_matched < prev.records_matched {
            return Some(("records_matched", prev.records_matched, self.records_matched));
        }
        if self.bytes_scanned < prev.bytes_scanned {
            return Some(("bytes_scanned", prev.bytes_scanned, self.bytes_scanned));
        }
        None
    }
}

/// One poll response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: QueryStatus,
    #[serde(default)]
    pub statistics: QueryStatistics,
    /// Populated by the service when `status` is `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ServiceFailure>,
}

/// Failure reason attached to a Failed query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceFailure {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

// ============================================
// Results
// ============================================

/// A single result cell: text, number, or null.
///
/// Numbers ride on `serde_json::Number` so integers stay integers all the
/// way through to JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Number(serde_json::Number),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Plain-text rendering for table and CSV output. Null renders empty.
    pub fn render(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(s) => s.clone(),
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Null
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n.into())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        // Non-finite floats have no JSON representation
        serde_json::Number::from_f64(n).map_or(CellValue::Null, CellValue::Number)
    }
}

/// One field of one raw result row, exactly as the service returned it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawField {
    pub field: String,
    #[serde(default)]
    pub value: CellValue,
}

impl RawField {
    pub fn new(field: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Rows arrive as unordered field lists; different rows of one result set
/// may carry different fields.
pub type RawRow = Vec<RawField>;

/// One page from the paginated fetch path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultPage {
    #[serde(default)]
    pub rows: Vec<RawRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// How a collaborator hands back finished results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    /// Page through the results endpoint until the token runs out
    #[default]
    Paginated,
    /// Fetch the complete result object from an addressable location
    Bulk,
}

// ============================================
// Submission
// ============================================

/// Submission payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub resources: Vec<String>,
    pub start_time: i64,
    pub end_time: i64,
    pub limit: usize,
}

impl QueryRequest {
    pub fn new(
        query: impl Into<String>,
        resources: Vec<String>,
        range: TimeRange,
        limit: usize,
    ) -> Self {
        Self {
            query: query.into(),
            resources,
            start_time: range.start,
            end_time: range.end,
            limit,
        }
    }
}

// ============================================
// Collaborator traits
// ============================================

/// The remote query service.
///
/// `submit` is exactly one wire call; retry policy belongs to the caller.
/// `poll` is idempotent, including on terminal states.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn submit(&self, request: &QueryRequest) -> QueryResult<QueryHandle>;

    async fn poll(&self, handle: &QueryHandle) -> QueryResult<StatusSnapshot>;

    async fn fetch_page(
        &self,
        handle: &QueryHandle,
        page_token: Option<&str>,
    ) -> QueryResult<ResultPage>;

    /// Where the complete result object can be fetched from, if the
    /// service materialized one for this query
    async fn bulk_location(&self, handle: &QueryHandle) -> QueryResult<Option<String>>;

    async fn fetch_bulk(&self, location: &str) -> QueryResult<Vec<RawRow>>;

    /// Ask the service to stop the query. Never called implicitly.
    async fn cancel(&self, handle: &QueryHandle) -> QueryResult<()>;

    /// Which retrieval strategy this collaborator supports
    fn result_source(&self) -> ResultSource;
}

/// Name listing for wildcard expansion
#[async_trait]
pub trait ResourceCatalog: Send + Sync {
    /// All resource names starting with `prefix`, in catalog order
    async fn list_resources(&self, prefix: &str) -> QueryResult<Vec<String>>;
}
