//! # Lookout
//!
//! Client-side engine for asynchronous queries against remote log
//! services: submit a query, watch it to a terminal state, and retrieve
//! the results in a normalized tabular form.
//!
//! ## Features
//!
//! - **Flexible time ranges**: ISO 8601, epoch milliseconds, relative
//!   offsets, and named calendar ranges, all resolved in UTC
//! - **Wildcard resource selection**: prefix patterns expanded against the
//!   live catalog, capped at the service maximum
//! - **Honest monitoring**: one progress report per poll, terminal states
//!   as values rather than errors
//! - **Two retrieval strategies**: paginated walks or a single bulk
//!   result-object fetch, chosen per collaborator
//! - **Three output encodings**: aligned table, RFC 4180 CSV, and JSON
//!   with stable key order
//!
//! ## Modules
//!
//! - [`timerange`]: Time expression resolution
//! - [`resources`]: Wildcard expansion against the resource catalog
//! - [`engine`]: Submit, monitor, retrieve
//! - [`results`]: Normalization and rendering
//! - [`service`]: Collaborator traits and the HTTP client
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lookout::{
//!     EngineConfig, HttpQueryService, HttpServiceConfig, QueryEngine, ResourceSelection,
//!     TimeRange, DEFAULT_MAX_RESOURCES,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = Arc::new(HttpQueryService::new(HttpServiceConfig {
//!         base_url: "https://logs.example.com".to_string(),
//!         token: "token-from-profile".to_string(),
//!         ..Default::default()
//!     }));
//!
//!     // Resolve inputs before touching the network
//!     let range = TimeRange::resolve("last-hour", "now", chrono::Utc::now())?;
//!     let selection =
//!         ResourceSelection::expand("/app/api-*", service.as_ref(), DEFAULT_MAX_RESOURCES)
//!             .await?;
//!
//!     let engine = QueryEngine::new(service, EngineConfig::default());
//!     let handle = engine
//!         .submit("fields @timestamp, @message | limit 100", &selection, range)
//!         .await?;
//!
//!     let outcome = engine
//!         .wait(&handle, |p| println!("[{}] Status: {}", p.elapsed_human(), p.status))
//!         .await?;
//!     outcome.into_result()?;
//!
//!     let results = engine.retrieve(&handle).await?;
//!     println!("{} rows, {} columns", results.len(), results.columns.len());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod resources;
pub mod results;
pub mod service;
pub mod timerange;

// Re-export top-level types for convenience
pub use engine::{format_elapsed, EngineConfig, Progress, QueryEngine, QueryOutcome};

pub use error::{QueryError, QueryResult};

pub use timerange::{format_instant, NamedRange, TimeRange};

pub use resources::{ResourceSelection, DEFAULT_MAX_RESOURCES};

pub use results::{
    render, FormatError, OutputArtifact, OutputEncoding, ResultRow, ResultSet, RetrievalOptions,
    DEFAULT_ROW_LIMIT,
};

pub use service::http::{HttpQueryService, HttpServiceConfig};

pub use service::{
    CellValue, QueryHandle, QueryRequest, QueryService, QueryStatistics, QueryStatus, RawField,
    RawRow, ResourceCatalog, ResultPage, ResultSource, ServiceFailure, StatusSnapshot,
};

pub use config::{Config, ConfigError, LoggingConfig, ProfileConfig, QueryConfig, ServiceConfig};
