//! Result Retrieval
//!
//! Two strategies, picked once per collaborator by its `ResultSource`
//! capability. Paginated walks the results endpoint accumulating pages.
//! Bulk fetches the complete result object in a single request, which
//! avoids the per-page round trips and pagination state entirely; bulk
//! collaborators that report no object location fall back to paging.

use crate::error::QueryResult;
use crate::results::{ResultSet, DEFAULT_ROW_LIMIT};
use crate::service::{QueryHandle, QueryService, RawRow, ResultSource};

/// Knobs for one retrieval
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    /// Hard cap on retrieved rows
    pub limit: usize,

    /// Drop `@`-prefixed columns after normalization
    pub exclude_metadata: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_ROW_LIMIT,
            exclude_metadata: false,
        }
    }
}

/// Retrieve and normalize the results of a completed query
pub async fn retrieve(
    service: &dyn QueryService,
    handle: &QueryHandle,
    options: &RetrievalOptions,
) -> QueryResult<ResultSet> {
    let mut raw = match service.result_source() {
        ResultSource::Bulk => match service.bulk_location(handle).await? {
            Some(location) => {
                tracing::debug!(
                    "Fetching result object for query {} from {}",
                    handle.id,
                    location
                );
                service.fetch_bulk(&location).await?
            }
            None => {
                tracing::debug!("Query {} has no result object, paging instead", handle.id);
                fetch_all_pages(service, handle, options.limit).await?
            }
        },
        ResultSource::Paginated => fetch_all_pages(service, handle, options.limit).await?,
    };

    raw.truncate(options.limit);
    Ok(ResultSet::from_raw(raw, options.exclude_metadata))
}

async fn fetch_all_pages(
    service: &dyn QueryService,
    handle: &QueryHandle,
    limit: usize,
) -> QueryResult<Vec<RawRow>> {
    let mut rows: Vec<RawRow> = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = service.fetch_page(handle, page_token.as_deref()).await?;
        rows.extend(page.rows);

        if rows.len() >= limit {
            rows.truncate(limit);
            break;
        }

        // A missing token ends the walk. So does a repeated one, which
        // guards against a collaborator that never advances.
        let next = page.next_page_token;
        if next.is_none() || next == page_token {
            break;
        }
        page_token = next;
    }

    Ok(rows)
}
