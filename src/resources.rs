//! Resource Set Expansion
//!
//! Callers name the resources a query scans as a comma-separated pattern
//! list. A pattern ending in `*` expands by prefix against the live
//! resource catalog; anything else passes through as an exact name and is
//! validated by the service at submission. The combined set is
//! deduplicated with order preserved and truncated to the service maximum.

use std::collections::HashSet;

use crate::error::{QueryError, QueryResult};
use crate::service::ResourceCatalog;

/// The service rejects queries spanning more than this many resources
pub const DEFAULT_MAX_RESOURCES: usize = 20;

/// The outcome of expanding a pattern list against the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSelection {
    /// Input patterns, trimmed and deduplicated
    pub patterns: Vec<String>,

    /// Concrete resource names, capped at the service maximum
    pub resolved: Vec<String>,

    /// How many matched names the cap dropped
    pub excluded: usize,
}

impl ResourceSelection {
    /// Expand `input` into concrete resource names.
    ///
    /// Wildcard patterns that match nothing contribute nothing; the
    /// expansion only fails when the whole selection comes up empty.
    pub async fn expand(
        input: &str,
        catalog: &dyn ResourceCatalog,
        max_resources: usize,
    ) -> QueryResult<Self> {
        let mut patterns: Vec<String> = Vec::new();
        for part in input.split(',') {
            let part = part.trim();
            if !part.is_empty() && !patterns.iter().any(|p| p == part) {
                patterns.push(part.to_string());
            }
        }

        if patterns.is_empty() {
            return Err(QueryError::ResourceNotFound(
                "no resource patterns given".to_string(),
            ));
        }

        let mut resolved: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for pattern in &patterns {
            match pattern.strip_suffix('*') {
                Some(prefix) => {
                    let names = catalog.list_resources(prefix).await?;
                    tracing::debug!("Pattern {} matched {} resource(s)", pattern, names.len());
                    for name in names {
                        if seen.insert(name.clone()) {
                            resolved.push(name);
                        }
                    }
                }
                None => {
                    // Exact names are not checked against the catalog; the
                    // service validates them at submission.
                    if seen.insert(pattern.clone()) {
                        resolved.push(pattern.clone());
                    }
                }
            }
        }

        if resolved.is_empty() {
            return Err(QueryError::ResourceNotFound(format!(
                "no resources match {}",
                patterns.join(", ")
            )));
        }

        let excluded = resolved.len().saturating_sub(max_resources);
        resolved.truncate(max_resources);

        Ok(Self {
            patterns,
            resolved,
            excluded,
        })
    }

    /// Whether the cap dropped any matched names
    pub fn truncated(&self) -> bool {
        self.excluded > 0
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}
