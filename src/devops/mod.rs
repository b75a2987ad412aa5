pub mod azure;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::detail::RawDetail;
use crate::model::work_item::WorkItemId;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("credential is not a valid header value")]
    Credential(#[from] reqwest::header::InvalidHeaderValue),
}

/// Query submission failed. Fatal to the run for that record kind.
#[derive(Error, Debug)]
#[error("query failed: {0}")]
pub struct QueryError(#[from] pub ApiError);

/// Detail retrieval for a single identifier failed.
#[derive(Error, Debug)]
#[error("fetching work item {id} failed: {source}")]
pub struct FetchError {
    pub id: WorkItemId,
    #[source]
    pub source: ApiError,
}

/// The two calls the fetch pipeline needs from the work-tracking service.
///
/// Implementations hold their own credentials and transport settings and
/// perform exactly one round trip per call, without retrying.
#[async_trait]
pub trait WorkItemSource: Send + Sync {
    /// Run a query and return matching ids in the order the service lists them.
    async fn execute_query(&self, query: &str) -> Result<Vec<WorkItemId>, QueryError>;

    async fn fetch_detail(&self, id: WorkItemId) -> Result<RawDetail, FetchError>;
}
