use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ApiError, FetchError, QueryError, WorkItemSource};
use crate::config::{AzureDevOpsConfig, FetchConfig};
use crate::model::detail::RawDetail;
use crate::model::work_item::WorkItemId;

/// Azure DevOps work item tracking REST client.
pub struct AzureDevOpsClient {
    project_url: String,
    api_version: String,
    client: reqwest::Client,
}

impl AzureDevOpsClient {
    pub fn new(config: &AzureDevOpsConfig, fetch: &FetchConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&basic_auth_header(&config.personal_access_token))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .build()?;

        Ok(Self {
            project_url: project_url(config),
            api_version: config.api_version.clone(),
            client,
        })
    }

    fn wiql_url(&self) -> String {
        format!(
            "{}/_apis/wit/wiql?api-version={}",
            self.project_url, self.api_version
        )
    }

    fn detail_url(&self, id: WorkItemId) -> String {
        format!(
            "{}/_apis/wit/workitems/{id}?api-version={}",
            self.project_url, self.api_version
        )
    }

    fn fields_url(&self) -> String {
        format!(
            "{}/_apis/wit/fields?api-version={}",
            self.project_url, self.api_version
        )
    }

    /// Every field the project knows about, for finding custom reference names.
    pub async fn list_fields(&self) -> Result<Vec<FieldInfo>, ApiError> {
        let resp = self.client.get(self.fields_url()).send().await?;
        let body = success_body(resp).await?;
        let list: FieldList = serde_json::from_str(&body)?;
        Ok(list.value)
    }
}

/// `Basic` credentials with an empty user name and the token as password.
fn basic_auth_header(personal_access_token: &str) -> String {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!(":{personal_access_token}"));
    format!("Basic {encoded}")
}

fn project_url(config: &AzureDevOpsConfig) -> String {
    format!(
        "{}/{}/{}",
        config.base_url.trim_end_matches('/'),
        urlencoding::encode(&config.organization),
        urlencoding::encode(&config.project)
    )
}

/// Body of a 2xx response, or the status and body of anything else.
async fn success_body(resp: reqwest::Response) -> Result<String, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.text().await?)
}

#[derive(Serialize)]
struct WiqlRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct WiqlResponse {
    #[serde(default, rename = "workItems")]
    work_items: Vec<WorkItemRef>,
}

#[derive(Deserialize)]
struct WorkItemRef {
    id: u32,
}

#[derive(Deserialize)]
struct FieldList {
    value: Vec<FieldInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "referenceName")]
    pub reference_name: String,
    #[serde(rename = "type")]
    pub field_type: Option<String>,
}

fn parse_wiql(body: &str) -> Result<Vec<WorkItemId>, ApiError> {
    let parsed: WiqlResponse = serde_json::from_str(body)?;
    Ok(parsed
        .work_items
        .into_iter()
        .filter_map(|r| {
            let id = WorkItemId::new(r.id);
            if id.is_none() {
                warn!(id = r.id, "query returned an invalid work item id, skipping");
            }
            id
        })
        .collect())
}

#[async_trait]
impl WorkItemSource for AzureDevOpsClient {
    async fn execute_query(&self, query: &str) -> Result<Vec<WorkItemId>, QueryError> {
        let url = self.wiql_url();
        info!(url = %url, "submitting work item query");
        let resp = self
            .client
            .post(&url)
            .json(&WiqlRequest { query })
            .send()
            .await
            .map_err(ApiError::from)?;
        let body = success_body(resp).await?;
        let ids = parse_wiql(&body)?;
        info!(count = ids.len(), "query returned ids");
        Ok(ids)
    }

    async fn fetch_detail(&self, id: WorkItemId) -> Result<RawDetail, FetchError> {
        let fetch = async {
            let resp = self.client.get(self.detail_url(id)).send().await?;
            let body = success_body(resp).await?;
            Ok::<_, ApiError>(serde_json::from_str::<RawDetail>(&body)?)
        };
        let detail = fetch.await.map_err(|source| FetchError { id, source })?;
        debug!(id = id.get(), "fetched work item detail");
        Ok(detail)
    }
}
