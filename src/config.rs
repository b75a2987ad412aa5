use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::model::work_item::RecordKind;

pub const DEFAULT_BASE_URL: &str = "https://dev.azure.com";
pub const DEFAULT_API_VERSION: &str = "6.0";
pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub azure_devops: AzureDevOpsSection,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub queries: QueryConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Connection settings as written in the file; any of them may come from the
/// environment instead.
#[derive(Debug, Deserialize, Default)]
pub struct AzureDevOpsSection {
    pub organization: Option<String>,
    pub project: Option<String>,
    pub personal_access_token: Option<String>,
    pub base_url: Option<String>,
    pub api_version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AzureDevOpsConfig {
    pub organization: String,
    pub project: String,
    pub personal_access_token: String,
    pub base_url: String,
    pub api_version: String,
}

/// Values supplied on the command line or through `WISYNC_*` variables.
#[derive(Debug, Default)]
pub struct Overrides {
    pub organization: Option<String>,
    pub project: Option<String>,
    pub personal_access_token: Option<String>,
}

impl AzureDevOpsSection {
    pub fn resolve(&self, overrides: Overrides) -> Result<AzureDevOpsConfig> {
        let organization = overrides
            .organization
            .or_else(|| self.organization.clone())
            .context("No organization configured. Set azure_devops.organization or WISYNC_ORG")?;
        let project = overrides
            .project
            .or_else(|| self.project.clone())
            .context("No project configured. Set azure_devops.project or WISYNC_PROJECT")?;
        let personal_access_token = overrides
            .personal_access_token
            .or_else(|| self.personal_access_token.clone())
            .context(
                "No personal access token configured. Set azure_devops.personal_access_token or WISYNC_PAT",
            )?;

        Ok(AzureDevOpsConfig {
            organization,
            project,
            personal_access_token,
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_version: self
                .api_version
                .clone()
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Deserialize, Default)]
pub struct QueryConfig {
    pub work_items: Option<String>,
    pub bugs: Option<String>,
    pub test_cases: Option<String>,
    pub requirements: Option<String>,
    pub outcomes: Option<String>,
}

impl QueryConfig {
    /// The configured query for `kind`, or the built-in one.
    pub fn query_for(&self, kind: RecordKind) -> &str {
        let custom = match kind {
            RecordKind::WorkItems => &self.work_items,
            RecordKind::Bugs => &self.bugs,
            RecordKind::TestCases => &self.test_cases,
            RecordKind::Requirements => &self.requirements,
            RecordKind::Outcomes => &self.outcomes,
        };
        custom.as_deref().unwrap_or_else(|| default_query(kind))
    }
}

/// Built-in WIQL. `@project` is expanded by the service to the project the
/// query is posted under.
pub fn default_query(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::WorkItems => {
            "SELECT [System.Id], [System.Title], [System.AssignedTo], [System.State], [System.Tags], \
             [System.TeamProject], [System.WorkItemType], [Custom.Round], \
             [Microsoft.VSTS.Common.Discipline], [Custom.RequirementCategory] \
             FROM WorkItems \
             WHERE [System.WorkItemType] = 'Requirement' AND [System.TeamProject] = @project \
             ORDER BY [System.Id]"
        }
        RecordKind::Bugs => {
            "SELECT [System.Id], [System.Title], [System.State], [Custom.BugType], \
             [Microsoft.VSTS.Common.Priority] \
             FROM WorkItems \
             WHERE [System.WorkItemType] = 'Bug' AND [System.TeamProject] = @project \
             ORDER BY [System.Id]"
        }
        RecordKind::TestCases => {
            "SELECT [System.Id], [System.Title], [System.State] \
             FROM WorkItems \
             WHERE [System.WorkItemType] = 'Test Case' AND [System.TeamProject] = @project \
             ORDER BY [System.Id]"
        }
        RecordKind::Requirements => {
            "SELECT [System.Id], [System.Title], [System.AssignedTo], [System.State], \
             [Microsoft.VSTS.Common.TestVerificationMethod], [System.BoardColumn] \
             FROM WorkItems \
             WHERE [System.WorkItemType] = 'Requirement' AND [System.TeamProject] = @project \
             ORDER BY [System.Id]"
        }
        RecordKind::Outcomes => {
            "SELECT [System.Id], [System.Title], [System.AssignedTo], [System.State], \
             [Custom.CurrentOutcome], [System.ChangedDate], [System.ChangedBy] \
             FROM WorkItems \
             WHERE [System.WorkItemType] = 'Test Case' AND [System.TeamProject] = @project \
             ORDER BY [System.Id]"
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct OutputConfig {
    pub dir: Option<PathBuf>,
}

impl OutputConfig {
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| data_dir().join("data"))
    }
}

fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wisync")
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}
