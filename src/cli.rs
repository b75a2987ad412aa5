use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::config::{self, AppConfig, Overrides};
use crate::devops::azure::AzureDevOpsClient;
use crate::devops::WorkItemSource;
use crate::model::work_item::{Record, RecordKind};
use crate::pipeline::{Batch, Pipeline};
use crate::sink::{JsonLinesSink, RecordSink};

#[derive(Debug, Parser)]
#[command(
    name = "wisync",
    version,
    about = "Pull work items, bugs, test cases, requirements and outcomes from Azure DevOps"
)]
pub struct Cli {
    /// Azure DevOps organization
    #[arg(long, env = "WISYNC_ORG", global = true)]
    pub org: Option<String>,

    /// Project the queries run under
    #[arg(long, env = "WISYNC_PROJECT", global = true)]
    pub project: Option<String>,

    /// Personal access token
    #[arg(long, env = "WISYNC_PAT", hide_env_values = true, global = true)]
    pub pat: Option<String>,

    /// Config file (default: ~/.wisync/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch records and replace the stored copy of each kind
    Sync {
        /// Record kind to sync; repeatable. All kinds when omitted.
        #[arg(long = "kind", value_parser = parse_kind)]
        kinds: Vec<RecordKind>,
        /// Output directory for the .jsonl files
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Fetch one kind and print a line per record
    Show {
        #[arg(value_parser = parse_kind)]
        kind: RecordKind,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the field reference names the project exposes
    Fields,
}

fn parse_kind(s: &str) -> Result<RecordKind, String> {
    RecordKind::parse(s).ok_or_else(|| {
        let known: Vec<&str> = RecordKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("unknown record kind '{s}' (expected one of: {})", known.join(", "))
    })
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    let ado = config.azure_devops.resolve(Overrides {
        organization: cli.org,
        project: cli.project,
        personal_access_token: cli.pat,
    })?;
    let client = Arc::new(
        AzureDevOpsClient::new(&ado, &config.fetch).context("Failed to build the HTTP client")?,
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Command::Sync { kinds, out } => {
            let out = out.unwrap_or_else(|| config.output.dir());
            handle_sync(client, &config, &kinds, JsonLinesSink::new(out), &cancel).await
        }
        Command::Show { kind, limit } => handle_show(client, &config, kind, limit, &cancel).await,
        Command::Fields => handle_fields(&client).await,
    }
}

pub async fn handle_sync(
    source: Arc<dyn WorkItemSource>,
    config: &AppConfig,
    kinds: &[RecordKind],
    sink: impl RecordSink,
    cancel: &CancellationToken,
) -> Result<()> {
    let kinds = if kinds.is_empty() {
        RecordKind::ALL.to_vec()
    } else {
        kinds.to_vec()
    };
    let pipeline = Pipeline::new(source, config.fetch.concurrency);
    let mut failed = Vec::new();
    let mut skipped = Vec::new();

    for (position, &kind) in kinds.iter().enumerate() {
        if cancel.is_cancelled() {
            skipped.extend(kinds[position..].iter().map(|k| k.as_str()));
            break;
        }
        let batch = match pipeline
            .run_kind(kind, config.queries.query_for(kind), cancel)
            .await
        {
            Ok(batch) => batch,
            Err(err) => {
                error!(%kind, error = %err, "query failed");
                failed.push(kind.as_str());
                continue;
            }
        };
        if batch.cancelled {
            // A partial batch would wipe out the stored copy.
            warn!(%kind, "run cancelled, stored records left untouched");
            skipped.extend(kinds[position..].iter().map(|k| k.as_str()));
            break;
        }
        if !batch.is_complete() {
            warn!(%kind, dropped = batch.dropped(), "some work items were skipped");
        }
        sink.replace(kind, &batch.records)
            .with_context(|| format!("Failed to store {kind}"))?;
        println!("{}", summary_line(kind, &batch));
    }

    if !failed.is_empty() {
        bail!("Query failed for: {}", failed.join(", "));
    }
    if !skipped.is_empty() {
        bail!("Sync cancelled before: {}", skipped.join(", "));
    }
    Ok(())
}

async fn handle_show(
    source: Arc<dyn WorkItemSource>,
    config: &AppConfig,
    kind: RecordKind,
    limit: Option<usize>,
    cancel: &CancellationToken,
) -> Result<()> {
    let pipeline = Pipeline::new(source, config.fetch.concurrency);
    let batch = pipeline
        .run_kind(kind, config.queries.query_for(kind), cancel)
        .await?;
    for record in batch.records.iter().take(limit.unwrap_or(usize::MAX)) {
        println!("{}", record.summary());
    }
    for failure in &batch.failures {
        eprintln!("skipped #{}: {}", failure.id, failure.reason);
    }
    eprintln!("{}", summary_line(kind, &batch));
    Ok(())
}

async fn handle_fields(client: &AzureDevOpsClient) -> Result<()> {
    let mut fields = client
        .list_fields()
        .await
        .context("Failed to list fields")?;
    fields.sort_by(|a, b| a.reference_name.cmp(&b.reference_name));
    for field in fields {
        println!(
            "{}\t{}\t{}",
            field.reference_name,
            field.name,
            field.field_type.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn summary_line(kind: RecordKind, batch: &Batch<Record>) -> String {
    let mut line = format!(
        "{kind}: {}/{} records",
        batch.records.len(),
        batch.requested
    );
    if batch.dropped() > 0 {
        line.push_str(&format!(" ({} dropped)", batch.dropped()));
    }
    if batch.cancelled {
        line.push_str(" [cancelled]");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devops::tests::MockSource;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("wisync").chain(args.iter().copied()))
    }

    #[test]
    fn sync_defaults_to_all_kinds() {
        let cli = parse(&["sync"]).unwrap();
        match cli.command {
            Command::Sync { kinds, out } => {
                assert!(kinds.is_empty());
                assert!(out.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn sync_accepts_repeated_kinds() {
        let cli = parse(&["sync", "--kind", "bugs", "--kind", "test-cases"]).unwrap();
        match cli.command {
            Command::Sync { kinds, .. } => {
                assert_eq!(kinds, vec![RecordKind::Bugs, RecordKind::TestCases]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = parse(&["show", "epics"]).unwrap_err();
        assert!(err.to_string().contains("unknown record kind"));
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = parse(&["show", "outcomes", "--org", "contoso", "--limit", "5"]).unwrap();
        assert_eq!(cli.org.as_deref(), Some("contoso"));
        match cli.command {
            Command::Show { kind, limit } => {
                assert_eq!(kind, RecordKind::Outcomes);
                assert_eq!(limit, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sync_writes_each_kind() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().to_path_buf());
        let source = Arc::new(MockSource::new(&[1, 2]).failing(2));

        handle_sync(
            source,
            &AppConfig::default(),
            &[RecordKind::Bugs, RecordKind::Requirements],
            JsonLinesSink::new(dir.path().to_path_buf()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        for kind in [RecordKind::Bugs, RecordKind::Requirements] {
            let contents = std::fs::read_to_string(sink.path_for(kind)).unwrap();
            assert_eq!(contents.lines().count(), 1);
        }
        assert!(!sink.path_for(RecordKind::Outcomes).exists());
    }

    #[tokio::test]
    async fn sync_reports_query_failures() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new(&[1]).with_query_failure());

        let err = handle_sync(
            source,
            &AppConfig::default(),
            &[RecordKind::Bugs],
            JsonLinesSink::new(dir.path().to_path_buf()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("bugs"));
        assert!(!dir.path().join("bugs.jsonl").exists());
    }

    #[tokio::test]
    async fn cancelled_sync_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().to_path_buf());
        sink.replace(RecordKind::Bugs, &[]).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = handle_sync(
            Arc::new(MockSource::new(&[1])),
            &AppConfig::default(),
            &[RecordKind::WorkItems, RecordKind::Bugs],
            JsonLinesSink::new(dir.path().to_path_buf()),
            &cancel,
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "Sync cancelled before: work_items, bugs");
        assert!(sink.path_for(RecordKind::Bugs).exists());
        assert!(!sink.path_for(RecordKind::WorkItems).exists());
    }

    #[tokio::test]
    async fn sync_interrupted_mid_kind_reports_remaining_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(
            MockSource::new(&[1, 2]).with_delay(2, std::time::Duration::from_secs(5)),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = handle_sync(
            source,
            &AppConfig::default(),
            &[RecordKind::Bugs, RecordKind::Outcomes],
            JsonLinesSink::new(dir.path().to_path_buf()),
            &cancel,
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "Sync cancelled before: bugs, outcomes");
        assert!(!dir.path().join("bugs.jsonl").exists());
    }

    #[test]
    fn summary_mentions_dropped_items() {
        let batch: Batch<Record> = Batch {
            records: Vec::new(),
            requested: 3,
            failures: Vec::new(),
            cancelled: false,
        };
        assert_eq!(
            summary_line(RecordKind::Bugs, &batch),
            "bugs: 0/3 records (3 dropped)"
        );
    }
}
