use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use schools_in_lib::{
    ActionQueue, AppConfig, ConnectionPool, QueueStats, QueuedAction, SqliteActionStore, UserId,
};
use std::{env, sync::Arc};
use tokio::runtime::Runtime;

#[derive(Debug, Clone, Default)]
struct CliOptions {
    database_url: Option<String>,
    user: Option<String>,
    retry_failed: bool,
    purge: bool,
    pretty: bool,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueReport {
    database_url: String,
    user_id: Option<String>,
    generated_at: DateTime<Utc>,
    requeued: Option<u32>,
    purged: Option<u64>,
    stats: QueueStats,
    pending: Vec<QueuedAction>,
}

fn usage() -> &'static str {
    "Usage: queue_inspect [--database-url <url>] [--user <id>] [--retry-failed] [--purge] [--pretty]"
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = parse_args(args)?;
    let database_url = resolve_database_url(&options);

    let rt = Runtime::new().context("Failed to create Tokio runtime")?;
    let report = rt.block_on(async {
        collect_report(&database_url, &options)
            .await
            .with_context(|| format!("Failed to inspect queue at {database_url}"))
    })?;

    println!("{}", to_json(&report, options.pretty)?);
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(serde_json::to_string(value)?)
    }
}

fn parse_args<I>(args: I) -> Result<CliOptions>
where
    I: IntoIterator<Item = String>,
{
    let mut options = CliOptions::default();

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--database-url" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("--database-url requires a value\n{}", usage())
                })?;
                options.database_url = Some(value);
            }
            "--user" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--user requires a value\n{}", usage()))?;
                options.user = Some(value);
            }
            "--retry-failed" => options.retry_failed = true,
            "--purge" => options.purge = true,
            "--pretty" => options.pretty = true,
            "-h" | "--help" => {
                println!("{}", usage());
                std::process::exit(0);
            }
            other => {
                bail!("Unknown argument: {other}\n{}", usage());
            }
        }
    }

    Ok(options)
}

fn resolve_database_url(options: &CliOptions) -> String {
    if let Some(url) = &options.database_url {
        return url.clone();
    }
    AppConfig::from_env().database.url
}

async fn collect_report(database_url: &str, options: &CliOptions) -> Result<QueueReport> {
    let config = AppConfig::from_env();
    let user_id = options
        .user
        .as_deref()
        .map(UserId::new)
        .transpose()
        .map_err(|msg| anyhow::anyhow!(msg))?;

    let pool = ConnectionPool::new(database_url, 1)
        .await
        .with_context(|| format!("Failed to connect to database at {database_url}"))?;
    pool.migrate().await.context("Failed to run migrations")?;
    let queue = ActionQueue::new(
        Arc::new(SqliteActionStore::new(pool.clone())),
        config.sync.retention(),
    );

    let requeued = if options.retry_failed {
        Some(queue.retry_failed(user_id.as_ref()).await?)
    } else {
        None
    };
    let purged = if options.purge {
        Some(queue.purge_terminal().await?)
    } else {
        None
    };

    let stats = queue.stats(user_id.as_ref()).await?;
    let pending = queue.list_pending(user_id.as_ref()).await?;
    pool.close().await;

    Ok(QueueReport {
        database_url: database_url.to_string(),
        user_id: user_id.map(String::from),
        generated_at: Utc::now(),
        requeued,
        purged,
        stats,
        pending,
    })
}
