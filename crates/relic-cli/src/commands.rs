use anyhow::Context;
use colored::Colorize;
use tracing::info;

use relic_ocfl::{RepoConfig, Repository, ResolverKind};
use relic_runner::{IndexRunner, RunnerConfig};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Index(args) => cmd_index(args).await,
        Command::Schema(args) => cmd_schema(args).await,
        Command::Resolve(args) => cmd_resolve(args).await,
    }
}

fn load_config(path: &str) -> anyhow::Result<RunnerConfig> {
    let data =
        std::fs::read(path).with_context(|| format!("could not read config {path}"))?;
    let config = serde_json::from_slice(&data)
        .with_context(|| format!("could not parse config {path}"))?;
    Ok(config)
}

async fn cmd_index(args: IndexArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.config)?;
    if args.purge {
        config.purge = true;
    }
    if args.limit.is_some() {
        config.limit = args.limit;
    }

    let update_schema = config.update_schema && config.schema_base.is_some();
    let runner = IndexRunner::new(config)?;

    if update_schema {
        runner.update_solr_schema().await?;
    } else {
        info!("skipping solr schema update");
    }

    // Ctrl-C stops scheduling new work; the in-flight document finishes.
    let stop = runner.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.store(true, std::sync::atomic::Ordering::Relaxed);
        }
    });

    let summary = runner.run().await?;
    println!(
        "{} Indexed {} documents from {} objects ({} failures)",
        "✓".green().bold(),
        summary.documents.to_string().bold(),
        summary.objects,
        summary.failures,
    );
    Ok(())
}

async fn cmd_schema(args: SchemaArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let runner = IndexRunner::new(config)?;
    runner.update_solr_schema().await?;
    println!("{} Solr schema updated", "✓".green().bold());
    Ok(())
}

async fn cmd_resolve(args: ResolveArgs) -> anyhow::Result<()> {
    let repo = Repository::open(RepoConfig {
        repository: args.repository.clone().into(),
        resolver: ResolverKind::Pairtree,
        solr: None,
        autoindex: true,
        allow: None,
        timeout_secs: None,
    })?;

    if args.list {
        match repo.resolve_index(&args.oid, &args.version, &args.content).await {
            Some(entries) => {
                for entry in entries {
                    println!("{}", entry.href);
                }
            }
            None => println!("{} Not found", "✗".red()),
        }
    } else {
        match repo.resolve_file(&args.oid, &args.version, &args.content).await {
            Some(path) => println!("{}", path.display()),
            None => println!("{} Not found", "✗".red()),
        }
    }
    Ok(())
}
