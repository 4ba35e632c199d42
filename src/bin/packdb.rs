use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use packdb::{
    Container, DurabilityMode, Grouping, InventorySummary, PackDb, Record, Repository,
    StoreConfig,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "packdb")]
#[command(about = "Inspect and maintain a PackDB inventory store")]
struct Cli {
    /// Store directory
    #[arg(long, env = "PACKDB_DATA_DIR")]
    data_dir: PathBuf,

    /// WAL durability: sync, async or none
    #[arg(long, env = "PACKDB_DURABILITY", default_value = "sync")]
    durability: DurabilityMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print store-wide totals
    Summary,
    /// Print groupings, containers and records as a tree
    Tree,
    /// Write every entity as JSON
    Export {
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Load entities from a file written by `export`
    Import { file: PathBuf },
    /// Write a snapshot and truncate the WAL
    Checkpoint,
}

#[derive(Serialize, Deserialize)]
struct Export {
    groupings: Vec<Grouping>,
    containers: Vec<Container>,
    records: Vec<Record>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = StoreConfig::durable(&cli.data_dir).durability(cli.durability);
    let db = PackDb::open(config)
        .with_context(|| format!("Failed to open store at '{}'", cli.data_dir.display()))?;

    match cli.command {
        Command::Summary => print_summary(&db.lookup.summary().await?),
        Command::Tree => print_tree(&db).await?,
        Command::Export { out } => export(&db, out.as_deref()).await?,
        Command::Import { file } => import(&db, &file).await?,
        Command::Checkpoint => {
            if db.database().checkpoint().await? {
                println!("Checkpoint written to {}", cli.data_dir.display());
            } else {
                println!("Store is not durable, nothing to checkpoint");
            }
        }
    }
    Ok(())
}

fn print_summary(summary: &InventorySummary) {
    println!("Groupings:            {}", summary.grouping_count);
    println!(
        "Containers:           {} ({} unassigned)",
        summary.container_count, summary.unassigned_container_count
    );
    println!(
        "Records:              {} ({} unassigned)",
        summary.record_count, summary.unassigned_record_count
    );
    println!("Total value:          {:.2}", summary.total_value);
    println!("Contains sensitive:   {}", if summary.any_sensitive { "yes" } else { "no" });
}

fn flag(sensitive: bool) -> &'static str {
    if sensitive { " [sensitive]" } else { "" }
}

fn print_records(records: &[Record], indent: &str) {
    for record in records {
        println!(
            "{}- {} {:.2}{}",
            indent,
            record.name,
            record.numeric_value,
            flag(record.is_sensitive)
        );
    }
}

async fn print_containers(db: &PackDb, containers: &[Container], indent: &str) -> Result<()> {
    for container in containers {
        println!(
            "{}{} ({} records, {:.2}){}",
            indent,
            container.name,
            container.record_count,
            container.aggregate_value,
            flag(container.aggregate_sensitive)
        );
        let records = db.records.list_in_container(container.id).await?;
        print_records(&records, &format!("{}  ", indent));
    }
    Ok(())
}

async fn print_tree(db: &PackDb) -> Result<()> {
    for grouping in db.groupings.list().await? {
        println!(
            "{} ({} containers, {} records, {:.2}){}",
            grouping.name,
            grouping.container_count,
            grouping.record_count,
            grouping.aggregate_value,
            flag(grouping.aggregate_sensitive)
        );
        let containers = db.containers.list_in_grouping(grouping.id).await?;
        print_containers(db, &containers, "  ").await?;
    }

    let loose_containers: Vec<Container> = db
        .containers
        .list()
        .await?
        .into_iter()
        .filter(|c| c.grouping_id.is_none())
        .collect();
    if !loose_containers.is_empty() {
        println!("(no grouping)");
        print_containers(db, &loose_containers, "  ").await?;
    }

    let loose_records: Vec<Record> = db
        .records
        .list()
        .await?
        .into_iter()
        .filter(|r| r.container_id.is_none())
        .collect();
    if !loose_records.is_empty() {
        println!("(no container)");
        print_records(&loose_records, "  ");
    }
    Ok(())
}

async fn export(db: &PackDb, out: Option<&Path>) -> Result<()> {
    let export = Export {
        groupings: db.groupings.list().await?,
        containers: db.containers.list().await?,
        records: db.records.list().await?,
    };
    let json = serde_json::to_string_pretty(&export)?;
    match out {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            println!(
                "Exported {} groupings, {} containers, {} records to {}",
                export.groupings.len(),
                export.containers.len(),
                export.records.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn import(db: &PackDb, file: &Path) -> Result<()> {
    let content =
        fs::read_to_string(file).with_context(|| format!("Failed to read '{}'", file.display()))?;
    let export: Export = serde_json::from_str(&content)
        .with_context(|| format!("'{}' is not a packdb export", file.display()))?;

    let groupings = db.groupings.insert(export.groupings).await?;
    let containers = db.containers.insert(export.containers).await?;
    let records = db.records.insert(export.records).await?;
    println!(
        "Imported {} groupings, {} containers, {} records",
        groupings, containers, records
    );
    Ok(())
}
