mod client;
mod config;
mod server;

use actuary_rag_core::maintenance::{self, PROBE_TOP_K};
use actuary_rag_core::DEFAULT_DOCUMENTS_DIR;
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::{build_services, ServiceArgs};
use server::{run_server, AppState};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "actuary-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    services: ServiceArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the chat and ingestion HTTP API.
    Serve {
        /// Address to bind.
        #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3000")]
        bind: String,
        /// Directory whose PDFs `/api/process-pdfs` ingests.
        #[arg(long, env = "DOCS_DIR", default_value = DEFAULT_DOCUMENTS_DIR)]
        docs_dir: PathBuf,
    },
    /// Ingest every PDF of a directory into the vector index.
    Ingest {
        /// Directory that contains the PDFs.
        #[arg(long, env = "DOCS_DIR", default_value = DEFAULT_DOCUMENTS_DIR)]
        docs_dir: PathBuf,
    },
    /// Print the nearest chunks for a query.
    Search {
        /// Search query.
        #[arg(long)]
        query: String,
        /// Number of matches to return.
        #[arg(long, default_value = "5")]
        top_k: usize,
    },
    /// Show index statistics and per-document record counts.
    Stats,
    /// Find records sharing source, page and text; delete extras with --yes.
    Dedup {
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Delete every record of the index.
    Purge {
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Chat with a running server from the terminal.
    Chat {
        /// Base URL of the chat server.
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "actuary-rag boot"
    );

    match cli.command {
        Command::Serve { bind, docs_dir } => {
            let services = build_services(&cli.services).await?;
            if cli.services.offline {
                warn!("offline index starts empty; POST /api/process-pdfs to load documents");
            }
            let state = AppState::new(services.chat, services.ingestion, docs_dir);
            run_server(&bind, state).await?;
        }
        Command::Ingest { docs_dir } => {
            let services = build_services(&cli.services).await?;
            let report = services.ingestion.ingest_folder(&docs_dir).await?;
            for file in &report.files {
                println!(
                    "{}: {} page(s), {} chunk(s)",
                    file.path.display(),
                    file.pages,
                    file.chunks
                );
            }
            println!(
                "{} record(s) upserted from {} file(s) at {}",
                report.records_upserted,
                report.files.len(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Search { query, top_k } => {
            let services = build_services(&cli.services).await?;
            let matches = services.retriever.search(&query, top_k).await?;
            println!("query: {query}");
            println!("{} match(es)", matches.len());
            for (position, hit) in matches.iter().enumerate() {
                println!("[{}] score={:.4} id={}", position + 1, hit.score, hit.id);
                if let Some(metadata) = &hit.metadata {
                    println!("  source={} page={}", metadata.source, metadata.page);
                    let preview: String = metadata.text.chars().take(200).collect();
                    println!("  text: {preview}...");
                }
            }
        }
        Command::Stats => {
            let services = build_services(&cli.services).await?;
            let overview = maintenance::overview(services.index.as_ref()).await?;
            println!("total records: {}", overview.stats.total_vector_count);
            println!("dimension:     {}", overview.stats.dimension);
            for (namespace, count) in &overview.stats.namespaces {
                let name = if namespace.is_empty() { "(default)" } else { namespace };
                println!("  namespace {name}: {count}");
            }
            println!("records per document (first {PROBE_TOP_K} records):");
            for (source, count) in &overview.per_source {
                println!("  {source}: {count}");
            }
            println!("busiest pages:");
            for page in &overview.top_pages {
                println!("  {} p.{}: {}", page.source, page.page, page.records);
            }
        }
        Command::Dedup { yes } => {
            let services = build_services(&cli.services).await?;
            let groups = maintenance::find_duplicates(services.index.as_ref()).await?;
            let redundant: usize = groups.iter().map(|group| group.redundant_ids().len()).sum();
            for group in &groups {
                println!(
                    "{} p.{}: {} copies",
                    group.source,
                    group.page,
                    group.ids.len()
                );
            }
            println!("{redundant} duplicate record(s)");

            if yes {
                let removed = maintenance::remove_duplicates(services.index.as_ref(), &groups).await?;
                println!("{removed} duplicate record(s) removed");
            } else if redundant > 0 {
                println!("re-run with --yes to delete them");
            }
        }
        Command::Purge { yes } => {
            if !yes {
                println!("refusing to delete every record without --yes");
                return Ok(());
            }
            let services = build_services(&cli.services).await?;
            let removed = maintenance::purge(services.index.as_ref()).await?;
            println!("{removed} record(s) deleted");
        }
        Command::Chat { server } => client::run_chat(&server).await?,
    }

    Ok(())
}
