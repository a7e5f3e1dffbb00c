//! Rebuild the chatbot's document chunks from a directory of `.txt` files.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use db::DBService;
use server::{init_tracing, load_dotenv};
use services::services::{
    config::Config, document_import::import_documents, ollama::OllamaClient,
};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "import-documents")]
#[command(about = "Embed every line of the documents directory into document_chunks")]
struct Args {
    /// Directory holding the `.txt` sources
    #[arg(long, env = "DOCUMENTS_DIR")]
    dir: Option<PathBuf>,

    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Overrides OLLAMA_BASE_URL
    #[arg(long)]
    ollama_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv_warning = load_dotenv();
    init_tracing();
    if let Some(warning) = dotenv_warning {
        warn!("{warning}");
    }
    let args = Args::parse();

    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(dir) = args.dir {
        config.documents_dir = dir;
    }
    if let Some(url) = args.database_url {
        config.database_url = url;
    }
    if let Some(url) = args.ollama_url {
        config.ollama.base_url = url.trim_end_matches('/').to_string();
    }

    let db = DBService::new(&config.database_url)
        .await
        .with_context(|| format!("cannot open {}", config.database_url))?;
    let ollama = OllamaClient::new(&config.ollama)?;
    info!(
        dir = %config.documents_dir.display(),
        model = ollama.embed_model(),
        "starting document import"
    );

    let report = import_documents(&db, &ollama, &config.documents_dir).await?;
    println!(
        "{} files, {} chunks imported, {} failed",
        report.files, report.chunks_imported, report.chunks_failed
    );
    Ok(())
}
