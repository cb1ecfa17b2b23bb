use anyhow::{Context, Result};
use clap::Parser;
use dbpilot::config::AgentConfig;
use dbpilot::llm::HttpCompletionClient;
use dbpilot::orchestrator::Orchestrator;
use dbpilot::reflect;
use dbpilot::relationships::DotDiagramRenderer;
use rusqlite::Connection;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbpilot")]
#[command(about = "Ask a relational database questions in natural language")]
struct Args {
    /// Path to the SQLite database (or set DBPILOT_DB)
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Base URL of the completion endpoint (or set DBPILOT_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Output path for generated ER diagrams
    #[arg(long, default_value = "er_diagram.dot")]
    diagram_out: PathBuf,

    /// Run a single query instead of the interactive loop
    query: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = AgentConfig::from_env(args.api_url, args.db)?;

    info!("Connecting to {}", config.db_path.display());
    let schema = {
        let conn = Connection::open(&config.db_path)
            .with_context(|| format!("could not open {}", config.db_path.display()))?;
        reflect::reflect(&conn)?
    };

    let client = HttpCompletionClient::new(&config)?;
    let renderer = DotDiagramRenderer::new(&args.diagram_out);
    let orchestrator = Orchestrator::new(&client, &schema, &config.db_path, &renderer);

    if let Some(query) = args.query {
        let outcome = orchestrator.handle(&query).await;
        print!("{}", outcome);
        return Ok(());
    }

    println!("=== Available tables ===");
    print!("{}", schema);
    println!("========================\n");

    let stdin = io::stdin();
    loop {
        print!("Enter your query (or 'exit' to quit): ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") {
            break;
        }

        // a single failed query never ends the session
        let outcome = orchestrator.handle(query).await;
        print!("{}", outcome);
        println!("==============================");
    }

    println!("Goodbye.");
    Ok(())
}
