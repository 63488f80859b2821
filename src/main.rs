use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use querypilot::client::QueryPilot;
use querypilot::config::Config;
use querypilot::domains::memory::SqlExamplePair;
use querypilot::error::{QueryPilotError, Result};
use querypilot::server;

#[derive(Parser, Debug)]
#[command(name = "querypilot")]
#[command(about = "Ask questions about your data in plain language")]
struct Cli {
    #[arg(long, default_value = "./config.json", env = "QUERYPILOT_CONFIG")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server.
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
    /// Answer one question and print the response as JSON.
    Ask {
        question: String,

        #[arg(long, default_value = "cli_user")]
        user_id: String,
    },
    /// Load knowledge into the memory store.
    Train {
        /// File of DDL statements, separated by semicolons.
        #[arg(long)]
        ddl: Option<String>,

        /// File of business rules, one per line.
        #[arg(long)]
        documentation: Option<String>,

        /// JSON file with an array of { "question", "sql" } pairs.
        #[arg(long)]
        examples: Option<String>,

        /// Clear each targeted collection before loading.
        #[arg(long, default_value_t = false)]
        replace: bool,
    },
    /// List the tables in the data source.
    Tables,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,querypilot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?.resolve_env();
    let server_config = config.server.clone();
    let pilot = QueryPilot::from_config(config).await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host
                .or_else(|| server_config.as_ref().and_then(|s| s.host.clone()))
                .unwrap_or_else(|| "127.0.0.1".to_string());
            let port = port
                .or_else(|| server_config.as_ref().and_then(|s| s.port))
                .unwrap_or(8080);
            server::run(&host, port, Arc::new(pilot)).await
        }
        Commands::Ask { question, user_id } => {
            let response = pilot.ask(&question, Some(&user_id)).await;
            let rendered = serde_json::to_string_pretty(&response)
                .map_err(|e| QueryPilotError::Serialization(e.to_string()))?;
            println!("{rendered}");
            Ok(())
        }
        Commands::Train {
            ddl,
            documentation,
            examples,
            replace,
        } => {
            if let Some(path) = ddl {
                let statements = read_ddl_file(&path)?;
                let count = pilot.train_ddl(statements, replace).await?;
                println!("Loaded {count} DDL statement(s).");
            }
            if let Some(path) = documentation {
                let documents = read_lines_file(&path)?;
                let count = pilot.train_documentation(documents, replace).await?;
                println!("Loaded {count} documentation item(s).");
            }
            if let Some(path) = examples {
                let pairs = read_examples_file(&path)?;
                let count = pilot.train_examples(pairs, replace).await?;
                println!("Loaded {count} example pair(s).");
            }
            Ok(())
        }
        Commands::Tables => {
            for table in pilot.list_tables().await? {
                println!("{table}");
            }
            Ok(())
        }
    }
}

fn read_ddl_file(path: &str) -> Result<Vec<String>> {
    let content =
        std::fs::read_to_string(path).map_err(|e| QueryPilotError::Config(e.to_string()))?;
    let statements: Vec<String> = content
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("{s};"))
        .collect();
    if statements.is_empty() {
        return Err(QueryPilotError::Validation(format!(
            "no DDL statements found in {path}"
        )));
    }
    Ok(statements)
}

fn read_lines_file(path: &str) -> Result<Vec<String>> {
    let content =
        std::fs::read_to_string(path).map_err(|e| QueryPilotError::Config(e.to_string()))?;
    let lines: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();
    if lines.is_empty() {
        return Err(QueryPilotError::Validation(format!(
            "no documentation found in {path}"
        )));
    }
    Ok(lines)
}

fn read_examples_file(path: &str) -> Result<Vec<SqlExamplePair>> {
    let content =
        std::fs::read_to_string(path).map_err(|e| QueryPilotError::Config(e.to_string()))?;
    let pairs: Vec<SqlExamplePair> =
        serde_json::from_str(&content).map_err(|e| QueryPilotError::Serialization(e.to_string()))?;
    if pairs.is_empty() {
        return Err(QueryPilotError::Validation(format!(
            "no example pairs found in {path}"
        )));
    }
    Ok(pairs)
}
