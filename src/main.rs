use anyhow::Result;
use aurorag::agent::AgentService;
use aurorag::config::AgentConfig;
use aurorag::execution::{display_value, DatasetEngine, PolarsEngine};
use aurorag::schema::SchemaCatalog;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aurorag")]
#[command(about = "Ask questions about a tabular dataset in plain language")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a question about the dataset
    Ask {
        /// The question in natural language
        question: String,

        #[command(flatten)]
        dataset: DatasetArgs,

        /// Print the full snapshot as JSON
        #[arg(long)]
        json: bool,

        /// Model name (or set OPENAI_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// OpenAI-compatible endpoint (or set OPENAI_BASE_URL)
        #[arg(long)]
        base_url: Option<String>,

        /// API key (or set OPENAI_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Show dataset and catalog sizes
    Stats {
        #[command(flatten)]
        dataset: DatasetArgs,
    },
}

#[derive(Args)]
struct DatasetArgs {
    /// Dataset file (.csv or .parquet)
    #[arg(short, long, default_value = "data/patient_data.csv")]
    data: PathBuf,

    /// Column description file
    #[arg(short, long, default_value = "data/column_descriptions.csv")]
    schema: PathBuf,

    /// Table name queries run against (or set AURORAG_TABLE)
    #[arg(long)]
    table: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = AgentConfig::from_env()?;

    match cli.command {
        Command::Ask {
            question,
            dataset,
            json,
            model,
            base_url,
            api_key,
        } => {
            if let Some(table) = dataset.table {
                config.table_name = table;
            }
            if let Some(model) = model {
                config.model = model;
            }
            if let Some(base_url) = base_url {
                config.base_url = base_url;
            }
            if api_key.is_some() {
                config.api_key = api_key;
            }

            let service = AgentService::from_config(&config, &dataset.data, &dataset.schema)?;
            info!("Question: {}", question);
            let snapshot = service.ask(&question).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("\n{}", snapshot.explanation);
                if !snapshot.final_query.is_empty() {
                    println!("\nSQL: {}", snapshot.final_query);
                }
                if !snapshot.result_rows.is_empty() {
                    println!("\n{}", snapshot.columns.join(" | "));
                    for row in snapshot.result_rows.iter().take(20) {
                        let cells: Vec<String> = snapshot
                            .columns
                            .iter()
                            .map(|c| row.get(c).map(display_value).unwrap_or_default())
                            .collect();
                        println!("{}", cells.join(" | "));
                    }
                    if snapshot.result_rows.len() > 20 {
                        println!("... ({} rows total)", snapshot.result_rows.len());
                    }
                }
                println!(
                    "\nStatus: {} ({} attempt{})",
                    snapshot.status,
                    snapshot.attempt_count,
                    if snapshot.attempt_count == 1 { "" } else { "s" }
                );
                if !snapshot.is_success() {
                    println!(
                        "Failed in {}: {} ({})",
                        snapshot.terminal_phase,
                        snapshot.error,
                        snapshot.error_kind.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
        Command::Stats { dataset } => {
            if let Some(table) = dataset.table {
                config.table_name = table;
            }
            let catalog = SchemaCatalog::load(&dataset.schema)?;
            let engine = PolarsEngine::from_path(config.table_name.clone(), &dataset.data)?;
            let stats = engine.stats();
            println!("Table:   {}", engine.table_name());
            println!("Rows:    {}", stats.rows);
            println!("Columns: {}", stats.columns);
            println!("Catalog: {} described fields", catalog.len());
        }
    }

    Ok(())
}
