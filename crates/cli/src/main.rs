mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use agent::{
    Credentials, DashScopeProviderBuilder, Orchestrator, PlanRequest, TravelToolHost,
    generate_plan,
};
use clap::{Parser, Subcommand};
use knowledge::{DashScopeEmbedder, Embedder, HashEmbedder, KnowledgeBase};

use config::{Config, EmbedderKind};
use error::{Error, Result};

const CONFIG_FILE: &str = "wanderai.toml";

#[derive(Parser)]
#[command(name = "wanderai")]
#[command(about = "AI travel planning assistant", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Generate a complete travel plan
    Plan {
        /// Departure city
        origin: String,
        /// Destination city
        destination: String,
        /// Trip length in days
        #[arg(short, long, default_value = "3")]
        days: u32,
        /// Number of travellers
        #[arg(short, long, default_value = "1")]
        people: u32,
        /// Budget level (经济 / 适中 / 豪华)
        #[arg(short, long)]
        budget: Option<String>,
        /// Interest tags, comma-separated (美食,历史,自然…)
        #[arg(short, long)]
        tags: Option<String>,
    },
    /// Ingest guide files into the knowledge base
    Ingest {
        /// Text files to ingest
        files: Vec<PathBuf>,
    },
    /// Search the knowledge base
    Search {
        /// Query text
        query: String,
        /// Maximum number of passages to return
        #[arg(short, long, default_value = "3")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config)?;
    let command = cli.command.unwrap_or(Commands::Chat);

    match config.knowledge.embedder {
        EmbedderKind::Hash => dispatch(command, &config, HashEmbedder::default()).await,
        EmbedderKind::DashScope => {
            let key = config.dashscope_key().ok_or_else(|| {
                Error::Config(
                    "the dashscope embedder requires provider.api_key or DASHSCOPE_API_KEY"
                        .to_string(),
                )
            })?;
            dispatch(command, &config, DashScopeEmbedder::new(key)).await
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            Config::load(&path).map_err(|e| Error::Config(e.to_string()))
        }
        None if std::path::Path::new(CONFIG_FILE).exists() => {
            tracing::debug!(path = CONFIG_FILE, "loading config");
            Config::load(CONFIG_FILE).map_err(|e| Error::Config(e.to_string()))
        }
        None => Ok(Config::default()),
    }
}

async fn dispatch<E: Embedder>(command: Commands, config: &Config, embedder: E) -> Result<()> {
    match command {
        Commands::Chat => cmd_chat(config, embedder).await,
        Commands::Plan {
            origin,
            destination,
            days,
            people,
            budget,
            tags,
        } => {
            let mut request = PlanRequest::new(origin, destination, days, people);
            if let Some(budget) = budget {
                request.budget = budget;
            }
            if let Some(tags) = tags {
                request.tags = tags
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
            }
            cmd_plan(config, embedder, &request).await
        }
        Commands::Ingest { files } => cmd_ingest(config, embedder, &files).await,
        Commands::Search { query, limit } => cmd_search(config, embedder, &query, limit).await,
    }
}

async fn cmd_chat<E: Embedder>(config: &Config, embedder: E) -> Result<()> {
    println!("wanderai v{}", env!("CARGO_PKG_VERSION"));

    let llm_key = config.dashscope_key();
    let map_key = config.amap_key();

    if llm_key.is_none() {
        println!("Note: no DashScope API key configured; replies will be advisory only.");
    }

    let provider = DashScopeProviderBuilder::new(llm_key.clone(), &config.provider.model).build();
    let knowledge = Arc::new(KnowledgeBase::open(&config.knowledge.path, embedder)?);
    let host = TravelToolHost::new(map_key.clone(), knowledge);
    let orchestrator = Orchestrator::new(provider, host);

    let credentials = Credentials { llm_key, map_key };
    let session_id = uuid::Uuid::new_v4().to_string();

    println!("Session ID: {session_id}");
    println!("Model: {}", config.provider.model);
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        let result = orchestrator.run_turn(input, &session_id, &credentials).await;
        println!("\n{}\n", result.reply_text);
    }

    println!("\nSession ended.");
    Ok(())
}

async fn cmd_plan<E: Embedder>(config: &Config, embedder: E, request: &PlanRequest) -> Result<()> {
    let provider =
        DashScopeProviderBuilder::new(config.dashscope_key(), &config.provider.plan_model).build();

    let knowledge = if std::path::Path::new(&config.knowledge.path).exists() {
        Some(KnowledgeBase::open(&config.knowledge.path, embedder)?)
    } else {
        None
    };

    let plan = generate_plan(&provider, knowledge.as_ref(), request).await;
    println!("{plan}");
    Ok(())
}

async fn cmd_ingest<E: Embedder>(config: &Config, embedder: E, files: &[PathBuf]) -> Result<()> {
    if files.is_empty() {
        return Err(Error::Config("no files given to ingest".to_string()));
    }
    for file in files {
        if !file.exists() {
            return Err(Error::FileNotFound { path: file.clone() });
        }
    }

    let knowledge = KnowledgeBase::open(&config.knowledge.path, embedder)?;

    for file in files {
        let count = knowledge.ingest_file(file).await?;
        println!("{}: {count} passages", file.display());
    }

    println!("Knowledge base now holds {} passages.", knowledge.len()?);
    Ok(())
}

async fn cmd_search<E: Embedder>(
    config: &Config,
    embedder: E,
    query: &str,
    limit: usize,
) -> Result<()> {
    let knowledge = KnowledgeBase::open(&config.knowledge.path, embedder)?;
    let passages = knowledge.search(query, limit).await?;

    if passages.is_empty() {
        println!("No matching passages.");
        return Ok(());
    }

    for (i, passage) in passages.iter().enumerate() {
        println!("{}. {passage}\n", i + 1);
    }
    Ok(())
}
